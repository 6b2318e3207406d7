//! A loaded .NET module.
//!
//! [`Module`] is what every operating mode works on: the memory-mapped image plus an owned,
//! fully resolved view of its metadata. Loading reads the CLR header, the metadata root,
//! the heaps and the tables once, decodes every signature and method body, and records the
//! debug directory. After that the renderers only deal with names, signatures and bytes.
//!
//! # Key Components
//! - [`Module`] - The loaded module
//! - [`PeModuleLoader`] - The native [`crate::engine::ModuleLoader`]
//! - [`NameStyle`] and [`GenericContext`] - Type name formatting for C# and ILAsm

mod loader;
mod names;

use std::path::{Path, PathBuf};

use crate::{
    engine::ModuleLoader,
    file::{
        debug::{DebugDirectoryEntry, IMAGE_DEBUG_TYPE_CODEVIEW},
        File,
    },
    metadata::{
        framework::TargetFramework,
        identity::AssemblyIdentity,
        signatures::{SignatureMethod, TypeSignature},
        tables::{CodedIndex, TableId},
        token::Token,
        typesystem::{FieldDefinition, FullTypeName, MethodDefinition, TypeDefinition, TypeReference},
    },
    Result,
};

pub use names::{GenericContext, NameStyle};

/// The signature of a `MemberRef`.
#[derive(Debug, Clone)]
pub enum MemberSignature {
    /// A method reference
    Method(SignatureMethod),
    /// A field reference
    Field(TypeSignature),
}

/// A reference to a field or method of another type.
#[derive(Debug, Clone)]
pub struct MemberReference {
    /// `MemberRef` token
    pub token: Token,
    /// Declaring type, module or method
    pub parent: CodedIndex,
    /// Member name
    pub name: String,
    /// Decoded signature
    pub signature: MemberSignature,
}

/// An instantiation of a generic method.
#[derive(Debug, Clone)]
pub struct MethodSpecification {
    /// `MethodSpec` token
    pub token: Token,
    /// The generic `MethodDef` or `MemberRef`
    pub method: Token,
    /// Type arguments
    pub arguments: Vec<TypeSignature>,
}

/// A compile-time constant of a field, parameter or property.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// `bool`
    Boolean(bool),
    /// `char`
    Char(u16),
    /// Any signed integer type, with its `ELEMENT_TYPE`
    Signed(i64, u8),
    /// Any unsigned integer type, with its `ELEMENT_TYPE`
    Unsigned(u64, u8),
    /// `float`
    R4(f32),
    /// `double`
    R8(f64),
    /// `string`
    String(String),
    /// `null` reference
    Null,
}

/// A loaded module with its resolved metadata.
pub struct Module {
    file: File,
    /// Path the module was loaded from
    pub path: PathBuf,
    /// Module name from the `Module` table
    pub name: String,
    /// Module version id
    pub mvid: Option<uguid::Guid>,
    /// Runtime version string of the metadata root
    pub runtime_version: String,
    /// Identity of the assembly, `None` for netmodules
    pub identity: Option<AssemblyIdentity>,
    /// Referenced assemblies, in `AssemblyRef` order
    pub references: Vec<AssemblyIdentity>,
    /// Target framework, from `TargetFrameworkAttribute` or the runtime version
    pub target_framework: TargetFramework,
    /// Debug directory entries
    pub debug_entries: Vec<DebugDirectoryEntry>,
    /// Managed entry point
    pub entry_point: Option<Token>,
    /// Row counts of all present tables
    pub table_rows: Vec<(TableId, u32)>,
    /// Declared types, in `TypeDef` order
    pub types: Vec<TypeDefinition>,
    /// Referenced types, in `TypeRef` order
    pub type_refs: Vec<TypeReference>,
    /// Decoded `TypeSpec` signatures, in row order
    pub type_specs: Vec<TypeSignature>,
    /// Member references, in row order
    pub member_refs: Vec<MemberReference>,
    /// Generic method instantiations, in row order
    pub method_specs: Vec<MethodSpecification>,
    /// Local variable signatures by `StandAloneSig` row; `None` for other signature kinds
    pub local_signatures: Vec<Option<Vec<TypeSignature>>>,
    /// Field constants by `Field` token
    pub field_constants: Vec<(Token, ConstantValue)>,
    user_strings: Vec<u8>,
    method_owners: Vec<(usize, usize)>,
    field_owners: Vec<(usize, usize)>,
}

impl Module {
    /// Load the module at `path`.
    ///
    /// # Errors
    /// Returns an error if the file is not a .NET PE image or its metadata is malformed.
    pub fn from_file(path: &Path) -> Result<Module> {
        let file = File::from_file(path)?;
        loader::load(file, path.to_path_buf())
    }

    /// Load a module from an in-memory image; `path` only names it.
    ///
    /// # Errors
    /// Same as [`Module::from_file`], minus the I/O.
    pub fn from_mem(path: &Path, data: Vec<u8>) -> Result<Module> {
        let file = File::from_mem(data)?;
        loader::load(file, path.to_path_buf())
    }

    /// The underlying image.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The file name of the module path.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| self.name.clone(), |name| name.to_string_lossy().into_owned())
    }

    /// The assembly name, falling back to the module name without extension.
    #[must_use]
    pub fn assembly_name(&self) -> String {
        match &self.identity {
            Some(identity) => identity.name.clone(),
            None => Path::new(&self.name)
                .file_stem()
                .map_or_else(|| self.name.clone(), |stem| stem.to_string_lossy().into_owned()),
        }
    }

    /// The first CodeView debug directory entry, if any.
    #[must_use]
    pub fn codeview(&self) -> Option<&DebugDirectoryEntry> {
        self.debug_entries
            .iter()
            .find(|entry| entry.debug_type == IMAGE_DEBUG_TYPE_CODEVIEW)
    }

    /// Row count of `table`, 0 if absent.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.table_rows
            .iter()
            .find(|(id, _)| *id == table)
            .map_or(0, |(_, rows)| *rows)
    }

    /// The declared type with `token`.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDefinition> {
        if token.table() != 0x02 || token.is_null() {
            return None;
        }
        self.types.get(token.row() as usize - 1)
    }

    /// The referenced type with `token`.
    #[must_use]
    pub fn type_ref(&self, token: Token) -> Option<&TypeReference> {
        if token.table() != 0x01 || token.is_null() {
            return None;
        }
        self.type_refs.get(token.row() as usize - 1)
    }

    /// The signature of the `TypeSpec` with `token`.
    #[must_use]
    pub fn type_spec(&self, token: Token) -> Option<&TypeSignature> {
        if token.table() != 0x1B || token.is_null() {
            return None;
        }
        self.type_specs.get(token.row() as usize - 1)
    }

    /// The member reference with `token`.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberReference> {
        if token.table() != 0x0A || token.is_null() {
            return None;
        }
        self.member_refs.get(token.row() as usize - 1)
    }

    /// The generic method instantiation with `token`.
    #[must_use]
    pub fn method_spec(&self, token: Token) -> Option<&MethodSpecification> {
        if token.table() != 0x2B || token.is_null() {
            return None;
        }
        self.method_specs.get(token.row() as usize - 1)
    }

    /// The method with `token` together with its declaring type.
    #[must_use]
    pub fn method_def(&self, token: Token) -> Option<(&TypeDefinition, &MethodDefinition)> {
        if token.table() != 0x06 || token.is_null() {
            return None;
        }
        let (type_index, method_index) = *self.method_owners.get(token.row() as usize - 1)?;
        let owner = self.types.get(type_index)?;
        Some((owner, owner.methods.get(method_index)?))
    }

    /// The field with `token` together with its declaring type.
    #[must_use]
    pub fn field_def(&self, token: Token) -> Option<(&TypeDefinition, &FieldDefinition)> {
        if token.table() != 0x04 || token.is_null() {
            return None;
        }
        let (type_index, field_index) = *self.field_owners.get(token.row() as usize - 1)?;
        let owner = self.types.get(type_index)?;
        Some((owner, owner.fields.get(field_index)?))
    }

    /// The constant value of the field with `token`.
    #[must_use]
    pub fn field_constant(&self, token: Token) -> Option<&ConstantValue> {
        self.field_constants
            .iter()
            .find(|(field, _)| *field == token)
            .map(|(_, value)| value)
    }

    /// Local variable types of a method body's `LocalVarSig` token.
    #[must_use]
    pub fn locals(&self, token: u32) -> Option<&[TypeSignature]> {
        let token = Token::new(token);
        if token.table() != 0x11 || token.is_null() {
            return None;
        }
        self.local_signatures
            .get(token.row() as usize - 1)?
            .as_deref()
    }

    /// The string literal of an `ldstr` token.
    #[must_use]
    pub fn user_string(&self, token: Token) -> Option<String> {
        if token.table() != 0x70 || self.user_strings.is_empty() {
            return None;
        }
        crate::metadata::streams::UserStrings::from(&self.user_strings)
            .ok()?
            .get(token.row() as usize)
            .ok()
    }

    /// Types that are not nested in another type, in declaration order.
    pub fn top_level_types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.iter().filter(|definition| !definition.is_nested())
    }

    /// Directly nested types of `definition`, in declaration order.
    pub fn nested_types<'a>(
        &'a self,
        definition: &'a TypeDefinition,
    ) -> impl Iterator<Item = &'a TypeDefinition> + 'a {
        definition
            .nested_types
            .iter()
            .filter_map(|token| self.type_def(*token))
    }

    /// Reflection name of a declared type, with nested parts joined by `+`.
    #[must_use]
    pub fn reflection_name(&self, definition: &TypeDefinition) -> String {
        match definition.enclosing_type.and_then(|token| self.type_def(token)) {
            Some(enclosing) => format!("{}+{}", self.reflection_name(enclosing), definition.name),
            None => definition.reflection_name(),
        }
    }

    /// Find a declared type by a user-supplied name.
    #[must_use]
    pub fn find_type(&self, name: &FullTypeName) -> Option<&TypeDefinition> {
        self.types
            .iter()
            .find(|definition| name.matches(&self.reflection_name(definition)))
    }
}

/// Loads modules from disk with the native PE reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct PeModuleLoader;

impl ModuleLoader for PeModuleLoader {
    fn load(&self, path: &Path) -> Result<Module> {
        Module::from_file(path)
    }
}
