//! Owned type system of a loaded module.
//!
//! The loader resolves the raw metadata rows into the owned structures of this module:
//! every `TypeDef` row becomes a [`TypeDefinition`] holding its fields, methods, generic
//! parameters, interfaces and nesting links; every `TypeRef` row becomes a
//! [`TypeReference`]. Heap indexes are resolved to strings and decoded signatures, so
//! the renderers never touch raw metadata.
//!
//! # Key Components
//! - [`TypeAttributes`] - `TypeDef.Flags` constants
//! - [`TypeKind`] - class, interface, struct, delegate or enum
//! - [`TypeDefinition`], [`MethodDefinition`], [`FieldDefinition`] - declarations
//! - [`FullTypeName`] - user-supplied type names in reflection or display syntax

mod members;
mod name;

use strum::{Display, EnumIter};

use crate::metadata::{signatures::TypeSignature, tables::CodedIndex, token::Token};

pub use members::{FieldAttributes, FieldDefinition, MethodDefinition, ParamDefinition};
pub use name::FullTypeName;

/// `TypeDef.Flags` constants (ECMA-335 II.23.1.15)
#[allow(non_snake_case)]
pub mod TypeAttributes {
    /// Use this mask to retrieve visibility information
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Class has no public scope
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Class has public scope
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Class is nested with public visibility
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Class is nested with private visibility
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Class is nested with family visibility
    pub const NESTED_FAMILY: u32 = 0x0000_0004;
    /// Class is nested with assembly visibility
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
    /// Class is nested with family and assembly visibility
    pub const NESTED_FAM_AND_ASSEM: u32 = 0x0000_0006;
    /// Class is nested with family or assembly visibility
    pub const NESTED_FAM_OR_ASSEM: u32 = 0x0000_0007;
    /// Use this mask to retrieve class layout information
    pub const LAYOUT_MASK: u32 = 0x0000_0018;
    /// Fields are laid out sequentially
    pub const SEQUENTIAL_LAYOUT: u32 = 0x0000_0008;
    /// Layout is supplied explicitly
    pub const EXPLICIT_LAYOUT: u32 = 0x0000_0010;
    /// Type is an interface
    pub const INTERFACE: u32 = 0x0000_0020;
    /// Class is abstract
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// Class cannot be extended
    pub const SEALED: u32 = 0x0000_0100;
    /// Class name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// Class is imported
    pub const IMPORT: u32 = 0x0000_1000;
    /// Class is serializable
    pub const SERIALIZABLE: u32 = 0x0000_2000;
    /// Initialize the class before first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
}

/// The declaration kind of a type, as shown by the entity listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum TypeKind {
    /// A reference type
    Class,
    /// An interface
    Interface,
    /// A value type
    Struct,
    /// A type deriving from `System.MulticastDelegate`
    Delegate,
    /// A type deriving from `System.Enum`
    Enum,
}

impl TypeKind {
    /// Classify a type from its flags, its own full name and the full name of its base
    /// type.
    #[must_use]
    pub fn classify(flags: u32, full_name: &str, base_type: Option<&str>) -> TypeKind {
        if flags & TypeAttributes::INTERFACE != 0 {
            return TypeKind::Interface;
        }

        match base_type {
            Some("System.Enum") => TypeKind::Enum,
            Some("System.ValueType") if full_name != "System.Enum" => TypeKind::Struct,
            Some("System.MulticastDelegate") => TypeKind::Delegate,
            _ => TypeKind::Class,
        }
    }
}

/// A type declared in the loaded module.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// `TypeDef` token
    pub token: Token,
    /// `TypeAttributes`
    pub flags: u32,
    /// Namespace, empty for nested types and the global namespace
    pub namespace: String,
    /// Simple name, including the generic arity suffix
    pub name: String,
    /// Declaration kind
    pub kind: TypeKind,
    /// Base type, `None` for interfaces, `<Module>` and `System.Object`
    pub base_type: Option<TypeSignature>,
    /// Implemented interfaces, in `InterfaceImpl` order
    pub interfaces: Vec<TypeSignature>,
    /// Generic parameter names, in position order
    pub generic_params: Vec<String>,
    /// Fields, in declaration order
    pub fields: Vec<FieldDefinition>,
    /// Methods, in declaration order
    pub methods: Vec<MethodDefinition>,
    /// The enclosing type, for nested types
    pub enclosing_type: Option<Token>,
    /// Directly nested types, in declaration order
    pub nested_types: Vec<Token>,
}

impl TypeDefinition {
    /// The name without the generic arity suffix (`List` for ``List`1``).
    #[must_use]
    pub fn display_name(&self) -> &str {
        strip_arity(&self.name)
    }

    /// `Namespace.Name`, with the arity suffix intact.
    #[must_use]
    pub fn reflection_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Whether the type is nested in another type.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing_type.is_some()
    }

    /// Whether this is the `<Module>` pseudo type holding global members.
    #[must_use]
    pub fn is_module_type(&self) -> bool {
        self.token.row() == 1 && self.name == "<Module>"
    }

    /// Visibility bits of [`TypeAttributes`].
    #[must_use]
    pub fn visibility(&self) -> u32 {
        self.flags & TypeAttributes::VISIBILITY_MASK
    }

    /// Whether the type is abstract and sealed, i.e. a C# `static class`.
    #[must_use]
    pub fn is_static_class(&self) -> bool {
        self.kind == TypeKind::Class
            && self.flags & TypeAttributes::ABSTRACT != 0
            && self.flags & TypeAttributes::SEALED != 0
    }
}

/// A type referenced by the loaded module.
#[derive(Debug, Clone)]
pub struct TypeReference {
    /// `TypeRef` token
    pub token: Token,
    /// Where the type lives (assembly, module or enclosing type reference)
    pub resolution_scope: CodedIndex,
    /// Namespace
    pub namespace: String,
    /// Simple name, including the generic arity suffix
    pub name: String,
}

impl TypeReference {
    /// `Namespace.Name`, with the arity suffix intact.
    #[must_use]
    pub fn reflection_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

/// Remove a trailing generic arity suffix (`` `1 ``) from a type name.
#[must_use]
pub fn strip_arity(name: &str) -> &str {
    if let Some((base, arity)) = name.rsplit_once('`') {
        if !arity.is_empty() && arity.chars().all(|c| c.is_ascii_digit()) {
            return base;
        }
    }

    name
}
