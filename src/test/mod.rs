//! Synthesised .NET assemblies for unit tests.
//!
//! [`AssemblyBuilder`] lays out a small but complete PE32 image with a CLR header, tiny
//! method bodies, a metadata root with all five streams and optionally a CodeView debug
//! entry. The type system references a fixed set of `System.Runtime` types, see the
//! `TYPEREF_*` constants.

use crate::{
    file::io::{pad_to, write_compressed_uint, write_le},
    metadata::{
        signatures::ELEMENT_TYPE,
        tables::{CodedIndexType, TableId},
        typesystem::TypeAttributes,
        writer::{
            write_root, BlobBuilder, GuidBuilder, StringsBuilder, TablesBuilder,
            UserStringsBuilder,
        },
    },
};

/// `TypeRef` row of `System.Object`.
pub const TYPEREF_OBJECT: u32 = 1;
/// `TypeRef` row of `System.ValueType`.
pub const TYPEREF_VALUETYPE: u32 = 2;
/// `TypeRef` row of `System.Enum`.
pub const TYPEREF_ENUM: u32 = 3;
/// `TypeRef` row of `System.MulticastDelegate`.
pub const TYPEREF_MULTICAST_DELEGATE: u32 = 4;
/// `TypeRef` row of `System.Runtime.Versioning.TargetFrameworkAttribute`.
pub const TYPEREF_TARGET_FRAMEWORK: u32 = 5;
/// `TypeRef` row of `System.Console`, scoped to `System.Console`.
pub const TYPEREF_CONSOLE: u32 = 6;
/// `TypeRef` row of ``System.Collections.Generic.List`1``.
pub const TYPEREF_LIST: u32 = 7;
/// `TypeRef` row of ``System.Nullable`1``.
pub const TYPEREF_NULLABLE: u32 = 8;

/// `MemberRef` row of `Console.WriteLine(string)`, called by every generated body.
pub const MEMBERREF_WRITELINE: u32 = 2;

/// The string every generated body prints.
pub const HELLO: &str = "Hello";

/// GUID of the CodeView record written by [`AssemblyBuilder::with_codeview`].
pub const CODEVIEW_GUID: uguid::Guid = uguid::guid!("0a1b2c3d-4e5f-6071-8293-a4b5c6d7e8f9");
/// `TimeDateStamp` of the CodeView debug entry.
pub const CODEVIEW_STAMP: u32 = 0x1234_5678;

const TEXT_RVA: u32 = 0x2000;
const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: u32 = 0x2000;
const CLR_HEADER_SIZE: usize = 72;

#[derive(Clone, Copy, PartialEq)]
enum Kind {
    Module,
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

struct Field {
    name: String,
    flags: u16,
    signature: Vec<u8>,
    constant: Option<i32>,
}

struct Method {
    name: String,
    is_static: bool,
}

struct Type {
    kind: Kind,
    namespace: String,
    name: String,
    enclosing: Option<usize>,
    generic_params: Vec<String>,
    fields: Vec<Field>,
    methods: Vec<Method>,
}

impl Type {
    fn new(kind: Kind, namespace: &str, name: &str) -> Type {
        Type {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
            enclosing: None,
            generic_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn flags(&self) -> u32 {
        let visibility = if self.enclosing.is_some() {
            TypeAttributes::NESTED_PUBLIC
        } else {
            TypeAttributes::PUBLIC
        };

        match self.kind {
            Kind::Module => 0,
            Kind::Class => visibility | TypeAttributes::BEFORE_FIELD_INIT,
            Kind::Interface => visibility | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT,
            Kind::Struct => {
                visibility
                    | TypeAttributes::SEQUENTIAL_LAYOUT
                    | TypeAttributes::SEALED
                    | TypeAttributes::BEFORE_FIELD_INIT
            }
            Kind::Enum | Kind::Delegate => visibility | TypeAttributes::SEALED,
        }
    }

    fn base_type(&self) -> Option<u32> {
        match self.kind {
            Kind::Module | Kind::Interface => None,
            Kind::Class => Some(TYPEREF_OBJECT),
            Kind::Struct => Some(TYPEREF_VALUETYPE),
            Kind::Enum => Some(TYPEREF_ENUM),
            Kind::Delegate => Some(TYPEREF_MULTICAST_DELEGATE),
        }
    }

    fn has_bodies(&self) -> bool {
        matches!(self.kind, Kind::Class | Kind::Struct)
    }
}

/// Builder for a minimal managed DLL.
pub struct AssemblyBuilder {
    name: String,
    codeview: bool,
    nb10: bool,
    references: Vec<String>,
    types: Vec<Type>,
    current: usize,
    last_top_level: usize,
    entry_point: Option<(usize, usize)>,
}

impl AssemblyBuilder {
    /// Start an assembly named `name`, stored as `<name>.dll`.
    pub fn new(name: &str) -> Self {
        AssemblyBuilder {
            name: name.to_string(),
            codeview: false,
            nb10: false,
            references: Vec::new(),
            types: vec![Type::new(Kind::Module, "", "<Module>")],
            current: 0,
            last_top_level: 0,
            entry_point: None,
        }
    }

    /// Add a portable CodeView debug entry naming `<name>.pdb`.
    pub fn with_codeview(mut self) -> Self {
        self.codeview = true;
        self
    }

    /// Add a PDB 2.0 (`NB10`) CodeView debug entry, which carries no portable PDB id.
    pub fn with_nb10_codeview(mut self) -> Self {
        self.codeview = true;
        self.nb10 = true;
        self
    }

    /// Reference another assembly, version 1.0.0.0 without a public key token.
    pub fn reference(mut self, name: &str) -> Self {
        self.references.push(name.to_string());
        self
    }

    fn push(mut self, definition: Type) -> Self {
        let nested = definition.enclosing.is_some();
        self.types.push(definition);
        self.current = self.types.len() - 1;
        if !nested {
            self.last_top_level = self.current;
        }
        self
    }

    /// Add a public class deriving from `System.Object`.
    pub fn class(self, namespace: &str, name: &str) -> Self {
        self.push(Type::new(Kind::Class, namespace, name))
    }

    /// Add a generic class; the arity suffix is appended to `name`.
    pub fn generic_class(self, namespace: &str, name: &str, params: &[&str]) -> Self {
        let mut definition =
            Type::new(Kind::Class, namespace, &format!("{name}`{}", params.len()));
        definition.generic_params = params.iter().map(|p| (*p).to_string()).collect();
        self.push(definition)
    }

    /// Add a public interface.
    pub fn interface(self, namespace: &str, name: &str) -> Self {
        self.push(Type::new(Kind::Interface, namespace, name))
    }

    /// Add a public struct.
    pub fn structure(self, namespace: &str, name: &str) -> Self {
        self.push(Type::new(Kind::Struct, namespace, name))
    }

    /// Add a public `int` enum with the given members, numbered from 0.
    pub fn enumeration(self, namespace: &str, name: &str, members: &[&str]) -> Self {
        let mut definition = Type::new(Kind::Enum, namespace, name);
        definition.fields.push(Field {
            name: "value__".to_string(),
            flags: 0x0606,
            signature: vec![0x06, ELEMENT_TYPE::I4],
            constant: None,
        });
        for (value, member) in members.iter().enumerate() {
            definition.fields.push(Field {
                name: (*member).to_string(),
                flags: 0x8056,
                signature: Vec::new(),
                constant: Some(value as i32),
            });
        }
        self.push(definition)
    }

    /// Add a public delegate type.
    pub fn delegate(self, namespace: &str, name: &str) -> Self {
        self.push(Type::new(Kind::Delegate, namespace, name))
    }

    /// Add a public class nested in the last top-level type.
    pub fn nested_class(self, name: &str) -> Self {
        let mut definition = Type::new(Kind::Class, "", name);
        definition.enclosing = Some(self.last_top_level);
        self.push(definition)
    }

    /// Add a parameterless `void` method to the last added type.
    ///
    /// Methods of classes and structs print [`HELLO`]; interface methods are abstract.
    pub fn method(mut self, name: &str, is_static: bool) -> Self {
        self.types[self.current].methods.push(Method {
            name: name.to_string(),
            is_static,
        });
        self
    }

    /// Add a public `int` field to the last added type.
    pub fn field(mut self, name: &str) -> Self {
        self.types[self.current].fields.push(Field {
            name: name.to_string(),
            flags: 0x0006,
            signature: vec![0x06, ELEMENT_TYPE::I4],
            constant: None,
        });
        self
    }

    /// Make the last added method the entry point.
    pub fn entry_point(mut self) -> Self {
        let methods = self.types[self.current].methods.len();
        if methods > 0 {
            self.entry_point = Some((self.current, methods - 1));
        }
        self
    }

    /// Lay out the image.
    pub fn build(self) -> Vec<u8> {
        let mut strings = StringsBuilder::default();
        let mut blobs = BlobBuilder::default();
        let mut guids = GuidBuilder::default();
        let mut user_strings = UserStringsBuilder::default();
        let mut tables = TablesBuilder::default();

        let hello = user_strings.add(HELLO).unwrap();
        let mut body = vec![0x72];
        body.extend_from_slice(&(0x7000_0000 | hello).to_le_bytes());
        body.push(0x28);
        body.extend_from_slice(&(0x0A00_0000 | MEMBERREF_WRITELINE).to_le_bytes());
        body.push(0x2A);
        let mut tiny = vec![((body.len() as u8) << 2) | 0x02];
        tiny.extend_from_slice(&body);

        let mvid = guids.add(uguid::guid!("6f1c3b2a-5d4e-4f60-8a7b-9c0d1e2f3a4b"));
        let module_name = strings.add(&format!("{}.dll", self.name));
        tables
            .add_row(TableId::Module, vec![0, module_name, mvid, 0, 0])
            .unwrap();

        let runtime = |scope: u32| {
            CodedIndexType::ResolutionScope
                .encode(TableId::AssemblyRef, scope)
                .unwrap()
        };
        for (scope, namespace, name) in [
            (1, "System", "Object"),
            (1, "System", "ValueType"),
            (1, "System", "Enum"),
            (1, "System", "MulticastDelegate"),
            (1, "System.Runtime.Versioning", "TargetFrameworkAttribute"),
            (2, "System", "Console"),
            (1, "System.Collections.Generic", "List`1"),
            (1, "System", "Nullable`1"),
        ] {
            let values = vec![runtime(scope), strings.add(name), strings.add(namespace)];
            tables.add_row(TableId::TypeRef, values).unwrap();
        }

        let mut method_count = 0_u32;
        let mut body_count = 0_u32;
        let mut field_count = 0_u32;
        let mut entry_point = 0_u32;
        let bodies_start = TEXT_RVA + CLR_HEADER_SIZE as u32;

        for (index, definition) in self.types.iter().enumerate() {
            let extends = match definition.base_type() {
                Some(row) => CodedIndexType::TypeDefOrRef
                    .encode(TableId::TypeRef, row)
                    .unwrap(),
                None => 0,
            };
            tables
                .add_row(
                    TableId::TypeDef,
                    vec![
                        definition.flags(),
                        strings.add(&definition.name),
                        strings.add(&definition.namespace),
                        extends,
                        field_count + 1,
                        method_count + 1,
                    ],
                )
                .unwrap();

            let own_row = index as u32 + 1;
            for field in &definition.fields {
                let signature = if field.signature.is_empty() {
                    let mut signature = vec![0x06, ELEMENT_TYPE::VALUETYPE];
                    let coded = CodedIndexType::TypeDefOrRef
                        .encode(TableId::TypeDef, own_row)
                        .unwrap();
                    write_compressed_uint(&mut signature, coded).unwrap();
                    signature
                } else {
                    field.signature.clone()
                };
                let values = vec![
                    u32::from(field.flags),
                    strings.add(&field.name),
                    blobs.add(&signature).unwrap(),
                ];
                field_count = tables.add_row(TableId::Field, values).unwrap();
            }

            for (position, method) in definition.methods.iter().enumerate() {
                let (rva, flags) = if definition.has_bodies() {
                    let rva = bodies_start + body_count * tiny.len() as u32;
                    body_count += 1;
                    let flags = 0x0086 | if method.is_static { 0x0010 } else { 0 };
                    (rva, flags)
                } else {
                    (0, 0x05C6)
                };
                let signature: &[u8] = if method.is_static {
                    &[0x00, 0x00, ELEMENT_TYPE::VOID]
                } else {
                    &[0x20, 0x00, ELEMENT_TYPE::VOID]
                };
                let values = vec![
                    rva,
                    0,
                    flags,
                    strings.add(&method.name),
                    blobs.add(signature).unwrap(),
                    1,
                ];
                method_count = tables.add_row(TableId::MethodDef, values).unwrap();
                if self.entry_point == Some((index, position)) {
                    entry_point = 0x0600_0000 | method_count;
                }
            }
        }

        let mut field_row = 0_u32;
        for definition in &self.types {
            for field in &definition.fields {
                field_row += 1;
                if let Some(value) = field.constant {
                    let parent = CodedIndexType::HasConstant
                        .encode(TableId::Field, field_row)
                        .unwrap();
                    let values = vec![
                        u32::from(ELEMENT_TYPE::I4),
                        parent,
                        blobs.add(&value.to_le_bytes()).unwrap(),
                    ];
                    tables.add_row(TableId::Constant, values).unwrap();
                }
            }
        }

        let constructor = blobs.add(&[0x20, 0x01, ELEMENT_TYPE::VOID, ELEMENT_TYPE::STRING]).unwrap();
        let write_line = blobs.add(&[0x00, 0x01, ELEMENT_TYPE::VOID, ELEMENT_TYPE::STRING]).unwrap();
        for (parent, name, signature) in [
            (TYPEREF_TARGET_FRAMEWORK, ".ctor", constructor),
            (TYPEREF_CONSOLE, "WriteLine", write_line),
        ] {
            let parent = CodedIndexType::MemberRefParent
                .encode(TableId::TypeRef, parent)
                .unwrap();
            let values = vec![parent, strings.add(name), signature];
            tables.add_row(TableId::MemberRef, values).unwrap();
        }

        let framework = ".NETCoreApp,Version=v8.0";
        let mut attribute = vec![0x01, 0x00];
        write_compressed_uint(&mut attribute, framework.len() as u32).unwrap();
        attribute.extend_from_slice(framework.as_bytes());
        attribute.extend_from_slice(&[0x00, 0x00]);
        let values = vec![
            CodedIndexType::HasCustomAttribute
                .encode(TableId::Assembly, 1)
                .unwrap(),
            CodedIndexType::CustomAttributeType
                .encode(TableId::MemberRef, 1)
                .unwrap(),
            blobs.add(&attribute).unwrap(),
        ];
        tables.add_row(TableId::CustomAttribute, values).unwrap();

        let values = vec![0x8004, 1, 0, 0, 0, 0, 0, strings.add(&self.name), 0];
        tables.add_row(TableId::Assembly, values).unwrap();

        let token = blobs
            .add(&[0xB0, 0x3F, 0x5F, 0x7F, 0x11, 0xD5, 0x0A, 0x3A])
            .unwrap();
        for name in ["System.Runtime", "System.Console"] {
            let values = vec![8, 0, 0, 0, 0, token, strings.add(name), 0, 0];
            tables.add_row(TableId::AssemblyRef, values).unwrap();
        }
        for name in &self.references {
            let values = vec![1, 0, 0, 0, 0, 0, strings.add(name), 0, 0];
            tables.add_row(TableId::AssemblyRef, values).unwrap();
        }

        for (index, definition) in self.types.iter().enumerate() {
            if let Some(enclosing) = definition.enclosing {
                let values = vec![index as u32 + 1, enclosing as u32 + 1];
                tables.add_row(TableId::NestedClass, values).unwrap();
            }
        }

        for (index, definition) in self.types.iter().enumerate() {
            let owner = CodedIndexType::TypeOrMethodDef
                .encode(TableId::TypeDef, index as u32 + 1)
                .unwrap();
            for (number, name) in definition.generic_params.iter().enumerate() {
                let values = vec![number as u32, 0, owner, strings.add(name)];
                tables.add_row(TableId::GenericParam, values).unwrap();
            }
        }

        let sorted = [
            TableId::InterfaceImpl,
            TableId::Constant,
            TableId::CustomAttribute,
            TableId::NestedClass,
            TableId::GenericParam,
        ]
        .iter()
        .fold(0_u64, |mask, table| mask | 1 << (*table as u8));
        let tables_stream = tables
            .build(strings.data(), guids.data(), blobs.data(), &[], sorted)
            .unwrap();

        let metadata = write_root(
            "v4.0.30319",
            &[
                ("#~", &tables_stream),
                ("#Strings", strings.data()),
                ("#US", user_strings.data()),
                ("#GUID", guids.data()),
                ("#Blob", blobs.data()),
            ],
        )
        .unwrap();

        let mut text = vec![0_u8; CLR_HEADER_SIZE];
        for _ in 0..body_count {
            text.extend_from_slice(&tiny);
        }
        pad_to(&mut text, 4);
        let metadata_rva = TEXT_RVA + text.len() as u32;
        text.extend_from_slice(&metadata);
        pad_to(&mut text, 4);

        let mut debug_directory = None;
        if self.codeview {
            let directory_rva = TEXT_RVA + text.len() as u32;
            let mut record = if self.nb10 {
                let mut record = b"NB10".to_vec();
                write_le::<u32>(&mut record, 0);
                write_le::<u32>(&mut record, CODEVIEW_STAMP);
                record
            } else {
                let mut record = b"RSDS".to_vec();
                record.extend_from_slice(&CODEVIEW_GUID.to_bytes());
                record
            };
            write_le::<u32>(&mut record, 1);
            record.extend_from_slice(format!("{}.pdb", self.name).as_bytes());
            record.push(0);

            let record_offset = text.len() + 28;
            write_le::<u32>(&mut text, 0);
            write_le::<u32>(&mut text, CODEVIEW_STAMP);
            write_le::<u16>(&mut text, 0x0100);
            write_le::<u16>(&mut text, 0x504D);
            write_le::<u32>(&mut text, 2);
            write_le::<u32>(&mut text, record.len() as u32);
            write_le::<u32>(&mut text, TEXT_RVA + record_offset as u32);
            write_le::<u32>(&mut text, (FILE_ALIGNMENT + record_offset) as u32);
            text.extend_from_slice(&record);
            debug_directory = Some(directory_rva);
        }

        let mut clr = Vec::with_capacity(CLR_HEADER_SIZE);
        write_le::<u32>(&mut clr, CLR_HEADER_SIZE as u32);
        write_le::<u16>(&mut clr, 2);
        write_le::<u16>(&mut clr, 5);
        write_le::<u32>(&mut clr, metadata_rva);
        write_le::<u32>(&mut clr, metadata.len() as u32);
        write_le::<u32>(&mut clr, 1);
        write_le::<u32>(&mut clr, entry_point);
        clr.resize(CLR_HEADER_SIZE, 0);
        text[..CLR_HEADER_SIZE].copy_from_slice(&clr);

        pe_image(&text, debug_directory)
    }
}

/// Wrap `text` into a PE32 DLL with a single `.text` section at [`TEXT_RVA`].
fn pe_image(text: &[u8], debug_directory: Option<u32>) -> Vec<u8> {
    let raw_size = (text.len() + FILE_ALIGNMENT - 1) / FILE_ALIGNMENT * FILE_ALIGNMENT;
    let virtual_size = (text.len() as u32 + SECTION_ALIGNMENT - 1) / SECTION_ALIGNMENT
        * SECTION_ALIGNMENT;

    let mut image = vec![0_u8; 0x80];
    image[0] = b'M';
    image[1] = b'Z';
    image[0x3C] = 0x80;

    image.extend_from_slice(b"PE\0\0");
    write_le::<u16>(&mut image, 0x014C);
    write_le::<u16>(&mut image, 1);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 0);
    write_le::<u16>(&mut image, 0xE0);
    write_le::<u16>(&mut image, 0x2102);

    write_le::<u16>(&mut image, 0x010B);
    write_le::<u8>(&mut image, 48);
    write_le::<u8>(&mut image, 0);
    write_le::<u32>(&mut image, raw_size as u32);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, TEXT_RVA);
    write_le::<u32>(&mut image, 0);

    write_le::<u32>(&mut image, 0x1000_0000);
    write_le::<u32>(&mut image, SECTION_ALIGNMENT);
    write_le::<u32>(&mut image, FILE_ALIGNMENT as u32);
    for version in [4_u16, 0, 0, 0, 4, 0] {
        write_le::<u16>(&mut image, version);
    }
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, TEXT_RVA + virtual_size);
    write_le::<u32>(&mut image, FILE_ALIGNMENT as u32);
    write_le::<u32>(&mut image, 0);
    write_le::<u16>(&mut image, 3);
    write_le::<u16>(&mut image, 0x8560);
    for size in [0x10_0000_u32, 0x1000, 0x10_0000, 0x1000] {
        write_le::<u32>(&mut image, size);
    }
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 16);

    for directory in 0..16 {
        let (rva, size) = match directory {
            6 => debug_directory.map_or((0, 0), |rva| (rva, 28)),
            14 => (TEXT_RVA, CLR_HEADER_SIZE as u32),
            _ => (0, 0),
        };
        write_le::<u32>(&mut image, rva);
        write_le::<u32>(&mut image, size);
    }

    image.extend_from_slice(b".text\0\0\0");
    write_le::<u32>(&mut image, text.len() as u32);
    write_le::<u32>(&mut image, TEXT_RVA);
    write_le::<u32>(&mut image, raw_size as u32);
    write_le::<u32>(&mut image, FILE_ALIGNMENT as u32);
    write_le::<u32>(&mut image, 0);
    write_le::<u32>(&mut image, 0);
    write_le::<u16>(&mut image, 0);
    write_le::<u16>(&mut image, 0);
    write_le::<u32>(&mut image, 0x6000_0020);

    image.resize(FILE_ALIGNMENT, 0);
    image.extend_from_slice(text);
    image.resize(FILE_ALIGNMENT + raw_size, 0);
    image
}
