//! Raw rows of the tables the type system reads.
//!
//! Each `*Raw` struct mirrors the on-disk columns of one table, with heap references left
//! as heap offsets and table references decoded into row ids or [`CodedIndex`] values.
//! Resolving them into names and signatures happens in the type system.

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A row type that can be decoded from table data.
pub trait RowReadable: Sized {
    /// The table this row type belongs to.
    const TABLE: TableId;

    /// Decode the row at `offset` and advance `offset` past it.
    ///
    /// # Errors
    /// Returns an error if the row is truncated or contains an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;

    /// The token of the row with id `rid`.
    fn token(rid: u32) -> Token {
        Token::from_parts(Self::TABLE.token_type(), rid)
    }
}

fn read_str(data: &[u8], offset: &mut usize, sizes: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_str())
}

fn read_guid(data: &[u8], offset: &mut usize, sizes: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_guid())
}

fn read_blob(data: &[u8], offset: &mut usize, sizes: &TableInfo) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large_blob())
}

fn read_table(data: &[u8], offset: &mut usize, sizes: &TableInfo, table: TableId) -> Result<u32> {
    read_le_at_dyn(data, offset, sizes.is_large(table))
}

fn read_coded(
    data: &[u8],
    offset: &mut usize,
    sizes: &TableInfo,
    coded_index_type: CodedIndexType,
) -> Result<CodedIndex> {
    let value = read_le_at_dyn(data, offset, sizes.is_large_coded(coded_index_type))?;
    coded_index_type.decode(value)
}

/// `Module` (0x00)
#[derive(Clone, Debug)]
pub struct ModuleRaw {
    /// Row id
    pub rid: u32,
    /// `#Strings` index of the module name
    pub name: u32,
    /// `#GUID` index of the module version id
    pub mvid: u32,
}

impl RowReadable for ModuleRaw {
    const TABLE: TableId = TableId::Module;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let _generation = read_le_at::<u16>(data, offset)?;
        let name = read_str(data, offset, sizes)?;
        let mvid = read_guid(data, offset, sizes)?;
        let _enc_id = read_guid(data, offset, sizes)?;
        let _enc_base_id = read_guid(data, offset, sizes)?;

        Ok(ModuleRaw { rid, name, mvid })
    }
}

/// `TypeRef` (0x01)
#[derive(Clone, Debug)]
pub struct TypeRefRaw {
    /// Row id
    pub rid: u32,
    /// Where the referenced type lives
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the type name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: read_coded(data, offset, sizes, CodedIndexType::ResolutionScope)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
        })
    }
}

/// `TypeDef` (0x02)
#[derive(Clone, Debug)]
pub struct TypeDefRaw {
    /// Row id
    pub rid: u32,
    /// `TypeAttributes`
    pub flags: u32,
    /// `#Strings` index of the type name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
    /// Base type, a null index for interfaces and `<Module>`
    pub extends: CodedIndex,
    /// First row of this type's fields
    pub field_list: u32,
    /// First row of this type's methods
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE: TableId = TableId::TypeDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_str(data, offset, sizes)?,
            type_namespace: read_str(data, offset, sizes)?,
            extends: read_coded(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_table(data, offset, sizes, TableId::Field)?,
            method_list: read_table(data, offset, sizes, TableId::MethodDef)?,
        })
    }
}

/// `FieldPtr` (0x03), only present in uncompressed (`#-`) metadata
#[derive(Clone, Debug)]
pub struct FieldPtrRaw {
    /// Row id
    pub rid: u32,
    /// The `Field` row this entry points to
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    const TABLE: TableId = TableId::FieldPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            field: read_table(data, offset, sizes, TableId::Field)?,
        })
    }
}

/// `Field` (0x04)
#[derive(Clone, Debug)]
pub struct FieldRaw {
    /// Row id
    pub rid: u32,
    /// `FieldAttributes`
    pub flags: u16,
    /// `#Strings` index of the field name
    pub name: u32,
    /// `#Blob` index of the field signature
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE: TableId = TableId::Field;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `MethodPtr` (0x05), only present in uncompressed (`#-`) metadata
#[derive(Clone, Debug)]
pub struct MethodPtrRaw {
    /// Row id
    pub rid: u32,
    /// The `MethodDef` row this entry points to
    pub method: u32,
}

impl RowReadable for MethodPtrRaw {
    const TABLE: TableId = TableId::MethodPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodPtrRaw {
            rid,
            method: read_table(data, offset, sizes, TableId::MethodDef)?,
        })
    }
}

/// `MethodDef` (0x06)
#[derive(Clone, Debug)]
pub struct MethodDefRaw {
    /// Row id
    pub rid: u32,
    /// RVA of the method body, 0 for abstract and extern methods
    pub rva: u32,
    /// `MethodImplAttributes`
    pub impl_flags: u16,
    /// `MethodAttributes`
    pub flags: u16,
    /// `#Strings` index of the method name
    pub name: u32,
    /// `#Blob` index of the method signature
    pub signature: u32,
    /// First row of this method's parameters
    pub param_list: u32,
}

impl RowReadable for MethodDefRaw {
    const TABLE: TableId = TableId::MethodDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodDefRaw {
            rid,
            rva: read_le_at::<u32>(data, offset)?,
            impl_flags: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
            param_list: read_table(data, offset, sizes, TableId::Param)?,
        })
    }
}

/// `Param` (0x08)
#[derive(Clone, Debug)]
pub struct ParamRaw {
    /// Row id
    pub rid: u32,
    /// `ParamAttributes`
    pub flags: u16,
    /// 0 for the return value, 1-based parameter position otherwise
    pub sequence: u16,
    /// `#Strings` index of the parameter name
    pub name: u32,
}

impl RowReadable for ParamRaw {
    const TABLE: TableId = TableId::Param;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(ParamRaw {
            rid,
            flags: read_le_at::<u16>(data, offset)?,
            sequence: read_le_at::<u16>(data, offset)?,
            name: read_str(data, offset, sizes)?,
        })
    }
}

/// `InterfaceImpl` (0x09)
#[derive(Clone, Debug)]
pub struct InterfaceImplRaw {
    /// Row id
    pub rid: u32,
    /// The implementing `TypeDef` row
    pub class: u32,
    /// The implemented interface
    pub interface: CodedIndex,
}

impl RowReadable for InterfaceImplRaw {
    const TABLE: TableId = TableId::InterfaceImpl;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(InterfaceImplRaw {
            rid,
            class: read_table(data, offset, sizes, TableId::TypeDef)?,
            interface: read_coded(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
        })
    }
}

/// `MemberRef` (0x0A)
#[derive(Clone, Debug)]
pub struct MemberRefRaw {
    /// Row id
    pub rid: u32,
    /// The type or module owning the member
    pub class: CodedIndex,
    /// `#Strings` index of the member name
    pub name: u32,
    /// `#Blob` index of the member signature
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: read_coded(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_str(data, offset, sizes)?,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `Constant` (0x0B)
#[derive(Clone, Debug)]
pub struct ConstantRaw {
    /// Row id
    pub rid: u32,
    /// `ELEMENT_TYPE` of the value
    pub element_type: u8,
    /// The owning field, parameter or property
    pub parent: CodedIndex,
    /// `#Blob` index of the value
    pub value: u32,
}

impl RowReadable for ConstantRaw {
    const TABLE: TableId = TableId::Constant;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let element_type = read_le_at::<u8>(data, offset)?;
        let _padding = read_le_at::<u8>(data, offset)?;

        Ok(ConstantRaw {
            rid,
            element_type,
            parent: read_coded(data, offset, sizes, CodedIndexType::HasConstant)?,
            value: read_blob(data, offset, sizes)?,
        })
    }
}

/// `CustomAttribute` (0x0C)
#[derive(Clone, Debug)]
pub struct CustomAttributeRaw {
    /// Row id
    pub rid: u32,
    /// The entity the attribute is applied to
    pub parent: CodedIndex,
    /// The attribute constructor
    pub constructor: CodedIndex,
    /// `#Blob` index of the attribute value
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    const TABLE: TableId = TableId::CustomAttribute;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            parent: read_coded(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: read_coded(data, offset, sizes, CodedIndexType::CustomAttributeType)?,
            value: read_blob(data, offset, sizes)?,
        })
    }
}

/// `StandAloneSig` (0x11)
#[derive(Clone, Debug)]
pub struct StandAloneSigRaw {
    /// Row id
    pub rid: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
}

impl RowReadable for StandAloneSigRaw {
    const TABLE: TableId = TableId::StandAloneSig;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(StandAloneSigRaw {
            rid,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `TypeSpec` (0x1B)
#[derive(Clone, Debug)]
pub struct TypeSpecRaw {
    /// Row id
    pub rid: u32,
    /// `#Blob` index of the type signature
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    const TABLE: TableId = TableId::TypeSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            signature: read_blob(data, offset, sizes)?,
        })
    }
}

/// `Assembly` (0x20)
#[derive(Clone, Debug)]
pub struct AssemblyRaw {
    /// Row id
    pub rid: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key
    pub public_key: u32,
    /// `#Strings` index of the assembly name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let _hash_alg_id = read_le_at::<u32>(data, offset)?;

        Ok(AssemblyRaw {
            rid,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
        })
    }
}

/// `AssemblyRef` (0x23)
#[derive(Clone, Debug)]
pub struct AssemblyRefRaw {
    /// Row id
    pub rid: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key or its token
    pub public_key_or_token: u32,
    /// `#Strings` index of the assembly name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowReadable for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        let row = AssemblyRefRaw {
            rid,
            major_version: read_le_at::<u16>(data, offset)?,
            minor_version: read_le_at::<u16>(data, offset)?,
            build_number: read_le_at::<u16>(data, offset)?,
            revision_number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_blob(data, offset, sizes)?,
            name: read_str(data, offset, sizes)?,
            culture: read_str(data, offset, sizes)?,
        };
        let _hash_value = read_blob(data, offset, sizes)?;

        Ok(row)
    }
}

/// `NestedClass` (0x29)
#[derive(Clone, Debug)]
pub struct NestedClassRaw {
    /// Row id
    pub rid: u32,
    /// The nested `TypeDef` row
    pub nested_class: u32,
    /// The enclosing `TypeDef` row
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE: TableId = TableId::NestedClass;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: read_table(data, offset, sizes, TableId::TypeDef)?,
            enclosing_class: read_table(data, offset, sizes, TableId::TypeDef)?,
        })
    }
}

/// `GenericParam` (0x2A)
#[derive(Clone, Debug)]
pub struct GenericParamRaw {
    /// Row id
    pub rid: u32,
    /// 0-based position in the owner's parameter list
    pub number: u16,
    /// `GenericParamAttributes`
    pub flags: u16,
    /// The owning type or method
    pub owner: CodedIndex,
    /// `#Strings` index of the parameter name
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    const TABLE: TableId = TableId::GenericParam;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: read_coded(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_str(data, offset, sizes)?,
        })
    }
}

/// `MethodSpec` (0x2B)
#[derive(Clone, Debug)]
pub struct MethodSpecRaw {
    /// Row id
    pub rid: u32,
    /// The generic method being instantiated
    pub method: CodedIndex,
    /// `#Blob` index of the instantiation signature
    pub instantiation: u32,
}

impl RowReadable for MethodSpecRaw {
    const TABLE: TableId = TableId::MethodSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodSpecRaw {
            rid,
            method: read_coded(data, offset, sizes, CodedIndexType::MethodDefOrRef)?,
            instantiation: read_blob(data, offset, sizes)?,
        })
    }
}

/// `Document` (0x30), portable PDB
#[derive(Clone, Debug)]
pub struct DocumentRaw {
    /// Row id
    pub rid: u32,
    /// `#Blob` index of the encoded document name
    pub name: u32,
    /// `#GUID` index of the hash algorithm
    pub hash_algorithm: u32,
    /// `#Blob` index of the document hash
    pub hash: u32,
    /// `#GUID` index of the source language
    pub language: u32,
}

impl RowReadable for DocumentRaw {
    const TABLE: TableId = TableId::Document;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(DocumentRaw {
            rid,
            name: read_blob(data, offset, sizes)?,
            hash_algorithm: read_guid(data, offset, sizes)?,
            hash: read_blob(data, offset, sizes)?,
            language: read_guid(data, offset, sizes)?,
        })
    }
}

/// `MethodDebugInformation` (0x31), portable PDB
#[derive(Clone, Debug)]
pub struct MethodDebugInformationRaw {
    /// Row id, equal to the `MethodDef` row it describes
    pub rid: u32,
    /// The `Document` row, 0 if the sequence points name it themselves
    pub document: u32,
    /// `#Blob` index of the sequence points, 0 for none
    pub sequence_points: u32,
}

impl RowReadable for MethodDebugInformationRaw {
    const TABLE: TableId = TableId::MethodDebugInformation;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MethodDebugInformationRaw {
            rid,
            document: read_table(data, offset, sizes, TableId::Document)?,
            sequence_points: read_blob(data, offset, sizes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consumes_row_size<T: RowReadable>(sizes: &TableInfo) {
        let data = vec![0u8; 64];
        let mut offset = 0;
        T::row_read(&data, &mut offset, 1, sizes).unwrap();
        assert_eq!(offset, sizes.row_size(T::TABLE), "{:?}", T::TABLE);
    }

    #[test]
    fn readers_match_layouts() {
        for sizes in [
            TableInfo::new_test(&[], false, false, false),
            TableInfo::new_test(
                &[(TableId::TypeDef, 0x1_0000), (TableId::MemberRef, 0x1_0000)],
                true,
                true,
                true,
            ),
        ] {
            assert_consumes_row_size::<ModuleRaw>(&sizes);
            assert_consumes_row_size::<TypeRefRaw>(&sizes);
            assert_consumes_row_size::<TypeDefRaw>(&sizes);
            assert_consumes_row_size::<FieldPtrRaw>(&sizes);
            assert_consumes_row_size::<FieldRaw>(&sizes);
            assert_consumes_row_size::<MethodPtrRaw>(&sizes);
            assert_consumes_row_size::<MethodDefRaw>(&sizes);
            assert_consumes_row_size::<ParamRaw>(&sizes);
            assert_consumes_row_size::<InterfaceImplRaw>(&sizes);
            assert_consumes_row_size::<MemberRefRaw>(&sizes);
            assert_consumes_row_size::<CustomAttributeRaw>(&sizes);
            assert_consumes_row_size::<ConstantRaw>(&sizes);
            assert_consumes_row_size::<StandAloneSigRaw>(&sizes);
            assert_consumes_row_size::<MethodSpecRaw>(&sizes);
            assert_consumes_row_size::<TypeSpecRaw>(&sizes);
            assert_consumes_row_size::<AssemblyRaw>(&sizes);
            assert_consumes_row_size::<AssemblyRefRaw>(&sizes);
            assert_consumes_row_size::<NestedClassRaw>(&sizes);
            assert_consumes_row_size::<GenericParamRaw>(&sizes);
            assert_consumes_row_size::<DocumentRaw>(&sizes);
            assert_consumes_row_size::<MethodDebugInformationRaw>(&sizes);
        }
    }

    #[test]
    fn crafted_typedef() {
        #[rustfmt::skip]
        let data = [
            0x01, 0x00, 0x10, 0x00, // flags
            0x42, 0x00,             // type_name
            0x43, 0x00,             // type_namespace
            0x05, 0x00,             // extends, TypeRef row 1
            0x03, 0x00,             // field_list
            0x04, 0x00,             // method_list
        ];

        let sizes = TableInfo::new_test(
            &[(TableId::Field, 3), (TableId::MethodDef, 4), (TableId::TypeRef, 1)],
            false,
            false,
            false,
        );

        let mut offset = 0;
        let row = TypeDefRaw::row_read(&data, &mut offset, 1, &sizes).unwrap();

        assert_eq!(row.flags, 0x0010_0001);
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends.tag, TableId::TypeRef);
        assert_eq!(row.extends.row, 1);
        assert_eq!(row.field_list, 3);
        assert_eq!(row.method_list, 4);
        assert_eq!(TypeDefRaw::token(1), Token::new(0x0200_0001));
    }
}
