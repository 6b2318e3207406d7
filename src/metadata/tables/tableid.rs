//! Metadata table identifiers and their column layouts.
//!
//! Every table in the `#~` stream is stored as a dense array of fixed-size rows. The size
//! of a row depends on the column layout of its table and on how large the referenced
//! heaps and tables are. To find any one table, the reader has to know the row size of
//! every table stored in front of it, so the layouts of all ECMA-335 tables are described
//! here, even those the type system never reads.
//!
//! # Reference
//! - [ECMA-335 II.22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//! - Portable PDB v1.0, "Metadata Tables" for `Document` and `MethodDebugInformation`

use strum::{EnumCount, EnumIter};

use crate::metadata::tables::CodedIndexType;

/// Identifiers of the metadata tables this crate knows the layout of.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
    Document = 0x30,
    MethodDebugInformation = 0x31,
}

/// The kind of value stored in one column of a table row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Column {
    /// A 2-byte constant
    U16,
    /// A 4-byte constant
    U32,
    /// An index into `#Strings`
    Str,
    /// An index into `#GUID`
    Guid,
    /// An index into `#Blob`
    Blob,
    /// A simple index into another table
    Table(TableId),
    /// A coded index into one of several tables
    Coded(CodedIndexType),
}

impl TableId {
    /// Number of table slots addressable by the 64-bit `valid` mask.
    pub const SLOTS: usize = 64;

    /// Map a table number to its identifier, if the layout of that table is known.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<TableId> {
        use strum::IntoEnumIterator;

        TableId::iter().find(|id| *id as u8 == value)
    }

    /// The column layout of a row in this table.
    #[must_use]
    #[rustfmt::skip]
    pub fn columns(self) -> &'static [Column] {
        use Column::{Blob, Coded, Guid, Str, Table, U16, U32};
        use CodedIndexType as C;

        match self {
            TableId::Module => &[U16, Str, Guid, Guid, Guid],
            TableId::TypeRef => &[Coded(C::ResolutionScope), Str, Str],
            TableId::TypeDef => &[U32, Str, Str, Coded(C::TypeDefOrRef), Table(TableId::Field), Table(TableId::MethodDef)],
            TableId::FieldPtr => &[Table(TableId::Field)],
            TableId::Field => &[U16, Str, Blob],
            TableId::MethodPtr => &[Table(TableId::MethodDef)],
            TableId::MethodDef => &[U32, U16, U16, Str, Blob, Table(TableId::Param)],
            TableId::ParamPtr => &[Table(TableId::Param)],
            TableId::Param => &[U16, U16, Str],
            TableId::InterfaceImpl => &[Table(TableId::TypeDef), Coded(C::TypeDefOrRef)],
            TableId::MemberRef => &[Coded(C::MemberRefParent), Str, Blob],
            TableId::Constant => &[U16, Coded(C::HasConstant), Blob],
            TableId::CustomAttribute => &[Coded(C::HasCustomAttribute), Coded(C::CustomAttributeType), Blob],
            TableId::FieldMarshal => &[Coded(C::HasFieldMarshal), Blob],
            TableId::DeclSecurity => &[U16, Coded(C::HasDeclSecurity), Blob],
            TableId::ClassLayout => &[U16, U32, Table(TableId::TypeDef)],
            TableId::FieldLayout => &[U32, Table(TableId::Field)],
            TableId::StandAloneSig => &[Blob],
            TableId::EventMap => &[Table(TableId::TypeDef), Table(TableId::Event)],
            TableId::EventPtr => &[Table(TableId::Event)],
            TableId::Event => &[U16, Str, Coded(C::TypeDefOrRef)],
            TableId::PropertyMap => &[Table(TableId::TypeDef), Table(TableId::Property)],
            TableId::PropertyPtr => &[Table(TableId::Property)],
            TableId::Property => &[U16, Str, Blob],
            TableId::MethodSemantics => &[U16, Table(TableId::MethodDef), Coded(C::HasSemantics)],
            TableId::MethodImpl => &[Table(TableId::TypeDef), Coded(C::MethodDefOrRef), Coded(C::MethodDefOrRef)],
            TableId::ModuleRef => &[Str],
            TableId::TypeSpec => &[Blob],
            TableId::ImplMap => &[U16, Coded(C::MemberForwarded), Str, Table(TableId::ModuleRef)],
            TableId::FieldRVA => &[U32, Table(TableId::Field)],
            TableId::EncLog => &[U32, U32],
            TableId::EncMap => &[U32],
            TableId::Assembly => &[U32, U16, U16, U16, U16, U32, Blob, Str, Str],
            TableId::AssemblyProcessor => &[U32],
            TableId::AssemblyOS => &[U32, U32, U32],
            TableId::AssemblyRef => &[U16, U16, U16, U16, U32, Blob, Str, Str, Blob],
            TableId::AssemblyRefProcessor => &[U32, Table(TableId::AssemblyRef)],
            TableId::AssemblyRefOS => &[U32, U32, U32, Table(TableId::AssemblyRef)],
            TableId::File => &[U32, Str, Blob],
            TableId::ExportedType => &[U32, U32, Str, Str, Coded(C::Implementation)],
            TableId::ManifestResource => &[U32, U32, Str, Coded(C::Implementation)],
            TableId::NestedClass => &[Table(TableId::TypeDef), Table(TableId::TypeDef)],
            TableId::GenericParam => &[U16, U16, Coded(C::TypeOrMethodDef), Str],
            TableId::MethodSpec => &[Coded(C::MethodDefOrRef), Blob],
            TableId::GenericParamConstraint => &[Table(TableId::GenericParam), Coded(C::TypeDefOrRef)],
            TableId::Document => &[Blob, Guid, Blob, Guid],
            TableId::MethodDebugInformation => &[Table(TableId::Document), Blob],
        }
    }

    /// The token type byte of rows in this table.
    #[must_use]
    pub fn token_type(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn lookup_by_number() {
        assert_eq!(TableId::from_u8(0x02), Some(TableId::TypeDef));
        assert_eq!(TableId::from_u8(0x31), Some(TableId::MethodDebugInformation));
        assert_eq!(TableId::from_u8(0x2D), None);
        assert_eq!(TableId::from_u8(0x3F), None);
    }

    #[test]
    fn ordered_and_addressable() {
        let ids: Vec<u8> = TableId::iter().map(|id| id as u8).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(ids.iter().all(|id| (*id as usize) < TableId::SLOTS));
        assert_eq!(TableId::COUNT, ids.len());
    }
}
