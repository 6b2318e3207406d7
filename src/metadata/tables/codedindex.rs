//! Coded indexes.
//!
//! A coded index references one of several tables with a single value: the low bits are a
//! tag selecting the table, the remaining bits are the row. The number of tag bits and the
//! on-disk width (2 or 4 bytes) depend on the set of candidate tables and their sizes.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use strum::{EnumCount, EnumIter};

use crate::{
    metadata::{tables::TableId, token::Token},
    Error::OutOfBounds,
    Result,
};

/// All coded index kinds used by the tables this crate reads or skips.
#[derive(Debug, Hash, Eq, PartialEq, Clone, Copy, EnumIter, EnumCount)]
#[repr(usize)]
#[allow(missing_docs)]
pub enum CodedIndexType {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// The candidate tables, in tag order.
    #[must_use]
    pub fn tables(&self) -> &'static [TableId] {
        match self {
            CodedIndexType::TypeDefOrRef => {
                &[TableId::TypeDef, TableId::TypeRef, TableId::TypeSpec]
            }
            CodedIndexType::HasConstant => &[TableId::Field, TableId::Param, TableId::Property],
            CodedIndexType::HasCustomAttribute => &[
                TableId::MethodDef,
                TableId::Field,
                TableId::TypeRef,
                TableId::TypeDef,
                TableId::Param,
                TableId::InterfaceImpl,
                TableId::MemberRef,
                TableId::Module,
                TableId::DeclSecurity,
                TableId::Property,
                TableId::Event,
                TableId::StandAloneSig,
                TableId::ModuleRef,
                TableId::TypeSpec,
                TableId::Assembly,
                TableId::AssemblyRef,
                TableId::File,
                TableId::ExportedType,
                TableId::ManifestResource,
                TableId::GenericParam,
                TableId::GenericParamConstraint,
                TableId::MethodSpec,
            ],
            CodedIndexType::HasFieldMarshal => &[TableId::Field, TableId::Param],
            CodedIndexType::HasDeclSecurity => {
                &[TableId::TypeDef, TableId::MethodDef, TableId::Assembly]
            }
            CodedIndexType::MemberRefParent => &[
                TableId::TypeDef,
                TableId::TypeRef,
                TableId::ModuleRef,
                TableId::MethodDef,
                TableId::TypeSpec,
            ],
            CodedIndexType::HasSemantics => &[TableId::Event, TableId::Property],
            CodedIndexType::MethodDefOrRef => &[TableId::MethodDef, TableId::MemberRef],
            CodedIndexType::MemberForwarded => &[TableId::Field, TableId::MethodDef],
            CodedIndexType::Implementation => {
                &[TableId::File, TableId::AssemblyRef, TableId::ExportedType]
            }
            // Tags 0, 1 and 4 are unused; they only matter for the tag width
            CodedIndexType::CustomAttributeType => &[
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MethodDef,
                TableId::MemberRef,
                TableId::MemberRef,
            ],
            CodedIndexType::ResolutionScope => &[
                TableId::Module,
                TableId::ModuleRef,
                TableId::AssemblyRef,
                TableId::TypeRef,
            ],
            CodedIndexType::TypeOrMethodDef => &[TableId::TypeDef, TableId::MethodDef],
        }
    }

    /// Number of low bits used for the tag.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn tag_bits(&self) -> u8 {
        let candidates = self.tables().len();
        (usize::BITS - (candidates - 1).leading_zeros()) as u8
    }

    /// Split a raw coded index into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the tag does not name a candidate table.
    pub fn decode(&self, value: u32) -> Result<CodedIndex> {
        let tables = self.tables();
        let tag_bits = self.tag_bits();
        let tag = value & ((1 << tag_bits) - 1);
        let row = value >> tag_bits;

        match tables.get(tag as usize) {
            Some(table) => Ok(CodedIndex::new(*table, row)),
            None => Err(OutOfBounds),
        }
    }

    /// Combine `table` and `row` into a raw coded index.
    ///
    /// # Errors
    /// Returns a malformed error if `table` is not a candidate of this coded index.
    pub fn encode(&self, table: TableId, row: u32) -> Result<u32> {
        let tag = match (self, table) {
            (CodedIndexType::CustomAttributeType, TableId::MethodDef) => Some(2),
            (CodedIndexType::CustomAttributeType, TableId::MemberRef) => Some(3),
            (CodedIndexType::CustomAttributeType, _) => None,
            _ => self.tables().iter().position(|candidate| *candidate == table),
        };

        match tag {
            Some(tag) => Ok((row << self.tag_bits()) | tag as u32),
            None => Err(malformed_error!(
                "{:?} cannot reference table {:?}",
                self,
                table
            )),
        }
    }
}

/// A decoded coded index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodedIndex {
    /// The referenced table
    pub tag: TableId,
    /// The 1-based row, 0 for "no reference"
    pub row: u32,
    /// The token equivalent of table and row
    pub token: Token,
}

impl CodedIndex {
    /// Create a coded index for `row` in `tag`.
    #[must_use]
    pub fn new(tag: TableId, row: u32) -> CodedIndex {
        CodedIndex {
            tag,
            row,
            token: Token::from_parts(tag.token_type(), row),
        }
    }

    /// Whether this index references nothing.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_widths() {
        assert_eq!(CodedIndexType::TypeDefOrRef.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasConstant.tag_bits(), 2);
        assert_eq!(CodedIndexType::HasCustomAttribute.tag_bits(), 5);
        assert_eq!(CodedIndexType::HasFieldMarshal.tag_bits(), 1);
        assert_eq!(CodedIndexType::MemberRefParent.tag_bits(), 3);
        assert_eq!(CodedIndexType::CustomAttributeType.tag_bits(), 3);
        assert_eq!(CodedIndexType::ResolutionScope.tag_bits(), 2);
    }

    #[test]
    fn decode() {
        let index = CodedIndexType::TypeDefOrRef.decode(0x0D).unwrap();
        assert_eq!(index.tag, TableId::TypeRef);
        assert_eq!(index.row, 3);
        assert_eq!(index.token, Token::new(0x0100_0003));

        let index = CodedIndexType::CustomAttributeType.decode(0x1B).unwrap();
        assert_eq!(index.tag, TableId::MemberRef);
        assert_eq!(index.row, 3);

        assert!(CodedIndexType::TypeDefOrRef.decode(0x03).is_err());
    }

    #[test]
    fn encode() {
        assert_eq!(
            CodedIndexType::TypeDefOrRef.encode(TableId::TypeRef, 3).unwrap(),
            0x0D
        );
        assert_eq!(
            CodedIndexType::CustomAttributeType.encode(TableId::MemberRef, 3).unwrap(),
            0x1B
        );
        assert_eq!(
            CodedIndexType::HasCustomAttribute.encode(TableId::Assembly, 1).unwrap(),
            (1 << 5) | 14
        );
        assert!(CodedIndexType::TypeDefOrRef.encode(TableId::Field, 1).is_err());
    }
}
