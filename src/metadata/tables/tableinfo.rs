//! Row counts and index widths of the metadata tables.
//!
//! [`TableInfo`] captures everything needed to size a row: how many rows each table has
//! (deciding 2 or 4 byte simple and coded indexes) and which heaps use wide indexes.

use strum::{EnumCount, IntoEnumIterator};

use crate::metadata::tables::{CodedIndexType, Column, TableId};

/// Row count of one table together with the derived index width.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows in the table
    pub rows: u32,
    /// Bits needed to address every row
    pub bits: u8,
    /// Whether simple indexes into this table are 4 bytes wide
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derive the index width for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Sizing information for all tables of one `#~` stream.
#[derive(Clone, Debug)]
pub struct TableInfo {
    rows: [TableRowInfo; TableId::SLOTS],
    coded_indexes: [u8; CodedIndexType::COUNT],
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Create the sizing information from per-table row counts and the `HeapSizes` flags.
    ///
    /// `row_counts` is indexed by table number. Slots of tables that are not present are 0.
    #[must_use]
    pub fn new(row_counts: &[u32; TableId::SLOTS], heap_sizes: u8) -> Self {
        let mut rows = [TableRowInfo::default(); TableId::SLOTS];
        for (slot, count) in rows.iter_mut().zip(row_counts.iter()) {
            *slot = TableRowInfo::new(*count);
        }

        let mut table_info = TableInfo {
            rows,
            coded_indexes: [0; CodedIndexType::COUNT],
            is_large_index_str: heap_sizes & 0x01 == 0x01,
            is_large_index_guid: heap_sizes & 0x02 == 0x02,
            is_large_index_blob: heap_sizes & 0x04 == 0x04,
        };

        table_info.calculate_coded_index_bits();
        table_info
    }

    #[cfg(test)]
    #[allow(missing_docs)]
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut row_counts = [0; TableId::SLOTS];
        for (id, rows) in valid_tables {
            row_counts[*id as usize] = *rows;
        }

        let heap_sizes = u8::from(large_str) | u8::from(large_guid) << 1 | u8::from(large_blob) << 2;
        TableInfo::new(&row_counts, heap_sizes)
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Whether simple indexes into `table` are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Whether `#Strings` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether `#GUID` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Whether `#Blob` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Whether coded indexes of `coded_index_type` are 4 bytes wide.
    #[must_use]
    pub fn is_large_coded(&self, coded_index_type: CodedIndexType) -> bool {
        self.coded_indexes[coded_index_type as usize] > 16
    }

    /// On-disk width of one column.
    #[must_use]
    pub fn column_size(&self, column: Column) -> usize {
        let is_large = match column {
            Column::U16 => return 2,
            Column::U32 => return 4,
            Column::Str => self.is_large_index_str,
            Column::Guid => self.is_large_index_guid,
            Column::Blob => self.is_large_index_blob,
            Column::Table(table) => self.is_large(table),
            Column::Coded(coded) => self.is_large_coded(coded),
        };

        if is_large {
            4
        } else {
            2
        }
    }

    /// On-disk size of one row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| self.column_size(*column))
            .sum()
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index_type in CodedIndexType::iter() {
            let max_bits = coded_index_type
                .tables()
                .iter()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[coded_index_type as usize] = max_bits + coded_index_type.tag_bits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_tables() {
        let info = TableInfo::new_test(
            &[(TableId::TypeDef, 3), (TableId::Field, 2), (TableId::MethodDef, 5)],
            false,
            false,
            false,
        );

        assert_eq!(info.row_size(TableId::Module), 10);
        assert_eq!(info.row_size(TableId::TypeDef), 14);
        assert_eq!(info.row_size(TableId::MethodDef), 14);
        assert_eq!(info.row_size(TableId::Document), 8);
        assert_eq!(info.row_size(TableId::MethodDebugInformation), 4);
    }

    #[test]
    fn wide_heaps_and_tables() {
        let info = TableInfo::new_test(&[(TableId::Field, 0x1_0000)], true, true, true);

        assert!(info.is_large(TableId::Field));
        assert!(!info.is_large(TableId::MethodDef));
        // flags + 2 x str + TypeDefOrRef + field + method
        assert_eq!(info.row_size(TableId::TypeDef), 4 + 8 + 2 + 4 + 2);
        assert_eq!(info.row_size(TableId::Field), 2 + 4 + 4);
    }

    #[test]
    fn coded_index_boundary() {
        // TypeDefOrRef has 2 tag bits, so 2^14 - 1 rows still fit into 2 bytes
        let info = TableInfo::new_test(&[(TableId::TypeRef, 0x3FFF)], false, false, false);
        assert!(!info.is_large_coded(CodedIndexType::TypeDefOrRef));

        let info = TableInfo::new_test(&[(TableId::TypeRef, 0x4000)], false, false, false);
        assert!(info.is_large_coded(CodedIndexType::TypeDefOrRef));
    }
}
