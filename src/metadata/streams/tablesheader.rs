//! The `#~` (and uncompressed `#-`) tables stream.
//!
//! The stream starts with a header carrying the heap size flags, a bit mask of present
//! tables and one row count per present table. The tables follow back to back in table
//! number order. [`TablesHeader`] records where each table starts so typed views can be
//! created on demand.
//!
//! # Reference
//! - [ECMA-335 II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use strum::IntoEnumIterator;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit announcing 4 extra bytes after the row counts.
const EXTRA_DATA: u8 = 0x40;

/// Parsed header of the tables stream.
pub struct TablesHeader<'a> {
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Bit mask of present tables
    pub valid: u64,
    /// Bit mask of sorted tables
    pub sorted: u64,
    /// Index sizing information
    pub info: TableInfo,
    data: &'a [u8],
    offsets: [Option<usize>; TableId::SLOTS],
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables stream.
    ///
    /// Tables with numbers this crate does not know are accepted as long as no known table
    /// is stored behind them, since their size cannot be computed.
    ///
    /// # Errors
    /// Returns an error if the header is truncated, no table is present, or a known table
    /// lies past the end of the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let mut row_counts = [0_u32; TableId::SLOTS];
        let mut offset = 24;
        for (slot, count) in row_counts.iter_mut().enumerate() {
            if valid & (1 << slot) != 0 {
                *count = read_le_at::<u32>(data, &mut offset)?;
            }
        }

        if heap_sizes & EXTRA_DATA != 0 {
            let _extra = read_le_at::<u32>(data, &mut offset)?;
        }

        let info = TableInfo::new(&row_counts, heap_sizes);

        let mut offsets = [None; TableId::SLOTS];
        let mut unknown_before: Option<usize> = None;
        for slot in 0..TableId::SLOTS {
            if valid & (1 << slot) == 0 {
                continue;
            }

            #[allow(clippy::cast_possible_truncation)]
            let Some(table_id) = TableId::from_u8(slot as u8) else {
                unknown_before.get_or_insert(slot);
                continue;
            };

            if let Some(unknown) = unknown_before {
                return Err(malformed_error!(
                    "Table 0x{:02x} follows unknown table 0x{:02x}",
                    slot,
                    unknown
                ));
            }

            let size = (row_counts[slot] as usize)
                .checked_mul(info.row_size(table_id))
                .ok_or(OutOfBounds)?;
            let end = offset.checked_add(size).ok_or(OutOfBounds)?;
            if end > data.len() {
                return Err(OutOfBounds);
            }

            offsets[slot] = Some(offset);
            offset = end;
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            data,
            offsets,
        })
    }

    /// Number of present tables.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Number of rows in `table_id`, 0 if the table is not present.
    #[must_use]
    pub fn row_count(&self, table_id: TableId) -> u32 {
        self.info.get(table_id).rows
    }

    /// Whether `table_id` is present.
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        self.valid & (1 << table_id as usize) != 0
    }

    /// Row counts of all present tables, in table order.
    #[must_use]
    pub fn table_summary(&self) -> Vec<(TableId, u32)> {
        TableId::iter()
            .filter(|id| self.has_table(*id))
            .map(|id| (id, self.row_count(id)))
            .collect()
    }

    /// Typed view over the table of `T`, or `None` if the table is not present.
    ///
    /// # Errors
    /// Returns an error if the table data is out of bounds.
    pub fn table<T: RowReadable>(&self) -> Result<Option<MetadataTable<'_, T>>> {
        let Some(offset) = self.offsets[T::TABLE as usize] else {
            return Ok(None);
        };

        MetadataTable::new(&self.data[offset..], self.row_count(T::TABLE), &self.info).map(Some)
    }
}
