//! Writing metadata heaps, tables and the metadata root.
//!
//! The portable PDB writer produces a complete metadata image of its own (`BSJB` root,
//! `#Pdb`, `#~` and the heaps), and the same building blocks lay out the metadata of
//! synthesised test assemblies. Heaps deduplicate their entries; the tables builder
//! derives the index widths from the final row counts and heap sizes with the same
//! [`TableInfo`] rules the reader uses.
//!
//! # Reference
//! - [ECMA-335 II.24.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::collections::{BTreeMap, HashMap};

use crate::{
    file::io::{pad_to, write_compressed_uint, write_le, write_le_dyn},
    metadata::{
        root::CIL_HEADER_MAGIC,
        tables::{Column, TableId, TableInfo},
    },
    Result,
};

/// Heaps at or above this size need 4-byte indexes.
const LARGE_HEAP: usize = 0x1_0000;

/// `#Strings` heap under construction.
#[derive(Debug)]
pub struct StringsBuilder {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for StringsBuilder {
    fn default() -> Self {
        StringsBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl StringsBuilder {
    /// Add `value` and return its index; the empty string is index 0.
    pub fn add(&mut self, value: &str) -> u32 {
        if value.is_empty() {
            return 0;
        }
        if let Some(index) = self.index.get(value) {
            return *index;
        }

        let index = self.data.len() as u32;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.index.insert(value.to_string(), index);
        index
    }

    /// The heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// `#Blob` heap under construction.
#[derive(Debug)]
pub struct BlobBuilder {
    data: Vec<u8>,
    index: HashMap<Vec<u8>, u32>,
}

impl Default for BlobBuilder {
    fn default() -> Self {
        BlobBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl BlobBuilder {
    /// Add `value` with its length prefix and return its index; the empty blob is index 0.
    ///
    /// # Errors
    /// Returns an error if the blob is too large for a compressed length.
    pub fn add(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(index) = self.index.get(value) {
            return Ok(*index);
        }

        let index = self.data.len() as u32;
        let length = u32::try_from(value.len())
            .map_err(|_| malformed_error!("Blob of {} bytes is too large", value.len()))?;
        write_compressed_uint(&mut self.data, length)?;
        self.data.extend_from_slice(value);
        self.index.insert(value.to_vec(), index);
        Ok(index)
    }

    /// The heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// `#GUID` heap under construction.
#[derive(Debug, Default)]
pub struct GuidBuilder {
    data: Vec<u8>,
}

impl GuidBuilder {
    /// Add `guid` and return its 1-based index.
    pub fn add(&mut self, guid: uguid::Guid) -> u32 {
        let bytes = guid.to_bytes();
        if let Some(position) = self.data.chunks_exact(16).position(|entry| entry == bytes) {
            return position as u32 + 1;
        }

        self.data.extend_from_slice(&bytes);
        (self.data.len() / 16) as u32
    }

    /// The heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// `#US` heap under construction.
#[derive(Debug)]
pub struct UserStringsBuilder {
    data: Vec<u8>,
}

impl Default for UserStringsBuilder {
    fn default() -> Self {
        UserStringsBuilder { data: vec![0] }
    }
}

impl UserStringsBuilder {
    /// Add a string literal and return its heap offset, the row of its `ldstr` token.
    ///
    /// # Errors
    /// Returns an error if the string is too long for a compressed length.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        let index = self.data.len() as u32;
        let units: Vec<u16> = value.encode_utf16().collect();
        let special = units
            .iter()
            .any(|unit| *unit >= 0x80 || matches!(*unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D));

        let length = u32::try_from(units.len() * 2 + 1)
            .map_err(|_| malformed_error!("User string of {} characters is too long", units.len()))?;
        write_compressed_uint(&mut self.data, length)?;
        for unit in units {
            write_le::<u16>(&mut self.data, unit);
        }
        self.data.push(u8::from(special));
        Ok(index)
    }

    /// The heap bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Rows of a `#~` stream under construction.
///
/// Every row is a list of raw column values in the order of [`TableId::columns`]: heap
/// offsets, row ids and already encoded coded indexes.
#[derive(Debug, Default)]
pub struct TablesBuilder {
    rows: BTreeMap<u8, (TableId, Vec<Vec<u32>>)>,
}

impl TablesBuilder {
    /// Append a row to `table` and return its row id.
    ///
    /// # Errors
    /// Returns an error if the number of values does not match the table layout.
    pub fn add_row(&mut self, table: TableId, values: Vec<u32>) -> Result<u32> {
        if values.len() != table.columns().len() {
            return Err(malformed_error!(
                "Table {:?} has {} columns, got {} values",
                table,
                table.columns().len(),
                values.len()
            ));
        }

        let (_, rows) = self
            .rows
            .entry(table as u8)
            .or_insert_with(|| (table, Vec::new()));
        rows.push(values);
        Ok(rows.len() as u32)
    }

    /// Number of rows added to `table`.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.rows
            .get(&(table as u8))
            .map_or(0, |(_, rows)| rows.len() as u32)
    }

    /// Lay out the stream.
    ///
    /// `external_rows` are row counts of tables that live in another metadata image but are
    /// referenced from these rows, as the type system tables are from a portable PDB; they
    /// only affect index widths. `sorted` is the `Sorted` mask to record.
    ///
    /// # Errors
    /// Returns an error if a value does not fit its column.
    pub fn build(
        &self,
        strings: &[u8],
        guids: &[u8],
        blobs: &[u8],
        external_rows: &[(TableId, u32)],
        sorted: u64,
    ) -> Result<Vec<u8>> {
        let heap_sizes = u8::from(strings.len() >= LARGE_HEAP)
            | u8::from(guids.len() >= LARGE_HEAP) << 1
            | u8::from(blobs.len() >= LARGE_HEAP) << 2;

        let mut row_counts = [0_u32; TableId::SLOTS];
        for (table, rows) in external_rows {
            row_counts[*table as usize] = *rows;
        }
        let mut valid = 0_u64;
        for (slot, (_, rows)) in &self.rows {
            row_counts[*slot as usize] = rows.len() as u32;
            valid |= 1 << slot;
        }
        let info = TableInfo::new(&row_counts, heap_sizes);

        let mut data = Vec::new();
        write_le::<u32>(&mut data, 0);
        write_le::<u8>(&mut data, 2);
        write_le::<u8>(&mut data, 0);
        write_le::<u8>(&mut data, heap_sizes);
        write_le::<u8>(&mut data, 1);
        write_le::<u64>(&mut data, valid);
        write_le::<u64>(&mut data, sorted & valid);
        for (_, rows) in self.rows.values() {
            write_le::<u32>(&mut data, rows.len() as u32);
        }

        for (table, rows) in self.rows.values() {
            for row in rows {
                for (column, value) in table.columns().iter().zip(row) {
                    match column {
                        Column::U16 => {
                            let value = u16::try_from(*value).map_err(|_| {
                                malformed_error!("Value {} does not fit a 2-byte column", value)
                            })?;
                            write_le::<u16>(&mut data, value);
                        }
                        Column::U32 => write_le::<u32>(&mut data, *value),
                        _ => write_le_dyn(&mut data, *value, info.column_size(*column) == 4)?,
                    }
                }
            }
        }

        pad_to(&mut data, 4);
        Ok(data)
    }
}

/// Lay out a metadata root (`BSJB`) followed by `streams`, in the given order.
///
/// # Errors
/// Returns an error if the image would exceed 4 GiB.
pub fn write_root(version: &str, streams: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let mut version_bytes = version.as_bytes().to_vec();
    version_bytes.push(0);
    pad_to(&mut version_bytes, 4);

    let mut header_size = 16 + version_bytes.len() + 4;
    for (name, _) in streams {
        header_size += 8 + (name.len() + 4) / 4 * 4;
    }

    let mut data = Vec::new();
    write_le::<u32>(&mut data, CIL_HEADER_MAGIC);
    write_le::<u16>(&mut data, 1);
    write_le::<u16>(&mut data, 1);
    write_le::<u32>(&mut data, 0);
    write_le::<u32>(&mut data, version_bytes.len() as u32);
    data.extend_from_slice(&version_bytes);
    write_le::<u16>(&mut data, 0);
    write_le::<u16>(&mut data, streams.len() as u16);

    let mut offset = header_size;
    for (name, stream) in streams {
        let size = (stream.len() + 3) / 4 * 4;
        let offset_value = u32::try_from(offset)
            .map_err(|_| malformed_error!("Metadata image is too large"))?;
        write_le::<u32>(&mut data, offset_value);
        write_le::<u32>(&mut data, size as u32);
        data.extend_from_slice(name.as_bytes());
        data.push(0);
        pad_to(&mut data, 4);
        offset += size;
    }

    for (_, stream) in streams {
        data.extend_from_slice(stream);
        pad_to(&mut data, 4);
    }

    Ok(data)
}
