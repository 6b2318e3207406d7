//! Metadata tables.
//!
//! This module describes the table layouts ([`TableId`], [`Column`]), the index sizing
//! rules ([`TableInfo`], [`CodedIndexType`]) and the typed raw rows of the tables that the
//! type system and the symbol reader consume. [`MetadataTable`] gives typed, bounds-checked
//! access to the rows of one table inside a `#~` stream.
//!
//! # Reference
//! - [ECMA-335 II.22 and II.24.2.6](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod codedindex;
mod rows;
mod tableid;
mod tableinfo;

use std::marker::PhantomData;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use rows::*;
pub use tableid::{Column, TableId};
pub use tableinfo::{TableInfo, TableRowInfo};

use crate::{Error::OutOfBounds, Result};

/// Typed view over the rows of one table.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: usize,
    sizes: &'a TableInfo,
    _row: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view over `data`, which must hold exactly `row_count` rows.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too small for the rows.
    pub fn new(data: &'a [u8], row_count: u32, sizes: &'a TableInfo) -> Result<Self> {
        let row_size = sizes.row_size(T::TABLE);
        let needed = (row_count as usize)
            .checked_mul(row_size)
            .ok_or(OutOfBounds)?;
        if needed > data.len() {
            return Err(OutOfBounds);
        }

        Ok(MetadataTable {
            data: &data[..needed],
            row_count,
            row_size,
            sizes,
            _row: PhantomData,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Read the row with the 1-based id `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for row 0 or a row past the end.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(OutOfBounds);
        }

        let mut offset = (rid as usize - 1) * self.row_size;
        T::row_read(self.data, &mut offset, rid, self.sizes)
    }

    /// Iterate all rows in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count).map(|rid| self.get(rid))
    }
}
