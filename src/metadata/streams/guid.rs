//! GUID Heap (`#GUID`)
//!
//! A flat array of 16-byte GUIDs, addressed with 1-based indexes. Index 0 means "no GUID".
//!
//! # Reference
//! - [ECMA-335 II.24.2.5](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{Error::OutOfBounds, Result};

/// View over the `#GUID` heap.
pub struct Guid<'a> {
    data: &'a [u8],
}

impl<'a> Guid<'a> {
    /// Wrap the raw heap bytes. An empty heap is valid.
    ///
    /// # Errors
    /// Returns an error if the heap size is not a multiple of 16.
    pub fn from(data: &'a [u8]) -> Result<Guid<'a>> {
        if data.len() % 16 != 0 {
            return Err(malformed_error!(
                "Size of #GUID heap is not a multiple of 16 - {}",
                data.len()
            ));
        }

        Ok(Guid { data })
    }

    /// Get the GUID at the 1-based `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for index 0 or an index past the end.
    pub fn get(&self, index: usize) -> Result<uguid::Guid> {
        if index < 1 || index * 16 > self.data.len() {
            return Err(OutOfBounds);
        }

        let offset_start = (index - 1) * 16;

        let mut buffer = [0u8; 16];
        buffer.copy_from_slice(&self.data[offset_start..offset_start + 16]);

        Ok(uguid::Guid::from_bytes(buffer))
    }
}
