//! User String Heap (`#US`) for .NET Metadata
//!
//! Holds the string literals loaded by `ldstr`. Each entry is a compressed byte length,
//! the UTF-16LE code units and one trailing flag byte telling whether the string contains
//! characters that need special handling.
//!
//! # Reference
//! - [ECMA-335 II.24.2.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#US` heap.
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wrap the heap data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the heap is empty or does not start with the
    /// empty entry.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(OutOfBounds);
        }

        Ok(UserStrings { data })
    }

    /// The string at byte offset `index`, as referenced by the low 24 bits of an `ldstr`
    /// token.
    ///
    /// # Errors
    /// Returns an error if the index or the entry length exceed the heap.
    pub fn get(&self, index: usize) -> Result<String> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let length = parser.read_compressed_uint()? as usize;
        let bytes = parser.read_bytes(length)?;

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(String::from_utf16_lossy(&units))
    }
}
