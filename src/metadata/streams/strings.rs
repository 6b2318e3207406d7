//! String Heap (`#Strings`)
//!
//! Identifier strings (type, member and namespace names) stored as null-terminated UTF-8.
//!
//! # Reference
//! - [ECMA-335 II.24.2.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// View over the `#Strings` heap.
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the raw heap bytes.
    ///
    /// # Errors
    /// Returns an error if the heap is empty or does not start with the null entry.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #String heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get the string starting at `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is out of range or the string is not valid UTF-8.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        CStr::from_bytes_until_nul(&self.data[index..])
            .ok()
            .and_then(|result| result.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0x00,
            b'S', b'y', b's', b't', b'e', b'm', 0x00,
        ];

        let strings = Strings::from(&data).unwrap();

        assert_eq!(strings.get(0).unwrap(), "");
        assert_eq!(strings.get(1).unwrap(), "<Module>");
        assert_eq!(strings.get(10).unwrap(), "System");
        assert_eq!(strings.get(13).unwrap(), "tem");
        assert!(strings.get(17).is_err());
    }

    #[test]
    fn invalid_heap() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[0x41, 0x00]).is_err());
    }

    #[test]
    fn unterminated() {
        let data = [0x00, b'a', b'b'];
        let strings = Strings::from(&data).unwrap();
        assert!(strings.get(1).is_err());
    }
}
