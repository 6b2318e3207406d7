//! Cursor-based parser for blob-encoded metadata.
//!
//! [`Parser`] walks a byte slice the way ECMA-335 signature blobs, custom attribute blobs
//! and portable PDB sequence-point blobs are laid out: a mix of fixed-width little-endian
//! values, compressed integers and compressed type tokens. Every read is bounds-checked.

use crate::{
    file::io::{read_le_at, CilIO},
    metadata::token::Token,
    Result,
};

/// A bounds-checked read cursor over a byte slice.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Current read position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Move the cursor to `pos`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Look at the next byte without consuming it.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Read a little-endian value.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read an ECMA-335 compressed unsigned integer (II.23.2).
    ///
    /// # Errors
    /// Returns an error for truncated data or an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            let value = ((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte);
            return Ok(value);
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            let value = ((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3;
            return Ok(value);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read an ECMA-335 compressed signed integer.
    ///
    /// The sign is stored in the lowest bit of the rotated value; the width of the
    /// encoding decides where the sign extension starts.
    ///
    /// # Errors
    /// Returns an error for truncated data or an invalid leading byte.
    pub fn read_compressed_int(&mut self) -> Result<i32> {
        let start = self.position;
        let unsigned = self.read_compressed_uint()?;
        let width = self.position - start;

        let negative = unsigned & 1 == 1;
        let magnitude = unsigned >> 1;

        #[allow(clippy::cast_possible_wrap)]
        let signed = if negative {
            let sign_bits: u32 = match width {
                1 => 0xFFFF_FFC0,
                2 => 0xFFFF_E000,
                _ => 0xF000_0000,
            };
            (magnitude | sign_bits) as i32
        } else {
            magnitude as i32
        };

        Ok(signed)
    }

    /// Read a compressed `TypeDefOrRefOrSpecEncoded` token.
    ///
    /// # Errors
    /// Returns an error for truncated data or an invalid table tag.
    pub fn read_compressed_token(&mut self) -> Result<Token> {
        let compressed_token = self.read_compressed_uint()?;

        let table: u32 = match compressed_token & 0x3 {
            0x0 => 0x0200_0000, // TypeDef
            0x1 => 0x0100_0000, // TypeRef
            0x2 => 0x1B00_0000, // TypeSpec
            _ => {
                return Err(malformed_error!(
                    "Invalid compressed token - {}",
                    compressed_token
                ))
            }
        };

        let table_index = compressed_token >> 2;

        Ok(Token::new(table + table_index))
    }

    /// Read `length` raw bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(length)
            .ok_or(out_of_bounds_error!())?;

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a compressed-length-prefixed UTF-8 string, as used in custom attribute blobs.
    ///
    /// A leading `0xFF` encodes a null string and yields `None`.
    ///
    /// # Errors
    /// Returns an error for truncated data or invalid UTF-8.
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.peek_byte()? == 0xFF {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let start = self.position;
        let bytes = self.read_bytes(length)?;

        String::from_utf8(bytes.to_vec()).map(Some).map_err(|e| {
            malformed_error!(
                "Invalid UTF-8 string at offset {}-{}: {}",
                start,
                start + length,
                e.utf8_error()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_uint() {
        #[rustfmt::skip]
        let data = [
            0x03,
            0x7F,
            0x80, 0x80,
            0xAE, 0x57,
            0xBF, 0xFF,
            0xC0, 0x00, 0x40, 0x00,
            0xDF, 0xFF, 0xFF, 0xFF,
        ];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_compressed_uint().unwrap(), 0x03);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x7F);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x80);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x2E57);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x3FFF);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x4000);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x1FFF_FFFF);
        assert!(!parser.has_more_data());
    }

    #[test]
    fn compressed_int() {
        // Samples from ECMA-335 II.23.2
        #[rustfmt::skip]
        let data = [
            0x06,
            0x7B,
            0x80, 0x80,
            0x01,
            0xC0, 0x00, 0x40, 0x00,
            0x80, 0x01,
            0xDF, 0xFF, 0xFF, 0xFE,
            0xC0, 0x00, 0x00, 0x01,
        ];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_compressed_int().unwrap(), 3);
        assert_eq!(parser.read_compressed_int().unwrap(), -3);
        assert_eq!(parser.read_compressed_int().unwrap(), 64);
        assert_eq!(parser.read_compressed_int().unwrap(), -64);
        assert_eq!(parser.read_compressed_int().unwrap(), 8192);
        assert_eq!(parser.read_compressed_int().unwrap(), -8192);
        assert_eq!(parser.read_compressed_int().unwrap(), 268_435_455);
        assert_eq!(parser.read_compressed_int().unwrap(), -268_435_456);
    }

    #[test]
    fn compressed_token() {
        let data = [0x49, 0x0A];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_compressed_token().unwrap().value(), 0x0100_0012);
        assert_eq!(parser.read_compressed_token().unwrap().value(), 0x1B00_0002);
    }

    #[test]
    fn ser_string() {
        let data = [0x03, b'a', b'b', b'c', 0xFF, 0x05, b'x'];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_ser_string().unwrap().as_deref(), Some("abc"));
        assert_eq!(parser.read_ser_string().unwrap(), None);
        assert!(parser.read_ser_string().is_err());
    }
}
