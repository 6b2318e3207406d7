//! Buffered backend.
//!
//! Inputs that cannot be mapped, such as pipes and process substitutions (`<(...)`), are
//! read completely into a [`Buffer`]. Synthesised images in tests use it as well.

use std::io::Read;

use super::Backend;
use crate::Result;

/// An image held in an owned byte buffer.
#[derive(Debug)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    /// Wrap bytes that are already in memory.
    pub fn new(bytes: Vec<u8>) -> Buffer {
        Buffer { bytes }
    }

    /// Drain `reader` to its end.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if reading fails.
    pub fn read_from(mut reader: impl Read) -> Result<Buffer> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Buffer { bytes })
    }
}

impl Backend for Buffer {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.bytes.get(offset..end))
            .ok_or_else(|| out_of_bounds_error!())
    }

    fn data(&self) -> &[u8] {
        &self.bytes
    }

    fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn drains_reader() {
        let mut image = vec![0_u8; 600];
        image[..2].copy_from_slice(b"MZ");
        image[512..516].fill(0xAB);

        let buffer = Buffer::read_from(Cursor::new(image)).unwrap();
        assert_eq!(buffer.len(), 600);
        assert_eq!(buffer.data_slice(0, 2).unwrap(), b"MZ");
        assert_eq!(buffer.data_slice(512, 4).unwrap(), &[0xAB; 4]);
        assert!(buffer.data_slice(599, 2).is_err());
        assert!(buffer.data_slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn empty() {
        let buffer = Buffer::new(Vec::new());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.data_slice(0, 0).unwrap().is_empty());
        assert!(buffer.data_slice(0, 1).is_err());
    }
}
