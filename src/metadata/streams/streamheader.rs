//! Stream headers of the metadata root.
//!
//! Each header names one stream (`#~`, `#Strings`, `#Blob`, `#GUID`, `#Pdb`, ...) and gives
//! its offset and size relative to the start of the metadata root.

use crate::{file::io::read_le, Error::OutOfBounds, Result};

/// Maximum length of a stream name, excluding the terminator.
const MAX_NAME_LENGTH: usize = 32;

/// A single stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream, relative to the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream
    pub name: String,
}

impl StreamHeader {
    /// Parse a stream header from the start of `data`.
    ///
    /// Unknown stream names are accepted; the consumers look streams up by name and
    /// ignore whatever they do not understand.
    ///
    /// # Errors
    /// Returns an error if the header is truncated or the name is not terminated.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(OutOfBounds);
        }

        let name_bytes = &data[8..];
        let Some(terminator) = name_bytes
            .iter()
            .take(MAX_NAME_LENGTH + 1)
            .position(|byte| *byte == 0)
        else {
            return Err(malformed_error!("Stream header name is not terminated"));
        };

        let name = name_bytes[..terminator]
            .iter()
            .map(|byte| char::from(*byte))
            .collect::<String>();

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Number of bytes this header occupies, including the 4-byte aligned name.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x6C, 0x00, 0x00, 0x00,
            0xA4, 0x45, 0x00, 0x00,
            0x23, 0x7E, 0x00,
        ];

        let parsed_header = StreamHeader::from(&header_bytes).unwrap();

        assert_eq!(parsed_header.offset, 0x6C);
        assert_eq!(parsed_header.size, 0x45A4);
        assert_eq!(parsed_header.name, "#~");
        assert_eq!(parsed_header.encoded_len(), 12);
    }

    #[test]
    fn unterminated_name() {
        let mut header_bytes = vec![0x00; 8];
        header_bytes.extend_from_slice(&[b'A'; 40]);

        assert!(StreamHeader::from(&header_bytes).is_err());
    }
}
