//! The metadata root (`BSJB` header).
//!
//! The root sits at the metadata RVA of the CLI header (or at the start of a portable PDB
//! file) and lists the streams that follow it.
//!
//! # Reference
//! - [ECMA-335 II.24.2.1](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Magic value of the metadata root, `BSJB` in little endian.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Upper bound on stream headers; real files carry at most six.
const MAX_STREAMS: u16 = 16;

/// The metadata root header and its stream directory.
#[derive(Debug, Clone)]
pub struct Root {
    /// Magic signature, [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319` or `PDB v1.0`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root at the start of `data`.
    ///
    /// # Errors
    /// Returns an error if the signature does not match, the header is truncated or a
    /// stream lies outside of `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - 0x{:08x}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version = data[16..version_end]
            .iter()
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect::<String>();

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count > MAX_STREAMS {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if offset >= data.len() {
                return Err(OutOfBounds);
            }

            let stream = StreamHeader::from(&data[offset..])?;
            match stream.offset.checked_add(stream.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        stream.offset,
                        stream.size
                    ))
                }
            }

            offset += stream.encoded_len();
            stream_headers.push(stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// Find a stream by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }

    /// The bytes of stream `name` within `data`, the slice [`Root::read`] parsed.
    #[must_use]
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Option<&'a [u8]> {
        let stream = self.stream(name)?;
        let start = stream.offset as usize;
        data.get(start..start + stream.size as usize)
    }

    /// The tables stream, which is either `#~` or the uncompressed `#-`.
    #[must_use]
    pub fn tables_data<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        self.stream_data(data, "#~")
            .or_else(|| self.stream_data(data, "#-"))
    }
}
