//! CLI (COR20) header.
//!
//! The CLR runtime header is the entry point into the managed part of a PE image. It is
//! referenced by data directory 14 and tells us where the metadata root lives and which
//! method the runtime starts at.
//!
//! # Reference
//! - [ECMA-335 II.25.3.3](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{file::parser::Parser, metadata::token::Token, Error::OutOfBounds, Result};

/// The CLI header of a .NET assembly.
#[derive(Debug, Clone)]
pub struct Cor20Header {
    /// Size of the header in bytes, always 72
    pub cb: u32,
    /// Minimum runtime major version
    pub major_runtime_version: u16,
    /// Minimum runtime minor version
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata in bytes
    pub meta_data_size: u32,
    /// Runtime flags (`COMIMAGE_FLAGS_*`)
    pub flags: u32,
    /// Token of the entry point method, or 0
    pub entry_point_token: u32,
    /// RVA of embedded managed resources
    pub resource_rva: u32,
    /// Size of embedded managed resources
    pub resource_size: u32,
    /// RVA of the strong name signature
    pub strong_name_signature_rva: u32,
    /// Size of the strong name signature
    pub strong_name_signature_size: u32,
}

impl Cor20Header {
    /// Size of the header on disk.
    pub const SIZE: usize = 72;

    /// Parse the header from the start of `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is too short, if the size field is not 72 or if the
    /// metadata directory is empty.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < Self::SIZE {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb as usize != Self::SIZE {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        if meta_data_rva == 0 {
            return Err(malformed_error!("Metadata RVA cannot be zero"));
        }

        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_size == 0 {
            return Err(malformed_error!("Metadata size cannot be zero"));
        } else if meta_data_size > 0x1000_0000 {
            return Err(malformed_error!(
                "Metadata size {} exceeds reasonable limit (256MB)",
                meta_data_size
            ));
        }

        let flags = parser.read_le::<u32>()?;
        let entry_point_token = parser.read_le::<u32>()?;
        let resource_rva = parser.read_le::<u32>()?;
        let resource_size = parser.read_le::<u32>()?;
        let strong_name_signature_rva = parser.read_le::<u32>()?;
        let strong_name_signature_size = parser.read_le::<u32>()?;

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags,
            entry_point_token,
            resource_rva,
            resource_size,
            strong_name_signature_rva,
            strong_name_signature_size,
        })
    }

    /// The entry point as a token, if the image has a managed entry point.
    ///
    /// Native entry points (`COMIMAGE_FLAGS_NATIVE_ENTRYPOINT`) store an RVA instead and
    /// are not reported.
    #[must_use]
    pub fn entry_point(&self) -> Option<Token> {
        const NATIVE_ENTRYPOINT: u32 = 0x0000_0010;

        let token = Token::new(self.entry_point_token);
        if self.flags & NATIVE_ENTRYPOINT != 0 || token.is_null() {
            None
        } else {
            Some(token)
        }
    }
}
