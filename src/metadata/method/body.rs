//! Method body headers.
//!
//! A method body starts with either a 1-byte tiny header (code size < 64 bytes, no locals,
//! no exception handlers, max stack 8) or a 12-byte fat header. Fat bodies may be followed
//! by extra data sections holding the exception handling clauses.
//!
//! # Reference
//! - [ECMA-335 II.25.4](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::method::{ExceptionHandler, ExceptionHandlerFlags, MethodBodyFlags, SectionFlags},
    Error::OutOfBounds,
    Result,
};

/// A parsed method body: header fields, the IL code and exception clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Size of the header in bytes (1 for tiny, usually 12 for fat)
    pub size_header: usize,
    /// The IL instruction stream
    pub code: Vec<u8>,
    /// `StandAloneSig` token of the local variables, 0 if there are none
    pub local_var_sig_token: u32,
    /// Maximum evaluation stack depth
    pub max_stack: usize,
    /// Whether the body uses the fat header
    pub is_fat: bool,
    /// Whether locals are zero-initialized
    pub is_init_local: bool,
    /// Exception handling clauses
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Parse a method body starting at `data[0]`.
    ///
    /// # Errors
    /// Returns an error if `data` is empty, the header format is unknown or the code runs
    /// past the end of `data`.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        if data.is_empty() {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        }

        let first_byte = read_le::<u8>(data)?;
        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b_0000_0011_u8)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_header: 1,
                    code: data[1..=size_code].to_vec(),
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    exception_handlers: Vec::new(),
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = ((first_duo >> 12) * 4) as usize;
                let size_code = read_le::<u32>(&data[4..])? as usize;
                let Some(code_end) = size_header.checked_add(size_code) else {
                    return Err(OutOfBounds);
                };
                if size_header < 12 || data.len() < code_end {
                    return Err(OutOfBounds);
                }

                let flags_header =
                    MethodBodyFlags::from_bits_truncate(first_duo & 0b_0000_1111_1111_1111_u16);

                let exception_handlers = if flags_header.contains(MethodBodyFlags::MORE_SECTS) {
                    Self::read_sections(data, (code_end + 3) & !3)?
                } else {
                    Vec::new()
                };

                Ok(MethodBody {
                    size_header,
                    code: data[size_header..code_end].to_vec(),
                    local_var_sig_token: read_le::<u32>(&data[8..])?,
                    max_stack: read_le::<u16>(&data[2..])? as usize,
                    is_fat: true,
                    is_init_local: flags_header.contains(MethodBodyFlags::INIT_LOCALS),
                    exception_handlers,
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    fn read_sections(data: &[u8], mut cursor: usize) -> Result<Vec<ExceptionHandler>> {
        let mut exception_handlers = Vec::new();

        while data.len() > cursor + 4 {
            let section_flags = SectionFlags::from_bits_truncate(read_le::<u8>(&data[cursor..])?);
            if !section_flags.contains(SectionFlags::EHTABLE) {
                break;
            }

            let is_fat = section_flags.contains(SectionFlags::FAT_FORMAT);
            let section_size = if is_fat {
                (read_le::<u32>(&data[cursor..])? >> 8) as usize
            } else {
                read_le::<u8>(&data[cursor + 1..])? as usize
            };
            if section_size < 4 || data.len() < cursor + section_size {
                break;
            }

            let mut offset = cursor + 4;
            let clause_size = if is_fat { 24 } else { 12 };
            for _ in 0..(section_size - 4) / clause_size {
                let handler = if is_fat {
                    #[allow(clippy::cast_possible_truncation)]
                    let flags = read_le_at::<u32>(data, &mut offset)? as u16;
                    ExceptionHandler {
                        flags: ExceptionHandlerFlags::from_bits_truncate(flags),
                        try_offset: read_le_at::<u32>(data, &mut offset)?,
                        try_length: read_le_at::<u32>(data, &mut offset)?,
                        handler_offset: read_le_at::<u32>(data, &mut offset)?,
                        handler_length: read_le_at::<u32>(data, &mut offset)?,
                        class_token_or_filter: read_le_at::<u32>(data, &mut offset)?,
                    }
                } else {
                    ExceptionHandler {
                        flags: ExceptionHandlerFlags::from_bits_truncate(read_le_at::<u16>(
                            data,
                            &mut offset,
                        )?),
                        try_offset: u32::from(read_le_at::<u16>(data, &mut offset)?),
                        try_length: u32::from(read_le_at::<u8>(data, &mut offset)?),
                        handler_offset: u32::from(read_le_at::<u16>(data, &mut offset)?),
                        handler_length: u32::from(read_le_at::<u8>(data, &mut offset)?),
                        class_token_or_filter: read_le_at::<u32>(data, &mut offset)?,
                    }
                };
                exception_handlers.push(handler);
            }

            if !section_flags.contains(SectionFlags::MORE_SECTS) {
                break;
            }
            cursor = (cursor + section_size + 3) & !3;
        }

        Ok(exception_handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny() {
        // ldarg.0; ret
        let data = [0x0A, 0x02, 0x2A, 0xFF];
        let body = MethodBody::from(&data).unwrap();

        assert!(!body.is_fat);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.code, vec![0x02, 0x2A]);
        assert_eq!(body.max_stack, 8);
    }

    #[test]
    fn fat_with_exception_clause() {
        #[rustfmt::skip]
        let data = [
            0x1B, 0x30,             // flags: fat, more sects, init locals; size 3
            0x02, 0x00,             // max stack
            0x04, 0x00, 0x00, 0x00, // code size
            0x01, 0x00, 0x00, 0x11, // local var sig
            0x00, 0x00, 0x00, 0x2A, // code
            0x01, 0x10, 0x00, 0x00, // small EH section, 16 bytes
            0x02, 0x00,             // finally
            0x00, 0x00, 0x01,       // try 0 + 1
            0x01, 0x00, 0x02,       // handler 1 + 2
            0x00, 0x00, 0x00, 0x00, // class token
        ];

        let body = MethodBody::from(&data).unwrap();

        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert_eq!(body.max_stack, 2);
        assert_eq!(body.local_var_sig_token, 0x1100_0001);
        assert_eq!(body.code, vec![0x00, 0x00, 0x00, 0x2A]);
        assert_eq!(body.exception_handlers.len(), 1);

        let clause = &body.exception_handlers[0];
        assert!(clause.flags.contains(ExceptionHandlerFlags::FINALLY));
        assert_eq!(clause.try_length, 1);
        assert_eq!(clause.handler_offset, 1);
        assert_eq!(clause.handler_length, 2);
    }

    #[test]
    fn truncated() {
        assert!(MethodBody::from(&[]).is_err());
        assert!(MethodBody::from(&[0x12, 0x00]).is_err());
        assert!(MethodBody::from(&[0x03, 0x30, 0x08, 0x00, 0xFF, 0x00, 0x00, 0x00, 0, 0, 0, 0]).is_err());
    }
}
