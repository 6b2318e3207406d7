//! Endian-aware, bounds-checked reading and writing of primitive values.
//!
//! Everything that decodes PE headers, metadata heaps or metadata tables goes through the
//! helpers in this module. Reads never panic on short input: they return
//! [`crate::Error::OutOfBounds`] instead, which lets malformed assemblies surface as
//! ordinary errors at the command layer.
//!
//! The writing side appends to a growing `Vec<u8>`, which is what the portable PDB writer
//! and the test assembly builder need.
//!
//! # Examples
//!
//! ```rust,ignore
//! use ildecomp::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;
//! let second: u16 = read_le_at(&data, &mut offset)?;
//! let third: u32 = read_le_at(&data, &mut offset)?;
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! assert_eq!(offset, 8);
//! # Ok::<(), ildecomp::Error>(())
//! ```

use crate::{Error::OutOfBounds, Result};

/// Trait for primitive types that can be decoded from and encoded to raw bytes.
pub trait CilIO: Sized + Copy {
    /// Byte array representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Encode into little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
}

macro_rules! impl_cilio {
    ($($ty:ty => $len:expr),* $(,)?) => {
        $(
            impl CilIO for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }
            }
        )*
    };
}

impl_cilio!(
    u8 => 1, i8 => 1, u16 => 2, i16 => 2, u32 => 4, i32 => 4, u64 => 8, i64 => 8, f32 => 4, f64 => 8,
);

/// Read a little-endian value from the start of `data`.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `T`.
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Read a little-endian value at `offset` and advance `offset` past it.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of `data`.
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Read either a 2 or a 4 byte little-endian index, depending on `is_large`.
///
/// Metadata heap and table indexes are stored in 2 bytes unless the referenced heap or
/// table is too big, in which case they widen to 4 bytes.
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would cross the end of `data`.
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Append a little-endian value to `buffer`.
pub fn write_le<T: CilIO>(buffer: &mut Vec<u8>, value: T) {
    buffer.extend_from_slice(value.to_le_bytes().as_ref());
}

/// Append a 2 or 4 byte index, the counterpart of [`read_le_at_dyn`].
///
/// # Errors
/// Returns a malformed error when a small index is requested for a value above `u16::MAX`.
pub fn write_le_dyn(buffer: &mut Vec<u8>, value: u32, is_large: bool) -> Result<()> {
    if is_large {
        write_le::<u32>(buffer, value);
    } else {
        let small = u16::try_from(value)
            .map_err(|_| malformed_error!("Index {} does not fit a small index", value))?;
        write_le::<u16>(buffer, small);
    }

    Ok(())
}

/// Append an ECMA-335 compressed unsigned integer (II.23.2).
///
/// # Errors
/// Returns a malformed error for values above `0x1FFF_FFFF`, which have no encoding.
pub fn write_compressed_uint(buffer: &mut Vec<u8>, value: u32) -> Result<()> {
    #[allow(clippy::cast_possible_truncation)]
    match value {
        0..=0x7F => buffer.push(value as u8),
        0x80..=0x3FFF => {
            buffer.push(((value >> 8) as u8) | 0x80);
            buffer.push(value as u8);
        }
        0x4000..=0x1FFF_FFFF => {
            buffer.push(((value >> 24) as u8) | 0xC0);
            buffer.push((value >> 16) as u8);
            buffer.push((value >> 8) as u8);
            buffer.push(value as u8);
        }
        _ => {
            return Err(malformed_error!(
                "Value {} is too large for a compressed integer",
                value
            ))
        }
    }

    Ok(())
}

/// Append an ECMA-335 compressed signed integer (II.23.2), the counterpart of
/// [`crate::file::parser::Parser::read_compressed_int`].
///
/// # Errors
/// Returns a malformed error for values outside the 29-bit signed range.
pub fn write_compressed_int(buffer: &mut Vec<u8>, value: i32) -> Result<()> {
    let sign = u32::from(value < 0);

    #[allow(clippy::cast_sign_loss)]
    let bits = value as u32;

    // The width follows the value range, not the rotated value.
    #[allow(clippy::cast_possible_truncation)]
    match value {
        -0x40..=0x3F => buffer.push((((bits & 0x3F) << 1) | sign) as u8),
        -0x2000..=0x1FFF => {
            let encoded = ((bits & 0x1FFF) << 1) | sign;
            buffer.push(((encoded >> 8) as u8) | 0x80);
            buffer.push(encoded as u8);
        }
        -0x1000_0000..=0x0FFF_FFFF => {
            let encoded = ((bits & 0x0FFF_FFFF) << 1) | sign;
            buffer.push(((encoded >> 24) as u8) | 0xC0);
            buffer.push((encoded >> 16) as u8);
            buffer.push((encoded >> 8) as u8);
            buffer.push(encoded as u8);
        }
        _ => {
            return Err(malformed_error!(
                "Value {} is out of range for a compressed signed integer",
                value
            ))
        }
    }

    Ok(())
}

/// Pad `buffer` with zero bytes until its length is a multiple of `alignment`.
pub fn pad_to(buffer: &mut Vec<u8>, alignment: usize) {
    while buffer.len() % alignment != 0 {
        buffer.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_sequential() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00, 0xFF];
        let mut offset = 0;

        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 1);
        assert_eq!(read_le_at::<u16>(&data, &mut offset).unwrap(), 2);
        assert_eq!(read_le_at::<u32>(&data, &mut offset).unwrap(), 3);
        assert_eq!(read_le_at::<i8>(&data, &mut offset).unwrap(), -1);
        assert_eq!(offset, 9);

        assert!(matches!(
            read_le_at::<u8>(&data, &mut offset),
            Err(OutOfBounds)
        ));
    }

    #[test]
    fn read_overflowing_offset() {
        let data = [0x00; 4];
        let mut offset = usize::MAX;
        assert!(read_le_at::<u32>(&data, &mut offset).is_err());
    }

    #[test]
    fn read_dyn() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut offset = 0;
        assert_eq!(read_le_at_dyn(&data, &mut offset, false).unwrap(), 0x1234);
        assert_eq!(read_le_at_dyn(&data, &mut offset, true).unwrap(), 0x1234_5678);
    }

    #[test]
    fn write_dyn_rejects_truncation() {
        let mut buffer = Vec::new();
        write_le_dyn(&mut buffer, 0x1_0000, true).unwrap();
        assert_eq!(buffer, [0x00, 0x00, 0x01, 0x00]);
        assert!(write_le_dyn(&mut buffer, 0x1_0000, false).is_err());
    }

    #[test]
    fn compressed_uint_encodings() {
        let mut buffer = Vec::new();
        write_compressed_uint(&mut buffer, 0x03).unwrap();
        write_compressed_uint(&mut buffer, 0x80).unwrap();
        write_compressed_uint(&mut buffer, 0x4000).unwrap();

        #[rustfmt::skip]
        assert_eq!(buffer, [
            0x03,
            0x80, 0x80,
            0xC0, 0x00, 0x40, 0x00,
        ]);

        assert!(write_compressed_uint(&mut buffer, 0x2000_0000).is_err());
    }

    #[test]
    fn compressed_int_roundtrip_boundaries() {
        use crate::file::parser::Parser;

        for value in [0, 3, -1, 63, -64, 64, -65, 8191, -8192, 8192, -8193, 0x0FFF_FFFF] {
            let mut buffer = Vec::new();
            write_compressed_int(&mut buffer, value).unwrap();
            assert_eq!(Parser::new(&buffer).read_compressed_int().unwrap(), value);
        }

        let mut buffer = Vec::new();
        write_compressed_int(&mut buffer, -1).unwrap();
        write_compressed_int(&mut buffer, -8192).unwrap();
        assert_eq!(buffer, vec![0x7F, 0x80, 0x01]);
        assert!(write_compressed_int(&mut buffer, 0x1000_0000).is_err());
    }
}
