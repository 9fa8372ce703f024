//! Byte-reinterpretation helpers for decoded sample buffers.
//!
//! Tile/strip data is decoded into a flat `Vec<u8>`; these casts reinterpret
//! that buffer as the wider integer or float slices pixel math needs,
//! respecting the reader's recorded byte order.

use crate::error::{InvalidFileReason, TiffError, TiffResult};

fn check_alignment<T>(bytes: &[u8]) -> TiffResult<()> {
    let width = std::mem::size_of::<T>();
    if bytes.len() % width != 0 {
        return Err(TiffError::InvalidFile(InvalidFileReason::InconsistentSizes));
    }
    Ok(())
}

macro_rules! cast_fn {
    ($name:ident, $t:ty, $from_le:ident, $from_be:ident, $width:expr) => {
        pub fn $name(bytes: &[u8], little_endian: bool) -> TiffResult<Vec<$t>> {
            check_alignment::<$t>(bytes)?;
            Ok(bytes
                .chunks_exact($width)
                .map(|chunk| {
                    let arr: [u8; $width] = chunk.try_into().unwrap();
                    if little_endian {
                        <$t>::from_le_bytes(arr)
                    } else {
                        <$t>::from_be_bytes(arr)
                    }
                })
                .collect())
        }
    };
}

cast_fn!(u16_vec, u16, from_le_bytes, from_be_bytes, 2);
cast_fn!(i16_vec, i16, from_le_bytes, from_be_bytes, 2);
cast_fn!(u32_vec, u32, from_le_bytes, from_be_bytes, 4);
cast_fn!(i32_vec, i32, from_le_bytes, from_be_bytes, 4);
cast_fn!(u64_vec, u64, from_le_bytes, from_be_bytes, 8);
cast_fn!(i64_vec, i64, from_le_bytes, from_be_bytes, 8);
cast_fn!(f32_vec, f32, from_le_bytes, from_be_bytes, 4);
cast_fn!(f64_vec, f64, from_le_bytes, from_be_bytes, 8);

/// Reinterprets a native-endian `&[T]` as raw bytes without copying.
pub fn as_bytes<T>(data: &[T]) -> &[u8] {
    let len = std::mem::size_of_val(data);
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, len) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u16_little_endian_round_trip() {
        let bytes = [0x34, 0x12, 0xCD, 0xAB];
        let out = u16_vec(&bytes, true).unwrap();
        assert_eq!(out, vec![0x1234, 0xABCD]);
    }

    #[test]
    fn u32_big_endian_round_trip() {
        let bytes = [0x00, 0x00, 0x01, 0x00];
        let out = u32_vec(&bytes, false).unwrap();
        assert_eq!(out, vec![256]);
    }

    #[test]
    fn misaligned_buffer_is_rejected() {
        let bytes = [0u8; 3];
        assert!(u16_vec(&bytes, true).is_err());
    }
}
