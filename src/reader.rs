//! The TIFF reader (`C6`): header + IFD chain parsing, random tile reads,
//! and region assembly.

use std::collections::HashSet;
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, instrument};

use crate::bytecast;
use crate::codec::{CodecOptions, CodecRegistry};
use crate::error::{InvalidFileReason, TiffError, TiffResult};
use crate::ifd::{Ifd, SampleType, Value};
use crate::predictor;
use crate::tags::{FillOrder, Predictor, Tag, Type};

/// A random-access TIFF reader over a seekable byte stream.
///
/// Sharing a reader across threads for concurrent reads is only valid once
/// every IFD has been materialized (the chain fully walked at construction
/// time); otherwise callers must serialize externally — this crate leaves
/// that serialization to `parking_lot::RwLock` at the call site (the
/// pyramid source and scan planner hold it).
pub struct TiffReader<R> {
    inner: R,
    little_endian: bool,
    big_tiff: bool,
    ifds: Vec<Ifd>,
    /// The reader-wide fill byte used for unreadable/missing tiles; 0 by
    /// default, 0xF0 for the SVS driver.
    pub filler: u8,
    codecs: CodecRegistry,
}

impl<R: Read + Seek> TiffReader<R> {
    pub fn new(mut inner: R) -> TiffResult<Self> {
        let (little_endian, big_tiff, first_ifd_offset) = read_header(&mut inner)?;
        let mut reader = TiffReader {
            inner,
            little_endian,
            big_tiff,
            ifds: Vec::new(),
            filler: 0,
            codecs: CodecRegistry::with_defaults(),
        };
        reader.walk_ifd_chain(first_ifd_offset)?;
        Ok(reader)
    }

    pub fn with_filler(mut self, filler: u8) -> Self {
        self.filler = filler;
        self
    }

    pub fn ifds(&self) -> &[Ifd] {
        &self.ifds
    }

    pub fn ifd(&self, index: usize) -> TiffResult<&Ifd> {
        self.ifds
            .get(index)
            .ok_or_else(|| TiffError::InvalidFile(InvalidFileReason::ImageFileDirectoryNotFound))
    }

    #[instrument(skip(self), fields(big_tiff = self.big_tiff))]
    fn walk_ifd_chain(&mut self, first_offset: u64) -> TiffResult<()> {
        let mut visited = HashSet::new();
        let mut offset = first_offset;
        while offset != 0 {
            if !visited.insert(offset) {
                return Err(TiffError::InvalidFile(InvalidFileReason::CycleInOffsets));
            }
            let (ifd, next_offset) = self.read_ifd_at(offset)?;
            debug!(offset, entries = ifd.serialized_entries().count(), "read IFD");
            self.ifds.push(ifd);
            offset = next_offset;
        }
        Ok(())
    }

    fn read_ifd_at(&mut self, offset: u64) -> TiffResult<(Ifd, u64)> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let n_entries = if self.big_tiff {
            self.read_u64()?
        } else {
            self.read_u16()? as u64
        };

        let mut ifd = Ifd::new(self.little_endian, self.big_tiff);
        let file_len = {
            let pos = self.inner.stream_position()?;
            let len = self.inner.seek(SeekFrom::End(0))?;
            self.inner.seek(SeekFrom::Start(pos))?;
            len
        };

        for _ in 0..n_entries {
            if let Some((tag, value)) = self.read_entry(file_len)? {
                ifd.put_raw(tag, value);
            }
        }

        let next_offset = if self.big_tiff {
            self.read_u64()?
        } else {
            self.read_u32()? as u64
        };

        Ok((ifd, next_offset))
    }

    fn read_entry(&mut self, file_len: u64) -> TiffResult<Option<(u16, Value)>> {
        let tag = self.read_u16()?;
        let type_raw = self.read_u16()?;
        let ty = match Type::from_u16(type_raw) {
            Some(ty) => ty,
            None => {
                // Unrecognized type: skip the count and inline/offset field,
                // but do not fail the whole IFD (extensions invent new types).
                if self.big_tiff {
                    self.read_u64()?;
                    self.read_u64()?;
                } else {
                    self.read_u32()?;
                    self.read_u32()?;
                }
                return Ok(None);
            }
        };

        let mut count = if self.big_tiff {
            self.read_u64()?
        } else {
            self.read_u32()? as u64
        };

        let elem_size = ty.size() as u64;
        let inline_capacity = if self.big_tiff { 8 } else { 4 };
        let payload_len = count.saturating_mul(elem_size);

        let value = if payload_len <= inline_capacity {
            let inline = self.read_inline_bytes(inline_capacity as usize)?;
            decode_value(ty, &inline[..payload_len as usize], self.little_endian)?
        } else {
            let value_offset = if self.big_tiff {
                self.read_u64()?
            } else {
                self.read_u32()? as u64
            };
            if value_offset >= file_len {
                return Err(TiffError::InvalidFile(
                    InvalidFileReason::TruncatedTagPayload { tag },
                ));
            }
            let available = file_len - value_offset;
            if payload_len > available {
                count = available / elem_size.max(1);
            }
            let clamped_len = (count * elem_size) as usize;
            let save = self.inner.stream_position()?;
            self.inner.seek(SeekFrom::Start(value_offset))?;
            let mut buf = vec![0u8; clamped_len];
            self.inner.read_exact(&mut buf)?;
            self.inner.seek(SeekFrom::Start(save))?;
            decode_value(ty, &buf, self.little_endian)?
        };

        Ok(Some((tag, value)))
    }

    fn read_inline_bytes(&mut self, n: usize) -> TiffResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_u16(&mut self) -> TiffResult<u16> {
        let mut buf = [0u8; 2];
        self.inner.read_exact(&mut buf)?;
        Ok(if self.little_endian {
            u16::from_le_bytes(buf)
        } else {
            u16::from_be_bytes(buf)
        })
    }

    fn read_u32(&mut self) -> TiffResult<u32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(if self.little_endian {
            u32::from_le_bytes(buf)
        } else {
            u32::from_be_bytes(buf)
        })
    }

    fn read_u64(&mut self) -> TiffResult<u64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(if self.little_endian {
            u64::from_le_bytes(buf)
        } else {
            u64::from_be_bytes(buf)
        })
    }

    /// Reads and fully decodes tile `(plane, tx, ty)` of `ifd_index`,
    /// applying predictor reversal, fill-order inversion, and narrow-float
    /// unpacking in that order.
    #[instrument(skip(self))]
    pub fn read_tile(&mut self, ifd_index: usize, plane: u32, tx: u32, ty: u32) -> TiffResult<Vec<u8>> {
        let ifd = self.ifd(ifd_index)?.clone();
        let tiles_per_row = ifd.tiles_per_row()?;
        let tile_index = (plane * ifd.tiles_per_column()? + ty) * tiles_per_row + tx;

        let offsets = ifd.tile_offsets()?;
        let byte_counts = ifd.tile_byte_counts()?;
        let idx = tile_index as usize;
        let (offset, length) = (
            offsets.get(idx).copied().unwrap_or(0),
            byte_counts.get(idx).copied().unwrap_or(0),
        );

        let tile_w = ifd.tile_size_x()?;
        let tile_h = ifd.tile_size_y()?;
        let bytes_per_sample = ifd.bytes_per_sample_by_bits();
        let channels = if ifd.is_planar_separated() {
            1
        } else {
            ifd.samples_per_pixel()
        };
        let filler_len = (tile_w * tile_h * channels * bytes_per_sample) as usize;

        let file_len = {
            let pos = self.inner.stream_position()?;
            let len = self.inner.seek(SeekFrom::End(0))?;
            self.inner.seek(SeekFrom::Start(pos))?;
            len
        };

        if length == 0 || offset >= file_len {
            return Ok(vec![self.filler; filler_len]);
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut encoded = vec![0u8; length as usize];
        self.inner.read_exact(&mut encoded)?;

        #[cfg(feature = "jpeg")]
        if ifd.compression() == crate::tags::CompressionMethod::JPEG {
            if let Some(tables) = ifd.get(Tag::JPEGTables) {
                if let Value::Undefined(table_bytes) = tables {
                    encoded = crate::codec::splice_jpeg_tables(table_bytes, &encoded);
                }
            }
        }

        let opts = CodecOptions::from_ifd(&ifd)?;
        let codec = self.codecs.get(ifd.compression().to_u16())?;
        let mut decoded = codec.decode(&encoded, &opts)?;

        predictor::undo_predictor(
            ifd.predictor(),
            &mut decoded,
            tile_w as usize,
            channels as usize,
            bytes_per_sample as usize,
        );

        predictor::invert_fill_order(ifd.fill_order(), &mut decoded);

        if matches!(ifd.sample_type()?, SampleType::F16 | SampleType::F24) {
            decoded = unpack_narrow_floats(&decoded, ifd.sample_type()?)?;
        }

        Ok(decoded)
    }

    /// Assembles an arbitrary axis-aligned region by copying from every
    /// intersecting tile across all planes.
    pub fn read_region(
        &mut self,
        ifd_index: usize,
        from_x: u32,
        from_y: u32,
        size_x: u32,
        size_y: u32,
    ) -> TiffResult<Vec<u8>> {
        if (from_x as u64) + (size_x as u64) > 1u64 << 31 || (from_y as u64) + (size_y as u64) > 1u64 << 31 {
            return Err(TiffError::InvalidArgument(
                "region exceeds the 31-bit coordinate ceiling".into(),
            ));
        }
        let ifd = self.ifd(ifd_index)?.clone();
        let tile_w = ifd.tile_size_x()?;
        let tile_h = ifd.tile_size_y()?;
        let channels = ifd.samples_per_pixel();
        let bytes_per_sample = ifd.bytes_per_sample_by_bits();
        let row_stride = size_x as usize * channels as usize * bytes_per_sample as usize;
        let mut out = vec![self.filler; row_stride * size_y as usize];

        let first_tx = from_x / tile_w;
        let last_tx = (from_x + size_x - 1) / tile_w;
        let first_ty = from_y / tile_h;
        let last_ty = (from_y + size_y - 1) / tile_h;
        let planes = ifd.planes();

        for plane in 0..planes {
            for ty in first_ty..=last_ty {
                for tx in first_tx..=last_tx {
                    let tile_data = self.read_tile(ifd_index, plane, tx, ty)?;
                    let tile_x0 = tx * tile_w;
                    let tile_y0 = ty * tile_h;
                    let inside_x = from_x.max(tile_x0) - tile_x0;
                    let inside_y = from_y.max(tile_y0) - tile_y0;
                    let part_w = (from_x + size_x).min(tile_x0 + tile_w) - tile_x0.max(from_x);
                    let part_h = (from_y + size_y).min(tile_y0 + tile_h) - tile_y0.max(from_y);
                    let x_diff = (tile_x0 + inside_x).saturating_sub(from_x);
                    let y_diff = (tile_y0 + inside_y).saturating_sub(from_y);

                    let tile_row_stride = tile_w as usize * channels as usize * bytes_per_sample as usize;
                    let row_bytes = part_w as usize * channels as usize * bytes_per_sample as usize;

                    for row in 0..part_h as usize {
                        let src_off = (inside_y as usize + row) * tile_row_stride
                            + inside_x as usize * channels as usize * bytes_per_sample as usize;
                        let dst_off = (y_diff as usize + row) * row_stride
                            + x_diff as usize * channels as usize * bytes_per_sample as usize;
                        if src_off + row_bytes <= tile_data.len() && dst_off + row_bytes <= out.len() {
                            out[dst_off..dst_off + row_bytes]
                                .copy_from_slice(&tile_data[src_off..src_off + row_bytes]);
                        }
                    }
                }
            }
        }

        predictor::invert_fill_order(ifd.fill_order(), &mut out);
        Ok(out)
    }
}

fn unpack_narrow_floats(data: &[u8], sample_type: SampleType) -> TiffResult<Vec<u8>> {
    let out: Vec<f32> = match sample_type {
        SampleType::F16 => bytecast::u16_vec(data, true)?
            .into_iter()
            .map(predictor::unpack_float16)
            .collect(),
        SampleType::F24 => data
            .chunks_exact(3)
            .map(|c| {
                let bits = (c[0] as u32) << 16 | (c[1] as u32) << 8 | c[2] as u32;
                predictor::unpack_float24(bits)
            })
            .collect(),
        _ => return Err(TiffError::InvalidArgument("not a narrow float sample type".into())),
    };
    Ok(bytecast::as_bytes(&out).to_vec())
}

fn read_header<R: Read + Seek>(inner: &mut R) -> TiffResult<(bool, bool, u64)> {
    let mut bom = [0u8; 2];
    inner.read_exact(&mut bom)?;
    let little_endian = match &bom {
        b"II" => true,
        b"MM" => false,
        _ => return Err(TiffError::InvalidFile(InvalidFileReason::SignatureNotFound)),
    };

    let read_u16 = |inner: &mut R| -> TiffResult<u16> {
        let mut buf = [0u8; 2];
        inner.read_exact(&mut buf)?;
        Ok(if little_endian {
            u16::from_le_bytes(buf)
        } else {
            u16::from_be_bytes(buf)
        })
    };

    let magic = read_u16(inner)?;
    match magic {
        42 => {
            let mut buf = [0u8; 4];
            inner.read_exact(&mut buf)?;
            let offset = if little_endian {
                u32::from_le_bytes(buf)
            } else {
                u32::from_be_bytes(buf)
            };
            Ok((little_endian, false, offset as u64))
        }
        43 => {
            let offset_size = read_u16(inner)?;
            let reserved = read_u16(inner)?;
            if offset_size != 8 || reserved != 0 {
                return Err(TiffError::InvalidFile(InvalidFileReason::SignatureInvalid));
            }
            let mut buf = [0u8; 8];
            inner.read_exact(&mut buf)?;
            let offset = if little_endian {
                u64::from_le_bytes(buf)
            } else {
                u64::from_be_bytes(buf)
            };
            Ok((little_endian, true, offset))
        }
        _ => Err(TiffError::InvalidFile(InvalidFileReason::SignatureInvalid)),
    }
}

fn decode_value(ty: Type, bytes: &[u8], little_endian: bool) -> TiffResult<Value> {
    fn list_or_scalar(mut values: Vec<Value>) -> Value {
        if values.len() == 1 {
            values.pop().unwrap()
        } else {
            Value::List(values)
        }
    }

    Ok(match ty {
        Type::BYTE => list_or_scalar(bytes.iter().map(|&b| Value::Byte(b)).collect()),
        Type::SBYTE => list_or_scalar(bytes.iter().map(|&b| Value::SByte(b as i8)).collect()),
        Type::UNDEFINED => Value::Undefined(bytes.to_vec()),
        Type::ASCII => {
            let s = String::from_utf8_lossy(bytes.split(|&b| b == 0).next().unwrap_or(bytes));
            Value::Ascii(s.into_owned())
        }
        Type::SHORT => list_or_scalar(
            bytecast::u16_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::Short)
                .collect(),
        ),
        Type::SSHORT => list_or_scalar(
            bytecast::i16_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::SShort)
                .collect(),
        ),
        Type::LONG | Type::IFD => list_or_scalar(
            bytecast::u32_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::Long)
                .collect(),
        ),
        Type::SLONG => list_or_scalar(
            bytecast::i32_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::SLong)
                .collect(),
        ),
        Type::LONG8 | Type::IFD8 => list_or_scalar(
            bytecast::u64_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::Long8)
                .collect(),
        ),
        Type::SLONG8 => list_or_scalar(
            bytecast::i64_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::SLong8)
                .collect(),
        ),
        Type::FLOAT => list_or_scalar(
            bytecast::f32_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::Float)
                .collect(),
        ),
        Type::DOUBLE => list_or_scalar(
            bytecast::f64_vec(bytes, little_endian)?
                .into_iter()
                .map(Value::Double)
                .collect(),
        ),
        Type::RATIONAL => {
            let nums = bytecast::u32_vec(bytes, little_endian)?;
            list_or_scalar(
                nums.chunks_exact(2)
                    .map(|c| Value::Rational(c[0], c[1]))
                    .collect(),
            )
        }
        Type::SRATIONAL => {
            let nums = bytecast::i32_vec(bytes, little_endian)?;
            list_or_scalar(
                nums.chunks_exact(2)
                    .map(|c| Value::SRational(c[0], c[1]))
                    .collect(),
            )
        }
        Type::Unknown(_) => Value::Undefined(bytes.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn little_endian_classic_header(first_ifd: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"II");
        buf.extend_from_slice(&42u16.to_le_bytes());
        buf.extend_from_slice(&first_ifd.to_le_bytes());
        buf
    }

    #[test]
    fn rejects_bad_signature() {
        let mut cursor = Cursor::new(b"XX\x00\x00".to_vec());
        assert!(read_header(&mut cursor).is_err());
    }

    #[test]
    fn reads_classic_header() {
        let mut cursor = Cursor::new(little_endian_classic_header(8));
        let (le, big, offset) = read_header(&mut cursor).unwrap();
        assert!(le);
        assert!(!big);
        assert_eq!(offset, 8);
    }

    #[test]
    fn minimal_ifd_round_trips_through_reader() {
        let mut bytes = little_endian_classic_header(8);
        // One entry: ImageWidth (256) SHORT count=1 value=64 inline.
        bytes.extend_from_slice(&1u16.to_le_bytes()); // n_entries
        bytes.extend_from_slice(&256u16.to_le_bytes()); // tag
        bytes.extend_from_slice(&3u16.to_le_bytes()); // type SHORT
        bytes.extend_from_slice(&1u32.to_le_bytes()); // count
        bytes.extend_from_slice(&64u16.to_le_bytes());
        bytes.extend_from_slice(&[0, 0]); // pad to 4 bytes inline
        bytes.extend_from_slice(&0u32.to_le_bytes()); // next IFD offset

        let reader = TiffReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.ifds().len(), 1);
        assert_eq!(reader.ifd(0).unwrap().get(Tag::ImageWidth).unwrap().as_u32().unwrap(), 64);
    }

    #[test]
    fn detects_ifd_cycles() {
        let mut bytes = little_endian_classic_header(8);
        bytes.extend_from_slice(&0u16.to_le_bytes()); // zero entries
        bytes.extend_from_slice(&8u32.to_le_bytes()); // next IFD points back to itself
        assert!(TiffReader::new(Cursor::new(bytes)).is_err());
    }
}
