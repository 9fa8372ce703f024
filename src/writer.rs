//! The TIFF writer (`C7`): header/IFD serialization with linkage, tile
//! encode + flush, and the 32-bit overflow guard for classic TIFF.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use tracing::{debug, instrument, warn};

use crate::codec::{CodecOptions, CodecRegistry};
use crate::error::{TiffError, TiffResult};
use crate::ifd::Value;
use crate::predictor;
use crate::tags::Tag;
use crate::tiff_kind::TiffKind;
use crate::tile::TiffMap;

/// Classic TIFF must keep every offset comfortably under `2^32 - 1`; this is
/// the safety margin enforced before any offset is committed to disk.
const CLASSIC_TIFF_SAFETY_LIMIT: u64 = 4_000_000_000;

/// Thin byte-level writer: endianness-aware primitive writes plus the two
/// header shapes. Shared by both `TiffKind` impls.
pub struct ByteSink<W> {
    inner: W,
    little_endian: bool,
}

impl<W: Write + Seek> ByteSink<W> {
    pub fn new(inner: W, little_endian: bool) -> Self {
        ByteSink { inner, little_endian }
    }

    pub fn position(&mut self) -> TiffResult<u64> {
        Ok(self.inner.stream_position()?)
    }

    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    pub fn seek(&mut self, pos: u64) -> TiffResult<()> {
        self.inner.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn write_classic_header(&mut self) -> TiffResult<()> {
        self.inner.write_all(if self.little_endian { b"II" } else { b"MM" })?;
        self.write_u16(42)
    }

    pub fn write_bigtiff_header(&mut self) -> TiffResult<()> {
        self.inner.write_all(if self.little_endian { b"II" } else { b"MM" })?;
        self.write_u16(43)?;
        self.write_u16(8)?;
        self.write_u16(0)
    }

    pub fn write_u8(&mut self, v: u8) -> TiffResult<()> {
        self.inner.write_all(&[v])?;
        Ok(())
    }

    pub fn write_u16(&mut self, v: u16) -> TiffResult<()> {
        let bytes = if self.little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    pub fn write_u32(&mut self, v: u32) -> TiffResult<()> {
        let bytes = if self.little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    pub fn write_u64(&mut self, v: u64) -> TiffResult<()> {
        let bytes = if self.little_endian { v.to_le_bytes() } else { v.to_be_bytes() };
        self.inner.write_all(&bytes)?;
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> TiffResult<()> {
        self.inner.write_all(bytes)?;
        Ok(())
    }

    pub fn pad_to_even(&mut self) -> TiffResult<()> {
        let pos = self.position()?;
        if pos % 2 != 0 {
            self.write_u8(0)?;
        }
        Ok(())
    }

    pub fn truncate_to(&mut self, len: u64) -> TiffResult<()>
    where
        W: Truncatable,
    {
        self.inner.truncate(len)?;
        self.seek(len)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Implemented for sinks that can be truncated (plain files); in-memory
/// buffers used in tests are exempt since truncation has no meaning there
/// beyond a `Vec::truncate`, which `Cursor<Vec<u8>>` callers do themselves.
pub trait Truncatable {
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl Truncatable for std::fs::File {
    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Header,
    Writing,
    Closed,
}

/// A single value written inline or out-of-line, the unit the IFD
/// serializer iterates over.
struct WriteEntry {
    tag: u16,
    value: Value,
}

/// Append-mode TIFF writer following the `Header -> Writing -> Closed`
/// state machine.
pub struct TiffWriter<W, K> {
    sink: ByteSink<W>,
    state: WriterState,
    position_of_last_ifd_offset: u64,
    known_ifd_starts: Vec<u64>,
    codecs: CodecRegistry,
    /// The byte used to fill tiles that were never written, when
    /// `missing_tiles_allowed` is false. Matches the reader's own default.
    filler: u8,
    /// When set, `write_ifd_at` and `complete` delete this path on failure.
    delete_file_on_error: Option<PathBuf>,
    _kind: PhantomData<K>,
}

impl<W: Write + Seek, K: TiffKind> TiffWriter<W, K> {
    /// `startNewFile`: writes the header and truncates any trailing bytes
    /// beyond the header away.
    pub fn start_new_file(inner: W, little_endian: bool) -> TiffResult<Self> {
        let mut sink = ByteSink::new(inner, little_endian);
        K::write_header(&mut sink)?;
        let position_of_last_ifd_offset = sink.position()? - K::OFFSET_BYTES as u64;
        Ok(TiffWriter {
            sink,
            state: WriterState::Header,
            position_of_last_ifd_offset,
            known_ifd_starts: Vec::new(),
            codecs: CodecRegistry::with_defaults(),
            filler: 0,
            delete_file_on_error: None,
            _kind: PhantomData,
        })
    }

    /// `startExistingFile`: re-parses the header and the full IFD chain of
    /// an already-written file, recovers `positionOfLastIFDOffset` (the
    /// next-IFD field of the last IFD in the chain) and the set of known IFD
    /// start offsets, then seeks to EOF so the writer can append further
    /// IFDs and tiles without disturbing what is already there.
    pub fn start_existing_file(mut inner: W) -> TiffResult<Self>
    where
        W: Read,
    {
        let (little_endian, big_tiff, first_ifd_offset, header_len) = read_existing_header(&mut inner)?;
        if big_tiff != K::is_big() {
            return Err(TiffError::UnsupportedIfd {
                tag: None,
                reason: format!(
                    "file is {} but writer was opened as {}",
                    if big_tiff { "BigTIFF" } else { "classic TIFF" },
                    if K::is_big() { "BigTIFF" } else { "classic TIFF" }
                ),
            });
        }

        let mut position_of_last_ifd_offset = header_len - K::OFFSET_BYTES as u64;
        let mut known_ifd_starts = Vec::new();
        let mut offset = first_ifd_offset;
        let mut visited = std::collections::HashSet::new();
        while offset != 0 {
            if !visited.insert(offset) {
                return Err(TiffError::InvalidFile(crate::error::InvalidFileReason::CycleInOffsets));
            }
            known_ifd_starts.push(offset);
            let next_field_pos = skip_existing_ifd::<W, K>(&mut inner, offset, little_endian)?;
            position_of_last_ifd_offset = next_field_pos;
            inner.seek(SeekFrom::Start(next_field_pos))?;
            offset = if big_tiff {
                read_u64_at(&mut inner, little_endian)?
            } else {
                read_u32_at(&mut inner, little_endian)? as u64
            };
        }

        inner.seek(SeekFrom::End(0))?;
        let sink = ByteSink::new(inner, little_endian);

        Ok(TiffWriter {
            sink,
            state: WriterState::Writing,
            position_of_last_ifd_offset,
            known_ifd_starts,
            codecs: CodecRegistry::with_defaults(),
            filler: 0,
            delete_file_on_error: None,
            _kind: PhantomData,
        })
    }

    /// Arranges for `path` to be deleted if a subsequent `write_ifd_at` or
    /// `complete` call fails.
    pub fn with_delete_file_on_error(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.delete_file_on_error = Some(path.into());
        self
    }

    pub fn with_filler(&mut self, filler: u8) -> &mut Self {
        self.filler = filler;
        self
    }

    fn cleanup_on_error(&self) {
        if let Some(path) = &self.delete_file_on_error {
            let _ = std::fs::remove_file(path);
        }
    }

    fn check_overflow(&self, offset: u64) -> TiffResult<()> {
        if !K::is_big() && offset >= CLASSIC_TIFF_SAFETY_LIMIT {
            return Err(TiffError::TiffTooLarge);
        }
        Ok(())
    }

    /// `writeIFDAt`: serializes entries in sorted tag order, writing
    /// oversized payloads into a trailing "extra" region; returns the file
    /// position of the next-IFD-offset field so it can be patched later.
    /// Deletes `delete_file_on_error`'s path (if set) before propagating any
    /// failure.
    pub fn write_ifd_at(&mut self, map: &TiffMap, offset: Option<u64>, update_linkages: bool) -> TiffResult<u64> {
        match self.write_ifd_at_impl(map, offset, update_linkages) {
            Ok(pos) => Ok(pos),
            Err(e) => {
                self.cleanup_on_error();
                Err(e)
            }
        }
    }

    #[instrument(skip(self, map))]
    fn write_ifd_at_impl(
        &mut self,
        map: &TiffMap,
        offset: Option<u64>,
        update_linkages: bool,
    ) -> TiffResult<u64> {
        let start = match offset {
            Some(o) => o,
            None => {
                self.sink.pad_to_even()?;
                self.sink.position()?
            }
        };
        self.check_overflow(start)?;
        self.sink.seek(start)?;

        let entries: Vec<WriteEntry> = map
            .ifd
            .serialized_entries()
            .map(|(tag, value)| WriteEntry {
                tag,
                value: value.clone(),
            })
            .collect();

        K::write_entry_count(&mut self.sink, entries.len())?;

        let inline_capacity = K::OFFSET_BYTES as u64;
        let entry_record_len = 2 + 2 + K::OFFSET_BYTES as u64 + K::OFFSET_BYTES as u64;
        let next_ifd_field_pos = start
            + if K::is_big() { 8 } else { 2 }
            + entries.len() as u64 * entry_record_len;

        let mut extra_region = Vec::new();
        let mut extra_offsets = Vec::with_capacity(entries.len());
        let extra_region_base = next_ifd_field_pos + K::OFFSET_BYTES as u64;

        for entry in &entries {
            let payload = serialize_value(&entry.value, self.sink_little_endian());
            if (payload.len() as u64) <= inline_capacity {
                extra_offsets.push(None);
            } else {
                extra_offsets.push(Some(extra_region_base + extra_region.len() as u64));
                extra_region.extend_from_slice(&payload);
                if extra_region.len() % 2 != 0 {
                    extra_region.push(0);
                }
            }
        }

        for (entry, extra_offset) in entries.iter().zip(&extra_offsets) {
            self.sink.write_u16(entry.tag)?;
            self.sink.write_u16(entry.value.field_type().to_u16())?;
            let count = entry.value.count() as u64;
            if K::is_big() {
                self.sink.write_u64(count)?;
            } else {
                self.sink.write_u32(u32::try_from(count)?)?;
            }
            let payload = serialize_value(&entry.value, self.sink_little_endian());
            match extra_offset {
                Some(off) => K::write_offset(&mut self.sink, *off)?,
                None => {
                    let mut inline = payload.clone();
                    inline.resize(inline_capacity as usize, 0);
                    self.sink.write_bytes(&inline)?;
                }
            }
        }

        self.sink.write_bytes(&extra_region)?;

        K::write_offset(&mut self.sink, 0)?; // next-IFD offset, patched by caller

        if update_linkages && !self.known_ifd_starts.contains(&start) {
            let save = self.sink.position()?;
            self.sink.seek(self.position_of_last_ifd_offset)?;
            K::write_offset(&mut self.sink, start)?;
            self.sink.seek(save)?;
            self.known_ifd_starts.push(start);
            self.position_of_last_ifd_offset = next_ifd_field_pos;
        }

        self.state = WriterState::Writing;
        debug!(start, entries = entries.len(), "wrote IFD");
        Ok(next_ifd_field_pos)
    }

    fn sink_little_endian(&self) -> bool {
        self.sink.little_endian()
    }

    /// Runs codec encode, then predictor/fill-order/interleave
    /// post-processing.
    pub fn encode_tile(
        &self,
        map: &TiffMap,
        tile: &mut crate::tile::Tile,
        invert_fill_order: bool,
    ) -> TiffResult<()> {
        let decoded = tile
            .decoded
            .as_ref()
            .ok_or_else(|| TiffError::InvalidArgument("tile has no decoded data to encode".into()))?
            .clone();
        let mut working = decoded;

        let bytes_per_sample = map.ifd.bytes_per_sample_by_bits();
        let channels = if tile.separated_samples {
            1
        } else {
            map.ifd.samples_per_pixel()
        };

        predictor::apply_predictor(
            map.ifd.predictor(),
            &mut working,
            tile.w as usize,
            channels as usize,
            bytes_per_sample as usize,
        );
        if invert_fill_order {
            predictor::invert_fill_order(map.ifd.fill_order(), &mut working);
        }

        let opts = CodecOptions::from_ifd(&map.ifd)?;
        let codec = self.codecs.get(map.ifd.compression().to_u16())?;
        tile.encoded = Some(codec.encode(&working, &opts)?);
        Ok(())
    }

    /// `writeEncodedTile`: appends to EOF, padded to even length, and
    /// records `(offset, length)` on the tile.
    pub fn write_encoded_tile(&mut self, tile: &mut crate::tile::Tile, free_after: bool) -> TiffResult<()> {
        let encoded = tile
            .encoded
            .take()
            .ok_or_else(|| TiffError::InvalidArgument("tile has no encoded data".into()))?;

        self.sink.pad_to_even()?;
        let offset = self.sink.position()?;
        self.check_overflow(offset + encoded.len() as u64)?;
        self.sink.write_bytes(&encoded)?;
        tile.stored = Some((offset, encoded.len() as u64));

        if !free_after {
            tile.encoded = Some(encoded);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = WriterState::Closed;
    }

    /// Reclaims the underlying sink after closing, e.g. to hand a file
    /// handle back to the caller or to inspect an in-memory buffer in tests.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }

    /// Tears down a partial write by truncating back to the prior IFD's
    /// next-IFD field, so a cancelled write leaves no dangling tile data
    /// reachable from the IFD chain.
    pub fn tear_down_to_last_ifd(&mut self) -> TiffResult<()>
    where
        W: Truncatable,
    {
        self.sink.truncate_to(self.position_of_last_ifd_offset)
    }

    /// `writeForward`: stamps a zero-filled placeholder tile offset/count
    /// array (so the IFD's on-disk size won't change once the real values
    /// are known) and writes the IFD immediately, ahead of any tile data.
    /// Only valid for a map whose final dimensions are already fixed — a
    /// resizable map's tile count isn't known yet.
    pub fn write_forward(&mut self, map: &mut TiffMap) -> TiffResult<u64> {
        if map.resizable {
            return Err(TiffError::InvalidArgument(
                "write_forward requires a map with fixed final dimensions".into(),
            ));
        }
        let tile_count = (map.ifd.planes() * map.tiles_per_row() * map.tiles_per_col()) as usize;
        let placeholder = vec![0u64; tile_count];
        let (offsets_tag, counts_tag) = array_tags(&map.ifd);
        map.ifd.put(offsets_tag, tile_array_value(&placeholder, map.ifd.big_tiff))?;
        map.ifd.put(counts_tag, tile_array_value(&placeholder, map.ifd.big_tiff))?;

        self.sink.pad_to_even()?;
        let start = self.sink.position()?;
        self.write_ifd_at(map, Some(start), true)?;
        Ok(start)
    }

    /// `complete`: encodes every tile still holding only decoded samples,
    /// fills in genuinely untouched cells with a shared filler tile (or a
    /// bare `(0, 0)` record when `missing_tiles_allowed`), and writes (or
    /// rewrites, if `at_offset` names a `write_forward`ed IFD) the final
    /// IFD with the resulting offset/byte-count arrays. Deletes
    /// `delete_file_on_error`'s path (if set) before propagating any failure
    /// from encoding or from the final IFD write.
    pub fn complete(
        &mut self,
        map: &mut TiffMap,
        at_offset: Option<u64>,
        missing_tiles_allowed: bool,
    ) -> TiffResult<u64> {
        match self.complete_impl(map, at_offset, missing_tiles_allowed) {
            Ok(pos) => Ok(pos),
            Err(e) => {
                self.cleanup_on_error();
                Err(e)
            }
        }
    }

    #[instrument(skip(self, map))]
    fn complete_impl(
        &mut self,
        map: &mut TiffMap,
        at_offset: Option<u64>,
        missing_tiles_allowed: bool,
    ) -> TiffResult<u64> {
        let planes = map.ifd.planes();
        let tiles_per_row = map.tiles_per_row();
        let tiles_per_col = map.tiles_per_col();
        let bytes_per_sample = map.ifd.bytes_per_sample_by_bits();
        let channels = if map.ifd.is_planar_separated() {
            1
        } else {
            map.ifd.samples_per_pixel()
        };

        let mut offsets = Vec::with_capacity((planes * tiles_per_row * tiles_per_col) as usize);
        let mut byte_counts = Vec::with_capacity(offsets.capacity());
        let mut filler_cache: HashMap<(u32, u32), (u64, u64)> = HashMap::new();

        for plane in 0..planes {
            for ty in 0..tiles_per_col {
                for tx in 0..tiles_per_row {
                    map.get_or_create(plane, tx, ty)?;
                    let mut tile = map
                        .take_tile(plane, tx, ty)
                        .expect("just materialized by get_or_create");

                    let stored = if let Some(stored) = tile.stored {
                        stored
                    } else if tile.has_decoded() {
                        self.encode_tile(map, &mut tile, true)?;
                        self.write_encoded_tile(&mut tile, true)?;
                        tile.stored.expect("write_encoded_tile always records stored")
                    } else if missing_tiles_allowed {
                        (0, 0)
                    } else {
                        let key = (tile.w, tile.h);
                        if let Some(&cached) = filler_cache.get(&key) {
                            cached
                        } else {
                            let filler_len =
                                tile.w as usize * tile.h as usize * channels as usize * bytes_per_sample as usize;
                            tile.decoded = Some(vec![self.filler; filler_len]);
                            self.encode_tile(map, &mut tile, true)?;
                            self.write_encoded_tile(&mut tile, true)?;
                            let stored = tile.stored.expect("write_encoded_tile always records stored");
                            filler_cache.insert(key, stored);
                            stored
                        }
                    };

                    map.put_tile(plane, tx, ty, tile);
                    offsets.push(stored.0);
                    byte_counts.push(stored.1);
                }
            }
        }

        if missing_tiles_allowed && offsets.iter().any(|&o| o == 0) {
            warn!("IFD has tiles with no data (missing_tiles_allowed)");
        }

        let (offsets_tag, counts_tag) = array_tags(&map.ifd);
        map.ifd.put(offsets_tag, tile_array_value(&offsets, map.ifd.big_tiff))?;
        map.ifd.put(counts_tag, tile_array_value(&byte_counts, map.ifd.big_tiff))?;

        self.write_ifd_at(map, at_offset, true)
    }
}

fn read_u16_at<R: Read>(inner: &mut R, little_endian: bool) -> TiffResult<u16> {
    let mut buf = [0u8; 2];
    inner.read_exact(&mut buf)?;
    Ok(if little_endian { u16::from_le_bytes(buf) } else { u16::from_be_bytes(buf) })
}

fn read_u32_at<R: Read>(inner: &mut R, little_endian: bool) -> TiffResult<u32> {
    let mut buf = [0u8; 4];
    inner.read_exact(&mut buf)?;
    Ok(if little_endian { u32::from_le_bytes(buf) } else { u32::from_be_bytes(buf) })
}

fn read_u64_at<R: Read>(inner: &mut R, little_endian: bool) -> TiffResult<u64> {
    let mut buf = [0u8; 8];
    inner.read_exact(&mut buf)?;
    Ok(if little_endian { u64::from_le_bytes(buf) } else { u64::from_be_bytes(buf) })
}

/// Re-reads the header of an already-written file for `start_existing_file`:
/// byte-order mark, magic, and (BigTIFF only) the offset-size/reserved
/// fields, returning `(little_endian, big_tiff, first_ifd_offset,
/// header_len)`.
fn read_existing_header<R: Read + Seek>(inner: &mut R) -> TiffResult<(bool, bool, u64, u64)> {
    let mut bom = [0u8; 2];
    inner.read_exact(&mut bom)?;
    let little_endian = match &bom {
        b"II" => true,
        b"MM" => false,
        _ => return Err(TiffError::InvalidFile(crate::error::InvalidFileReason::SignatureNotFound)),
    };

    let magic = read_u16_at(inner, little_endian)?;
    match magic {
        42 => {
            let offset = read_u32_at(inner, little_endian)? as u64;
            Ok((little_endian, false, offset, 8))
        }
        43 => {
            let offset_size = read_u16_at(inner, little_endian)?;
            let reserved = read_u16_at(inner, little_endian)?;
            if offset_size != 8 || reserved != 0 {
                return Err(TiffError::InvalidFile(crate::error::InvalidFileReason::SignatureInvalid));
            }
            let offset = read_u64_at(inner, little_endian)?;
            Ok((little_endian, true, offset, 16))
        }
        _ => Err(TiffError::InvalidFile(crate::error::InvalidFileReason::SignatureInvalid)),
    }
}

/// Seeks to `offset`, reads just the entry count, and returns the file
/// position of the next-IFD-offset field that follows the entry records —
/// without decoding any entry payload, since `start_existing_file` only
/// needs IFD chain linkage, not content.
fn skip_existing_ifd<W: Read + Seek, K: TiffKind>(inner: &mut W, offset: u64, little_endian: bool) -> TiffResult<u64> {
    inner.seek(SeekFrom::Start(offset))?;
    let entry_count = if K::is_big() {
        read_u64_at(inner, little_endian)?
    } else {
        read_u16_at(inner, little_endian)? as u64
    };
    let count_field_len: u64 = if K::is_big() { 8 } else { 2 };
    let entry_record_len = 4 + 2 * K::OFFSET_BYTES as u64;
    Ok(offset + count_field_len + entry_count * entry_record_len)
}

fn serialize_value(value: &Value, little_endian: bool) -> Vec<u8> {
    fn push<const N: usize>(out: &mut Vec<u8>, bytes: [u8; N]) {
        out.extend_from_slice(&bytes);
    }

    let mut out = Vec::new();
    match value {
        Value::List(items) => {
            for item in items {
                out.extend(serialize_value(item, little_endian));
            }
        }
        Value::Byte(v) => out.push(*v),
        Value::SByte(v) => out.push(*v as u8),
        Value::Short(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::SShort(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::Long(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::SLong(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::Long8(v) | Value::Ifd8(v) => {
            push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() })
        }
        Value::SLong8(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::Float(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::Double(v) => push(&mut out, if little_endian { v.to_le_bytes() } else { v.to_be_bytes() }),
        Value::Rational(n, d) => {
            out.extend(serialize_value(&Value::Long(*n), little_endian));
            out.extend(serialize_value(&Value::Long(*d), little_endian));
        }
        Value::SRational(n, d) => {
            out.extend(serialize_value(&Value::SLong(*n), little_endian));
            out.extend(serialize_value(&Value::SLong(*d), little_endian));
        }
        Value::Ascii(s) => {
            out.extend_from_slice(s.as_bytes());
            out.push(0);
        }
        Value::Undefined(bytes) => out.extend_from_slice(bytes),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifd::Ifd;
    use crate::tiff_kind::TiffKindStandard;
    use std::io::Cursor;

    #[test]
    fn header_then_one_empty_ifd_round_trips_through_the_reader() {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, 16u32).unwrap();
        ifd.put(Tag::ImageLength, 16u32).unwrap();
        ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
        let map = TiffMap::new(ifd, false, false).unwrap();

        let buf: Vec<u8> = Vec::new();
        let mut writer = TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(buf), true).unwrap();
        let next_ifd_field = writer.write_ifd_at(&map, None, true).unwrap();
        assert!(next_ifd_field > 0);
    }

    #[test]
    fn serialize_ascii_value_is_null_terminated() {
        let bytes = serialize_value(&Value::Ascii("hi".into()), true);
        assert_eq!(bytes, vec![b'h', b'i', 0]);
    }

    fn one_ifd_map() -> TiffMap {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, 16u32).unwrap();
        ifd.put(Tag::ImageLength, 16u32).unwrap();
        ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
        TiffMap::new(ifd, false, false).unwrap()
    }

    #[test]
    fn reopening_an_existing_file_and_closing_without_writes_is_byte_identical() {
        let map = one_ifd_map();
        let mut writer = TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();
        writer.write_ifd_at(&map, None, true).unwrap();
        let original = writer.into_inner().into_inner();

        let mut reopened =
            TiffWriter::<_, TiffKindStandard>::start_existing_file(Cursor::new(original.clone())).unwrap();
        reopened.close();
        let after = reopened.into_inner().into_inner();
        assert_eq!(original, after);
    }

    #[test]
    fn reopened_writer_appends_a_second_ifd_after_the_first() {
        let map = one_ifd_map();
        let mut writer = TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();
        writer.write_ifd_at(&map, None, true).unwrap();
        let bytes = writer.into_inner().into_inner();

        let mut reopened = TiffWriter::<_, TiffKindStandard>::start_existing_file(Cursor::new(bytes)).unwrap();
        let second_map = one_ifd_map();
        reopened.write_ifd_at(&second_map, None, true).unwrap();
        let bytes = reopened.into_inner().into_inner();

        let reader = crate::reader::TiffReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.ifds().len(), 2);
    }

    #[test]
    fn delete_file_on_error_removes_the_path_when_write_ifd_at_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.tiff");
        std::fs::write(&path, b"placeholder").unwrap();
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();

        let mut writer = TiffWriter::<_, TiffKindStandard>::start_new_file(file, true).unwrap();
        writer.with_delete_file_on_error(&path);

        // An offset past the classic-TIFF safety margin forces check_overflow
        // to fail inside write_ifd_at_impl.
        let map = one_ifd_map();
        let err = writer.write_ifd_at(&map, Some(CLASSIC_TIFF_SAFETY_LIMIT + 1), true);
        assert!(err.is_err());
        assert!(!path.exists());
    }
}
