//! Abstracts the one hard difference between classic and BigTIFF: the width
//! of offset and count fields (4 vs. 8 bytes) and the header layout.

use std::io::{Seek, Write};

use crate::error::TiffResult;
use crate::writer::ByteSink;

/// Implemented for [`TiffKindStandard`] and [`TiffKindBig`].
pub trait TiffKind: Clone + std::fmt::Debug + Sized {
    /// 4 for classic TIFF, 8 for BigTIFF.
    const OFFSET_BYTES: usize;

    fn is_big() -> bool {
        Self::OFFSET_BYTES == 8
    }

    /// Writes the file header (byte-order mark, magic, and for BigTIFF the
    /// offset-size/reserved fields), leaving the first-IFD offset slot
    /// zeroed for the caller to patch in afterwards.
    fn write_header<W: Write + Seek>(writer: &mut ByteSink<W>) -> TiffResult<()>;

    /// Errors with `TiffTooLarge` for classic TIFF if `offset > u32::MAX`.
    fn write_offset<W: Write + Seek>(writer: &mut ByteSink<W>, offset: u64) -> TiffResult<()>;

    /// The IFD entry-count field: `u16` for classic TIFF, `u64` for BigTIFF.
    fn write_entry_count<W: Write + Seek>(writer: &mut ByteSink<W>, count: usize) -> TiffResult<()>;
}

/// Classic 32-bit-offset TIFF.
#[derive(Clone, Debug)]
pub struct TiffKindStandard;

impl TiffKind for TiffKindStandard {
    const OFFSET_BYTES: usize = 4;

    fn write_header<W: Write + Seek>(writer: &mut ByteSink<W>) -> TiffResult<()> {
        writer.write_classic_header()?;
        writer.write_u32(0)?;
        Ok(())
    }

    fn write_offset<W: Write + Seek>(writer: &mut ByteSink<W>, offset: u64) -> TiffResult<()> {
        writer.write_u32(u32::try_from(offset)?)
    }

    fn write_entry_count<W: Write + Seek>(writer: &mut ByteSink<W>, count: usize) -> TiffResult<()> {
        writer.write_u16(u16::try_from(count)?)
    }
}

/// BigTIFF, with 64-bit offsets and counts.
#[derive(Clone, Debug)]
pub struct TiffKindBig;

impl TiffKind for TiffKindBig {
    const OFFSET_BYTES: usize = 8;

    fn write_header<W: Write + Seek>(writer: &mut ByteSink<W>) -> TiffResult<()> {
        writer.write_bigtiff_header()?;
        writer.write_u64(0)?;
        Ok(())
    }

    fn write_offset<W: Write + Seek>(writer: &mut ByteSink<W>, offset: u64) -> TiffResult<()> {
        writer.write_u64(offset)
    }

    fn write_entry_count<W: Write + Seek>(writer: &mut ByteSink<W>, count: usize) -> TiffResult<()> {
        writer.write_u64(u64::try_from(count)?)
    }
}
