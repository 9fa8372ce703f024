//! Builds a small Aperio-shaped file (baseline, thumbnail, one downsampled
//! level, label+macro pair) with the real writer, then drives it through
//! `PyramidSource` end to end: classification, level enumeration, and an
//! actual-region read.

use std::io::Cursor;

use pyrastitch::tags::{CompressionMethod, Tag};
use pyrastitch::{Ifd, PyramidSource, TiffKindStandard, TiffMap, TiffWriter};

fn tiled_ifd(w: u32, h: u32, compression: CompressionMethod) -> Ifd {
    let mut ifd = Ifd::new(true, false);
    ifd.put(Tag::ImageWidth, w).unwrap();
    ifd.put(Tag::ImageLength, h).unwrap();
    ifd.put(Tag::TileWidth, 64u32.min(w)).unwrap();
    ifd.put(Tag::TileLength, 64u32.min(h)).unwrap();
    ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
    ifd.put(Tag::Compression, compression.to_u16()).unwrap();
    ifd.prepare_for_writing().unwrap();
    ifd
}

fn strip_ifd(w: u32, h: u32, compression: CompressionMethod) -> Ifd {
    let mut ifd = Ifd::new(true, false);
    ifd.put(Tag::ImageWidth, w).unwrap();
    ifd.put(Tag::ImageLength, h).unwrap();
    ifd.put(Tag::RowsPerStrip, h).unwrap();
    ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
    ifd.put(Tag::Compression, compression.to_u16()).unwrap();
    ifd.prepare_for_writing().unwrap();
    ifd
}

#[test]
fn classification_and_region_reads_work_over_a_written_aperio_shaped_file() {
    let mut writer =
        TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();

    // IFD 0: baseline level.
    let mut baseline = TiffMap::new(tiled_ifd(256, 256, CompressionMethod::None), false, false).unwrap();
    baseline
        .update_samples(&vec![42u8; 256 * 256], 0, 0, 256, 256, 1)
        .unwrap();
    writer.complete(&mut baseline, None, false).unwrap();

    // IFD 1: thumbnail, small and untiled (strip layout), right after baseline.
    let mut thumbnail = TiffMap::new(strip_ifd(64, 64, CompressionMethod::LZW), false, false).unwrap();
    thumbnail.update_samples(&vec![7u8; 64 * 64], 0, 0, 64, 64, 1).unwrap();
    writer.complete(&mut thumbnail, None, false).unwrap();

    // IFD 2: one more pyramid level, half the baseline resolution.
    let mut level1 = TiffMap::new(tiled_ifd(128, 128, CompressionMethod::None), false, false).unwrap();
    level1.update_samples(&vec![9u8; 128 * 128], 0, 0, 128, 128, 1).unwrap();
    writer.complete(&mut level1, None, false).unwrap();

    // IFD 3: label, small, tall-ish (aspect < 1.5), LZW.
    let mut label = TiffMap::new(strip_ifd(400, 300, CompressionMethod::LZW), false, false).unwrap();
    label.update_samples(&vec![1u8; 400 * 300], 0, 0, 400, 300, 1).unwrap();
    writer.complete(&mut label, None, false).unwrap();

    // IFD 4: macro, small, wide (close to the 75000/26000 aspect ratio), JPEG-tagged compression id but use None codec for simplicity via LZW instead.
    let mut macro_img = TiffMap::new(strip_ifd(1440, 500, CompressionMethod::LZW), false, false).unwrap();
    macro_img
        .update_samples(&vec![2u8; 1440 * 500], 0, 0, 1440, 500, 1)
        .unwrap();
    writer.complete(&mut macro_img, None, false).unwrap();

    let bytes = writer.into_inner().into_inner();

    let source = PyramidSource::open(Cursor::new(bytes), false, false).unwrap();
    let classification = source.classification();
    assert_eq!(classification.thumbnail, Some(1));
    assert_eq!(classification.label, Some(3));
    assert_eq!(classification.macro_image, Some(4));
    assert!(source.number_of_levels() >= 2);

    let region = source.read_region(0, 0, 0, 32, 32).unwrap();
    assert_eq!(region, vec![42u8; 32 * 32]);
}
