//! End-to-end writer -> reader round trips over an in-memory classic TIFF,
//! covering uncompressed and LZW+horizontal-predictor tile layouts.

use std::io::Cursor;

use pyrastitch::tags::{CompressionMethod, PhotometricInterpretation, Predictor, Tag};
use pyrastitch::{Ifd, TiffKindStandard, TiffMap, TiffReader, TiffWriter};

fn gradient(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|y| (0..w).map(move |x| ((x + y * 7) % 256) as u8))
        .collect()
}

#[test]
fn uncompressed_single_tile_grayscale_round_trips_byte_identical() {
    let mut ifd = Ifd::new(true, false);
    ifd.put(Tag::ImageWidth, 32u32).unwrap();
    ifd.put(Tag::ImageLength, 32u32).unwrap();
    ifd.put(Tag::TileWidth, 32u32).unwrap();
    ifd.put(Tag::TileLength, 32u32).unwrap();
    ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
    ifd.prepare_for_writing().unwrap();

    let mut map = TiffMap::new(ifd, false, false).unwrap();
    let pixels = gradient(32, 32);
    map.update_samples(&pixels, 0, 0, 32, 32, 1).unwrap();

    let mut writer =
        TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();
    writer.complete(&mut map, None, false).unwrap();
    let bytes = writer.into_inner().into_inner();

    let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.ifds().len(), 1);
    let decoded = reader.read_region(0, 0, 0, 32, 32).unwrap();
    assert_eq!(decoded, pixels);
}

#[cfg(feature = "lzw")]
#[test]
fn lzw_with_horizontal_predictor_round_trips_multi_tile_rgb() {
    let mut ifd = Ifd::new(true, false);
    ifd.put(Tag::ImageWidth, 48u32).unwrap();
    ifd.put(Tag::ImageLength, 48u32).unwrap();
    ifd.put(Tag::TileWidth, 16u32).unwrap();
    ifd.put(Tag::TileLength, 16u32).unwrap();
    ifd.put(Tag::SamplesPerPixel, 3u16).unwrap();
    ifd.put(Tag::Compression, CompressionMethod::LZW.to_u16())
        .unwrap();
    ifd.put(Tag::Predictor, Predictor::Horizontal.to_u16())
        .unwrap();
    ifd.put(
        Tag::PhotometricInterpretation,
        PhotometricInterpretation::RGB.to_u16(),
    )
    .unwrap();
    ifd.prepare_for_writing().unwrap();

    let mut map = TiffMap::new(ifd, false, false).unwrap();
    let pixels = gradient(48 * 3, 48);
    map.update_samples(&pixels, 0, 0, 48, 48, 1).unwrap();

    let mut writer =
        TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();
    writer.complete(&mut map, None, false).unwrap();
    let bytes = writer.into_inner().into_inner();

    let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
    let decoded = reader.read_region(0, 0, 0, 48, 48).unwrap();
    assert_eq!(decoded, pixels);
}

#[test]
fn two_ifds_chain_correctly_and_are_independently_readable() {
    let build = || {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, 8u32).unwrap();
        ifd.put(Tag::ImageLength, 8u32).unwrap();
        ifd.put(Tag::TileWidth, 8u32).unwrap();
        ifd.put(Tag::TileLength, 8u32).unwrap();
        ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
        ifd.prepare_for_writing().unwrap();
        TiffMap::new(ifd, false, false).unwrap()
    };

    let mut first = build();
    let mut second = build();
    first
        .update_samples(&vec![1u8; 64], 0, 0, 8, 8, 1)
        .unwrap();
    second
        .update_samples(&vec![2u8; 64], 0, 0, 8, 8, 1)
        .unwrap();

    let mut writer =
        TiffWriter::<_, TiffKindStandard>::start_new_file(Cursor::new(Vec::new()), true).unwrap();
    writer.complete(&mut first, None, false).unwrap();
    writer.complete(&mut second, None, false).unwrap();
    let bytes = writer.into_inner().into_inner();

    let mut reader = TiffReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.ifds().len(), 2);
    assert_eq!(reader.read_region(0, 0, 0, 8, 8).unwrap(), vec![1u8; 64]);
    assert_eq!(reader.read_region(1, 0, 0, 8, 8).unwrap(), vec![2u8; 64]);
}
