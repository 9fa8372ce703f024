use super::{Codec, CodecOptions};
use crate::error::{TiffError, TiffResult};

/// New-style JPEG (compression code 7). Decoding accepts both the YCbCr and
/// RGB variants; encoding always emits the Adobe+SOF marker layout for
/// 3-channel RGB output.
pub struct Jpeg;

impl Codec for Jpeg {
    fn decode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut decoder = zune_jpeg::JpegDecoder::new(data);
        let pixels = decoder
            .decode()
            .map_err(|e| TiffError::UnsupportedPixelLayout(format!("JPEG decode failed: {e}")))?;
        if opts.samples_per_pixel == 1 && pixels.len() != (opts.tile_width * opts.tile_height) as usize
        {
            return Err(TiffError::UnsupportedPixelLayout(
                "decoded JPEG channel count does not match the tile's SamplesPerPixel".into(),
            ));
        }
        Ok(pixels)
    }

    fn encode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        if opts.bits_per_sample != 8 || !matches!(opts.samples_per_pixel, 1 | 3) {
            return Err(TiffError::UnsupportedPixelLayout(
                "JPEG encoding requires 1 or 3 channels of 8-bit samples".into(),
            ));
        }
        let quality = (opts.quality.unwrap_or(0.85).clamp(0.0, 1.0) * 100.0).round() as u8;
        let mut out = Vec::new();
        let color_type = if opts.samples_per_pixel == 1 {
            jpeg_encoder::ColorType::Luma
        } else {
            jpeg_encoder::ColorType::Rgb
        };
        let encoder = jpeg_encoder::Encoder::new(&mut out, quality);
        encoder
            .encode(data, opts.tile_width as u16, opts.tile_height as u16, color_type)
            .map_err(|e| TiffError::UnsupportedPixelLayout(format!("JPEG encode failed: {e}")))?;
        Ok(out)
    }
}

/// Prepends a tile's `JPEGTables` payload to the tile's own encoded stream,
/// dropping the table stream's trailing EOI and the tile stream's leading
/// SOI so the two streams concatenate into one valid JPEG.
pub fn splice_jpeg_tables(tables: &[u8], tile_stream: &[u8]) -> Vec<u8> {
    const EOI: [u8; 2] = [0xFF, 0xD9];
    const SOI: [u8; 2] = [0xFF, 0xD8];
    let tables_trimmed = if tables.ends_with(&EOI) {
        &tables[..tables.len() - 2]
    } else {
        tables
    };
    let tile_trimmed = if tile_stream.starts_with(&SOI) {
        &tile_stream[2..]
    } else {
        tile_stream
    };
    let mut out = Vec::with_capacity(tables_trimmed.len() + 2 + tile_trimmed.len());
    out.extend_from_slice(tables_trimmed);
    out.extend_from_slice(tile_trimmed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_drops_table_eoi_and_tile_soi() {
        let tables = [0xFFu8, 0xD8, 0x01, 0x02, 0xFF, 0xD9];
        let tile = [0xFFu8, 0xD8, 0x03, 0x04];
        let spliced = splice_jpeg_tables(&tables, &tile);
        assert_eq!(spliced, vec![0xFF, 0xD8, 0x01, 0x02, 0x03, 0x04]);
    }
}
