use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{Codec, CodecOptions};
use crate::error::TiffResult;

pub struct Deflate;

impl Codec for Deflate {
    fn decode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn encode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let level = opts
            .quality
            .map(|q| (q.clamp(0.0, 1.0) * 9.0).round() as u32)
            .unwrap_or(6);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> CodecOptions {
        CodecOptions {
            tile_width: 1,
            tile_height: 1,
            samples_per_pixel: 1,
            bits_per_sample: 8,
            sample_type: crate::ifd::SampleType::U8,
            little_endian: true,
            interleaved: true,
            ycbcr: false,
            photometric: crate::tags::PhotometricInterpretation::BlackIsZero,
            quality: None,
            jpeg_tables: None,
        }
    }

    #[test]
    fn round_trips_arbitrary_data() {
        let codec = Deflate;
        let data: Vec<u8> = (0..4096).map(|i| (i * 31) as u8).collect();
        let encoded = codec.encode(&data, &opts()).unwrap();
        let decoded = codec.decode(&encoded, &opts()).unwrap();
        assert_eq!(decoded, data);
    }
}
