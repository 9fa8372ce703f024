use super::{Codec, CodecOptions};
use crate::error::TiffResult;

pub struct Uncompressed;

impl Codec for Uncompressed {
    fn decode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn encode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        Ok(data.to_vec())
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
    fn round_trips_bytes_verbatim() {
        let codec = Uncompressed;
        let data = vec![1, 2, 3, 4, 5];
        let encoded = codec.encode(&data, &opts()).unwrap();
        let decoded = codec.decode(&encoded, &opts()).unwrap();
        assert_eq!(decoded, data);
    }
}
