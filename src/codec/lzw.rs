use super::{Codec, CodecOptions};
use crate::error::{TiffError, TiffResult};

/// TIFF's variant of LZW: MSB-first bit packing, codes widen at
/// `2^width - 1` entries (one early compared to the GIF variant), and the
/// stream begins at 9-bit codes with the standard CLEAR/EOI codes at 256/257.
pub struct Lzw;

impl Codec for Lzw {
    fn decode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut decoder = weezl::decode::Decoder::new(weezl::BitOrder::Msb, 8);
        decoder
            .decode(data)
            .map_err(|e| TiffError::InvalidArgument(format!("LZW stream corrupt: {e}")))
    }

    fn encode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut encoder = weezl::encode::Encoder::new(weezl::BitOrder::Msb, 8);
        encoder
            .encode(data)
            .map_err(|e| TiffError::InvalidArgument(format!("LZW encode failed: {e}")))
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
    fn round_trips_repetitive_data() {
        let codec = Lzw;
        let data: Vec<u8> = (0..512).map(|i| (i % 7) as u8).collect();
        let encoded = codec.encode(&data, &opts()).unwrap();
        let decoded = codec.decode(&encoded, &opts()).unwrap();
        assert_eq!(decoded, data);
    }
}
