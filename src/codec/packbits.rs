use super::{Codec, CodecOptions};
use crate::error::{TiffError, TiffResult};

pub struct PackBits;

impl Codec for PackBits {
    fn decode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < data.len() {
            let n = data[pos] as i8;
            pos += 1;
            if n >= 0 {
                let count = n as usize + 1;
                let end = pos + count;
                if end > data.len() {
                    return Err(TiffError::InvalidArgument(
                        "PackBits literal run overruns the buffer".into(),
                    ));
                }
                out.extend_from_slice(&data[pos..end]);
                pos = end;
            } else if n != -128 {
                if pos >= data.len() {
                    return Err(TiffError::InvalidArgument(
                        "PackBits replicate run missing its byte".into(),
                    ));
                }
                let byte = data[pos];
                pos += 1;
                let count = 1 - n as i32;
                out.extend(std::iter::repeat(byte).take(count as usize));
            }
            // n == -128 is a no-op per the PackBits spec.
        }
        Ok(out)
    }

    fn encode(&self, data: &[u8], _opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let run_len = run_length(&data[i..]);
            if run_len >= 2 {
                out.push((1 - run_len as i32) as u8);
                out.push(data[i]);
                i += run_len;
                continue;
            }
            let lit_start = i;
            i += 1;
            while i < data.len() && run_length(&data[i..]) < 2 && (i - lit_start) < 128 {
                i += 1;
            }
            let lit = &data[lit_start..i];
            out.push((lit.len() - 1) as u8);
            out.extend_from_slice(lit);
        }
        Ok(out)
    }
}

fn run_length(data: &[u8]) -> usize {
    if data.is_empty() {
        return 0;
    }
    let first = data[0];
    let mut n = 1;
    while n < data.len() && n < 128 && data[n] == first {
        n += 1;
    }
    n
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
    fn round_trips_mixed_runs() {
        let codec = PackBits;
        let data = vec![1, 1, 1, 1, 2, 3, 4, 5, 5, 5];
        let encoded = codec.encode(&data, &opts()).unwrap();
        let decoded = codec.decode(&encoded, &opts()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn decodes_the_canonical_spec_example() {
        let codec = PackBits;
        let encoded: Vec<u8> = vec![
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let decoded = codec.decode(&encoded, &opts()).unwrap();
        assert_eq!(decoded.len(), 3 + 3 + 4 + 4 + 10);
    }
}
