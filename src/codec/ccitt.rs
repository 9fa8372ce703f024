use super::{Codec, CodecOptions};
use crate::error::{TiffError, TiffResult};

#[derive(Clone, Copy)]
enum Dialect {
    ModifiedHuffman,
    Group3,
    Group4,
}

pub struct Ccitt {
    dialect: Dialect,
}

impl Ccitt {
    pub fn modified_huffman() -> Self {
        Ccitt {
            dialect: Dialect::ModifiedHuffman,
        }
    }

    pub fn group3() -> Self {
        Ccitt {
            dialect: Dialect::Group3,
        }
    }

    pub fn group4() -> Self {
        Ccitt {
            dialect: Dialect::Group4,
        }
    }
}

impl Codec for Ccitt {
    fn decode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        if opts.bits_per_sample != 1 {
            return Err(TiffError::UnsupportedPixelLayout(
                "CCITT codecs only support 1 bit per sample".into(),
            ));
        }
        let columns = opts.tile_width as usize;
        let rows = opts.tile_height as usize;
        let bits = match self.dialect {
            Dialect::ModifiedHuffman => fax34::fax_decode(data, columns),
            Dialect::Group3 => fax34::g31d_decode(data, columns),
            Dialect::Group4 => fax34::g4_decode(data, columns, rows),
        };
        pack_bits_msb_first(&bits, columns, rows)
    }

    fn encode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        if opts.bits_per_sample != 1 {
            return Err(TiffError::UnsupportedPixelLayout(
                "CCITT codecs only support 1 bit per sample".into(),
            ));
        }
        let columns = opts.tile_width as usize;
        let rows = unpack_bits_msb_first(data, columns, opts.tile_height as usize);
        let encoded = match self.dialect {
            Dialect::ModifiedHuffman => fax34::fax_encode(&rows, columns),
            Dialect::Group3 => fax34::g31d_encode(&rows, columns),
            Dialect::Group4 => fax34::g4_encode(&rows, columns),
        };
        Ok(encoded)
    }
}

fn pack_bits_msb_first(bits: &[bool], columns: usize, rows: usize) -> TiffResult<Vec<u8>> {
    let stride = columns.div_ceil(8);
    let mut out = vec![0u8; stride * rows];
    for (i, &bit) in bits.iter().enumerate() {
        if !bit {
            continue;
        }
        let row = i / columns;
        let col = i % columns;
        out[row * stride + col / 8] |= 0x80 >> (col % 8);
    }
    Ok(out)
}

fn unpack_bits_msb_first(data: &[u8], columns: usize, rows: usize) -> Vec<bool> {
    let stride = columns.div_ceil(8);
    let mut out = Vec::with_capacity(columns * rows);
    for row in 0..rows {
        for col in 0..columns {
            let byte = data.get(row * stride + col / 8).copied().unwrap_or(0);
            out.push(byte & (0x80 >> (col % 8)) != 0);
        }
    }
    out
}
