//! Codec registry (`C5`): compression code to codec implementation lookup.

mod deflate;
mod jpeg;
mod jpeg2000;
mod lzw;
mod packbits;
mod uncompressed;

#[cfg(feature = "fax")]
mod ccitt;

#[cfg(feature = "jpeg")]
pub use jpeg::splice_jpeg_tables;

use std::collections::HashMap;

use crate::error::{TiffError, TiffResult};
use crate::ifd::SampleType;
use crate::tags::{CompressionMethod, PhotometricInterpretation};

/// Parameters a codec needs beyond the raw bytes, all derived from the IFD
/// by the reader/writer before dispatch.
#[derive(Debug, Clone)]
pub struct CodecOptions {
    pub tile_width: u32,
    pub tile_height: u32,
    pub samples_per_pixel: u32,
    pub bits_per_sample: u32,
    pub sample_type: SampleType,
    pub little_endian: bool,
    pub interleaved: bool,
    pub ycbcr: bool,
    pub photometric: PhotometricInterpretation,
    /// JPEG 0..1, JPEG-2000 >= 0.3. `None` means "codec default".
    pub quality: Option<f32>,
    /// A caller-supplied override for the JPEG quantization tables, carried
    /// verbatim into `JPEGTables` on encode.
    pub jpeg_tables: Option<Vec<u8>>,
}

impl CodecOptions {
    pub fn from_ifd(ifd: &crate::ifd::Ifd) -> TiffResult<Self> {
        Ok(CodecOptions {
            tile_width: ifd.tile_size_x()?,
            tile_height: ifd.tile_size_y()?,
            samples_per_pixel: ifd.samples_per_pixel(),
            bits_per_sample: ifd.bits_per_sample(),
            sample_type: ifd.sample_type()?,
            little_endian: ifd.little_endian,
            interleaved: !ifd.is_planar_separated(),
            ycbcr: ifd.photometric().ok() == Some(PhotometricInterpretation::YCbCr),
            photometric: ifd.photometric().unwrap_or(PhotometricInterpretation::BlackIsZero),
            quality: None,
            jpeg_tables: None,
        })
    }
}

/// The contract every bundled and caller-supplied codec satisfies.
///
/// A codec only ever fails with `UnsupportedPixelLayout` — every other
/// failure belongs to I/O or the IFD layer above it.
pub trait Codec: Send + Sync {
    fn decode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>>;
    fn encode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>>;
}

/// Dispatch table from wire compression code to codec implementation.
pub struct CodecRegistry {
    codecs: HashMap<u16, Box<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry {
            codecs: HashMap::new(),
        }
    }

    /// Registers every codec enabled by this build's Cargo features.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CompressionMethod::None, Box::new(uncompressed::Uncompressed));
        registry.register(CompressionMethod::PackBits, Box::new(packbits::PackBits));

        #[cfg(feature = "lzw")]
        registry.register(CompressionMethod::LZW, Box::new(lzw::Lzw));

        #[cfg(feature = "deflate")]
        registry.register(CompressionMethod::Deflate, Box::new(deflate::Deflate));

        #[cfg(feature = "jpeg")]
        registry.register(CompressionMethod::JPEG, Box::new(jpeg::Jpeg));

        #[cfg(feature = "jpeg2000")]
        {
            registry.register(CompressionMethod::Jpeg2000, Box::new(jpeg2000::Jpeg2000));
            registry.register(
                CompressionMethod::AperioJpeg2000YCbCr,
                Box::new(jpeg2000::Jpeg2000),
            );
            registry.register(
                CompressionMethod::AperioJpeg2000RGB,
                Box::new(jpeg2000::Jpeg2000),
            );
            registry.register(
                CompressionMethod::AperioJpeg2000YCbCrLossless,
                Box::new(jpeg2000::Jpeg2000),
            );
        }

        #[cfg(feature = "fax")]
        {
            registry.register(CompressionMethod::CcittRle, Box::new(ccitt::Ccitt::modified_huffman()));
            registry.register(CompressionMethod::CcittFax3, Box::new(ccitt::Ccitt::group3()));
            registry.register(CompressionMethod::CcittFax4, Box::new(ccitt::Ccitt::group4()));
        }

        registry
    }

    pub fn register(&mut self, method: CompressionMethod, codec: Box<dyn Codec>) {
        self.codecs.insert(method.to_u16(), codec);
    }

    pub fn get(&self, code: u16) -> TiffResult<&dyn Codec> {
        self.codecs
            .get(&code)
            .map(|c| c.as_ref())
            .ok_or(TiffError::UnsupportedCompression(code))
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_compression_code_is_rejected() {
        let registry = CodecRegistry::with_defaults();
        assert!(matches!(
            registry.get(9999),
            Err(TiffError::UnsupportedCompression(9999))
        ));
    }

    #[test]
    fn default_registry_always_has_none_and_packbits() {
        let registry = CodecRegistry::with_defaults();
        assert!(registry.get(CompressionMethod::None.to_u16()).is_ok());
        assert!(registry.get(CompressionMethod::PackBits.to_u16()).is_ok());
    }
}
