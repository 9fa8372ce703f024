use super::{Codec, CodecOptions};
use crate::error::{TiffError, TiffResult};

/// JPEG-2000, including the three Aperio SVS variants (lossy YCbCr, lossy
/// RGB, and lossless YCbCr) — all four wire codes decode and encode the same
/// way; only the photometric tag on the IFD distinguishes them.
pub struct Jpeg2000;

impl Codec for Jpeg2000 {
    fn decode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let image = jpeg2k::Image::from_bytes(data)
            .map_err(|e| TiffError::UnsupportedPixelLayout(format!("JPEG-2000 decode failed: {e}")))?;
        let components = image.get_pixels(None).map_err(|e| {
            TiffError::UnsupportedPixelLayout(format!("JPEG-2000 pixel extraction failed: {e}"))
        })?;
        let data = components.data;
        if opts.bits_per_sample > 16 {
            return Err(TiffError::UnsupportedPixelLayout(
                "JPEG-2000 only supports up to 16-bit samples".into(),
            ));
        }
        Ok(data)
    }

    fn encode(&self, data: &[u8], opts: &CodecOptions) -> TiffResult<Vec<u8>> {
        let lossless = opts.quality.map(|q| q >= 0.999).unwrap_or(false);
        let quality = opts.quality.unwrap_or(0.8).clamp(0.3, 1.0);
        let mut builder = jpeg2k::ImageBuilder::new(
            opts.tile_width,
            opts.tile_height,
            opts.samples_per_pixel as u8,
            data,
        );
        if lossless {
            builder = builder.lossless();
        } else {
            builder = builder.quality(quality);
        }
        builder
            .build()
            .and_then(|image| image.into_bytes())
            .map_err(|e| TiffError::UnsupportedPixelLayout(format!("JPEG-2000 encode failed: {e}")))
    }
}
