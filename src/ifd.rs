//! The IFD (Image File Directory) model: a typed tag dictionary plus the
//! derived accessors a reader/writer needs (sizes, tiling, compression,
//! photometric interpretation, sample layout). Corresponds to `C3` in the
//! design.

use std::collections::BTreeMap;

use crate::error::{InvalidFileReason, TiffError, TiffResult};
use crate::tags::{
    CompressionMethod, FillOrder, PhotometricInterpretation, PlanarConfiguration, Predictor,
    SampleFormat, Tag, Type,
};

/// A single typed tag value.
///
/// Values are always materialized in memory: IFD entries are few and small
/// relative to the tile data they describe, so there is no benefit to the
/// lazy-offset representation the TIFF wire format itself uses. `TiffReader`
/// resolves any out-of-line payload while walking the IFD chain.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Byte(u8),
    SByte(i8),
    Short(u16),
    SShort(i16),
    Long(u32),
    SLong(i32),
    Long8(u64),
    SLong8(i64),
    Ifd8(u64),
    Rational(u32, u32),
    SRational(i32, i32),
    Float(f32),
    Double(f64),
    Ascii(String),
    Undefined(Vec<u8>),
    List(Vec<Value>),
}

macro_rules! into_int {
    ($name:ident, $t:ty) => {
        pub fn $name(&self) -> TiffResult<$t> {
            match self {
                Value::Byte(v) => Ok(<$t>::from(*v)),
                Value::Short(v) => <$t>::try_from(*v).map_err(|_| too_big()),
                Value::Long(v) => <$t>::try_from(*v).map_err(|_| too_big()),
                Value::Long8(v) => <$t>::try_from(*v).map_err(|_| too_big()),
                Value::Ifd8(v) => <$t>::try_from(*v).map_err(|_| too_big()),
                Value::List(l) if l.len() == 1 => l[0].$name(),
                other => Err(TiffError::InvalidFile(
                    InvalidFileReason::UnsignedIntegerExpected(other.clone()),
                )),
            }
        }
    };
}

fn too_big() -> TiffError {
    TiffError::InvalidArgument("value did not fit the requested integer width".into())
}

impl Value {
    into_int!(as_u8, u8);
    into_int!(as_u16, u16);
    into_int!(as_u32, u32);
    into_int!(as_u64, u64);

    pub fn as_string(&self) -> TiffResult<&str> {
        match self {
            Value::Ascii(s) => Ok(s.as_str()),
            other => Err(TiffError::InvalidFile(InvalidFileReason::ByteExpected(
                other.clone(),
            ))),
        }
    }

    /// Flattens a scalar-or-list value into a `Vec<u32>`, the common shape
    /// needed for tile/strip offset and byte-count arrays.
    pub fn as_u32_vec(&self) -> TiffResult<Vec<u32>> {
        match self {
            Value::List(l) => l.iter().map(Value::as_u32).collect(),
            other => Ok(vec![other.as_u32()?]),
        }
    }

    pub fn as_u64_vec(&self) -> TiffResult<Vec<u64>> {
        match self {
            Value::List(l) => l.iter().map(Value::as_u64).collect(),
            other => Ok(vec![other.as_u64()?]),
        }
    }

    pub fn as_u16_vec(&self) -> TiffResult<Vec<u16>> {
        match self {
            Value::List(l) => l.iter().map(Value::as_u16).collect(),
            other => Ok(vec![other.as_u16()?]),
        }
    }

    /// The TIFF field `Type` that would be used to serialize this value.
    pub fn field_type(&self) -> Type {
        match self {
            Value::Byte(_) => Type::BYTE,
            Value::SByte(_) => Type::SBYTE,
            Value::Short(_) => Type::SHORT,
            Value::SShort(_) => Type::SSHORT,
            Value::Long(_) => Type::LONG,
            Value::SLong(_) => Type::SLONG,
            Value::Long8(_) => Type::LONG8,
            Value::SLong8(_) => Type::SLONG8,
            Value::Ifd8(_) => Type::IFD8,
            Value::Rational(..) => Type::RATIONAL,
            Value::SRational(..) => Type::SRATIONAL,
            Value::Float(_) => Type::FLOAT,
            Value::Double(_) => Type::DOUBLE,
            Value::Ascii(_) => Type::ASCII,
            Value::Undefined(_) => Type::UNDEFINED,
            Value::List(l) => l.first().map(Value::field_type).unwrap_or(Type::UNDEFINED),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Value::List(l) => l.len(),
            Value::Ascii(s) => s.len() + 1,
            Value::Undefined(b) => b.len(),
            _ => 1,
        }
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Long(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Short(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Ascii(v.to_owned())
    }
}

impl From<Vec<u32>> for Value {
    fn from(v: Vec<u32>) -> Self {
        Value::List(v.into_iter().map(Value::Long).collect())
    }
}

/// Sample type of a decoded pixel channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F24,
    F32,
    F64,
}

impl SampleType {
    /// Number of bytes a single sample of this type occupies once decoded,
    /// rounded up to a standard unit (1, 2, 4 or 8) — the "by-type" flavour
    /// of `bytesPerSample` from the spec.
    pub fn bytes_per_sample(&self) -> u32 {
        match self {
            SampleType::U8 | SampleType::I8 => 1,
            SampleType::U16 | SampleType::I16 | SampleType::F16 => 2,
            SampleType::U32 | SampleType::I32 | SampleType::F32 | SampleType::F24 => 4,
            SampleType::F64 => 8,
        }
    }
}

/// Image File Directory: a sorted, typed tag dictionary plus the pseudo-tags
/// (endianness, BigTIFF-ness) attached when it was read, which are never
/// serialized.
#[derive(Debug, Clone)]
pub struct Ifd {
    entries: BTreeMap<u16, Value>,
    pub little_endian: bool,
    pub big_tiff: bool,
    /// Attached to a writer: further mutation is rejected.
    frozen: bool,
}

impl Ifd {
    pub fn new(little_endian: bool, big_tiff: bool) -> Self {
        Ifd {
            entries: BTreeMap::new(),
            little_endian,
            big_tiff,
            frozen: false,
        }
    }

    pub fn get(&self, tag: Tag) -> Option<&Value> {
        self.entries.get(&tag.to_u16())
    }

    pub fn put(&mut self, tag: Tag, value: impl Into<Value>) -> TiffResult<()> {
        if self.frozen {
            return Err(TiffError::UnsupportedIfd {
                tag: Some(tag),
                reason: "IFD is frozen (already attached to a writer)".into(),
            });
        }
        self.entries.insert(tag.to_u16(), value.into());
        Ok(())
    }

    pub fn remove(&mut self, tag: Tag) -> Option<Value> {
        if self.frozen {
            return None;
        }
        self.entries.remove(&tag.to_u16())
    }

    /// Inserts an entry by raw tag number, used by the reader while walking
    /// an IFD (some tags are vendor extensions with no `Tag` variant).
    pub fn put_raw(&mut self, tag: u16, value: Value) {
        if !self.frozen {
            self.entries.insert(tag, value);
        }
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Tag/value pairs in ascending tag order, the order the writer must
    /// serialize them in.
    pub fn serialized_entries(&self) -> impl Iterator<Item = (u16, &Value)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    fn required(&self, tag: Tag) -> TiffResult<&Value> {
        self.get(tag)
            .ok_or_else(|| TiffError::InvalidFile(InvalidFileReason::RequiredTagMissing(tag)))
    }

    // ---- derived accessors -------------------------------------------------

    pub fn image_dim_x(&self) -> TiffResult<u32> {
        let w = self.required(Tag::ImageWidth)?.as_u32()?;
        if w >= 1 << 31 {
            return Err(TiffError::InvalidFile(InvalidFileReason::InvalidDimensions(
                w, 0,
            )));
        }
        Ok(w)
    }

    pub fn image_dim_y(&self) -> TiffResult<u32> {
        let h = self.required(Tag::ImageLength)?.as_u32()?;
        if h >= 1 << 31 {
            return Err(TiffError::InvalidFile(InvalidFileReason::InvalidDimensions(
                0, h,
            )));
        }
        Ok(h)
    }

    pub fn bits_per_sample(&self) -> u32 {
        match self.get(Tag::BitsPerSample) {
            Some(v) => v
                .as_u32_vec()
                .ok()
                .and_then(|v| v.first().copied())
                .unwrap_or(8),
            None => 8,
        }
    }

    /// The ceil(maxBits/8) flavour of bytes-per-sample ("by-bits").
    pub fn bytes_per_sample_by_bits(&self) -> u32 {
        self.bits_per_sample().div_ceil(8)
    }

    pub fn samples_per_pixel(&self) -> u32 {
        self.get(Tag::SamplesPerPixel)
            .and_then(|v| v.as_u32().ok())
            .unwrap_or(1)
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.get(Tag::SampleFormat)
            .and_then(|v| v.as_u16().ok())
            .map(SampleFormat::from_u16_exhaustive)
            .unwrap_or(SampleFormat::Uint)
    }

    pub fn sample_type(&self) -> TiffResult<SampleType> {
        let bits = self.bits_per_sample();
        Ok(match (self.sample_format(), bits) {
            (SampleFormat::Uint, 8) => SampleType::U8,
            (SampleFormat::Uint, 16) => SampleType::U16,
            (SampleFormat::Uint, 32) => SampleType::U32,
            (SampleFormat::Int, 8) => SampleType::I8,
            (SampleFormat::Int, 16) => SampleType::I16,
            (SampleFormat::Int, 32) => SampleType::I32,
            (SampleFormat::IEEEFP, 16) => SampleType::F16,
            (SampleFormat::IEEEFP, 24) => SampleType::F24,
            (SampleFormat::IEEEFP, 32) => SampleType::F32,
            (SampleFormat::IEEEFP, 64) => SampleType::F64,
            (fmt, bits) => {
                return Err(TiffError::UnsupportedIfd {
                    tag: Some(Tag::SampleFormat),
                    reason: format!("{fmt:?} at {bits} bits per sample is unsupported"),
                })
            }
        })
    }

    pub fn photometric(&self) -> TiffResult<PhotometricInterpretation> {
        self.get(Tag::PhotometricInterpretation)
            .and_then(|v| v.as_u16().ok())
            .and_then(PhotometricInterpretation::from_u16)
            .ok_or_else(|| TiffError::UnsupportedIfd {
                tag: Some(Tag::PhotometricInterpretation),
                reason: "unknown photometric interpretation".into(),
            })
    }

    pub fn planar_configuration(&self) -> PlanarConfiguration {
        self.get(Tag::PlanarConfiguration)
            .and_then(|v| v.as_u16().ok())
            .and_then(PlanarConfiguration::from_u16)
            .unwrap_or(PlanarConfiguration::Chunky)
    }

    pub fn is_planar_separated(&self) -> bool {
        self.planar_configuration() == PlanarConfiguration::Planar
    }

    pub fn fill_order(&self) -> FillOrder {
        self.get(Tag::FillOrder)
            .and_then(|v| v.as_u16().ok())
            .and_then(FillOrder::from_u16)
            .unwrap_or(FillOrder::MsbFirst)
    }

    pub fn compression(&self) -> CompressionMethod {
        self.get(Tag::Compression)
            .and_then(|v| v.as_u16().ok())
            .map(CompressionMethod::from_u16_exhaustive)
            .unwrap_or(CompressionMethod::None)
    }

    pub fn predictor(&self) -> Predictor {
        self.get(Tag::Predictor)
            .and_then(|v| v.as_u16().ok())
            .and_then(Predictor::from_u16)
            .unwrap_or(Predictor::None)
    }

    pub fn is_tiled(&self) -> bool {
        self.get(Tag::TileWidth).is_some()
    }

    /// Pixel width of one grid cell. Strip layout uses the image width.
    pub fn tile_size_x(&self) -> TiffResult<u32> {
        if self.is_tiled() {
            self.required(Tag::TileWidth)?.as_u32()
        } else {
            self.image_dim_x()
        }
    }

    /// Pixel height of one grid cell: `RowsPerStrip` for strip layout.
    pub fn tile_size_y(&self) -> TiffResult<u32> {
        if self.is_tiled() {
            self.required(Tag::TileLength)?.as_u32()
        } else {
            Ok(self
                .get(Tag::RowsPerStrip)
                .and_then(|v| v.as_u32().ok())
                .unwrap_or_else(|| self.image_dim_y().unwrap_or(0)))
        }
    }

    pub fn tiles_per_row(&self) -> TiffResult<u32> {
        Ok(self.image_dim_x()?.div_ceil(self.tile_size_x()?.max(1)))
    }

    pub fn tiles_per_column(&self) -> TiffResult<u32> {
        Ok(self.image_dim_y()?.div_ceil(self.tile_size_y()?.max(1)))
    }

    pub fn planes(&self) -> u32 {
        if self.is_planar_separated() {
            self.samples_per_pixel()
        } else {
            1
        }
    }

    pub fn tile_offsets(&self) -> TiffResult<Vec<u64>> {
        let tag = if self.is_tiled() {
            Tag::TileOffsets
        } else {
            Tag::StripOffsets
        };
        self.required(tag)?.as_u64_vec()
    }

    pub fn tile_byte_counts(&self) -> TiffResult<Vec<u64>> {
        let tag = if self.is_tiled() {
            Tag::TileByteCounts
        } else {
            Tag::StripByteCounts
        };
        self.required(tag)?.as_u64_vec()
    }

    /// Validates the cross-tag invariants the writer must guarantee before a
    /// map may start encoding tiles (`correctForWriting` in the spec).
    ///
    /// On success, stamps the remaining defaults (`BitsPerSample`,
    /// `Compression`, `PhotometricInterpretation`).
    pub fn prepare_for_writing(&mut self) -> TiffResult<()> {
        if self.get(Tag::BitsPerSample).is_none() {
            self.put(Tag::BitsPerSample, 8u16)?;
        }
        let bits = self.bits_per_sample();
        if !matches!(bits, 8 | 16 | 32 | 64) {
            return Err(TiffError::UnsupportedIfd {
                tag: Some(Tag::BitsPerSample),
                reason: format!("{bits}-bit samples are not supported for writing"),
            });
        }
        if self.sample_format() == SampleFormat::IEEEFP && bits != 32 && bits != 64 {
            return Err(TiffError::UnsupportedIfd {
                tag: Some(Tag::SampleFormat),
                reason: "FLOAT sample format requires 32 or 64 bit samples".into(),
            });
        }
        if self.get(Tag::Compression).is_none() {
            self.put(Tag::Compression, CompressionMethod::None.to_u16())?;
        }
        let compression = self.compression();
        let channels = self.samples_per_pixel();
        if compression == CompressionMethod::JPEG
            && (!matches!(channels, 1 | 3) || bits != 8 || self.sample_format() != SampleFormat::Uint)
        {
            return Err(TiffError::UnsupportedIfd {
                tag: Some(Tag::Compression),
                reason: "JPEG compression requires 1 or 3 channels of 8-bit unsigned samples"
                    .into(),
            });
        }
        if self.get(Tag::PhotometricInterpretation).is_none() {
            let has_colormap = self.get(Tag::ColorMap).is_some();
            let default = if has_colormap {
                PhotometricInterpretation::RGBPalette
            } else {
                match channels {
                    1 => PhotometricInterpretation::BlackIsZero,
                    3 | 4 => PhotometricInterpretation::RGB,
                    _ => PhotometricInterpretation::BlackIsZero,
                }
            };
            self.put(Tag::PhotometricInterpretation, default.to_u16())?;
        } else {
            self.validate_photometric_for_compression(compression, channels)?;
        }
        Ok(())
    }

    fn validate_photometric_for_compression(
        &self,
        compression: CompressionMethod,
        channels: u32,
    ) -> TiffResult<()> {
        let photometric = self.photometric()?;
        let allowed: &[PhotometricInterpretation] = match (compression, channels) {
            (CompressionMethod::JPEG, 1) => &[PhotometricInterpretation::BlackIsZero],
            (CompressionMethod::JPEG, 3) => {
                &[PhotometricInterpretation::YCbCr, PhotometricInterpretation::RGB]
            }
            (
                CompressionMethod::CcittRle
                | CompressionMethod::CcittFax3
                | CompressionMethod::CcittFax4,
                _,
            ) => &[
                PhotometricInterpretation::WhiteIsZero,
                PhotometricInterpretation::BlackIsZero,
            ],
            _ => return Ok(()),
        };
        if allowed.contains(&photometric) {
            Ok(())
        } else {
            Err(TiffError::UnsupportedIfd {
                tag: Some(Tag::PhotometricInterpretation),
                reason: format!(
                    "{photometric:?} is not a valid photometric interpretation for {compression:?} with {channels} channel(s)"
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ifd() -> Ifd {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, 300u32).unwrap();
        ifd.put(Tag::ImageLength, 200u32).unwrap();
        ifd.put(Tag::SamplesPerPixel, 3u16).unwrap();
        ifd
    }

    #[test]
    fn derived_dims_round_trip() {
        let ifd = sample_ifd();
        assert_eq!(ifd.image_dim_x().unwrap(), 300);
        assert_eq!(ifd.image_dim_y().unwrap(), 200);
        assert_eq!(ifd.samples_per_pixel(), 3);
    }

    #[test]
    fn strip_layout_uses_image_width_as_tile_size_x() {
        let ifd = sample_ifd();
        assert!(!ifd.is_tiled());
        assert_eq!(ifd.tile_size_x().unwrap(), 300);
    }

    #[test]
    fn frozen_ifd_rejects_mutation() {
        let mut ifd = sample_ifd();
        ifd.freeze();
        assert!(ifd.put(Tag::Software, "x").is_err());
    }

    #[test]
    fn prepare_for_writing_defaults_photometric_from_channel_count() {
        let mut ifd = sample_ifd();
        ifd.prepare_for_writing().unwrap();
        assert_eq!(ifd.photometric().unwrap(), PhotometricInterpretation::RGB);
        assert_eq!(ifd.bits_per_sample(), 8);
    }

    #[test]
    fn jpeg_rejects_16_bit_samples() {
        let mut ifd = sample_ifd();
        ifd.put(Tag::BitsPerSample, 16u16).unwrap();
        ifd.put(Tag::Compression, CompressionMethod::JPEG.to_u16())
            .unwrap();
        assert!(ifd.prepare_for_writing().is_err());
    }
}
