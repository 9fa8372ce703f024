//! SVS pyramid source (`C9`): derives the actual resolution levels from a
//! classified IFD list, synthesizes virtual levels below the lowest stored
//! one, and composes whole-slide reads against the macro image when a
//! region reaches outside the area actually scanned at full resolution.

use std::io::{Read, Seek};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{TiffError, TiffResult};
use crate::ifd::Ifd;
use crate::reader::TiffReader;
use crate::svs::classifier::{self, Classification};
use crate::tags::Tag;

/// Virtual-level synthesis stops once a level's shorter side would fall
/// below this many pixels.
pub const MIN_PYRAMID_LEVEL_SIDE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Rect {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Rect { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x0 <= other.x0 && self.y0 <= other.y0 && self.x1 >= other.x1 && self.y1 >= other.y1
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        })
    }

    fn scale(&self, from_w: u32, from_h: u32, to_w: u32, to_h: u32) -> Rect {
        let sx = |v: u32| ((v as u64 * to_w as u64) / from_w.max(1) as u64) as u32;
        let sy = |v: u32| ((v as u64 * to_h as u64) / from_h.max(1) as u64) as u32;
        Rect {
            x0: sx(self.x0),
            y0: sy(self.y0),
            x1: sx(self.x1).max(sx(self.x0)),
            y1: sy(self.y1).max(sy(self.y0)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActualLevel {
    pub ifd_index: usize,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct VirtualLevel {
    /// Index into `Pyramid::actual_levels` this level is resized from.
    pub base_level: usize,
    pub width: u32,
    pub height: u32,
    /// Total downscale factor relative to the base actual level.
    pub compression_from_base: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Pyramid {
    pub actual_levels: Vec<ActualLevel>,
    pub virtual_levels: Vec<VirtualLevel>,
    pub actual_compression: Option<u32>,
}

impl Pyramid {
    pub fn level_count(&self) -> usize {
        self.actual_levels.len() + self.virtual_levels.len()
    }

    pub fn level_dims(&self, level: usize) -> Option<(u32, u32)> {
        if level < self.actual_levels.len() {
            let l = &self.actual_levels[level];
            Some((l.width, l.height))
        } else {
            self.virtual_levels
                .get(level - self.actual_levels.len())
                .map(|l| (l.width, l.height))
        }
    }
}

/// Walks the non-special IFDs from `IFD 0`, computing `actualCompression`
/// on the first size transition and rejecting the chain at the first IFD
/// whose dimensions no longer match `(prevW, prevH) / actualCompression`
/// within one pixel. IFDs after a break are left out of the pyramid even
/// when the classifier did not mark them special.
pub fn assemble_pyramid(ifds: &[Ifd], classification: &Classification) -> TiffResult<Pyramid> {
    let mut actual_levels = Vec::new();
    let mut actual_compression: Option<u32> = None;
    let mut prev: Option<(u32, u32)> = None;

    for i in 0..ifds.len() {
        if classification.kind_of(i).is_some() {
            continue;
        }
        let w = ifds[i].image_dim_x()?;
        let h = ifds[i].image_dim_y()?;

        match prev {
            None => {
                actual_levels.push(ActualLevel {
                    ifd_index: i,
                    width: w,
                    height: h,
                });
                prev = Some((w, h));
            }
            Some((pw, ph)) => {
                let compression = *actual_compression.get_or_insert_with(|| {
                    ((pw as f64 / w as f64).max(ph as f64 / h as f64)).round().max(1.0) as u32
                });
                let expected_w = pw / compression;
                let expected_h = ph / compression;
                if w.abs_diff(expected_w) > 1 || h.abs_diff(expected_h) > 1 {
                    debug!(ifd = i, w, h, expected_w, expected_h, "pyramid chain broken");
                    break;
                }
                actual_levels.push(ActualLevel {
                    ifd_index: i,
                    width: w,
                    height: h,
                });
                prev = Some((w, h));
            }
        }
    }

    Ok(Pyramid {
        actual_levels,
        virtual_levels: Vec::new(),
        actual_compression,
    })
}

/// Publishes one virtual level per halving below the lowest actual level,
/// down to `MIN_PYRAMID_LEVEL_SIDE`, when the actual compression factor is
/// a power of two and whole-slide composition is active.
pub fn synthesize_virtual_levels(pyramid: &mut Pyramid, whole_slide_active: bool) {
    pyramid.virtual_levels.clear();
    let Some(compression) = pyramid.actual_compression else {
        return;
    };
    if !whole_slide_active || !compression.is_power_of_two() {
        return;
    }
    let Some(base) = pyramid.actual_levels.last() else {
        return;
    };
    let base_level = pyramid.actual_levels.len() - 1;

    let mut factor = 2u32;
    loop {
        let w = base.width / factor;
        let h = base.height / factor;
        if w == 0 || h == 0 || w.min(h) < MIN_PYRAMID_LEVEL_SIDE {
            break;
        }
        pyramid.virtual_levels.push(VirtualLevel {
            base_level,
            width: w,
            height: h,
            compression_from_base: factor,
        });
        factor *= 2;
    }
}

/// Parses the `MPP = <value>` field Aperio embeds in `ImageDescription`
/// (pipe-separated key/value pairs). Returns `None` when absent or
/// unparsable; callers then treat the file as having no geometry metadata.
fn parse_microns_per_pixel(ifd: &Ifd) -> Option<f64> {
    let desc = ifd.get(Tag::ImageDescription)?.as_string().ok()?;
    desc.split('|').find_map(|field| {
        let field = field.trim();
        let rest = field.strip_prefix("MPP")?;
        rest.trim_start_matches([' ', '=']).trim().parse::<f64>().ok()
    })
}

#[derive(Debug, Clone, Copy)]
pub struct WholeSlideGeometry {
    pub microns_per_pixel: f64,
}

/// Downsamples an interleaved byte buffer by an integer factor using plain
/// box averaging (no subpixel filtering).
pub fn box_average_downsample(src: &[u8], src_w: u32, src_h: u32, channels: u32, factor: u32) -> (Vec<u8>, u32, u32) {
    let factor = factor.max(1);
    let dst_w = (src_w / factor).max(1);
    let dst_h = (src_h / factor).max(1);
    let mut out = vec![0u8; (dst_w as u64 * dst_h as u64 * channels as u64) as usize];

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            for c in 0..channels {
                let mut sum = 0u32;
                let mut count = 0u32;
                for sy in (dy * factor)..((dy + 1) * factor).min(src_h) {
                    for sx in (dx * factor)..((dx + 1) * factor).min(src_w) {
                        let idx = ((sy * src_w + sx) * channels + c) as usize;
                        if let Some(&v) = src.get(idx) {
                            sum += v as u32;
                            count += 1;
                        }
                    }
                }
                let avg = if count > 0 { (sum / count) as u8 } else { 0 };
                out[((dy * dst_w + dx) * channels + c) as usize] = avg;
            }
        }
    }
    (out, dst_w, dst_h)
}

enum RegionCase {
    Inside,
    Outside,
    Straddle(Rect),
}

fn classify_region(actual_area: &Rect, requested: &Rect) -> RegionCase {
    if actual_area.contains(requested) {
        RegionCase::Inside
    } else if let Some(overlap) = actual_area.intersection(requested) {
        RegionCase::Straddle(overlap)
    } else {
        RegionCase::Outside
    }
}

/// Lazily-initialized, lock-guarded multi-level reader over an SVS-style
/// TIFF. Construction classifies the IFDs, assembles the actual pyramid,
/// and (when whole-slide composition is requested) synthesizes virtual
/// levels; any failure during that sequence simply drops the half-built
/// reader, leaving no open handle behind.
pub struct PyramidSource<R> {
    inner: RwLock<TiffReader<R>>,
    classification: Classification,
    pyramid: Pyramid,
    geometry: Option<WholeSlideGeometry>,
    /// The actually-scanned rectangle, expressed in level-0 pixel space.
    /// Absent geometry metadata (the common case without a matched macro
    /// alignment) means the whole level is treated as actual data.
    actual_area_level0: Option<Rect>,
    pub skip_coarse_data: bool,
    pub data_border_width: u32,
}

impl<R: Read + Seek> PyramidSource<R> {
    pub fn open(inner: R, whole_slide_active: bool, explicit_mode: bool) -> TiffResult<Self> {
        let reader = TiffReader::new(inner)?;
        let classification = classifier::classify(reader.ifds(), explicit_mode);
        let mut pyramid = assemble_pyramid(reader.ifds(), &classification)?;
        synthesize_virtual_levels(&mut pyramid, whole_slide_active);

        let geometry = pyramid
            .actual_levels
            .first()
            .and_then(|lvl| parse_microns_per_pixel(&reader.ifds()[lvl.ifd_index]))
            .map(|mpp| WholeSlideGeometry { microns_per_pixel: mpp });

        Ok(PyramidSource {
            inner: RwLock::new(reader),
            classification,
            pyramid,
            geometry,
            actual_area_level0: None,
            skip_coarse_data: false,
            data_border_width: 0,
        })
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn pyramid(&self) -> &Pyramid {
        &self.pyramid
    }

    pub fn geometry(&self) -> Option<WholeSlideGeometry> {
        self.geometry
    }

    pub fn number_of_levels(&self) -> usize {
        self.pyramid.level_count()
    }

    pub fn level_dims(&self, level: usize) -> TiffResult<(u32, u32)> {
        self.pyramid
            .level_dims(level)
            .ok_or_else(|| TiffError::InvalidArgument(format!("no such pyramid level {level}")))
    }

    /// Explicitly sets the actually-scanned rectangle at level 0. Without
    /// this, whole-slide composition treats every level as fully actual
    /// (the macro fallback paths never trigger).
    pub fn set_actual_area_level0(&mut self, rect: Rect) {
        self.actual_area_level0 = Some(rect);
    }

    fn actual_area_for_level(&self, level_w: u32, level_h: u32) -> Rect {
        match self.actual_area_level0 {
            Some(rect) => {
                let (base_w, base_h) = self
                    .pyramid
                    .actual_levels
                    .first()
                    .map(|l| (l.width, l.height))
                    .unwrap_or((level_w, level_h));
                rect.scale(base_w, base_h, level_w, level_h)
            }
            None => Rect::new(0, 0, level_w, level_h),
        }
    }

    fn bytes_per_pixel(&self, ifd_index: usize) -> TiffResult<u32> {
        let ifd = self.inner.read().ifd(ifd_index)?.clone();
        Ok(ifd.samples_per_pixel() * ifd.bytes_per_sample_by_bits())
    }

    /// Resizes a macro-image-derived region to `(w, h)` to serve as filler
    /// for coarse/outside reads. Falls back to zero-filled data when no
    /// macro image was classified.
    fn macro_resize(&self, w: u32, h: u32, channels: u32) -> TiffResult<Vec<u8>> {
        let Some(macro_idx) = self.classification.macro_image else {
            return Ok(vec![0u8; (w as u64 * h as u64 * channels as u64) as usize]);
        };
        let (macro_w, macro_h) = {
            let reader = self.inner.read();
            let ifd = reader.ifd(macro_idx)?;
            (ifd.image_dim_x()?, ifd.image_dim_y()?)
        };
        let macro_pixels = self.inner.write().read_region(macro_idx, 0, 0, macro_w, macro_h)?;

        // Resize by nearest-factor box averaging; upscaling (factor < 1)
        // falls back to nearest-neighbour since box averaging only shrinks.
        if w <= macro_w && h <= macro_h {
            let factor = (macro_w / w.max(1)).max(macro_h / h.max(1)).max(1);
            let (mut resized, rw, rh) = box_average_downsample(&macro_pixels, macro_w, macro_h, channels, factor);
            if rw != w || rh != h {
                resized = nearest_resize(&resized, rw, rh, w, h, channels);
            }
            Ok(resized)
        } else {
            Ok(nearest_resize(&macro_pixels, macro_w, macro_h, w, h, channels))
        }
    }

    /// Reads a `(w, h)` region at `(x, y)` of pyramid level `level`,
    /// composing against the macro image when whole-slide geometry
    /// indicates the request reaches outside the actually-scanned area.
    pub fn read_region(&self, level: usize, x: u32, y: u32, w: u32, h: u32) -> TiffResult<Vec<u8>> {
        let (level_w, level_h) = self.level_dims(level)?;
        let requested = Rect::new(x, y, x.saturating_add(w), y.saturating_add(h));
        if requested.x1 > level_w || requested.y1 > level_h {
            return Err(TiffError::InvalidArgument("region exceeds level bounds".into()));
        }

        if self.geometry.is_none() {
            return self.read_actual_region(level, x, y, w, h);
        }

        let actual_area = self.actual_area_for_level(level_w, level_h);
        let channels = if level < self.pyramid.actual_levels.len() {
            self.bytes_per_pixel(self.pyramid.actual_levels[level].ifd_index)?
        } else {
            let base = self.pyramid.virtual_levels[level - self.pyramid.actual_levels.len()].base_level;
            self.bytes_per_pixel(self.pyramid.actual_levels[base].ifd_index)?
        };

        match classify_region(&actual_area, &requested) {
            RegionCase::Inside => self.read_actual_region(level, x, y, w, h),
            RegionCase::Outside => {
                if self.skip_coarse_data {
                    Ok(vec![0u8; (w as u64 * h as u64 * channels as u64) as usize])
                } else {
                    self.macro_resize(w, h, channels)
                }
            }
            RegionCase::Straddle(overlap) => {
                let mut out = self.macro_resize(w, h, channels)?;
                let inner_w = overlap.width();
                let inner_h = overlap.height();
                if inner_w > 0 && inner_h > 0 {
                    let actual = self.read_actual_region(level, overlap.x0, overlap.y0, inner_w, inner_h)?;
                    let row_bytes = inner_w as usize * channels as usize;
                    let dst_row_bytes = w as usize * channels as usize;
                    let ox = (overlap.x0 - x) as usize * channels as usize;
                    let oy = (overlap.y0 - y) as usize;
                    for row in 0..inner_h as usize {
                        let src_off = row * row_bytes;
                        let dst_off = (oy + row) * dst_row_bytes + ox;
                        if src_off + row_bytes <= actual.len() && dst_off + row_bytes <= out.len() {
                            out[dst_off..dst_off + row_bytes].copy_from_slice(&actual[src_off..src_off + row_bytes]);
                        }
                    }
                }
                if self.data_border_width > 0 {
                    paint_border(&mut out, w, h, channels, self.data_border_width, 0);
                }
                Ok(out)
            }
        }
    }

    fn read_actual_region(&self, level: usize, x: u32, y: u32, w: u32, h: u32) -> TiffResult<Vec<u8>> {
        if level < self.pyramid.actual_levels.len() {
            let ifd_index = self.pyramid.actual_levels[level].ifd_index;
            self.inner.write().read_region(ifd_index, x, y, w, h)
        } else {
            let vlevel = self.pyramid.virtual_levels[level - self.pyramid.actual_levels.len()];
            let base = &self.pyramid.actual_levels[vlevel.base_level];
            let factor = vlevel.compression_from_base;
            let src_x = x * factor;
            let src_y = y * factor;
            let src_w = (w * factor).min(base.width.saturating_sub(src_x));
            let src_h = (h * factor).min(base.height.saturating_sub(src_y));
            let channels = self.bytes_per_pixel(base.ifd_index)?;
            let src = self.inner.write().read_region(base.ifd_index, src_x, src_y, src_w, src_h)?;
            let (resized, rw, rh) = box_average_downsample(&src, src_w, src_h, channels, factor);
            if rw == w && rh == h {
                Ok(resized)
            } else {
                Ok(nearest_resize(&resized, rw, rh, w, h, channels))
            }
        }
    }
}

fn nearest_resize(src: &[u8], src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, channels: u32) -> Vec<u8> {
    let mut out = vec![0u8; (dst_w as u64 * dst_h as u64 * channels as u64) as usize];
    for dy in 0..dst_h {
        let sy = (dy as u64 * src_h.max(1) as u64 / dst_h.max(1) as u64).min(src_h.saturating_sub(1) as u64) as u32;
        for dx in 0..dst_w {
            let sx = (dx as u64 * src_w.max(1) as u64 / dst_w.max(1) as u64).min(src_w.saturating_sub(1) as u64) as u32;
            for c in 0..channels {
                let src_idx = ((sy * src_w + sx) * channels + c) as usize;
                let dst_idx = ((dy * dst_w + dx) * channels + c) as usize;
                if let Some(&v) = src.get(src_idx) {
                    out[dst_idx] = v;
                }
            }
        }
    }
    out
}

fn paint_border(buf: &mut [u8], w: u32, h: u32, channels: u32, border: u32, value: u8) {
    let row_bytes = w as usize * channels as usize;
    for y in 0..h {
        for x in 0..w {
            if x < border || y < border || x >= w - border || y >= h - border {
                let off = y as usize * row_bytes + x as usize * channels as usize;
                for c in 0..channels as usize {
                    if off + c < buf.len() {
                        buf[off + c] = value;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifd::Ifd;
    use crate::tags::{CompressionMethod, Tag};

    fn ifd(w: u32, h: u32) -> Ifd {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, w).unwrap();
        ifd.put(Tag::ImageLength, h).unwrap();
        ifd.put(Tag::Compression, CompressionMethod::None.to_u16()).unwrap();
        ifd
    }

    #[test]
    fn assembles_actual_levels_and_derives_compression() {
        let ifds = vec![ifd(8192, 6144), ifd(2048, 1536), ifd(1024, 768)];
        let classification = Classification::default();
        let pyramid = assemble_pyramid(&ifds, &classification).unwrap();
        assert_eq!(pyramid.actual_levels.len(), 3);
        assert_eq!(pyramid.actual_compression, Some(4));
    }

    #[test]
    fn breaks_the_chain_at_the_first_mismatched_ifd() {
        // 8192/2048 = 4, but 1024 is only a factor of 2 down from 2048.
        let ifds = vec![ifd(8192, 6144), ifd(2048, 1536), ifd(1024, 768)];
        let mut classification = Classification::default();
        classification.custom.push(1); // pretend level 1 was classified away
        let pyramid = assemble_pyramid(&ifds, &classification).unwrap();
        // With level 1 excluded, compression is derived from 0 -> 2 (factor 8)
        // and the chain has only two members.
        assert_eq!(pyramid.actual_levels.len(), 2);
    }

    #[test]
    fn virtual_levels_halve_down_to_the_floor() {
        let mut pyramid = Pyramid {
            actual_levels: vec![ActualLevel {
                ifd_index: 0,
                width: 1024,
                height: 512,
            }],
            virtual_levels: Vec::new(),
            actual_compression: Some(4),
        };
        synthesize_virtual_levels(&mut pyramid, true);
        assert!(!pyramid.virtual_levels.is_empty());
        for level in &pyramid.virtual_levels {
            assert!(level.width.min(level.height) >= MIN_PYRAMID_LEVEL_SIDE);
        }
    }

    #[test]
    fn virtual_levels_are_empty_when_whole_slide_is_inactive() {
        let mut pyramid = Pyramid {
            actual_levels: vec![ActualLevel {
                ifd_index: 0,
                width: 1024,
                height: 512,
            }],
            virtual_levels: Vec::new(),
            actual_compression: Some(4),
        };
        synthesize_virtual_levels(&mut pyramid, false);
        assert!(pyramid.virtual_levels.is_empty());
    }

    #[test]
    fn rect_classification_identifies_inside_outside_and_straddle() {
        let area = Rect::new(100, 100, 500, 500);
        assert!(matches!(
            classify_region(&area, &Rect::new(200, 200, 300, 300)),
            RegionCase::Inside
        ));
        assert!(matches!(
            classify_region(&area, &Rect::new(600, 600, 700, 700)),
            RegionCase::Outside
        ));
        assert!(matches!(
            classify_region(&area, &Rect::new(50, 50, 200, 200)),
            RegionCase::Straddle(_)
        ));
    }

    #[test]
    fn box_average_downsample_halves_dimensions() {
        let src = vec![255u8; 16 * 16];
        let (out, w, h) = box_average_downsample(&src, 16, 16, 1, 2);
        assert_eq!((w, h), (8, 8));
        assert_eq!(out.len(), 64);
        assert!(out.iter().all(|&v| v == 255));
    }
}
