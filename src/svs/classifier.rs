//! SVS special-image classifier (`C8`): identifies the thumbnail, label,
//! macro, and custom IFDs among the IFD list of an Aperio-style file.

use crate::ifd::Ifd;
use crate::tags::CompressionMethod;

/// The aspect ratio a macro slide image is expected to be close to
/// (75000/26000 micron scan-bed proportions). Specific to Aperio's own
/// macro-camera hardware; not meaningful for other SVS producers.
const MACRO_ASPECT_RATIO: f64 = 75_000.0 / 26_000.0;
const MACRO_ASPECT_TOLERANCE: f64 = 0.20;
const SMALL_IFD_AREA: u64 = 2048 * 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialImageKind {
    Thumbnail,
    Label,
    Macro,
    Custom(u8),
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub thumbnail: Option<usize>,
    pub label: Option<usize>,
    pub macro_image: Option<usize>,
    pub custom: Vec<usize>,
}

impl Classification {
    pub fn kind_of(&self, ifd_index: usize) -> Option<SpecialImageKind> {
        if self.thumbnail == Some(ifd_index) {
            return Some(SpecialImageKind::Thumbnail);
        }
        if self.label == Some(ifd_index) {
            return Some(SpecialImageKind::Label);
        }
        if self.macro_image == Some(ifd_index) {
            return Some(SpecialImageKind::Macro);
        }
        self.custom
            .iter()
            .position(|&i| i == ifd_index)
            .map(|pos| SpecialImageKind::Custom(pos as u8 + 1))
    }

    /// Indices of the remaining IFDs, in order, that belong to the
    /// resolution pyramid proper (neither special nor past the pyramid
    /// break — that judgment is made by `assemble_pyramid`).
    pub fn non_special_indices(&self, ifd_count: usize) -> Vec<usize> {
        (0..ifd_count)
            .filter(|i| self.kind_of(*i).is_none())
            .collect()
    }
}

fn is_small(ifd: &Ifd) -> bool {
    let dims = match (ifd.image_dim_x(), ifd.image_dim_y()) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return false,
    };
    ifd.get(crate::tags::Tag::TileOffsets).is_none()
        && (dims.0 as u64) * (dims.1 as u64) < SMALL_IFD_AREA
}

fn aspect_ratio(ifd: &Ifd) -> f64 {
    let w = ifd.image_dim_x().unwrap_or(1).max(1) as f64;
    let h = ifd.image_dim_y().unwrap_or(1).max(1) as f64;
    w / h
}

fn is_macro_shaped(ifd: &Ifd) -> bool {
    let ratio = aspect_ratio(ifd);
    let lo = MACRO_ASPECT_RATIO * (1.0 - MACRO_ASPECT_TOLERANCE);
    let hi = MACRO_ASPECT_RATIO * (1.0 + MACRO_ASPECT_TOLERANCE);
    ratio >= lo && ratio <= hi
}

/// Runs the four-step classification heuristic. `explicit_mode` selects the
/// compression-pair classification for the last two small IFDs over the
/// aspect-ratio heuristic.
pub fn classify(ifds: &[Ifd], explicit_mode: bool) -> Classification {
    let n = ifds.len();
    let mut result = Classification::default();
    if n == 0 {
        return result;
    }

    if n > 1 && is_small(&ifds[1]) {
        result.thumbnail = Some(1);
    }

    let last = n - 1;
    let second_last = n.checked_sub(2);

    if let Some(second_last) = second_last.filter(|&i| i > 0 && i != result.thumbnail.unwrap_or(usize::MAX)) {
        if is_small(&ifds[second_last]) && is_small(&ifds[last]) {
            let (label_idx, macro_idx) = if explicit_mode {
                classify_by_compression(ifds, second_last, last)
            } else {
                classify_by_shape_or_area(ifds, second_last, last)
            };
            result.label = Some(label_idx);
            result.macro_image = Some(macro_idx);
        } else if is_small(&ifds[last]) {
            classify_single_small(ifds, last, &mut result);
        }
    } else if is_small(&ifds[last]) {
        classify_single_small(ifds, last, &mut result);
    }

    for i in 1..n {
        if result.kind_of(i).is_some() {
            continue;
        }
        if is_small(&ifds[i]) && result.custom.len() < 5 {
            result.custom.push(i);
        }
    }

    result
}

fn classify_by_compression(ifds: &[Ifd], a: usize, b: usize) -> (usize, usize) {
    let a_lzw = ifds[a].compression() == CompressionMethod::LZW;
    if a_lzw {
        (a, b)
    } else {
        (b, a)
    }
}

fn classify_by_shape_or_area(ifds: &[Ifd], a: usize, b: usize) -> (usize, usize) {
    let a_macro = is_macro_shaped(&ifds[a]);
    let b_macro = is_macro_shaped(&ifds[b]);
    match (a_macro, b_macro) {
        (true, false) => (b, a),
        (false, true) => (a, b),
        _ => {
            let area = |ifd: &Ifd| {
                ifd.image_dim_x().unwrap_or(0) as u64 * ifd.image_dim_y().unwrap_or(0) as u64
            };
            if area(&ifds[a]) >= area(&ifds[b]) {
                (b, a)
            } else {
                (a, b)
            }
        }
    }
}

fn classify_single_small(ifds: &[Ifd], idx: usize, result: &mut Classification) {
    let macro_shaped = is_macro_shaped(&ifds[idx]);
    if macro_shaped {
        result.macro_image = Some(idx);
    } else if ifds[idx].compression() != CompressionMethod::JPEG && aspect_ratio(&ifds[idx]) < 1.5 {
        result.label = Some(idx);
    } else {
        result.macro_image = Some(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    fn ifd(w: u32, h: u32, tiled: bool, compression: CompressionMethod) -> Ifd {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, w).unwrap();
        ifd.put(Tag::ImageLength, h).unwrap();
        ifd.put(Tag::Compression, compression.to_u16()).unwrap();
        if tiled {
            ifd.put(Tag::TileOffsets, vec![0u32]).unwrap();
        }
        ifd
    }

    #[test]
    fn classifies_thumbnail_level_and_trailing_label_macro_pair() {
        // Aperio's own layout: baseline, then the small thumbnail right
        // after it, then the remaining pyramid levels, then label+macro.
        let ifds = vec![
            ifd(8192, 6144, true, CompressionMethod::JPEG),
            ifd(256, 256, false, CompressionMethod::LZW),
            ifd(2048, 1536, true, CompressionMethod::JPEG),
            ifd(1024, 768, true, CompressionMethod::JPEG),
            ifd(512, 500, false, CompressionMethod::LZW),
            ifd(1440, 500, false, CompressionMethod::JPEG),
        ];
        let classification = classify(&ifds, false);
        assert_eq!(classification.thumbnail, Some(1));
        assert_eq!(classification.label, Some(4));
        assert_eq!(classification.macro_image, Some(5));
    }
}
