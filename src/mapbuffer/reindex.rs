//! Reindexer/retainer (`C12`): composes a single labeled matrix over a large
//! area from the frames currently retained in a [`super::MapBuffer`],
//! keeping only completed objects and (optionally) those reachable from a
//! smaller "interior" sub-area, with an optional auto-crop to non-zero
//! extent.

use rayon::prelude::*;

use crate::disjoint_set::DisjointSet;
use crate::label_set::LabelSet;
use crate::mapbuffer::frame::{Frame, Rect};

/// The dense result of a retain+reindex pass.
pub struct Retained {
    pub matrix: Vec<i32>,
    pub width: u32,
    pub height: u32,
    /// `Some((minX, minY, maxX, maxY))` when `auto_crop` found any non-zero
    /// pixel; `None` if the whole result was background.
    pub crop: Option<(i64, i64, i64, i64)>,
}

/// The raw label at `(x, y)` from the *last* retained frame (in insertion
/// order) that covers the point — "top-most" in the spec's painter's-algorithm
/// sense, since later frames were added more recently.
fn raw_label_at(frames: &[Frame], x: i64, y: i64) -> i32 {
    frames
        .iter()
        .rev()
        .find_map(|frame| frame.label_at(x, y))
        .unwrap_or(0)
}

/// Bases of every object with at least one pixel inside `small_frame_area`,
/// across all retained frames.
fn bases_touching(frames: &[Frame], small_frame_area: Rect, object_pairs: &DisjointSet) -> LabelSet {
    let mut seen = LabelSet::new();
    for frame in frames {
        let Some(overlap) = frame.rect().intersection(&small_frame_area) else {
            continue;
        };
        for y in overlap.y0..overlap.y1 {
            for x in overlap.x0..overlap.x1 {
                if let Some(label) = frame.label_at(x, y) {
                    if label != 0 {
                        seen.insert(object_pairs.parent_or_this(label) as u32);
                    }
                }
            }
        }
    }
    seen
}

/// `reindexAndRetainCompleted`: resolves every pixel of `large_area` to its
/// canonical base, zeroing out objects that are not completed, not fully
/// inside `reindexed_completed`, touch the outer boundary, or fall outside
/// both `small_frame_area` and the set of objects that extend into it.
#[allow(clippy::too_many_arguments)]
pub fn reindex_and_retain_completed(
    frames: &[Frame],
    large_area: Rect,
    small_frame_area: Rect,
    object_pairs: &DisjointSet,
    completed: &LabelSet,
    boundary_with_outside: &LabelSet,
    auto_crop: bool,
) -> Retained {
    let width = large_area.width().max(0) as u32;
    let height = large_area.height().max(0) as u32;
    let extending_bases = bases_touching(frames, small_frame_area, object_pairs);

    let resolve_pixel = |x: i64, y: i64| -> i32 {
        let raw = raw_label_at(frames, x, y);
        if raw == 0 {
            return 0;
        }
        let base = object_pairs.parent_or_this(raw);
        if !completed.contains(base as u32) || boundary_with_outside.contains(base as u32) {
            return 0;
        }
        let inside_small = x >= small_frame_area.x0
            && x < small_frame_area.x1
            && y >= small_frame_area.y0
            && y < small_frame_area.y1;
        if !inside_small && !extending_bases.contains(base as u32) {
            return 0;
        }
        base
    };

    // One output row per y, computed independently -- the hot loop this
    // parallelizes over, per the spec's "fan out over blocks of rows".
    let rows: Vec<(Vec<i32>, Option<(i64, i64)>)> = (0..height)
        .into_par_iter()
        .map(|row| {
            let y = large_area.y0 + row as i64;
            let mut out_row = vec![0i32; width as usize];
            let mut min_x = None;
            let mut max_x = None;
            for col in 0..width {
                let x = large_area.x0 + col as i64;
                let value = resolve_pixel(x, y);
                out_row[col as usize] = value;
                if value != 0 {
                    min_x = Some(min_x.map_or(x, |m: i64| m.min(x)));
                    max_x = Some(max_x.map_or(x, |m: i64| m.max(x)));
                }
            }
            (out_row, min_x.zip(max_x))
        })
        .collect();

    let mut matrix = Vec::with_capacity(width as usize * height as usize);
    let mut crop_min_x = i64::MAX;
    let mut crop_max_x = i64::MIN;
    let mut crop_min_y = i64::MAX;
    let mut crop_max_y = i64::MIN;
    for (row_idx, (row, x_bounds)) in rows.into_iter().enumerate() {
        if let Some((min_x, max_x)) = x_bounds {
            let y = large_area.y0 + row_idx as i64;
            crop_min_x = crop_min_x.min(min_x);
            crop_max_x = crop_max_x.max(max_x);
            crop_min_y = crop_min_y.min(y);
            crop_max_y = crop_max_y.max(y);
        }
        matrix.extend(row);
    }

    let crop = if auto_crop && crop_min_x <= crop_max_x {
        Some((crop_min_x, crop_min_y, crop_max_x + 1, crop_max_y + 1))
    } else {
        None
    };

    Retained {
        matrix,
        width,
        height,
        crop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disjoint_set::DisjointSet;
    use crate::mapbuffer::stitcher::{detect_completed, join_seams};

    #[test]
    fn interior_object_survives_retain_and_boundary_object_is_dropped() {
        // 3x3 grid of 2x2 frames; label = row-major index + 1. Center (5) is
        // interior; corners (e.g. 1) touch the outer boundary.
        let mut frames = Vec::new();
        let mut label = 1i32;
        for row in 0..3 {
            for col in 0..3 {
                frames.push(Frame::new_int32((col * 2, row * 2), vec![label; 4], 2, 2));
                label += 1;
            }
        }
        let mut ds = DisjointSet::new();
        ds.expand(9).unwrap();
        for i in 1..frames.len() {
            let (head, new_frame) = frames.split_at(i);
            join_seams(head, &new_frame[0], &mut ds);
        }

        let query = Rect::new(0, 0, 6, 6);
        let (completed, boundary) = detect_completed(&frames, query, &ds);

        let retained = reindex_and_retain_completed(&frames, query, query, &ds, &completed, &boundary, false);
        // Center frame occupies rows 2..4, cols 2..4 in the 6x6 matrix.
        assert_eq!(retained.matrix[2 * 6 + 2], 5);
        // A corner pixel (object 1) must be zeroed.
        assert_eq!(retained.matrix[0], 0);
    }

    #[test]
    fn auto_crop_reports_the_non_zero_bounding_box() {
        let frame = Frame::new_int32((0, 0), vec![0, 0, 0, 1, 1, 0, 0, 0, 0], 3, 3);
        let ds = DisjointSet::with_capacity(2).unwrap();
        let mut completed = LabelSet::new();
        completed.insert(1);
        let boundary = LabelSet::new();
        let area = Rect::new(0, 0, 3, 3);
        let retained = reindex_and_retain_completed(&[frame], area, area, &ds, &completed, &boundary, true);
        assert_eq!(retained.crop, Some((0, 1, 2, 2)));
    }
}
