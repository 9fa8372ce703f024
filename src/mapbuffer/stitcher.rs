//! Stitcher (`C11`): seam-wise label joining across abutting frames, and
//! completed-object detection against the frames currently retained in a
//! [`super::MapBuffer`](crate::mapbuffer::MapBuffer).

use crate::disjoint_set::DisjointSet;
use crate::label_set::LabelSet;
use crate::mapbuffer::frame::{Frame, Rect};

/// Scans the one-pixel seam between `new_frame` and every already-retained
/// frame it touches, joining every pair of non-zero labels that face each
/// other across the shared edge.
pub fn join_seams(retained: &[Frame], new_frame: &Frame, object_pairs: &mut DisjointSet) {
    let new_rect = new_frame.rect();
    for other in retained {
        if std::ptr::eq(other, new_frame) {
            continue;
        }
        join_pair(other, new_frame, object_pairs);
        let _ = new_rect;
    }
}

/// Joins labels across the shared seam between two frames, if they share
/// one. A seam exists when the two rectangles abut edge-to-edge (touching,
/// not overlapping) along a run of at least one pixel.
fn join_pair(a: &Frame, b: &Frame, object_pairs: &mut DisjointSet) {
    let ra = a.rect();
    let rb = b.rect();

    // Vertical seam: a's right edge against b's left edge, or vice versa.
    if ra.x1 == rb.x0 || rb.x1 == ra.x0 {
        let (left, right) = if ra.x1 == rb.x0 { (a, b) } else { (b, a) };
        let y0 = ra.y0.max(rb.y0);
        let y1 = ra.y1.min(rb.y1);
        let seam_x_left = left.rect().x1 - 1;
        let seam_x_right = right.rect().x0;
        for y in y0..y1 {
            join_if_both_labeled(left, seam_x_left, y, right, seam_x_right, y, object_pairs);
        }
    }

    // Horizontal seam: a's bottom edge against b's top edge, or vice versa.
    if ra.y1 == rb.y0 || rb.y1 == ra.y0 {
        let (top, bottom) = if ra.y1 == rb.y0 { (a, b) } else { (b, a) };
        let x0 = ra.x0.max(rb.x0);
        let x1 = ra.x1.min(rb.x1);
        let seam_y_top = top.rect().y1 - 1;
        let seam_y_bottom = bottom.rect().y0;
        for x in x0..x1 {
            join_if_both_labeled(top, x, seam_y_top, bottom, x, seam_y_bottom, object_pairs);
        }
    }
}

fn join_if_both_labeled(
    frame_a: &Frame,
    xa: i64,
    ya: i64,
    frame_b: &Frame,
    xb: i64,
    yb: i64,
    object_pairs: &mut DisjointSet,
) {
    let (Some(la), Some(lb)) = (frame_a.label_at(xa, ya), frame_b.label_at(xb, yb)) else {
        return;
    };
    if la == 0 || lb == 0 {
        return;
    }
    let _ = object_pairs.joint_objects(la, lb);
}

/// For every pixel on `frame`'s perimeter, reports whether the pixel
/// immediately outside that edge position is covered by any *other* frame
/// in `all`. A `false` means that perimeter pixel faces open space (or the
/// edge of the buffer's tracked region) rather than another retained
/// frame, i.e. it is on the external boundary of the union of frames.
fn is_externally_exposed(all: &[Frame], frame_idx: usize, x: i64, y: i64, outside_x: i64, outside_y: i64) -> bool {
    for (idx, other) in all.iter().enumerate() {
        if idx == frame_idx {
            continue;
        }
        let r = other.rect();
        if outside_x >= r.x0 && outside_x < r.x1 && outside_y >= r.y0 && outside_y < r.y1 {
            return false;
        }
    }
    let _ = (x, y);
    true
}

/// Classifies every object visible within `query_area` as completed (fully
/// surrounded by other retained frames, on every side) or boundary-touching
/// (at least one pixel sits on an external boundary segment of the union of
/// retained frames). Bases are resolved through `object_pairs` before being
/// recorded, so union membership established by `join_seams` is reflected.
pub fn detect_completed(frames: &[Frame], query_area: Rect, object_pairs: &DisjointSet) -> (LabelSet, LabelSet) {
    let mut seen = LabelSet::new();
    let mut boundary = LabelSet::new();

    for frame in frames {
        let Some(overlap) = frame.rect().intersection(&query_area) else {
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

    for (idx, frame) in frames.iter().enumerate() {
        let r = frame.rect();
        if r.intersection(&query_area).is_none() {
            continue;
        }
        // Top and bottom edges.
        for x in r.x0..r.x1 {
            mark_if_exposed(frames, idx, frame, x, r.y0, x, r.y0 - 1, query_area, object_pairs, &mut boundary);
            mark_if_exposed(
                frames,
                idx,
                frame,
                x,
                r.y1 - 1,
                x,
                r.y1,
                query_area,
                object_pairs,
                &mut boundary,
            );
        }
        // Left and right edges.
        for y in r.y0..r.y1 {
            mark_if_exposed(frames, idx, frame, r.x0, y, r.x0 - 1, y, query_area, object_pairs, &mut boundary);
            mark_if_exposed(
                frames,
                idx,
                frame,
                r.x1 - 1,
                y,
                r.x1,
                y,
                query_area,
                object_pairs,
                &mut boundary,
            );
        }
    }

    (seen, boundary)
}

#[allow(clippy::too_many_arguments)]
fn mark_if_exposed(
    frames: &[Frame],
    idx: usize,
    frame: &Frame,
    x: i64,
    y: i64,
    outside_x: i64,
    outside_y: i64,
    query_area: Rect,
    object_pairs: &DisjointSet,
    boundary: &mut LabelSet,
) {
    if x < query_area.x0 || x >= query_area.x1 || y < query_area.y0 || y >= query_area.y1 {
        return;
    }
    if !is_externally_exposed(frames, idx, x, y, outside_x, outside_y) {
        return;
    }
    if let Some(label) = frame.label_at(x, y) {
        if label != 0 {
            boundary.insert(object_pairs.parent_or_this(label) as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abutting_frames_join_labels_across_the_seam() {
        let left = Frame::new_int32((0, 0), vec![1, 1, 1, 1], 2, 2);
        let right = Frame::new_int32((2, 0), vec![2, 2, 2, 2], 2, 2);
        let mut ds = DisjointSet::new();
        ds.expand(2).unwrap();
        let retained = vec![left.clone()];
        join_seams(&retained, &right, &mut ds);
        assert_eq!(ds.find_base(1), ds.find_base(2));
    }

    #[test]
    fn center_frame_of_a_3x3_grid_is_fully_interior() {
        // 3x3 grid of 2x2 frames, each filled with a distinct label equal to
        // its row-major index + 1. The center frame (index 4) touches no
        // external boundary.
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
        let query = Rect::new(0, 0, 6, 6);
        let (seen, boundary) = detect_completed(&frames, query, &ds);
        assert!(seen.contains(5)); // center frame's label
        assert!(!boundary.contains(5));
        assert!(boundary.contains(1)); // corner frame touches two external edges
    }
}
