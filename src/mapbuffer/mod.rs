//! The map buffer (`C10`): a bounded in-memory ring of labeled frames, with
//! cross-frame object stitching (`C11`) and retain+reindex (`C12`) layered
//! on top. [`registry`] (`C13`) is the process-wide table of these by id.

pub mod frame;
pub mod reindex;
pub mod registry;
pub mod stitcher;

use std::collections::VecDeque;

use crate::disjoint_set::DisjointSet;
use crate::error::TiffResult;
use crate::label_set::LabelSet;

pub use frame::{Frame, FrameMatrix, Rect};
pub use reindex::Retained;
pub use registry::{BufferHandle, BufferRegistry};

/// Construction-time policy for a `MapBuffer`. Mirrors the spec's flat
/// field list so call sites can build one from a deserialized config
/// record without an intermediate builder.
#[derive(Debug, Clone, Copy)]
pub struct MapBufferConfig {
    pub capacity: usize,
    pub stitching_labels: bool,
    pub auto_reindex_labels: bool,
    pub zero_is_background: bool,
    pub jointing_auto_crop: bool,
}

impl Default for MapBufferConfig {
    fn default() -> Self {
        MapBufferConfig {
            capacity: 16,
            stitching_labels: true,
            auto_reindex_labels: true,
            zero_is_background: true,
            jointing_auto_crop: false,
        }
    }
}

/// A bounded ring of retained `Frame`s plus the bookkeeping `add`,
/// `reindex_and_retain_completed`, and the plain read paths need.
pub struct MapBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
    containing_rectangle: Option<Rect>,
    object_pairs: DisjointSet,
    reindexed_completed: LabelSet,
    reindexed_boundary_with_outside: LabelSet,
    next_label: u32,
    stitching_labels: bool,
    auto_reindex_labels: bool,
    zero_is_background: bool,
    jointing_auto_crop: bool,
}

impl MapBuffer {
    pub fn new(config: MapBufferConfig) -> Self {
        MapBuffer {
            frames: VecDeque::new(),
            capacity: config.capacity.max(1),
            containing_rectangle: None,
            object_pairs: DisjointSet::new(),
            reindexed_completed: LabelSet::new(),
            reindexed_boundary_with_outside: LabelSet::new(),
            next_label: if config.zero_is_background { 1 } else { 0 },
            stitching_labels: config.stitching_labels,
            auto_reindex_labels: config.auto_reindex_labels,
            zero_is_background: config.zero_is_background,
            jointing_auto_crop: config.jointing_auto_crop,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn containing_rectangle(&self) -> Option<Rect> {
        self.containing_rectangle
    }

    pub fn object_count(&self) -> u32 {
        self.next_label.saturating_sub(u32::from(self.zero_is_background))
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        self.recompute_containing_rectangle();
    }

    fn recompute_containing_rectangle(&mut self) {
        self.containing_rectangle = self
            .frames
            .iter()
            .map(Frame::rect)
            .reduce(|a, b| a.union(&b));
    }

    /// `add(frame, newLabelOffset)`: offsets the frame's labels (if
    /// `auto_reindex_labels`), joins seams against every retained frame (if
    /// `stitching_labels`), appends to the ring, and evicts the oldest
    /// frame if over capacity.
    pub fn add(&mut self, mut incoming: Frame) -> TiffResult<()> {
        if self.auto_reindex_labels {
            if let FrameMatrix::Int32(data) = &mut incoming.matrix {
                let offset = self.next_label;
                let mut max_raw = 0u32;
                for label in data.iter_mut() {
                    if *label != 0 {
                        max_raw = max_raw.max(*label as u32);
                        *label += offset as i32;
                    }
                }
                if max_raw > 0 {
                    self.object_pairs.expand((offset + max_raw) as i32)?;
                    self.next_label = offset + max_raw + 1;
                }
            }
        }

        if self.stitching_labels {
            let retained: Vec<Frame> = self.frames.iter().cloned().collect();
            stitcher::join_seams(&retained, &incoming, &mut self.object_pairs);
        }

        self.frames.push_back(incoming);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        self.recompute_containing_rectangle();
        Ok(())
    }

    /// Empties the ring. If `reset_indexing`, also resets the label
    /// counter and discards the disjoint-set and cached classification.
    pub fn clear(&mut self, reset_indexing: bool) {
        self.frames.clear();
        self.containing_rectangle = None;
        if reset_indexing {
            self.next_label = if self.zero_is_background { 1 } else { 0 };
            self.object_pairs = DisjointSet::new();
            self.reindexed_completed.clear();
            self.reindexed_boundary_with_outside.clear();
        }
    }

    /// `readMatrix`: the raw label of the top-most retained frame covering
    /// each pixel of `area`, with no stitching/completeness filtering.
    pub fn read_matrix(&self, area: Rect) -> Retained {
        self.read_matrix_impl(area, false)
    }

    /// `readMatrixReindexedByObjectPairs`: like `read_matrix`, but every raw
    /// label is mapped through the disjoint-set's canonical base first. If
    /// `resolve_first`, `resolveAllBases` runs (in parallel) before reading.
    pub fn read_matrix_reindexed_by_object_pairs(&mut self, area: Rect, resolve_first: bool) -> Retained {
        if resolve_first {
            self.object_pairs.resolve_all_bases();
        }
        self.read_matrix_impl(area, true)
    }

    fn read_matrix_impl(&self, area: Rect, resolve: bool) -> Retained {
        let width = area.width().max(0) as u32;
        let height = area.height().max(0) as u32;
        let mut matrix = Vec::with_capacity(width as usize * height as usize);
        for row in 0..height {
            let y = area.y0 + row as i64;
            for col in 0..width {
                let x = area.x0 + col as i64;
                let raw = self
                    .frames
                    .iter()
                    .rev()
                    .find_map(|frame| frame.label_at(x, y))
                    .unwrap_or(0);
                let value = if resolve && raw != 0 {
                    self.object_pairs.parent_or_this(raw)
                } else {
                    raw
                };
                matrix.push(value);
            }
        }
        Retained {
            matrix,
            width,
            height,
            crop: None,
        }
    }

    /// `reindexAndRetainCompleted`: classifies completed vs. boundary-
    /// touching objects over `large_area`, then composes the retained
    /// matrix, applying `jointing_auto_crop` unless the caller overrides it.
    pub fn reindex_and_retain_completed(&mut self, large_area: Rect, small_frame_area: Rect) -> Retained {
        let frames: Vec<Frame> = self.frames.iter().cloned().collect();
        let (completed, boundary) = stitcher::detect_completed(&frames, large_area, &self.object_pairs);
        self.reindexed_completed = completed.clone();
        self.reindexed_boundary_with_outside = boundary.clone();
        reindex::reindex_and_retain_completed(
            &frames,
            large_area,
            small_frame_area,
            &self.object_pairs,
            &completed,
            &boundary,
            self.jointing_auto_crop,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_evicts_the_oldest_frame() {
        let mut buf = MapBuffer::new(MapBufferConfig {
            capacity: 2,
            auto_reindex_labels: false,
            stitching_labels: false,
            ..MapBufferConfig::default()
        });
        buf.add(Frame::new_int32((0, 0), vec![1; 4], 2, 2)).unwrap();
        buf.add(Frame::new_int32((2, 0), vec![2; 4], 2, 2)).unwrap();
        buf.add(Frame::new_int32((4, 0), vec![3; 4], 2, 2)).unwrap();
        assert_eq!(buf.frame_count(), 2);
        assert_eq!(buf.containing_rectangle(), Some(Rect::new(2, 0, 6, 2)));
    }

    #[test]
    fn auto_reindex_offsets_labels_across_frames() {
        let mut buf = MapBuffer::new(MapBufferConfig {
            stitching_labels: false,
            ..MapBufferConfig::default()
        });
        buf.add(Frame::new_int32((0, 0), vec![1, 0, 0, 1], 2, 2)).unwrap();
        buf.add(Frame::new_int32((2, 0), vec![1, 0, 0, 1], 2, 2)).unwrap();
        let read = buf.read_matrix(Rect::new(0, 0, 4, 2));
        // Second frame's label 1 must have been offset past the first's.
        assert_ne!(read.matrix[2], read.matrix[0]);
        assert!(read.matrix[2] > read.matrix[0]);
    }

    #[test]
    fn clear_with_reset_restarts_label_numbering() {
        let mut buf = MapBuffer::new(MapBufferConfig::default());
        buf.add(Frame::new_int32((0, 0), vec![1, 1, 1, 1], 2, 2)).unwrap();
        assert!(buf.object_count() > 0);
        buf.clear(true);
        assert_eq!(buf.object_count(), 0);
        assert_eq!(buf.frame_count(), 0);
    }
}
