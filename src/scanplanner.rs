//! Scan planner (`C14`): enumerates an auto-scanning sequence of frame
//! rectangles over a ROI of a pyramid level.
//!
//! Modeled as a plain `Iterator` rather than a coroutine-style generator,
//! per the design notes: a pull-style lazy sequence of `(rect, flags)`,
//! cancellable by simply stopping iteration.

/// A rectangle in pyramid-level pixel coordinates, half-open on `x1`/`y1`.
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
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanningSequence {
    /// No tiling: a single frame covering the whole ROI.
    None,
    RowsLtr,
    RowsSnake,
    ColsTtb,
    ColsSnake,
    /// Row-major or column-major, whichever grid dimension is shorter.
    ShortestSide,
    ShortestSideSnake,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanFrame {
    pub rect: Rect,
    pub x_index: u32,
    pub y_index: u32,
    pub first_in_roi: bool,
    pub last_in_roi: bool,
    pub first_in_pyramid: bool,
    pub last_in_pyramid: bool,
    pub last_overall: bool,
}

/// Enumerates frame rectangles over `roi` of a `(level_w, level_h)` pyramid
/// level, in frame_size-sized cells, in the order `mode` dictates.
pub struct ScanPlanner {
    roi: Rect,
    frame_w: u32,
    frame_h: u32,
    n_cols: u32,
    n_rows: u32,
    order: Vec<(u32, u32)>,
    pos: usize,
    is_first_in_pyramid: bool,
    is_last_in_pyramid: bool,
}

impl ScanPlanner {
    pub fn new(
        level_w: u32,
        level_h: u32,
        roi: Rect,
        frame_w: u32,
        frame_h: u32,
        mode: ScanningSequence,
        equalize_grid: bool,
    ) -> Self {
        let roi = Rect::new(
            roi.x0.min(level_w),
            roi.y0.min(level_h),
            roi.x1.min(level_w),
            roi.y1.min(level_h),
        );
        let roi_w = roi.width().max(1);
        let roi_h = roi.height().max(1);

        if mode == ScanningSequence::None {
            return ScanPlanner {
                roi,
                frame_w: roi_w,
                frame_h: roi_h,
                n_cols: 1,
                n_rows: 1,
                order: vec![(0, 0)],
                pos: 0,
                is_first_in_pyramid: true,
                is_last_in_pyramid: true,
            };
        }

        let frame_w = frame_w.max(1);
        let frame_h = frame_h.max(1);
        let n_cols = roi_w.div_ceil(frame_w);
        let n_rows = roi_h.div_ceil(frame_h);

        let (eff_w, eff_h) = if equalize_grid {
            (roi_w.div_ceil(n_cols.max(1)), roi_h.div_ceil(n_rows.max(1)))
        } else {
            (frame_w, frame_h)
        };

        let row_major = match mode {
            ScanningSequence::RowsLtr | ScanningSequence::RowsSnake => true,
            ScanningSequence::ColsTtb | ScanningSequence::ColsSnake => false,
            ScanningSequence::ShortestSide | ScanningSequence::ShortestSideSnake => n_cols <= n_rows,
            ScanningSequence::None => unreachable!(),
        };
        let snake = matches!(
            mode,
            ScanningSequence::RowsSnake | ScanningSequence::ColsSnake | ScanningSequence::ShortestSideSnake
        );

        let mut order = Vec::with_capacity((n_cols * n_rows) as usize);
        if row_major {
            for row in 0..n_rows {
                let reversed = snake && row % 2 == 1;
                if reversed {
                    for col in (0..n_cols).rev() {
                        order.push((col, row));
                    }
                } else {
                    for col in 0..n_cols {
                        order.push((col, row));
                    }
                }
            }
        } else {
            for col in 0..n_cols {
                let reversed = snake && col % 2 == 1;
                if reversed {
                    for row in (0..n_rows).rev() {
                        order.push((col, row));
                    }
                } else {
                    for row in 0..n_rows {
                        order.push((col, row));
                    }
                }
            }
        }

        ScanPlanner {
            roi,
            frame_w: eff_w,
            frame_h: eff_h,
            n_cols,
            n_rows,
            order,
            pos: 0,
            is_first_in_pyramid: true,
            is_last_in_pyramid: true,
        }
    }

    /// Marks this planner's stream as a non-first and/or non-last ROI
    /// within a larger caller-driven sequence spanning multiple ROIs of the
    /// same pyramid level.
    pub fn with_pyramid_position(mut self, first_in_pyramid: bool, last_in_pyramid: bool) -> Self {
        self.is_first_in_pyramid = first_in_pyramid;
        self.is_last_in_pyramid = last_in_pyramid;
        self
    }

    /// Number of frames in one row (row-major) or one column (column-major)
    /// series — the `framesPerSeries` output scalar.
    pub fn frames_per_series(&self) -> u32 {
        if self.n_cols <= self.n_rows {
            self.n_cols
        } else {
            self.n_rows
        }
        .max(1)
    }

    pub fn total_frames(&self) -> usize {
        self.order.len()
    }

    /// A one-pixel expansion is enough for the stitcher to see every seam;
    /// this is the `recommendedExpansion` output scalar.
    pub fn recommended_expansion(&self) -> u32 {
        1
    }

    /// Enough frames to hold one full row/column series plus the next
    /// frame the stitcher needs to see a seam against.
    pub fn recommended_frames_in_buffer(&self) -> usize {
        self.frames_per_series() as usize + 1
    }
}

impl Iterator for ScanPlanner {
    type Item = ScanFrame;

    fn next(&mut self) -> Option<ScanFrame> {
        let (col, row) = *self.order.get(self.pos)?;
        let x0 = self.roi.x0 + col * self.frame_w;
        let y0 = self.roi.y0 + row * self.frame_h;
        let x1 = (x0 + self.frame_w).min(self.roi.x1);
        let y1 = (y0 + self.frame_h).min(self.roi.y1);

        let first_in_roi = self.pos == 0;
        let last_in_roi = self.pos + 1 == self.order.len();
        let frame = ScanFrame {
            rect: Rect::new(x0, y0, x1, y1),
            x_index: col,
            y_index: row,
            first_in_roi,
            last_in_roi,
            first_in_pyramid: first_in_roi && self.is_first_in_pyramid,
            last_in_pyramid: last_in_roi && self.is_last_in_pyramid,
            last_overall: last_in_roi && self.is_last_in_pyramid,
        };
        self.pos += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_rows_produce_the_documented_8x4_grid() {
        let planner = ScanPlanner::new(
            1000,
            500,
            Rect::new(0, 0, 1000, 500),
            128,
            128,
            ScanningSequence::RowsSnake,
            false,
        );
        assert_eq!(planner.frames_per_series(), 8);
        let frames: Vec<_> = planner.collect();
        assert_eq!(frames.len(), 32);

        let row0: Vec<u32> = frames[0..8].iter().map(|f| f.x_index).collect();
        assert_eq!(row0, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        let row1: Vec<u32> = frames[8..16].iter().map(|f| f.x_index).collect();
        assert_eq!(row1, vec![7, 6, 5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn first_and_last_flags_mark_stream_ends() {
        let planner = ScanPlanner::new(256, 256, Rect::new(0, 0, 256, 256), 128, 128, ScanningSequence::RowsLtr, false);
        let frames: Vec<_> = planner.collect();
        assert!(frames.first().unwrap().first_in_roi);
        assert!(frames.last().unwrap().last_in_roi);
        assert!(frames[1..frames.len() - 1].iter().all(|f| !f.first_in_roi && !f.last_in_roi));
    }

    #[test]
    fn equalize_grid_balances_the_last_cell_without_changing_cell_count() {
        let planner = ScanPlanner::new(300, 100, Rect::new(0, 0, 300, 100), 128, 100, ScanningSequence::RowsLtr, true);
        // 3 columns regardless of equalize_grid; cell width becomes ceil(300/3)=100.
        assert_eq!(planner.n_cols, 3);
        let frames: Vec<_> = planner.collect();
        assert_eq!(frames.len(), 3);
        assert!(frames.iter().all(|f| f.rect.width() == 100));
    }

    #[test]
    fn none_mode_yields_a_single_whole_roi_frame() {
        let planner = ScanPlanner::new(1000, 1000, Rect::new(10, 10, 500, 500), 64, 64, ScanningSequence::None, false);
        let frames: Vec<_> = planner.collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].rect, Rect::new(10, 10, 500, 500));
    }
}
