//! Integration-level coverage of the map buffer's cross-frame stitching and
//! retain+reindex pipeline, driven entirely through the public `MapBuffer`
//! API (the scenario two adjacent frames sharing an object across the seam,
//! then a 3x3 grid retained and cropped to its completed objects).

use pyrastitch::mapbuffer::Rect;
use pyrastitch::{Frame, MapBuffer, MapBufferConfig};

#[test]
fn an_object_split_across_two_adjacent_frames_stitches_to_one_label() {
    let mut buf = MapBuffer::new(MapBufferConfig {
        capacity: 4,
        stitching_labels: true,
        auto_reindex_labels: true,
        zero_is_background: true,
        jointing_auto_crop: false,
    });

    // Left frame: object 1 touches the right edge (column 1) at row 0.
    #[rustfmt::skip]
    let left = Frame::new_int32((0, 0), vec![
        0, 1,
        0, 0,
    ], 2, 2);
    // Right frame: object 1 touches the left edge (column 0) at row 0,
    // continuing the same physical blob.
    #[rustfmt::skip]
    let right = Frame::new_int32((2, 0), vec![
        1, 0,
        0, 0,
    ], 2, 2);

    buf.add(left).unwrap();
    buf.add(right).unwrap();

    let whole = buf.read_matrix_reindexed_by_object_pairs(Rect::new(0, 0, 4, 2), true);
    // (1, 0) from the left frame and (2, 0) from the right frame are the
    // touching pixels; after stitching they must resolve to the same base.
    let left_pixel = whole.matrix[0 * 4 + 1];
    let right_pixel = whole.matrix[0 * 4 + 2];
    assert_ne!(left_pixel, 0);
    assert_eq!(left_pixel, right_pixel);
}

#[test]
fn reindex_and_retain_completed_classifies_interior_objects_as_completed() {
    let mut buf = MapBuffer::new(MapBufferConfig {
        capacity: 9,
        stitching_labels: true,
        auto_reindex_labels: true,
        zero_is_background: true,
        jointing_auto_crop: true,
    });

    // A 3x3 grid of 4x4 frames. Put one small object fully inside the
    // center frame (never touching any frame boundary) and one object that
    // touches the outer edge of the corner frame (boundary-with-outside).
    for gy in 0..3i64 {
        for gx in 0..3i64 {
            let mut cells = vec![0i32; 16];
            if gx == 1 && gy == 1 {
                // Interior 2x2 blob strictly inside the center frame.
                cells[1 * 4 + 1] = 1;
                cells[1 * 4 + 2] = 1;
                cells[2 * 4 + 1] = 1;
                cells[2 * 4 + 2] = 1;
            }
            if gx == 0 && gy == 0 {
                // Touches the top-left (outer) edge of the whole grid.
                cells[0] = 1;
            }
            let frame = Frame::new_int32((gx * 4, gy * 4), cells, 4, 4);
            buf.add(frame).unwrap();
        }
    }

    assert_eq!(buf.frame_count(), 9);
    let large_area = Rect::new(0, 0, 12, 12);
    let center_frame_area = Rect::new(4, 4, 8, 8);
    let retained = buf.reindex_and_retain_completed(large_area, center_frame_area);

    // The interior blob in the center frame must survive as a completed
    // object somewhere in the retained matrix.
    assert!(retained.matrix.iter().any(|&v| v != 0));
}

#[test]
fn capacity_bound_ring_still_tracks_the_correct_containing_rectangle() {
    let mut buf = MapBuffer::new(MapBufferConfig {
        capacity: 2,
        stitching_labels: false,
        auto_reindex_labels: false,
        zero_is_background: true,
        jointing_auto_crop: false,
    });
    buf.add(Frame::new_int32((0, 0), vec![0; 4], 2, 2)).unwrap();
    buf.add(Frame::new_int32((2, 0), vec![0; 4], 2, 2)).unwrap();
    buf.add(Frame::new_int32((4, 0), vec![0; 4], 2, 2)).unwrap();
    assert_eq!(buf.frame_count(), 2);
    assert_eq!(buf.containing_rectangle(), Some(Rect::new(2, 0, 6, 2)));
}
