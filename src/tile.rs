//! The tile grid (`C4`): a rectangular piece of an IFD image, plus the
//! `TiffMap` that owns the whole grid for one IFD.

use crate::error::{TiffError, TiffResult};
use crate::ifd::Ifd;

/// One grid cell of an IFD image.
///
/// `unset_mask` tracks, one bit per row, whether that row has ever been
/// written via `update_samples` — used to tell a genuinely empty tile from
/// one that is merely unencoded so far.
#[derive(Debug, Clone)]
pub struct Tile {
    pub plane: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub decoded: Option<Vec<u8>>,
    pub encoded: Option<Vec<u8>>,
    pub stored: Option<(u64, u64)>,
    pub separated_samples: bool,
    unset_rows: Vec<bool>,
}

impl Tile {
    fn empty(plane: u32, x: u32, y: u32, w: u32, h: u32) -> Self {
        Tile {
            plane,
            x,
            y,
            w,
            h,
            decoded: None,
            encoded: None,
            stored: None,
            separated_samples: false,
            unset_rows: vec![true; h as usize],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unset_rows.iter().all(|&unset| unset)
    }

    pub fn has_decoded(&self) -> bool {
        self.decoded.is_some()
    }

    pub fn has_encoded(&self) -> bool {
        self.encoded.is_some()
    }

    /// Drops rows that were never written from the "unset" bookkeeping scope
    /// without touching the backing buffer — used by strip layouts whose
    /// cropped border tiles are shorter than a full grid cell.
    pub fn crop_all_unset(&mut self, valid_rows: u32) {
        self.unset_rows.truncate(valid_rows as usize);
    }

    pub fn reduce_unset_in_tile(&mut self, row_offset: u32, count: u32) {
        for row in row_offset..(row_offset + count).min(self.unset_rows.len() as u32) {
            self.unset_rows[row as usize] = false;
        }
    }
}

/// One of the three copy shapes `updateSamples` may take, chosen from
/// `(planarSeparated, autoInterleave)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyShape {
    ChunkyDirect,
    ChunkyDeinterleave,
    Planar,
}

/// Owns one IFD's tile grid. A *resizable* map grows its IFD's dimensions as
/// writes arrive; a fixed map rejects writes outside the declared extent.
pub struct TiffMap {
    pub ifd: Ifd,
    pub resizable: bool,
    pub auto_interleave: bool,
    tile_size_x: u32,
    tile_size_y: u32,
    tiles_per_row: u32,
    tiles_per_col: u32,
    planes: u32,
    grid: Vec<Option<Tile>>,
}

impl TiffMap {
    pub fn new(ifd: Ifd, resizable: bool, auto_interleave: bool) -> TiffResult<Self> {
        let tile_size_x = ifd.tile_size_x()?.max(1);
        let tile_size_y = ifd.tile_size_y()?.max(1);
        let tiles_per_row = ifd.tiles_per_row()?;
        let tiles_per_col = ifd.tiles_per_column()?;
        let planes = ifd.planes();
        let grid_len = (planes * tiles_per_row * tiles_per_col) as usize;
        Ok(TiffMap {
            ifd,
            resizable,
            auto_interleave,
            tile_size_x,
            tile_size_y,
            tiles_per_row,
            tiles_per_col,
            planes,
            grid: vec![None; grid_len],
        })
    }

    fn index(&self, plane: u32, ty: u32, tx: u32) -> usize {
        ((plane * self.tiles_per_col + ty) * self.tiles_per_row + tx) as usize
    }

    fn cell_dims(&self, ty: u32, tx: u32) -> TiffResult<(u32, u32)> {
        let dim_x = self.ifd.image_dim_x()?;
        let dim_y = self.ifd.image_dim_y()?;
        let is_tiled = self.ifd.is_tiled();
        let w = if is_tiled {
            self.tile_size_x
        } else {
            (dim_x - tx * self.tile_size_x).min(self.tile_size_x)
        };
        let h = if is_tiled {
            self.tile_size_y
        } else {
            (dim_y - ty * self.tile_size_y).min(self.tile_size_y)
        };
        Ok((w, h))
    }

    pub fn get_or_create(&mut self, plane: u32, tx: u32, ty: u32) -> TiffResult<&mut Tile> {
        if plane >= self.planes || tx >= self.tiles_per_row || ty >= self.tiles_per_col {
            return Err(TiffError::InvalidArgument(format!(
                "tile index ({plane},{tx},{ty}) outside the grid"
            )));
        }
        let idx = self.index(plane, ty, tx);
        if self.grid[idx].is_none() {
            let (w, h) = self.cell_dims(ty, tx)?;
            self.grid[idx] = Some(Tile::empty(
                plane,
                tx * self.tile_size_x,
                ty * self.tile_size_y,
                w,
                h,
            ));
        }
        Ok(self.grid[idx].as_mut().unwrap())
    }

    pub fn tile(&self, plane: u32, tx: u32, ty: u32) -> Option<&Tile> {
        self.grid.get(self.index(plane, ty, tx))?.as_ref()
    }

    /// Removes and returns the tile at `(plane, tx, ty)`, leaving the grid
    /// slot empty. Used by the writer's completion pass, which needs to hold
    /// a tile mutably while also reading `self.ifd` immutably.
    pub fn take_tile(&mut self, plane: u32, tx: u32, ty: u32) -> Option<Tile> {
        let idx = self.index(plane, ty, tx);
        self.grid.get_mut(idx).and_then(|slot| slot.take())
    }

    /// Reinserts a tile previously removed with `take_tile`.
    pub fn put_tile(&mut self, plane: u32, tx: u32, ty: u32, tile: Tile) {
        let idx = self.index(plane, ty, tx);
        if let Some(slot) = self.grid.get_mut(idx) {
            *slot = Some(tile);
        }
    }

    pub fn tiles_per_row(&self) -> u32 {
        self.tiles_per_row
    }

    pub fn tiles_per_col(&self) -> u32 {
        self.tiles_per_col
    }

    fn copy_shape(&self) -> CopyShape {
        if self.ifd.is_planar_separated() {
            CopyShape::Planar
        } else if self.auto_interleave {
            CopyShape::ChunkyDeinterleave
        } else {
            CopyShape::ChunkyDirect
        }
    }

    /// Splats a chunky source buffer `src` (rows of `size_x` pixels, each
    /// `channels` samples wide) onto every overlapping tile.
    pub fn update_samples(
        &mut self,
        src: &[u8],
        from_x: u32,
        from_y: u32,
        size_x: u32,
        size_y: u32,
        bytes_per_sample: u32,
    ) -> TiffResult<()> {
        let channels = self.ifd.samples_per_pixel().max(1);
        let shape = self.copy_shape();
        let first_tx = from_x / self.tile_size_x;
        let last_tx = (from_x + size_x - 1) / self.tile_size_x;
        let first_ty = from_y / self.tile_size_y;
        let last_ty = (from_y + size_y - 1) / self.tile_size_y;
        let src_row_stride = size_x as usize * channels as usize * bytes_per_sample as usize;

        let plane_count = match shape {
            CopyShape::Planar => channels,
            _ => 1,
        };

        for plane in 0..plane_count {
            for ty in first_ty..=last_ty {
                for tx in first_tx..=last_tx {
                    let tile = self.get_or_create(plane, tx, ty)?;
                    let inside_from_x = from_x.max(tile.x) - tile.x;
                    let inside_from_y = from_y.max(tile.y) - tile.y;
                    let inside_size_x = (from_x + size_x).min(tile.x + tile.w) - tile.x.max(from_x);
                    let inside_size_y =
                        (from_y + size_y).min(tile.y + tile.h) - tile.y.max(from_y);

                    let tile_channels = match shape {
                        CopyShape::Planar => 1,
                        _ => channels,
                    };
                    let tile_row_stride =
                        tile.w as usize * tile_channels as usize * bytes_per_sample as usize;
                    let decoded = tile
                        .decoded
                        .get_or_insert_with(|| vec![0u8; tile_row_stride * tile.h as usize]);

                    let src_origin_x = (tile.x + inside_from_x - from_x) as usize;
                    let src_origin_y = (tile.y + inside_from_y - from_y) as usize;

                    match shape {
                        CopyShape::ChunkyDirect => {
                            let row_bytes =
                                inside_size_x as usize * channels as usize * bytes_per_sample as usize;
                            for row in 0..inside_size_y as usize {
                                let src_off = (src_origin_y + row) * src_row_stride
                                    + src_origin_x * channels as usize * bytes_per_sample as usize;
                                let dst_off = (inside_from_y as usize + row) * tile_row_stride
                                    + inside_from_x as usize * channels as usize * bytes_per_sample as usize;
                                decoded[dst_off..dst_off + row_bytes]
                                    .copy_from_slice(&src[src_off..src_off + row_bytes]);
                            }
                        }
                        CopyShape::ChunkyDeinterleave => {
                            tile.separated_samples = true;
                            for row in 0..inside_size_y as usize {
                                for col in 0..inside_size_x as usize {
                                    for ch in 0..channels as usize {
                                        let src_off = (src_origin_y + row) * src_row_stride
                                            + (src_origin_x + col) * channels as usize * bytes_per_sample as usize
                                            + ch * bytes_per_sample as usize;
                                        let dst_off = ch * (tile.w as usize * tile.h as usize * bytes_per_sample as usize)
                                            + (inside_from_y as usize + row) * tile.w as usize * bytes_per_sample as usize
                                            + (inside_from_x as usize + col) * bytes_per_sample as usize;
                                        let width = bytes_per_sample as usize;
                                        decoded[dst_off..dst_off + width]
                                            .copy_from_slice(&src[src_off..src_off + width]);
                                    }
                                }
                            }
                        }
                        CopyShape::Planar => {
                            let row_bytes = inside_size_x as usize * bytes_per_sample as usize;
                            for row in 0..inside_size_y as usize {
                                let src_off = (src_origin_y + row) * src_row_stride
                                    + src_origin_x * channels as usize * bytes_per_sample as usize
                                    + plane as usize * bytes_per_sample as usize;
                                let dst_off = (inside_from_y as usize + row) * tile_row_stride
                                    + inside_from_x as usize * bytes_per_sample as usize;
                                for col in 0..inside_size_x as usize {
                                    let s = src_off + col * channels as usize * bytes_per_sample as usize;
                                    let d = dst_off + col * bytes_per_sample as usize;
                                    decoded[d..d + bytes_per_sample as usize]
                                        .copy_from_slice(&src[s..s + bytes_per_sample as usize]);
                                }
                                let _ = row_bytes;
                            }
                        }
                    }

                    tile.reduce_unset_in_tile(inside_from_y, inside_size_y);
                }
            }
        }
        Ok(())
    }

    /// Grows the IFD's declared dimensions. Only legal on a resizable map;
    /// shrinking is always rejected.
    pub fn expand_dimensions(&mut self, new_x: u32, new_y: u32) -> TiffResult<()> {
        if !self.resizable {
            return Err(TiffError::InvalidArgument(
                "map is not resizable".into(),
            ));
        }
        let cur_x = self.ifd.image_dim_x().unwrap_or(0);
        let cur_y = self.ifd.image_dim_y().unwrap_or(0);
        if new_x < cur_x || new_y < cur_y {
            return Err(TiffError::InvalidArgument(
                "expand_dimensions cannot shrink the image".into(),
            ));
        }
        self.ifd.put(crate::tags::Tag::ImageWidth, new_x)?;
        self.ifd.put(crate::tags::Tag::ImageLength, new_y)?;
        self.tiles_per_row = self.ifd.tiles_per_row()?;
        self.tiles_per_col = self.ifd.tiles_per_column()?;
        let grid_len = (self.planes * self.tiles_per_row * self.tiles_per_col) as usize;
        self.grid.resize_with(grid_len, || None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tag;

    fn fixed_map(w: u32, h: u32, tile: u32) -> TiffMap {
        let mut ifd = Ifd::new(true, false);
        ifd.put(Tag::ImageWidth, w).unwrap();
        ifd.put(Tag::ImageLength, h).unwrap();
        ifd.put(Tag::TileWidth, tile).unwrap();
        ifd.put(Tag::TileLength, tile).unwrap();
        ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
        TiffMap::new(ifd, false, false).unwrap()
    }

    #[test]
    fn grid_dims_match_ceil_division() {
        let map = fixed_map(100, 50, 32);
        assert_eq!(map.tiles_per_row(), 4);
        assert_eq!(map.tiles_per_col(), 2);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut map = fixed_map(64, 64, 32);
        let tile = map.get_or_create(0, 0, 0).unwrap();
        assert!(tile.is_empty());
        assert_eq!((tile.w, tile.h), (32, 32));
    }

    #[test]
    fn update_samples_writes_a_single_tile_direct_copy() {
        let mut map = fixed_map(32, 32, 32);
        let src = vec![7u8; 32 * 32];
        map.update_samples(&src, 0, 0, 32, 32, 1).unwrap();
        let tile = map.tile(0, 0, 0).unwrap();
        assert!(!tile.is_empty());
        assert_eq!(tile.decoded.as_ref().unwrap()[0], 7);
    }

    #[test]
    fn expand_dimensions_rejects_shrink() {
        let mut map = TiffMap::new(
            {
                let mut ifd = Ifd::new(true, false);
                ifd.put(Tag::ImageWidth, 64u32).unwrap();
                ifd.put(Tag::ImageLength, 64u32).unwrap();
                ifd.put(Tag::SamplesPerPixel, 1u16).unwrap();
                ifd
            },
            true,
            false,
        )
        .unwrap();
        assert!(map.expand_dimensions(32, 128).is_err());
        assert!(map.expand_dimensions(128, 128).is_ok());
    }
}
