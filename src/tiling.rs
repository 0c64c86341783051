//! Tile footprints and split/merge of grids across tiles.
//!
//! A `Tile` is an inclusive index rectangle in the parent grid. Split
//! copies each rectangle out with a transform relative to the parent;
//! merge pastes them back and checks that they cover the parent extent.

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult, ConversionWarning};
use crate::grid::{GridBuffer, Sample};
use crate::size::CanonicalSize;
use crate::transforms::Transform;

/// Position of a tile in the tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Inclusive footprint in the parent grid's index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Tile {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> ConversionResult<Self> {
        if min_x > max_x || min_y > max_y {
            return Err(ConversionError::invalid_tile(format!(
                "inverted bounds [{}, {}]x[{}, {}]",
                min_x, max_x, min_y, max_y
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        (self.max_x - self.min_x + 1) as u32
    }

    #[inline]
    pub fn height(&self) -> u32 {
        (self.max_y - self.min_y + 1) as u32
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    /// Whether min <= max on both axes. The fields are public, so tiles
    /// built without [`Tile::new`] may be inverted.
    pub fn is_ordered(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Whether the footprint is ordered and lies inside a `width x height` parent
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.is_ordered()
            && self.min_x >= 0
            && self.min_y >= 0
            && (self.max_x as i64) < width as i64
            && (self.max_y as i64) < height as i64
    }

    fn check_within(&self, width: u32, height: u32) -> ConversionResult<()> {
        if !self.is_ordered() {
            return Err(ConversionError::invalid_tile(format!(
                "inverted bounds [{}, {}]x[{}, {}]",
                self.min_x, self.max_x, self.min_y, self.max_y
            )));
        }
        if !self.fits_within(width, height) {
            return Err(ConversionError::invalid_tile(format!(
                "{:?} exceeds the {}x{} grid",
                self, width, height
            )));
        }
        Ok(())
    }

    /// Disjoint tiles covering a `width x height` grid, at most `tile_size`
    /// samples per axis. Sizes are balanced so every tile keeps at least two
    /// samples per axis, which needs `tile_size >= 3`.
    pub fn partition(width: u32, height: u32, tile_size: u32) -> ConversionResult<Vec<(TileId, Tile)>> {
        if width < 2 || height < 2 {
            return Err(ConversionError::invalid_grid(width, height));
        }
        if tile_size < 3 {
            return Err(ConversionError::invalid_tile(format!(
                "tile size {} is below the minimum of 3",
                tile_size
            )));
        }

        let xs = balanced_spans(width, tile_size);
        let ys = balanced_spans(height, tile_size);
        let mut tiles = Vec::with_capacity(xs.len() * ys.len());
        for (ty, &(y0, y1)) in ys.iter().enumerate() {
            for (tx, &(x0, x1)) in xs.iter().enumerate() {
                tiles.push((
                    TileId::new(tx as u32, ty as u32),
                    Tile {
                        min_x: x0 as i32,
                        min_y: y0 as i32,
                        max_x: x1 as i32,
                        max_y: y1 as i32,
                    },
                ));
            }
        }
        Ok(tiles)
    }

    /// Footprints of the landscape components. Neighbours share their edge
    /// row or column, so these overlap by one sample.
    pub fn component_footprints(canonical: &CanonicalSize) -> Vec<(TileId, Tile)> {
        let step = canonical.quads_per_component() as i32;
        let mut tiles = Vec::with_capacity((canonical.components_x * canonical.components_y) as usize);
        for cy in 0..canonical.components_y {
            for cx in 0..canonical.components_x {
                let min_x = cx as i32 * step;
                let min_y = cy as i32 * step;
                tiles.push((
                    TileId::new(cx, cy),
                    Tile {
                        min_x,
                        min_y,
                        max_x: min_x + step,
                        max_y: min_y + step,
                    },
                ));
            }
        }
        tiles
    }
}

/// Split `len` samples into near-equal inclusive spans of at most `max` samples
fn balanced_spans(len: u32, max: u32) -> Vec<(u32, u32)> {
    let count = len.div_ceil(max);
    let base = len / count;
    let extra = len % count;
    let mut spans = Vec::with_capacity(count as usize);
    let mut start = 0;
    for i in 0..count {
        let size = base + u32::from(i < extra);
        spans.push((start, start + size - 1));
        start += size;
    }
    spans
}

/// Transform of a tile whose origin sits at the tile's minimum corner
pub fn tile_transform(parent: &Transform, tile: &Tile) -> Transform {
    parent.offset_by_cells(tile.min_x as f32, tile.min_y as f32)
}

/// Inverse of [`tile_transform`]
pub fn parent_transform_from_tile(tile_transform: &Transform, tile: &Tile) -> Transform {
    tile_transform.offset_by_cells(-tile.min_x as f32, -tile.min_y as f32)
}

/// Parent extent and the tiles laid over it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayout {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<(TileId, Tile)>,
}

impl TileLayout {
    /// One tile covering the whole grid
    pub fn single(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![(
                TileId::new(0, 0),
                Tile {
                    min_x: 0,
                    min_y: 0,
                    max_x: width as i32 - 1,
                    max_y: height as i32 - 1,
                },
            )],
        }
    }

    pub fn partition(width: u32, height: u32, tile_size: u32) -> ConversionResult<Self> {
        Ok(Self {
            width,
            height,
            tiles: Tile::partition(width, height, tile_size)?,
        })
    }

    /// Partition when `tile_size` is set, a single tile otherwise
    pub fn for_size(width: u32, height: u32, tile_size: Option<u32>) -> ConversionResult<Self> {
        match tile_size {
            Some(size) => Self::partition(width, height, size),
            None => Ok(Self::single(width, height)),
        }
    }

    pub fn get(&self, id: TileId) -> Option<Tile> {
        self.tiles.iter().find(|(tid, _)| *tid == id).map(|(_, t)| *t)
    }

    pub fn ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

/// Merged grid plus overlap notices
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult<T: Sample = f32> {
    pub grid: GridBuffer<T>,
    pub warnings: Vec<ConversionWarning>,
}

/// Splits grids into tiles and merges them back
#[derive(Debug, Clone, Copy, Default)]
pub struct TileAssembler;

impl TileAssembler {
    /// Copy every tile's footprint out of `grid`.
    ///
    /// Each part's transform is the parent transform moved to the tile
    /// origin. Parts are grids, so every tile needs at least two samples per
    /// axis; a single row or column tile fails with `InvalidGrid`. Tiles
    /// from [`Tile::partition`] always satisfy this.
    pub fn split<T: Sample>(grid: &GridBuffer<T>, tiles: &[Tile]) -> ConversionResult<Vec<GridBuffer<T>>> {
        let (width, height) = grid.dims();
        let mut parts = Vec::with_capacity(tiles.len());
        for tile in tiles {
            tile.check_within(width, height)?;
            let (tw, th) = tile.dims();
            let mut values = Vec::with_capacity(tw as usize * th as usize);
            for y in tile.min_y..=tile.max_y {
                let row = grid.row(y as u32);
                values.extend_from_slice(&row[tile.min_x as usize..=tile.max_x as usize]);
            }
            log::debug!("Split tile {:?} ({}x{})", tile, tw, th);
            parts.push(GridBuffer::new(tw, th, values, tile_transform(&grid.transform, tile))?);
        }
        Ok(parts)
    }

    /// Split along a layout, pairing parts with their ids
    pub fn split_layout<T: Sample>(
        grid: &GridBuffer<T>,
        layout: &TileLayout,
    ) -> ConversionResult<Vec<(TileId, GridBuffer<T>)>> {
        let tiles: Vec<Tile> = layout.tiles.iter().map(|(_, t)| *t).collect();
        let parts = Self::split(grid, &tiles)?;
        Ok(layout.ids().zip(parts).collect())
    }

    /// Paste `parts` into a `width x height` grid.
    ///
    /// Uncovered cells fail with `TileCoverage`. Cells written more than
    /// once keep the last part's value and raise one `TileOverlap` warning.
    /// The merged transform comes from the first part.
    pub fn merge<T: Sample>(
        parts: &[GridBuffer<T>],
        tiles: &[Tile],
        width: u32,
        height: u32,
    ) -> ConversionResult<MergeResult<T>> {
        if parts.len() != tiles.len() {
            return Err(ConversionError::invalid_tile(format!(
                "{} parts for {} tiles",
                parts.len(),
                tiles.len()
            )));
        }
        let len = width as usize * height as usize;
        let mut values = vec![T::default(); len];
        let mut writes = vec![0u8; len];

        for (part, tile) in parts.iter().zip(tiles) {
            tile.check_within(width, height)?;
            if part.dims() != tile.dims() {
                return Err(ConversionError::invalid_tile(format!(
                    "part is {}x{} but {:?} is {}x{}",
                    part.width(),
                    part.height(),
                    tile,
                    tile.width(),
                    tile.height()
                )));
            }
            for (row_idx, y) in (tile.min_y..=tile.max_y).enumerate() {
                let src = part.row(row_idx as u32);
                let start = y as usize * width as usize + tile.min_x as usize;
                values[start..start + src.len()].copy_from_slice(src);
                for w in &mut writes[start..start + src.len()] {
                    *w = w.saturating_add(1);
                }
            }
        }

        let missing = writes.iter().filter(|&&w| w == 0).count();
        if missing > 0 {
            let first = writes.iter().position(|&w| w == 0).unwrap_or(0);
            return Err(ConversionError::TileCoverage {
                missing,
                first_gap: ((first % width as usize) as u32, (first / width as usize) as u32),
            });
        }

        let mut warnings = Vec::new();
        let overlapping = writes.iter().filter(|&&w| w > 1).count();
        if overlapping > 0 {
            warnings.push(ConversionWarning::TileOverlap { cells: overlapping }.emit());
        }

        let transform = match (parts.first(), tiles.first()) {
            (Some(part), Some(tile)) => parent_transform_from_tile(&part.transform, tile),
            _ => Transform::IDENTITY,
        };
        Ok(MergeResult {
            grid: GridBuffer::new(width, height, values, transform)?,
            warnings,
        })
    }

    /// Merge parts keyed by id along a layout
    pub fn merge_layout<T: Sample>(
        layout: &TileLayout,
        parts: Vec<(TileId, GridBuffer<T>)>,
    ) -> ConversionResult<MergeResult<T>> {
        let mut tiles = Vec::with_capacity(parts.len());
        let mut grids = Vec::with_capacity(parts.len());
        for (id, grid) in parts {
            let tile = layout.get(id).ok_or(ConversionError::MissingTile(id))?;
            tiles.push(tile);
            grids.push(grid);
        }
        Self::merge(&grids, &tiles, layout.width, layout.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn numbered(w: u32, h: u32) -> GridBuffer<f32> {
        GridBuffer::from_fn(w, h, Transform::IDENTITY.with_scale(Vec3::splat(2.0)), |x, y| (y * w + x) as f32)
            .unwrap()
    }

    #[test]
    fn partition_is_disjoint_cover() {
        let tiles = Tile::partition(10, 7, 4).unwrap();
        assert_eq!(tiles.len(), 3 * 2);
        let mut hits = vec![0; 70];
        for (_, t) in &tiles {
            assert!(t.width() >= 2 && t.width() <= 4);
            assert!(t.height() >= 2 && t.height() <= 4);
            for y in t.min_y..=t.max_y {
                for x in t.min_x..=t.max_x {
                    hits[(y * 10 + x) as usize] += 1;
                }
            }
        }
        assert!(hits.iter().all(|&h| h == 1));
    }

    #[test]
    fn partition_never_leaves_single_sample_tiles() {
        for len in 2..60 {
            for size in 3..9 {
                for (_, t) in Tile::partition(len, 2, size).unwrap() {
                    assert!(t.width() >= 2 && t.width() <= size, "len {} size {}", len, size);
                }
            }
        }
        assert!(Tile::partition(10, 10, 2).is_err());
    }

    #[test]
    fn split_merge_is_identity() {
        let grid = numbered(11, 9);
        let layout = TileLayout::partition(11, 9, 4).unwrap();
        let parts = TileAssembler::split_layout(&grid, &layout).unwrap();
        let merged = TileAssembler::merge_layout(&layout, parts).unwrap();
        assert!(merged.warnings.is_empty());
        assert_eq!(merged.grid.values(), grid.values());
        assert!(merged.grid.transform.abs_diff_eq(&grid.transform, 1e-5));
    }

    #[test]
    fn tile_transform_offsets_origin() {
        let parent = Transform::from_position(Vec3::new(1.0, 1.0, 0.0)).with_scale(Vec3::splat(2.0));
        let tile = Tile::new(3, 2, 5, 4).unwrap();
        let t = tile_transform(&parent, &tile);
        assert_eq!(t.position, Vec3::new(7.0, 5.0, 0.0));
        assert!(parent_transform_from_tile(&t, &tile).abs_diff_eq(&parent, 1e-6));
    }

    #[test]
    fn gaps_are_fatal() {
        let grid = numbered(6, 4);
        let tiles = [Tile::new(0, 0, 2, 3).unwrap()];
        let parts = TileAssembler::split(&grid, &tiles).unwrap();
        let err = TileAssembler::merge(&parts, &tiles, 6, 4).unwrap_err();
        match err {
            ConversionError::TileCoverage { missing, first_gap } => {
                assert_eq!(missing, 12);
                assert_eq!(first_gap, (3, 0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn overlaps_warn_and_last_writer_wins() {
        let tiles = [Tile::new(0, 0, 2, 1).unwrap(), Tile::new(2, 0, 3, 1).unwrap()];
        let a = GridBuffer::filled(3, 2, 1u16, Transform::IDENTITY).unwrap();
        let b = GridBuffer::filled(2, 2, 9u16, tile_transform(&Transform::IDENTITY, &tiles[1])).unwrap();
        let merged = TileAssembler::merge(&[a, b], &tiles, 4, 2).unwrap();
        assert_eq!(merged.warnings, vec![ConversionWarning::TileOverlap { cells: 2 }]);
        assert_eq!(merged.grid.row(0), &[1, 1, 9, 9]);
    }

    #[test]
    fn component_footprints_share_edges() {
        let canonical = CanonicalSize {
            quads_per_section: 7,
            sections_per_component: 2,
            components_x: 2,
            components_y: 1,
        };
        let fp = Tile::component_footprints(&canonical);
        assert_eq!(fp.len(), 2);
        assert_eq!(fp[0].1.max_x, fp[1].1.min_x);
        assert_eq!(fp[1].1.max_x as u32 + 1, canonical.width());
        assert!(fp[1].1.fits_within(canonical.width(), canonical.height()));
    }

    #[test]
    fn rejects_out_of_bounds_and_unknown_tiles() {
        let grid = numbered(4, 4);
        assert!(TileAssembler::split(&grid, &[Tile::new(2, 2, 4, 3).unwrap()]).is_err());
        assert!(Tile::new(3, 0, 1, 1).is_err());
        let layout = TileLayout::single(4, 4);
        let err = TileAssembler::merge_layout(&layout, vec![(TileId::new(1, 0), grid)]).unwrap_err();
        assert!(matches!(err, ConversionError::MissingTile(TileId { x: 1, y: 0 })));
    }

    #[test]
    fn huge_tile_size_yields_one_tile() {
        let layout = TileLayout::partition(64, 64, u32::MAX).unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.tiles[0].1, Tile::new(0, 0, 63, 63).unwrap());
    }

    #[test]
    fn inverted_tiles_are_rejected_not_allocated() {
        let grid = numbered(8, 8);
        let inverted = Tile {
            min_x: 5,
            min_y: 0,
            max_x: 2,
            max_y: 3,
        };
        assert!(!inverted.fits_within(8, 8));
        assert!(matches!(
            TileAssembler::split(&grid, &[inverted]),
            Err(ConversionError::InvalidTile(_))
        ));
        let part = GridBuffer::filled(2, 2, 0.0f32, Transform::IDENTITY).unwrap();
        assert!(matches!(
            TileAssembler::merge(&[part], &[inverted], 8, 8),
            Err(ConversionError::InvalidTile(_))
        ));
    }

    #[test]
    fn single_column_tiles_cannot_be_split() {
        let grid = numbered(4, 4);
        let column = Tile::new(1, 0, 1, 3).unwrap();
        assert!(matches!(
            TileAssembler::split(&grid, &[column]),
            Err(ConversionError::InvalidGrid { width: 1, height: 4 })
        ));
    }
}
