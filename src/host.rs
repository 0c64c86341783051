//! Collaborator interfaces at both ends of the conversion, plus in-memory
//! implementations used by tests and by callers that stage data themselves.

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;

use crate::error::{ConversionError, ConversionResult};
use crate::grid::GridBuffer;
use crate::layer::{Calibration, LayerGrid};
use crate::quantize::QuantizedGrid;
use crate::range::NumericRange;
use crate::tiling::TileId;
use crate::transforms::Transform;

/// Producer of float heightfield channels
pub trait HeightfieldSource {
    /// Samples, dimensions and transform of a named channel
    fn fetch_grid(&self, handle: &str) -> ConversionResult<GridBuffer<f32>>;

    /// Physical extent `(min, max)` of a channel
    fn fetch_bounds(&self, handle: &str) -> ConversionResult<(Vec3, Vec3)>;

    /// Vertical extent of the bounds as a quantization range
    fn fetch_range(&self, handle: &str) -> ConversionResult<NumericRange> {
        let (min, max) = self.fetch_bounds(handle)?;
        NumericRange::new(min.z, max.z)
    }
}

/// Consumer of converted landscape tiles
pub trait LandscapeHost {
    fn write_height_tile(&mut self, tile_id: TileId, grid: QuantizedGrid, transform: Transform) -> ConversionResult<()>;

    fn write_layer_tile(
        &mut self,
        tile_id: TileId,
        layer_name: &str,
        layer: LayerGrid,
        calibration: Calibration,
    ) -> ConversionResult<()>;

    fn read_height_tile(&self, tile_id: TileId) -> ConversionResult<(QuantizedGrid, Transform)>;

    fn read_layer_tile(&self, tile_id: TileId, layer_name: &str) -> ConversionResult<LayerGrid>;

    /// Marker colour the host keeps for a layer, if any
    fn layer_marker(&self, _layer_name: &str) -> Option<[f32; 4]> {
        None
    }
}

/// Channels held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    channels: HashMap<String, GridBuffer<f32>>,
    bounds: HashMap<String, (Vec3, Vec3)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: &str, grid: GridBuffer<f32>) {
        self.channels.insert(handle.to_string(), grid);
    }

    /// Override the extent reported for a channel
    pub fn set_bounds(&mut self, handle: &str, min: Vec3, max: Vec3) {
        self.bounds.insert(handle.to_string(), (min, max));
    }
}

impl HeightfieldSource for MemorySource {
    fn fetch_grid(&self, handle: &str) -> ConversionResult<GridBuffer<f32>> {
        self.channels
            .get(handle)
            .cloned()
            .ok_or_else(|| ConversionError::MissingChannel(handle.to_string()))
    }

    /// Explicit bounds when set; otherwise the grid's horizontal corners
    /// and its sample extent.
    fn fetch_bounds(&self, handle: &str) -> ConversionResult<(Vec3, Vec3)> {
        if let Some(bounds) = self.bounds.get(handle) {
            return Ok(*bounds);
        }
        let grid = self
            .channels
            .get(handle)
            .ok_or_else(|| ConversionError::MissingChannel(handle.to_string()))?;
        let (lo, hi) = grid.min_max();
        let a = grid.transform.transform_point(Vec3::ZERO);
        let b = grid
            .transform
            .transform_point(Vec3::new((grid.width() - 1) as f32, (grid.height() - 1) as f32, 0.0));
        let min = a.min(b);
        let max = a.max(b);
        Ok((Vec3::new(min.x, min.y, lo), Vec3::new(max.x, max.y, hi)))
    }
}

/// Landscape tiles held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLandscape {
    heights: BTreeMap<TileId, (QuantizedGrid, Transform)>,
    layers: BTreeMap<(TileId, String), LayerGrid>,
    markers: BTreeMap<String, [f32; 4]>,
}

impl MemoryLandscape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn height_tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        self.heights.keys().copied()
    }

    /// Forget every marker colour, like a landscape authored elsewhere
    pub fn clear_markers(&mut self) {
        self.markers.clear();
    }
}

impl LandscapeHost for MemoryLandscape {
    fn write_height_tile(&mut self, tile_id: TileId, grid: QuantizedGrid, transform: Transform) -> ConversionResult<()> {
        log::debug!("Writing height tile {:?} ({}x{})", tile_id, grid.width, grid.height);
        self.heights.insert(tile_id, (grid, transform));
        Ok(())
    }

    fn write_layer_tile(
        &mut self,
        tile_id: TileId,
        layer_name: &str,
        layer: LayerGrid,
        calibration: Calibration,
    ) -> ConversionResult<()> {
        self.markers
            .insert(layer_name.to_string(), calibration.to_marker_color());
        self.layers.insert((tile_id, layer_name.to_string()), layer);
        Ok(())
    }

    fn read_height_tile(&self, tile_id: TileId) -> ConversionResult<(QuantizedGrid, Transform)> {
        self.heights
            .get(&tile_id)
            .cloned()
            .ok_or(ConversionError::MissingTile(tile_id))
    }

    fn read_layer_tile(&self, tile_id: TileId, layer_name: &str) -> ConversionResult<LayerGrid> {
        self.layers
            .get(&(tile_id, layer_name.to_string()))
            .cloned()
            .ok_or_else(|| ConversionError::MissingLayer {
                tile: tile_id,
                layer: layer_name.to_string(),
            })
    }

    fn layer_marker(&self, layer_name: &str) -> Option<[f32; 4]> {
        self.markers.get(layer_name).copied()
    }
}
