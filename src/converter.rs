//! End-to-end heightfield ⇄ landscape conversion.
//!
//! Forward: size solve, resize, quantize, place, split into tiles.
//! Reverse: merge tiles, decode, recover the source transform.
//! Every stage returns new buffers; independent channels convert in
//! parallel through [`HeightfieldConverter::convert_batch`].

use glam::Vec3;
use rayon::prelude::*;

use crate::config::ConversionConfig;
use crate::error::{ConversionResult, ConversionWarning};
use crate::grid::GridBuffer;
use crate::host::{HeightfieldSource, LandscapeHost};
use crate::layer::{default_mask, Calibration, LayerCodec, LayerGrid, LayerKind};
use crate::placement::TransformSolver;
use crate::quantize::{
    check_legacy_range, decode_with_transform, legacy_range, DigitScheme, QuantizationCodec, QuantizedGrid,
};
use crate::range::{clamp_values, GlobalRanges, NumericRange};
use crate::resample::{GridResampler, ResizeResult};
use crate::size::{CanonicalSize, SizeSolution, SizeSolver};
use crate::tiling::{TileAssembler, TileId, TileLayout};
use crate::transforms::Transform;

/// One quantized height tile and its placement
#[derive(Debug, Clone, PartialEq)]
pub struct HeightTile {
    pub id: TileId,
    pub grid: QuantizedGrid,
    pub transform: Transform,
}

/// Result of converting one height channel
#[derive(Debug, Clone, PartialEq)]
pub struct HeightConversion {
    pub canonical: CanonicalSize,
    pub range: NumericRange,
    pub scheme: DigitScheme,
    /// Placement of the whole landscape
    pub transform: Transform,
    pub resize_factor: Vec3,
    pub pixel_offset: (i32, i32),
    pub layout: TileLayout,
    pub tiles: Vec<HeightTile>,
    pub warnings: Vec<ConversionWarning>,
}

/// One encoded layer tile.
///
/// Layers carry no placement of their own: a layer tile covers the same
/// footprint as the height tile with the same id and is placed by that
/// tile's transform.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTile {
    pub id: TileId,
    pub layer: LayerGrid,
}

/// Result of converting one layer channel
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConversion {
    pub name: String,
    pub kind: LayerKind,
    pub canonical: CanonicalSize,
    pub calibration: Calibration,
    pub layout: TileLayout,
    pub tiles: Vec<LayerTile>,
    pub warnings: Vec<ConversionWarning>,
}

/// A converted layer, or the notice explaining why it was not emitted
#[derive(Debug, Clone, PartialEq)]
pub enum LayerOutcome {
    Converted(LayerConversion),
    Skipped(ConversionWarning),
}

impl LayerOutcome {
    pub fn converted(&self) -> Option<&LayerConversion> {
        match self {
            LayerOutcome::Converted(layer) => Some(layer),
            LayerOutcome::Skipped(_) => None,
        }
    }
}

/// Float layer handed to the converter
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInput {
    pub name: String,
    pub kind: LayerKind,
    pub grid: GridBuffer<f32>,
    /// Blended with the other weight layers
    pub weight_blended: bool,
}

impl LayerInput {
    /// A layer named like the visibility mask is always a mask.
    pub fn new(name: &str, kind: LayerKind, grid: GridBuffer<f32>) -> Self {
        let kind = match kind {
            LayerKind::Mask => LayerKind::Mask,
            other => LayerKind::classify(name, other == LayerKind::Unit),
        };
        Self {
            name: name.to_string(),
            kind,
            grid,
            weight_blended: kind != LayerKind::Mask,
        }
    }

    /// Mark as not weight blended when listed in `non_weight_blended`
    pub fn with_blend_names(mut self, non_weight_blended: &[String]) -> Self {
        if non_weight_blended.iter().any(|n| *n == self.name) {
            self.weight_blended = false;
        }
        self
    }
}

/// Input of a batch conversion
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Height { name: String, grid: GridBuffer<f32> },
    Layer(LayerInput),
}

impl Channel {
    pub fn name(&self) -> &str {
        match self {
            Channel::Height { name, .. } => name,
            Channel::Layer(input) => &input.name,
        }
    }
}

/// Output of a batch conversion, in input order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutput {
    Height(HeightConversion),
    Layer(LayerOutcome),
}

/// How exported heights are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightDecode {
    /// With the range and scheme stored in the tiles
    Calibrated,
    /// From the landscape transform alone
    FromTransform,
}

/// Heightfield read back from a landscape
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedHeightfield {
    pub height: GridBuffer<f32>,
    pub mask: GridBuffer<f32>,
    pub warnings: Vec<ConversionWarning>,
}

/// Heightfield ⇄ landscape converter for one configuration
#[derive(Debug, Clone, Default)]
pub struct HeightfieldConverter {
    config: ConversionConfig,
}

impl HeightfieldConverter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    fn oriented(&self, grid: &GridBuffer<f32>) -> GridBuffer<f32> {
        if self.config.swap_axes {
            grid.transposed()
        } else {
            grid.clone()
        }
    }

    fn solve_size(&self, width: u32, height: u32) -> ConversionResult<SizeSolution> {
        match self.config.size_override {
            Some(layout) => SizeSolver::solve_with_override(width, height, layout),
            None => SizeSolver::solve(width, height),
        }
    }

    fn codec(&self, scheme: DigitScheme) -> QuantizationCodec {
        QuantizationCodec::new(scheme).with_neutral_digit(self.config.units.neutral_digit)
    }

    /// Pick the quantization range and clamp the samples into it where
    /// the range does not come from the data.
    fn height_range(
        &self,
        grid: &GridBuffer<f32>,
        range_hint: Option<NumericRange>,
        warnings: &mut Vec<ConversionWarning>,
    ) -> ConversionResult<(NumericRange, Option<Vec<f32>>)> {
        let data = NumericRange::from_values(grid.values());

        let range = if self.config.use_legacy_scaling {
            if let Some(warning) = check_legacy_range(data, &self.config.units) {
                warnings.push(warning.emit());
            }
            legacy_range(grid.transform.scale.z, &self.config.units)
        } else if let Some(forced) = self.config.forced_range {
            NumericRange::new(forced.min, forced.max)?
        } else if let Some(hint) = range_hint {
            NumericRange::new(hint.min, hint.max)?
        } else {
            return Ok((data, None));
        };

        let (clamped, count) = clamp_values(grid.values(), range);
        if count == 0 {
            return Ok((range, None));
        }
        warnings.push(ConversionWarning::ValuesClamped { count }.emit());
        Ok((range, Some(clamped)))
    }

    /// Convert a float height grid.
    ///
    /// The quantization range is, in order of precedence: the legacy span,
    /// the configured forced range, `range_hint` (usually the source
    /// bounds or a shared global range), the data extent.
    pub fn convert_height(
        &self,
        grid: &GridBuffer<f32>,
        range_hint: Option<NumericRange>,
    ) -> ConversionResult<HeightConversion> {
        let grid = self.oriented(grid);
        let (src_w, src_h) = grid.dims();
        let mut warnings = Vec::new();

        let (range, clamped) = self.height_range(&grid, range_hint, &mut warnings)?;
        let grid = match clamped {
            Some(values) => GridBuffer::new(src_w, src_h, values, grid.transform)?,
            None => grid,
        };

        let solution = self.solve_size(src_w, src_h)?;
        warnings.extend(solution.warnings);
        let canonical = solution.size;

        let ResizeResult {
            resized_grid,
            resize_factor,
            pixel_offset,
            warnings: resize_warnings,
        } = GridResampler::resize(&grid, &canonical);
        warnings.extend(resize_warnings);

        let scheme = DigitScheme::for_config(&self.config);
        let quantized = self.codec(scheme).quantize(&resized_grid, range);

        let solver = TransformSolver::for_config(&self.config);
        let transform = solver.compute_transform(&grid.transform, range, &scheme, resize_factor, pixel_offset);

        let layout = TileLayout::for_size(canonical.width(), canonical.height(), self.config.tile_size)?;
        let parts = TileAssembler::split_layout(&quantized.to_grid(transform), &layout)?;
        let tiles = parts
            .into_iter()
            .map(|(id, part)| {
                let transform = part.transform;
                HeightTile {
                    id,
                    grid: QuantizedGrid::from_grid(part, range, scheme),
                    transform,
                }
            })
            .collect();

        log::info!(
            "Converted heightfield {}x{} -> {}x{} ({} tiles, range [{}, {}], digit range {})",
            src_w,
            src_h,
            canonical.width(),
            canonical.height(),
            layout.len(),
            range.min,
            range.max,
            scheme.digit_range
        );

        Ok(HeightConversion {
            canonical,
            range,
            scheme,
            transform,
            resize_factor,
            pixel_offset,
            layout,
            tiles,
            warnings,
        })
    }

    /// Fetch a channel from a source and convert it, quantizing over the
    /// source bounds unless a range is forced.
    pub fn convert_from_source<S: HeightfieldSource>(
        &self,
        source: &S,
        handle: &str,
    ) -> ConversionResult<HeightConversion> {
        let grid = source.fetch_grid(handle)?;
        let range = source.fetch_range(handle)?;
        self.convert_height(&grid, Some(range))
    }

    /// Convert a float layer.
    ///
    /// The layer is sized like a height grid of the same dimensions, so it
    /// lines up with its heightfield. Flat non-mask layers are skipped.
    pub fn convert_layer(&self, input: &LayerInput, global: Option<NumericRange>) -> ConversionResult<LayerOutcome> {
        let grid = self.oriented(&input.grid);
        let data = NumericRange::from_values(grid.values());
        if let Some(reason) = input.kind.skip_reason(&input.name, data) {
            return Ok(LayerOutcome::Skipped(reason.emit()));
        }

        let mut warnings = Vec::new();
        let solution = self.solve_size(grid.width(), grid.height())?;
        warnings.extend(solution.warnings);
        let canonical = solution.size;

        let resized = GridResampler::resize(&grid, &canonical);
        warnings.extend(resized.warnings);

        let range = input.kind.calibration_range(global.unwrap_or(data));
        let calibration = Calibration::from_range(range);
        let encoded = LayerCodec::encode_layer(&resized.resized_grid, range, input.weight_blended);

        // Same size and tile size as the heightfield, so the same layout.
        let layout = TileLayout::for_size(canonical.width(), canonical.height(), self.config.tile_size)?;
        let parts = TileAssembler::split_layout(&encoded.to_grid(Transform::IDENTITY), &layout)?;
        let tiles = parts
            .into_iter()
            .map(|(id, part)| LayerTile {
                id,
                layer: LayerGrid::from_grid(part, calibration, input.weight_blended),
            })
            .collect();

        log::info!(
            "Converted layer '{}' ({:?}) to {}x{}, calibration [{}, {}]",
            input.name,
            input.kind,
            canonical.width(),
            canonical.height(),
            range.min,
            range.max
        );

        Ok(LayerOutcome::Converted(LayerConversion {
            name: input.name.clone(),
            kind: input.kind,
            canonical,
            calibration,
            layout,
            tiles,
            warnings,
        }))
    }

    /// Convert independent channels in parallel.
    ///
    /// Each channel uses the range recorded under its name in `ranges`, if
    /// any. Results keep input order; a failure only affects its own entry.
    pub fn convert_batch(
        &self,
        channels: &[Channel],
        ranges: &GlobalRanges,
    ) -> Vec<ConversionResult<ChannelOutput>> {
        channels
            .par_iter()
            .map(|channel| {
                let global = ranges.get(channel.name());
                match channel {
                    Channel::Height { grid, .. } => self.convert_height(grid, global).map(ChannelOutput::Height),
                    Channel::Layer(input) => self.convert_layer(input, global).map(ChannelOutput::Layer),
                }
            })
            .collect()
    }

    /// Hand converted tiles to a host
    pub fn write_to_host<H: LandscapeHost>(
        &self,
        host: &mut H,
        height: &HeightConversion,
        layers: &[LayerConversion],
    ) -> ConversionResult<()> {
        for tile in &height.tiles {
            host.write_height_tile(tile.id, tile.grid.clone(), tile.transform)?;
        }
        for layer in layers {
            for tile in &layer.tiles {
                host.write_layer_tile(tile.id, &layer.name, tile.layer.clone(), layer.calibration)?;
            }
        }
        Ok(())
    }

    /// Read a landscape's height tiles back into one float heightfield.
    ///
    /// The result has the landscape's own size; its transform places it
    /// where the landscape sits. A zero mask of the same size comes along.
    pub fn export_height<H: LandscapeHost>(
        &self,
        host: &H,
        layout: &TileLayout,
        decode: HeightDecode,
    ) -> ConversionResult<ExportedHeightfield> {
        let mut parts = Vec::with_capacity(layout.len());
        let mut calibration = None;
        for (id, _) in &layout.tiles {
            let (grid, transform) = host.read_height_tile(*id)?;
            calibration.get_or_insert((grid.source_range, grid.scheme));
            parts.push((*id, grid.to_grid(transform)));
        }
        let merged = TileAssembler::merge_layout(layout, parts)?;
        let digits = merged.grid;
        let dest = digits.transform;

        let solver = TransformSolver::for_config(&self.config);
        let (values, transform) = match (decode, calibration) {
            (HeightDecode::Calibrated, Some((range, scheme))) => {
                let values = self.codec(scheme).decode(digits.values(), range);
                let transform = solver.source_transform(&dest, Some((range, scheme)), Vec3::ONE, (0, 0));
                (values, transform)
            }
            _ => {
                let values = decode_with_transform(digits.values(), &dest, &self.config.units);
                (values, solver.foreign_source_transform(&dest))
            }
        };

        let (width, height) = digits.dims();
        log::info!("Exported heightfield {}x{} from {} tiles", width, height, layout.len());
        Ok(ExportedHeightfield {
            height: GridBuffer::new(width, height, values, transform)?,
            mask: default_mask(width, height, transform)?,
            warnings: merged.warnings,
        })
    }

    /// Read one layer back as floats.
    ///
    /// A host marker colour takes precedence over the calibration stored in
    /// the tiles. The result uses the identity transform; its placement is
    /// the heightfield's.
    pub fn export_layer<H: LandscapeHost>(
        &self,
        host: &H,
        layout: &TileLayout,
        layer_name: &str,
    ) -> ConversionResult<GridBuffer<f32>> {
        let mut parts = Vec::with_capacity(layout.len());
        let mut stored = None;
        for (id, tile) in &layout.tiles {
            let layer = host.read_layer_tile(*id, layer_name)?;
            stored.get_or_insert(layer.calibration());
            let transform = crate::tiling::tile_transform(&Transform::IDENTITY, tile);
            parts.push((*id, layer.to_grid(transform)));
        }
        let merged = TileAssembler::merge_layout(layout, parts)?.grid;

        let values = match host.layer_marker(layer_name).and_then(Calibration::from_marker_color) {
            Some(calibration) => LayerCodec::decode_calibrated(merged.values(), &calibration),
            None => match stored {
                Some(calibration) => LayerCodec::decode_calibrated(merged.values(), &calibration),
                None => LayerCodec::decode_uncalibrated(merged.values()),
            },
        };
        GridBuffer::new(merged.width(), merged.height(), values, Transform::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryLandscape;
    use crate::size::SizeOverride;

    fn hills(w: u32, h: u32) -> GridBuffer<f32> {
        GridBuffer::from_fn(w, h, Transform::IDENTITY.with_scale(Vec3::splat(0.5)), |x, y| {
            (x as f32 * 0.3).sin() * 20.0 + y as f32 * 0.25
        })
        .unwrap()
    }

    #[test]
    fn exact_size_needs_no_resize() {
        let conv = HeightfieldConverter::default();
        let out = conv.convert_height(&hills(64, 64), None).unwrap();
        assert_eq!(out.canonical.dims(), (64, 64));
        assert_eq!(out.resize_factor, Vec3::ONE);
        assert_eq!(out.pixel_offset, (0, 0));
        assert_eq!(out.tiles.len(), 1);
        assert!(out.warnings.is_empty());
        assert_eq!(out.scheme, DigitScheme::reduced());
    }

    #[test]
    fn forced_range_clamps_and_warns() {
        let config = ConversionConfig {
            forced_range: Some(NumericRange { min: -5.0, max: 5.0 }),
            ..Default::default()
        };
        let out = HeightfieldConverter::new(config).convert_height(&hills(64, 64), None).unwrap();
        assert_eq!(out.range, NumericRange { min: -5.0, max: 5.0 });
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ConversionWarning::ValuesClamped { .. })));
    }

    #[test]
    fn legacy_mode_uses_full_scheme() {
        let config = ConversionConfig {
            use_legacy_scaling: true,
            ..Default::default()
        };
        let out = HeightfieldConverter::new(config).convert_height(&hills(64, 64), None).unwrap();
        assert_eq!(out.scheme, DigitScheme::full());
        assert_eq!(out.range, NumericRange { min: -256.0, max: 256.0 });
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn legacy_mode_clamps_out_of_span_data() {
        let config = ConversionConfig {
            use_legacy_scaling: true,
            ..Default::default()
        };
        let grid = GridBuffer::from_fn(16, 16, Transform::IDENTITY.with_scale(Vec3::splat(0.5)), |x, _| {
            x as f32 * 40.0 - 100.0
        })
        .unwrap();
        let out = HeightfieldConverter::new(config).convert_height(&grid, None).unwrap();
        assert_eq!(out.range, NumericRange { min: -256.0, max: 256.0 });
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ConversionWarning::PrecisionLoss(_))));
        // Columns 9..=15 sit above 256.
        assert!(out.warnings.contains(&ConversionWarning::ValuesClamped { count: 7 * 16 }));
        assert_eq!(out.tiles[0].grid.samples.iter().copied().max(), Some(65534));
    }

    #[test]
    fn swapped_axes_transpose_the_source() {
        let config = ConversionConfig {
            swap_axes: true,
            ..Default::default()
        };
        let grid = GridBuffer::from_fn(8, 15, Transform::IDENTITY.with_scale(Vec3::splat(0.5)), |x, y| {
            (x + 20 * y) as f32
        })
        .unwrap();
        let out = HeightfieldConverter::new(config).convert_height(&grid, None).unwrap();
        assert_eq!(out.canonical.dims(), (15, 8));
        assert_eq!(out.resize_factor, Vec3::ONE);
        let expected = QuantizationCodec::new(out.scheme).encode(grid.transposed().values(), out.range);
        assert_eq!(out.tiles[0].grid.samples, expected);
    }

    #[test]
    fn size_override_fixes_the_section_layout() {
        let config = ConversionConfig {
            size_override: Some(SizeOverride {
                sections_per_component: 2,
                quads_per_section: 15,
            }),
            ..Default::default()
        };
        let out = HeightfieldConverter::new(config).convert_height(&hills(64, 64), None).unwrap();
        assert_eq!(
            out.canonical,
            CanonicalSize {
                quads_per_section: 15,
                sections_per_component: 2,
                components_x: 3,
                components_y: 3,
            }
        );
        assert_eq!(out.canonical.dims(), (91, 91));
        assert_eq!(out.pixel_offset, (13, 13));
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ConversionWarning::Padded { .. })));
        assert!(!out
            .warnings
            .iter()
            .any(|w| matches!(w, ConversionWarning::SizeFallback { .. })));
    }

    #[test]
    fn oversized_tile_size_gives_one_tile() {
        let config = ConversionConfig {
            tile_size: Some(u32::MAX),
            ..Default::default()
        };
        let out = HeightfieldConverter::new(config).convert_height(&hills(64, 64), None).unwrap();
        assert_eq!(out.layout.len(), 1);
        assert_eq!(out.tiles[0].grid.width, 64);
    }

    #[test]
    fn layer_tiles_share_height_tile_footprints() {
        let config = ConversionConfig {
            tile_size: Some(20),
            ..Default::default()
        };
        let conv = HeightfieldConverter::new(config);
        let height = conv.convert_height(&hills(64, 64), None).unwrap();
        let layer = conv
            .convert_layer(&LayerInput::new("rock", LayerKind::Weight, hills(64, 64)), None)
            .unwrap();
        let layer = layer.converted().unwrap();
        assert_eq!(layer.layout, height.layout);
        assert_eq!(layer.tiles.len(), height.tiles.len());
        for (h, l) in height.tiles.iter().zip(&layer.tiles) {
            assert_eq!(h.id, l.id);
            assert_eq!((h.grid.width, h.grid.height), (l.layer.width, l.layer.height));
        }
    }

    #[test]
    fn flat_layers_skip_but_masks_do_not() {
        let conv = HeightfieldConverter::default();
        let flat = GridBuffer::filled(8, 8, 0.0, Transform::IDENTITY).unwrap();
        let rock = conv
            .convert_layer(&LayerInput::new("rock", LayerKind::Weight, flat.clone()), None)
            .unwrap();
        assert!(matches!(rock, LayerOutcome::Skipped(_)));

        let mask = conv
            .convert_layer(&LayerInput::new("visibility", LayerKind::Mask, flat.clone()), None)
            .unwrap();
        let mask = mask.converted().unwrap();
        assert_eq!(mask.calibration, Calibration::unit());
        assert!(!mask.tiles[0].layer.is_weight_blended);

        // The mask name wins over a declared weight kind.
        let named = LayerInput::new("visibility", LayerKind::Weight, flat);
        assert_eq!(named.kind, LayerKind::Mask);
        assert!(conv.convert_layer(&named, None).unwrap().converted().is_some());
    }

    #[test]
    fn batch_keeps_order_and_isolates_failures() {
        let conv = HeightfieldConverter::default();
        let mut ranges = GlobalRanges::new();
        ranges.include("height", NumericRange { min: -50.0, max: 50.0 });
        let channels = vec![
            Channel::Height {
                name: "height".into(),
                grid: hills(32, 32),
            },
            Channel::Layer(LayerInput::new("rock", LayerKind::Weight, hills(32, 32))),
            Channel::Layer(LayerInput::new(
                "sand",
                LayerKind::Weight,
                GridBuffer::filled(32, 32, 1.0, Transform::IDENTITY).unwrap(),
            )),
        ];
        let results = conv.convert_batch(&channels, &ranges);
        assert_eq!(results.len(), 3);
        match &results[0] {
            Ok(ChannelOutput::Height(h)) => assert_eq!(h.range, NumericRange { min: -50.0, max: 50.0 }),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(results[1], Ok(ChannelOutput::Layer(LayerOutcome::Converted(_)))));
        assert!(matches!(results[2], Ok(ChannelOutput::Layer(LayerOutcome::Skipped(_)))));
    }

    #[test]
    fn host_round_trip_through_tiles() {
        let config = ConversionConfig {
            tile_size: Some(20),
            ..Default::default()
        };
        let conv = HeightfieldConverter::new(config);
        let grid = hills(64, 64);
        let height = conv.convert_height(&grid, None).unwrap();
        assert!(height.tiles.len() > 1);

        let mut host = MemoryLandscape::new();
        conv.write_to_host(&mut host, &height, &[]).unwrap();
        let exported = conv.export_height(&host, &height.layout, HeightDecode::Calibrated).unwrap();
        assert!(exported.warnings.is_empty());
        assert_eq!(exported.height.dims(), (64, 64));

        let tol = QuantizationCodec::new(height.scheme).max_error(height.range) as f32 + 1e-4;
        for (a, b) in grid.values().iter().zip(exported.height.values()) {
            assert!((a - b).abs() <= tol, "{} vs {}", a, b);
        }
        assert!(exported.height.transform.position.abs_diff_eq(Vec3::ZERO, 1e-3));
        assert!((exported.height.transform.scale.x - 0.5).abs() < 1e-6);
    }
}
