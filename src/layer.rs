//! 8-bit auxiliary layers (material weights, masks) and their calibration.
//!
//! Layer values map linearly from their range onto `[0, 255]`. The
//! `(min, max, step)` calibration travels with the encoded samples; without
//! it a decode can only recover `[0, 1]`.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionResult, ConversionWarning};
use crate::grid::{validate_dims, GridBuffer};
use crate::range::NumericRange;
use crate::transforms::Transform;

/// Name of the layer that hides landscape cells
pub const MASK_LAYER_NAME: &str = "visibility";

/// Alpha of a marker colour that carries a calibration
pub const CALIBRATION_MARKER: f32 = PI;

/// Largest 8-bit digit
pub const LAYER_DIGIT_MAX: f64 = u8::MAX as f64;

/// Closed set of layer roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    /// Regular material weight, calibrated to its own or the global range
    Weight,
    /// Cell visibility; never degenerate, always `[0, 1]`
    Mask,
    /// Values already in `[0, 1]`
    Unit,
}

impl LayerKind {
    /// Role of a layer from its name and unit flag
    pub fn classify(name: &str, unit: bool) -> Self {
        if name.eq_ignore_ascii_case(MASK_LAYER_NAME) {
            LayerKind::Mask
        } else if unit {
            LayerKind::Unit
        } else {
            LayerKind::Weight
        }
    }

    /// Whether the calibration range is pinned to `[0, 1]`
    pub fn has_unit_range(&self) -> bool {
        matches!(self, LayerKind::Mask | LayerKind::Unit)
    }

    /// Range to encode with: unit layers ignore the data
    pub fn calibration_range(&self, data: NumericRange) -> NumericRange {
        if self.has_unit_range() {
            NumericRange::UNIT
        } else {
            data
        }
    }

    /// `DegenerateLayerSkipped` for a flat non-mask layer.
    ///
    /// `data` is the extent of the layer's own samples.
    pub fn skip_reason(&self, name: &str, data: NumericRange) -> Option<ConversionWarning> {
        if *self != LayerKind::Mask && data.is_degenerate() {
            Some(ConversionWarning::DegenerateLayerSkipped {
                layer: name.to_string(),
            })
        } else {
            None
        }
    }
}

/// Split whitespace-separated layer names, dropping repeats
pub fn parse_non_weight_blended<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names: Vec<String> = Vec::new();
    for value in values {
        for token in value.as_ref().split_whitespace() {
            if !names.iter().any(|n| n == token) {
                names.push(token.to_string());
            }
        }
    }
    names
}

/// `(min, max, step)` triple needed to decode a layer exactly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Calibration {
    pub fn from_range(range: NumericRange) -> Self {
        Self {
            min: range.min,
            max: range.max,
            step: (range.span() as f64 / LAYER_DIGIT_MAX) as f32,
        }
    }

    pub fn unit() -> Self {
        Self::from_range(NumericRange::UNIT)
    }

    pub fn range(&self) -> NumericRange {
        NumericRange {
            min: self.min,
            max: self.max,
        }
    }

    /// RGBA marker: `(min, max, step, PI)`
    pub fn to_marker_color(&self) -> [f32; 4] {
        [self.min, self.max, self.step, CALIBRATION_MARKER]
    }

    /// Recover a calibration from a marker colour; `None` unless alpha is PI
    pub fn from_marker_color(color: [f32; 4]) -> Option<Self> {
        if color[3] == CALIBRATION_MARKER {
            Some(Self {
                min: color[0],
                max: color[1],
                step: color[2],
            })
        } else {
            None
        }
    }
}

/// Encoded 8-bit layer plus its calibration
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGrid {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u8>,
    pub calibration: NumericRange,
    pub step: f32,
    pub is_weight_blended: bool,
}

impl LayerGrid {
    pub fn new(
        width: u32,
        height: u32,
        samples: Vec<u8>,
        calibration: Calibration,
        is_weight_blended: bool,
    ) -> ConversionResult<Self> {
        validate_dims(width, height, samples.len())?;
        Ok(Self {
            width,
            height,
            samples,
            calibration: calibration.range(),
            step: calibration.step,
            is_weight_blended,
        })
    }

    pub fn calibration(&self) -> Calibration {
        Calibration {
            min: self.calibration.min,
            max: self.calibration.max,
            step: self.step,
        }
    }

    pub fn to_grid(&self, transform: Transform) -> GridBuffer<u8> {
        GridBuffer::from_raw(self.width, self.height, self.samples.clone(), transform)
    }

    pub fn from_grid(grid: GridBuffer<u8>, calibration: Calibration, is_weight_blended: bool) -> Self {
        let (width, height) = grid.dims();
        Self {
            width,
            height,
            samples: grid.into_values(),
            calibration: calibration.range(),
            step: calibration.step,
            is_weight_blended,
        }
    }
}

/// Float ⇄ 8-bit layer conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerCodec;

impl LayerCodec {
    /// Clamp into `range` and map onto `[0, 255]`. A flat range yields zeros.
    pub fn encode_digits(values: &[f32], range: NumericRange) -> Vec<u8> {
        let span = range.span() as f64;
        let spacing = if span != 0.0 { LAYER_DIGIT_MAX / span } else { 0.0 };
        values
            .iter()
            .map(|&v| {
                let d = (v.clamp(range.min, range.max) as f64 - range.min as f64) * spacing;
                d.round().clamp(0.0, LAYER_DIGIT_MAX) as u8
            })
            .collect()
    }

    /// Encode a float layer grid with its calibration attached
    pub fn encode_layer(grid: &GridBuffer<f32>, range: NumericRange, is_weight_blended: bool) -> LayerGrid {
        LayerGrid {
            width: grid.width(),
            height: grid.height(),
            samples: Self::encode_digits(grid.values(), range),
            calibration: range,
            step: Calibration::from_range(range).step,
            is_weight_blended,
        }
    }

    /// Decode with the layer's own calibration
    pub fn decode_layer(layer: &LayerGrid) -> Vec<f32> {
        Self::decode_calibrated(&layer.samples, &layer.calibration())
    }

    pub fn decode_calibrated(samples: &[u8], calibration: &Calibration) -> Vec<f32> {
        let min = calibration.min as f64;
        let step = calibration.step as f64;
        samples
            .iter()
            .map(|&d| (d as f64 * step + min) as f32)
            .collect()
    }

    /// Decode without calibration: digits become `[0, 1]`
    pub fn decode_uncalibrated(samples: &[u8]) -> Vec<f32> {
        samples
            .iter()
            .map(|&d| (d as f64 / LAYER_DIGIT_MAX) as f32)
            .collect()
    }

    /// Decode through a host marker colour, falling back to `[0, 1]`
    pub fn decode_with_marker(samples: &[u8], marker: Option<[f32; 4]>) -> Vec<f32> {
        match marker.and_then(Calibration::from_marker_color) {
            Some(calibration) => Self::decode_calibrated(samples, &calibration),
            None => {
                log::debug!("Layer has no calibration marker, decoding to [0, 1]");
                Self::decode_uncalibrated(samples)
            }
        }
    }
}

/// All-zero mask grid that accompanies an exported heightfield
pub fn default_mask(width: u32, height: u32, transform: Transform) -> ConversionResult<GridBuffer<f32>> {
    GridBuffer::filled(width, height, 0.0, transform)
}
