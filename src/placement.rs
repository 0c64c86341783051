//! Placement of converted grids in destination space.
//!
//! The destination grid steps one unit per vertex, so the horizontal
//! scale carries the source cell size. Its vertical scale maps the full
//! 16-bit span onto the quantized source range, and its position keeps
//! source elevation zero at the destination's neutral digit.

use glam::Vec3;

use crate::config::{ConversionConfig, UnitConvention};
use crate::quantize::{DigitScheme, QuantizationCodec, DIGIT_MAX};
use crate::range::NumericRange;
use crate::transforms::Transform;

/// Derives destination transforms from source transforms and back
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSolver {
    pub units: UnitConvention,
    pub legacy_scaling: bool,
}

impl Default for TransformSolver {
    fn default() -> Self {
        Self::new(UnitConvention::default())
    }
}

impl TransformSolver {
    pub fn new(units: UnitConvention) -> Self {
        Self {
            units,
            legacy_scaling: false,
        }
    }

    pub fn for_config(config: &ConversionConfig) -> Self {
        Self {
            units: config.units,
            legacy_scaling: config.use_legacy_scaling,
        }
    }

    #[inline]
    fn horizontal_unit(&self) -> f32 {
        self.units.horizontal_factor * self.units.source_to_dest_units
    }

    /// Destination vertical scale for a quantized range.
    ///
    /// Legacy scaling keeps the source's own vertical scale instead. A zero
    /// result (flat range) becomes 1 so the transform stays invertible.
    pub fn z_scale(&self, source: &Transform, range: NumericRange, scheme: &DigitScheme) -> f32 {
        let z = if self.legacy_scaling {
            source.scale.z * self.horizontal_unit()
        } else {
            let ratio = DIGIT_MAX / scheme.digit_range as f64;
            (ratio * range.span() as f64 / self.units.reference_span as f64 * self.units.source_to_dest_units as f64)
                as f32
        };
        if z.abs() < f32::EPSILON {
            1.0
        } else {
            z
        }
    }

    fn codec(&self, scheme: &DigitScheme) -> QuantizationCodec {
        QuantizationCodec::new(*scheme).with_neutral_digit(self.units.neutral_digit)
    }

    /// Destination transform for a source grid quantized over `range`.
    ///
    /// `resize_factor` scales the horizontal step of resampled axes.
    /// `pixel_offset` moves the origin back over the padding cells so the
    /// source content keeps its world position.
    pub fn compute_transform(
        &self,
        source: &Transform,
        range: NumericRange,
        scheme: &DigitScheme,
        resize_factor: Vec3,
        pixel_offset: (i32, i32),
    ) -> Transform {
        let unit = self.horizontal_unit();
        let scale_z = self.z_scale(source, range, scheme);
        let scale = Vec3::new(
            source.scale.x * unit * resize_factor.x,
            source.scale.y * unit * resize_factor.y,
            scale_z,
        );

        let mut position = source.position * self.units.source_to_dest_units;
        position.z += self.codec(scheme).z_offset(range, scale_z, &self.units);

        let placed = Transform::new(position, source.rotation, scale);
        if pixel_offset == (0, 0) {
            placed
        } else {
            placed.offset_by_cells(-pixel_offset.0 as f32, -pixel_offset.1 as f32)
        }
    }

    /// Inverse of [`compute_transform`](Self::compute_transform).
    ///
    /// With a calibration the vertical offset is removed from the position,
    /// since calibrated decoding yields source values without it. Without
    /// one (a foreign landscape) heights come from
    /// [`decode_with_transform`](crate::quantize::decode_with_transform),
    /// which already includes the position, so the source sits at z = 0.
    ///
    /// The destination carries no source vertical scale outside legacy
    /// scaling; the source gets a unit-height cell then.
    pub fn source_transform(
        &self,
        dest: &Transform,
        calibration: Option<(NumericRange, DigitScheme)>,
        resize_factor: Vec3,
        pixel_offset: (i32, i32),
    ) -> Transform {
        let unpadded = if pixel_offset == (0, 0) {
            *dest
        } else {
            dest.offset_by_cells(pixel_offset.0 as f32, pixel_offset.1 as f32)
        };

        let unit = self.horizontal_unit();
        let scale_z = if self.legacy_scaling {
            dest.scale.z / unit
        } else {
            1.0 / self.units.horizontal_factor
        };
        let scale = Vec3::new(
            dest.scale.x / (unit * resize_factor.x),
            dest.scale.y / (unit * resize_factor.y),
            scale_z,
        );

        let mut position = unpadded.position;
        match calibration {
            Some((range, scheme)) => {
                position.z -= self.codec(&scheme).z_offset(range, dest.scale.z, &self.units);
            }
            None => position.z = 0.0,
        }
        position /= self.units.source_to_dest_units;

        Transform::new(position, dest.rotation, scale)
    }

    /// Source transform for a landscape with no stored calibration
    pub fn foreign_source_transform(&self, dest: &Transform) -> Transform {
        self.source_transform(dest, None, Vec3::ONE, (0, 0))
    }
}
