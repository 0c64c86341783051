//! Float ⇄ 16-bit digit quantization for elevation grids.
//!
//! `digit = round((value - min) * digit_range / span + center_offset)`,
//! clamped to `[0, 65535]`. Arithmetic is done in `f64` for precision.
//! A flat range maps every value to the neutral digit.

use serde::{Deserialize, Serialize};

use crate::config::{ConversionConfig, UnitConvention};
use crate::error::{ConversionError, ConversionResult, ConversionWarning};
use crate::grid::{validate_dims, GridBuffer};
use crate::range::NumericRange;
use crate::transforms::Transform;

/// Largest 16-bit digit
pub const DIGIT_MAX: f64 = u16::MAX as f64;

/// Centered span that leaves headroom for sculpting past the source extent
pub const REDUCED_DIGIT_RANGE: u32 = 49152;

/// How source ranges map onto the digit span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DigitScheme {
    pub digit_range: u32,
    pub center_offset: f64,
}

impl DigitScheme {
    /// Maximum precision; values cannot be edited beyond the source extent
    pub fn full() -> Self {
        Self {
            digit_range: u16::MAX as u32 - 1,
            center_offset: 0.0,
        }
    }

    /// Centered reduced span
    pub fn reduced() -> Self {
        Self {
            digit_range: REDUCED_DIGIT_RANGE,
            center_offset: ((DIGIT_MAX - REDUCED_DIGIT_RANGE as f64) / 2.0).floor(),
        }
    }

    pub fn for_config(config: &ConversionConfig) -> Self {
        if config.use_full_resolution || config.use_legacy_scaling {
            Self::full()
        } else {
            Self::reduced()
        }
    }

    /// Digits per source unit, 0 for a flat range
    pub fn spacing(&self, range: NumericRange) -> f64 {
        let span = range.span() as f64;
        if span != 0.0 {
            self.digit_range as f64 / span
        } else {
            0.0
        }
    }

    /// Source units per digit
    pub fn step(&self, range: NumericRange) -> f64 {
        range.span() as f64 / self.digit_range as f64
    }
}

/// Encoder/decoder for one digit scheme
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizationCodec {
    pub scheme: DigitScheme,
    pub neutral_digit: u16,
}

impl QuantizationCodec {
    pub fn new(scheme: DigitScheme) -> Self {
        Self {
            scheme,
            neutral_digit: UnitConvention::default().neutral_digit,
        }
    }

    pub fn with_neutral_digit(mut self, neutral_digit: u16) -> Self {
        self.neutral_digit = neutral_digit;
        self
    }

    #[inline]
    fn encode_one(&self, value: f32, range: NumericRange, span: f64) -> u16 {
        let digit = (value as f64 - range.min as f64) * self.scheme.digit_range as f64 / span
            + self.scheme.center_offset;
        digit.round().clamp(0.0, DIGIT_MAX) as u16
    }

    pub fn encode(&self, values: &[f32], range: NumericRange) -> Vec<u16> {
        if range.is_degenerate() {
            return vec![self.neutral_digit; values.len()];
        }
        let span = range.span() as f64;
        values
            .iter()
            .map(|&v| self.encode_one(v, range, span))
            .collect()
    }

    pub fn decode(&self, samples: &[u16], range: NumericRange) -> Vec<f32> {
        if range.is_degenerate() {
            return vec![range.min; samples.len()];
        }
        let span = range.span() as f64;
        let digit_range = self.scheme.digit_range as f64;
        samples
            .iter()
            .map(|&d| {
                let v = (d as f64 - self.scheme.center_offset) * span / digit_range + range.min as f64;
                v as f32
            })
            .collect()
    }

    /// Digit that source elevation zero maps to. Not clamped: zero may lie
    /// outside the digit span. `None` for a flat range.
    pub fn zero_digit(&self, range: NumericRange) -> Option<i64> {
        if range.is_degenerate() {
            return None;
        }
        let digit = (0.0 - range.min as f64) * self.scheme.digit_range as f64 / range.span() as f64
            + self.scheme.center_offset;
        Some(digit.round() as i64)
    }

    /// Vertical position offset keeping source zero at destination zero:
    /// `-(zero_digit - neutral) / digits_per_unit * z_scale`
    pub fn z_offset(&self, range: NumericRange, z_scale: f32, units: &UnitConvention) -> f32 {
        match self.zero_digit(range) {
            Some(zero) => {
                let delta = (zero - self.neutral_digit as i64) as f64;
                (-delta / units.digits_per_unit as f64 * z_scale as f64) as f32
            }
            None => range.min * units.source_to_dest_units,
        }
    }

    /// Maximum reconstruction error for values inside `range`
    pub fn max_error(&self, range: NumericRange) -> f64 {
        self.scheme.step(range) / 2.0
    }

    pub fn quantize(&self, grid: &GridBuffer<f32>, range: NumericRange) -> QuantizedGrid {
        QuantizedGrid {
            width: grid.width(),
            height: grid.height(),
            samples: self.encode(grid.values(), range),
            source_range: range,
            scheme: self.scheme,
        }
    }
}

/// Free-function form of [`QuantizationCodec::encode`]
pub fn encode(values: &[f32], range: NumericRange, digit_range: u32, center_offset: f64) -> Vec<u16> {
    QuantizationCodec::new(DigitScheme {
        digit_range,
        center_offset,
    })
    .encode(values, range)
}

/// Free-function form of [`QuantizationCodec::decode`]
pub fn decode(samples: &[u16], range: NumericRange, digit_range: u32, center_offset: f64) -> Vec<f32> {
    QuantizationCodec::new(DigitScheme {
        digit_range,
        center_offset,
    })
    .decode(samples, range)
}

/// Range the destination's default vertical scale can hold for a source
/// with vertical scale `scale_z`.
pub fn legacy_range(scale_z: f32, units: &UnitConvention) -> NumericRange {
    let half = units.legacy_half_span * scale_z * units.horizontal_factor;
    NumericRange {
        min: -half.abs(),
        max: half.abs(),
    }
}

/// Warn when the data extent does not fit the legacy default scale
pub fn check_legacy_range(data: NumericRange, units: &UnitConvention) -> Option<ConversionWarning> {
    let limit = units.legacy_half_span;
    let outside = [data.min, data.max].iter().any(|v| *v < -limit || *v > limit);
    if outside {
        Some(ConversionWarning::PrecisionLoss(format!(
            "heightfield range [{}, {}] exceeds the legacy scaling span [-{}, {}]; values will be clamped",
            data.min, data.max, limit, limit
        )))
    } else {
        None
    }
}

/// 16-bit elevation samples plus the calibration used to produce them
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedGrid {
    pub width: u32,
    pub height: u32,
    pub samples: Vec<u16>,
    pub source_range: NumericRange,
    pub scheme: DigitScheme,
}

impl QuantizedGrid {
    pub fn new(
        width: u32,
        height: u32,
        samples: Vec<u16>,
        source_range: NumericRange,
        scheme: DigitScheme,
    ) -> ConversionResult<Self> {
        validate_dims(width, height, samples.len())?;
        Ok(Self {
            width,
            height,
            samples,
            source_range,
            scheme,
        })
    }

    pub fn to_grid(&self, transform: Transform) -> GridBuffer<u16> {
        GridBuffer::from_raw(self.width, self.height, self.samples.clone(), transform)
    }

    pub fn from_grid(grid: GridBuffer<u16>, source_range: NumericRange, scheme: DigitScheme) -> Self {
        let (width, height) = grid.dims();
        Self {
            width,
            height,
            samples: grid.into_values(),
            source_range,
            scheme,
        }
    }

    /// Raw native-endian payload, as a host would upload it
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }

    pub fn from_bytes(
        width: u32,
        height: u32,
        bytes: &[u8],
        source_range: NumericRange,
        scheme: DigitScheme,
    ) -> ConversionResult<Self> {
        if bytes.len() % 2 != 0 {
            return Err(ConversionError::LengthMismatch {
                expected: bytes.len() + 1,
                actual: bytes.len(),
            });
        }
        let samples: Vec<u16> = bytemuck::allocation::pod_collect_to_vec(bytes);
        Self::new(width, height, samples, source_range, scheme)
    }
}

/// Heights in source units read back from digits and a destination
/// transform alone, for landscapes that carry no stored calibration.
pub fn decode_with_transform(samples: &[u16], transform: &Transform, units: &UnitConvention) -> Vec<f32> {
    let scale_z = transform.scale.z as f64;
    let position_z = transform.position.z as f64;
    let neutral = units.neutral_digit as f64;
    let per_unit = units.digits_per_unit as f64;
    let to_source = units.source_to_dest_units as f64;
    samples
        .iter()
        .map(|&d| {
            let dest = (d as f64 - neutral) / per_unit * scale_z + position_z;
            (dest / to_source) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_lands_on_neutral_digit() {
        let range = NumericRange { min: -5.0, max: 15.0 };
        let digits = encode(&[5.0], range, 49152, 8192.0);
        assert_eq!(digits, vec![32768]);
        assert_eq!(decode(&[32768], range, 49152, 8192.0), vec![5.0]);
    }

    #[test]
    fn reduced_scheme_constants() {
        let s = DigitScheme::reduced();
        assert_eq!(s.digit_range, 49152);
        assert_eq!(s.center_offset, 8191.0);
        assert_eq!(DigitScheme::full().digit_range, 65534);
    }

    #[test]
    fn round_trip_within_one_step() {
        let ranges = [
            NumericRange { min: -5.0, max: 15.0 },
            NumericRange { min: 0.0, max: 0.001 },
            NumericRange { min: -1200.0, max: 4800.0 },
        ];
        for scheme in [DigitScheme::full(), DigitScheme::reduced()] {
            let codec = QuantizationCodec::new(scheme);
            for range in ranges {
                let values: Vec<f32> = (0..=200)
                    .map(|i| range.min + range.span() * i as f32 / 200.0)
                    .collect();
                let back = codec.decode(&codec.encode(&values, range), range);
                let tol = range.span() as f64 / scheme.digit_range as f64;
                for (v, b) in values.iter().zip(back.iter()) {
                    assert!(((*v - *b) as f64).abs() <= tol + 1e-6, "{} vs {}", v, b);
                }
            }
        }
    }

    #[test]
    fn flat_range_is_constant_neutral() {
        let codec = QuantizationCodec::new(DigitScheme::reduced());
        let range = NumericRange::flat(3.0);
        let digits = codec.encode(&[3.0, 3.0, 3.0], range);
        assert_eq!(digits, vec![32768; 3]);
        assert_eq!(codec.decode(&digits, range), vec![3.0; 3]);
        assert_eq!(codec.zero_digit(range), None);
    }

    #[test]
    fn out_of_range_values_clamp() {
        let codec = QuantizationCodec::new(DigitScheme::full());
        let range = NumericRange { min: 0.0, max: 1.0 };
        assert_eq!(codec.encode(&[-10.0, 10.0], range), vec![0, 65535]);
    }

    #[test]
    fn zero_digit_and_offset() {
        let codec = QuantizationCodec::new(DigitScheme {
            digit_range: 49152,
            center_offset: 8192.0,
        });
        let units = UnitConvention::default();
        // Symmetric range: zero sits on the neutral digit, no offset.
        let sym = NumericRange { min: -10.0, max: 10.0 };
        assert_eq!(codec.zero_digit(sym), Some(32768));
        assert_eq!(codec.z_offset(sym, 100.0, &units), 0.0);

        // Zero below the range: digit is negative and the landscape moves up.
        let high = NumericRange { min: 10.0, max: 20.0 };
        let zero = codec.zero_digit(high).unwrap();
        assert!(zero < 0);
        assert!(codec.z_offset(high, 100.0, &units) > 0.0);
    }

    #[test]
    fn legacy_range_check() {
        let units = UnitConvention::default();
        assert!(check_legacy_range(NumericRange { min: -10.0, max: 200.0 }, &units).is_none());
        let warn = check_legacy_range(NumericRange { min: -10.0, max: 300.0 }, &units).unwrap();
        assert!(warn.is_precision_loss());
        let r = legacy_range(0.5, &units);
        assert_eq!(r, NumericRange { min: -256.0, max: 256.0 });
    }

    #[test]
    fn byte_payload_round_trip() {
        let q = QuantizedGrid::new(
            2,
            2,
            vec![0, 1, 65535, 32768],
            NumericRange { min: 0.0, max: 1.0 },
            DigitScheme::full(),
        )
        .unwrap();
        let bytes = q.as_bytes().to_vec();
        assert_eq!(bytes.len(), 8);
        let back = QuantizedGrid::from_bytes(2, 2, &bytes, q.source_range, q.scheme).unwrap();
        assert_eq!(back, q);
        assert!(QuantizedGrid::from_bytes(2, 2, &bytes[..7], q.source_range, q.scheme).is_err());
    }

    #[test]
    fn transform_decode_inverts_neutral() {
        let units = UnitConvention::default();
        let t = Transform::from_position(glam::Vec3::new(0.0, 0.0, 250.0)).with_scale(glam::Vec3::splat(100.0));
        let heights = decode_with_transform(&[32768, 32768 + 128], &t, &units);
        assert!((heights[0] - 2.5).abs() < 1e-6);
        assert!((heights[1] - 3.5).abs() < 1e-6);
    }
}
