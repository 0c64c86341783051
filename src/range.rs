//! Numeric ranges used to calibrate quantization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, ConversionResult};
use crate::terrain_stats;

/// Closed value range `[min, max]`. `min == max` marks a flat grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f32,
    pub max: f32,
}

impl NumericRange {
    pub const UNIT: Self = Self { min: 0.0, max: 1.0 };

    pub fn new(min: f32, max: f32) -> ConversionResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ConversionError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Single value range
    pub fn flat(value: f32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Scan the samples for their extent
    pub fn from_values(values: &[f32]) -> Self {
        let (min, max) = terrain_stats::min_max(values);
        Self { min, max }
    }

    #[inline]
    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Per-channel global extents accumulated over many source grids, so that
/// heightfields converted as separate tiles share one calibration.
#[derive(Debug, Clone, Default)]
pub struct GlobalRanges {
    ranges: BTreeMap<String, NumericRange>,
}

impl GlobalRanges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the named channel's range by `range`
    pub fn include(&mut self, name: &str, range: NumericRange) {
        self.ranges
            .entry(name.to_string())
            .and_modify(|r| *r = r.union(&range))
            .or_insert(range);
    }

    pub fn include_values(&mut self, name: &str, values: &[f32]) {
        if values.is_empty() {
            return;
        }
        self.include(name, NumericRange::from_values(values));
    }

    pub fn get(&self, name: &str) -> Option<NumericRange> {
        self.ranges.get(name).copied()
    }

    /// Union over every channel; `{0, 0}` when nothing was recorded
    pub fn overall(&self) -> NumericRange {
        self.ranges
            .values()
            .copied()
            .reduce(|a, b| a.union(&b))
            .unwrap_or(NumericRange::flat(0.0))
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Clamp every value into `range`. Returns the clamped values and how many changed.
pub fn clamp_values(values: &[f32], range: NumericRange) -> (Vec<f32>, usize) {
    let mut changed = 0;
    let out = values
        .iter()
        .map(|&v| {
            let c = v.clamp(range.min, range.max);
            if c != v {
                changed += 1;
            }
            c
        })
        .collect();
    (out, changed)
}
