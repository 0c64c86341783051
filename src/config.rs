//! Conversion configuration and unit conventions.
//!
//! Every option is passed explicitly through `ConversionConfig`; nothing is
//! read from the environment. The config round-trips through pretty JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConversionResult;
use crate::range::NumericRange;
use crate::size::SizeOverride;

/// Physical conventions of the destination landscape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConvention {
    /// Source length unit to destination length unit (metres to centimetres)
    pub source_to_dest_units: f32,
    /// Source horizontal scale is half a cell; one destination step is a full cell
    pub horizontal_factor: f32,
    /// Physical span of the full digit range at 100 % vertical scale
    pub reference_span: f32,
    /// Digit that represents elevation zero in the destination
    pub neutral_digit: u16,
    /// Digits per destination unit at 100 % vertical scale
    pub digits_per_unit: f32,
    /// Half of the physical span the legacy default scale can hold
    pub legacy_half_span: f32,
}

impl Default for UnitConvention {
    fn default() -> Self {
        Self {
            source_to_dest_units: 100.0,
            horizontal_factor: 2.0,
            reference_span: 512.0,
            neutral_digit: 32768,
            digits_per_unit: 128.0,
            legacy_half_span: 256.0,
        }
    }
}

/// Options for one conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Use the whole 16-bit digit span instead of the centred reduced span
    pub use_full_resolution: bool,
    /// Keep the destination's default vertical scale at the cost of precision
    pub use_legacy_scaling: bool,
    /// Quantization range to use instead of the data or bounds extent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_range: Option<NumericRange>,
    /// Fixed section layout instead of solving one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_override: Option<SizeOverride>,
    /// Maximum samples per tile axis; `None` emits a single tile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    /// Source grids arrive column-major and must be transposed
    pub swap_axes: bool,
    pub units: UnitConvention,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            use_full_resolution: false,
            use_legacy_scaling: false,
            forced_range: None,
            size_override: None,
            tile_size: None,
            swap_axes: false,
            units: UnitConvention::default(),
        }
    }
}

impl ConversionConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> ConversionResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Save the config as pretty JSON
    pub fn save(&self, path: &Path) -> ConversionResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ConversionConfig =
            serde_json::from_str(r#"{ "use_full_resolution": true, "tile_size": 126 }"#).unwrap();
        assert!(cfg.use_full_resolution);
        assert!(!cfg.use_legacy_scaling);
        assert_eq!(cfg.tile_size, Some(126));
        assert_eq!(cfg.units, UnitConvention::default());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir().join(format!("landgrid-config-{}.json", std::process::id()));
        let cfg = ConversionConfig {
            forced_range: Some(NumericRange { min: -5.0, max: 15.0 }),
            size_override: Some(SizeOverride {
                sections_per_component: 2,
                quads_per_section: 63,
            }),
            ..Default::default()
        };
        cfg.save(&path).unwrap();
        let loaded = ConversionConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, cfg);
    }
}
