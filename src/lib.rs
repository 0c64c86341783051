//! Heightfield ⇄ landscape grid conversion.
//!
//! Float elevation and weight grids are sized to a canonical landscape
//! layout, quantized to 16-bit heights and 8-bit layers with their
//! calibration, placed with a matching transform and split into tiles.
//! The reverse direction merges tiles and decodes them back to floats.

pub mod config;
pub mod converter;
pub mod error;
pub mod grid;
pub mod host;
pub mod layer;
pub mod placement;
pub mod quantize;
pub mod range;
pub mod resample;
pub mod size;
pub mod terrain_stats;
pub mod tiling;
pub mod transforms;

pub use config::{ConversionConfig, UnitConvention};
pub use converter::{
    Channel, ChannelOutput, ExportedHeightfield, HeightConversion, HeightDecode, HeightTile, HeightfieldConverter,
    LayerConversion, LayerInput, LayerOutcome, LayerTile,
};
pub use error::{ConversionError, ConversionResult, ConversionWarning};
pub use grid::{GridBuffer, Sample};
pub use host::{HeightfieldSource, LandscapeHost, MemoryLandscape, MemorySource};
pub use layer::{Calibration, LayerCodec, LayerGrid, LayerKind};
pub use placement::TransformSolver;
pub use quantize::{DigitScheme, QuantizationCodec, QuantizedGrid};
pub use range::{GlobalRanges, NumericRange};
pub use resample::{GridResampler, ResizeResult};
pub use size::{CanonicalSize, SizeOverride, SizeSolution, SizeSolver};
pub use tiling::{Tile, TileAssembler, TileId, TileLayout};
pub use transforms::Transform;
