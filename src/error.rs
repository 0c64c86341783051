//! Central error handling for landgrid conversions
//!
//! Provides a unified `ConversionError` enum for fatal failures of a single
//! conversion unit, plus `ConversionWarning` for notices that let the
//! conversion proceed. Batch callers skip a failing unit and continue.

use std::fmt;

use crate::tiling::TileId;

/// Centralized error type for all conversion operations
#[derive(thiserror::Error, Debug)]
pub enum ConversionError {
    #[error("Invalid grid: {width}x{height} (both axes must be >= 2)")]
    InvalidGrid { width: u32, height: u32 },

    #[error("Sample count mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Size solve failed: {0}")]
    SizeSolveFailed(String),

    #[error("Tiles leave {missing} cells uncovered (first gap at {first_gap:?})")]
    TileCoverage { missing: usize, first_gap: (u32, u32) },

    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    #[error("Invalid numeric range: min={min}, max={max}")]
    InvalidRange { min: f32, max: f32 },

    #[error("Tile {0:?} not found")]
    MissingTile(TileId),

    #[error("Source channel '{0}' not found")]
    MissingChannel(String),

    #[error("Layer '{layer}' not found for tile {tile:?}")]
    MissingLayer { tile: TileId, layer: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConversionError {
    /// Convenience constructors for common error types
    pub fn invalid_grid(width: u32, height: u32) -> Self {
        ConversionError::InvalidGrid { width, height }
    }

    pub fn invalid_tile<T: ToString>(msg: T) -> Self {
        ConversionError::InvalidTile(msg.to_string())
    }

}

/// Result type alias for conversion operations
pub type ConversionResult<T> = Result<T, ConversionError>;

/// Non-fatal notices produced while converting.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionWarning {
    /// Round-tripping will not reproduce the source values exactly.
    PrecisionLoss(String),
    /// No exact or nearest-larger canonical size exists; the largest
    /// component layout was used and the grid will be cropped or padded.
    SizeFallback {
        source: (u32, u32),
        canonical: (u32, u32),
    },
    Padded {
        from: (u32, u32),
        to: (u32, u32),
    },
    Resampled {
        from: (u32, u32),
        to: (u32, u32),
    },
    /// A flat non-mask layer was not emitted.
    DegenerateLayerSkipped { layer: String },
    /// Merge inputs overlapped; later tiles overwrote earlier ones.
    TileOverlap { cells: usize },
    /// Input values were clamped into the quantization range.
    ValuesClamped { count: usize },
}

impl ConversionWarning {
    /// Log the warning through the `log` facade and hand it back.
    pub fn emit(self) -> Self {
        log::warn!("{}", self);
        self
    }

    pub fn is_precision_loss(&self) -> bool {
        matches!(
            self,
            ConversionWarning::PrecisionLoss(_)
                | ConversionWarning::SizeFallback { .. }
                | ConversionWarning::ValuesClamped { .. }
        )
    }
}

impl fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrecisionLoss(msg) => write!(f, "Precision loss: {}", msg),
            Self::SizeFallback { source, canonical } => write!(
                f,
                "Precision loss: no exact landscape size for {}x{}, falling back to {}x{}",
                source.0, source.1, canonical.0, canonical.1
            ),
            Self::Padded { from, to } => write!(
                f,
                "Landscape data was padded from ({} x {}) to ({} x {})",
                from.0, from.1, to.0, to.1
            ),
            Self::Resampled { from, to } => write!(
                f,
                "Landscape data was resized from ({} x {}) to ({} x {})",
                from.0, from.1, to.0, to.1
            ),
            Self::DegenerateLayerSkipped { layer } => {
                write!(f, "Skipped flat layer '{}'", layer)
            }
            Self::TileOverlap { cells } => {
                write!(f, "Tiles overlap on {} cells, last writer wins", cells)
            }
            Self::ValuesClamped { count } => {
                write!(f, "{} values were clamped to the quantization range", count)
            }
        }
    }
}
