//! Error types for tiling and reconstruction operations.
//!
//! All failures are detected eagerly, either at component entry
//! (precondition checks) or at the specific voxel where an inconsistency
//! is discovered. None are recovered locally.

use thiserror::Error;

/// Main error type for tiling operations.
#[derive(Error, Debug)]
pub enum TilingError {
    /// Invalid static parameters. Raised before any allocation or mutation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Extent mismatch between declared and actual array shapes.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    Shape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A merge voxel ended with zero contributing tiles, which means the
    /// overlap plan and the tile stream disagree. Must never be converted
    /// to NaN.
    #[error("Overlap accumulator integrity violated: {0}")]
    AccumulatorIntegrity(String),
}

/// Result type for tiling operations.
pub type Result<T> = std::result::Result<T, TilingError>;

impl TilingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an accumulator integrity error.
    pub fn accumulator(msg: impl Into<String>) -> Self {
        Self::AccumulatorIntegrity(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape(expected: Vec<usize>, actual: Vec<usize>) -> Self {
        Self::Shape { expected, actual }
    }
}
