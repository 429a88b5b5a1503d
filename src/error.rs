//! Error types for spaces, indexes and joins.

use thiserror::Error;

/// Errors raised by the z-order index and join.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Bad `Space` parameters or tunables. Fatal at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A coordinate lies outside the configured bounds of its dimension.
    #[error("Coordinate {coordinate} out of range [{lo}, {hi}) in dimension {dimension}")]
    Range {
        /// Dimension of the offending coordinate.
        dimension: usize,
        /// The coordinate as given by the caller.
        coordinate: f64,
        /// Inclusive lower bound of the dimension.
        lo: f64,
        /// Exclusive upper bound of the dimension.
        hi: f64,
    },

    /// Attempt to join spatial indexes built over different spaces.
    #[error("Attempt to join spatial indexes with incompatible spaces")]
    IncompatibleSpace,

    /// The index already holds an identical record.
    #[error("Duplicate record at z 0x{z:016x}")]
    DuplicateRecord {
        /// Z-value of the rejected record.
        z: i64,
    },

    /// A single-cell index was given an object that did not decompose into exactly one cell.
    #[error("Single-cell index requires exactly one cell, decomposition produced {cells}")]
    SingleCell {
        /// Number of cells the decomposition produced.
        cells: usize,
    },

    /// Malformed spatial object (NaN coordinates, inverted bounds, ...).
    #[error("Invalid spatial object: {0}")]
    InvalidObject(String),

    /// IO error raised by a storage collaborator.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other storage collaborator failure, passed through uninterpreted.
    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
