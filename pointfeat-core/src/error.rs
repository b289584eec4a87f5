//! Error types for pointfeat

use thiserror::Error;

/// Main error type for pointfeat operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid search policy: {0}")]
    InvalidPolicy(String),

    #[error("Dimension mismatch: {positions} positions but {normals} normals")]
    DimensionMismatch { positions: usize, normals: usize },

    #[error("Index {index} out of range for point cloud of {len} points")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Normal at index {index} is not a finite unit vector")]
    InvalidNormal { index: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Result type alias for pointfeat operations
pub type Result<T> = std::result::Result<T, Error>;
