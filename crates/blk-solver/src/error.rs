//! Error types for blk-solver

use thiserror::Error;

pub use crate::direct::BackendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Matrix size {rows}x{cols} is not divisible by block size {block_size}")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        block_size: usize,
    },

    #[error("Scalar buffer has length {actual}, expected exactly {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    /// True for both flavours of size mismatch (matrix shape or buffer length).
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(
            self,
            Error::DimensionMismatch { .. } | Error::BufferLength { .. }
        )
    }
}
