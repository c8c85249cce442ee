//! Direct solvers for the coarse systems of a solver hierarchy.
//!
//! The back-ends have nothing in common beyond "construct from a matrix,
//! then solve": each takes its own parameter set and is built on a
//! different library. [`DirectSolver`] picks one at runtime from the
//! `"type"` configuration key.
//!
//! # Backends
//!
//! - **skyline_lu** (always available): variable-band LU with reverse
//!   Cuthill-McKee reordering. No external dependencies.
//! - **sparse_cholesky** (`--features cholesky`, on by default): sparse
//!   Cholesky from nalgebra-sparse, for SPD systems.
//! - **lapack_lu** (`--features lapack`): dense LU through nalgebra-lapack.
//!   Requires a system LAPACK. Suitable for small coarse systems.

#[cfg(feature = "cholesky")]
pub mod cholesky;
#[cfg(feature = "lapack")]
pub mod lapack_lu;
pub mod runtime;
pub mod skyline_lu;

#[cfg(feature = "cholesky")]
pub use cholesky::SparseCholesky;
#[cfg(feature = "lapack")]
pub use lapack_lu::LapackLu;
pub use runtime::{DirectSolver, DirectSolverType};
pub use skyline_lu::{SkylineLu, SkylineLuParams};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::comm::Communicator;
use crate::matrix::SparseMatrix;

/// Nested key-value configuration.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Failures raised by the back-ends themselves.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Singular matrix: {0}")]
    Singular(String),

    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    #[error("Invalid back-end parameters: {0}")]
    Params(#[from] serde_json::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid matrix data: {0}")]
    Format(String),
}

/// Deserializes the keys forwarded to a back-end into its typed params.
pub(crate) fn backend_params<T: DeserializeOwned>(prm: Params) -> Result<T, BackendError> {
    Ok(serde_json::from_value(serde_json::Value::Object(prm))?)
}

/// Shared construction checks: a serial group and a square matrix.
pub(crate) fn check_system<C, M>(name: &str, comm: &C, a: &M) -> Result<usize, BackendError>
where
    C: Communicator,
    M: SparseMatrix<Value = f64>,
{
    if comm.size() != 1 {
        return Err(BackendError::Unsupported(format!(
            "{} needs the whole system on one process (communicator size {})",
            name,
            comm.size()
        )));
    }
    if a.rows() != a.cols() {
        return Err(BackendError::Format(format!(
            "{} needs a square matrix, got {}x{}",
            name,
            a.rows(),
            a.cols()
        )));
    }
    Ok(a.rows())
}

/// Shared solve checks: rhs and x sized to the system.
pub(crate) fn check_vectors(n: usize, rhs: &[f64], x: &[f64]) -> Result<(), BackendError> {
    for len in [rhs.len(), x.len()] {
        if len != n {
            return Err(BackendError::SizeMismatch {
                expected: n,
                actual: len,
            });
        }
    }
    Ok(())
}
