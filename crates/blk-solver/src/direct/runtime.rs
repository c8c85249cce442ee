//! Runtime selection of a direct solver.
//!
//! The set of back-ends is fixed at compile time by cargo features; the
//! one to use is picked from the `"type"` key of the configuration. The
//! enum variant is the only record of which back-end is active, and every
//! operation dispatches with an exhaustive `match`.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

#[cfg(feature = "cholesky")]
use super::SparseCholesky;
#[cfg(feature = "lapack")]
use super::LapackLu;
use super::{Params, SkylineLu};
use crate::comm::Communicator;
use crate::error::{Error, Result};
use crate::matrix::SparseMatrix;

/// Direct solvers compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectSolverType {
    SkylineLu,
    #[cfg(feature = "cholesky")]
    SparseCholesky,
    #[cfg(feature = "lapack")]
    LapackLu,
}

const AVAILABLE: &[DirectSolverType] = &[
    DirectSolverType::SkylineLu,
    #[cfg(feature = "cholesky")]
    DirectSolverType::SparseCholesky,
    #[cfg(feature = "lapack")]
    DirectSolverType::LapackLu,
];

impl DirectSolverType {
    /// Tags accepted by this build, in declaration order.
    pub fn available() -> &'static [DirectSolverType] {
        AVAILABLE
    }

    /// Configuration string of this back-end.
    pub fn name(&self) -> &'static str {
        match self {
            DirectSolverType::SkylineLu => "skyline_lu",
            #[cfg(feature = "cholesky")]
            DirectSolverType::SparseCholesky => "sparse_cholesky",
            #[cfg(feature = "lapack")]
            DirectSolverType::LapackLu => "lapack_lu",
        }
    }

    fn choices() -> String {
        AVAILABLE
            .iter()
            .map(DirectSolverType::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DirectSolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DirectSolverType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AVAILABLE
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Invalid direct solver value '{}'. Valid choices are: {}.",
                    s,
                    DirectSolverType::choices()
                ))
            })
    }
}

/// Direct solver chosen at runtime.
///
/// With a distributed communicator, construction and every `solve` are
/// collective.
pub enum DirectSolver {
    SkylineLu(SkylineLu),
    #[cfg(feature = "cholesky")]
    SparseCholesky(SparseCholesky),
    #[cfg(feature = "lapack")]
    LapackLu(LapackLu),
}

impl DirectSolver {
    /// Builds the back-end named by `prm["type"]`.
    ///
    /// The `"type"` key is removed; all other keys are handed to the chosen
    /// back-end untouched. Back-end failures are returned as-is in
    /// [`Error::Backend`].
    pub fn new<C, M>(comm: &C, a: &M, mut prm: Params) -> Result<Self>
    where
        C: Communicator,
        M: SparseMatrix<Value = f64>,
    {
        let kind = match prm.remove("type") {
            None => return Err(Error::MissingParameter("type".into())),
            Some(Value::String(s)) => s.parse::<DirectSolverType>()?,
            Some(other) => {
                return Err(Error::InvalidArgument(format!(
                    "Direct solver type must be a string, got {}. Valid choices are: {}.",
                    other,
                    DirectSolverType::choices()
                )));
            }
        };

        log::debug!(
            "direct solver: {} on {}x{} system (rank {} of {})",
            kind,
            a.rows(),
            a.cols(),
            comm.rank(),
            comm.size()
        );

        let solver = match kind {
            DirectSolverType::SkylineLu => DirectSolver::SkylineLu(SkylineLu::new(comm, a, prm)?),
            #[cfg(feature = "cholesky")]
            DirectSolverType::SparseCholesky => {
                DirectSolver::SparseCholesky(SparseCholesky::new(comm, a, prm)?)
            }
            #[cfg(feature = "lapack")]
            DirectSolverType::LapackLu => DirectSolver::LapackLu(LapackLu::new(comm, a, prm)?),
        };

        Ok(solver)
    }

    /// Convenience constructor from a JSON object.
    pub fn from_json<C, M>(comm: &C, a: &M, prm: Value) -> Result<Self>
    where
        C: Communicator,
        M: SparseMatrix<Value = f64>,
    {
        match prm {
            Value::Object(map) => Self::new(comm, a, map),
            other => Err(Error::InvalidArgument(format!(
                "Direct solver parameters must be an object, got {}",
                other
            ))),
        }
    }

    /// Solves `A x = rhs` with the active back-end.
    pub fn solve(&self, rhs: &[f64], x: &mut [f64]) -> Result<()> {
        match self {
            DirectSolver::SkylineLu(s) => s.solve(rhs, x)?,
            #[cfg(feature = "cholesky")]
            DirectSolver::SparseCholesky(s) => s.solve(rhs, x)?,
            #[cfg(feature = "lapack")]
            DirectSolver::LapackLu(s) => s.solve(rhs, x)?,
        }
        Ok(())
    }

    pub fn kind(&self) -> DirectSolverType {
        match self {
            DirectSolver::SkylineLu(_) => DirectSolverType::SkylineLu,
            #[cfg(feature = "cholesky")]
            DirectSolver::SparseCholesky(_) => DirectSolverType::SparseCholesky,
            #[cfg(feature = "lapack")]
            DirectSolver::LapackLu(_) => DirectSolverType::LapackLu,
        }
    }

    /// Number of unknowns.
    pub fn size(&self) -> usize {
        match self {
            DirectSolver::SkylineLu(s) => s.size(),
            #[cfg(feature = "cholesky")]
            DirectSolver::SparseCholesky(s) => s.size(),
            #[cfg(feature = "lapack")]
            DirectSolver::LapackLu(s) => s.size(),
        }
    }
}

impl fmt::Debug for DirectSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectSolver")
            .field("type", &self.kind())
            .field("size", &self.size())
            .finish()
    }
}

impl fmt::Display for DirectSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} unknowns)", self.kind(), self.size())
    }
}
