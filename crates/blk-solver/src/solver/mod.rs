//! Inner solvers operating in block space.
//!
//! [`InnerSolver`] is the capability set the scalar-buffer facade
//! ([`BlockSolver`](crate::BlockSolver)) builds on: constructible from a
//! block-valued matrix, callable on block vectors, and able to report its
//! system matrix, memory footprint and setup summary.
//!
//! [`MakeSolver`] is the reference implementation. It materializes the
//! system matrix as [`BlockCsr`], builds a [`Preconditioner`] on it and
//! drives an [`IterativeSolver`]:
//!
//! ```text
//! BlockView ──► BlockCsr ──► Preconditioner
//!                   │              │
//!                   └──► IterativeSolver ◄── rhs, x
//! ```

pub mod bicgstab;
pub mod block_csr;
pub mod precond;

use std::fmt;
use std::sync::Arc;

use nalgebra::{SMatrix, SVector};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use bicgstab::{BiCgStab, BiCgStabParams};
pub use block_csr::BlockCsr;
pub use precond::{BlockJacobi, BlockJacobiParams};

use crate::direct::BackendError;
use crate::error::{Error, Result};
use crate::matrix::SparseMatrix;

/// Preconditioner built on a materialized block matrix.
pub trait Preconditioner<const B: usize>: Sized + fmt::Display {
    type Params: Clone + Default + fmt::Debug + Serialize + DeserializeOwned;

    fn new(a: &BlockCsr<B>, prm: Self::Params) -> std::result::Result<Self, BackendError>;

    /// x = M^-1 rhs
    fn apply(&self, rhs: &[SVector<f64, B>], x: &mut [SVector<f64, B>]);

    fn bytes(&self) -> usize;
}

/// Krylov-type solver driven by a preconditioner.
pub trait IterativeSolver<const B: usize>: Sized + fmt::Display {
    type Params: Clone + Default + fmt::Debug + Serialize + DeserializeOwned;

    fn new(n: usize, prm: Self::Params) -> Self;

    /// Solves `a x = rhs` starting from the current `x`; returns the number
    /// of iterations and the relative residual norm.
    fn solve<A, P>(
        &self,
        a: &A,
        p: &P,
        rhs: &[SVector<f64, B>],
        x: &mut [SVector<f64, B>],
    ) -> (usize, f64)
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>>,
        P: Preconditioner<B>;

    fn bytes(&self) -> usize;
}

/// Solver operating on `B×B` block matrices and `B`-vectors.
pub trait InnerSolver<const B: usize>: Sized + fmt::Display {
    /// System matrix as stored by the solver.
    type Matrix: SparseMatrix<Value = SMatrix<f64, B, B>>;
    type Params;
    type BackendParams;

    fn new<A>(a: &A, prm: Self::Params, bprm: &Self::BackendParams) -> Result<Self>
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>> + Sync;

    /// Solves with the system matrix given at construction.
    fn solve(&self, rhs: &[SVector<f64, B>], x: &mut [SVector<f64, B>]) -> Result<(usize, f64)>;

    /// Solves with a different matrix of the same structure, reusing the
    /// preconditioner built at construction.
    fn solve_with_matrix<A>(
        &self,
        a: &A,
        rhs: &[SVector<f64, B>],
        x: &mut [SVector<f64, B>],
    ) -> Result<(usize, f64)>
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>>;

    fn system_matrix(&self) -> &Self::Matrix;
    fn system_matrix_ptr(&self) -> Arc<Self::Matrix>;

    /// Memory footprint in bytes.
    fn bytes(&self) -> usize;
}

/// Backend configuration of the reference solver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendParams {
    /// Assemble the block system matrix with rayon
    pub parallel: bool,
}

impl Default for BackendParams {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Parameters of a composed solver: `{ "precond": {...}, "solver": {...} }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(
    default,
    bound(deserialize = "P: Deserialize<'de> + Default, S: Deserialize<'de> + Default")
)]
pub struct SolverParams<P, S> {
    pub precond: P,
    pub solver: S,
}

impl<P, S> SolverParams<P, S>
where
    P: DeserializeOwned + Default,
    S: DeserializeOwned + Default,
{
    /// Reads parameters from a JSON tree; missing keys keep their defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::Backend(BackendError::Params(e)))
    }
}

/// Preconditioner + iterative solver over a materialized block matrix.
pub struct MakeSolver<P, S, const B: usize> {
    a: Arc<BlockCsr<B>>,
    precond: P,
    solver: S,
}

impl<P, S, const B: usize> MakeSolver<P, S, B>
where
    P: Preconditioner<B>,
    S: IterativeSolver<B>,
{
    pub fn precond(&self) -> &P {
        &self.precond
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    fn check_len(&self, len: usize) -> Result<()> {
        let n = self.a.rows();
        if len != n {
            return Err(Error::BufferLength {
                expected: n,
                actual: len,
            });
        }
        Ok(())
    }
}

impl<P, S, const B: usize> InnerSolver<B> for MakeSolver<P, S, B>
where
    P: Preconditioner<B>,
    S: IterativeSolver<B>,
{
    type Matrix = BlockCsr<B>;
    type Params = SolverParams<P::Params, S::Params>;
    type BackendParams = BackendParams;

    fn new<A>(a: &A, prm: Self::Params, bprm: &Self::BackendParams) -> Result<Self>
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>> + Sync,
    {
        log::debug!("make_solver: precond {:?}, solver {:?}", prm.precond, prm.solver);

        let a = Arc::new(BlockCsr::from_matrix(a, bprm.parallel));
        let precond = P::new(&a, prm.precond)?;
        let solver = S::new(a.rows(), prm.solver);

        Ok(Self { a, precond, solver })
    }

    fn solve(&self, rhs: &[SVector<f64, B>], x: &mut [SVector<f64, B>]) -> Result<(usize, f64)> {
        self.check_len(rhs.len())?;
        self.check_len(x.len())?;
        Ok(self.solver.solve(self.a.as_ref(), &self.precond, rhs, x))
    }

    fn solve_with_matrix<A>(
        &self,
        a: &A,
        rhs: &[SVector<f64, B>],
        x: &mut [SVector<f64, B>],
    ) -> Result<(usize, f64)>
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>>,
    {
        self.check_len(rhs.len())?;
        self.check_len(x.len())?;
        if a.rows() != self.a.rows() || a.cols() != self.a.cols() {
            return Err(Error::InvalidArgument(format!(
                "Matrix is {}x{} blocks, solver was set up for {}x{}",
                a.rows(),
                a.cols(),
                self.a.rows(),
                self.a.cols()
            )));
        }
        Ok(self.solver.solve(a, &self.precond, rhs, x))
    }

    fn system_matrix(&self) -> &Self::Matrix {
        &self.a
    }

    fn system_matrix_ptr(&self) -> Arc<Self::Matrix> {
        Arc::clone(&self.a)
    }

    fn bytes(&self) -> usize {
        self.a.bytes() + self.precond.bytes() + self.solver.bytes()
    }
}

impl<P, S, const B: usize> fmt::Display for MakeSolver<P, S, B>
where
    P: Preconditioner<B>,
    S: IterativeSolver<B>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solver")?;
        writeln!(f, "======")?;
        writeln!(f, "{}", self.solver)?;
        writeln!(f, "Memory footprint: {}", human_bytes(self.solver.bytes()))?;
        writeln!(f)?;
        writeln!(f, "Preconditioner")?;
        writeln!(f, "==============")?;
        writeln!(f, "{}", self.precond)?;
        writeln!(
            f,
            "Nonzeros:         {} ({}x{} blocks)",
            self.a.nonzeros(),
            B,
            B
        )?;
        write!(
            f,
            "Memory footprint: {}",
            human_bytes(self.a.bytes() + self.precond.bytes())
        )
    }
}

/// Formats a byte count with a binary unit suffix.
pub fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// Block-Jacobi preconditioned BiCGStab.
pub type BlockJacobiBiCgStab<const B: usize> = MakeSolver<BlockJacobi<B>, BiCgStab<B>, B>;
