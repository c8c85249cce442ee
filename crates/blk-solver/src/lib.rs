//! Block-structured sparse solvers.
//!
//! This crate lets solvers written for `B×B` block matrices run on ordinary
//! scalar sparse matrices, and picks direct solvers at runtime:
//!
//! - [`BlockView`] presents a scalar matrix as a block-valued one without
//!   copying it; rows are produced lazily by [`BlockRowIterator`].
//! - [`BlockSolver`] wraps any [`InnerSolver`] behind a scalar interface,
//!   reinterpreting flat `f64` buffers as block vectors in place.
//! - [`DirectSolver`] selects a direct back-end from the `"type"` key of a
//!   JSON configuration.
//!
//! # Example
//!
//! ```no_run
//! use blk_solver::{BlockJacobiBiCgStab, BlockSolver, SolverParams};
//! use nalgebra_sparse::{CooMatrix, CsrMatrix};
//!
//! let mut coo = CooMatrix::new(4, 4);
//! for i in 0..4 {
//!     coo.push(i, i, 2.0);
//! }
//! let a = CsrMatrix::from(&coo);
//!
//! let solver = BlockSolver::<BlockJacobiBiCgStab<2>, 2>::new(
//!     &a,
//!     SolverParams::default(),
//!     &Default::default(),
//! )
//! .unwrap();
//!
//! let mut x = vec![0.0; 4];
//! let (iters, error) = solver.solve(&[1.0; 4], &mut x).unwrap();
//! println!("{} iterations, error {:e}", iters, error);
//! ```

pub mod adapter;
pub mod comm;
pub mod direct;
pub mod error;
pub mod make_block_solver;
pub mod matrix;
pub mod solver;

pub use adapter::{BlockRowIterator, BlockView, block_matrix};
pub use comm::{Communicator, SerialComm};
pub use direct::{BackendError, DirectSolver, DirectSolverType, Params, SkylineLu, SkylineLuParams};
pub use error::{Error, Result};
pub use make_block_solver::BlockSolver;
pub use matrix::{CrsRef, SparseMatrix};
pub use solver::{
    BackendParams, BiCgStab, BiCgStabParams, BlockCsr, BlockJacobi, BlockJacobiBiCgStab,
    BlockJacobiParams, InnerSolver, IterativeSolver, MakeSolver, Preconditioner, SolverParams,
};

#[cfg(feature = "cholesky")]
pub use direct::SparseCholesky;
#[cfg(feature = "lapack")]
pub use direct::LapackLu;
