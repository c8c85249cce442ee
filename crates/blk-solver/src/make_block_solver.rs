//! Scalar-buffer front end for block solvers.
//!
//! [`BlockSolver`] wraps an [`InnerSolver`] that works with `B×B` blocks
//! and `B`-vectors, and lets callers keep their matrix and vectors in
//! plain scalar form. The matrix is viewed through a [`BlockView`]; the
//! vectors are reinterpreted in place, `B` consecutive scalars per block.

use std::fmt;
use std::sync::Arc;

use nalgebra::SVector;

use crate::adapter::BlockView;
use crate::error::{Error, Result};
use crate::matrix::SparseMatrix;
use crate::solver::InnerSolver;

/// Block-valued solver behind a scalar interface.
pub struct BlockSolver<S, const B: usize> {
    inner: S,
}

impl<S, const B: usize> BlockSolver<S, B>
where
    S: InnerSolver<B>,
{
    /// Sets up the inner solver on the block view of `a`.
    pub fn new<M>(a: &M, prm: S::Params, bprm: &S::BackendParams) -> Result<Self>
    where
        M: SparseMatrix<Value = f64> + Sync,
    {
        let view = BlockView::<M, B>::new(a)?;
        let inner = S::new(&view, prm, bprm)?;

        log::info!(
            "block solver: {} block rows of size {}, {} stored blocks",
            inner.system_matrix().rows(),
            B,
            inner.system_matrix().nonzeros()
        );

        Ok(Self { inner })
    }

    /// Solves with the matrix given at construction.
    ///
    /// `rhs` and `x` hold `B * rows` scalars each, where `rows` counts block
    /// rows of the system matrix. Returns the number of iterations and the
    /// relative residual norm reported by the inner solver.
    pub fn solve(&self, rhs: &[f64], x: &mut [f64]) -> Result<(usize, f64)> {
        let (rhs, x) = self.blocks(rhs, x)?;
        let (iters, error) = self.inner.solve(rhs, x)?;
        log::info!("block solver: {} iterations, error {:e}", iters, error);
        Ok((iters, error))
    }

    /// Solves with a new scalar matrix of the same shape, keeping the setup
    /// (preconditioner) built for the first one.
    pub fn solve_with_matrix<M>(&self, a: &M, rhs: &[f64], x: &mut [f64]) -> Result<(usize, f64)>
    where
        M: SparseMatrix<Value = f64>,
    {
        let view = BlockView::<M, B>::new(a)?;
        let (rhs, x) = self.blocks(rhs, x)?;
        let (iters, error) = self.inner.solve_with_matrix(&view, rhs, x)?;
        log::info!("block solver: {} iterations, error {:e}", iters, error);
        Ok((iters, error))
    }

    pub fn system_matrix(&self) -> &S::Matrix {
        self.inner.system_matrix()
    }

    pub fn system_matrix_ptr(&self) -> Arc<S::Matrix> {
        self.inner.system_matrix_ptr()
    }

    /// Memory footprint of the inner solver in bytes.
    pub fn bytes(&self) -> usize {
        self.inner.bytes()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Scalar length of the vectors this solver accepts.
    pub fn size(&self) -> usize {
        self.inner.system_matrix().rows() * B
    }

    fn blocks<'r, 'x>(
        &self,
        rhs: &'r [f64],
        x: &'x mut [f64],
    ) -> Result<(&'r [SVector<f64, B>], &'x mut [SVector<f64, B>])> {
        let n = self.size();
        for len in [rhs.len(), x.len()] {
            if len != n {
                return Err(Error::BufferLength {
                    expected: n,
                    actual: len,
                });
            }
        }

        let rhs: &[SVector<f64, B>] = bytemuck::try_cast_slice(rhs)
            .map_err(|e| Error::InvalidArgument(format!("rhs: {}", e)))?;
        let x: &mut [SVector<f64, B>] = bytemuck::try_cast_slice_mut(x)
            .map_err(|e| Error::InvalidArgument(format!("x: {}", e)))?;

        Ok((rhs, x))
    }
}

impl<S, const B: usize> fmt::Display for BlockSolver<S, B>
where
    S: InnerSolver<B>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{BlockCsr, block_csr};
    use nalgebra::SMatrix;
    use nalgebra_sparse::{CooMatrix, CsrMatrix};

    /// Applies the system matrix once: x = A rhs.
    struct Multiply<const B: usize> {
        a: Arc<BlockCsr<B>>,
    }

    impl<const B: usize> fmt::Display for Multiply<B> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "multiply ({} block rows)", self.a.rows())
        }
    }

    impl<const B: usize> InnerSolver<B> for Multiply<B> {
        type Matrix = BlockCsr<B>;
        type Params = ();
        type BackendParams = ();

        fn new<A>(a: &A, _prm: (), _bprm: &()) -> Result<Self>
        where
            A: SparseMatrix<Value = SMatrix<f64, B, B>> + Sync,
        {
            Ok(Self {
                a: Arc::new(BlockCsr::from_matrix(a, false)),
            })
        }

        fn solve(
            &self,
            rhs: &[SVector<f64, B>],
            x: &mut [SVector<f64, B>],
        ) -> Result<(usize, f64)> {
            self.a.spmv(rhs, x);
            Ok((1, 0.0))
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
            block_csr::spmv(a, rhs, x);
            Ok((2, 0.0))
        }

        fn system_matrix(&self) -> &BlockCsr<B> {
            &self.a
        }

        fn system_matrix_ptr(&self) -> Arc<BlockCsr<B>> {
            Arc::clone(&self.a)
        }

        fn bytes(&self) -> usize {
            self.a.bytes()
        }
    }

    fn scalar_matrix(scale: f64) -> CsrMatrix<f64> {
        // 4x4, couples both block rows
        let mut coo = CooMatrix::new(4, 4);
        coo.push(0, 0, 1.0 * scale);
        coo.push(0, 3, 2.0 * scale);
        coo.push(1, 1, 3.0 * scale);
        coo.push(2, 0, 4.0 * scale);
        coo.push(2, 2, 5.0 * scale);
        coo.push(3, 3, 6.0 * scale);
        CsrMatrix::from(&coo)
    }

    #[test]
    fn scalar_buffers_follow_block_layout() {
        let a = scalar_matrix(1.0);
        let solver = BlockSolver::<Multiply<2>, 2>::new(&a, (), &()).unwrap();
        assert_eq!(solver.size(), 4);
        assert_eq!(solver.system_matrix().rows(), 2);

        let rhs = [1.0, 1.0, 1.0, 1.0];
        let mut x = [0.0; 4];
        let (iters, _) = solver.solve(&rhs, &mut x).unwrap();
        assert_eq!(iters, 1);
        assert_eq!(x, [3.0, 3.0, 9.0, 6.0]);
    }

    #[test]
    fn solve_with_matrix_uses_new_coefficients() {
        let a = scalar_matrix(1.0);
        let solver = BlockSolver::<Multiply<2>, 2>::new(&a, (), &()).unwrap();

        let a2 = scalar_matrix(2.0);
        let mut x = [0.0; 4];
        let (iters, _) = solver
            .solve_with_matrix(&a2, &[1.0, 1.0, 1.0, 1.0], &mut x)
            .unwrap();
        assert_eq!(iters, 2);
        assert_eq!(x, [6.0, 6.0, 18.0, 12.0]);
    }

    #[test]
    fn wrong_buffer_length_is_a_dimension_mismatch() {
        let a = scalar_matrix(1.0);
        let solver = BlockSolver::<Multiply<2>, 2>::new(&a, (), &()).unwrap();

        let mut x = [0.0; 4];
        let err = solver.solve(&[1.0; 3], &mut x).unwrap_err();
        assert!(err.is_dimension_mismatch());
        assert!(matches!(
            err,
            Error::BufferLength {
                expected: 4,
                actual: 3
            }
        ));

        let mut short = [0.0; 5];
        assert!(solver.solve(&[1.0; 4], &mut short).is_err());
    }

    #[test]
    fn indivisible_matrix_is_rejected() {
        let a = scalar_matrix(1.0);
        let err = BlockSolver::<Multiply<3>, 3>::new(&a, (), &()).err();
        assert!(matches!(err, Some(Error::DimensionMismatch { .. })));
    }
}
