//! Sparse Cholesky back-end (nalgebra-sparse).

use nalgebra::DMatrix;
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use serde::Deserialize;

use super::{BackendError, Params, backend_params, check_system, check_vectors};
use crate::comm::Communicator;
use crate::matrix::SparseMatrix;

/// Accepts no keys; present so that stray keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

/// Sparse Cholesky factorization for symmetric positive definite systems.
///
/// Only the values are taken as given: the matrix is assumed symmetric.
pub struct SparseCholesky {
    n: usize,
    factor: CscCholesky<f64>,
}

impl SparseCholesky {
    pub fn new<C, M>(comm: &C, a: &M, prm: Params) -> Result<Self, BackendError>
    where
        C: Communicator,
        M: SparseMatrix<Value = f64>,
    {
        let _: NoParams = backend_params(prm)?;
        let n = check_system("sparse_cholesky", comm, a)?;

        let mut coo = CooMatrix::new(n, n);
        for i in 0..n {
            for (j, v) in a.row_begin(i) {
                coo.push(i, j, v);
            }
        }
        let csc = CscMatrix::from(&coo);

        let factor = CscCholesky::factor(&csc).map_err(|_| BackendError::NotPositiveDefinite)?;

        log::debug!(
            "sparse_cholesky: n = {}, nnz(L) = {}",
            n,
            factor.l().nnz()
        );

        Ok(Self { n, factor })
    }

    pub fn solve(&self, rhs: &[f64], x: &mut [f64]) -> Result<(), BackendError> {
        check_vectors(self.n, rhs, x)?;

        let b = DMatrix::from_column_slice(self.n, 1, rhs);
        let sol = self.factor.solve(&b);
        x.copy_from_slice(sol.as_slice());

        Ok(())
    }

    pub fn size(&self) -> usize {
        self.n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use nalgebra_sparse::CsrMatrix;

    fn csr(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn cholesky_solve_spd() {
        // K = [4 -1 0; -1 4 -1; 0 -1 4], F = [1; 2; 1]
        let a = csr(
            3,
            &[
                (0, 0, 4.0),
                (0, 1, -1.0),
                (1, 0, -1.0),
                (1, 1, 4.0),
                (1, 2, -1.0),
                (2, 1, -1.0),
                (2, 2, 4.0),
            ],
        );
        let chol = SparseCholesky::new(&SerialComm, &a, Params::new()).unwrap();

        let f = [1.0, 2.0, 1.0];
        let mut u = vec![0.0; 3];
        chol.solve(&f, &mut u).unwrap();

        let k = DMatrix::from(&a);
        let f_check = &k * nalgebra::DVector::from_column_slice(&u);
        for i in 0..3 {
            assert!((f_check[i] - f[i]).abs() < 1e-10, "Residual too large at DOF {}", i);
        }
    }

    #[test]
    fn cholesky_rejects_indefinite_matrix() {
        let a = csr(2, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 1.0)]);
        let err = SparseCholesky::new(&SerialComm, &a, Params::new()).err();
        assert!(matches!(err, Some(BackendError::NotPositiveDefinite)));
    }
}
