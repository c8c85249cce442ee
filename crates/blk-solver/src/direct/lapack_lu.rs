//! Dense LU back-end using nalgebra-lapack.
//!
//! The whole system is densified, so this is only reasonable for the small
//! systems at the coarsest level.

use nalgebra::{DMatrix, DVector};
use nalgebra_lapack::LU;
use serde::Deserialize;

use super::{BackendError, Params, backend_params, check_system, check_vectors};
use crate::comm::Communicator;
use crate::matrix::SparseMatrix;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

/// LAPACK `getrf`/`getrs` on the densified matrix.
pub struct LapackLu {
    n: usize,
    lu: LU<f64, nalgebra::Dyn, nalgebra::Dyn>,
}

impl LapackLu {
    pub fn new<C, M>(comm: &C, a: &M, prm: Params) -> Result<Self, BackendError>
    where
        C: Communicator,
        M: SparseMatrix<Value = f64>,
    {
        let _: NoParams = backend_params(prm)?;
        let n = check_system("lapack_lu", comm, a)?;

        let mut dense = DMatrix::zeros(n, n);
        for i in 0..n {
            for (j, v) in a.row_begin(i) {
                dense[(i, j)] += v;
            }
        }

        let lu = LU::new(dense);
        if let Some(row) = lu.u().diagonal().iter().position(|d| *d == 0.0) {
            return Err(BackendError::Singular(format!("zero pivot in row {}", row)));
        }

        log::debug!("lapack_lu: n = {}", n);

        Ok(Self { n, lu })
    }

    pub fn solve(&self, rhs: &[f64], x: &mut [f64]) -> Result<(), BackendError> {
        check_vectors(self.n, rhs, x)?;

        let b = DVector::from_column_slice(rhs);
        let sol = self
            .lu
            .solve(&b)
            .ok_or_else(|| BackendError::Singular("LAPACK getrs failed".into()))?;
        x.copy_from_slice(sol.as_slice());

        Ok(())
    }

    pub fn size(&self) -> usize {
        self.n
    }
}
