//! Block-Jacobi preconditioner.

use std::fmt;

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use super::Preconditioner;
use super::block_csr::BlockCsr;
use crate::direct::BackendError;
use crate::matrix::SparseMatrix;

/// Block-Jacobi configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlockJacobiParams {
    /// Damping factor applied to the inverted diagonal
    pub damping: f64,
}

impl Default for BlockJacobiParams {
    fn default() -> Self {
        Self { damping: 1.0 }
    }
}

/// Applies the inverse of each diagonal block: z_i = w * D_i^-1 r_i.
#[derive(Debug, Clone)]
pub struct BlockJacobi<const B: usize> {
    dinv: Vec<SMatrix<f64, B, B>>,
    damping: f64,
}

impl<const B: usize> Preconditioner<B> for BlockJacobi<B> {
    type Params = BlockJacobiParams;

    fn new(a: &BlockCsr<B>, prm: Self::Params) -> Result<Self, BackendError> {
        let dinv = (0..a.rows())
            .map(|i| {
                let d = a.diagonal(i).ok_or_else(|| {
                    BackendError::Singular(format!("missing diagonal block in row {}", i))
                })?;
                (*d).try_inverse().ok_or_else(|| {
                    BackendError::Singular(format!("diagonal block in row {} is singular", i))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            dinv,
            damping: prm.damping,
        })
    }

    fn apply(&self, rhs: &[SVector<f64, B>], x: &mut [SVector<f64, B>]) {
        for ((xi, ri), di) in x.iter_mut().zip(rhs).zip(&self.dinv) {
            *xi = (di * ri) * self.damping;
        }
    }

    fn bytes(&self) -> usize {
        self.dinv.len() * std::mem::size_of::<SMatrix<f64, B, B>>()
    }
}

impl<const B: usize> fmt::Display for BlockJacobi<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type:             block-Jacobi ({}x{})", B, B)?;
        writeln!(f, "Unknowns:         {}", self.dinv.len())?;
        write!(f, "Damping:          {}", self.damping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::BlockView;
    use nalgebra::Vector2;
    use nalgebra_sparse::{CooMatrix, CsrMatrix};

    #[test]
    fn inverts_diagonal_blocks() {
        let mut coo = CooMatrix::new(4, 4);
        for (i, j, v) in [
            (0, 0, 2.0),
            (1, 1, 4.0),
            (2, 2, 1.0),
            (2, 3, 1.0),
            (3, 3, 1.0),
        ] {
            coo.push(i, j, v);
        }
        let a = CsrMatrix::from(&coo);
        let blocks = BlockCsr::from_matrix(&BlockView::<_, 2>::new(&a).unwrap(), false);

        let p = BlockJacobi::new(&blocks, BlockJacobiParams::default()).unwrap();
        let r = vec![Vector2::new(2.0, 4.0), Vector2::new(3.0, 1.0)];
        let mut z = vec![Vector2::zeros(); 2];
        p.apply(&r, &mut z);

        assert!((z[0] - Vector2::new(1.0, 1.0)).norm() < 1e-12);
        // [[1, 1], [0, 1]]^-1 [3, 1] = [2, 1]
        assert!((z[1] - Vector2::new(2.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn singular_diagonal_block_is_reported() {
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, 1.0);
        coo.push(0, 1, 1.0);
        coo.push(1, 0, 1.0);
        coo.push(1, 1, 1.0);
        let a = CsrMatrix::from(&coo);
        let blocks = BlockCsr::from_matrix(&BlockView::<_, 2>::new(&a).unwrap(), false);

        let err = BlockJacobi::new(&blocks, BlockJacobiParams::default()).unwrap_err();
        assert!(matches!(err, BackendError::Singular(_)));
    }
}
