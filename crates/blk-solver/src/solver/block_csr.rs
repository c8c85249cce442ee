//! Materialized block CSR storage used as the system matrix of the
//! reference inner solver.

use nalgebra::{SMatrix, SVector};
use rayon::prelude::*;

use crate::matrix::{CsrRowIter, SparseMatrix};

/// Square-blocked compressed row storage: every entry is a dense `B×B` block.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockCsr<const B: usize> {
    nrows: usize,
    ncols: usize,
    ptr: Vec<usize>,
    col: Vec<usize>,
    val: Vec<SMatrix<f64, B, B>>,
}

impl<const B: usize> BlockCsr<B> {
    /// Copies any block-valued matrix into block CSR storage.
    ///
    /// With `parallel` set, block rows are assembled concurrently, each from
    /// its own row cursor.
    pub fn from_matrix<A>(a: &A, parallel: bool) -> Self
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>> + Sync,
    {
        let nrows = a.rows();
        let rows: Vec<Vec<(usize, SMatrix<f64, B, B>)>> = if parallel {
            (0..nrows)
                .into_par_iter()
                .map(|i| a.row_begin(i).collect())
                .collect()
        } else {
            (0..nrows).map(|i| a.row_begin(i).collect()).collect()
        };

        let nnz = rows.iter().map(Vec::len).sum();
        let mut ptr = Vec::with_capacity(nrows + 1);
        let mut col = Vec::with_capacity(nnz);
        let mut val = Vec::with_capacity(nnz);

        ptr.push(0);
        for row in rows {
            for (c, v) in row {
                col.push(c);
                val.push(v);
            }
            ptr.push(col.len());
        }

        Self {
            nrows,
            ncols: a.cols(),
            ptr,
            col,
            val,
        }
    }

    /// Diagonal block of row `i`, if stored.
    pub fn diagonal(&self, i: usize) -> Option<&SMatrix<f64, B, B>> {
        let (begin, end) = (self.ptr[i], self.ptr[i + 1]);
        self.col[begin..end]
            .binary_search(&i)
            .ok()
            .map(|pos| &self.val[begin + pos])
    }

    /// y = A x
    pub fn spmv(&self, x: &[SVector<f64, B>], y: &mut [SVector<f64, B>]) {
        spmv(self, x, y);
    }

    /// r = f - A x
    pub fn residual(
        &self,
        f: &[SVector<f64, B>],
        x: &[SVector<f64, B>],
        r: &mut [SVector<f64, B>],
    ) {
        residual(self, f, x, r);
    }

    /// Memory footprint in bytes.
    pub fn bytes(&self) -> usize {
        use std::mem::size_of;
        self.ptr.len() * size_of::<usize>()
            + self.col.len() * size_of::<usize>()
            + self.val.len() * size_of::<SMatrix<f64, B, B>>()
    }
}

impl<const B: usize> SparseMatrix for BlockCsr<B> {
    type Value = SMatrix<f64, B, B>;
    type RowIter<'a>
        = CsrRowIter<'a, SMatrix<f64, B, B>>
    where
        Self: 'a;

    fn rows(&self) -> usize {
        self.nrows
    }

    fn cols(&self) -> usize {
        self.ncols
    }

    fn nonzeros(&self) -> usize {
        self.val.len()
    }

    fn row_begin(&self, row: usize) -> Self::RowIter<'_> {
        let (begin, end) = (self.ptr[row], self.ptr[row + 1]);
        CsrRowIter::new(&self.col[begin..end], &self.val[begin..end])
    }
}

/// y = A x for any block-valued matrix.
pub fn spmv<A, const B: usize>(a: &A, x: &[SVector<f64, B>], y: &mut [SVector<f64, B>])
where
    A: SparseMatrix<Value = SMatrix<f64, B, B>>,
{
    for (i, yi) in y.iter_mut().enumerate().take(a.rows()) {
        let mut sum = SVector::<f64, B>::zeros();
        for (c, v) in a.row_begin(i) {
            sum += v * x[c];
        }
        *yi = sum;
    }
}

/// r = f - A x for any block-valued matrix.
pub fn residual<A, const B: usize>(
    a: &A,
    f: &[SVector<f64, B>],
    x: &[SVector<f64, B>],
    r: &mut [SVector<f64, B>],
) where
    A: SparseMatrix<Value = SMatrix<f64, B, B>>,
{
    for (i, ri) in r.iter_mut().enumerate().take(a.rows()) {
        let mut sum = f[i];
        for (c, v) in a.row_begin(i) {
            sum -= v * x[c];
        }
        *ri = sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::BlockView;
    use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
    use nalgebra_sparse::{CooMatrix, CsrMatrix};

    fn scalar_matrix() -> CsrMatrix<f64> {
        // 4x4, couples both block rows
        let dense = DMatrix::from_row_slice(
            4,
            4,
            &[
                4.0, 1.0, 0.0, 0.5, //
                1.0, 4.0, 0.0, 0.0, //
                0.0, 0.0, 3.0, 1.0, //
                0.5, 0.0, 1.0, 3.0,
            ],
        );
        CsrMatrix::from(&CooMatrix::from(&dense))
    }

    #[test]
    fn assembles_from_block_view() {
        let a = scalar_matrix();
        let view = BlockView::<_, 2>::new(&a).unwrap();

        let seq = BlockCsr::from_matrix(&view, false);
        let par = BlockCsr::from_matrix(&view, true);
        assert_eq!(seq, par);

        assert_eq!(seq.rows(), 2);
        assert_eq!(seq.nonzeros(), 4);
        assert_eq!(
            seq.diagonal(1),
            Some(&Matrix2::new(3.0, 1.0, 1.0, 3.0))
        );
        assert!(seq.bytes() > 0);
    }

    #[test]
    fn spmv_matches_scalar_product() {
        let a = scalar_matrix();
        let view = BlockView::<_, 2>::new(&a).unwrap();
        let blocks = BlockCsr::from_matrix(&view, false);

        let xs = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let dense: DMatrix<f64> = DMatrix::from(&a);
        let expected = &dense * &xs;

        let x = vec![Vector2::new(1.0, -2.0), Vector2::new(0.5, 3.0)];
        let mut y = vec![Vector2::zeros(); 2];
        blocks.spmv(&x, &mut y);

        // The lazy view gives the same product as the materialized matrix
        let mut y_view = vec![Vector2::zeros(); 2];
        spmv(&view, &x, &mut y_view);

        for i in 0..2 {
            for k in 0..2 {
                assert!((y[i][k] - expected[2 * i + k]).abs() < 1e-12);
                assert!((y_view[i][k] - expected[2 * i + k]).abs() < 1e-12);
            }
        }

        let mut r = vec![Vector2::zeros(); 2];
        blocks.residual(&y, &x, &mut r);
        assert!(r.iter().all(|ri| ri.norm() < 1e-12));
    }
}
