//! Row-iteration contract for the sparse matrices consumed by this crate.
//!
//! Everything in the crate talks to matrices through [`SparseMatrix`]: the
//! block adapter reads scalar matrices through it, and the inner solvers
//! accept block-valued matrices (including the adapter itself) through it.

use nalgebra::Scalar;
use nalgebra_sparse::CsrMatrix;
use std::iter::Zip;
use std::slice;

use crate::error::{Error, Result};

/// Read-only sparse matrix with ordered row access.
///
/// `row_begin(i)` yields `(column, value)` pairs of row `i` in strictly
/// increasing column order.
pub trait SparseMatrix {
    /// Entry type (a scalar, or a dense block for block-valued matrices).
    type Value: Clone;

    /// Cursor over a single row.
    type RowIter<'a>: Iterator<Item = (usize, Self::Value)>
    where
        Self: 'a;

    fn rows(&self) -> usize;
    fn cols(&self) -> usize;

    /// Number of stored entries. Adapters may return an estimate.
    fn nonzeros(&self) -> usize;

    fn row_begin(&self, row: usize) -> Self::RowIter<'_>;
}

/// Row cursor over compressed row storage.
#[derive(Debug, Clone)]
pub struct CsrRowIter<'a, T> {
    inner: Zip<slice::Iter<'a, usize>, slice::Iter<'a, T>>,
}

impl<'a, T> CsrRowIter<'a, T> {
    pub(crate) fn new(cols: &'a [usize], vals: &'a [T]) -> Self {
        Self {
            inner: cols.iter().zip(vals.iter()),
        }
    }
}

impl<T: Clone> Iterator for CsrRowIter<'_, T> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&c, v)| (c, v.clone()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T: Scalar> SparseMatrix for CsrMatrix<T> {
    type Value = T;
    type RowIter<'a>
        = CsrRowIter<'a, T>
    where
        Self: 'a;

    fn rows(&self) -> usize {
        self.nrows()
    }

    fn cols(&self) -> usize {
        self.ncols()
    }

    fn nonzeros(&self) -> usize {
        self.nnz()
    }

    fn row_begin(&self, row: usize) -> Self::RowIter<'_> {
        let offsets = self.row_offsets();
        let (begin, end) = (offsets[row], offsets[row + 1]);
        CsrRowIter::new(&self.col_indices()[begin..end], &self.values()[begin..end])
    }
}

/// Borrowed CRS triple `(ptr, col, val)` over caller-owned arrays.
///
/// Column indices within each row must be sorted and free of duplicates.
#[derive(Debug, Clone, Copy)]
pub struct CrsRef<'a, T> {
    nrows: usize,
    ncols: usize,
    ptr: &'a [usize],
    col: &'a [usize],
    val: &'a [T],
}

impl<'a, T> CrsRef<'a, T> {
    pub fn new(
        nrows: usize,
        ncols: usize,
        ptr: &'a [usize],
        col: &'a [usize],
        val: &'a [T],
    ) -> Result<Self> {
        if ptr.len() != nrows + 1 {
            return Err(Error::InvalidArgument(format!(
                "Row pointer array has {} entries, expected {}",
                ptr.len(),
                nrows + 1
            )));
        }
        let nnz = ptr[nrows];
        if col.len() < nnz || val.len() < nnz {
            return Err(Error::InvalidArgument(format!(
                "CRS arrays are shorter than the {} entries announced by the row pointer",
                nnz
            )));
        }
        if ptr.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidArgument(
                "Row pointer array is not monotone".into(),
            ));
        }
        if col[..nnz].iter().any(|&c| c >= ncols) {
            return Err(Error::InvalidArgument(format!(
                "Column index out of range (ncols = {})",
                ncols
            )));
        }

        Ok(Self {
            nrows,
            ncols,
            ptr,
            col,
            val,
        })
    }
}

impl<T: Clone> SparseMatrix for CrsRef<'_, T> {
    type Value = T;
    type RowIter<'b>
        = CsrRowIter<'b, T>
    where
        Self: 'b;

    fn rows(&self) -> usize {
        self.nrows
    }

    fn cols(&self) -> usize {
        self.ncols
    }

    fn nonzeros(&self) -> usize {
        self.ptr[self.nrows]
    }

    fn row_begin(&self, row: usize) -> Self::RowIter<'_> {
        let (begin, end) = (self.ptr[row], self.ptr[row + 1]);
        CsrRowIter::new(&self.col[begin..end], &self.val[begin..end])
    }
}

/// Collects all entries of `a` as `(row, col, value)` triplets in row order.
pub fn triplets<M: SparseMatrix>(a: &M) -> Vec<(usize, usize, M::Value)> {
    let mut out = Vec::with_capacity(a.nonzeros());
    for i in 0..a.rows() {
        out.extend(a.row_begin(i).map(|(j, v)| (i, j, v)));
    }
    out
}
