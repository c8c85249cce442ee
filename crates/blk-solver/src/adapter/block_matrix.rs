//! On-the-fly conversion of a scalar matrix to a block-valued one.
//!
//! [`BlockView`] groups `B` consecutive scalar rows and columns into one
//! block row/column. Nothing is materialized: each block row is produced by
//! a [`BlockRowIterator`] that merges the `B` underlying scalar row cursors
//! and assembles one dense `B×B` block per touched block column.
//!
//! ```text
//! scalar rows iB..iB+B        block row i
//!   k=0: (0,a) (1,b) (4,c)      col 0: [a b]    col 2: [c 0]
//!   k=1: (1,d) (5,e)      -->          [0 d]           [0 e]
//! ```

use nalgebra::{SMatrix, Scalar};
use num_traits::Zero;

use crate::error::{Error, Result};
use crate::matrix::SparseMatrix;

/// Block-valued view over a borrowed scalar matrix.
///
/// The view borrows the scalar matrix, so neither it nor any iterator it
/// hands out can outlive the matrix.
#[derive(Debug)]
pub struct BlockView<'a, M, const B: usize> {
    a: &'a M,
}

// Manual impls: a derive would require `M: Clone`.
impl<M, const B: usize> Clone for BlockView<'_, M, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M, const B: usize> Copy for BlockView<'_, M, B> {}

impl<'a, M: SparseMatrix, const B: usize> BlockView<'a, M, B> {
    /// Wraps `a`, failing unless both of its dimensions are multiples of `B`.
    pub fn new(a: &'a M) -> Result<Self> {
        let (rows, cols) = (a.rows(), a.cols());
        if B == 0 || rows % B != 0 || cols % B != 0 {
            return Err(Error::DimensionMismatch {
                rows,
                cols,
                block_size: B,
            });
        }

        log::debug!(
            "block view: {}x{} scalar matrix as {}x{} matrix of {}x{} blocks",
            rows,
            cols,
            rows / B,
            cols / B,
            B,
            B
        );

        Ok(Self { a })
    }

    /// The wrapped scalar matrix.
    pub fn scalar(&self) -> &'a M {
        self.a
    }

    pub const fn block_size(&self) -> usize {
        B
    }
}

/// Convert scalar-valued matrix to a block-valued one.
pub fn block_matrix<const B: usize, M: SparseMatrix>(a: &M) -> Result<BlockView<'_, M, B>> {
    BlockView::new(a)
}

impl<M, const B: usize> SparseMatrix for BlockView<'_, M, B>
where
    M: SparseMatrix,
    M::Value: Scalar + Zero,
{
    type Value = SMatrix<M::Value, B, B>;
    type RowIter<'b>
        = BlockRowIterator<M::RowIter<'b>, M::Value, B>
    where
        Self: 'b;

    fn rows(&self) -> usize {
        self.a.rows() / B
    }

    fn cols(&self) -> usize {
        self.a.cols() / B
    }

    /// Just an estimate, meant for allocation sizing.
    fn nonzeros(&self) -> usize {
        self.a.nonzeros() / (B * B)
    }

    fn row_begin(&self, row: usize) -> Self::RowIter<'_> {
        let a: &M = self.a;
        BlockRowIterator {
            cursors: std::array::from_fn(|k| Cursor::new(a.row_begin(row * B + k))),
        }
    }
}

/// Scalar row cursor together with its current (peeked) entry.
#[derive(Debug, Clone)]
struct Cursor<I, T> {
    iter: I,
    head: Option<(usize, T)>,
}

impl<I: Iterator<Item = (usize, T)>, T> Cursor<I, T> {
    fn new(mut iter: I) -> Self {
        let head = iter.next();
        Self { iter, head }
    }

    fn block_col(&self, block_size: usize) -> Option<usize> {
        self.head.as_ref().map(|(c, _)| c / block_size)
    }

    fn bump(&mut self) {
        self.head = self.iter.next();
    }

    /// Skips every entry that falls into block column `col`.
    fn skip_block(&mut self, col: usize, block_size: usize) {
        while self.block_col(block_size) == Some(col) {
            self.bump();
        }
    }
}

/// Cursor over one block row of a [`BlockView`].
///
/// Holds one scalar sub-cursor per scalar row of the block row and performs
/// a `B`-way merge of their (sorted) column streams, grouped by block
/// column. Iterating yields `(block_col, block)` in strictly increasing
/// block-column order.
#[derive(Debug, Clone)]
pub struct BlockRowIterator<I, T, const B: usize> {
    cursors: [Cursor<I, T>; B],
}

impl<I, T, const B: usize> BlockRowIterator<I, T, B>
where
    I: Iterator<Item = (usize, T)>,
    T: Scalar + Zero,
{
    /// True while at least one scalar row still has entries.
    pub fn is_valid(&self) -> bool {
        self.cursors.iter().any(|c| c.head.is_some())
    }

    /// Current block column: the smallest block column among the heads of
    /// the scalar sub-cursors.
    pub fn col(&self) -> Option<usize> {
        self.cursors.iter().filter_map(|c| c.block_col(B)).min()
    }

    /// Moves past the current block column in every sub-cursor.
    pub fn advance(&mut self) {
        if let Some(col) = self.col() {
            for cursor in &mut self.cursors {
                cursor.skip_block(col, B);
            }
        }
    }
}

impl<I, T, const B: usize> BlockRowIterator<I, T, B>
where
    I: Iterator<Item = (usize, T)> + Clone,
    T: Scalar + Zero,
{
    /// Assembles the block at the current block column without moving the
    /// cursor. Positions with no scalar entry are zero.
    pub fn value(&self) -> SMatrix<T, B, B> {
        let mut block = SMatrix::<T, B, B>::zeros();
        let Some(col) = self.col() else {
            return block;
        };

        for (k, cursor) in self.cursors.iter().enumerate() {
            let mut probe = cursor.clone();
            while let Some((c, v)) = probe.head.take() {
                if c / B != col {
                    break;
                }
                block[(k, c % B)] = v;
                probe.bump();
            }
        }

        block
    }
}

impl<I, T, const B: usize> Iterator for BlockRowIterator<I, T, B>
where
    I: Iterator<Item = (usize, T)>,
    T: Scalar + Zero,
{
    type Item = (usize, SMatrix<T, B, B>);

    fn next(&mut self) -> Option<Self::Item> {
        let col = self.col()?;
        let mut block = SMatrix::<T, B, B>::zeros();

        for (k, cursor) in self.cursors.iter_mut().enumerate() {
            while cursor.block_col(B) == Some(col) {
                if let Some((c, v)) = cursor.head.take() {
                    block[(k, c % B)] = v;
                }
                cursor.bump();
            }
        }

        Some((col, block))
    }
}
