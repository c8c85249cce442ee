//! Adapters presenting one matrix type as another.

pub mod block_matrix;

pub use block_matrix::{BlockRowIterator, BlockView, block_matrix};
