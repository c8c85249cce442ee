//! Block view over scalar matrices of various shapes.

use std::collections::BTreeMap;

use blk_solver::{BlockView, CrsRef, Error, SparseMatrix, block_matrix};
use nalgebra::Matrix3;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Deterministic sparse pattern: about one entry in three, never zero.
fn pseudo_random(rows: usize, cols: usize, seed: u64) -> CsrMatrix<f64> {
    let mut state = seed;
    let mut coo = CooMatrix::new(rows, cols);
    for i in 0..rows {
        for j in 0..cols {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            if (state >> 33) % 3 == 0 {
                coo.push(i, j, 1.0 + ((state >> 40) % 97) as f64);
            }
        }
    }
    CsrMatrix::from(&coo)
}

#[test]
fn blocks_reproduce_scalar_entries() {
    let a = pseudo_random(9, 12, 7);
    let view = BlockView::<_, 3>::new(&a).unwrap();
    assert_eq!(view.rows(), 3);
    assert_eq!(view.cols(), 4);

    let scalar: BTreeMap<(usize, usize), f64> = a
        .triplet_iter()
        .map(|(i, j, v)| ((i, j), *v))
        .collect();

    let mut rebuilt = BTreeMap::new();
    for bi in 0..view.rows() {
        for (bj, block) in view.row_begin(bi) {
            for r in 0..3 {
                for c in 0..3 {
                    let key = (bi * 3 + r, bj * 3 + c);
                    match scalar.get(&key) {
                        Some(v) => {
                            rebuilt.insert(key, block[(r, c)]);
                            assert_eq!(block[(r, c)], *v);
                        }
                        // Unstored positions are zero-filled
                        None => assert_eq!(block[(r, c)], 0.0),
                    }
                }
            }
        }
    }

    assert_eq!(rebuilt, scalar);
}

#[test]
fn block_columns_strictly_increase() {
    for seed in 1..6 {
        let a = pseudo_random(12, 12, seed);
        let view = block_matrix::<2, _>(&a).unwrap();
        for i in 0..view.rows() {
            let cols: Vec<usize> = view.row_begin(i).map(|(c, _)| c).collect();
            assert!(cols.windows(2).all(|w| w[0] < w[1]), "row {}: {:?}", i, cols);
            assert!(cols.iter().all(|&c| c < view.cols()));
        }
    }
}

#[test]
fn every_touched_block_column_appears_once() {
    let a = pseudo_random(6, 9, 42);
    let view = BlockView::<_, 3>::new(&a).unwrap();

    for bi in 0..view.rows() {
        let mut expected: Vec<usize> = (bi * 3..bi * 3 + 3)
            .flat_map(|i| a.row_begin(i).map(|(j, _)| j / 3))
            .collect();
        expected.sort_unstable();
        expected.dedup();

        let cols: Vec<usize> = view.row_begin(bi).map(|(c, _)| c).collect();
        assert_eq!(cols, expected);
    }
}

#[test]
fn works_over_borrowed_arrays() {
    // [[1 2 0 0 0 0]
    //  [0 0 0 0 0 3]
    //  [0 0 0 0 0 0]]
    let ptr = [0, 2, 3, 3];
    let col = [0, 1, 5];
    let val = [1.0, 2.0, 3.0];
    let a = CrsRef::new(3, 6, &ptr, &col, &val).unwrap();

    let view = BlockView::<_, 3>::new(&a).unwrap();
    let row: Vec<_> = view.row_begin(0).collect();
    assert_eq!(
        row,
        vec![
            (0, Matrix3::new(1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0)),
            (1, Matrix3::new(0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0)),
        ]
    );
}

#[test]
fn empty_matrix_has_no_blocks() {
    let a = CsrMatrix::<f64>::zeros(4, 4);
    let view = BlockView::<_, 2>::new(&a).unwrap();
    assert_eq!(view.nonzeros(), 0);
    for i in 0..view.rows() {
        let mut it = view.row_begin(i);
        assert!(!it.is_valid());
        assert!(it.next().is_none());
    }
}

#[test]
fn rectangular_dimension_must_divide() {
    let a = pseudo_random(4, 6, 3);
    assert!(BlockView::<_, 2>::new(&a).is_ok());

    let err = BlockView::<_, 4>::new(&a).unwrap_err();
    assert!(err.is_dimension_mismatch());
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            rows: 4,
            cols: 6,
            block_size: 4
        }
    ));
}
