//! Skyline (variable-band) LU factorization.
//!
//! The matrix is stored in a symmetric envelope: for every row `i` the
//! lower part holds columns `env[i]..i` and the upper part holds rows
//! `env[i]..i` of column `i`. Fill-in never leaves the envelope, so the
//! factors overwrite the stored entries in place. A reverse Cuthill-McKee
//! reordering is applied first to keep the envelope narrow.
//!
//! This is the built-in fallback: it has no external dependencies and is
//! meant for the small systems at the bottom of a solver hierarchy.

use serde::{Deserialize, Serialize};

use super::{BackendError, Params, backend_params, check_system, check_vectors};
use crate::comm::Communicator;
use crate::matrix::SparseMatrix;

/// Skyline LU configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SkylineLuParams {
    /// Apply reverse Cuthill-McKee reordering before factorization
    pub reorder: bool,
}

impl Default for SkylineLuParams {
    fn default() -> Self {
        Self { reorder: true }
    }
}

/// Skyline LU factors of a square matrix.
#[derive(Debug, Clone)]
pub struct SkylineLu {
    n: usize,
    /// perm[new] = old
    perm: Vec<usize>,
    /// First row/column of the envelope of each row/column
    env: Vec<usize>,
    ptr: Vec<usize>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    diag: Vec<f64>,
}

impl SkylineLu {
    pub fn new<C, M>(comm: &C, a: &M, prm: Params) -> Result<Self, BackendError>
    where
        C: Communicator,
        M: SparseMatrix<Value = f64>,
    {
        let prm: SkylineLuParams = backend_params(prm)?;
        let n = check_system("skyline_lu", comm, a)?;

        let rows: Vec<Vec<(usize, f64)>> = (0..n).map(|i| a.row_begin(i).collect()).collect();

        let perm = if prm.reorder {
            reverse_cuthill_mckee(&rows)
        } else {
            (0..n).collect()
        };
        let mut inv = vec![0; n];
        for (new, &old) in perm.iter().enumerate() {
            inv[old] = new;
        }

        // Envelope of the permuted matrix
        let mut env: Vec<usize> = (0..n).collect();
        for (old_i, row) in rows.iter().enumerate() {
            let i = inv[old_i];
            for &(old_j, _) in row {
                let j = inv[old_j];
                if j < i {
                    env[i] = env[i].min(j);
                } else if i < j {
                    env[j] = env[j].min(i);
                }
            }
        }

        let mut ptr = Vec::with_capacity(n + 1);
        ptr.push(0);
        for i in 0..n {
            ptr.push(ptr[i] + (i - env[i]));
        }

        let size = ptr[n];
        let mut lu = Self {
            n,
            perm,
            env,
            ptr,
            lower: vec![0.0; size],
            upper: vec![0.0; size],
            diag: vec![0.0; n],
        };

        let mut scale = 0.0_f64;
        for (old_i, row) in rows.iter().enumerate() {
            let i = inv[old_i];
            for &(old_j, v) in row {
                let j = inv[old_j];
                scale = scale.max(v.abs());
                if j < i {
                    let k = lu.at(i, j);
                    lu.lower[k] += v;
                } else if i < j {
                    let k = lu.at(j, i);
                    lu.upper[k] += v;
                } else {
                    lu.diag[i] += v;
                }
            }
        }

        lu.factorize(scale)?;

        log::debug!(
            "skyline_lu: n = {}, envelope = {} (reorder = {})",
            n,
            size,
            prm.reorder
        );

        Ok(lu)
    }

    /// Position of entry `k` (`env[i] <= k < i`) in row `i` of the lower
    /// part, or in column `i` of the upper part.
    fn at(&self, i: usize, k: usize) -> usize {
        self.ptr[i] + (k - self.env[i])
    }

    fn factorize(&mut self, scale: f64) -> Result<(), BackendError> {
        let tiny = f64::EPSILON * scale;

        for i in 0..self.n {
            for j in self.env[i]..i {
                let start = self.env[i].max(self.env[j]);

                // L(i, j)
                let mut l = self.lower[self.at(i, j)];
                for k in start..j {
                    l -= self.lower[self.at(i, k)] * self.upper[self.at(j, k)];
                }
                let ij = self.at(i, j);
                self.lower[ij] = l / self.diag[j];

                // U(j, i)
                let mut u = self.upper[self.at(i, j)];
                for k in start..j {
                    u -= self.lower[self.at(j, k)] * self.upper[self.at(i, k)];
                }
                self.upper[ij] = u;
            }

            let mut d = self.diag[i];
            for k in self.env[i]..i {
                d -= self.lower[self.at(i, k)] * self.upper[self.at(i, k)];
            }

            if !d.is_finite() || d.abs() <= tiny {
                return Err(BackendError::Singular(format!(
                    "zero pivot in row {}",
                    self.perm[i]
                )));
            }
            self.diag[i] = d;
        }

        Ok(())
    }

    pub fn solve(&self, rhs: &[f64], x: &mut [f64]) -> Result<(), BackendError> {
        check_vectors(self.n, rhs, x)?;

        let mut y: Vec<f64> = self.perm.iter().map(|&old| rhs[old]).collect();

        // L y = b
        for i in 0..self.n {
            let mut s = y[i];
            for k in self.env[i]..i {
                s -= self.lower[self.at(i, k)] * y[k];
            }
            y[i] = s;
        }

        // U x = y, column oriented
        for i in (0..self.n).rev() {
            y[i] /= self.diag[i];
            let yi = y[i];
            for k in self.env[i]..i {
                y[k] -= self.upper[self.at(i, k)] * yi;
            }
        }

        for (new, &old) in self.perm.iter().enumerate() {
            x[old] = y[new];
        }

        Ok(())
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Number of stored factor entries, diagonal included.
    pub fn envelope(&self) -> usize {
        self.lower.len() + self.upper.len() + self.diag.len()
    }
}

/// Reverse Cuthill-McKee ordering of the symmetrized pattern.
///
/// Returns `perm` with `perm[new] = old`.
fn reverse_cuthill_mckee(rows: &[Vec<(usize, f64)>]) -> Vec<usize> {
    let n = rows.len();
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, row) in rows.iter().enumerate() {
        for &(j, _) in row {
            if i != j {
                adj[i].push(j);
                adj[j].push(i);
            }
        }
    }
    for nbrs in &mut adj {
        nbrs.sort_unstable();
        nbrs.dedup();
    }

    let degree: Vec<usize> = adj.iter().map(Vec::len).collect();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        // Each connected component starts from its lowest-degree node
        let start = (0..n)
            .filter(|&i| !visited[i])
            .min_by_key(|&i| degree[i])
            .unwrap_or(0);

        visited[start] = true;
        let mut head = order.len();
        order.push(start);

        while head < order.len() {
            let u = order[head];
            head += 1;

            let mut next: Vec<usize> = adj[u].iter().copied().filter(|&v| !visited[v]).collect();
            next.sort_by_key(|&v| degree[v]);
            for v in next {
                visited[v] = true;
                order.push(v);
            }
        }
    }

    order.reverse();
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use nalgebra::{DMatrix, DVector};
    use nalgebra_sparse::{CooMatrix, CsrMatrix};

    fn csr(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        CsrMatrix::from(&coo)
    }

    fn params(reorder: bool) -> Params {
        let mut prm = Params::new();
        prm.insert("reorder".into(), reorder.into());
        prm
    }

    fn check_solution(a: &CsrMatrix<f64>, rhs: &[f64], x: &[f64]) {
        let dense: DMatrix<f64> = DMatrix::from(a);
        let r = &dense * DVector::from_column_slice(x) - DVector::from_column_slice(rhs);
        assert!(r.norm() < 1e-10, "residual {}", r.norm());
    }

    #[test]
    fn skyline_solve_trivial() {
        // [2 0; 0 3] x = [4; 9]
        let a = csr(2, &[(0, 0, 2.0), (1, 1, 3.0)]);
        let lu = SkylineLu::new(&SerialComm, &a, Params::new()).unwrap();

        let mut x = vec![0.0; 2];
        lu.solve(&[4.0, 9.0], &mut x).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn skyline_solve_nonsymmetric_with_and_without_reordering() {
        // Arrow-like pattern with an unsymmetric coupling
        let entries = [
            (0, 0, 5.0),
            (0, 4, 1.0),
            (1, 1, 4.0),
            (1, 2, -1.0),
            (2, 1, -2.0),
            (2, 2, 6.0),
            (3, 3, 3.0),
            (3, 0, 0.5),
            (4, 0, 2.0),
            (4, 3, -1.0),
            (4, 4, 7.0),
        ];
        let a = csr(5, &entries);
        let rhs = [1.0, 2.0, 3.0, 4.0, 5.0];

        for reorder in [false, true] {
            let lu = SkylineLu::new(&SerialComm, &a, params(reorder)).unwrap();
            let mut x = vec![0.0; 5];
            lu.solve(&rhs, &mut x).unwrap();
            check_solution(&a, &rhs, &x);
        }
    }

    #[test]
    fn skyline_detects_singular_matrix() {
        let a = csr(2, &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]);
        let err = SkylineLu::new(&SerialComm, &a, params(false)).unwrap_err();
        assert!(matches!(err, BackendError::Singular(_)));
    }

    #[test]
    fn skyline_rejects_unknown_params() {
        let a = csr(1, &[(0, 0, 1.0)]);
        let mut prm = Params::new();
        prm.insert("pivot".into(), true.into());
        let err = SkylineLu::new(&SerialComm, &a, prm).unwrap_err();
        assert!(matches!(err, BackendError::Params(_)));
    }

    #[test]
    fn skyline_checks_vector_sizes() {
        let a = csr(2, &[(0, 0, 1.0), (1, 1, 1.0)]);
        let lu = SkylineLu::new(&SerialComm, &a, Params::new()).unwrap();
        let mut x = vec![0.0; 3];
        let err = lu.solve(&[1.0, 1.0], &mut x).unwrap_err();
        assert!(matches!(
            err,
            BackendError::SizeMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn rcm_is_a_permutation() {
        let rows = vec![
            vec![(0, 1.0), (3, 1.0)],
            vec![(1, 1.0)],
            vec![(2, 1.0), (0, 1.0)],
            vec![(3, 1.0)],
        ];
        let mut perm = reverse_cuthill_mckee(&rows);
        perm.sort_unstable();
        assert_eq!(perm, vec![0, 1, 2, 3]);
    }
}
