//! Right-preconditioned BiCGStab over block vectors.
//!
//! The solver works directly on slices of `SVector<f64, B>`, so the system
//! matrix may be any block-valued [`SparseMatrix`], the lazy
//! [`BlockView`](crate::adapter::BlockView) included.

use std::fmt;

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use super::block_csr::{residual, spmv};
use super::{IterativeSolver, Preconditioner};
use crate::matrix::SparseMatrix;

/// BiCGStab configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BiCgStabParams {
    /// Relative tolerance: stop once ||r|| <= tol * ||f||
    pub tol: f64,
    /// Absolute tolerance
    pub abstol: f64,
    /// Maximum number of iterations
    pub maxiter: usize,
}

impl Default for BiCgStabParams {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            abstol: 0.0,
            maxiter: 100,
        }
    }
}

/// Biconjugate gradient stabilized method
#[derive(Debug, Clone)]
pub struct BiCgStab<const B: usize> {
    n: usize,
    prm: BiCgStabParams,
}

fn dot<const B: usize>(x: &[SVector<f64, B>], y: &[SVector<f64, B>]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a.dot(b)).sum()
}

fn norm<const B: usize>(x: &[SVector<f64, B>]) -> f64 {
    dot(x, x).sqrt()
}

impl<const B: usize> BiCgStab<B> {
    pub fn params(&self) -> &BiCgStabParams {
        &self.prm
    }
}

impl<const B: usize> IterativeSolver<B> for BiCgStab<B> {
    type Params = BiCgStabParams;

    fn new(n: usize, prm: Self::Params) -> Self {
        Self { n, prm }
    }

    fn solve<A, P>(
        &self,
        a: &A,
        p: &P,
        rhs: &[SVector<f64, B>],
        x: &mut [SVector<f64, B>],
    ) -> (usize, f64)
    where
        A: SparseMatrix<Value = SMatrix<f64, B, B>>,
        P: Preconditioner<B>,
    {
        let n = self.n;
        let zero = SVector::<f64, B>::zeros();

        let norm_rhs = norm(rhs);
        if norm_rhs == 0.0 {
            x.fill(zero);
            return (0, 0.0);
        }
        let eps = (self.prm.tol * norm_rhs).max(self.prm.abstol);

        let mut r = vec![zero; n];
        residual(a, rhs, x, &mut r);

        let mut res_norm = norm(&r);
        if res_norm <= eps {
            return (0, res_norm / norm_rhs);
        }

        let rh = r.clone();
        let mut p_dir = vec![zero; n];
        let mut v = vec![zero; n];
        let mut phat = vec![zero; n];
        let mut s = vec![zero; n];
        let mut shat = vec![zero; n];
        let mut t = vec![zero; n];

        let (mut rho1, mut alpha, mut omega) = (1.0_f64, 1.0_f64, 1.0_f64);
        let mut iter = 0;

        while iter < self.prm.maxiter {
            let rho2 = rho1;
            rho1 = dot(&rh, &r);
            if rho1 == 0.0 {
                log::debug!("bicgstab: rho breakdown at iteration {}", iter);
                break;
            }

            if iter == 0 {
                p_dir.copy_from_slice(&r);
            } else {
                let beta = (rho1 / rho2) * (alpha / omega);
                for ((pi, ri), vi) in p_dir.iter_mut().zip(&r).zip(&v) {
                    *pi = ri + (*pi - vi * omega) * beta;
                }
            }

            p.apply(&p_dir, &mut phat);
            spmv(a, &phat, &mut v);

            let rhv = dot(&rh, &v);
            if rhv == 0.0 {
                log::debug!("bicgstab: (rh, v) breakdown at iteration {}", iter);
                break;
            }
            alpha = rho1 / rhv;

            for ((si, ri), vi) in s.iter_mut().zip(&r).zip(&v) {
                *si = ri - vi * alpha;
            }

            iter += 1;

            let s_norm = norm(&s);
            if s_norm <= eps {
                for (xi, pi) in x.iter_mut().zip(&phat) {
                    *xi += pi * alpha;
                }
                res_norm = s_norm;
                break;
            }

            p.apply(&s, &mut shat);
            spmv(a, &shat, &mut t);

            let tt = dot(&t, &t);
            omega = if tt == 0.0 { 0.0 } else { dot(&t, &s) / tt };

            for ((xi, pi), si) in x.iter_mut().zip(&phat).zip(&shat) {
                *xi += pi * alpha + si * omega;
            }
            for ((ri, si), ti) in r.iter_mut().zip(&s).zip(&t) {
                *ri = si - ti * omega;
            }

            res_norm = norm(&r);
            if res_norm <= eps || omega == 0.0 {
                break;
            }
        }

        if res_norm > eps {
            log::warn!(
                "bicgstab: stopped after {} iterations, relative residual {:.3e}",
                iter,
                res_norm / norm_rhs
            );
        }

        (iter, res_norm / norm_rhs)
    }

    fn bytes(&self) -> usize {
        // r, rh, p, v, phat, s, shat, t
        8 * self.n * std::mem::size_of::<SVector<f64, B>>()
    }
}

impl<const B: usize> fmt::Display for BiCgStab<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type:             BiCGStab")?;
        writeln!(f, "Unknowns:         {}", self.n)?;
        write!(
            f,
            "Tolerance:        {:e} (max {} iterations)",
            self.prm.tol, self.prm.maxiter
        )
    }
}
