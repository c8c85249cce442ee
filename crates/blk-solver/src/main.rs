use std::process::ExitCode;

use blk_solver::{
    BiCgStabParams, BlockJacobiBiCgStab, BlockJacobiParams, BlockSolver, DirectSolver,
    DirectSolverType, SerialComm, SolverParams, SparseMatrix,
};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Unknowns per grid node.
const B: usize = 3;

fn usage() {
    eprintln!("usage:");
    eprintln!("  blk-solver block [grid_size] [params.json]");
    eprintln!("  blk-solver direct <type> [grid_size]");
    eprintln!("  blk-solver list-direct");
}

/// Five-point Laplacian on an `m×m` grid with `B` coupled unknowns per node,
/// numbered node by node.
fn grid_problem(m: usize) -> CsrMatrix<f64> {
    let n = m * m * B;
    let mut coo = CooMatrix::new(n, n);

    for iy in 0..m {
        for ix in 0..m {
            let node = iy * m + ix;
            let mut neighbors = Vec::with_capacity(4);
            if ix > 0 {
                neighbors.push(node - 1);
            }
            if ix + 1 < m {
                neighbors.push(node + 1);
            }
            if iy > 0 {
                neighbors.push(node - m);
            }
            if iy + 1 < m {
                neighbors.push(node + m);
            }

            for c in 0..B {
                let row = node * B + c;
                coo.push(row, row, 6.0);
                for k in 0..B {
                    if k != c {
                        coo.push(row, node * B + k, 0.5);
                    }
                }
                for &nb in &neighbors {
                    coo.push(row, nb * B + c, -1.0);
                }
            }
        }
    }

    CsrMatrix::from(&coo)
}

/// rhs = A * ones, so the exact solution is all ones.
fn ones_rhs(a: &CsrMatrix<f64>) -> Vec<f64> {
    (0..a.rows())
        .map(|i| a.row_begin(i).map(|(_, v)| v).sum())
        .collect()
}

fn max_error(x: &[f64]) -> f64 {
    x.iter().map(|v| (v - 1.0).abs()).fold(0.0, f64::max)
}

fn parse_grid(arg: Option<&String>) -> Result<usize, String> {
    match arg {
        None => Ok(16),
        Some(s) => s
            .parse::<usize>()
            .ok()
            .filter(|&m| m > 0)
            .ok_or_else(|| format!("invalid grid size: {}", s)),
    }
}

fn run_block(grid: usize, params: Option<&String>) -> Result<(), String> {
    let prm: SolverParams<BlockJacobiParams, BiCgStabParams> = match params {
        None => SolverParams::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| format!("failed to read {}: {}", path, err))?;
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|err| format!("{}: {}", path, err))?;
            SolverParams::from_json(value).map_err(|err| err.to_string())?
        }
    };

    let a = grid_problem(grid);
    let rhs = ones_rhs(&a);
    println!("grid: {}x{}, unknowns: {}, nonzeros: {}", grid, grid, a.rows(), a.nnz());

    let solver = BlockSolver::<BlockJacobiBiCgStab<B>, B>::new(&a, prm, &Default::default())
        .map_err(|err| err.to_string())?;
    println!("{}", solver);

    let mut x = vec![0.0; rhs.len()];
    let (iters, error) = solver.solve(&rhs, &mut x).map_err(|err| err.to_string())?;

    println!();
    println!("Iterations: {}", iters);
    println!("Error:      {:e}", error);
    println!("Max |x-1|:  {:e}", max_error(&x));
    Ok(())
}

fn run_direct(kind: &str, grid: usize) -> Result<(), String> {
    let a = grid_problem(grid);
    let rhs = ones_rhs(&a);

    let prm = serde_json::json!({ "type": kind });
    let solver =
        DirectSolver::from_json(&SerialComm, &a, prm).map_err(|err| err.to_string())?;
    println!("direct solver: {}", solver);

    let mut x = vec![0.0; rhs.len()];
    solver.solve(&rhs, &mut x).map_err(|err| err.to_string())?;
    println!("Max |x-1|: {:e}", max_error(&x));
    Ok(())
}

fn report(result: Result<(), String>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("block") if args.len() <= 4 => {
            report(parse_grid(args.get(2)).and_then(|m| run_block(m, args.get(3))))
        }
        Some("direct") if (3..=4).contains(&args.len()) => {
            report(parse_grid(args.get(3)).and_then(|m| run_direct(&args[2], m)))
        }
        Some("list-direct") if args.len() == 2 => {
            for kind in DirectSolverType::available() {
                println!("{}", kind);
            }
            ExitCode::SUCCESS
        }
        _ => {
            usage();
            ExitCode::from(2)
        }
    }
}
