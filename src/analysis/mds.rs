use std::time::{Duration, Instant};
use nalgebra::{DMatrix, DVector};
use ndarray::Array2;

use crate::analysis::similarity::SimilarityMatrix;
use crate::job::cancel::CancelToken;

// Distances over 10 would only arise from near-zero similarities; the floor
// keeps the embedding from diverging on them.
const MIN_SIMILARITY_DIVISOR: f64 = 0.1;

const POWER_ITERATION_TOLERANCE: f64 = 1e-6;
const POWER_ITERATION_LIMIT: usize = 100;
const DEFAULT_ITERATION_CAP: u64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct MdsOutcome {
    // Row per term, one column per embedding dimension.
    pub coordinates: Vec<Vec<f64>>,
    pub converged: bool,
}

fn ndarray2_to_nalgebra(arr: &Array2<f64>) -> DMatrix<f64> {
    let (nrows, ncols) = arr.dim();
    DMatrix::from_row_slice(
        nrows,
        ncols,
        arr.as_slice().expect("distance matrix was not contiguous"),
    )
}

// Inverse-similarity distances between the selected rows of the similarity
// matrix. NaN similarities contribute zero distance.
pub fn build_distance_matrix(matrix: &SimilarityMatrix, selected: &[usize]) -> Array2<f64> {
    let m = selected.len();
    Array2::from_shape_fn((m, m), |(i, j)| {
        if i == j {
            return 0.0;
        }
        let similarity = matrix.get(selected[i], selected[j]);
        if similarity.is_nan() {
            0.0
        } else {
            1.0 / similarity.max(MIN_SIMILARITY_DIVISOR)
        }
    })
}

// Stress-minimization embedding: classical double-centering start refined by
// iterative majorization. Sets smaller than the target dimension skip the
// solver and read their coordinates straight off the distance columns.
pub fn layout_positions(
    distances: &Array2<f64>,
    dim: usize,
    convergence_exponent: i32,
    timeout: Duration,
    iteration_cap: u64,
    cancel: &CancelToken,
) -> MdsOutcome {
    let m = distances.nrows();

    if m <= dim {
        let coordinates = (0..m)
            .map(|i| {
                (0..dim)
                    .map(|d| if d < m { distances[(i, d)] } else { 0.0 })
                    .collect()
            })
            .collect();
        return MdsOutcome {
            coordinates,
            converged: true,
        };
    }

    let mut positions = classical_initialization(distances, dim);

    let tolerance = 10f64.powi(-convergence_exponent);
    let cap = if iteration_cap == 0 {
        DEFAULT_ITERATION_CAP
    } else {
        iteration_cap
    };
    let started = Instant::now();
    let mut converged = false;
    let mut iteration: u64 = 0;

    while iteration < cap {
        iteration += 1;
        if cancel.is_cancelled() || started.elapsed() > timeout {
            break;
        }

        let change = majorization_step(distances, &mut positions, dim);
        if change < tolerance {
            converged = true;
            break;
        }
    }

    let coordinates = (0..m)
        .map(|i| (0..dim).map(|d| positions[(i, d)]).collect())
        .collect();

    MdsOutcome {
        coordinates,
        converged,
    }
}

// Torgerson start: square and double-center the distances, then take the
// leading eigenvectors by power iteration with deflation.
fn classical_initialization(distances: &Array2<f64>, dim: usize) -> DMatrix<f64> {
    let m = distances.nrows();
    let d = ndarray2_to_nalgebra(distances);

    let squared = d.map(|value| value * value);
    let ones = DMatrix::from_element(m, m, 1.0 / m as f64);
    let identity = DMatrix::identity(m, m);
    let centering = &identity - &ones;
    let mut b = -0.5 * (&centering * squared * &centering);

    let mut positions = DMatrix::zeros(m, dim);
    for axis in 0..dim {
        let (eigenvalue, eigenvector) = leading_eigenpair(&b);
        let scale = eigenvalue.abs().sqrt();
        for i in 0..m {
            positions[(i, axis)] = eigenvector[i] * scale;
        }
        // Deflate so the next axis picks up the following eigenpair.
        b -= eigenvalue * &eigenvector * eigenvector.transpose();
    }
    positions
}

fn leading_eigenpair(matrix: &DMatrix<f64>) -> (f64, DVector<f64>) {
    let m = matrix.nrows();
    // Deterministic start that is never orthogonal to everything and never
    // the all-ones vector sitting in the centering null space.
    let mut vector = DVector::from_fn(m, |i, _| 1.0 + (i as f64) * 0.1);
    let norm = vector.norm();
    if norm > 0.0 {
        vector /= norm;
    }

    let mut eigenvalue = 0.0;
    for _ in 0..POWER_ITERATION_LIMIT {
        let product = matrix * &vector;
        let product_norm = product.norm();
        if product_norm == 0.0 {
            break;
        }
        let rayleigh = vector.dot(&product);
        vector = product / product_norm;
        eigenvalue = rayleigh;
        if (1.0 - rayleigh.abs() / product_norm).abs() < POWER_ITERATION_TOLERANCE {
            break;
        }
    }
    (eigenvalue, vector)
}

// One guarded majorization sweep; returns the normalized position change.
fn majorization_step(distances: &Array2<f64>, positions: &mut DMatrix<f64>, dim: usize) -> f64 {
    let m = distances.nrows();
    let mut updated = DMatrix::zeros(m, dim);

    for i in 0..m {
        let mut accumulator = vec![0.0; dim];
        for j in 0..m {
            if i == j {
                continue;
            }
            let target = distances[(i, j)];
            let mut current = 0.0;
            for axis in 0..dim {
                let delta = positions[(i, axis)] - positions[(j, axis)];
                current += delta * delta;
            }
            let current = current.sqrt().max(1e-12);
            let ratio = target / current;
            for axis in 0..dim {
                let pull =
                    positions[(j, axis)] + ratio * (positions[(i, axis)] - positions[(j, axis)]);
                accumulator[axis] += pull;
            }
        }
        for axis in 0..dim {
            updated[(i, axis)] = accumulator[axis] / (m - 1) as f64;
        }
    }

    let mut change_squared = 0.0;
    let mut magnitude_squared = 0.0;
    for i in 0..m {
        for axis in 0..dim {
            let delta = updated[(i, axis)] - positions[(i, axis)];
            change_squared += delta * delta;
            magnitude_squared += updated[(i, axis)] * updated[(i, axis)];
        }
    }

    *positions = updated;

    if magnitude_squared == 0.0 {
        0.0
    } else {
        (change_squared / magnitude_squared).sqrt()
    }
}
