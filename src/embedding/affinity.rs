//! High-dimensional affinities `P` for t-SNE.
//!
//! The exact path builds dense `n x n` matrices. The sparse path keeps only
//! the `3 * perplexity` nearest neighbours of every row, so memory stays
//! linear in the number of rows.

use std::collections::BTreeMap;

use log::debug;
use nalgebra::DMatrix;

pub(crate) const MIN_PROBABILITY: f64 = 1e-12;
const ENTROPY_TOLERANCE: f64 = 1e-5;
const BINARY_SEARCH_STEPS: usize = 100;

// ---------------------------------------------------------------------------
// Per-row calibration
// ---------------------------------------------------------------------------

/// Conditional affinities `P(j|i)` over one row's candidate neighbours, given
/// their squared distances. The Gaussian precision is found by bisection so
/// the row entropy matches `target_entropy` (`ln(perplexity)`).
pub fn calibrate(distances: &[f64], target_entropy: f64) -> Vec<f64> {
    if distances.is_empty() {
        return Vec::new();
    }
    // Shift by the nearest distance so at least one term is exp(0).
    let nearest = distances.iter().copied().fold(f64::INFINITY, f64::min);

    let mut beta = 1.0;
    let mut lo = 0.0;
    let mut hi = f64::INFINITY;
    let mut row = vec![0.0; distances.len()];

    for _ in 0..BINARY_SEARCH_STEPS {
        let mut sum = 0.0;
        let mut weighted = 0.0;
        for (p, &d) in row.iter_mut().zip(distances) {
            let shifted = d - nearest;
            *p = (-shifted * beta).exp();
            sum += *p;
            weighted += shifted * *p;
        }
        let entropy = sum.ln() + beta * weighted / sum;
        for p in row.iter_mut() {
            *p /= sum;
        }

        let diff = entropy - target_entropy;
        if diff.abs() < ENTROPY_TOLERANCE {
            break;
        }
        if diff > 0.0 {
            lo = beta;
            beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
        } else {
            hi = beta;
            beta = (beta + lo) / 2.0;
        }
    }
    row
}

// ---------------------------------------------------------------------------
// Dense affinities
// ---------------------------------------------------------------------------

/// Squared euclidean distances between all rows, via the Gram matrix.
pub fn squared_distances(rows: &[Vec<f64>]) -> DMatrix<f64> {
    let n = rows.len();
    let d = rows.first().map_or(0, Vec::len);
    let x = DMatrix::from_fn(n, d, |r, c| rows[r][c]);
    let gram = &x * x.transpose();
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.0
        } else {
            (gram[(i, i)] + gram[(j, j)] - 2.0 * gram[(i, j)]).max(0.0)
        }
    })
}

/// Symmetrised joint affinities `P_ij = (P(j|i) + P(i|j)) / 2n` over every pair.
pub fn joint_probabilities(distances: &DMatrix<f64>, perplexity: f64) -> DMatrix<f64> {
    let n = distances.nrows();
    let target = perplexity.ln();
    let mut conditional = DMatrix::zeros(n, n);
    for i in 0..n {
        let others: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        let row: Vec<f64> = others.iter().map(|&j| distances[(i, j)]).collect();
        for (&j, p) in others.iter().zip(calibrate(&row, target)) {
            conditional[(i, j)] = p;
        }
    }
    let scale = 2.0 * n as f64;
    DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.0
        } else {
            ((conditional[(i, j)] + conditional[(j, i)]) / scale).max(MIN_PROBABILITY)
        }
    })
}

// ---------------------------------------------------------------------------
// Sparse affinities
// ---------------------------------------------------------------------------

/// Symmetric joint affinities in compressed-row form. Row `i` lists the
/// points `j` with a non-zero `P_ij`; the values sum to 1 over the matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseAffinities {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseAffinities {
    fn from_rows(rows: Vec<BTreeMap<usize, f64>>) -> Self {
        let total: f64 = rows.iter().flat_map(|r| r.values()).sum();
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        indptr.push(0);
        for row in rows {
            for (j, p) in row {
                indices.push(j);
                values.push(p / total);
            }
            indptr.push(indices.len());
        }
        Self {
            indptr,
            indices,
            values,
        }
    }

    /// Keep every off-diagonal entry of a dense matrix.
    #[cfg(test)]
    pub(crate) fn from_dense(p: &DMatrix<f64>) -> Self {
        let rows = (0..p.nrows())
            .map(|i| {
                (0..p.ncols())
                    .filter(|&j| j != i)
                    .map(|j| (j, p[(i, j)]))
                    .collect()
            })
            .collect();
        Self::from_rows(rows)
    }

    pub fn n_points(&self) -> usize {
        self.indptr.len() - 1
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// `(j, P_ij)` for the stored neighbours of `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.indptr[i]..self.indptr[i + 1];
        self.indices[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }
}

/// Neighbours kept per row: `min(n - 1, floor(3 * perplexity) + 1)`.
pub fn neighbour_count(n_samples: usize, perplexity: f64) -> usize {
    let wanted = (3.0 * perplexity).floor() as usize + 1;
    wanted.min(n_samples.saturating_sub(1))
}

/// The `k` nearest other rows of every row as `(index, squared distance)`,
/// nearest first. Brute force, one distance row at a time.
pub fn nearest_neighbours(rows: &[Vec<f64>], k: usize) -> Vec<Vec<(usize, f64)>> {
    if k == 0 {
        return vec![Vec::new(); rows.len()];
    }
    let norms: Vec<f64> = rows.iter().map(|r| r.iter().map(|v| v * v).sum()).collect();
    let by_distance = |a: &(usize, f64), b: &(usize, f64)| a.1.total_cmp(&b.1);

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let mut candidates: Vec<(usize, f64)> = rows
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, other)| {
                    let dot: f64 = row.iter().zip(other).map(|(a, b)| a * b).sum();
                    (j, (norms[i] + norms[j] - 2.0 * dot).max(0.0))
                })
                .collect();
            if k < candidates.len() {
                candidates.select_nth_unstable_by(k - 1, by_distance);
                candidates.truncate(k);
            }
            candidates.sort_by(by_distance);
            candidates
        })
        .collect()
}

/// Joint affinities restricted to each row's nearest neighbours, then
/// symmetrised: `P_ij = (P(j|i) + P(i|j)) / sum`.
pub fn sparse_joint_probabilities(rows: &[Vec<f64>], perplexity: f64) -> SparseAffinities {
    let n = rows.len();
    let k = neighbour_count(n, perplexity);
    let target = perplexity.ln();
    debug!("t-SNE affinities: {k} nearest neighbours for each of {n} rows");

    let mut merged: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); n];
    for (i, neighbours) in nearest_neighbours(rows, k).into_iter().enumerate() {
        let distances: Vec<f64> = neighbours.iter().map(|&(_, d)| d).collect();
        for (&(j, _), p) in neighbours.iter().zip(calibrate(&distances, target)) {
            *merged[i].entry(j).or_insert(0.0) += p;
            *merged[j].entry(i).or_insert(0.0) += p;
        }
    }
    SparseAffinities::from_rows(merged)
}
