//! t-SNE (van der Maaten & Hinton, 2008) with two gradient strategies.
//!
//! [`TsneMethod::Exact`] evaluates every pair and holds dense `n x n`
//! matrices. [`TsneMethod::BarnesHut`] (van der Maaten, 2014) uses sparse
//! nearest-neighbour affinities for attraction and a quadtree for repulsion,
//! so memory is linear and each iteration is `O(n log n)`.

use log::{debug, trace};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::affinity::{
    joint_probabilities, sparse_joint_probabilities, squared_distances, SparseAffinities,
    MIN_PROBABILITY,
};
use super::quadtree::QuadTree;
use super::{TsneConfig, TsneMethod};

const MIN_GAIN: f64 = 0.01;

/// The KL(P || Q) objective and its gradient with respect to the layout.
trait Objective {
    /// Gradient at `points`, with `P` scaled by `exaggeration`.
    fn gradient(&self, points: &[[f64; 2]], exaggeration: f64) -> Vec<[f64; 2]>;

    fn kl_divergence(&self, points: &[[f64; 2]]) -> f64;
}

// ---------------------------------------------------------------------------
// Exact
// ---------------------------------------------------------------------------

struct Exact {
    p: DMatrix<f64>,
}

/// Student-t kernel `1 / (1 + |y_i - y_j|²)` with a zero diagonal, and its sum.
fn student_kernel(points: &[[f64; 2]]) -> (DMatrix<f64>, f64) {
    let n = points.len();
    let kernel = DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.0
        } else {
            let dx = points[i][0] - points[j][0];
            let dy = points[i][1] - points[j][1];
            1.0 / (1.0 + dx * dx + dy * dy)
        }
    });
    let total = kernel.sum();
    (kernel, total)
}

impl Objective for Exact {
    fn gradient(&self, points: &[[f64; 2]], exaggeration: f64) -> Vec<[f64; 2]> {
        let n = points.len();
        let (kernel, total) = student_kernel(points);
        (0..n)
            .map(|i| {
                let mut grad = [0.0f64; 2];
                for j in (0..n).filter(|&j| j != i) {
                    let q = (kernel[(i, j)] / total).max(MIN_PROBABILITY);
                    let force = 4.0 * (exaggeration * self.p[(i, j)] - q) * kernel[(i, j)];
                    grad[0] += force * (points[i][0] - points[j][0]);
                    grad[1] += force * (points[i][1] - points[j][1]);
                }
                grad
            })
            .collect()
    }

    fn kl_divergence(&self, points: &[[f64; 2]]) -> f64 {
        let n = points.len();
        let (kernel, total) = student_kernel(points);
        let mut kl = 0.0;
        for i in 0..n {
            for j in (0..n).filter(|&j| j != i) {
                let p = self.p[(i, j)];
                let q = (kernel[(i, j)] / total).max(MIN_PROBABILITY);
                kl += p * (p / q).ln();
            }
        }
        kl
    }
}

// ---------------------------------------------------------------------------
// Barnes-Hut
// ---------------------------------------------------------------------------

struct BarnesHut {
    p: SparseAffinities,
    theta: f64,
}

impl BarnesHut {
    /// Per-point repulsion and the normalisation `Z = sum_ij q_ij`.
    fn repulsion(&self, points: &[[f64; 2]]) -> (Vec<[f64; 2]>, f64) {
        let tree = QuadTree::new(points);
        let mut z = 0.0;
        let forces = (0..points.len())
            .map(|i| {
                let (force, zi) = tree.repulsion(i, self.theta);
                z += zi;
                force
            })
            .collect();
        (forces, z)
    }
}

fn kernel(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    1.0 / (1.0 + dx * dx + dy * dy)
}

impl Objective for BarnesHut {
    fn gradient(&self, points: &[[f64; 2]], exaggeration: f64) -> Vec<[f64; 2]> {
        let (repulsive, z) = self.repulsion(points);
        points
            .iter()
            .zip(&repulsive)
            .enumerate()
            .map(|(i, (&yi, rep))| {
                let mut attractive = [0.0f64; 2];
                for (j, p) in self.p.row(i) {
                    let weight = p * kernel(yi, points[j]);
                    attractive[0] += weight * (yi[0] - points[j][0]);
                    attractive[1] += weight * (yi[1] - points[j][1]);
                }
                [
                    4.0 * (exaggeration * attractive[0] - rep[0] / z),
                    4.0 * (exaggeration * attractive[1] - rep[1] / z),
                ]
            })
            .collect()
    }

    /// Summed over the stored entries of `P` only; the rest contribute nothing.
    fn kl_divergence(&self, points: &[[f64; 2]]) -> f64 {
        let (_, z) = self.repulsion(points);
        let mut kl = 0.0;
        for (i, &yi) in points.iter().enumerate() {
            for (j, p) in self.p.row(i).filter(|&(_, p)| p > 0.0) {
                let q = (kernel(yi, points[j]) / z).max(MIN_PROBABILITY);
                kl += p * (p / q).ln();
            }
        }
        kl
    }
}

// ---------------------------------------------------------------------------
// Optimisation
// ---------------------------------------------------------------------------

/// Result of a t-SNE run.
#[derive(Debug, Clone, PartialEq)]
pub struct TsneResult {
    pub points: Vec<[f64; 2]>,
    pub kl_divergence: f64,
}

/// Embed `rows` (validated: n >= 2, equal finite lengths) into two dimensions.
pub fn run(rows: &[Vec<f64>], perplexity: f64, config: &TsneConfig) -> TsneResult {
    match config.method {
        TsneMethod::Exact => {
            let p = joint_probabilities(&squared_distances(rows), perplexity);
            optimize(&Exact { p }, rows.len(), config)
        }
        TsneMethod::BarnesHut => {
            let p = sparse_joint_probabilities(rows, perplexity);
            debug!(
                "Barnes-Hut t-SNE: {} stored affinities for {} points, theta {}",
                p.nnz(),
                p.n_points(),
                config.theta
            );
            optimize(
                &BarnesHut {
                    p,
                    theta: config.theta,
                },
                rows.len(),
                config,
            )
        }
    }
}

/// Gradient descent with momentum, per-coordinate gains and early exaggeration.
fn optimize(objective: &impl Objective, n: usize, config: &TsneConfig) -> TsneResult {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut points: Vec<[f64; 2]> = (0..n)
        .map(|_| [rng.gen_range(-1e-4..1e-4), rng.gen_range(-1e-4..1e-4)])
        .collect();
    let mut update = vec![[0.0f64; 2]; n];
    let mut gains = vec![[1.0f64; 2]; n];

    for iter in 0..config.n_iter {
        let exaggerating = iter < config.exaggeration_iters;
        let exaggeration = if exaggerating { config.early_exaggeration } else { 1.0 };
        let momentum = if exaggerating { 0.5 } else { 0.8 };

        let gradient = objective.gradient(&points, exaggeration);
        for ((grad, step), gain) in gradient.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
            for d in 0..2 {
                gain[d] = if (grad[d] > 0.0) != (step[d] > 0.0) {
                    gain[d] + 0.2
                } else {
                    gain[d] * 0.8
                };
                gain[d] = gain[d].max(MIN_GAIN);
                step[d] = momentum * step[d] - config.learning_rate * gain[d] * grad[d];
            }
        }

        for (point, step) in points.iter_mut().zip(&update) {
            point[0] += step[0];
            point[1] += step[1];
        }
        let (mx, my) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        let (mx, my) = (mx / n as f64, my / n as f64);
        for point in points.iter_mut() {
            point[0] -= mx;
            point[1] -= my;
        }

        if (iter + 1) % 100 == 0 {
            trace!(
                "t-SNE iteration {}: KL divergence {:.4}",
                iter + 1,
                objective.kl_divergence(&points)
            );
        }
    }

    let kl = objective.kl_divergence(&points);
    debug!("t-SNE finished: {n} points, {:?}, KL {kl:.4}", config.method);
    TsneResult {
        points,
        kl_divergence: kl,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clusters(per_cluster: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(11);
        let centres = [[0.0, 0.0, 0.0, 0.0], [10.0, 10.0, 0.0, 0.0], [0.0, 10.0, 10.0, 10.0]];
        let mut rows: Vec<Vec<f64>> = Vec::new();
        let mut labels = Vec::new();
        for (c, centre) in centres.iter().enumerate() {
            for _ in 0..per_cluster {
                rows.push(centre.iter().map(|v| v + rng.gen_range(-0.5..0.5)).collect());
                labels.push(c);
            }
        }
        (rows, labels)
    }

    fn assert_separated(points: &[[f64; 2]], labels: &[usize]) {
        let dist = |a: [f64; 2], b: [f64; 2]| ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
        let (mut intra, mut n_intra, mut inter, mut n_inter) = (0.0, 0, 0.0, 0);
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let d = dist(points[i], points[j]);
                if labels[i] == labels[j] {
                    intra += d;
                    n_intra += 1;
                } else {
                    inter += d;
                    n_inter += 1;
                }
            }
        }
        assert!(intra / n_intra as f64 * 2.0 < inter / n_inter as f64);
    }

    #[test]
    fn separated_clusters_stay_separated() {
        let (rows, labels) = clusters(10);
        for method in [TsneMethod::Exact, TsneMethod::BarnesHut] {
            let config = TsneConfig {
                n_iter: 500,
                method,
                ..Default::default()
            };
            let result = run(&rows, 5.0, &config);
            assert_separated(&result.points, &labels);
            assert!(result.kl_divergence.is_finite());
        }
    }

    #[test]
    fn barnes_hut_gradient_is_exact_at_zero_theta() {
        let (rows, _) = clusters(8);
        let p = joint_probabilities(&squared_distances(&rows), 5.0);
        let mut rng = StdRng::seed_from_u64(4);
        let points: Vec<[f64; 2]> = (0..rows.len())
            .map(|_| [rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0)])
            .collect();

        let exact = Exact { p: p.clone() };
        let tree = BarnesHut {
            p: SparseAffinities::from_dense(&p),
            theta: 0.0,
        };
        for exaggeration in [1.0, 12.0] {
            let expected = exact.gradient(&points, exaggeration);
            let found = tree.gradient(&points, exaggeration);
            for (e, f) in expected.iter().zip(&found) {
                assert!((e[0] - f[0]).abs() < 1e-9 && (e[1] - f[1]).abs() < 1e-9);
            }
        }
        assert!((exact.kl_divergence(&points) - tree.kl_divergence(&points)).abs() < 1e-6);
    }

    #[test]
    fn barnes_hut_handles_a_larger_corpus() {
        let (rows, labels) = clusters(150);
        let config = TsneConfig {
            n_iter: 300,
            ..Default::default()
        };
        assert_eq!(config.method, TsneMethod::BarnesHut);
        let result = run(&rows, 30.0, &config);
        assert_eq!(result.points.len(), 450);
        assert!(result.points.iter().flatten().all(|v| v.is_finite()));
        assert_separated(&result.points, &labels);
    }

    #[test]
    fn same_seed_same_layout() {
        let (rows, _) = clusters(10);
        for method in [TsneMethod::Exact, TsneMethod::BarnesHut] {
            let config = TsneConfig {
                n_iter: 50,
                method,
                ..Default::default()
            };
            assert_eq!(run(&rows, 5.0, &config), run(&rows, 5.0, &config));
        }
    }
}
