//! Lloyd's k-means with k-means++ seeding.
//!
//! Fitting runs `restarts` independent seedings from one seeded RNG and keeps
//! the run with the lowest inertia (the earliest on ties), so a fixed seed
//! always reproduces the same centroids.

use credo_core::constants::FEATURE_COUNT;
use credo_core::error::ModelError;
use credo_core::traits::ClusterAssigner;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Row, squared_distance};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub clusters: usize,
    pub restarts: usize,
    pub max_iter: usize,
    /// Relative to the mean per-feature variance of the data.
    pub tolerance: f64,
    pub seed: u64,
}

impl KMeansParams {
    fn validate(&self, rows: usize) -> Result<(), ModelError> {
        if self.clusters == 0 || self.restarts == 0 || self.max_iter == 0 {
            return Err(ModelError::InvalidParameter(
                "clusters, restarts and max_iter must be positive".into(),
            ));
        }
        if rows < self.clusters {
            return Err(ModelError::InvalidParameter(format!(
                "{rows} rows cannot form {} clusters",
                self.clusters
            )));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(ModelError::InvalidParameter("tolerance must be non-negative".into()));
        }
        Ok(())
    }
}

/// Fitted centroids.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances to the assigned centroid at fit time.
    pub inertia: f64,
    pub iterations: usize,
}

struct Run {
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
}

impl KMeans {
    pub fn fit(rows: &[Row], params: &KMeansParams) -> Result<Self, ModelError> {
        params.validate(rows.len())?;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let tol = params.tolerance * mean_variance(rows);

        let mut best: Option<Run> = None;
        for restart in 0..params.restarts {
            let initial = plus_plus_init(rows, params.clusters, &mut rng);
            let run = lloyd(rows, initial, params.max_iter, tol);
            debug!(restart, inertia = run.inertia, iterations = run.iterations, "k-means run");
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        let best = best.ok_or_else(|| ModelError::InvalidParameter("no k-means runs".into()))?;
        Ok(Self { centroids: best.centroids, inertia: best.inertia, iterations: best.iterations })
    }

    /// Nearest centroid, lowest index on ties.
    pub fn predict(&self, x: &[f64]) -> usize {
        nearest(&self.centroids, x).0
    }

    pub fn labels(&self, rows: &[Row]) -> Vec<usize> {
        rows.iter().map(|r| self.predict(r)).collect()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.centroids.is_empty() {
            return Err(ModelError::Corrupt("k-means has no centroids".into()));
        }
        for c in &self.centroids {
            if c.len() != FEATURE_COUNT {
                return Err(ModelError::DimensionMismatch {
                    component: "kmeans.centroids",
                    expected: FEATURE_COUNT,
                    got: c.len(),
                });
            }
            if c.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::Corrupt("k-means centroid is not finite".into()));
            }
        }
        Ok(())
    }
}

impl ClusterAssigner for KMeans {
    fn assign(&self, scaled: &Row) -> usize {
        self.predict(scaled)
    }

    fn cluster_count(&self) -> usize {
        self.centroids.len()
    }
}

fn nearest(centroids: &[Vec<f64>], x: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, x);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn mean_variance(rows: &[Row]) -> f64 {
    let n = rows.len() as f64;
    let mut total = 0.0;
    for j in 0..FEATURE_COUNT {
        let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
        total += rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / FEATURE_COUNT as f64
}

/// k-means++: first centroid uniform, each next one drawn with probability
/// proportional to squared distance from the nearest chosen centroid.
fn plus_plus_init(rows: &[Row], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(rows[rng.gen_range(0..rows.len())].to_vec());

    let mut dist: Vec<f64> = rows.iter().map(|r| squared_distance(&centroids[0], r)).collect();
    while centroids.len() < k {
        let total: f64 = dist.iter().sum();
        let pick = if total > 0.0 && total.is_finite() {
            let target = rng.gen_range(0.0..total);
            let mut acc = 0.0;
            dist.iter()
                .position(|d| {
                    acc += d;
                    acc > target
                })
                .unwrap_or(rows.len() - 1)
        } else {
            rng.gen_range(0..rows.len())
        };
        let chosen = rows[pick].to_vec();
        for (d, r) in dist.iter_mut().zip(rows) {
            *d = d.min(squared_distance(&chosen, r));
        }
        centroids.push(chosen);
    }
    centroids
}

fn lloyd(rows: &[Row], mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> Run {
    let k = centroids.len();
    let mut labels = vec![0usize; rows.len()];
    let mut iterations = 0;

    for _ in 0..max_iter {
        iterations += 1;
        for (label, r) in labels.iter_mut().zip(rows) {
            *label = nearest(&centroids, r).0;
        }

        let mut sums = vec![vec![0.0; FEATURE_COUNT]; k];
        let mut counts = vec![0usize; k];
        for (label, r) in labels.iter().zip(rows) {
            counts[*label] += 1;
            for (s, x) in sums[*label].iter_mut().zip(r) {
                *s += x;
            }
        }

        let mut next: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .map(|(s, &n)| if n > 0 { s.into_iter().map(|v| v / n as f64).collect() } else { Vec::new() })
            .collect();
        relocate_empty(rows, &centroids, &labels, &mut next);

        let shift: f64 = centroids.iter().zip(&next).map(|(a, b)| squared_distance(a, b)).sum();
        centroids = next;
        if shift <= tol {
            break;
        }
    }

    let inertia = rows.iter().map(|r| nearest(&centroids, r).1).sum();
    Run { centroids, inertia, iterations }
}

/// Empty clusters take the points farthest from their current centroid.
fn relocate_empty(rows: &[Row], previous: &[Vec<f64>], labels: &[usize], next: &mut [Vec<f64>]) {
    let empty: Vec<usize> = (0..next.len()).filter(|&i| next[i].is_empty()).collect();
    if empty.is_empty() {
        return;
    }
    let mut by_distance: Vec<(usize, f64)> = rows
        .iter()
        .zip(labels)
        .enumerate()
        .map(|(i, (r, &l))| (i, squared_distance(&previous[l], r)))
        .collect();
    by_distance.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    for (slot, (row, _)) in empty.into_iter().zip(by_distance) {
        next[slot] = rows[row].to_vec();
    }
}
