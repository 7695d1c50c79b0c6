//! Isolation forest anomaly detector.
//!
//! Each tree recursively splits a random sub-sample on a random
//! non-constant feature at a uniform threshold until a node holds one row
//! or the height limit `ceil(log2 ψ)` is reached. A row's anomaly score is
//! `2^(-E[h(x)] / c(ψ))`; short average paths mean easy isolation.
//!
//! Labels follow the usual convention: `-1` anomalous, `1` normal. Training
//! fixes `offset` at the `contamination` quantile of the negated training
//! scores, so roughly that share of the training set is labelled `-1`.

use credo_core::constants::FEATURE_COUNT;
use credo_core::error::ModelError;
use credo_core::traits::AnomalyDetector;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::Row;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

pub const ANOMALY_LABEL: i8 = -1;
pub const NORMAL_LABEL: i8 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct IsolationParams {
    pub trees: usize,
    /// Sub-sample size per tree, capped at the row count.
    pub sample_size: usize,
    /// Expected share of anomalies in the training set, in `(0, 0.5]`.
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { size: usize },
}

/// One tree, stored as an arena with the root at index 0.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(rows: &[Row], sample: &[usize], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, sample.to_vec(), 0, height_limit, rng);
        tree
    }

    fn grow(&mut self, rows: &[Row], members: Vec<usize>, depth: usize, limit: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: members.len() });
        if depth >= limit || members.len() <= 1 {
            return id;
        }

        let ranges: Vec<(usize, f64, f64)> = (0..FEATURE_COUNT)
            .filter_map(|f| {
                let (lo, hi) = members.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(rows[i][f]), hi.max(rows[i][f]))
                });
                // A span that overflows to infinity cannot be sampled.
                (lo < hi && (hi - lo).is_finite()).then_some((f, lo, hi))
            })
            .collect();
        if ranges.is_empty() {
            return id;
        }

        let (feature, lo, hi) = ranges[rng.gen_range(0..ranges.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            members.into_iter().partition(|&i| rows[i][feature] < threshold);

        let left = self.grow(rows, left_rows, depth + 1, limit, rng);
        let right = self.grow(rows, right_rows, depth + 1, limit, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    /// Edges from the root to `x`'s leaf, plus `c(leaf size)`.
    fn path_length(&self, x: &Row) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        while let Some(node) = self.nodes.get(idx) {
            match *node {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split { feature, threshold, left, right } => {
                    idx = if x.get(feature).is_some_and(|v| *v < threshold) { left } else { right };
                    depth += 1.0;
                }
            }
        }
        depth
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Corrupt("isolation tree has no nodes".into()));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, threshold, left, right } = *node {
                if feature >= FEATURE_COUNT {
                    return Err(ModelError::DimensionMismatch {
                        component: "isoforest.feature",
                        expected: FEATURE_COUNT,
                        got: feature + 1,
                    });
                }
                // Children after parents keeps traversal acyclic.
                let in_range = |c: usize| c > id && c < self.nodes.len();
                if !in_range(left) || !in_range(right) || !threshold.is_finite() {
                    return Err(ModelError::Corrupt(format!("isolation tree node {id} is malformed")));
                }
            }
        }
        Ok(())
    }
}

/// Average unsuccessful-search path length in a binary search tree of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of unsorted values, `q` in `[0, 1]`.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort();
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let (a, b) = (sorted[lo].0, sorted[hi].0);
    Some(a + (b - a) * (pos - lo as f64))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IsolationForest {
    pub trees: Vec<IsolationTree>,
    /// ψ actually used per tree.
    pub sample_size: usize,
    pub contamination: f64,
    /// Rows whose negated score falls below this are anomalous.
    pub offset: f64,
}

impl IsolationForest {
    pub fn fit(rows: &[Row], params: &IsolationParams) -> Result<Self, ModelError> {
        if params.trees == 0 {
            return Err(ModelError::InvalidParameter("isolation forest needs at least one tree".into()));
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(ModelError::InvalidParameter(format!(
                "contamination {} outside (0, 0.5]",
                params.contamination
            )));
        }
        if rows.len() < 2 || params.sample_size < 2 {
            return Err(ModelError::InvalidParameter(
                "isolation forest needs at least two rows per tree".into(),
            ));
        }

        let psi = params.sample_size.min(rows.len());
        let height_limit = (psi as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.trees)
            .map(|_| {
                let sample = index::sample(&mut rng, rows.len(), psi).into_vec();
                IsolationTree::build(rows, &sample, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self { trees, sample_size: psi, contamination: params.contamination, offset: 0.0 };
        let training: Vec<f64> = rows.iter().map(|r| forest.score_samples(r)).collect();
        forest.offset = quantile(&training, params.contamination)
            .ok_or_else(|| ModelError::InvalidParameter("no training scores".into()))?;
        Ok(forest)
    }

    /// Anomaly score in `(0, 1]`; higher is more anomalous.
    pub fn anomaly_score(&self, x: &Row) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let mean_path = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / c)
    }

    /// Negated anomaly score; lower is more anomalous.
    pub fn score_samples(&self, x: &Row) -> f64 {
        -self.anomaly_score(x)
    }

    /// Distance above the threshold; negative means anomalous.
    pub fn decision_function(&self, x: &Row) -> f64 {
        self.score_samples(x) - self.offset
    }

    pub fn predict(&self, x: &Row) -> i8 {
        if self.decision_function(x) < 0.0 { ANOMALY_LABEL } else { NORMAL_LABEL }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::Corrupt("isolation forest has no trees".into()));
        }
        if self.sample_size == 0 || !self.offset.is_finite() {
            return Err(ModelError::Corrupt("isolation forest header is malformed".into()));
        }
        self.trees.iter().try_for_each(IsolationTree::validate)
    }
}

impl AnomalyDetector for IsolationForest {
    fn is_anomaly(&self, scaled: &Row) -> bool {
        self.predict(scaled) == ANOMALY_LABEL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> IsolationParams {
        IsolationParams { trees: 100, sample_size: 256, contamination: 0.05, seed }
    }

    /// 200 rows on a tight grid near the origin plus one far outlier.
    fn with_outlier() -> Vec<Row> {
        let mut rows: Vec<Row> = (0..200)
            .map(|i| {
                let mut r = [0.0; FEATURE_COUNT];
                r[i % FEATURE_COUNT] = (i % 7) as f64 * 0.1;
                r[(i + 3) % FEATURE_COUNT] = (i % 5) as f64 * 0.1;
                r
            })
            .collect();
        rows.push([25.0; FEATURE_COUNT]);
        rows
    }

    #[test]
    fn average_path_length_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.244).abs() < 0.01);
    }

    #[test]
    fn quantile_interpolates() {
        let v = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&v, 0.0), Some(1.0));
        assert_eq!(quantile(&v, 1.0), Some(4.0));
        assert_eq!(quantile(&v, 0.5), Some(2.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn outlier_is_flagged() {
        let rows = with_outlier();
        let forest = IsolationForest::fit(&rows, &params(42)).unwrap();
        let outlier = rows[rows.len() - 1];
        assert!(forest.is_anomaly(&outlier));
        assert!(forest.anomaly_score(&outlier) > forest.anomaly_score(&rows[0]));
    }

    #[test]
    fn flags_roughly_contamination_share() {
        let rows = with_outlier();
        let forest = IsolationForest::fit(&rows, &params(3)).unwrap();
        let flagged = rows.iter().filter(|r| forest.is_anomaly(r)).count();
        assert!(flagged >= 1);
        assert!(flagged <= rows.len() / 10, "flagged {flagged}");
    }

    #[test]
    fn fit_is_deterministic_for_seed() {
        let rows = with_outlier();
        let a = IsolationForest::fit(&rows, &params(11)).unwrap();
        let b = IsolationForest::fit(&rows, &params(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn sample_size_capped_at_rows() {
        let rows = with_outlier();
        let forest = IsolationForest::fit(&rows, &params(1)).unwrap();
        assert_eq!(forest.sample_size, rows.len());
        assert!(forest.validate().is_ok());
    }

    #[test]
    fn fits_rows_spanning_the_whole_float_range() {
        let mut rows = with_outlier();
        for (i, row) in rows.iter_mut().enumerate() {
            row[0] = if i % 2 == 0 { -1e308 } else { 1e308 };
        }
        let forest = IsolationForest::fit(&rows, &params(3)).unwrap();
        assert!(forest.validate().is_ok());
        assert!(rows.iter().all(|r| forest.anomaly_score(r).is_finite()));
    }

    #[test]
    fn rejects_bad_parameters() {
        let rows = with_outlier();
        for bad in [
            IsolationParams { trees: 0, ..params(1) },
            IsolationParams { contamination: 0.0, ..params(1) },
            IsolationParams { contamination: 0.7, ..params(1) },
            IsolationParams { sample_size: 1, ..params(1) },
        ] {
            assert!(matches!(IsolationForest::fit(&rows, &bad), Err(ModelError::InvalidParameter(_))));
        }
        assert!(IsolationForest::fit(&rows[..1], &params(1)).is_err());
    }

    #[test]
    fn validate_rejects_cyclic_tree() {
        let forest = IsolationForest {
            trees: vec![IsolationTree {
                nodes: vec![Node::Split { feature: 0, threshold: 0.0, left: 0, right: 0 }],
            }],
            sample_size: 2,
            contamination: 0.05,
            offset: -0.5,
        };
        assert!(matches!(forest.validate(), Err(ModelError::Corrupt(_))));
    }

    #[test]
    fn tree_survives_json() {
        let rows = with_outlier();
        let forest = IsolationForest::fit(&rows, &IsolationParams { trees: 3, ..params(5) }).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let back: IsolationForest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&rows[200]), forest.predict(&rows[200]));
    }
}
