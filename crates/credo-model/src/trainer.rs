//! Offline trainer: fits the scaler, k-means and isolation forest on a
//! historical dataset and ranks every row within its cluster.

use std::collections::BTreeMap;

use credo_core::constants::{
    CLUSTER_RANK_SCALE, DEFAULT_CLUSTERS, DEFAULT_CONTAMINATION, DEFAULT_ISOLATION_SAMPLE,
    DEFAULT_ISOLATION_TREES, DEFAULT_KMEANS_MAX_ITER, DEFAULT_KMEANS_RESTARTS, DEFAULT_SEED,
    KMEANS_TOLERANCE,
};
use credo_core::error::TrainingError;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bundle::ModelBundle;
use crate::dataset::{Dataset, ScoredRow};
use crate::isolation::{ANOMALY_LABEL, IsolationForest, IsolationParams};
use crate::kmeans::{KMeans, KMeansParams};
use crate::quality::QualityReport;
use crate::scaler::StandardScaler;
use crate::weighted_score;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct TrainerConfig {
    pub clusters: usize,
    pub kmeans_restarts: usize,
    pub kmeans_max_iter: usize,
    pub seed: u64,
    pub isolation_trees: usize,
    pub isolation_sample_size: usize,
    pub contamination: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            clusters: DEFAULT_CLUSTERS,
            kmeans_restarts: DEFAULT_KMEANS_RESTARTS,
            kmeans_max_iter: DEFAULT_KMEANS_MAX_ITER,
            seed: DEFAULT_SEED,
            isolation_trees: DEFAULT_ISOLATION_TREES,
            isolation_sample_size: DEFAULT_ISOLATION_SAMPLE,
            contamination: DEFAULT_CONTAMINATION,
        }
    }
}

impl TrainerConfig {
    fn kmeans(&self) -> KMeansParams {
        KMeansParams {
            clusters: self.clusters,
            restarts: self.kmeans_restarts,
            max_iter: self.kmeans_max_iter,
            tolerance: KMEANS_TOLERANCE,
            seed: self.seed,
        }
    }

    fn isolation(&self) -> IsolationParams {
        IsolationParams {
            trees: self.isolation_trees,
            sample_size: self.isolation_sample_size,
            contamination: self.contamination,
            seed: self.seed,
        }
    }

    /// Fewest rows that can be clustered and isolated.
    pub fn min_samples(&self) -> usize {
        self.clusters.max(2)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub rows_used: usize,
    pub rows_dropped: usize,
    pub cluster_sizes: Vec<usize>,
    pub anomalies: usize,
    pub inertia: f64,
    /// `None` when the clustering is degenerate (one cluster, or one row per cluster).
    pub quality: Option<QualityReport>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub bundle: ModelBundle,
    pub scored: Vec<ScoredRow>,
    pub report: TrainingReport,
}

#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingOutcome, TrainingError> {
        let rows = &dataset.rows;
        if rows.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        let need = self.config.min_samples();
        if rows.len() < need {
            return Err(TrainingError::TooFewSamples { have: rows.len(), need });
        }
        info!(rows = rows.len(), dropped = dataset.dropped, clusters = self.config.clusters, "training started");

        let scaler = StandardScaler::fit(rows)?;
        let scaled = scaler.transform_rows(rows);

        let kmeans = KMeans::fit(&scaled, &self.config.kmeans())?;
        let labels = kmeans.labels(&scaled);

        let isoforest = IsolationForest::fit(&scaled, &self.config.isolation())?;
        let anomaly: Vec<i8> = scaled.iter().map(|r| isoforest.predict(r)).collect();

        let quality = QualityReport::compute(&scaled, &labels);
        match &quality {
            Some(q) => info!(
                silhouette = q.silhouette,
                davies_bouldin = q.davies_bouldin,
                calinski_harabasz = q.calinski_harabasz,
                "clustering quality"
            ),
            None => warn!("clustering quality unavailable for a degenerate clustering"),
        }

        let raw: Vec<f64> = scaled.iter().map(weighted_score).collect();
        let ranked = cluster_rank_scores(&raw, &labels);

        let scored: Vec<ScoredRow> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| ScoredRow::new(row, labels[i], anomaly[i], raw[i], ranked[i]))
            .collect();

        let mut cluster_sizes = vec![0; kmeans.centroids.len()];
        for &l in &labels {
            if let Some(n) = cluster_sizes.get_mut(l) {
                *n += 1;
            }
        }

        let report = TrainingReport {
            rows_used: rows.len(),
            rows_dropped: dataset.dropped,
            cluster_sizes,
            anomalies: anomaly.iter().filter(|a| **a == ANOMALY_LABEL).count(),
            inertia: kmeans.inertia,
            quality,
        };
        info!(
            anomalies = report.anomalies,
            inertia = report.inertia,
            sizes = ?report.cluster_sizes,
            "training finished"
        );

        let bundle = ModelBundle::new(scaler, kmeans, isoforest);
        bundle.validate()?;
        Ok(TrainingOutcome { bundle, scored, report })
    }
}

/// Per-cluster rank of each raw score mapped onto `[0, 100]`.
///
/// Ranks are descending with ties sharing the lowest rank, so the best row
/// in a cluster scores 100 and the worst scores 0. A single-row cluster
/// scores 100.
pub fn cluster_rank_scores(raw: &[f64], labels: &[usize]) -> Vec<f64> {
    let mut by_cluster: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &l) in labels.iter().enumerate().take(raw.len()) {
        by_cluster.entry(l).or_default().push(i);
    }

    let mut scores = vec![CLUSTER_RANK_SCALE; raw.len()];
    for mut members in by_cluster.into_values() {
        let n = members.len();
        if n <= 1 {
            continue;
        }
        members.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(raw[i])));

        let mut rank = 1;
        for (pos, &i) in members.iter().enumerate() {
            if pos > 0 && raw[i] != raw[members[pos - 1]] {
                rank = pos + 1;
            }
            scores[i] = CLUSTER_RANK_SCALE * (n - rank) as f64 / (n - 1) as f64;
        }
    }
    scores
}
