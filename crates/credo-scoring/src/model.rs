//! Model-backed scorer.

use std::fmt;
use std::sync::Arc;

use credo_core::constants::{ANOMALY_PENALTY, BASE_SCORE, RAW_SCORE_SCALE};
use credo_core::error::ModelError;
use credo_core::traits::{AnomalyDetector, ClusterAssigner, CreditScorer, Scaler};
use credo_core::types::{CreditScore, FeatureVector, ScoreResult, ScorerKind};
use credo_model::{ModelBundle, weighted_score};

/// Scores through a fitted {scaler, cluster assigner, anomaly detector} triple.
#[derive(Clone)]
pub struct ModelScorer {
    scaler: Arc<dyn Scaler>,
    clusters: Arc<dyn ClusterAssigner>,
    detector: Arc<dyn AnomalyDetector>,
}

impl fmt::Debug for ModelScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelScorer")
            .field("clusters", &self.clusters.cluster_count())
            .finish_non_exhaustive()
    }
}

impl ModelScorer {
    pub fn new(
        scaler: Arc<dyn Scaler>,
        clusters: Arc<dyn ClusterAssigner>,
        detector: Arc<dyn AnomalyDetector>,
    ) -> Self {
        Self { scaler, clusters, detector }
    }

    pub fn from_bundle(bundle: &ModelBundle) -> Result<Self, ModelError> {
        bundle.validate()?;
        Ok(Self::new(
            Arc::new(bundle.scaler.clone()),
            Arc::new(bundle.kmeans.clone()),
            Arc::new(bundle.isoforest.clone()),
        ))
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.cluster_count()
    }
}

impl CreditScorer for ModelScorer {
    fn score(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError> {
        let scaled = self.scaler.transform(&features.to_array());
        let cluster = self.clusters.assign(&scaled);
        let is_anomaly = self.detector.is_anomaly(&scaled);

        let raw = weighted_score(&scaled);
        let mut credit_score = CreditScore::rounded(BASE_SCORE + raw * RAW_SCORE_SCALE);
        if is_anomaly {
            credit_score = credit_score.penalized(ANOMALY_PENALTY);
        }

        Ok(ScoreResult {
            credit_score,
            cluster: Some(cluster),
            is_anomaly: Some(is_anomaly),
            features_used: *features,
            scorer: ScorerKind::Model,
        })
    }
}
