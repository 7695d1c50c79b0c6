//! # credo-model: Fitted model artifacts and the offline trainer.
//!
//! All three components operate on nine-wide rows in
//! [`FEATURE_NAMES`](credo_core::constants::FEATURE_NAMES) order:
//! - **Standard scaler**: per-feature mean and population deviation.
//! - **K-means**: k-means++ seeding, best of several seeded restarts,
//!   nearest-centroid prediction.
//! - **Isolation forest**: random-split trees over sub-samples; the decision
//!   threshold is the contamination quantile of the training scores.
//!
//! [`ModelBundle`] persists the fitted triple as one JSON document and
//! [`Trainer`] produces it from a CSV dataset, together with per-cluster
//! rank scores and clustering-quality indices.

pub mod bundle;
pub mod dataset;
pub mod isolation;
pub mod kmeans;
pub mod quality;
pub mod scaler;
pub mod trainer;

pub use bundle::{BundleSummary, ModelBundle};
pub use dataset::{Dataset, ScoredRow};
pub use isolation::{IsolationForest, IsolationParams};
pub use kmeans::{KMeans, KMeansParams};
pub use quality::QualityReport;
pub use scaler::StandardScaler;
pub use trainer::{Trainer, TrainerConfig, TrainingOutcome, TrainingReport};

use credo_core::constants::{FEATURE_COUNT, FEATURE_WEIGHTS};

/// One model input row.
pub type Row = [f64; FEATURE_COUNT];

/// Dot product of a scaled row with the fixed feature weights.
pub fn weighted_score(scaled: &Row) -> f64 {
    scaled.iter().zip(FEATURE_WEIGHTS).map(|(x, w)| x * w).sum()
}

pub(crate) fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_score_of_ones_is_weight_sum() {
        assert!((weighted_score(&[1.0; FEATURE_COUNT]) - 1.0).abs() < 1e-12);
        assert_eq!(weighted_score(&[0.0; FEATURE_COUNT]), 0.0);
    }

    #[test]
    fn weighted_score_respects_order() {
        let mut row = [0.0; FEATURE_COUNT];
        row[0] = 2.0;
        assert!((weighted_score(&row) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn squared_distance_basic() {
        assert_eq!(squared_distance(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }
}
