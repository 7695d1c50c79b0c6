//! Trait interfaces for Credo.
//!
//! These traits define the contracts between crates:
//! - [`Scaler`], [`ClusterAssigner`], [`AnomalyDetector`]: fitted model
//!   components (credo-model implements)
//! - [`CreditScorer`]: turns a feature vector into a score (credo-scoring
//!   implements, once rule-based and once model-backed)

use crate::constants::FEATURE_COUNT;
use crate::error::ModelError;
use crate::types::{FeatureVector, ScoreResult};

/// A fitted transform that normalizes raw features to a common range.
///
/// Input and output are both in [`FEATURE_NAMES`](crate::constants::FEATURE_NAMES)
/// order; reordering columns silently corrupts every downstream number.
pub trait Scaler: Send + Sync {
    fn transform(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT];
}

/// A fitted model mapping a scaled vector to one of a fixed set of groups.
pub trait ClusterAssigner: Send + Sync {
    /// Cluster id for a scaled vector, in `0..cluster_count()`.
    fn assign(&self, scaled: &[f64; FEATURE_COUNT]) -> usize;

    fn cluster_count(&self) -> usize;
}

/// A fitted model flagging scaled vectors that are outliers relative to the
/// training population.
pub trait AnomalyDetector: Send + Sync {
    /// `true` for the "anomalous" label.
    fn is_anomaly(&self, scaled: &[f64; FEATURE_COUNT]) -> bool;
}

/// Anything that can produce a credit score from a feature vector.
pub trait CreditScorer: Send + Sync {
    /// Score a validated feature vector.
    ///
    /// Implementations must keep the result within
    /// [`SCORE_MIN`](crate::constants::SCORE_MIN)..=[`SCORE_MAX`](crate::constants::SCORE_MAX).
    fn score(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError>;
}

/// Identity scaler. Useful for tests and for bundles trained on
/// pre-normalized data.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, raw: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        *raw
    }
}
