//! The persisted model bundle.
//!
//! One JSON document holding the fitted scaler, k-means and isolation forest
//! under fixed keys, versioned so an incompatible layout is refused at load
//! time instead of producing wrong scores.

use std::fs;
use std::path::Path;

use credo_core::constants::MODEL_FORMAT_VERSION;
use credo_core::error::ModelError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::isolation::IsolationForest;
use crate::kmeans::KMeans;
use crate::scaler::StandardScaler;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelBundle {
    pub format_version: u32,
    pub scaler: StandardScaler,
    pub kmeans: KMeans,
    pub isoforest: IsolationForest,
}

/// What the health endpoint reports about a loaded bundle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleSummary {
    pub format_version: u32,
    pub clusters: usize,
    pub trees: usize,
}

impl ModelBundle {
    pub fn new(scaler: StandardScaler, kmeans: KMeans, isoforest: IsolationForest) -> Self {
        Self { format_version: MODEL_FORMAT_VERSION, scaler, kmeans, isoforest }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(ModelError::UnsupportedVersion(self.format_version));
        }
        self.scaler.validate()?;
        self.kmeans.validate()?;
        self.isoforest.validate()
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            format_version: self.format_version,
            clusters: self.kmeans.centroids.len(),
            trees: self.isoforest.trees.len(),
        }
    }

    pub fn to_json(&self) -> Result<String, ModelError> {
        serde_json::to_string(self).map_err(|e| ModelError::Corrupt(e.to_string()))
    }

    /// Parse and validate.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let bundle: Self = serde_json::from_str(json).map_err(|e| ModelError::Corrupt(e.to_string()))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        fs::write(path, json).map_err(|e| ModelError::Io(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "model bundle saved");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ModelError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isolation::IsolationParams;
    use crate::kmeans::KMeansParams;
    use crate::Row;
    use credo_core::constants::FEATURE_COUNT;
    use credo_core::traits::{AnomalyDetector, ClusterAssigner, Scaler};

    fn rows() -> Vec<Row> {
        (0..40)
            .map(|i| {
                let mut r = [(i % 4) as f64; FEATURE_COUNT];
                r[i % FEATURE_COUNT] += i as f64 * 0.05;
                r
            })
            .collect()
    }

    fn fitted() -> ModelBundle {
        let rows = rows();
        let scaler = StandardScaler::fit(&rows).unwrap();
        let scaled = scaler.transform_rows(&rows);
        let kmeans = KMeans::fit(
            &scaled,
            &KMeansParams { clusters: 2, restarts: 2, max_iter: 10, tolerance: 1e-4, seed: 3 },
        )
        .unwrap();
        let isoforest = IsolationForest::fit(
            &scaled,
            &IsolationParams { trees: 10, sample_size: 32, contamination: 0.1, seed: 3 },
        )
        .unwrap();
        ModelBundle::new(scaler, kmeans, isoforest)
    }

    #[test]
    fn save_then_load_predicts_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credit_score.json");
        let bundle = fitted();
        bundle.save(&path).unwrap();
        let loaded = ModelBundle::load(&path).unwrap();

        for row in rows() {
            let a = bundle.scaler.transform(&row);
            let b = loaded.scaler.transform(&row);
            assert_eq!(a, b);
            assert_eq!(bundle.kmeans.assign(&a), loaded.kmeans.assign(&b));
            assert_eq!(bundle.isoforest.is_anomaly(&a), loaded.isoforest.is_anomaly(&b));
        }
    }

    #[test]
    fn json_has_named_components() {
        let value: serde_json::Value = serde_json::from_str(&fitted().to_json().unwrap()).unwrap();
        assert_eq!(value["format_version"], 1);
        for key in ["scaler", "kmeans", "isoforest"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn summary_counts_components() {
        let s = fitted().summary();
        assert_eq!(s, BundleSummary { format_version: 1, clusters: 2, trees: 10 });
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bundle = fitted();
        bundle.format_version = 7;
        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(ModelBundle::from_json(&json), Err(ModelError::UnsupportedVersion(7)));
    }

    #[test]
    fn rejects_wrong_dimension() {
        let mut bundle = fitted();
        bundle.scaler.mean.pop();
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(matches!(
            ModelBundle::from_json(&json),
            Err(ModelError::DimensionMismatch { expected: 9, got: 8, .. })
        ));
    }

    #[test]
    fn rejects_garbage_and_missing_file() {
        assert!(matches!(ModelBundle::from_json("{\"scaler\": 1}"), Err(ModelError::Corrupt(_))));
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ModelBundle::load(dir.path().join("nope.json")), Err(ModelError::Io(_))));
    }
}
