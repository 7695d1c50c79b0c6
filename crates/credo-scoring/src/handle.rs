//! Process-wide model slot.
//!
//! The slot holds either nothing or a fully validated model. Loading builds
//! the new model off to the side and publishes it with one atomic store, so
//! in-flight requests keep the `Arc` they already hold.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use credo_core::error::ModelError;
use credo_core::traits::CreditScorer;
use credo_core::types::{FeatureVector, ScoreResult};
use credo_model::{BundleSummary, ModelBundle};
use tracing::{info, warn};

use crate::fallback::RuleBasedScorer;
use crate::model::ModelScorer;

/// A validated bundle with its scorer, immutable once published.
#[derive(Debug)]
pub struct LoadedModel {
    pub summary: BundleSummary,
    pub scorer: ModelScorer,
    /// Where the bundle was read from, if it came from disk.
    pub source: Option<PathBuf>,
}

impl LoadedModel {
    pub fn from_bundle(bundle: &ModelBundle, source: Option<PathBuf>) -> Result<Self, ModelError> {
        Ok(Self { summary: bundle.summary(), scorer: ModelScorer::from_bundle(bundle)?, source })
    }
}

#[derive(Debug, Default)]
pub struct ModelHandle {
    slot: ArcSwapOption<LoadedModel>,
}

impl ModelHandle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_bundle(bundle: &ModelBundle) -> Result<Self, ModelError> {
        let handle = Self::empty();
        handle.swap(LoadedModel::from_bundle(bundle, None)?);
        Ok(handle)
    }

    /// Startup loading: a missing or corrupt bundle leaves the slot empty
    /// and is logged, not returned.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let handle = Self::empty();
        if let Err(err) = handle.load(path.as_ref()) {
            warn!(path = %path.as_ref().display(), error = %err, "model not loaded");
        }
        handle
    }

    /// Read, validate and publish a bundle from disk.
    pub fn load(&self, path: &Path) -> Result<BundleSummary, ModelError> {
        let bundle = ModelBundle::load(path)?;
        let model = LoadedModel::from_bundle(&bundle, Some(path.to_path_buf()))?;
        let summary = model.summary;
        self.swap(model);
        info!(
            path = %path.display(),
            clusters = summary.clusters,
            trees = summary.trees,
            "model loaded"
        );
        Ok(summary)
    }

    /// Publish `model`, returning whatever it replaced.
    pub fn swap(&self, model: LoadedModel) -> Option<Arc<LoadedModel>> {
        self.slot.swap(Some(Arc::new(model)))
    }

    pub fn clear(&self) -> Option<Arc<LoadedModel>> {
        self.slot.swap(None)
    }

    pub fn current(&self) -> Option<Arc<LoadedModel>> {
        self.slot.load_full()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Model-backed score, or [`ModelError::NotLoaded`].
    pub fn score(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError> {
        let guard = self.slot.load();
        match guard.as_ref() {
            Some(model) => model.scorer.score(features),
            None => Err(ModelError::NotLoaded),
        }
    }

    /// Model-backed when loaded, rule-based otherwise.
    pub fn score_or_fallback(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError> {
        match self.score(features) {
            Err(ModelError::NotLoaded) => RuleBasedScorer.score(features),
            other => other,
        }
    }
}
