//! # credo-scoring: Credit scorers and the shared model handle.
//!
//! - [`RuleBasedScorer`]: the deterministic fallback formula, usable with no
//!   model artifacts at all.
//! - [`ModelScorer`]: scale, cluster, flag anomalies, then a weighted linear
//!   score around the base of 500, with a flat penalty for anomalies.
//! - [`ModelHandle`]: the process-wide, atomically swappable slot holding
//!   the loaded model. Readers never block and never see a half-built model.

pub mod fallback;
pub mod handle;
pub mod model;

pub use fallback::{RuleBasedScorer, fallback_score};
pub use handle::{LoadedModel, ModelHandle};
pub use model::ModelScorer;
