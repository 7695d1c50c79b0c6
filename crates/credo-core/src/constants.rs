//! Scoring constants shared by the extractor, the scorers and the trainer.

/// Lowest credit score ever reported.
pub const SCORE_MIN: u16 = 300;

/// Highest credit score ever reported.
pub const SCORE_MAX: u16 = 850;

/// Starting point of both the rule-based and the model-backed formula.
pub const BASE_SCORE: f64 = 500.0;

/// Points removed from a model-backed score when the detector flags the wallet.
pub const ANOMALY_PENALTY: u16 = 100;

/// Multiplier applied to the raw weighted sum before adding [`BASE_SCORE`].
pub const RAW_SCORE_SCALE: f64 = 100.0;

/// Number of features in a [`FeatureVector`](crate::types::FeatureVector).
pub const FEATURE_COUNT: usize = 9;

/// Feature names in the exact column order used at fit time and at scoring time.
///
/// Scalers, cluster centroids, isolation trees and [`FEATURE_WEIGHTS`] all
/// index into this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "repayment_ratio",
    "liquidation_ratio",
    "total_borrowed",
    "portfolio_diversity",
    "account_age_days",
    "activity_frequency",
    "total_collateral",
    "unique_tokens",
    "total_transactions",
];

/// Linear weights applied to the scaled feature vector, index-aligned with
/// [`FEATURE_NAMES`]. Sums to 1.0.
pub const FEATURE_WEIGHTS: [f64; FEATURE_COUNT] =
    [0.25, 0.10, 0.10, 0.05, 0.15, 0.10, 0.15, 0.05, 0.05];

/// Synthetic token key under which native-currency value is accumulated.
pub const NATIVE_TOKEN_KEY: &str = "ETH";

/// Substring of `functionName` that marks a token transfer call.
pub const TRANSFER_MARKER: &str = "transfer";

/// Crates whose events the binaries show at the configured level; all
/// other targets stay at `warn`.
pub const LOG_TARGETS: [&str; 6] =
    ["credo_server", "credo_cli", "credo_scoring", "credo_model", "credo_features", "credo_core"];

/// Environment variable holding a full filter directive, overriding the
/// configured level.
pub const LOG_ENV: &str = "CREDO_LOG";

/// Activity windows, in calendar days before "now" (inclusive).
pub const ACTIVITY_WINDOWS_DAYS: [i64; 3] = [7, 30, 90];

/// Decimal places kept on the diversity score.
pub const DIVERSITY_DECIMALS: i32 = 3;

/// Decimal places kept on the average daily transaction count.
pub const AVG_DAILY_DECIMALS: i32 = 2;

// --- Offline trainer defaults ---

/// Default number of k-means clusters.
pub const DEFAULT_CLUSTERS: usize = 3;

/// Default number of k-means restarts; the lowest-inertia run is kept.
pub const DEFAULT_KMEANS_RESTARTS: usize = 10;

/// Default k-means iteration cap per restart.
pub const DEFAULT_KMEANS_MAX_ITER: usize = 20;

/// Relative centroid-shift tolerance at which k-means stops early.
pub const KMEANS_TOLERANCE: f64 = 1e-4;

/// Default number of isolation trees.
pub const DEFAULT_ISOLATION_TREES: usize = 100;

/// Default isolation-forest sub-sample size per tree.
pub const DEFAULT_ISOLATION_SAMPLE: usize = 256;

/// Default expected share of anomalies in the training population.
pub const DEFAULT_CONTAMINATION: f64 = 0.05;

/// Default RNG seed; training is deterministic for a fixed seed.
pub const DEFAULT_SEED: u64 = 42;

/// Upper bound of the per-cluster rank score emitted by the trainer.
pub const CLUSTER_RANK_SCALE: f64 = 100.0;

/// Current on-disk model bundle format.
pub const MODEL_FORMAT_VERSION: u32 = 1;
