//! credo-cli: Offline front end for wallet analysis, scoring and training.

use std::{fs, io};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use credo_core::constants::{LOG_ENV, LOG_TARGETS};
use credo_core::types::{FeatureVector, LendingPosition, ScoreResult, TransactionDocument};
use credo_features::{WalletAnalysis, WalletAnalyzer};
use credo_model::dataset::write_scored_csv;
use credo_model::{Dataset, Trainer, TrainerConfig, TrainingReport};
use credo_scoring::ModelHandle;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Credo wallet credit-scoring toolkit.
#[derive(Parser)]
#[command(name = "credo-cli")]
#[command(version, about = "Wallet analysis, credit scoring and model training")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a wallet's transaction history.
    Analyze(AnalyzeArgs),
    /// Score a feature payload.
    Score(ScoreArgs),
    /// Fit a model bundle from a CSV dataset.
    Train(TrainArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Transaction document (JSON object with `transactions`, or a bare array).
    file: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Collateral held in lending protocols, in ETH.
    #[arg(long, default_value_t = 0.0)]
    collateral: f64,

    /// Outstanding lending debt, in ETH.
    #[arg(long, default_value_t = 0.0)]
    debt: f64,
}

#[derive(Args)]
struct ScoreArgs {
    /// JSON file with the nine feature fields.
    features: PathBuf,

    /// Model bundle; the rule-based scorer is used if it does not load.
    #[arg(short, long)]
    model: Option<PathBuf>,
}

#[derive(Args)]
struct TrainArgs {
    /// Training dataset CSV.
    #[arg(long)]
    data: PathBuf,

    /// Where to write the fitted model bundle.
    #[arg(long)]
    model_out: PathBuf,

    /// Where to write the scored dataset CSV.
    #[arg(long)]
    scores_out: PathBuf,

    /// Number of k-means clusters.
    #[arg(long)]
    clusters: Option<usize>,

    /// Random seed for k-means and the isolation forest.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of isolation trees.
    #[arg(long)]
    trees: Option<usize>,

    /// Expected anomaly share, in (0, 0.5].
    #[arg(long)]
    contamination: Option<f64>,
}

impl TrainArgs {
    fn trainer_config(&self) -> TrainerConfig {
        let defaults = TrainerConfig::default();
        TrainerConfig {
            clusters: self.clusters.unwrap_or(defaults.clusters),
            seed: self.seed.unwrap_or(defaults.seed),
            isolation_trees: self.trees.unwrap_or(defaults.isolation_trees),
            contamination: self.contamination.unwrap_or(defaults.contamination),
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Analyze(args) => analyze(args),
        Commands::Score(args) => score(args),
        Commands::Train(args) => train(args),
    }
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let document = load_document(&args.file)?;
    let analysis = WalletAnalyzer::new(&document.transactions).analyze(Utc::now());
    let position = LendingPosition { total_collateral_eth: args.collateral, total_debt_eth: args.debt };
    let features = analysis.features(&position);

    if args.json {
        let report = serde_json::json!({
            "address": document.address,
            "records": document.transactions.len(),
            "analysis": analysis,
            "features": features,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_analysis(&document, &analysis, &features));
    }
    Ok(())
}

fn score(args: ScoreArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.features)
        .with_context(|| format!("failed to read {}", args.features.display()))?;
    let features: FeatureVector = serde_json::from_str(&raw)
        .with_context(|| format!("invalid feature payload in {}", args.features.display()))?;
    features.validate()?;

    let handle = match &args.model {
        Some(path) => ModelHandle::open(path),
        None => ModelHandle::empty(),
    };
    let result = handle.score_or_fallback(&features)?;
    print!("{}", render_score(&result));
    Ok(())
}

fn train(args: TrainArgs) -> Result<()> {
    let config = args.trainer_config();
    let dataset = Dataset::load_csv(&args.data)
        .with_context(|| format!("failed to load dataset {}", args.data.display()))?;
    if dataset.rows.is_empty() {
        bail!("{} has no usable rows ({} dropped)", args.data.display(), dataset.dropped);
    }

    let outcome = Trainer::new(config).fit(&dataset)?;
    outcome
        .bundle
        .save(&args.model_out)
        .with_context(|| format!("failed to write model to {}", args.model_out.display()))?;
    write_scored_csv(&args.scores_out, &outcome.scored)
        .with_context(|| format!("failed to write scores to {}", args.scores_out.display()))?;
    info!(model = %args.model_out.display(), scores = %args.scores_out.display(), "training complete");

    print!("{}", render_training(&outcome.report));
    println!("Model saved to:  {}", args.model_out.display());
    println!("Scores saved to: {}", args.scores_out.display());
    Ok(())
}

fn load_document(path: &Path) -> Result<TransactionDocument> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    TransactionDocument::from_json(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn render_analysis(document: &TransactionDocument, analysis: &WalletAnalysis, features: &FeatureVector) -> String {
    let diversity = &analysis.portfolio_diversity;
    let age = &analysis.account_age;
    let activity = &analysis.activity_frequency;
    let periods = &activity.activity_periods;

    let mut lines = vec!["=== WALLET ANALYSIS ===".to_string()];
    if let Some(address) = &document.address {
        lines.push(format!("Address: {address}"));
    }
    lines.push(format!(
        "Records: {} ({} skipped)",
        document.transactions.len(),
        analysis.diagnostics.total()
    ));
    lines.push(String::new());
    lines.push(format!(
        "Portfolio diversity: {:.3} across {} tokens",
        diversity.diversity_score, diversity.unique_tokens
    ));
    for (token, weight) in &diversity.token_distribution {
        lines.push(format!("  {token:<44} {weight:.4}"));
    }
    match age.first_transaction {
        Some(first) => lines.push(format!(
            "Account age: {} days (first seen {})",
            age.account_age_days,
            first.to_rfc3339()
        )),
        None => lines.push("Account age: 0 days (no dated transactions)".to_string()),
    }
    lines.push(format!(
        "Activity: {} transactions, {:.2}/day",
        activity.total_transactions, activity.avg_daily_transactions
    ));
    if let Some(day) = &activity.most_active_day {
        lines.push(format!("  Most active: {} ({} transactions)", day.date, day.transaction_count));
    }
    lines.push(format!(
        "  Last 7/30/90 days: {} / {} / {}",
        periods.last_7_days, periods.last_30_days, periods.last_90_days
    ));
    lines.push(String::new());
    lines.push("Features:".to_string());
    lines.extend(feature_lines(features));
    lines.push(String::new());
    lines.join("\n")
}

fn render_score(result: &ScoreResult) -> String {
    let mut lines = vec![
        "=== CREDIT SCORE ===".to_string(),
        format!("Score:   {}", result.credit_score),
        format!("Scorer:  {}", scorer_name(result)),
    ];
    if let Some(cluster) = result.cluster {
        lines.push(format!("Cluster: {cluster}"));
    }
    if let Some(anomaly) = result.is_anomaly {
        lines.push(format!("Anomaly: {}", if anomaly { "yes" } else { "no" }));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn render_training(report: &TrainingReport) -> String {
    let mut lines = vec![
        "=== TRAINING REPORT ===".to_string(),
        format!("Rows used:    {} ({} dropped)", report.rows_used, report.rows_dropped),
        format!("Anomalies:    {}", report.anomalies),
        format!("Inertia:      {:.4}", report.inertia),
    ];
    for (cluster, size) in report.cluster_sizes.iter().enumerate() {
        lines.push(format!("Cluster {cluster}:    {size} rows"));
    }
    match &report.quality {
        Some(q) => {
            lines.push(format!("Silhouette:        {:.4}", q.silhouette));
            lines.push(format!("Davies-Bouldin:    {:.4}", q.davies_bouldin));
            lines.push(format!("Calinski-Harabasz: {:.4}", q.calinski_harabasz));
        }
        None => lines.push("Quality:      n/a (fewer than two populated clusters)".to_string()),
    }
    lines.push(String::new());
    lines.join("\n")
}

fn feature_lines(features: &FeatureVector) -> Vec<String> {
    credo_core::constants::FEATURE_NAMES
        .iter()
        .zip(features.to_array())
        .map(|(name, value)| format!("  {name:<20} {value}"))
        .collect()
}

fn scorer_name(result: &ScoreResult) -> &'static str {
    match result.scorer {
        credo_core::types::ScorerKind::Model => "model",
        credo_core::types::ScorerKind::RuleBased => "rule-based",
    }
}

/// Initialize tracing subscriber with the given log level and output format.
/// `warn` everywhere except the workspace crates, which log at `level`.
fn default_directives(level: &str) -> String {
    LOG_TARGETS.iter().fold(String::from("warn"), |mut acc, target| {
        acc.push_str(&format!(",{target}={level}"));
        acc
    })
}

/// `CREDO_LOG`, then `RUST_LOG`, then the configured level.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Logs go to stderr so that stdout carries only command output.
fn init_logging(level: &str, format: &str) {
    let registry = tracing_subscriber::registry().with(log_filter(level));
    match format {
        "json" => registry.with(fmt::layer().json().with_writer(io::stderr)).init(),
        _ => registry.with(fmt::layer().compact().with_writer(io::stderr)).init(),
    }
}
