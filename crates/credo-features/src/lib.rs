//! # credo-features: Wallet transaction feature extraction.
//!
//! Turns a raw transaction history into the wallet half of the model input:
//! - **Portfolio diversity**: `1 - HHI` over per-token weights, where native
//!   value accumulates under a synthetic `ETH` key and every transfer call
//!   counts one interaction against the called contract.
//! - **Account age**: whole days since the earliest parseable timestamp.
//! - **Activity frequency**: per-calendar-day counts, average daily rate over
//!   the active span, the busiest day and 7/30/90-day windows.
//!
//! Every record is parsed once by [`parse::parse_all`]; unparseable fields
//! are skipped and tallied in [`parse::SkipDiagnostics`], never fatal.

pub mod activity;
pub mod age;
pub mod analyzer;
pub mod diversity;
pub mod lending;
pub mod parse;

pub use activity::{ActivityFrequency, ActivityPeriods, MostActiveDay, activity_frequency};
pub use age::{AccountAge, account_age};
pub use analyzer::{WalletAnalysis, WalletAnalyzer};
pub use diversity::{PortfolioDiversity, portfolio_diversity};
pub use lending::wallet_features;
pub use parse::{ParsedTransaction, SkipDiagnostics, parse_all};

/// Round half away from zero to `decimals` places.
pub(crate) fn round_dp(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}
