//! Composite wallet analysis over one transaction history.

use chrono::{DateTime, Utc};
use credo_core::types::{FeatureVector, LendingPosition, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activity::{ActivityFrequency, activity_frequency};
use crate::age::{AccountAge, account_age};
use crate::diversity::{PortfolioDiversity, portfolio_diversity};
use crate::lending::wallet_features;
use crate::parse::{SkipDiagnostics, parse_all};

/// Everything the extractor derives from one history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WalletAnalysis {
    pub portfolio_diversity: PortfolioDiversity,
    pub account_age: AccountAge,
    pub activity_frequency: ActivityFrequency,
    pub diagnostics: SkipDiagnostics,
}

impl WalletAnalysis {
    /// Combine with a lending position into the model input.
    pub fn features(&self, position: &LendingPosition) -> FeatureVector {
        wallet_features(self, position)
    }
}

/// Borrowing analyzer over a slice of raw transactions.
///
/// Holds no state beyond the borrowed slice, so it is cheap to build per
/// request.
#[derive(Debug, Clone, Copy)]
pub struct WalletAnalyzer<'a> {
    transactions: &'a [Transaction],
}

impl<'a> WalletAnalyzer<'a> {
    pub fn new(transactions: &'a [Transaction]) -> Self {
        Self { transactions }
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Analyze against an explicit reference time.
    pub fn analyze(&self, now: DateTime<Utc>) -> WalletAnalysis {
        let mut diagnostics = SkipDiagnostics::default();
        let parsed = parse_all(self.transactions, &mut diagnostics);

        let analysis = WalletAnalysis {
            portfolio_diversity: portfolio_diversity(&parsed),
            account_age: account_age(&parsed, now),
            activity_frequency: activity_frequency(&parsed, now),
            diagnostics,
        };

        debug!(
            records = self.transactions.len(),
            skipped = diagnostics.total(),
            timestamp_skips = diagnostics.timestamp_skips(),
            malformed_values = diagnostics.malformed_value,
            missing_recipients = diagnostics.missing_recipient,
            malformed_text = diagnostics.malformed_recipient + diagnostics.malformed_method,
            diversity = analysis.portfolio_diversity.diversity_score,
            age_days = analysis.account_age.account_age_days,
            "wallet analyzed"
        );

        analysis
    }

    /// Analyze against the current wall clock.
    pub fn analyze_now(&self) -> WalletAnalysis {
        self.analyze(Utc::now())
    }
}
