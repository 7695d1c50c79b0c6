//! Assembly of the nine-field model input.
//!
//! Lending ratios come from an external position source; the wallet half
//! comes from [`WalletAnalysis`].

use credo_core::types::{FeatureVector, LendingPosition};

use crate::analyzer::WalletAnalysis;

pub fn wallet_features(analysis: &WalletAnalysis, position: &LendingPosition) -> FeatureVector {
    FeatureVector {
        repayment_ratio: position.repayment_ratio(),
        liquidation_ratio: position.liquidation_ratio(),
        total_borrowed: position.total_debt_eth,
        portfolio_diversity: analysis.portfolio_diversity.diversity_score,
        account_age_days: analysis.account_age.account_age_days as f64,
        activity_frequency: analysis.activity_frequency.avg_daily_transactions,
        total_collateral: position.total_collateral_eth,
        unique_tokens: analysis.portfolio_diversity.unique_tokens as f64,
        total_transactions: analysis.activity_frequency.total_transactions as f64,
    }
}
