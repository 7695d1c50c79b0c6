//! Portfolio diversity as an inverted Herfindahl-Hirschman index.
//!
//! Native value and token-transfer interaction counts share one weight map
//! but are never normalized against each other: a wallet moving large native
//! amounts looks concentrated in `ETH` no matter how many token contracts it
//! touches.

use std::collections::BTreeMap;

use credo_core::constants::{DIVERSITY_DECIMALS, NATIVE_TOKEN_KEY};
use serde::{Deserialize, Serialize};

use crate::parse::ParsedTransaction;
use crate::round_dp;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PortfolioDiversity {
    /// `1 - HHI`, rounded to three decimals, in `[0, 1]`.
    pub diversity_score: f64,
    /// Keys carrying non-zero weight.
    pub unique_tokens: usize,
    /// Accumulated weight per key (wei for `ETH`, interaction count otherwise).
    pub token_distribution: BTreeMap<String, f64>,
}

/// Sum of squared shares. `None` when the total weight is not positive.
pub fn herfindahl_index<I>(weights: I) -> Option<f64>
where
    I: IntoIterator<Item = f64> + Clone,
{
    let total: f64 = weights.clone().into_iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    Some(weights.into_iter().map(|w| (w / total).powi(2)).sum())
}

pub fn portfolio_diversity(records: &[ParsedTransaction<'_>]) -> PortfolioDiversity {
    let mut weights: BTreeMap<String, f64> = BTreeMap::new();

    for record in records {
        if record.value_wei > 0.0 {
            *weights.entry(NATIVE_TOKEN_KEY.to_owned()).or_default() += record.value_wei;
        }
        if let Some(key) = record.transfer_key {
            *weights.entry(key.to_owned()).or_default() += 1.0;
        }
    }

    let diversity_score = herfindahl_index(weights.values().copied())
        .map(|hhi| round_dp((1.0 - hhi).clamp(0.0, 1.0), DIVERSITY_DECIMALS))
        .unwrap_or(0.0);

    PortfolioDiversity {
        diversity_score,
        unique_tokens: weights.values().filter(|w| **w != 0.0).count(),
        token_distribution: weights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{SkipDiagnostics, parse_all};
    use credo_core::types::Transaction;
    use proptest::prelude::*;

    const TS: i64 = 1_700_000_000;

    fn diversity_of(txs: &[Transaction]) -> PortfolioDiversity {
        let mut diag = SkipDiagnostics::default();
        portfolio_diversity(&parse_all(txs, &mut diag))
    }

    fn transfer(to: &str) -> Transaction {
        Transaction::new(to, 0, TS).with_function("transfer(address,uint256)")
    }

    #[test]
    fn empty_is_zero() {
        let d = diversity_of(&[]);
        assert_eq!(d, PortfolioDiversity::default());
        assert_eq!(d.diversity_score, 0.0);
        assert_eq!(d.unique_tokens, 0);
        assert!(d.token_distribution.is_empty());
    }

    #[test]
    fn native_only_is_fully_concentrated() {
        let d = diversity_of(&[
            Transaction::new("0xa", "1000000000000000000", TS),
            Transaction::new("0xb", "5", TS),
        ]);
        assert_eq!(d.diversity_score, 0.0);
        assert_eq!(d.unique_tokens, 1);
        assert_eq!(d.token_distribution[NATIVE_TOKEN_KEY], 1e18 + 5.0);
    }

    #[test]
    fn ten_equal_keys_score_point_nine() {
        let txs: Vec<Transaction> = (0..10).map(|i| transfer(&format!("0x{i:02}"))).collect();
        let d = diversity_of(&txs);
        assert_eq!(d.unique_tokens, 10);
        assert_eq!(d.diversity_score, 0.9);
    }

    #[test]
    fn transfers_count_interactions_not_value() {
        let txs = vec![transfer("0xusdt"), transfer("0xusdt"), transfer("0xdai"), transfer("0xdai")];
        let d = diversity_of(&txs);
        assert_eq!(d.token_distribution["0xusdt"], 2.0);
        assert_eq!(d.token_distribution["0xdai"], 2.0);
        assert_eq!(d.diversity_score, 0.5);
    }

    #[test]
    fn valued_transfer_counts_both() {
        // 4 wei of native value plus one interaction on the contract: shares 0.8 / 0.2.
        let tx = Transaction::new("0xrouter", 4, TS).with_function("transferAndCall(address)");
        let d = diversity_of(&[tx]);
        assert_eq!(d.unique_tokens, 2);
        assert_eq!(d.diversity_score, 0.32);
    }

    #[test]
    fn zero_and_negative_values_ignored() {
        let d = diversity_of(&[Transaction::new("0xa", 0, TS), Transaction::new("0xb", -3, TS)]);
        assert_eq!(d.unique_tokens, 0);
        assert_eq!(d.diversity_score, 0.0);
    }

    #[test]
    fn malformed_value_does_not_abort() {
        let d = diversity_of(&[Transaction::new("0xa", "garbage", TS), transfer("0xt"), transfer("0xu")]);
        assert_eq!(d.unique_tokens, 2);
        assert_eq!(d.diversity_score, 0.5);
    }

    #[test]
    fn herfindahl_index_edges() {
        assert_eq!(herfindahl_index(Vec::<f64>::new()), None);
        assert_eq!(herfindahl_index(vec![0.0, 0.0]), None);
        assert_eq!(herfindahl_index(vec![7.0]), Some(1.0));
        assert_eq!(herfindahl_index(vec![1.0, 1.0, 1.0, 1.0]), Some(0.25));
    }

    proptest! {
        #[test]
        fn score_always_in_unit_interval(
            values in prop::collection::vec(0u64..u64::MAX / 4, 0..40),
            contracts in prop::collection::vec(0u8..8, 0..40),
        ) {
            let mut txs: Vec<Transaction> = values
                .iter()
                .map(|v| Transaction::new("0xa", v.to_string().as_str(), TS))
                .collect();
            txs.extend(contracts.iter().map(|c| transfer(&format!("0xc{c}"))));
            let d = diversity_of(&txs);
            prop_assert!((0.0..=1.0).contains(&d.diversity_score));
            prop_assert!(d.unique_tokens <= d.token_distribution.len());
        }

        #[test]
        fn even_spread_matches_closed_form(n in 1usize..60) {
            let txs: Vec<Transaction> = (0..n).map(|i| transfer(&format!("0x{i}"))).collect();
            let d = diversity_of(&txs);
            let expected = round_dp(1.0 - 1.0 / n as f64, DIVERSITY_DECIMALS);
            prop_assert!((d.diversity_score - expected).abs() < 1e-9);
        }
    }
}
