//! Rule-based scorer used when no model is available.

use credo_core::constants::BASE_SCORE;
use credo_core::error::ModelError;
use credo_core::traits::CreditScorer;
use credo_core::types::{CreditScore, FeatureVector, ScoreResult, ScorerKind};

/// Bonus caps, in points.
const AGE_CAP: f64 = 150.0;
const BONUS_CAP: f64 = 50.0;
const DIVERSITY_POINTS: f64 = 50.0;

/// Deterministic score from seven of the nine features, clamped to the
/// valid range and truncated.
pub fn fallback_score(f: &FeatureVector) -> CreditScore {
    let mut score = BASE_SCORE;

    score += AGE_CAP.min(f.account_age_days / 10.0);
    score += BONUS_CAP.min(f.activity_frequency * 200.0);
    score += f.portfolio_diversity * DIVERSITY_POINTS;
    score += BONUS_CAP.min(f.total_transactions / 10.0);

    if f.total_collateral > 0.0 {
        score += BONUS_CAP.min(f.total_collateral / 10.0);
    }

    if f.liquidation_ratio > 2.0 {
        score += 30.0;
    } else if f.liquidation_ratio < 1.2 && f.total_borrowed > 0.0 {
        score -= 50.0;
    }

    if f.total_borrowed > 100.0 {
        score -= 20.0;
    }

    CreditScore::truncated(score)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedScorer;

impl CreditScorer for RuleBasedScorer {
    fn score(&self, features: &FeatureVector) -> Result<ScoreResult, ModelError> {
        Ok(ScoreResult {
            credit_score: fallback_score(features),
            cluster: None,
            is_anomaly: None,
            features_used: *features,
            scorer: ScorerKind::RuleBased,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credo_core::constants::{SCORE_MAX, SCORE_MIN};
    use proptest::prelude::*;

    fn fv() -> FeatureVector {
        FeatureVector::default()
    }

    #[test]
    fn all_zero_is_base() {
        assert_eq!(fallback_score(&fv()).value(), 500);
    }

    #[test]
    fn bonuses_are_capped() {
        let f = FeatureVector {
            account_age_days: 10_000.0,
            activity_frequency: 10.0,
            portfolio_diversity: 1.0,
            total_transactions: 5_000.0,
            total_collateral: 9_999.0,
            liquidation_ratio: 3.0,
            ..fv()
        };
        // 500 + 150 + 50 + 50 + 50 + 50 + 30 = 880, clamped.
        assert_eq!(fallback_score(&f).value(), SCORE_MAX);
    }

    #[test]
    fn worked_example_truncates() {
        let f = FeatureVector {
            account_age_days: 365.0,
            activity_frequency: 0.12,
            portfolio_diversity: 0.456,
            total_transactions: 87.0,
            ..fv()
        };
        // 500 + 36.5 + 24 + 22.8 + 8.7 = 592.0
        assert_eq!(fallback_score(&f).value(), 592);

        let f = FeatureVector { account_age_days: 19.0, ..fv() };
        // 501.9 truncates to 501.
        assert_eq!(fallback_score(&f).value(), 501);
    }

    #[test]
    fn risky_leverage_penalized() {
        let f = FeatureVector { liquidation_ratio: 1.1, total_borrowed: 150.0, ..fv() };
        // 500 - 50 - 20
        assert_eq!(fallback_score(&f).value(), 430);
    }

    #[test]
    fn low_ratio_without_debt_not_penalized() {
        let f = FeatureVector { liquidation_ratio: 0.5, total_borrowed: 0.0, ..fv() };
        assert_eq!(fallback_score(&f).value(), 500);
    }

    #[test]
    fn healthy_ratio_bonus() {
        let f = FeatureVector { liquidation_ratio: 2.5, total_borrowed: 10.0, ..fv() };
        assert_eq!(fallback_score(&f).value(), 530);
    }

    #[test]
    fn negative_inputs_clamp_to_min() {
        let f = FeatureVector { account_age_days: -1e9, ..fv() };
        assert_eq!(fallback_score(&f).value(), SCORE_MIN);
    }

    #[test]
    fn scorer_reports_rule_based() {
        let r = RuleBasedScorer.score(&fv()).unwrap();
        assert_eq!(r.scorer, ScorerKind::RuleBased);
        assert_eq!(r.cluster, None);
        assert_eq!(r.is_anomaly, None);
        assert_eq!(r.features_used, fv());
    }

    proptest! {
        #[test]
        fn always_in_range(values in prop::array::uniform9(-1e12f64..1e12)) {
            let s = fallback_score(&FeatureVector::from_array(values)).value();
            prop_assert!((SCORE_MIN..=SCORE_MAX).contains(&s));
        }
    }
}
