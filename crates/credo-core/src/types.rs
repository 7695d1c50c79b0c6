//! Core data types: raw transactions, feature vectors and scores.
//!
//! Raw transaction fields are kept loosely typed ([`RawField`]) so that one
//! malformed record never rejects a whole document; interpretation happens in
//! the extractor, record by record.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{FEATURE_COUNT, FEATURE_NAMES, SCORE_MAX, SCORE_MIN, TRANSFER_MARKER};
use crate::error::FeatureError;

/// A loosely typed scalar as it appears in explorer JSON.
///
/// Explorer APIs return numbers as decimal strings, test fixtures use JSON
/// numbers, and anything else is kept verbatim so it can be reported as
/// malformed later.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum RawField {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl RawField {
    /// Interpret as a floating-point number. Non-finite values are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Interpret as an integer.
    ///
    /// Floats truncate toward zero; text must be an integer literal.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Some(f.trunc() as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse::<i64>().ok(),
            Self::Other(_) => None,
        }
    }

    /// Borrow the trimmed text, if the field is a string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.trim()),
            _ => None,
        }
    }

    /// Whether the field is present but carries nothing (empty text, zero,
    /// JSON `false`).
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Text(s) => s.trim().is_empty(),
            Self::Other(v) => v.is_null() || *v == serde_json::Value::Bool(false),
        }
    }
}

impl From<i64> for RawField {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for RawField {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for RawField {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RawField {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

/// A single wallet transaction record.
///
/// Field names follow the Etherscan `txlist` response; unknown fields are
/// ignored. Records are immutable once received.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    /// Recipient address (token contract for token transfers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<RawField>,
    /// Native value transferred, in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<RawField>,
    /// Unix epoch seconds.
    #[serde(rename = "timeStamp", default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<RawField>,
    /// Decoded method signature, e.g. `transfer(address,uint256)`.
    #[serde(rename = "functionName", default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<RawField>,
}

impl Transaction {
    /// Build a record with a recipient, a wei value and a unix timestamp.
    pub fn new(to: &str, value: impl Into<RawField>, time_stamp: impl Into<RawField>) -> Self {
        Self {
            to: Some(to.into()),
            value: Some(value.into()),
            time_stamp: Some(time_stamp.into()),
            function_name: None,
        }
    }

    /// Attach a decoded method signature.
    pub fn with_function(mut self, name: &str) -> Self {
        self.function_name = Some(name.into());
        self
    }

    /// Recipient address, when it is text.
    pub fn recipient(&self) -> Option<&str> {
        self.to.as_ref().and_then(RawField::as_text)
    }

    /// Decoded method name, when it is text.
    pub fn method(&self) -> Option<&str> {
        self.function_name.as_ref().and_then(RawField::as_text)
    }

    /// Whether the decoded method name marks a token transfer.
    pub fn is_transfer_call(&self) -> bool {
        self.method().is_some_and(|name| name.contains(TRANSFER_MARKER))
    }
}

/// A wallet's transaction history as loaded from disk or a request body.
///
/// Accepts either `{"address": ..., "transactions": [...]}` or a bare array.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(from = "DocumentRepr")]
pub struct TransactionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub transactions: Vec<Transaction>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentRepr {
    Bare(Vec<Transaction>),
    Wrapped {
        #[serde(default)]
        address: Option<String>,
        #[serde(default)]
        transactions: Vec<Transaction>,
    },
}

impl From<DocumentRepr> for TransactionDocument {
    fn from(repr: DocumentRepr) -> Self {
        match repr {
            DocumentRepr::Bare(transactions) => Self { address: None, transactions },
            DocumentRepr::Wrapped { address, transactions } => Self { address, transactions },
        }
    }
}

impl TransactionDocument {
    /// Parse a JSON document in either accepted shape.
    pub fn from_json(json: &str) -> Result<Self, FeatureError> {
        serde_json::from_str(json).map_err(|e| FeatureError::MalformedDocument(e.to_string()))
    }
}

/// The nine-dimensional model input, in [`FEATURE_NAMES`] order.
///
/// Missing or `null` fields deserialize as 0.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureVector {
    #[serde(default, deserialize_with = "zero_if_null")]
    pub repayment_ratio: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub liquidation_ratio: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub total_borrowed: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub portfolio_diversity: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub account_age_days: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub activity_frequency: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub total_collateral: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub unique_tokens: f64,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub total_transactions: f64,
}

fn zero_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(d)?.unwrap_or(0.0))
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.repayment_ratio,
            self.liquidation_ratio,
            self.total_borrowed,
            self.portfolio_diversity,
            self.account_age_days,
            self.activity_frequency,
            self.total_collateral,
            self.unique_tokens,
            self.total_transactions,
        ]
    }

    /// Inverse of [`to_array`](Self::to_array).
    pub fn from_array(v: [f64; FEATURE_COUNT]) -> Self {
        Self {
            repayment_ratio: v[0],
            liquidation_ratio: v[1],
            total_borrowed: v[2],
            portfolio_diversity: v[3],
            account_age_days: v[4],
            activity_frequency: v[5],
            total_collateral: v[6],
            unique_tokens: v[7],
            total_transactions: v[8],
        }
    }

    /// Reject NaN and infinite features before they reach a scorer.
    pub fn validate(&self) -> Result<(), FeatureError> {
        for (field, value) in FEATURE_NAMES.iter().zip(self.to_array()) {
            if !value.is_finite() {
                return Err(FeatureError::InvalidValue { field, value });
            }
        }
        Ok(())
    }
}

/// On-chain lending position supplied by an external collaborator.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct LendingPosition {
    #[serde(default)]
    pub total_collateral_eth: f64,
    #[serde(default)]
    pub total_debt_eth: f64,
}

impl LendingPosition {
    /// Share of debt covered by collateral, capped at 1. Defaults to 1 with
    /// no collateral on record.
    pub fn repayment_ratio(&self) -> f64 {
        if self.total_collateral_eth > 0.0 {
            let debt = if self.total_debt_eth != 0.0 { self.total_debt_eth } else { 1.0 };
            (self.total_collateral_eth / debt).min(1.0)
        } else {
            1.0
        }
    }

    /// Collateral-to-debt ratio. Defaults to 1 with no debt.
    pub fn liquidation_ratio(&self) -> f64 {
        if self.total_debt_eth > 0.0 {
            self.total_collateral_eth / self.total_debt_eth
        } else {
            1.0
        }
    }
}

/// A credit score, always within `[SCORE_MIN, SCORE_MAX]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct CreditScore(u16);

impl CreditScore {
    pub const MIN: Self = Self(SCORE_MIN);
    pub const MAX: Self = Self(SCORE_MAX);

    fn clamp_raw(raw: f64) -> f64 {
        if raw.is_nan() {
            return f64::from(SCORE_MIN);
        }
        raw.clamp(f64::from(SCORE_MIN), f64::from(SCORE_MAX))
    }

    /// Clamp, then drop the fractional part.
    pub fn truncated(raw: f64) -> Self {
        Self(Self::clamp_raw(raw).trunc() as u16)
    }

    /// Clamp, then round half away from zero.
    pub fn rounded(raw: f64) -> Self {
        Self(Self::clamp_raw(raw).round() as u16)
    }

    /// Subtract `points`, never going below [`SCORE_MIN`].
    pub fn penalized(self, points: u16) -> Self {
        Self(self.0.saturating_sub(points).max(SCORE_MIN))
    }

    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for CreditScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which scorer produced a [`ScoreResult`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    Model,
    RuleBased,
}

/// Output of one scoring call.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ScoreResult {
    pub credit_score: CreditScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
    pub features_used: FeatureVector,
    pub scorer: ScorerKind,
}
