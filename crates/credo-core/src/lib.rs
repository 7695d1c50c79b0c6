//! # credo-core
//! Foundation types and traits for Credo wallet credit scoring.
//!
//! Raw [`types::Transaction`] records arrive as an explorer API returns
//! them. Every scorer consumes the fixed-order nine-field
//! [`types::FeatureVector`] and produces a clamped [`types::CreditScore`].

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

pub use error::CredoError;
pub use types::{
    CreditScore, FeatureVector, LendingPosition, RawField, ScoreResult, ScorerKind, Transaction,
    TransactionDocument,
};
