//! Account age from the earliest parseable transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parse::ParsedTransaction;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AccountAge {
    /// Whole days between the first transaction and `now`, floored, never negative.
    pub account_age_days: u64,
    /// Earliest parsed timestamp; `None` when no record had one.
    pub first_transaction: Option<DateTime<Utc>>,
}

pub fn account_age(records: &[ParsedTransaction<'_>], now: DateTime<Utc>) -> AccountAge {
    let Some(first) = records.iter().filter_map(|r| r.timestamp).min() else {
        return AccountAge::default();
    };

    let days = (now - first).num_days().max(0);
    AccountAge {
        account_age_days: days as u64,
        first_transaction: Some(first),
    }
}
