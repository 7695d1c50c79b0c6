//! Activity frequency over calendar days (UTC).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use credo_core::constants::{ACTIVITY_WINDOWS_DAYS, AVG_DAILY_DECIMALS};
use serde::{Deserialize, Serialize};

use crate::parse::ParsedTransaction;
use crate::round_dp;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MostActiveDay {
    pub date: NaiveDate,
    pub transaction_count: usize,
}

/// Transactions dated within N calendar days of today, inclusive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityPeriods {
    pub last_7_days: usize,
    pub last_30_days: usize,
    pub last_90_days: usize,
}

impl ActivityPeriods {
    fn count(dates: &[NaiveDate], today: NaiveDate) -> Self {
        let [short, medium, long] = ACTIVITY_WINDOWS_DAYS;
        let within = |days: i64| dates.iter().filter(|d| (today - **d).num_days() <= days).count();
        Self {
            last_7_days: within(short),
            last_30_days: within(medium),
            last_90_days: within(long),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ActivityFrequency {
    pub total_transactions: usize,
    /// Transactions per day over the first-to-last span, two decimals.
    pub avg_daily_transactions: f64,
    /// Busiest day; the earliest such day on ties.
    pub most_active_day: Option<MostActiveDay>,
    pub activity_periods: ActivityPeriods,
}

pub fn activity_frequency(records: &[ParsedTransaction<'_>], now: DateTime<Utc>) -> ActivityFrequency {
    let dates: Vec<NaiveDate> = records
        .iter()
        .filter_map(|r| r.timestamp)
        .map(|ts| ts.date_naive())
        .collect();

    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for date in &dates {
        *per_day.entry(*date).or_default() += 1;
    }

    let (Some((&first, _)), Some((&last, _))) = (per_day.first_key_value(), per_day.last_key_value())
    else {
        return ActivityFrequency::default();
    };

    let total_transactions = dates.len();
    let span_days = (last - first).num_days() + 1;
    let avg_daily_transactions = if span_days > 0 {
        round_dp(total_transactions as f64 / span_days as f64, AVG_DAILY_DECIMALS)
    } else {
        0.0
    };

    // Ascending iteration plus strict comparison keeps the earliest date on ties.
    let mut most_active: Option<MostActiveDay> = None;
    for (&date, &count) in &per_day {
        if most_active.is_none_or(|best| count > best.transaction_count) {
            most_active = Some(MostActiveDay { date, transaction_count: count });
        }
    }

    ActivityFrequency {
        total_transactions,
        avg_daily_transactions,
        most_active_day: most_active,
        activity_periods: ActivityPeriods::count(&dates, now.date_naive()),
    }
}
