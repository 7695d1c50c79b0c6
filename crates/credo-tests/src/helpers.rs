//! Shared fixtures for the integration suites.

use chrono::{DateTime, Duration, TimeZone, Utc};
use credo_core::constants::FEATURE_NAMES;
use credo_core::types::Transaction;
use credo_model::Row;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const WEI_PER_ETH: f64 = 1e18;

/// Decoded method name Etherscan reports for an ERC-20 transfer.
pub const TRANSFER_FN: &str = "transfer(address _to, uint256 _value)";

/// Fixed reference clock: 2024-06-01T12:00:00Z.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn ts(now: DateTime<Utc>, days_ago: i64) -> i64 {
    (now - Duration::days(days_ago)).timestamp()
}

/// Native transfer of `eth` to `to`, `days_ago` days before `now`, with
/// Etherscan-style string fields.
pub fn native(to: &str, eth: f64, now: DateTime<Utc>, days_ago: i64) -> Transaction {
    let wei = format!("{}", (eth * WEI_PER_ETH) as u128);
    Transaction::new(to, wei.as_str(), ts(now, days_ago).to_string().as_str())
}

/// Zero-value token transfer call against `contract`.
pub fn token_transfer(contract: &str, now: DateTime<Utc>, days_ago: i64) -> Transaction {
    Transaction::new(contract, "0", ts(now, days_ago)).with_function(TRANSFER_FN)
}

/// Cluster centres in raw feature space: an established borrower, a fresh
/// wallet and a heavily leveraged one.
pub const PROFILES: [Row; 3] = [
    [1.0, 3.0, 10.0, 0.7, 900.0, 0.5, 30.0, 8.0, 400.0],
    [1.0, 1.0, 0.0, 0.1, 30.0, 0.05, 0.0, 1.0, 5.0],
    [0.4, 1.1, 120.0, 0.3, 300.0, 0.2, 48.0, 3.0, 120.0],
];

/// `per_profile` rows around each of [`PROFILES`], each feature jittered by
/// up to ±10%. Rows are grouped by profile, in profile order.
pub fn synthetic_rows(per_profile: usize, seed: u64) -> Vec<Row> {
    let mut rng = StdRng::seed_from_u64(seed);
    PROFILES
        .iter()
        .flat_map(|centre| std::iter::repeat_n(*centre, per_profile))
        .map(|mut row| {
            for v in row.iter_mut() {
                *v *= 1.0 + rng.gen_range(-0.1..0.1);
            }
            row
        })
        .collect()
}

/// Render rows as a training CSV with an extra leading `wallet` column.
pub fn dataset_csv(rows: &[Row]) -> String {
    let mut out = format!("wallet,{}\n", FEATURE_NAMES.join(","));
    for (i, row) in rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&format!("0x{i:040x},{}\n", values.join(",")));
    }
    out
}
