//! Per-record interpretation of raw transaction fields.
//!
//! Each record is parsed exactly once. A field that cannot be interpreted
//! excludes the record from the metrics that need that field and bumps the
//! matching counter in [`SkipDiagnostics`]; the rest of the record is still
//! used.

use chrono::{DateTime, Utc};
use credo_core::error::RecordSkip;
use credo_core::types::{RawField, Transaction};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Count of skipped fields by reason.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipDiagnostics {
    pub missing_timestamp: u64,
    pub malformed_timestamp: u64,
    pub timestamp_out_of_range: u64,
    pub malformed_value: u64,
    pub missing_recipient: u64,
    pub malformed_recipient: u64,
    pub malformed_method: u64,
}

impl SkipDiagnostics {
    pub fn record(&mut self, reason: RecordSkip) {
        let slot = match reason {
            RecordSkip::MissingTimestamp => &mut self.missing_timestamp,
            RecordSkip::MalformedTimestamp => &mut self.malformed_timestamp,
            RecordSkip::TimestampOutOfRange => &mut self.timestamp_out_of_range,
            RecordSkip::MalformedValue => &mut self.malformed_value,
            RecordSkip::MissingRecipient => &mut self.missing_recipient,
            RecordSkip::MalformedRecipient => &mut self.malformed_recipient,
            RecordSkip::MalformedMethod => &mut self.malformed_method,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn count(&self, reason: RecordSkip) -> u64 {
        match reason {
            RecordSkip::MissingTimestamp => self.missing_timestamp,
            RecordSkip::MalformedTimestamp => self.malformed_timestamp,
            RecordSkip::TimestampOutOfRange => self.timestamp_out_of_range,
            RecordSkip::MalformedValue => self.malformed_value,
            RecordSkip::MissingRecipient => self.missing_recipient,
            RecordSkip::MalformedRecipient => self.malformed_recipient,
            RecordSkip::MalformedMethod => self.malformed_method,
        }
    }

    /// Records without a usable timestamp, for any reason.
    pub fn timestamp_skips(&self) -> u64 {
        self.missing_timestamp + self.malformed_timestamp + self.timestamp_out_of_range
    }

    pub fn total(&self) -> u64 {
        self.timestamp_skips()
            + self.malformed_value
            + self.missing_recipient
            + self.malformed_recipient
            + self.malformed_method
    }
}

/// A transaction with its fields interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTransaction<'a> {
    pub raw: &'a Transaction,
    /// `None` when the timestamp was missing or unusable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Native value in wei; 0 when missing or malformed.
    pub value_wei: f64,
    /// Token key for a transfer call, if this record is one and names a recipient.
    pub transfer_key: Option<&'a str>,
}

/// Interpret a `timeStamp` field as unix seconds.
///
/// Absent, empty and zero timestamps are all treated as missing.
pub fn parse_timestamp(field: Option<&RawField>) -> Result<DateTime<Utc>, RecordSkip> {
    let field = match field {
        Some(f) if !f.is_blank() => f,
        _ => return Err(RecordSkip::MissingTimestamp),
    };
    let secs = field.as_i64().ok_or(RecordSkip::MalformedTimestamp)?;
    DateTime::from_timestamp(secs, 0).ok_or(RecordSkip::TimestampOutOfRange)
}

/// Interpret a `value` field as wei. An absent value is 0.
pub fn parse_value(field: Option<&RawField>) -> Result<f64, RecordSkip> {
    match field {
        None => Ok(0.0),
        Some(f) => f.as_f64().ok_or(RecordSkip::MalformedValue),
    }
}

/// Interpret an optional text field. A present non-text value is `reason`.
fn parse_text(field: Option<&RawField>, reason: RecordSkip) -> Result<Option<&str>, RecordSkip> {
    match field {
        None => Ok(None),
        Some(f) => f.as_text().map(Some).ok_or(reason),
    }
}

/// Parse every record once, tallying skips into `diagnostics`.
pub fn parse_all<'a>(
    transactions: &'a [Transaction],
    diagnostics: &mut SkipDiagnostics,
) -> Vec<ParsedTransaction<'a>> {
    transactions
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            let timestamp = match parse_timestamp(raw.time_stamp.as_ref()) {
                Ok(ts) => Some(ts),
                Err(reason) => {
                    trace!(index, %reason, "skipping timestamp");
                    diagnostics.record(reason);
                    None
                }
            };

            let value_wei = parse_value(raw.value.as_ref()).unwrap_or_else(|reason| {
                trace!(index, %reason, "treating value as zero");
                diagnostics.record(reason);
                0.0
            });

            let mut text = |field: Option<&'a RawField>, reason: RecordSkip| {
                parse_text(field, reason).unwrap_or_else(|reason| {
                    trace!(index, %reason, "ignoring non-text field");
                    diagnostics.record(reason);
                    None
                })
            };
            text(raw.function_name.as_ref(), RecordSkip::MalformedMethod);
            let recipient = text(raw.to.as_ref(), RecordSkip::MalformedRecipient);

            let transfer_key = match recipient {
                _ if !raw.is_transfer_call() => None,
                Some(to) if !to.is_empty() => Some(to),
                // A non-text recipient is already tallied.
                None if raw.to.is_some() => None,
                _ => {
                    trace!(index, "transfer call without recipient");
                    diagnostics.record(RecordSkip::MissingRecipient);
                    None
                }
            };

            ParsedTransaction { raw, timestamp, value_wei, transfer_key }
        })
        .collect()
}
