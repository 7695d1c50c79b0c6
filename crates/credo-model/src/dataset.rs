//! CSV training data in and scored rows out.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use credo_core::constants::FEATURE_NAMES;
use credo_core::error::TrainingError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Row;

/// Feature rows that survived the missing-value filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<Row>,
    /// Records dropped for a missing or unparsable feature.
    pub dropped: usize,
}

/// The nine feature columns; anything that fails to parse reads as missing.
#[derive(Deserialize)]
struct CsvRow {
    #[serde(deserialize_with = "csv::invalid_option")]
    repayment_ratio: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    liquidation_ratio: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    total_borrowed: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    portfolio_diversity: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    account_age_days: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    activity_frequency: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    total_collateral: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    unique_tokens: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    total_transactions: Option<f64>,
}

impl CsvRow {
    fn into_row(self) -> Option<Row> {
        let row = [
            self.repayment_ratio?,
            self.liquidation_ratio?,
            self.total_borrowed?,
            self.portfolio_diversity?,
            self.account_age_days?,
            self.activity_frequency?,
            self.total_collateral?,
            self.unique_tokens?,
            self.total_transactions?,
        ];
        row.iter().all(|v| v.is_finite()).then_some(row)
    }
}

impl Dataset {
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self, TrainingError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TrainingError::Io(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Read a headered CSV. Extra columns are ignored; a missing feature
    /// column is an error. Rows with the wrong field count are dropped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TrainingError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers().map_err(|e| TrainingError::Csv(e.to_string()))?.clone();
        if let Some(missing) = FEATURE_NAMES.iter().find(|name| !headers.iter().any(|h| h == **name)) {
            return Err(TrainingError::Csv(format!("missing column {missing}")));
        }

        let mut dataset = Self::default();
        for (line, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| TrainingError::Csv(e.to_string()))?;
            if record.len() != headers.len() {
                debug!(line = line + 2, fields = record.len(), expected = headers.len(), "dropping ragged row");
                dataset.dropped += 1;
                continue;
            }
            let record: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| TrainingError::Csv(e.to_string()))?;
            match record.into_row() {
                Some(row) => dataset.rows.push(row),
                None => {
                    debug!(line = line + 2, "dropping row with missing feature");
                    dataset.dropped += 1;
                }
            }
        }
        Ok(dataset)
    }
}

/// One training row with its fitted labels and scores.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub repayment_ratio: f64,
    pub liquidation_ratio: f64,
    pub total_borrowed: f64,
    pub portfolio_diversity: f64,
    pub account_age_days: f64,
    pub activity_frequency: f64,
    pub total_collateral: f64,
    pub unique_tokens: f64,
    pub total_transactions: f64,
    pub cluster: usize,
    /// `-1` anomalous, `1` normal.
    pub anomaly: i8,
    pub score_raw: f64,
    /// Rank within the cluster mapped onto `[0, 100]`.
    pub credit_score: f64,
}

impl ScoredRow {
    pub fn new(row: &Row, cluster: usize, anomaly: i8, score_raw: f64, credit_score: f64) -> Self {
        let [
            repayment_ratio,
            liquidation_ratio,
            total_borrowed,
            portfolio_diversity,
            account_age_days,
            activity_frequency,
            total_collateral,
            unique_tokens,
            total_transactions,
        ] = *row;
        Self {
            repayment_ratio,
            liquidation_ratio,
            total_borrowed,
            portfolio_diversity,
            account_age_days,
            activity_frequency,
            total_collateral,
            unique_tokens,
            total_transactions,
            cluster,
            anomaly,
            score_raw,
            credit_score,
        }
    }
}

pub fn write_scored<W: Write>(writer: W, rows: &[ScoredRow]) -> Result<(), TrainingError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(|e| TrainingError::Csv(e.to_string()))?;
    }
    wtr.flush().map_err(|e| TrainingError::Io(e.to_string()))
}

pub fn write_scored_csv(path: impl AsRef<Path>, rows: &[ScoredRow]) -> Result<(), TrainingError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| TrainingError::Io(format!("{}: {e}", path.display())))?;
    write_scored(file, rows)
}
