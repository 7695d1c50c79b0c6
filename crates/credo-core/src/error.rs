//! Error types for Credo.
use thiserror::Error;

/// Why a single transaction record was left out of one of the metrics.
///
/// Skips never abort an analysis; they are tallied in the analyzer's
/// diagnostics instead.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSkip {
    #[error("missing timestamp")] MissingTimestamp,
    #[error("malformed timestamp")] MalformedTimestamp,
    #[error("timestamp out of range")] TimestampOutOfRange,
    #[error("malformed value")] MalformedValue,
    #[error("transfer call without recipient")] MissingRecipient,
    #[error("malformed recipient")] MalformedRecipient,
    #[error("malformed method name")] MalformedMethod,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("invalid value for {field}: {value}")] InvalidValue { field: &'static str, value: f64 },
    #[error("malformed transaction document: {0}")] MalformedDocument(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("model artifacts not loaded")] NotLoaded,
    #[error("I/O: {0}")] Io(String),
    #[error("corrupt model bundle: {0}")] Corrupt(String),
    #[error("dimension mismatch in {component}: expected {expected}, got {got}")] DimensionMismatch { component: &'static str, expected: usize, got: usize },
    #[error("invalid parameter: {0}")] InvalidParameter(String),
    #[error("unsupported bundle format version {0}")] UnsupportedVersion(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainingError {
    #[error("dataset has no usable rows")] EmptyDataset,
    #[error("too few samples: have {have}, need {need}")] TooFewSamples { have: usize, need: usize },
    #[error("csv: {0}")] Csv(String),
    #[error("I/O: {0}")] Io(String),
    #[error(transparent)] Model(#[from] ModelError),
}

#[derive(Error, Debug)]
pub enum CredoError {
    #[error(transparent)] Feature(#[from] FeatureError),
    #[error(transparent)] Model(#[from] ModelError),
    #[error(transparent)] Training(#[from] TrainingError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_converts_into_training_error() {
        let err: TrainingError = ModelError::NotLoaded.into();
        assert_eq!(err, TrainingError::Model(ModelError::NotLoaded));
        assert_eq!(err.to_string(), "model artifacts not loaded");
    }

    #[test]
    fn credo_error_is_transparent() {
        let err: CredoError = FeatureError::MalformedDocument("eof".into()).into();
        assert_eq!(err.to_string(), "malformed transaction document: eof");
    }

    #[test]
    fn dimension_mismatch_message() {
        let err = ModelError::DimensionMismatch { component: "scaler", expected: 9, got: 4 };
        assert_eq!(err.to_string(), "dimension mismatch in scaler: expected 9, got 4");
    }
}
