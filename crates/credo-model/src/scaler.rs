//! Per-feature standardization.

use credo_core::constants::FEATURE_COUNT;
use credo_core::error::ModelError;
use credo_core::traits::Scaler;
use serde::{Deserialize, Serialize};

use crate::Row;

/// `(x - mean) / scale`, with a population deviation of 0 replaced by 1.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Row]) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::InvalidParameter("cannot fit scaler on zero rows".into()));
        }
        let n = rows.len() as f64;

        let mut mean = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; FEATURE_COUNT];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row).zip(&mean) {
                *v += (x - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std == 0.0 || !std.is_finite() { 1.0 } else { std }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for (component, len) in [("scaler.mean", self.mean.len()), ("scaler.scale", self.scale.len())] {
            if len != FEATURE_COUNT {
                return Err(ModelError::DimensionMismatch { component, expected: FEATURE_COUNT, got: len });
            }
        }
        if self.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ModelError::Corrupt("scaler has a zero or non-finite scale".into()));
        }
        Ok(())
    }

    pub fn transform_rows(&self, rows: &[Row]) -> Vec<Row> {
        rows.iter().map(|r| self.transform(r)).collect()
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, raw: &Row) -> Row {
        let mut out = *raw;
        for (o, (m, s)) in out.iter_mut().zip(self.mean.iter().zip(&self.scale)) {
            *o = (*o - m) / s;
        }
        out
    }
}
