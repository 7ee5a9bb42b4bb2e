//! Scoring metrics over two parallel numeric sequences.
//!
//! Every metric takes `(real, predicted)` of equal, non-zero length and
//! returns one real number. Tasks select a [`MetricKind`] by its string
//! identifier; the classification metrics are library-only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{MetricError, ScorekeeperError};

/// Regression metrics selectable by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Mean squared error
    Mse,
    /// Mean absolute percentage error (signed, unscaled)
    Mape,
    /// Mean absolute error
    Mae,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::Mse, MetricKind::Mape, MetricKind::Mae];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Mse => "mse",
            MetricKind::Mape => "mape",
            MetricKind::Mae => "mae",
        }
    }

    /// Compute this metric.
    pub fn calc(&self, real: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
        match self {
            MetricKind::Mse => mse(real, predicted),
            MetricKind::Mape => mape(real, predicted),
            MetricKind::Mae => mae(real, predicted),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = ScorekeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mse" => Ok(MetricKind::Mse),
            "mape" => Ok(MetricKind::Mape),
            "mae" => Ok(MetricKind::Mae),
            _ => Err(ScorekeeperError::UnknownMetric(s.to_string())),
        }
    }
}

fn check_lengths(real: &[f64], predicted: &[f64]) -> Result<usize, MetricError> {
    if real.len() != predicted.len() {
        return Err(MetricError::LengthMismatch {
            real: real.len(),
            predicted: predicted.len(),
        });
    }
    if real.is_empty() {
        return Err(MetricError::EmptySequence);
    }
    Ok(real.len())
}

fn finite(value: f64) -> Result<f64, MetricError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MetricError::NonFinite)
    }
}

/// `(1/n) Σ (real_i − predicted_i)²`
pub fn mse(real: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let n = check_lengths(real, predicted)?;
    let sum: f64 = real
        .iter()
        .zip(predicted)
        .map(|(r, p)| (r - p).powi(2))
        .sum();
    finite(sum / n as f64)
}

/// `(1/n) Σ |real_i − predicted_i|`
pub fn mae(real: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let n = check_lengths(real, predicted)?;
    let sum: f64 = real.iter().zip(predicted).map(|(r, p)| (r - p).abs()).sum();
    finite(sum / n as f64)
}

/// `(1/n) Σ (real_i − predicted_i) / real_i`
///
/// Signed and not scaled by 100: over- and under-predictions cancel out.
pub fn mape(real: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
    let n = check_lengths(real, predicted)?;
    let mut sum = 0.0;
    for (index, (r, p)) in real.iter().zip(predicted).enumerate() {
        if *r == 0.0 {
            return Err(MetricError::DivisionByZero { index });
        }
        sum += (r - p) / r;
    }
    finite(sum / n as f64)
}

/// Binary classification metrics over `0.0` / `1.0` labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMetric {
    Accuracy,
    Precision,
    Recall,
    F1,
}

impl ClassificationMetric {
    pub fn calc(&self, real: &[f64], predicted: &[f64]) -> Result<f64, MetricError> {
        let counts = Confusion::count(real, predicted)?;
        Ok(match self {
            ClassificationMetric::Accuracy => counts.accuracy(),
            ClassificationMetric::Precision => counts.precision(),
            ClassificationMetric::Recall => counts.recall(),
            ClassificationMetric::F1 => counts.f1(),
        })
    }
}

#[derive(Debug, Default)]
struct Confusion {
    tp: u64,
    tn: u64,
    fp: u64,
    fn_: u64,
}

fn label(value: f64, index: usize) -> Result<bool, MetricError> {
    if value == 1.0 {
        Ok(true)
    } else if value == 0.0 {
        Ok(false)
    } else {
        Err(MetricError::NonBinaryLabel { index, value })
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Confusion {
    fn count(real: &[f64], predicted: &[f64]) -> Result<Self, MetricError> {
        check_lengths(real, predicted)?;
        let mut c = Confusion::default();
        for (index, (r, p)) in real.iter().zip(predicted).enumerate() {
            match (label(*r, index)?, label(*p, index)?) {
                (true, true) => c.tp += 1,
                (false, false) => c.tn += 1,
                (false, true) => c.fp += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        Ok(c)
    }

    fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.tp + self.tn + self.fp + self.fn_)
    }

    fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}
