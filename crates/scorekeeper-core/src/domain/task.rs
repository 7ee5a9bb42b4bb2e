//! Scoreable task: a canonical answer key with a parsed metric.

use scorekeeper_state::{AnswerMap, TaskId, TaskRecord};

use super::error::{Result, ScorekeeperError};
use super::metric::MetricKind;

/// A task ready for scoring.
///
/// Built from a stored [`TaskRecord`]; building fails with `UnknownMetric`
/// when the stored selector does not name a [`MetricKind`].
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub answer_key: AnswerMap,
    pub metric: MetricKind,
    pub is_active: bool,
}

impl TryFrom<TaskRecord> for Task {
    type Error = ScorekeeperError;

    fn try_from(record: TaskRecord) -> Result<Self> {
        Ok(Self {
            metric: record.metric.parse()?,
            id: record.task_id,
            answer_key: record.answer_key,
            is_active: record.is_active,
        })
    }
}

impl Task {
    /// Score a submission's answers against the canonical key.
    ///
    /// Values are paired by question id, so row order in the submission
    /// does not matter.
    pub fn score(&self, answers: &AnswerMap) -> Result<f64> {
        let (real, predicted) = paired_values(&self.answer_key, answers)?;
        Ok(self.metric.calc(&real, &predicted)?)
    }
}

/// Build `(real, predicted)` vectors by walking the key in question-id order.
///
/// # Errors
///
/// - `MissingAnswer` when a key id has no submitted answer.
/// - `NumericConversion` when either side is not a finite number.
pub fn paired_values(key: &AnswerMap, answers: &AnswerMap) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut real = Vec::with_capacity(key.len());
    let mut predicted = Vec::with_capacity(key.len());
    for (question_id, expected) in key {
        let submitted = answers
            .get(question_id)
            .ok_or_else(|| ScorekeeperError::MissingAnswer {
                question_id: question_id.clone(),
            })?;
        real.push(parse_value(question_id, expected)?);
        predicted.push(parse_value(question_id, submitted)?);
    }
    Ok((real, predicted))
}

fn parse_value(question_id: &str, raw: &str) -> Result<f64> {
    let conversion_error = || ScorekeeperError::NumericConversion {
        question_id: question_id.to_string(),
        value: raw.to_string(),
    };
    let value: f64 = raw.trim().parse().map_err(|_| conversion_error())?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(conversion_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::MetricError;

    fn map(pairs: &[(&str, &str)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn task(metric: &str, key: &[(&str, &str)]) -> Task {
        Task::try_from(TaskRecord::new("t1", "Task", map(key), metric)).unwrap()
    }

    #[test]
    fn unknown_metric_fails_conversion() {
        let record = TaskRecord::new("t1", "Task", AnswerMap::new(), "r2");
        assert!(matches!(
            Task::try_from(record),
            Err(ScorekeeperError::UnknownMetric(_))
        ));
    }

    #[test]
    fn pairing_is_by_id_not_position() {
        let key = map(&[("a", "1"), ("b", "2")]);
        let answers = map(&[("b", "2"), ("a", "1")]);
        let (real, predicted) = paired_values(&key, &answers).unwrap();
        assert_eq!(real, predicted);
    }

    #[test]
    fn perfect_answers_score_zero_mse() {
        let t = task("mse", &[("1", "1"), ("2", "2"), ("3", "3")]);
        let answers = map(&[("3", " 3 "), ("1", "1.0"), ("2", "2")]);
        assert_eq!(t.score(&answers).unwrap(), 0.0);
    }

    #[test]
    fn missing_answer_is_reported() {
        let t = task("mae", &[("1", "1"), ("2", "2")]);
        let answers = map(&[("1", "1"), ("x", "2")]);
        match t.score(&answers) {
            Err(ScorekeeperError::MissingAnswer { question_id }) => assert_eq!(question_id, "2"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_numeric_answer_is_reported() {
        let t = task("mse", &[("1", "1")]);
        match t.score(&map(&[("1", "abc")])) {
            Err(ScorekeeperError::NumericConversion { question_id, value }) => {
                assert_eq!(question_id, "1");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_finite_answer_is_rejected() {
        let t = task("mse", &[("1", "1")]);
        assert!(matches!(
            t.score(&map(&[("1", "NaN")])),
            Err(ScorekeeperError::NumericConversion { .. })
        ));
        assert!(matches!(
            t.score(&map(&[("1", "inf")])),
            Err(ScorekeeperError::NumericConversion { .. })
        ));
    }

    #[test]
    fn metric_errors_propagate() {
        let t = task("mape", &[("1", "0")]);
        assert!(matches!(
            t.score(&map(&[("1", "1")])),
            Err(ScorekeeperError::Metric(MetricError::DivisionByZero { index: 0 }))
        ));
        let empty = task("mse", &[]);
        assert!(matches!(
            empty.score(&AnswerMap::new()),
            Err(ScorekeeperError::Metric(MetricError::EmptySequence))
        ));
    }

    #[test]
    fn scoring_is_deterministic() {
        let t = task("mae", &[("1", "2"), ("2", "4")]);
        let answers = map(&[("1", "1"), ("2", "5")]);
        assert_eq!(t.score(&answers).unwrap(), t.score(&answers).unwrap());
        assert_eq!(t.score(&answers).unwrap(), 1.0);
    }
}
