//! Per-record error taxonomy and stage result envelope.
//!
//! A closed enum with a manual `Display` and `std::error::Error` impl.
//! These are carried in `StageOutput::errors`, never returned as `Err` —
//! a stage that hits one of these keeps going and reports it alongside the
//! records it did produce. Fatal, whole-stage failures are `anyhow::Error`
//! and are not represented here.

use std::fmt;

use crate::aps::model::OrderType;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A record's fields fail basic shape checks (missing machine code,
    /// zero quantity, end before start).
    Validation { work_order_nr: String, reason: String },
    /// A record violates a cross-field invariant (e.g. merged duration
    /// would exceed the configured shift duration).
    ConstraintViolation { work_order_nr: String, reason: String },
    /// Two or more records contend for the same machine/time window and
    /// resolution was not possible within the configured iteration budget.
    ResourceConflict { work_order_nr: String, reason: String },
    /// The sequence allocator could not produce a number for this key.
    Allocation {
        order_type: OrderType,
        plan_date: NaiveDate,
        reason: String,
    },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Validation { work_order_nr, reason } => {
                write!(f, "validation error on {}: {}", work_order_nr, reason)
            }
            StageError::ConstraintViolation { work_order_nr, reason } => {
                write!(f, "constraint violation on {}: {}", work_order_nr, reason)
            }
            StageError::ResourceConflict { work_order_nr, reason } => {
                write!(f, "resource conflict on {}: {}", work_order_nr, reason)
            }
            StageError::Allocation {
                order_type,
                plan_date,
                reason,
            } => write!(
                f,
                "sequence allocation failed for {:?}/{}: {}",
                order_type, plan_date, reason
            ),
        }
    }
}

impl std::error::Error for StageError {}

impl StageError {
    pub fn work_order_nr(&self) -> Option<&str> {
        match self {
            StageError::Validation { work_order_nr, .. }
            | StageError::ConstraintViolation { work_order_nr, .. }
            | StageError::ResourceConflict { work_order_nr, .. } => Some(work_order_nr),
            StageError::Allocation { .. } => None,
        }
    }
}

/// Counters a stage reports alongside its output, independent of the
/// individual errors collected. Plain counters, no histogram machinery
/// needed at this granularity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMetrics {
    pub stage: &'static str,
    pub input_count: usize,
    pub output_count: usize,
    /// Total recoverable errors collected, dropped and warned combined.
    pub error_count: usize,
    /// Subset of `error_count` whose record was kept in the output despite
    /// the error (flagged, not dropped). `error_count - warned_count` is
    /// the number of records actually dropped.
    pub warned_count: usize,
    pub elapsed_micros: u64,
}

impl StageMetrics {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Default::default()
        }
    }
}

/// Common result envelope every pipeline stage returns: the records it
/// produced, its metrics, and any recoverable per-record errors. A fatal,
/// whole-stage error is never wrapped here — it is returned directly as
/// `anyhow::Result::Err` from the stage function.
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub records: Vec<T>,
    pub metrics: StageMetrics,
    pub errors: Vec<StageError>,
}

impl<T> StageOutput<T> {
    pub fn new(stage: &'static str, input_count: usize, records: Vec<T>, errors: Vec<StageError>) -> Self {
        Self::with_warnings(stage, input_count, records, errors, 0)
    }

    /// Like `new`, but for stages that keep a record in the output despite
    /// flagging an error on it (e.g. a correction attempt that failed and
    /// was reverted rather than dropped).
    pub fn with_warnings(
        stage: &'static str,
        input_count: usize,
        records: Vec<T>,
        errors: Vec<StageError>,
        warned_count: usize,
    ) -> Self {
        let mut metrics = StageMetrics::new(stage);
        metrics.input_count = input_count;
        metrics.output_count = records.len();
        metrics.error_count = errors.len();
        metrics.warned_count = warned_count;
        Self {
            records,
            metrics,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_include_work_order_nr() {
        let e = StageError::Validation {
            work_order_nr: "W001".into(),
            reason: "quantity is zero".into(),
        };
        assert!(e.to_string().contains("W001"));
        assert!(e.to_string().contains("quantity is zero"));
    }

    #[test]
    fn allocation_error_has_no_work_order_nr() {
        let e = StageError::Allocation {
            order_type: OrderType::Hws,
            plan_date: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            reason: "connection refused".into(),
        };
        assert_eq!(e.work_order_nr(), None);
    }
}
