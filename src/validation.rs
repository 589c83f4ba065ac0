//! Input validation for periodic task sets.
//!
//! Checks the timing parameters of every task before any constraint model
//! is built. Detects:
//! - Zero periods
//! - Execution time exceeding the deadline (`C > D`)
//! - Deadline exceeding the period (`D > T`)
//! - Offset beyond the period (`O > T`)
//! - Fixed release phase beyond the period (`S > T`)
//! - Duplicate task names
//!
//! Violations are always rejected, never clamped.
//!
//! # Reference
//! Buttazzo (2011), "Hard Real-Time Computing Systems", Ch. 4

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::models::PeriodicTask;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Offending task name.
    pub task: String,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    /// Period is zero.
    ZeroPeriod,
    /// `C > D`.
    ExecutionExceedsDeadline,
    /// `D > T`.
    DeadlineExceedsPeriod,
    /// `O > T`.
    OffsetExceedsPeriod,
    /// `S > T`.
    FixedReleaseExceedsPeriod,
    /// Two tasks share the same name.
    DuplicateName,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, task: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            task: task.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Validates a task set.
///
/// Checks, for every task:
/// 1. `T > 0`
/// 2. `C ≤ D`
/// 3. `D ≤ T`
/// 4. `O ≤ T`
/// 5. `S ≤ T` when a fixed release is set
/// 6. The name is unique
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` listing every offending task.
pub fn validate_tasks(tasks: &[PeriodicTask]) -> ValidationResult {
    let mut errors = Vec::new();
    let mut names = HashSet::new();

    for task in tasks {
        if !names.insert(task.name.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateName,
                &task.name,
                format!("Duplicate task name: {}", task.name),
            ));
        }

        if task.period == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::ZeroPeriod,
                &task.name,
                format!("Task '{}' has a zero period", task.name),
            ));
            continue;
        }

        if task.execution > task.deadline {
            errors.push(ValidationError::new(
                ValidationErrorKind::ExecutionExceedsDeadline,
                &task.name,
                format!(
                    "Task '{}': execution {} exceeds deadline {}",
                    task.name, task.execution, task.deadline
                ),
            ));
        }

        if task.deadline > task.period {
            errors.push(ValidationError::new(
                ValidationErrorKind::DeadlineExceedsPeriod,
                &task.name,
                format!(
                    "Task '{}': deadline {} exceeds period {}",
                    task.name, task.deadline, task.period
                ),
            ));
        }

        if task.offset > task.period {
            errors.push(ValidationError::new(
                ValidationErrorKind::OffsetExceedsPeriod,
                &task.name,
                format!(
                    "Task '{}': offset {} exceeds period {}",
                    task.name, task.offset, task.period
                ),
            ));
        }

        if let Some(phase) = task.fixed_release {
            if phase > task.period {
                errors.push(ValidationError::new(
                    ValidationErrorKind::FixedReleaseExceedsPeriod,
                    &task.name,
                    format!(
                        "Task '{}': fixed release {} exceeds period {}",
                        task.name, phase, task.period
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names of the tasks involved in a list of validation errors, deduplicated
/// in first-seen order.
pub fn offending_tasks(errors: &[ValidationError]) -> Vec<&str> {
    let mut seen = HashSet::new();
    errors
        .iter()
        .map(|e| e.task.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}
