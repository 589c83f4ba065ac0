//! Task records at the ingestion boundary.
//!
//! Upstream collaborators (CSV readers, configuration tools) hand over
//! loosely-typed rows. [`TaskRecord`] is that row shape; [`TaskRecord::into_task`]
//! coerces it into a [`PeriodicTask`] by rounding every time value up to
//! the next integer unit.
//!
//! Numeric fields are read with [`parse_time_literal`], a strict literal
//! parser: an expression such as `2*PI` or `__import__('os')` is rejected,
//! never evaluated.

use serde::{Deserialize, Serialize};

use super::PeriodicTask;

const DEFAULT_NAME: &str = "a_task";
const DEFAULT_HANDLER: &str = "void";

/// A loosely-typed task row.
///
/// Field order of [`TaskRecord::from_fields`]:
/// `period, execution, deadline, offset, jitter, core_id, fixed_release, name, handler_tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Period T.
    pub period: f64,
    /// Worst-case execution time C.
    pub execution: f64,
    /// Relative deadline D.
    pub deadline: f64,
    /// Release offset O.
    #[serde(default)]
    pub offset: f64,
    /// Tolerated jitter J.
    #[serde(default)]
    pub jitter: f64,
    /// Exact release phase S.
    #[serde(default)]
    pub fixed_release: Option<f64>,
    /// Target core.
    #[serde(default)]
    pub core_id: Option<u32>,
    /// Task name.
    pub name: String,
    /// Dispatcher handler tag.
    #[serde(default = "default_handler")]
    pub handler_tag: String,
}

fn default_handler() -> String {
    DEFAULT_HANDLER.to_string()
}

impl TaskRecord {
    /// Builds a record from raw text fields, applying the leniency policy:
    /// malformed or missing numeric fields become 0, malformed or missing
    /// optional fields become `None`, and a missing name or handler takes
    /// its default.
    pub fn from_fields(fields: &[&str]) -> Self {
        let field = |i: usize| fields.get(i).map(|s| s.trim()).filter(|s| !s.is_empty());
        let number = |i: usize| field(i).and_then(parse_time_literal).unwrap_or(0.0);

        Self {
            period: number(0),
            execution: number(1),
            deadline: number(2),
            offset: number(3),
            jitter: number(4),
            core_id: field(5).and_then(|s| s.parse::<u32>().ok()),
            fixed_release: field(6).and_then(parse_time_literal),
            name: field(7).unwrap_or(DEFAULT_NAME).to_string(),
            handler_tag: field(8).unwrap_or(DEFAULT_HANDLER).to_string(),
        }
    }

    /// Converts to a task, rounding every time value up to an integer unit.
    ///
    /// Negative and non-finite values become 0. The result is not validated;
    /// see [`validate_tasks`](crate::validation::validate_tasks).
    pub fn into_task(self) -> PeriodicTask {
        PeriodicTask {
            name: self.name,
            period: discretize(self.period),
            execution: discretize(self.execution),
            deadline: discretize(self.deadline),
            offset: discretize(self.offset),
            jitter: discretize(self.jitter),
            fixed_release: self.fixed_release.map(discretize),
            core_id: self.core_id,
            handler_tag: self.handler_tag,
        }
    }
}

impl From<TaskRecord> for PeriodicTask {
    fn from(record: TaskRecord) -> Self {
        record.into_task()
    }
}

/// Rounds a time value up to the next integer unit.
pub fn discretize(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let up = value.ceil();
    if up >= u64::MAX as f64 {
        u64::MAX
    } else {
        up as u64
    }
}

/// Parses a numeric time literal, in microseconds.
///
/// Accepted grammar: `[+-]? digits [. digits]? ([eE] [+-]? digits)? unit?`
/// where `unit` is one of `us`, `ms`, `s` (scaled to microseconds).
/// Surrounding whitespace is ignored. Anything else yields `None`.
///
/// # Examples
/// ```
/// use u_cyclic::models::parse_time_literal;
///
/// assert_eq!(parse_time_literal("250"), Some(250.0));
/// assert_eq!(parse_time_literal("1.5ms"), Some(1500.0));
/// assert_eq!(parse_time_literal("2*3"), None);
/// ```
pub fn parse_time_literal(text: &str) -> Option<f64> {
    let text = text.trim();
    let (number, scale) = if let Some(n) = text.strip_suffix("us") {
        (n, 1.0)
    } else if let Some(n) = text.strip_suffix("ms") {
        (n, 1_000.0)
    } else if let Some(n) = text.strip_suffix('s') {
        (n, 1_000_000.0)
    } else {
        (text, 1.0)
    };
    let number = number.trim_end();

    if !is_decimal_literal(number) {
        return None;
    }
    let value: f64 = number.parse().ok()?;
    let scaled = value * scale;
    scaled.is_finite().then_some(scaled)
}

fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac_start;
    }
    if digits == 0 {
        return false;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }

    i == bytes.len()
}
