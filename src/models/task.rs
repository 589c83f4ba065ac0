//! Periodic task model.
//!
//! A periodic task releases one instance (job) every `period` time units.
//! Each instance runs for at most `execution` units and must complete within
//! `deadline` units of its nominal release, give or take the tolerated
//! release `jitter`.
//!
//! # Time Representation
//! All times are non-negative integers in a single unit chosen by the
//! consumer (microseconds by convention). Fractional inputs are rounded up
//! at the ingestion boundary, see [`TaskRecord`](super::TaskRecord).
//!
//! # Reference
//! Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//! Hard-Real-Time Environment"

use serde::{Deserialize, Serialize};

/// A periodic real-time task.
///
/// | Field | Symbol | Meaning |
/// |-------|--------|---------|
/// | `period` | T | Nominal inter-release time |
/// | `execution` | C | Worst-case execution time |
/// | `deadline` | D | Relative deadline |
/// | `offset` | O | Release phase |
/// | `jitter` | J | Tolerated release deviation |
/// | `fixed_release` | S | Exact phase, overrides `offset` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicTask {
    /// Unique name within a task set.
    pub name: String,
    /// Period T.
    pub period: u64,
    /// Worst-case execution time C.
    pub execution: u64,
    /// Relative deadline D.
    pub deadline: u64,
    /// Release offset O.
    pub offset: u64,
    /// Tolerated release jitter J.
    pub jitter: u64,
    /// Exact release phase S. `None` = release governed by `offset`.
    pub fixed_release: Option<u64>,
    /// Target core. `None` = unassigned.
    pub core_id: Option<u32>,
    /// Opaque dispatcher handler name, passed through to code generation.
    pub handler_tag: String,
}

impl PeriodicTask {
    /// Creates a task with implicit deadline (`D = T`), zero offset and jitter.
    pub fn new(name: impl Into<String>, period: u64, execution: u64) -> Self {
        Self {
            name: name.into(),
            period,
            execution,
            deadline: period,
            offset: 0,
            jitter: 0,
            fixed_release: None,
            core_id: None,
            handler_tag: String::from("void"),
        }
    }

    /// Sets the relative deadline.
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the release offset.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the tolerated release jitter.
    pub fn with_jitter(mut self, jitter: u64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pins the release phase, overriding the offset.
    pub fn with_fixed_release(mut self, phase: u64) -> Self {
        self.fixed_release = Some(phase);
        self
    }

    /// Assigns the task to a core.
    pub fn with_core(mut self, core_id: u32) -> Self {
        self.core_id = Some(core_id);
        self
    }

    /// Sets the dispatcher handler tag.
    pub fn with_handler(mut self, handler_tag: impl Into<String>) -> Self {
        self.handler_tag = handler_tag.into();
        self
    }

    /// Processor utilization `C / T`.
    ///
    /// Returns 0.0 for a zero period.
    pub fn utilization(&self) -> f64 {
        if self.period == 0 {
            return 0.0;
        }
        self.execution as f64 / self.period as f64
    }

    /// Number of instances released within `hyperperiod`: `floor(H / T)`.
    pub fn instance_count(&self, hyperperiod: u64) -> usize {
        if self.period == 0 {
            return 0;
        }
        (hyperperiod / self.period) as usize
    }

    /// Nominal release of instance `n`: `n·T + S` if the phase is fixed,
    /// otherwise `n·T + O`.
    pub fn nominal_release(&self, n: usize) -> u64 {
        let base = n as u64 * self.period;
        base + self.fixed_release.unwrap_or(self.offset)
    }

    /// Absolute deadline of instance `n`, including tolerated jitter:
    /// `n·T + D + J`.
    pub fn absolute_deadline(&self, n: usize) -> u64 {
        n as u64 * self.period + self.deadline + self.jitter
    }
}

/// Aggregate utilization of a task group in percent: `Σ C/T × 100`.
pub fn utilization_percent<'a, I>(tasks: I) -> f64
where
    I: IntoIterator<Item = &'a PeriodicTask>,
{
    tasks.into_iter().map(PeriodicTask::utilization).sum::<f64>() * 100.0
}
