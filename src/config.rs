//! Synthesis configuration.
//!
//! Every field has a default, so a configuration document only needs to
//! name what it changes:
//!
//! ```json
//! {
//!   "wcet_gap": 2,
//!   "optimize": true,
//!   "allocation": { "mode": "automatic", "cores": 2, "utilization_bound": 0.5 },
//!   "timeout_ms": 10000,
//!   "backend": { "kind": "smt_lib", "command": "z3", "args": ["-in"] }
//! }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

pub use crate::allocation::AllocationMode;
use crate::error::SynthesisError;
use crate::solver::{OptimizationPriority, SolverBackend};

/// Parameters of [`synthesize`](crate::scheduler::synthesize).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Guard band enforced between any two executions on a core.
    pub wcet_gap: u64,
    /// Minimize spacing deviation from the nominal period.
    pub optimize: bool,
    /// How deviation objectives are combined.
    pub priority: OptimizationPriority,
    /// Task-to-core mapping.
    pub allocation: AllocationMode,
    /// Wall-clock budget shared by allocation and every group solve.
    pub timeout_ms: Option<u64>,
    /// Solver backend; each group gets a fresh instance.
    pub backend: SolverBackend,
    /// Solve core groups concurrently.
    pub parallel: bool,
    /// Keep each group's SMT-LIB transcript in the report.
    pub transcript: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            wcet_gap: 0,
            optimize: false,
            priority: OptimizationPriority::default(),
            allocation: AllocationMode::default(),
            timeout_ms: None,
            backend: SolverBackend::default(),
            parallel: true,
            transcript: false,
        }
    }
}

impl SynthesisConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, SynthesisError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the guard band.
    pub fn with_wcet_gap(mut self, wcet_gap: u64) -> Self {
        self.wcet_gap = wcet_gap;
        self
    }

    /// Enables or disables optimization.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Sets the objective priority.
    pub fn with_priority(mut self, priority: OptimizationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the allocation mode.
    pub fn with_allocation(mut self, allocation: AllocationMode) -> Self {
        self.allocation = allocation;
        self
    }

    /// Sets the wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    /// Sets the solver backend.
    pub fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Enables or disables concurrent group solves.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enables or disables transcript capture.
    pub fn with_transcript(mut self, transcript: bool) -> Self {
        self.transcript = transcript;
        self
    }

    /// Absolute deadline for a run starting at `start`.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.timeout_ms
            .and_then(|ms| start.checked_add(Duration::from_millis(ms)))
    }
}
