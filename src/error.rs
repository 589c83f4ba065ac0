//! Error types.
//!
//! Infeasible (`Unsat`) and indeterminate (`Unknown`) solver verdicts are
//! not errors; they are reported as outcomes. The types here cover invalid
//! input, allocation failure, and backend malfunction.

use thiserror::Error;

use crate::validation::{offending_tasks, ValidationError};

/// Solver backend errors.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("variable declared twice: {0}")]
    DuplicateVariable(String),
    #[error("non-linear term: {0}")]
    NonLinear(String),
    #[error("sort mismatch: {0}")]
    SortMismatch(String),
    #[error("arithmetic overflow: {0}")]
    Overflow(String),
    #[error("unsupported by backend: {0}")]
    Unsupported(String),
    #[error("no model available")]
    NoModel,
    #[error("solver I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("solver process error: {0}")]
    Process(String),
    #[error("failed to parse solver output: {0}")]
    Parse(String),
}

/// Core allocation errors.
///
/// Kept apart from scheduling infeasibility so callers can tell
/// "cannot balance cores" from "cannot fit a schedule".
#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("tasks without a core assignment: {}", .0.join(", "))]
    Unassigned(Vec<String>),
    #[error("core count must be positive")]
    InvalidCoreCount,
    #[error("utilization bound must be in (0, 1], got {0}")]
    InvalidBound(f64),
    #[error("task {task} is pinned to core {core}, but only {cores} cores exist")]
    CoreOutOfRange { task: String, core: u32, cores: u32 },
    #[error("no assignment of tasks to {cores} cores keeps every core at or below utilization {bound}")]
    Infeasible { cores: u32, bound: f64 },
    #[error("core allocation indeterminate: {0}")]
    Indeterminate(String),
    #[error("capacity arithmetic overflow: {0}")]
    Overflow(String),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Top-level synthesis errors.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid task set: {}", describe_invalid(.0))]
    InvalidTaskSet(Vec<ValidationError>),
    #[error("allocation failure: {0}")]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("hyperperiod overflow for core group {0}")]
    HyperperiodOverflow(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

fn describe_invalid(errors: &[ValidationError]) -> String {
    let tasks = offending_tasks(errors).join(", ");
    let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!("[{tasks}] {}", details.join("; "))
}

impl From<Vec<ValidationError>> for SynthesisError {
    fn from(errors: Vec<ValidationError>) -> Self {
        SynthesisError::InvalidTaskSet(errors)
    }
}
