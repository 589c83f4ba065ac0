//! Backend-agnostic solver interface.
//!
//! Everything above this module (model building, allocation) talks to a
//! [`Solver`] and never to a concrete backend. Backends:
//!
//! - [`NativeSolver`]: built-in branch-and-propagate search over linear
//!   integer constraints. No external dependencies; complete for bounded
//!   problems, subject to its node budget and deadline.
//! - [`SmtLibProcessSolver`]: drives an external SMT-LIB2 solver
//!   (`z3 -in`, `cvc5`) over stdin/stdout.
//! - `Z3Solver` (cargo feature `z3`): Z3 linked in-process through the
//!   `z3` crate, with `Optimize` for minimization.
//!
//! # Contract
//! - `check()` is tri-state. [`SatResult::Unknown`] means the backend did
//!   not reach a conclusive verdict (deadline, budget, incompleteness); it
//!   is never a synonym for `Unsat`.
//! - `evaluate()` is valid after `Sat`, or after `Unknown` when
//!   [`Solver::has_model`] reports a best-effort candidate.
//! - Optimization is best-effort: an interrupted minimization still
//!   reports `Sat` with the best assignment found.

pub mod linear;
#[cfg(test)]
pub(crate) mod mock;
mod native;
pub mod smtlib;
mod terms;
#[cfg(feature = "z3")]
mod z3_backend;

pub use native::{NativeSolver, SearchStats};
pub use smtlib::SmtLibProcessSolver;
pub use terms::Term;
#[cfg(feature = "z3")]
pub use z3_backend::Z3Solver;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::error::SolverError;

/// Default node budget of the native backend.
pub const DEFAULT_MAX_NODES: u64 = 2_000_000;

/// Result of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    Unknown(String),
}

impl SatResult {
    /// Whether the verdict is `Sat`.
    pub fn is_sat(&self) -> bool {
        matches!(self, SatResult::Sat)
    }
}

/// Handle of a registered minimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectiveId(pub usize);

/// How multiple objectives are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPriority {
    /// Minimize objectives one after another, in registration order.
    #[default]
    Lexicographic,
    /// Pareto-optimal trade-off. Backends without Pareto search fall back
    /// to lexicographic order, whose optimum is Pareto-optimal.
    Pareto,
}

/// Integer assignment extracted from a backend, see [`Solver::model`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    pub values: HashMap<String, i64>,
}

impl Model {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, i64)> for Model {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Abstract solver interface.
pub trait Solver {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Declare a new integer unknown.
    fn declare_int(&mut self, name: &str) -> Result<(), SolverError>;

    /// Assert a boolean formula.
    fn assert(&mut self, term: &Term) -> Result<(), SolverError>;

    /// Register an integer term to minimize.
    fn minimize(&mut self, objective: &Term) -> Result<ObjectiveId, SolverError>;

    /// Set how multiple objectives are combined.
    fn set_priority(&mut self, priority: OptimizationPriority);

    /// Wall-clock limit applied at the `check()` boundary. On expiry the
    /// verdict is `Unknown`.
    fn set_deadline(&mut self, deadline: Option<Instant>);

    /// Check satisfiability of everything asserted so far.
    fn check(&mut self) -> Result<SatResult, SolverError>;

    /// Whether an assignment is available for `evaluate`.
    fn has_model(&self) -> bool;

    /// Value of a declared variable in the current model.
    fn evaluate(&self, name: &str) -> Result<i64, SolverError>;

    /// Snapshot of the current assignment of every declared variable, or
    /// `None` when [`Solver::has_model`] is false.
    fn model(&self) -> Option<Model>;

    /// Achieved value of an objective in the current model.
    fn objective_value(&self, id: ObjectiveId) -> Option<i64>;

    /// The asserted problem as SMT-LIB2 commands.
    fn assertions(&self) -> Vec<String>;
}

/// Solver backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolverBackend {
    /// Built-in search.
    Native {
        /// Search node budget per check.
        #[serde(default = "default_max_nodes")]
        max_nodes: u64,
    },
    /// External SMT-LIB2 process.
    SmtLib {
        /// Executable, e.g. `z3`.
        command: String,
        /// Arguments putting the solver in stdin mode, e.g. `["-in"]`.
        #[serde(default)]
        args: Vec<String>,
    },
    /// Z3 linked in-process.
    #[cfg(feature = "z3")]
    Z3,
}

fn default_max_nodes() -> u64 {
    DEFAULT_MAX_NODES
}

impl Default for SolverBackend {
    fn default() -> Self {
        SolverBackend::Native {
            max_nodes: DEFAULT_MAX_NODES,
        }
    }
}

impl SolverBackend {
    /// Z3 executable reading SMT-LIB2 from stdin.
    pub fn z3_process() -> Self {
        SolverBackend::SmtLib {
            command: "z3".into(),
            args: vec!["-in".into(), "-smt2".into()],
        }
    }

    /// cvc5 reading SMT-LIB2 from stdin.
    pub fn cvc5() -> Self {
        SolverBackend::SmtLib {
            command: "cvc5".into(),
            args: vec!["--lang".into(), "smt2".into(), "--produce-models".into()],
        }
    }

    /// Creates a fresh solver instance.
    ///
    /// Instances are not shared across threads; each group solve creates
    /// its own on the thread that runs it.
    pub fn create(&self) -> Box<dyn Solver> {
        match self {
            SolverBackend::Native { max_nodes } => {
                Box::new(NativeSolver::new().with_max_nodes(*max_nodes))
            }
            SolverBackend::SmtLib { command, args } => {
                Box::new(SmtLibProcessSolver::new(command.clone(), args.clone()))
            }
            #[cfg(feature = "z3")]
            SolverBackend::Z3 => Box::new(Z3Solver::new()),
        }
    }
}
