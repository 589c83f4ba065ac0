//! Scripted solver for tests: returns a fixed verdict and, once checked,
//! a fixed assignment.

use std::collections::HashMap;
use std::time::Instant;

use super::{Model, ObjectiveId, OptimizationPriority, SatResult, Solver, Term};
use crate::error::SolverError;

pub(crate) struct MockSolver {
    result: SatResult,
    values: HashMap<String, i64>,
    checked: bool,
    pub(crate) declared: Vec<String>,
    pub(crate) asserted: usize,
    pub(crate) checks: usize,
}

impl MockSolver {
    pub(crate) fn new(result: SatResult) -> Self {
        Self {
            result,
            values: HashMap::new(),
            checked: false,
            declared: Vec::new(),
            asserted: 0,
            checks: 0,
        }
    }

    /// Value reported for `name` after `check()`.
    pub(crate) fn with_value(mut self, name: impl Into<String>, value: i64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub(crate) fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        self.values
            .extend(values.into_iter().map(|(name, v)| (name.into(), v)));
        self
    }
}

impl Solver for MockSolver {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn declare_int(&mut self, name: &str) -> Result<(), SolverError> {
        self.declared.push(name.to_string());
        Ok(())
    }

    fn assert(&mut self, _term: &Term) -> Result<(), SolverError> {
        self.asserted += 1;
        Ok(())
    }

    fn minimize(&mut self, _objective: &Term) -> Result<ObjectiveId, SolverError> {
        Err(SolverError::Unsupported("minimize".into()))
    }

    fn set_priority(&mut self, _priority: OptimizationPriority) {}

    fn set_deadline(&mut self, _deadline: Option<Instant>) {}

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.checks += 1;
        self.checked = true;
        Ok(self.result.clone())
    }

    fn has_model(&self) -> bool {
        self.checked && self.result != SatResult::Unsat && !self.values.is_empty()
    }

    fn evaluate(&self, name: &str) -> Result<i64, SolverError> {
        if !self.has_model() {
            return Err(SolverError::NoModel);
        }
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| SolverError::UnknownVariable(name.to_string()))
    }

    fn model(&self) -> Option<Model> {
        self.has_model().then(|| {
            self.values
                .iter()
                .map(|(name, &v)| (name.clone(), v))
                .collect()
        })
    }

    fn objective_value(&self, _id: ObjectiveId) -> Option<i64> {
        None
    }

    fn assertions(&self) -> Vec<String> {
        Vec::new()
    }
}
