//! In-process Z3 backend through the `z3` crate.
//!
//! Terms are translated to Z3 ASTs as they are asserted; the Z3 solver
//! object itself is created at `check()`. Without objectives a plain
//! `z3::Solver` is used, otherwise a `z3::Optimize` with one `minimize`
//! per objective and `priority` set to `lex` or `pareto`.
//!
//! The remaining time to the deadline is passed as the `timeout`
//! parameter (milliseconds). When Z3 answers `unknown`, a best-effort model
//! is still read if one is available, which for an interrupted
//! optimization is the best assignment found so far.
//!
//! Requires the `z3` cargo feature.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;
use z3::ast::{Bool, Int};
use z3::SatResult as Z3SatResult;

use super::smtlib::script;
use super::{Model, ObjectiveId, OptimizationPriority, SatResult, Solver, Term};
use crate::error::SolverError;

/// Translated term: either sort.
enum Z3Term {
    Int(Int),
    Bool(Bool),
}

impl Z3Term {
    fn into_int(self) -> Result<Int, SolverError> {
        match self {
            Z3Term::Int(i) => Ok(i),
            Z3Term::Bool(_) => Err(SolverError::SortMismatch("expected Int, got Bool".into())),
        }
    }

    fn into_bool(self) -> Result<Bool, SolverError> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(SolverError::SortMismatch("expected Bool, got Int".into())),
        }
    }
}

/// Z3 linked into the process.
pub struct Z3Solver {
    names: Vec<String>,
    vars: HashMap<String, Int>,
    terms: Vec<Term>,
    asserted: Vec<Bool>,
    objective_terms: Vec<Term>,
    objectives: Vec<Int>,
    priority: OptimizationPriority,
    deadline: Option<Instant>,
    model: Option<HashMap<String, i64>>,
    objective_values: Vec<Option<i64>>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            vars: HashMap::new(),
            terms: Vec::new(),
            asserted: Vec::new(),
            objective_terms: Vec::new(),
            objectives: Vec::new(),
            priority: OptimizationPriority::default(),
            deadline: None,
            model: None,
            objective_values: Vec::new(),
        }
    }

    fn translate(&self, term: &Term) -> Result<Z3Term, SolverError> {
        match term {
            Term::Var(name) => self
                .vars
                .get(name)
                .map(|v| Z3Term::Int(v.clone()))
                .ok_or_else(|| SolverError::UnknownVariable(name.clone())),
            Term::Int(n) => Ok(Z3Term::Int(Int::from_i64(*n))),
            Term::Bool(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            Term::Add(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l + &r))
            }
            Term::Sub(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l - &r))
            }
            Term::Mul(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Int(&l * &r))
            }
            Term::Neg(inner) => {
                let i = self.translate(inner)?.into_int()?;
                Ok(Z3Term::Int(&Int::from_i64(0) - &i))
            }
            Term::Eq(lhs, rhs) => match (self.translate(lhs)?, self.translate(rhs)?) {
                (Z3Term::Int(l), Z3Term::Int(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                (Z3Term::Bool(l), Z3Term::Bool(r)) => Ok(Z3Term::Bool(l.eq(&r))),
                _ => Err(SolverError::SortMismatch(format!("{term}"))),
            },
            Term::Le(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.le(&r)))
            }
            Term::Lt(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.lt(&r)))
            }
            Term::Ge(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.ge(&r)))
            }
            Term::Gt(lhs, rhs) => {
                let (l, r) = self.int_pair(lhs, rhs)?;
                Ok(Z3Term::Bool(l.gt(&r)))
            }
            Term::And(terms) => {
                let bools = self.bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::and(&refs)))
            }
            Term::Or(terms) => {
                let bools = self.bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::or(&refs)))
            }
            Term::Not(inner) => Ok(Z3Term::Bool(self.translate(inner)?.into_bool()?.not())),
            Term::Implies(lhs, rhs) => {
                let l = self.translate(lhs)?.into_bool()?;
                let r = self.translate(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
        }
    }

    fn int_pair(&self, lhs: &Term, rhs: &Term) -> Result<(Int, Int), SolverError> {
        Ok((
            self.translate(lhs)?.into_int()?,
            self.translate(rhs)?.into_int()?,
        ))
    }

    fn bools(&self, terms: &[Term]) -> Result<Vec<Bool>, SolverError> {
        terms
            .iter()
            .map(|t| self.translate(t).and_then(Z3Term::into_bool))
            .collect()
    }

    /// Reads every declared variable and objective out of a Z3 model.
    fn read_model(&mut self, model: &z3::Model) {
        let mut values = HashMap::with_capacity(self.vars.len());
        for (name, var) in &self.vars {
            if let Some(v) = model.eval(var, true).and_then(|v| v.as_i64()) {
                values.insert(name.clone(), v);
            }
        }
        self.objective_values = self
            .objectives
            .iter()
            .map(|obj| model.eval(obj, true).and_then(|v| v.as_i64()))
            .collect();
        self.model = Some(values);
    }

    fn params(&self, timeout_ms: Option<u32>) -> z3::Params {
        let mut params = z3::Params::new();
        if let Some(ms) = timeout_ms {
            params.set_u32("timeout", ms);
        }
        params
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for Z3Solver {
    fn backend_name(&self) -> &'static str {
        "z3"
    }

    fn declare_int(&mut self, name: &str) -> Result<(), SolverError> {
        if self.vars.contains_key(name) {
            return Err(SolverError::DuplicateVariable(name.to_string()));
        }
        self.vars.insert(name.to_string(), Int::new_const(name));
        self.names.push(name.to_string());
        Ok(())
    }

    fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
        let b = self.translate(term)?.into_bool()?;
        self.asserted.push(b);
        self.terms.push(term.clone());
        Ok(())
    }

    fn minimize(&mut self, objective: &Term) -> Result<ObjectiveId, SolverError> {
        let i = self.translate(objective)?.into_int()?;
        self.objectives.push(i);
        self.objective_terms.push(objective.clone());
        Ok(ObjectiveId(self.objectives.len() - 1))
    }

    fn set_priority(&mut self, priority: OptimizationPriority) {
        self.priority = priority;
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    fn check(&mut self) -> Result<SatResult, SolverError> {
        self.model = None;
        self.objective_values.clear();

        let timeout_ms = match self.deadline {
            Some(d) => match d.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => {
                    Some(u32::try_from(left.as_millis().max(1)).unwrap_or(u32::MAX))
                }
                _ => return Ok(SatResult::Unknown("deadline exceeded".into())),
            },
            None => None,
        };
        debug!(
            vars = self.vars.len(),
            assertions = self.asserted.len(),
            objectives = self.objectives.len(),
            ?timeout_ms,
            "z3 check"
        );

        let (verdict, model, reason) = if self.objectives.is_empty() {
            let solver = z3::Solver::new();
            solver.set_params(&self.params(timeout_ms));
            for b in &self.asserted {
                solver.assert(b);
            }
            let verdict = solver.check();
            let model = match verdict {
                Z3SatResult::Unsat => None,
                _ => solver.get_model(),
            };
            let reason = solver.get_reason_unknown();
            (verdict, model, reason)
        } else {
            let opt = z3::Optimize::new();
            let mut params = self.params(timeout_ms);
            let priority = match self.priority {
                OptimizationPriority::Lexicographic => "lex",
                OptimizationPriority::Pareto => "pareto",
            };
            params.set_symbol("priority", priority);
            opt.set_params(&params);
            for b in &self.asserted {
                opt.assert(b);
            }
            for obj in &self.objectives {
                opt.minimize(obj);
            }
            let verdict = opt.check(&[]);
            let model = match verdict {
                Z3SatResult::Unsat => None,
                _ => opt.get_model(),
            };
            let reason = opt.get_reason_unknown();
            (verdict, model, reason)
        };

        if let Some(model) = &model {
            self.read_model(model);
        }
        match verdict {
            Z3SatResult::Sat if self.model.is_none() => {
                Err(SolverError::Process("z3 reported sat without a model".into()))
            }
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => Ok(SatResult::Unknown(
                reason.unwrap_or_else(|| "z3 returned unknown".into()),
            )),
        }
    }

    fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn evaluate(&self, name: &str) -> Result<i64, SolverError> {
        if !self.vars.contains_key(name) {
            return Err(SolverError::UnknownVariable(name.to_string()));
        }
        self.model
            .as_ref()
            .and_then(|m| m.get(name).copied())
            .ok_or(SolverError::NoModel)
    }

    fn model(&self) -> Option<Model> {
        let values = self.model.as_ref()?;
        Some(Model {
            values: values.clone(),
        })
    }

    fn objective_value(&self, id: ObjectiveId) -> Option<i64> {
        self.objective_values.get(id.0).copied().flatten()
    }

    fn assertions(&self) -> Vec<String> {
        let objectives: Vec<&Term> = self.objective_terms.iter().collect();
        script(&self.names, &self.terms, &objectives)
    }
}
