//! Built-in finite-domain integer backend.
//!
//! Solves conjunctions of clauses over linear atoms `Σ aᵢ·xᵢ + c ≤ 0`
//! by depth-first branch-and-propagate search.
//!
//! # Algorithm
//! 1. **Propagation**: bounds consistency over every clause. A clause
//!    whose atoms are all infeasible under the current bounds is a
//!    conflict; a clause with a single feasible atom forces that atom,
//!    which tightens variable bounds.
//! 2. **Candidate**: the lower-bound assignment `xᵢ = loᵢ`. If it
//!    satisfies every clause, it is the model.
//! 3. **Branching**: on the violated disjunction touching the earliest
//!    variables, one child per feasible atom (atom `k` plus the negation of
//!    atoms `0..k`), ordered by how close each atom is to holding.
//!    Violated single-atom clauses split a variable domain instead.
//!
//! Every branch strictly shrinks a domain, so the search is complete for
//! bounded problems. The node budget and deadline turn an unfinished
//! search into `Unknown`.
//!
//! Optimization tightens each objective (`obj ≤ best − 1`) until the
//! tightened problem is infeasible, then fixes `obj ≤ best` and moves on to
//! the next objective. Pareto priority is served lexicographically.
//!
//! # Complexity
//! Worst case exponential in the number of disjunctions; propagation is
//! O(atoms) per bound change.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use super::linear::{to_clauses, Atom, Clause, LinExpr};
use super::smtlib;
use super::{
    Model, ObjectiveId, OptimizationPriority, SatResult, Solver, Term, DEFAULT_MAX_NODES,
};
use crate::error::SolverError;

/// Domain bound of declared variables: `[−2⁴⁰, 2⁴⁰]`.
pub const DOMAIN_LIMIT: i64 = 1 << 40;

/// Bound-change steps allowed within one propagation pass.
const MAX_PROPAGATION_STEPS: u64 = 1_000_000;

/// Counters accumulated over the last `check()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Search nodes expanded.
    pub nodes: u64,
    /// Dead ends (propagation conflicts).
    pub conflicts: u64,
    /// Improving solutions found during optimization.
    pub improvements: u64,
}

/// Built-in branch-and-propagate solver.
#[derive(Debug, Clone)]
pub struct NativeSolver {
    names: Vec<String>,
    index: HashMap<String, usize>,
    terms: Vec<Term>,
    clauses: Vec<Clause>,
    objectives: Vec<(Term, LinExpr)>,
    priority: OptimizationPriority,
    deadline: Option<Instant>,
    max_nodes: u64,
    model: Option<Vec<i64>>,
    stats: SearchStats,
}

impl Default for NativeSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeSolver {
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            index: HashMap::new(),
            terms: Vec::new(),
            clauses: Vec::new(),
            objectives: Vec::new(),
            priority: OptimizationPriority::default(),
            deadline: None,
            max_nodes: DEFAULT_MAX_NODES,
            model: None,
            stats: SearchStats::default(),
        }
    }

    /// Sets the node budget of one `check()`.
    pub fn with_max_nodes(mut self, max_nodes: u64) -> Self {
        self.max_nodes = max_nodes.max(1);
        self
    }

    /// Counters of the last `check()`.
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    fn root_domain(&self) -> Domain {
        Domain {
            lo: vec![-DOMAIN_LIMIT; self.names.len()],
            hi: vec![DOMAIN_LIMIT; self.names.len()],
        }
    }

    fn search(&mut self, clauses: &[Clause]) -> Result<Outcome, SolverError> {
        let mut search = Search::new(clauses, self.names.len(), self.deadline, self.max_nodes);
        search.nodes = self.stats.nodes;
        let outcome = search.run(self.root_domain());
        self.stats.nodes = search.nodes;
        self.stats.conflicts += search.conflicts;
        outcome
    }

    /// Iterative objective tightening starting from a satisfying model.
    fn optimize(&mut self, mut incumbent: Vec<i64>) -> Result<Vec<i64>, SolverError> {
        let mut working = self.clauses.clone();
        let objectives: Vec<LinExpr> = self.objectives.iter().map(|(_, e)| e.clone()).collect();

        for (k, objective) in objectives.iter().enumerate() {
            let mut best = objective.eval(&incumbent);
            loop {
                // objective ≤ best − 1
                let bound = bounded(objective, best - 1)?;
                working.push(vec![bound]);
                let outcome = self.search(&working)?;
                working.pop();
                match outcome {
                    Outcome::Found(values) => {
                        best = objective.eval(&values);
                        incumbent = values;
                        self.stats.improvements += 1;
                        debug!(objective = k, best = %best, "objective improved");
                    }
                    Outcome::Infeasible => {
                        working.push(vec![bounded(objective, best)?]);
                        debug!(objective = k, optimum = %best, "objective converged");
                        break;
                    }
                    Outcome::Exhausted(reason) => {
                        debug!(objective = k, best = %best, reason = %reason, "optimization interrupted");
                        return Ok(incumbent);
                    }
                }
            }
        }
        Ok(incumbent)
    }
}

/// Atom `expr − bound ≤ 0`.
fn bounded(expr: &LinExpr, bound: i128) -> Result<Atom, SolverError> {
    let bound = i64::try_from(bound)
        .map_err(|_| SolverError::Overflow(format!("objective bound {bound}")))?;
    let shifted = bound
        .checked_neg()
        .ok_or_else(|| SolverError::Overflow(format!("objective bound {bound}")))?;
    Ok(Atom::le_zero(expr.offset(shifted)?))
}

impl Solver for NativeSolver {
    fn backend_name(&self) -> &'static str {
        "native"
    }

    fn declare_int(&mut self, name: &str) -> Result<(), SolverError> {
        if self.index.contains_key(name) {
            return Err(SolverError::DuplicateVariable(name.to_string()));
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
        Ok(())
    }

    fn assert(&mut self, term: &Term) -> Result<(), SolverError> {
        let clauses = to_clauses(term, true, &self.index)?;
        self.clauses.extend(clauses);
        self.terms.push(term.clone());
        Ok(())
    }

    fn minimize(&mut self, objective: &Term) -> Result<ObjectiveId, SolverError> {
        let expr = super::linear::linearize(objective, &self.index)?;
        self.objectives.push((objective.clone(), expr));
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
        self.stats = SearchStats::default();

        let clauses = self.clauses.clone();
        match self.search(&clauses)? {
            Outcome::Infeasible => Ok(SatResult::Unsat),
            Outcome::Exhausted(reason) => Ok(SatResult::Unknown(reason)),
            Outcome::Found(values) => {
                let values = if self.objectives.is_empty() {
                    values
                } else {
                    if self.priority == OptimizationPriority::Pareto {
                        debug!("pareto priority served lexicographically");
                    }
                    self.optimize(values)?
                };
                self.model = Some(values);
                Ok(SatResult::Sat)
            }
        }
    }

    fn has_model(&self) -> bool {
        self.model.is_some()
    }

    fn evaluate(&self, name: &str) -> Result<i64, SolverError> {
        let model = self.model.as_ref().ok_or(SolverError::NoModel)?;
        let &i = self
            .index
            .get(name)
            .ok_or_else(|| SolverError::UnknownVariable(name.to_string()))?;
        Ok(model[i])
    }

    fn model(&self) -> Option<Model> {
        let values = self.model.as_ref()?;
        Some(self.names.iter().cloned().zip(values.iter().copied()).collect())
    }

    fn objective_value(&self, id: ObjectiveId) -> Option<i64> {
        let model = self.model.as_ref()?;
        let (_, expr) = self.objectives.get(id.0)?;
        i64::try_from(expr.eval(model)).ok()
    }

    fn assertions(&self) -> Vec<String> {
        let objectives: Vec<&Term> = self.objectives.iter().map(|(t, _)| t).collect();
        smtlib::script(&self.names, &self.terms, &objectives)
    }
}

// ======================== Search ========================

#[derive(Debug, Clone)]
struct Domain {
    lo: Vec<i64>,
    hi: Vec<i64>,
}

struct Node {
    domain: Domain,
    forced: Vec<Atom>,
}

enum Outcome {
    Found(Vec<i64>),
    Infeasible,
    Exhausted(String),
}

enum Propagation {
    Consistent,
    Conflict,
    Exhausted,
}

enum Branch {
    /// Feasible atoms of a violated clause, most promising first.
    Disjunction(Vec<Atom>),
    /// `x ≥ at` first, then `x ≤ at − 1`.
    Split { var: usize, at: i64 },
}

enum Status {
    Satisfied,
    Conflict,
    Unit(usize),
    Open,
}

struct Search<'a> {
    clauses: &'a [Clause],
    occurrences: Vec<Vec<usize>>,
    deadline: Option<Instant>,
    max_nodes: u64,
    nodes: u64,
    conflicts: u64,
}

impl<'a> Search<'a> {
    fn new(clauses: &'a [Clause], vars: usize, deadline: Option<Instant>, max_nodes: u64) -> Self {
        let mut occurrences = vec![Vec::new(); vars];
        for (ci, clause) in clauses.iter().enumerate() {
            for atom in clause {
                for &(v, _) in &atom.expr.coeffs {
                    if occurrences[v].last() != Some(&ci) {
                        occurrences[v].push(ci);
                    }
                }
            }
        }
        Self {
            clauses,
            occurrences,
            deadline,
            max_nodes,
            nodes: 0,
            conflicts: 0,
        }
    }

    fn run(&mut self, root: Domain) -> Result<Outcome, SolverError> {
        let mut stack = vec![Node {
            domain: root,
            forced: Vec::new(),
        }];

        while let Some(Node { mut domain, forced }) = stack.pop() {
            self.nodes += 1;
            if self.nodes > self.max_nodes {
                return Ok(Outcome::Exhausted(format!(
                    "node budget of {} exhausted",
                    self.max_nodes
                )));
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(Outcome::Exhausted("deadline exceeded".into()));
            }

            match self.propagate(&mut domain, &forced) {
                Propagation::Conflict => {
                    self.conflicts += 1;
                    continue;
                }
                Propagation::Exhausted => {
                    return Ok(Outcome::Exhausted("propagation step limit reached".into()));
                }
                Propagation::Consistent => {}
            }

            let values = domain.lo.clone();
            match self.choose_branch(&domain, &forced, &values) {
                None => return Ok(Outcome::Found(values)),
                Some(Branch::Disjunction(atoms)) => {
                    // Pushed in reverse so that child 0 is expanded first.
                    for k in (0..atoms.len()).rev() {
                        let mut child = forced.clone();
                        child.push(atoms[k].clone());
                        for failed in &atoms[..k] {
                            child.push(failed.negate()?);
                        }
                        stack.push(Node {
                            domain: domain.clone(),
                            forced: child,
                        });
                    }
                }
                Some(Branch::Split { var, at }) => {
                    let mut below = domain.clone();
                    below.hi[var] = at - 1;
                    stack.push(Node {
                        domain: below,
                        forced: forced.clone(),
                    });
                    let mut above = domain;
                    above.lo[var] = at;
                    stack.push(Node {
                        domain: above,
                        forced,
                    });
                }
            }
        }
        Ok(Outcome::Infeasible)
    }

    /// Bounds propagation to a fixpoint over base clauses and forced atoms.
    fn propagate(&self, domain: &mut Domain, forced: &[Atom]) -> Propagation {
        let base = self.clauses.len();
        let total = base + forced.len();

        let mut forced_occ: Vec<Vec<usize>> = vec![Vec::new(); domain.lo.len()];
        for (k, atom) in forced.iter().enumerate() {
            for &(v, _) in &atom.expr.coeffs {
                forced_occ[v].push(base + k);
            }
        }

        let mut queued = vec![true; total];
        let mut queue: Vec<usize> = (0..total).rev().collect();
        let mut changed = Vec::new();
        let mut steps = 0u64;

        while let Some(ci) = queue.pop() {
            queued[ci] = false;
            steps += 1;
            if steps > MAX_PROPAGATION_STEPS {
                return Propagation::Exhausted;
            }

            let atoms: &[Atom] = if ci < base {
                &self.clauses[ci]
            } else {
                std::slice::from_ref(&forced[ci - base])
            };

            match status(atoms, domain) {
                Status::Satisfied | Status::Open => {}
                Status::Conflict => return Propagation::Conflict,
                Status::Unit(k) => {
                    changed.clear();
                    if !tighten(&atoms[k], domain, &mut changed) {
                        return Propagation::Conflict;
                    }
                    for &v in &changed {
                        for &other in self.occurrences[v].iter().chain(&forced_occ[v]) {
                            if !queued[other] {
                                queued[other] = true;
                                queue.push(other);
                            }
                        }
                    }
                }
            }
        }
        Propagation::Consistent
    }

    fn choose_branch(&self, domain: &Domain, forced: &[Atom], values: &[i64]) -> Option<Branch> {
        let all = self
            .clauses
            .iter()
            .map(Vec::as_slice)
            .chain(forced.iter().map(std::slice::from_ref));

        let mut best: Option<(i64, Vec<&Atom>)> = None;
        let mut unit: Option<&Atom> = None;

        for atoms in all {
            if atoms.iter().any(|a| a.holds(values)) {
                continue;
            }
            let live: Vec<&Atom> = atoms.iter().filter(|a| min_value(a, domain) <= 0).collect();
            match live.len() {
                0 => {}
                1 => {
                    if unit.is_none() {
                        unit = Some(live[0]);
                    }
                }
                _ => {
                    let key = live
                        .iter()
                        .flat_map(|a| a.expr.coeffs.iter().map(|&(v, _)| domain.lo[v]))
                        .min()
                        .unwrap_or(i64::MAX);
                    if best.as_ref().map_or(true, |(k, _)| key < *k) {
                        best = Some((key, live));
                    }
                }
            }
        }

        if let Some((_, mut live)) = best {
            live.sort_by_key(|a| a.expr.eval(values));
            return Some(Branch::Disjunction(live.into_iter().cloned().collect()));
        }
        unit.and_then(|atom| split_for(atom, domain, values))
    }
}

/// Domain split that moves the lower-bound assignment towards `atom`.
fn split_for(atom: &Atom, domain: &Domain, values: &[i64]) -> Option<Branch> {
    let violation = atom.expr.eval(values);
    let (var, coeff) = atom
        .expr
        .coeffs
        .iter()
        .rev()
        .copied()
        .find(|&(v, a)| a < 0 && domain.lo[v] < domain.hi[v])
        .or_else(|| {
            atom.expr
                .coeffs
                .iter()
                .rev()
                .copied()
                .find(|&(v, _)| domain.lo[v] < domain.hi[v])
        })?;

    let (lo, hi) = (domain.lo[var] as i128, domain.hi[var] as i128);
    let at = if coeff < 0 {
        (lo + div_ceil(violation, -(coeff as i128))).min(hi)
    } else {
        lo + (hi - lo + 1) / 2
    };
    Some(Branch::Split {
        var,
        at: at as i64,
    })
}

fn min_term(a: i64, lo: i64, hi: i64) -> i128 {
    if a > 0 {
        a as i128 * lo as i128
    } else {
        a as i128 * hi as i128
    }
}

fn max_term(a: i64, lo: i64, hi: i64) -> i128 {
    if a > 0 {
        a as i128 * hi as i128
    } else {
        a as i128 * lo as i128
    }
}

fn min_value(atom: &Atom, domain: &Domain) -> i128 {
    atom.expr
        .coeffs
        .iter()
        .map(|&(v, a)| min_term(a, domain.lo[v], domain.hi[v]))
        .sum::<i128>()
        + atom.expr.constant as i128
}

fn max_value(atom: &Atom, domain: &Domain) -> i128 {
    atom.expr
        .coeffs
        .iter()
        .map(|&(v, a)| max_term(a, domain.lo[v], domain.hi[v]))
        .sum::<i128>()
        + atom.expr.constant as i128
}

fn status(atoms: &[Atom], domain: &Domain) -> Status {
    let mut live = None;
    let mut count = 0;
    for (k, atom) in atoms.iter().enumerate() {
        if max_value(atom, domain) <= 0 {
            return Status::Satisfied;
        }
        if min_value(atom, domain) <= 0 {
            count += 1;
            live = Some(k);
        }
    }
    match (count, live) {
        (0, _) => Status::Conflict,
        (1, Some(k)) => Status::Unit(k),
        _ => Status::Open,
    }
}

/// Enforces `atom` on the domain. Returns `false` on an empty domain.
fn tighten(atom: &Atom, domain: &mut Domain, changed: &mut Vec<usize>) -> bool {
    let total = min_value(atom, domain);
    if total > 0 {
        return false;
    }
    for &(v, a) in &atom.expr.coeffs {
        let rest = total - min_term(a, domain.lo[v], domain.hi[v]);
        // a·x ≤ −rest
        let bound = -rest;
        let a = a as i128;
        if a > 0 {
            let new_hi = div_floor(bound, a);
            if new_hi < domain.hi[v] as i128 {
                domain.hi[v] = new_hi.max(i64::MIN as i128) as i64;
                changed.push(v);
            }
        } else {
            let new_lo = div_ceil(bound, a);
            if new_lo > domain.lo[v] as i128 {
                domain.lo[v] = new_lo.min(i64::MAX as i128) as i64;
                changed.push(v);
            }
        }
        if domain.lo[v] > domain.hi[v] {
            return false;
        }
    }
    true
}

fn div_floor(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) == (b < 0)) {
        q + 1
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn x() -> Term {
        Term::var("x")
    }

    fn y() -> Term {
        Term::var("y")
    }

    fn solver_xy() -> NativeSolver {
        let mut s = NativeSolver::new();
        s.declare_int("x").unwrap();
        s.declare_int("y").unwrap();
        s
    }

    #[test]
    fn test_division_rounding() {
        assert_eq!(div_floor(7, 2), 3);
        assert_eq!(div_floor(-7, 2), -4);
        assert_eq!(div_ceil(7, 2), 4);
        assert_eq!(div_ceil(-7, 2), -3);
        assert_eq!(div_ceil(7, -2), -3);
        assert_eq!(div_floor(6, 3), 2);
    }

    #[test]
    fn test_simple_sat() {
        let mut s = solver_xy();
        s.assert(&x().between(Term::int(0), Term::int(10))).unwrap();
        s.assert(&y().between(Term::int(0), Term::int(10))).unwrap();
        s.assert(&x().add(y()).eq(Term::int(7))).unwrap();
        s.assert(&y().ge(Term::int(3))).unwrap();
        assert_eq!(s.check().unwrap(), SatResult::Sat);

        let (xv, yv) = (s.evaluate("x").unwrap(), s.evaluate("y").unwrap());
        assert_eq!(xv + yv, 7);
        assert!(yv >= 3 && (0..=10).contains(&xv));

        let model = s.model().unwrap();
        assert_eq!(model.len(), 2);
        assert_eq!((model.get("x"), model.get("y")), (Some(xv), Some(yv)));
    }

    #[test]
    fn test_simple_unsat() {
        let mut s = solver_xy();
        s.assert(&x().ge(Term::int(0))).unwrap();
        s.assert(&y().ge(Term::int(0))).unwrap();
        s.assert(&x().add(y()).le(Term::int(-1))).unwrap();
        assert_eq!(s.check().unwrap(), SatResult::Unsat);
        assert!(!s.has_model());
        assert!(s.model().is_none());
        assert!(matches!(s.evaluate("x"), Err(SolverError::NoModel)));
    }

    #[test]
    fn test_disjunctive_packing() {
        // Three unit jobs of length 3 on [0, 9) must be packed back to back.
        let mut s = NativeSolver::new();
        let names = ["a", "b", "c"];
        for n in names {
            s.declare_int(n).unwrap();
            s.assert(&Term::var(n).between(Term::int(0), Term::int(6))).unwrap();
        }
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                s.assert(&Term::or(vec![
                    Term::var(*a).add(Term::int(3)).le(Term::var(*b)),
                    Term::var(*a).ge(Term::var(*b).add(Term::int(3))),
                ]))
                .unwrap();
            }
        }
        assert_eq!(s.check().unwrap(), SatResult::Sat);

        let mut starts: Vec<i64> = names.iter().map(|n| s.evaluate(n).unwrap()).collect();
        starts.sort();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn test_disjunctive_overload_is_unsat() {
        let mut s = solver_xy();
        s.assert(&x().between(Term::int(0), Term::int(3))).unwrap();
        s.assert(&y().between(Term::int(0), Term::int(3))).unwrap();
        s.assert(&Term::or(vec![
            x().add(Term::int(4)).le(y()),
            y().add(Term::int(4)).le(x()),
        ]))
        .unwrap();
        assert_eq!(s.check().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_domain_split_for_two_sided_atom() {
        // x ≤ y + z with x forced to 5: needs y + z ≥ 5
        let mut s = NativeSolver::new();
        for n in ["x", "y", "z"] {
            s.declare_int(n).unwrap();
            s.assert(&Term::var(n).between(Term::int(0), Term::int(10))).unwrap();
        }
        s.assert(&x().eq(Term::int(5))).unwrap();
        s.assert(&x().le(y().add(Term::var("z")))).unwrap();
        assert_eq!(s.check().unwrap(), SatResult::Sat);
        let sum = s.evaluate("y").unwrap() + s.evaluate("z").unwrap();
        assert!(sum >= 5);
    }

    #[test]
    fn test_minimize_absolute_deviation() {
        // d ≥ |x − 7| with x ∈ [0, 5]: optimum d = 2 at x = 5
        let mut s = NativeSolver::new();
        s.declare_int("x").unwrap();
        s.declare_int("d").unwrap();
        s.assert(&x().between(Term::int(0), Term::int(5))).unwrap();
        s.assert(&Term::var("d").ge(x().sub(Term::int(7)))).unwrap();
        s.assert(&Term::var("d").ge(Term::int(7).sub(x()))).unwrap();
        s.assert(&Term::var("d").ge(Term::int(0))).unwrap();
        let id = s.minimize(&Term::var("d")).unwrap();

        assert_eq!(s.check().unwrap(), SatResult::Sat);
        assert_eq!(s.objective_value(id), Some(2));
        assert_eq!(s.evaluate("x").unwrap(), 5);
        assert!(s.stats().improvements >= 1);
    }

    #[test]
    fn test_lexicographic_objectives() {
        // x + y = 10, minimize x first, then y
        let mut s = solver_xy();
        s.assert(&x().between(Term::int(2), Term::int(10))).unwrap();
        s.assert(&y().between(Term::int(0), Term::int(10))).unwrap();
        s.assert(&x().add(y()).eq(Term::int(10))).unwrap();
        s.set_priority(OptimizationPriority::Pareto);
        let ox = s.minimize(&x()).unwrap();
        let oy = s.minimize(&y()).unwrap();

        assert_eq!(s.check().unwrap(), SatResult::Sat);
        assert_eq!(s.objective_value(ox), Some(2));
        assert_eq!(s.objective_value(oy), Some(8));
    }

    #[test]
    fn test_node_budget_yields_unknown() {
        // Pigeonhole: 4 jobs of length 2 on [0, 6) never fit.
        let mut s = NativeSolver::new().with_max_nodes(3);
        let names = ["a", "b", "c", "d"];
        for n in names {
            s.declare_int(n).unwrap();
            s.assert(&Term::var(n).between(Term::int(0), Term::int(4))).unwrap();
        }
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                s.assert(&Term::or(vec![
                    Term::var(*a).add(Term::int(2)).le(Term::var(*b)),
                    Term::var(*b).add(Term::int(2)).le(Term::var(*a)),
                ]))
                .unwrap();
            }
        }
        assert!(matches!(s.check().unwrap(), SatResult::Unknown(_)));

        let mut full = s.clone().with_max_nodes(DEFAULT_MAX_NODES);
        assert_eq!(full.check().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_expired_deadline_yields_unknown() {
        let mut s = solver_xy();
        s.assert(&x().ge(Term::int(0))).unwrap();
        s.set_deadline(Instant::now().checked_sub(Duration::from_millis(1)));
        match s.check().unwrap() {
            SatResult::Unknown(reason) => assert!(reason.contains("deadline")),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_declaration_errors() {
        let mut s = solver_xy();
        assert!(matches!(s.declare_int("x"), Err(SolverError::DuplicateVariable(_))));
        assert!(matches!(
            s.assert(&Term::var("nope").ge(Term::int(0))),
            Err(SolverError::UnknownVariable(_))
        ));
        assert!(matches!(
            s.assert(&x().mul(y()).le(Term::int(3))),
            Err(SolverError::NonLinear(_))
        ));
        assert!(matches!(s.evaluate("x"), Err(SolverError::NoModel)));
    }

    #[test]
    fn test_assertions_transcript() {
        let mut s = solver_xy();
        s.assert(&x().le(Term::int(5))).unwrap();
        s.minimize(&y()).unwrap();
        let lines = s.assertions();
        assert_eq!(
            lines,
            vec![
                "(declare-const x Int)",
                "(declare-const y Int)",
                "(assert (<= x 5))",
                "(minimize y)",
            ]
        );
    }
}
