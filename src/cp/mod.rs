//! Cyclic schedule formulation.
//!
//! Translates one core group of periodic tasks into integer constraints
//! over release variables `r(t, n)` (activation instant of instance `n` of
//! task `t`), solves them through the [`Solver`] abstraction, and reads the
//! activation tables back out of the model.
//!
//! # Constraints
//! Over the group hyperperiod H, for every instance `n` of task `t`:
//!
//! | Constraint | Form |
//! |------------|------|
//! | fit | `r + C ≤ H − gap` |
//! | release | `r ≥ n·T + O`, or `n·T + S − J ≤ r ≤ n·T + S + J` |
//! | spacing | `T − J ≤ r(n) − r(n−1) ≤ T + J` |
//! | sequencing | `r(n−1) + C + gap ≤ r(n)` |
//! | deadline | `r + C ≤ n·T + D + J` |
//! | exclusion | `r(t,n) + C(t) + gap ≤ r(o,k) ∨ r(o,k) + C(o) + gap ≤ r(t,n)` |
//!
//! Exclusion is asserted once per unordered pair of instances of distinct
//! tasks, and skipped when the static release windows already separate
//! them. Activation instants are non-negative.
//!
//! In optimization mode each spacing deviation `|r(n) − r(n−1) − T|` is
//! bounded by an auxiliary variable that is minimized.
//!
//! # Reference
//! - Baker & Shaw (1989), "The Cyclic Executive Model and Ada"
//! - Baptiste et al. (2001), "Constraint-Based Scheduling"

use tracing::{debug, info};

use crate::error::{SolverError, SynthesisError};
use crate::models::{hyperperiod, utilization_percent, PeriodicTask, TaskActivations};
use crate::solver::{ObjectiveId, OptimizationPriority, SatResult, Solver, Term};

/// Verdict of one group solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    /// A satisfying model is available.
    Sat,
    /// No schedule exists under these constraints.
    Unsat,
    /// The backend gave up. `candidate` tells whether a best-effort
    /// assignment can still be extracted.
    Unknown { reason: String, candidate: bool },
}

impl SolverOutcome {
    /// Whether activation instants can be extracted.
    pub fn has_model(&self) -> bool {
        matches!(
            self,
            SolverOutcome::Sat | SolverOutcome::Unknown { candidate: true, .. }
        )
    }
}

/// Variable table of a built model.
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicModel {
    /// Group hyperperiod.
    pub hyperperiod: u64,
    /// Group utilization in percent.
    pub utilization: f64,
    /// Release variable names, indexed `[task][instance]`.
    pub release_vars: Vec<Vec<String>>,
    /// Spacing deviation objectives (optimization mode only).
    pub objectives: Vec<ObjectiveId>,
    /// Number of exclusion disjunctions asserted.
    pub exclusions: usize,
}

impl CyclicModel {
    /// Total number of release variables.
    pub fn instance_count(&self) -> usize {
        self.release_vars.iter().map(Vec::len).sum()
    }
}

/// Result of [`CyclicModelBuilder::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    pub outcome: SolverOutcome,
    pub model: CyclicModel,
}

impl SolveResult {
    pub fn hyperperiod(&self) -> u64 {
        self.model.hyperperiod
    }

    pub fn utilization(&self) -> f64 {
        self.model.utilization
    }
}

/// Release variable name of instance `n` of `task`.
pub fn release_var(task: &str, n: usize) -> String {
    format!("{task}_inst_{n}")
}

fn deviation_var(task: &str, n: usize) -> String {
    format!("{task}_dev_{n}")
}

/// Static release window `[lo, hi]` of one instance.
#[derive(Debug, Clone, Copy)]
struct Window {
    lo: i64,
    hi: i64,
}

/// Builds the cyclic constraint model of one core group.
///
/// Besides the jitter-bounded spacing window, consecutive instances of the
/// same task are sequenced (`r(n−1) + C + gap ≤ r(n)`). This is stricter
/// than spacing alone: a task with `J > T − C − gap` could otherwise
/// overlap its own previous activation, which a cyclic dispatcher cannot
/// execute. Task sets that are only feasible through such self-overlap are
/// reported `Unsat`.
///
/// # Example
/// ```
/// use u_cyclic::cp::{extract, CyclicModelBuilder, SolverOutcome};
/// use u_cyclic::models::PeriodicTask;
/// use u_cyclic::solver::NativeSolver;
///
/// let tasks = vec![PeriodicTask::new("ctrl", 100, 20)];
/// let mut solver = NativeSolver::new();
/// let result = CyclicModelBuilder::new(&tasks).solve(&mut solver).unwrap();
///
/// assert_eq!(result.outcome, SolverOutcome::Sat);
/// assert_eq!(result.hyperperiod(), 100);
/// let table = extract(&solver, &tasks, &result.model).unwrap();
/// assert_eq!(table[0].instants.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct CyclicModelBuilder<'a> {
    tasks: &'a [PeriodicTask],
    wcet_gap: u64,
    optimize: bool,
    priority: OptimizationPriority,
}

impl<'a> CyclicModelBuilder<'a> {
    /// Creates a builder for a core group.
    pub fn new(tasks: &'a [PeriodicTask]) -> Self {
        Self {
            tasks,
            wcet_gap: 0,
            optimize: false,
            priority: OptimizationPriority::default(),
        }
    }

    /// Sets the guard band enforced between any two executions.
    pub fn with_wcet_gap(mut self, wcet_gap: u64) -> Self {
        self.wcet_gap = wcet_gap;
        self
    }

    /// Enables spacing-deviation minimization.
    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Sets how deviation objectives are combined.
    pub fn with_priority(mut self, priority: OptimizationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Declares variables and asserts every constraint on `solver`.
    pub fn build(&self, solver: &mut dyn Solver) -> Result<CyclicModel, SynthesisError> {
        let h = hyperperiod(&self.periods()).ok_or_else(|| self.overflow("hyperperiod"))?;
        let h_i = to_i64(h).ok_or_else(|| self.overflow("hyperperiod"))?;
        let gap = to_i64(self.wcet_gap).ok_or_else(|| self.overflow("wcet_gap"))?;

        let mut release_vars = Vec::with_capacity(self.tasks.len());
        let mut windows: Vec<Vec<Window>> = Vec::with_capacity(self.tasks.len());

        for task in self.tasks {
            let count = task.instance_count(h);
            let (t, c, d, o, j) = (
                to_i64(task.period),
                to_i64(task.execution),
                to_i64(task.deadline),
                to_i64(task.offset),
                to_i64(task.jitter),
            );
            let (Some(t), Some(c), Some(d), Some(o), Some(j)) = (t, c, d, o, j) else {
                return Err(self.overflow(&task.name));
            };
            let s = match task.fixed_release.map(to_i64) {
                Some(None) => return Err(self.overflow(&task.name)),
                Some(Some(s)) => Some(s),
                None => None,
            };

            let mut vars: Vec<String> = Vec::with_capacity(count);
            let mut task_windows = Vec::with_capacity(count);
            for n in 0..count {
                let name = release_var(&task.name, n);
                solver.declare_int(&name)?;
                let r = Term::var(name.as_str());
                // n·T ≤ H
                let base = n as i64 * t;

                let (lo, release_hi) = match s {
                    Some(s) => (
                        base.saturating_add(s).saturating_sub(j).max(0),
                        Some(base.saturating_add(s).saturating_add(j)),
                    ),
                    None => (base.saturating_add(o), None),
                };
                solver.assert(&r.clone().ge(Term::int(lo)))?;
                if let Some(hi) = release_hi {
                    solver.assert(&r.clone().le(Term::int(hi)))?;
                }

                let fit = h_i.saturating_sub(gap).saturating_sub(c);
                let deadline = base.saturating_add(d).saturating_add(j).saturating_sub(c);
                solver.assert(&r.clone().le(Term::int(fit)))?;
                solver.assert(&r.clone().le(Term::int(deadline)))?;

                if n > 0 {
                    let prev = Term::var(vars[n - 1].as_str());
                    let spacing = r.clone().sub(prev.clone());
                    solver.assert(&spacing.between(
                        Term::int(t.saturating_sub(j)),
                        Term::int(t.saturating_add(j)),
                    ))?;
                    solver.assert(&prev.add(Term::int(c.saturating_add(gap))).le(r.clone()))?;
                }

                let hi = [Some(fit), Some(deadline), release_hi]
                    .into_iter()
                    .flatten()
                    .min()
                    .unwrap_or(fit);
                task_windows.push(Window { lo, hi });
                vars.push(name);
            }
            release_vars.push(vars);
            windows.push(task_windows);
        }

        let exclusions = self.assert_exclusions(solver, &release_vars, &windows, gap)?;
        let objectives = if self.optimize {
            self.add_objectives(solver, &release_vars)?
        } else {
            Vec::new()
        };

        let model = CyclicModel {
            hyperperiod: h,
            utilization: utilization_percent(self.tasks),
            release_vars,
            objectives,
            exclusions,
        };
        info!(
            hyperperiod = h,
            tasks = self.tasks.len(),
            instances = model.instance_count(),
            exclusions,
            objectives = model.objectives.len(),
            backend = solver.backend_name(),
            "built cyclic model"
        );
        Ok(model)
    }

    fn assert_exclusions(
        &self,
        solver: &mut dyn Solver,
        release_vars: &[Vec<String>],
        windows: &[Vec<Window>],
        gap: i64,
    ) -> Result<usize, SolverError> {
        let mut asserted = 0;
        let mut pruned = 0;
        for (ti, task) in self.tasks.iter().enumerate() {
            for (oi, other) in self.tasks.iter().enumerate().skip(ti + 1) {
                let ct = (task.execution as i64).saturating_add(gap);
                let co = (other.execution as i64).saturating_add(gap);
                for (n, wt) in windows[ti].iter().enumerate() {
                    for (k, wo) in windows[oi].iter().enumerate() {
                        if wt.hi.saturating_add(ct) <= wo.lo || wo.hi.saturating_add(co) <= wt.lo {
                            pruned += 1;
                            continue;
                        }
                        let rt = Term::var(release_vars[ti][n].as_str());
                        let ro = Term::var(release_vars[oi][k].as_str());
                        solver.assert(&Term::or(vec![
                            rt.clone().add(Term::int(ct)).le(ro.clone()),
                            ro.add(Term::int(co)).le(rt),
                        ]))?;
                        asserted += 1;
                    }
                }
            }
        }
        debug!(asserted, pruned, "exclusion constraints");
        Ok(asserted)
    }

    fn add_objectives(
        &self,
        solver: &mut dyn Solver,
        release_vars: &[Vec<String>],
    ) -> Result<Vec<ObjectiveId>, SolverError> {
        solver.set_priority(self.priority);
        let mut objectives = Vec::new();
        for (task, vars) in self.tasks.iter().zip(release_vars) {
            // Spacing is exact without jitter.
            if task.jitter == 0 {
                continue;
            }
            let t = Term::int(task.period as i64);
            for n in 1..vars.len() {
                let name = deviation_var(&task.name, n);
                solver.declare_int(&name)?;
                let dev = Term::var(name.as_str());
                let spacing = Term::var(vars[n].as_str()).sub(Term::var(vars[n - 1].as_str()));
                solver.assert(&dev.clone().ge(Term::int(0)))?;
                solver.assert(&dev.clone().ge(spacing.clone().sub(t.clone())))?;
                solver.assert(&dev.clone().ge(t.clone().sub(spacing)))?;
                objectives.push(solver.minimize(&dev)?);
            }
        }
        Ok(objectives)
    }

    /// Builds the model and checks it.
    pub fn solve(&self, solver: &mut dyn Solver) -> Result<SolveResult, SynthesisError> {
        let model = self.build(solver)?;
        let outcome = match solver.check()? {
            SatResult::Sat => SolverOutcome::Sat,
            SatResult::Unsat => SolverOutcome::Unsat,
            SatResult::Unknown(reason) => SolverOutcome::Unknown {
                reason,
                candidate: solver.has_model(),
            },
        };
        Ok(SolveResult { outcome, model })
    }

    fn periods(&self) -> Vec<u64> {
        self.tasks.iter().map(|t| t.period).collect()
    }

    fn overflow(&self, what: &str) -> SynthesisError {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name.as_str()).collect();
        SynthesisError::HyperperiodOverflow(format!("{what} out of range in [{}]", names.join(", ")))
    }
}

fn to_i64(v: u64) -> Option<i64> {
    i64::try_from(v).ok()
}

/// Reads activation tables out of a solved model.
///
/// Instances are read in index order; calling this twice on the same
/// solver state yields identical tables.
pub fn extract(
    solver: &dyn Solver,
    tasks: &[PeriodicTask],
    model: &CyclicModel,
) -> Result<Vec<TaskActivations>, SolverError> {
    tasks
        .iter()
        .zip(&model.release_vars)
        .map(|(task, vars)| {
            let instants = vars
                .iter()
                .map(|name| {
                    let v = solver.evaluate(name)?;
                    u64::try_from(v)
                        .map_err(|_| SolverError::Parse(format!("negative instant {v} for {name}")))
                })
                .collect::<Result<Vec<u64>, SolverError>>()?;
            Ok(TaskActivations {
                instants,
                ..TaskActivations::for_task(task)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CyclicSchedule;
    use crate::solver::NativeSolver;

    fn solve(tasks: &[PeriodicTask], gap: u64) -> (NativeSolver, SolveResult) {
        let mut solver = NativeSolver::new();
        let result = CyclicModelBuilder::new(tasks)
            .with_wcet_gap(gap)
            .solve(&mut solver)
            .unwrap();
        (solver, result)
    }

    fn schedule(solver: &NativeSolver, tasks: &[PeriodicTask], result: &SolveResult) -> CyclicSchedule {
        let table = extract(solver, tasks, &result.model).unwrap();
        CyclicSchedule::new(None, result.hyperperiod(), result.utilization(), true, table)
    }

    #[test]
    fn test_build_declares_instances() {
        let tasks = vec![PeriodicTask::new("a", 10, 2), PeriodicTask::new("b", 20, 5)];
        let mut solver = NativeSolver::new();
        let model = CyclicModelBuilder::new(&tasks).build(&mut solver).unwrap();

        assert_eq!(model.hyperperiod, 20);
        assert_eq!(model.release_vars[0], vec!["a_inst_0", "a_inst_1"]);
        assert_eq!(model.release_vars[1], vec!["b_inst_0"]);
        assert_eq!(model.instance_count(), 3);
        assert!((model.utilization - 45.0).abs() < 1e-9);
        assert!(model.objectives.is_empty());
        assert!(solver
            .assertions()
            .contains(&"(declare-const a_inst_1 Int)".to_string()));
    }

    #[test]
    fn test_single_task() {
        let tasks = vec![PeriodicTask::new("t", 100, 20)];
        let (solver, result) = solve(&tasks, 0);
        assert_eq!(result.outcome, SolverOutcome::Sat);
        assert_eq!(result.hyperperiod(), 100);

        let s = schedule(&solver, &tasks, &result);
        assert_eq!(s.tasks()[0].instants.len(), 1);
        assert!(s.violations(&tasks, 0).is_empty());
    }

    #[test]
    fn test_two_tasks_with_gap() {
        let tasks = vec![PeriodicTask::new("a", 10, 2), PeriodicTask::new("b", 20, 5)];
        let (solver, result) = solve(&tasks, 1);
        assert_eq!(result.outcome, SolverOutcome::Sat);
        let s = schedule(&solver, &tasks, &result);
        assert!(s.violations(&tasks, 1).is_empty(), "{:?}", s.violations(&tasks, 1));
    }

    #[test]
    fn test_overloaded_core_is_unsat() {
        let tasks = vec![PeriodicTask::new("a", 10, 6), PeriodicTask::new("b", 10, 6)];
        let (_, result) = solve(&tasks, 0);
        assert_eq!(result.outcome, SolverOutcome::Unsat);
    }

    #[test]
    fn test_fixed_release_is_respected() {
        let tasks = vec![
            PeriodicTask::new("a", 10, 2).with_fixed_release(3),
            PeriodicTask::new("b", 10, 2),
        ];
        let (solver, result) = solve(&tasks, 0);
        assert_eq!(result.outcome, SolverOutcome::Sat);
        let table = extract(&solver, &tasks, &result.model).unwrap();
        assert_eq!(table[0].instants, vec![3]);
    }

    #[test]
    fn test_fixed_release_window_clamps_at_zero() {
        let tasks = vec![PeriodicTask::new("a", 10, 2).with_fixed_release(0).with_jitter(2)];
        let (solver, result) = solve(&tasks, 0);
        let table = extract(&solver, &tasks, &result.model).unwrap();
        assert_eq!(result.outcome, SolverOutcome::Sat);
        assert!(table[0].instants[0] <= 2);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let tasks = vec![
            PeriodicTask::new("a", 5, 1).with_jitter(1),
            PeriodicTask::new("b", 10, 3),
        ];
        let (solver, result) = solve(&tasks, 0);
        let first = extract(&solver, &tasks, &result.model).unwrap();
        let second = extract(&solver, &tasks, &result.model).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].instants.len(), 2);
    }

    #[test]
    fn test_extract_without_model_fails() {
        let tasks = vec![PeriodicTask::new("a", 10, 6), PeriodicTask::new("b", 10, 6)];
        let (solver, result) = solve(&tasks, 0);
        assert!(!result.outcome.has_model());
        assert!(matches!(
            extract(&solver, &tasks, &result.model),
            Err(SolverError::NoModel)
        ));
    }

    #[test]
    fn test_exclusions_are_pruned_by_static_windows() {
        // a runs in [0, 2], b is released at 5: they can never collide.
        let tasks = vec![
            PeriodicTask::new("a", 10, 2).with_deadline(4),
            PeriodicTask::new("b", 10, 2).with_offset(5),
        ];
        let mut solver = NativeSolver::new();
        let model = CyclicModelBuilder::new(&tasks).build(&mut solver).unwrap();
        assert_eq!(model.exclusions, 0);
    }

    #[test]
    fn test_optimize_minimizes_spacing_deviation() {
        let tasks = vec![
            PeriodicTask::new("a", 4, 1).with_jitter(1),
            PeriodicTask::new("b", 8, 2),
        ];
        let mut solver = NativeSolver::new();
        let result = CyclicModelBuilder::new(&tasks)
            .with_optimize(true)
            .solve(&mut solver)
            .unwrap();
        assert_eq!(result.outcome, SolverOutcome::Sat);
        // Only the jittered task gets deviation objectives.
        assert_eq!(result.model.objectives.len(), 1);
        assert_eq!(solver.objective_value(result.model.objectives[0]), Some(0));

        let table = extract(&solver, &tasks, &result.model).unwrap();
        assert_eq!(table[0].instants[1] - table[0].instants[0], 4);
    }

    #[test]
    fn test_instances_of_one_task_never_overlap() {
        // spacing 2 is inside T ± J but shorter than C
        let tasks = vec![
            PeriodicTask::new("a", 4, 3).with_jitter(2),
            PeriodicTask::new("b", 8, 1),
        ];
        let mut solver = NativeSolver::new();
        CyclicModelBuilder::new(&tasks).build(&mut solver).unwrap();
        solver
            .assert(&Term::var("a_inst_1").sub(Term::var("a_inst_0")).eq(Term::int(2)))
            .unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);

        let (solver, result) = solve(&tasks, 0);
        assert_eq!(result.outcome, SolverOutcome::Sat);
        let table = extract(&solver, &tasks, &result.model).unwrap();
        assert!(table[0].instants[1] >= table[0].instants[0] + 3);
    }

    #[test]
    fn test_unknown_under_tiny_budget() {
        let tasks = vec![
            PeriodicTask::new("a", 5, 2).with_jitter(2),
            PeriodicTask::new("b", 7, 4).with_jitter(2),
        ];
        let mut solver = NativeSolver::new().with_max_nodes(1);
        let result = CyclicModelBuilder::new(&tasks).solve(&mut solver).unwrap();
        assert!(matches!(result.outcome, SolverOutcome::Unknown { candidate: false, .. }));
    }
}
