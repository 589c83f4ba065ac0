//! End-to-end synthesis.
//!
//! # Algorithm
//! 1. Validate the task set; every offending task is reported.
//! 2. Partition tasks into core groups (static, single core, or automatic
//!    balanced allocation).
//! 3. For each group: fresh solver, build the cyclic model, check,
//!    extract, and re-verify the extracted instants.
//! 4. Collect per-group outcomes into a [`SynthesisReport`].
//!
//! Groups share no state. When `parallel` is set and there is more than
//! one group, each group is solved on its own scoped thread; results are
//! collected in group order. One wall-clock deadline, fixed when the run
//! starts, bounds allocation and every group solve.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::allocation::{plan_groups, CoreAllocation};
use crate::config::SynthesisConfig;
use crate::cp::{extract, CyclicModelBuilder, SolverOutcome};
use crate::error::{SolverError, SynthesisError};
use crate::models::{hyperperiod, CoreGroup, CyclicSchedule, PeriodicTask};
use crate::solver::Solver;
use crate::validation::validate_tasks;

/// Terminal outcome of one core group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    /// Proven schedule that passed re-verification.
    Scheduled(CyclicSchedule),
    /// Best-effort instants from an interrupted search, or a model that
    /// failed re-verification. Never marked verified.
    Candidate(CyclicSchedule),
    /// No schedule exists under the constraints.
    Infeasible,
    /// The backend gave up without an assignment.
    Indeterminate(String),
}

impl GroupOutcome {
    /// Extracted schedule, if any.
    pub fn schedule(&self) -> Option<&CyclicSchedule> {
        match self {
            GroupOutcome::Scheduled(s) | GroupOutcome::Candidate(s) => Some(s),
            GroupOutcome::Infeasible | GroupOutcome::Indeterminate(_) => None,
        }
    }

    /// Whether the group has a verified schedule.
    pub fn is_scheduled(&self) -> bool {
        matches!(self, GroupOutcome::Scheduled(_))
    }
}

/// Result of one core group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    /// Core id of the group.
    pub core_id: Option<u32>,
    /// Group hyperperiod.
    pub hyperperiod: u64,
    /// Group utilization in percent.
    pub utilization: f64,
    /// Verdict.
    pub outcome: GroupOutcome,
    /// Wall-clock time spent building and solving.
    pub elapsed: Duration,
    /// SMT-LIB transcript, when requested.
    pub transcript: Option<Vec<String>>,
}

/// Result of [`synthesize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisReport {
    /// Per-group results, in core order.
    pub groups: Vec<GroupResult>,
    /// Allocation computed in automatic mode.
    pub allocation: Option<CoreAllocation>,
}

impl SynthesisReport {
    /// LCM of the per-group hyperperiods.
    ///
    /// `None` when there are no groups or the LCM overflows.
    pub fn aggregate_hyperperiod(&self) -> Option<u64> {
        let periods: Vec<u64> = self.groups.iter().map(|g| g.hyperperiod).collect();
        hyperperiod(&periods)
    }

    /// Whether every group has a verified schedule.
    pub fn is_feasible(&self) -> bool {
        self.groups.iter().all(|g| g.outcome.is_scheduled())
    }

    /// All extracted schedules, verified or not, in group order.
    pub fn schedules(&self) -> Vec<&CyclicSchedule> {
        self.groups
            .iter()
            .filter_map(|g| g.outcome.schedule())
            .collect()
    }

    /// Result of the group on `core_id`.
    pub fn group(&self, core_id: Option<u32>) -> Option<&GroupResult> {
        self.groups.iter().find(|g| g.core_id == core_id)
    }
}

/// Synthesizes cyclic schedules for a task set.
///
/// # Errors
/// - [`SynthesisError::InvalidTaskSet`] listing every invalid task
/// - [`SynthesisError::Allocation`] when tasks cannot be mapped to cores
/// - [`SynthesisError::HyperperiodOverflow`] when a group's horizon does
///   not fit the integer domain
/// - [`SynthesisError::Solver`] when the backend malfunctions
///
/// Infeasible and indeterminate groups are outcomes, not errors.
///
/// # Example
/// ```
/// use u_cyclic::config::{AllocationMode, SynthesisConfig};
/// use u_cyclic::models::PeriodicTask;
/// use u_cyclic::scheduler::synthesize;
///
/// let tasks = vec![
///     PeriodicTask::new("sensor", 10, 2),
///     PeriodicTask::new("control", 20, 5),
/// ];
/// let config = SynthesisConfig::default().with_allocation(AllocationMode::SingleCore);
/// let report = synthesize(&tasks, &config).unwrap();
///
/// assert!(report.is_feasible());
/// assert_eq!(report.aggregate_hyperperiod(), Some(20));
/// ```
pub fn synthesize(
    tasks: &[PeriodicTask],
    config: &SynthesisConfig,
) -> Result<SynthesisReport, SynthesisError> {
    validate_tasks(tasks)?;
    let deadline = config.deadline_from(Instant::now());

    let (groups, allocation) = plan_groups(tasks, &config.allocation, &config.backend, deadline)?;
    let groups: Vec<CoreGroup> = groups.into_iter().filter(|g| !g.tasks.is_empty()).collect();
    info!(
        tasks = tasks.len(),
        groups = groups.len(),
        parallel = config.parallel,
        "synthesis started"
    );

    let results = if config.parallel && groups.len() > 1 {
        thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .map(|group| scope.spawn(move || solve_group(group, config, deadline)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(SolverError::Process("group solve thread panicked".into()).into())
                    })
                })
                .collect::<Result<Vec<_>, SynthesisError>>()
        })?
    } else {
        groups
            .iter()
            .map(|group| solve_group(group, config, deadline))
            .collect::<Result<Vec<_>, SynthesisError>>()?
    };

    let report = SynthesisReport {
        groups: results,
        allocation,
    };
    info!(
        feasible = report.is_feasible(),
        hyperperiod = ?report.aggregate_hyperperiod(),
        "synthesis finished"
    );
    Ok(report)
}

/// Solves one core group on a fresh backend instance.
fn solve_group(
    group: &CoreGroup,
    config: &SynthesisConfig,
    deadline: Option<Instant>,
) -> Result<GroupResult, SynthesisError> {
    let started = Instant::now();
    let mut solver = config.backend.create();
    solver.set_deadline(deadline);
    solve_with(group, config, solver.as_mut(), started)
}

/// Builds, solves, extracts, and re-verifies one core group on `solver`.
fn solve_with(
    group: &CoreGroup,
    config: &SynthesisConfig,
    solver: &mut dyn Solver,
    started: Instant,
) -> Result<GroupResult, SynthesisError> {
    let result = CyclicModelBuilder::new(&group.tasks)
        .with_wcet_gap(config.wcet_gap)
        .with_optimize(config.optimize)
        .with_priority(config.priority)
        .solve(solver)?;

    let (h, util) = (result.hyperperiod(), result.utilization());
    let outcome = match &result.outcome {
        SolverOutcome::Sat => {
            let table = extract(solver, &group.tasks, &result.model)?;
            let schedule = CyclicSchedule::new(group.core_id, h, util, true, table);
            let violations = schedule.violations(&group.tasks, config.wcet_gap);
            if violations.is_empty() {
                GroupOutcome::Scheduled(schedule)
            } else {
                warn!(
                    core = ?group.core_id,
                    violations = violations.len(),
                    first = %violations[0].message,
                    "model failed re-verification"
                );
                let table = schedule.tasks().to_vec();
                GroupOutcome::Candidate(CyclicSchedule::new(group.core_id, h, util, false, table))
            }
        }
        SolverOutcome::Unknown {
            reason,
            candidate: true,
        } => {
            let table = extract(solver, &group.tasks, &result.model)?;
            let schedule = CyclicSchedule::new(group.core_id, h, util, false, table);
            warn!(
                core = ?group.core_id,
                reason = %reason,
                violations = schedule.violations(&group.tasks, config.wcet_gap).len(),
                "solver gave up; returning unverified candidate"
            );
            GroupOutcome::Candidate(schedule)
        }
        SolverOutcome::Unknown {
            reason,
            candidate: false,
        } => {
            warn!(core = ?group.core_id, reason = %reason, "solver gave up without a model");
            GroupOutcome::Indeterminate(reason.clone())
        }
        SolverOutcome::Unsat => GroupOutcome::Infeasible,
    };

    let elapsed = started.elapsed();
    info!(
        core = ?group.core_id,
        backend = solver.backend_name(),
        hyperperiod = h,
        instances = result.model.instance_count(),
        scheduled = outcome.is_scheduled(),
        elapsed_ms = elapsed.as_millis() as u64,
        "group solved"
    );

    Ok(GroupResult {
        core_id: group.core_id,
        hyperperiod: h,
        utilization: util,
        outcome,
        elapsed,
        transcript: config.transcript.then(|| solver.assertions()),
    })
}
