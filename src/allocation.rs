//! Core allocation.
//!
//! Decides which core each task runs on, before any schedule is built.
//!
//! - [`AllocationMode::Static`]: tasks carry their `core_id`; grouping is a
//!   stable partition on it and unassigned tasks are an error.
//! - [`AllocationMode::SingleCore`]: every task shares core 0.
//! - [`AllocationMode::Automatic`]: a 0/1 assignment problem solved through
//!   the [`Solver`] abstraction.
//!
//! # Automatic Formulation
//! One variable `x[t,c] ∈ {0, 1}` per (task, core) pair:
//!
//! - `Σ_c x[t,c] = 1` for every task
//! - `Σ_t x[t,c] ≥ 1` for every core
//! - `Σ_t x[t,c] · w_t ≤ B` for every core
//!
//! The capacity rows are exact integer forms of `Σ x·C/T ≤ bound`. With
//! `L` the LCM of all periods and the bound read as the reduced fraction
//! `num/den` (quantized to 10⁻⁶), each side is multiplied by `L·den`:
//! `w_t = C · (L/T) · den`, `B = num · L`. A core loaded to exactly the
//! bound is accepted. Tasks that already carry a `core_id` are pinned to
//! it.
//!
//! # Reference
//! Davis & Burns (2011), "A Survey of Hard Real-Time Scheduling for
//! Multiprocessor Systems"

use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AllocationError;
use crate::models::{gcd, hyperperiod, CoreGroup, PeriodicTask, TaskSet};
use crate::solver::{SatResult, Solver, SolverBackend, Term};

/// Default per-core utilization bound of automatic allocation.
pub const DEFAULT_UTILIZATION_BOUND: f64 = 0.5;

/// Resolution the utilization bound is quantized to.
const BOUND_SCALE: u64 = 1_000_000;

/// How tasks are mapped to cores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AllocationMode {
    /// Use the `core_id` carried by each task.
    #[default]
    Static,
    /// Schedule every task on one core.
    SingleCore,
    /// Balance tasks over `cores` cores under a utilization bound.
    Automatic {
        cores: u32,
        #[serde(default = "default_bound")]
        utilization_bound: f64,
    },
}

fn default_bound() -> f64 {
    DEFAULT_UTILIZATION_BOUND
}

impl AllocationMode {
    /// Automatic allocation with the default bound.
    pub fn automatic(cores: u32) -> Self {
        AllocationMode::Automatic {
            cores,
            utilization_bound: DEFAULT_UTILIZATION_BOUND,
        }
    }
}

/// Result of automatic allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreAllocation {
    /// Number of cores.
    pub cores: u32,
    /// Per-core utilization bound (fraction).
    pub utilization_bound: f64,
    /// Task name to core id.
    pub assignment: BTreeMap<String, u32>,
    /// Utilization per core, in percent.
    pub core_utilization: Vec<f64>,
}

impl CoreAllocation {
    /// Core assigned to a task.
    pub fn core_of(&self, task: &str) -> Option<u32> {
        self.assignment.get(task).copied()
    }

    /// Copies of `tasks` with their `core_id` set from this allocation.
    pub fn apply(&self, tasks: &[PeriodicTask]) -> Vec<PeriodicTask> {
        tasks
            .iter()
            .map(|t| PeriodicTask {
                core_id: self.core_of(&t.name).or(t.core_id),
                ..t.clone()
            })
            .collect()
    }
}

/// Automatic balanced core allocator.
#[derive(Debug, Clone)]
pub struct CoreAllocator {
    cores: u32,
    utilization_bound: f64,
    backend: SolverBackend,
    deadline: Option<Instant>,
}

impl CoreAllocator {
    /// Creates an allocator for `cores` cores with the default bound.
    pub fn new(cores: u32) -> Self {
        Self {
            cores,
            utilization_bound: DEFAULT_UTILIZATION_BOUND,
            backend: SolverBackend::default(),
            deadline: None,
        }
    }

    /// Sets the per-core utilization bound (fraction in `(0, 1]`).
    pub fn with_utilization_bound(mut self, bound: f64) -> Self {
        self.utilization_bound = bound;
        self
    }

    /// Sets the solver backend.
    pub fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the solve deadline.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Assigns every task to exactly one core.
    ///
    /// # Errors
    /// - [`AllocationError::Infeasible`] when no assignment meets the bound
    /// - [`AllocationError::Indeterminate`] when the solver gives up
    pub fn allocate(&self, tasks: &[PeriodicTask]) -> Result<CoreAllocation, AllocationError> {
        if self.cores == 0 {
            return Err(AllocationError::InvalidCoreCount);
        }
        let bound = self.utilization_bound;
        if !(bound > 0.0 && bound <= 1.0) {
            return Err(AllocationError::InvalidBound(bound));
        }
        for task in tasks {
            if let Some(core) = task.core_id.filter(|&c| c >= self.cores) {
                return Err(AllocationError::CoreOutOfRange {
                    task: task.name.clone(),
                    core,
                    cores: self.cores,
                });
            }
        }

        let mut solver = self.backend.create();
        solver.set_deadline(self.deadline);
        let vars = self.encode(solver.as_mut(), tasks)?;

        match solver.check()? {
            SatResult::Sat => {}
            SatResult::Unsat => {
                warn!(cores = self.cores, bound, "core allocation infeasible");
                return Err(AllocationError::Infeasible {
                    cores: self.cores,
                    bound,
                });
            }
            SatResult::Unknown(reason) => {
                warn!(cores = self.cores, reason = %reason, "core allocation indeterminate");
                return Err(AllocationError::Indeterminate(reason));
            }
        }

        let mut assignment = BTreeMap::new();
        let mut core_utilization = vec![0.0; self.cores as usize];
        for (task, row) in tasks.iter().zip(&vars) {
            for (core, name) in row.iter().enumerate() {
                if solver.evaluate(name)? == 1 {
                    assignment.insert(task.name.clone(), core as u32);
                    core_utilization[core] += task.utilization() * 100.0;
                }
            }
        }

        info!(
            cores = self.cores,
            bound,
            tasks = tasks.len(),
            ?core_utilization,
            "core allocation found"
        );
        Ok(CoreAllocation {
            cores: self.cores,
            utilization_bound: bound,
            assignment,
            core_utilization,
        })
    }

    fn encode(
        &self,
        solver: &mut dyn Solver,
        tasks: &[PeriodicTask],
    ) -> Result<Vec<Vec<String>>, AllocationError> {
        let cores = self.cores as usize;
        let capacity = capacity_row(tasks, self.utilization_bound)?;

        let mut vars = Vec::with_capacity(tasks.len());
        for (ti, task) in tasks.iter().enumerate() {
            let row: Vec<String> = (0..cores).map(|c| format!("alloc_{ti}_{c}")).collect();
            for name in &row {
                solver.declare_int(name)?;
                solver.assert(&Term::var(name.as_str()).between(Term::int(0), Term::int(1)))?;
            }
            let placed = Term::sum(row.iter().map(|n| Term::var(n.as_str())).collect());
            solver.assert(&placed.eq(Term::int(1)))?;
            if let Some(core) = task.core_id {
                solver.assert(&Term::var(row[core as usize].as_str()).eq(Term::int(1)))?;
            }
            vars.push(row);
        }

        for c in 0..cores {
            let hosted = Term::sum(vars.iter().map(|row| Term::var(row[c].as_str())).collect());
            solver.assert(&hosted.ge(Term::int(1)))?;

            let load = Term::sum(
                vars.iter()
                    .zip(&capacity.weights)
                    .map(|(x, &w)| Term::var(x[c].as_str()).mul(Term::int(w)))
                    .collect(),
            );
            solver.assert(&load.le(Term::int(capacity.capacity)))?;
        }
        Ok(vars)
    }
}

/// Integer form of one core's capacity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityRow {
    /// Per-task weight `C · (L/T) · den`, in task order.
    pub weights: Vec<i64>,
    /// Right-hand side `num · L`.
    pub capacity: i64,
}

/// Utilization bound as a reduced fraction `(num, den)` with
/// `den | 10⁶`.
pub fn bound_ratio(bound: f64) -> (u64, u64) {
    let num = (bound * BOUND_SCALE as f64).round() as u64;
    let g = gcd(num, BOUND_SCALE).max(1);
    (num / g, BOUND_SCALE / g)
}

/// Exact capacity row for `tasks` under `bound`.
///
/// Zero-period tasks weigh nothing.
///
/// # Errors
/// [`AllocationError::Overflow`] when the period LCM or a scaled weight
/// does not fit in `i64`.
pub fn capacity_row(tasks: &[PeriodicTask], bound: f64) -> Result<CapacityRow, AllocationError> {
    let periods: Vec<u64> = tasks.iter().map(|t| t.period).filter(|&p| p > 0).collect();
    let l = if periods.is_empty() {
        1
    } else {
        hyperperiod(&periods)
            .ok_or_else(|| AllocationError::Overflow("period lcm".into()))?
    };
    let (num, den) = bound_ratio(bound);

    let weights = tasks
        .iter()
        .map(|task| {
            if task.period == 0 {
                return Ok(0);
            }
            let w = task.execution as u128 * (l / task.period) as u128 * den as u128;
            i64::try_from(w)
                .map_err(|_| AllocationError::Overflow(format!("weight of {}", task.name)))
        })
        .collect::<Result<Vec<i64>, AllocationError>>()?;
    let capacity = i64::try_from(num as u128 * l as u128)
        .map_err(|_| AllocationError::Overflow("core capacity".into()))?;
    Ok(CapacityRow { weights, capacity })
}

/// Stable partition by the `core_id` tasks already carry.
///
/// # Errors
/// [`AllocationError::Unassigned`] naming every task without a core.
pub fn static_groups(tasks: &[PeriodicTask]) -> Result<Vec<CoreGroup>, AllocationError> {
    let set = TaskSet::new(tasks.to_vec());
    let unassigned: Vec<String> = set.unassigned().into_iter().map(String::from).collect();
    if !unassigned.is_empty() {
        return Err(AllocationError::Unassigned(unassigned));
    }
    Ok(set.group_by_core())
}

/// All tasks in one group on core 0.
pub fn single_core_group(tasks: &[PeriodicTask]) -> CoreGroup {
    CoreGroup {
        core_id: Some(0),
        tasks: tasks
            .iter()
            .map(|t| PeriodicTask {
                core_id: Some(0),
                ..t.clone()
            })
            .collect(),
    }
}

/// Groups tasks per core according to `mode`.
///
/// Returns the groups and, for automatic mode, the allocation that
/// produced them. Automatic groups cover every core, in core order.
pub fn plan_groups(
    tasks: &[PeriodicTask],
    mode: &AllocationMode,
    backend: &SolverBackend,
    deadline: Option<Instant>,
) -> Result<(Vec<CoreGroup>, Option<CoreAllocation>), AllocationError> {
    match mode {
        AllocationMode::Static => Ok((static_groups(tasks)?, None)),
        AllocationMode::SingleCore => Ok((vec![single_core_group(tasks)], None)),
        AllocationMode::Automatic {
            cores,
            utilization_bound,
        } => {
            let allocation = CoreAllocator::new(*cores)
                .with_utilization_bound(*utilization_bound)
                .with_backend(backend.clone())
                .with_deadline(deadline)
                .allocate(tasks)?;
            let groups = TaskSet::new(allocation.apply(tasks)).group_by_core();
            Ok((groups, Some(allocation)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks_with_executions(executions: &[u64]) -> Vec<PeriodicTask> {
        executions
            .iter()
            .enumerate()
            .map(|(i, &c)| PeriodicTask::new(format!("t{i}"), 100, c))
            .collect()
    }

    #[test]
    fn test_bound_ratio_is_reduced() {
        assert_eq!(bound_ratio(0.5), (1, 2));
        assert_eq!(bound_ratio(0.75), (3, 4));
        assert_eq!(bound_ratio(1.0), (1, 1));
        assert_eq!(bound_ratio(0.69), (69, 100));
    }

    #[test]
    fn test_capacity_row_is_exact() {
        let tasks = vec![PeriodicTask::new("a", 3, 1), PeriodicTask::new("b", 6, 1)];
        let row = capacity_row(&tasks, 0.5).unwrap();
        // L = 6: 1/3 -> 2·2, 1/6 -> 1·2, bound 1/2 -> 6
        assert_eq!(row.weights, vec![4, 2]);
        assert_eq!(row.capacity, 6);
    }

    #[test]
    fn test_capacity_row_overflow() {
        let tasks = vec![
            PeriodicTask::new("a", u64::MAX, 1),
            PeriodicTask::new("b", u64::MAX - 1, 1),
        ];
        assert!(matches!(
            capacity_row(&tasks, 0.5),
            Err(AllocationError::Overflow(_))
        ));
    }

    #[test]
    fn test_load_exactly_at_bound_is_accepted() {
        // three 1/6 tasks per core sum to exactly 0.5
        let tasks: Vec<PeriodicTask> = (0..6)
            .map(|i| PeriodicTask::new(format!("t{i}"), 6, 1))
            .collect();
        let alloc = CoreAllocator::new(2).allocate(&tasks).unwrap();

        assert_eq!(alloc.assignment.len(), 6);
        for core in 0..2 {
            let hosted = alloc.assignment.values().filter(|&&c| c == core).count();
            assert_eq!(hosted, 3);
        }
    }

    #[test]
    fn test_balanced_split_found() {
        // 90% total; 20 + 15 + 15 | 10 + 10 + 10 + 10 fits under 50% each.
        let tasks = tasks_with_executions(&[20, 15, 15, 10, 10, 10, 10]);
        let alloc = CoreAllocator::new(2).allocate(&tasks).unwrap();

        assert_eq!(alloc.assignment.len(), 7);
        assert!(alloc.core_utilization.iter().all(|&u| u <= 50.0 + 1e-9));
        assert!(alloc.core_utilization.iter().all(|&u| u > 0.0));
        let total: f64 = alloc.core_utilization.iter().sum();
        assert!((total - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_unbalanceable_set_is_infeasible() {
        // Any two of the three 26% tasks exceed 50% on one core.
        let tasks = tasks_with_executions(&[26, 26, 26, 3, 3, 3, 3]);
        match CoreAllocator::new(2).allocate(&tasks) {
            Err(AllocationError::Infeasible { cores, bound }) => {
                assert_eq!(cores, 2);
                assert_eq!(bound, 0.5);
            }
            other => panic!("expected Infeasible, got {other:?}"),
        }
    }

    #[test]
    fn test_every_core_needs_a_task() {
        let tasks = tasks_with_executions(&[10]);
        assert!(matches!(
            CoreAllocator::new(2).allocate(&tasks),
            Err(AllocationError::Infeasible { .. })
        ));
    }

    #[test]
    fn test_pinned_tasks_are_honored() {
        let mut tasks = tasks_with_executions(&[10, 10, 10, 10]);
        tasks[0].core_id = Some(1);
        tasks[1].core_id = Some(1);
        let alloc = CoreAllocator::new(2).allocate(&tasks).unwrap();
        assert_eq!(alloc.core_of("t0"), Some(1));
        assert_eq!(alloc.core_of("t1"), Some(1));

        tasks[2].core_id = Some(5);
        assert!(matches!(
            CoreAllocator::new(2).allocate(&tasks),
            Err(AllocationError::CoreOutOfRange { core: 5, .. })
        ));
    }

    #[test]
    fn test_invalid_parameters() {
        let tasks = tasks_with_executions(&[10, 10]);
        assert!(matches!(
            CoreAllocator::new(0).allocate(&tasks),
            Err(AllocationError::InvalidCoreCount)
        ));
        assert!(matches!(
            CoreAllocator::new(2).with_utilization_bound(1.5).allocate(&tasks),
            Err(AllocationError::InvalidBound(_))
        ));
    }

    #[test]
    fn test_indeterminate_under_tiny_budget() {
        let tasks = tasks_with_executions(&[20, 15, 15, 10, 10, 10, 10]);
        let result = CoreAllocator::new(2)
            .with_backend(SolverBackend::Native { max_nodes: 1 })
            .allocate(&tasks);
        assert!(matches!(result, Err(AllocationError::Indeterminate(_))));
    }

    #[test]
    fn test_static_groups_report_unassigned() {
        let tasks = vec![
            PeriodicTask::new("a", 10, 1).with_core(0),
            PeriodicTask::new("b", 10, 1),
            PeriodicTask::new("c", 10, 1),
        ];
        match static_groups(&tasks) {
            Err(AllocationError::Unassigned(names)) => assert_eq!(names, vec!["b", "c"]),
            other => panic!("expected Unassigned, got {other:?}"),
        }

        let groups = static_groups(&tasks[..1]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].core_id, Some(0));
    }

    #[test]
    fn test_plan_groups_modes() {
        let tasks = tasks_with_executions(&[20, 15, 15, 10]);

        let (groups, alloc) =
            plan_groups(&tasks, &AllocationMode::SingleCore, &SolverBackend::default(), None)
                .unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups[0].tasks.iter().all(|t| t.core_id == Some(0)));
        assert!(alloc.is_none());

        let (groups, alloc) = plan_groups(
            &tasks,
            &AllocationMode::automatic(2),
            &SolverBackend::default(),
            None,
        )
        .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].core_id, Some(0));
        assert_eq!(groups[1].core_id, Some(1));
        assert!(alloc.is_some());
    }

    #[test]
    fn test_mode_serde() {
        let mode: AllocationMode =
            serde_json::from_str(r#"{"mode": "automatic", "cores": 4}"#).unwrap();
        assert_eq!(mode, AllocationMode::automatic(4));
        let mode: AllocationMode = serde_json::from_str(r#"{"mode": "single_core"}"#).unwrap();
        assert_eq!(mode, AllocationMode::SingleCore);
    }
}
