//! Cyclic schedule (solution) model.
//!
//! A cyclic schedule lists, for every task of one scheduling group, the
//! concrete activation instants of its instances within one hyperperiod.
//! The table repeats every hyperperiod at run time.
//!
//! A schedule is built once from a solver model and is immutable
//! afterwards. [`CyclicSchedule::violations`] re-checks it independently
//! of the solver.
//!
//! # Reference
//! Baker & Shaw (1989), "The Cyclic Executive Model and Ada"

use serde::{Deserialize, Serialize};

use super::PeriodicTask;

/// Activation instants of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskActivations {
    /// Task name.
    pub name: String,
    /// Period T.
    pub period: u64,
    /// Worst-case execution time C.
    pub execution: u64,
    /// Core the task runs on.
    pub core_id: Option<u32>,
    /// Dispatcher handler tag.
    pub handler_tag: String,
    /// Activation instants, one per instance, in instance order.
    pub instants: Vec<u64>,
}

impl TaskActivations {
    /// Creates an empty activation list for a task.
    pub fn for_task(task: &PeriodicTask) -> Self {
        Self {
            name: task.name.clone(),
            period: task.period,
            execution: task.execution,
            core_id: task.core_id,
            handler_tag: task.handler_tag.clone(),
            instants: Vec::new(),
        }
    }

    /// Execution windows `[start, start + C)`.
    pub fn windows(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.instants.iter().map(move |&s| (s, s + self.execution))
    }

    /// Number of activations.
    pub fn count(&self) -> usize {
        self.instants.len()
    }
}

/// A complete cyclic schedule for one scheduling group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclicSchedule {
    core_id: Option<u32>,
    hyperperiod: u64,
    utilization: f64,
    verified: bool,
    tasks: Vec<TaskActivations>,
}

impl CyclicSchedule {
    /// Creates a schedule.
    ///
    /// `verified` is false when the instants come from a best-effort
    /// candidate rather than a proven satisfying model.
    pub fn new(
        core_id: Option<u32>,
        hyperperiod: u64,
        utilization: f64,
        verified: bool,
        tasks: Vec<TaskActivations>,
    ) -> Self {
        Self {
            core_id,
            hyperperiod,
            utilization,
            verified,
            tasks,
        }
    }

    /// Core this schedule belongs to.
    pub fn core_id(&self) -> Option<u32> {
        self.core_id
    }

    /// Hyperperiod of the group.
    pub fn hyperperiod(&self) -> u64 {
        self.hyperperiod
    }

    /// Aggregate utilization in percent (`Σ C/T × 100`).
    pub fn utilization(&self) -> f64 {
        self.utilization
    }

    /// Whether the instants come from a proven satisfying model.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Per-task activations, in group order.
    pub fn tasks(&self) -> &[TaskActivations] {
        &self.tasks
    }

    /// Activations of a task by name.
    pub fn activations(&self, name: &str) -> Option<&TaskActivations> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Total number of activations across all tasks.
    pub fn activation_count(&self) -> usize {
        self.tasks.iter().map(TaskActivations::count).sum()
    }

    /// Busy time within one hyperperiod.
    pub fn busy_time(&self) -> u64 {
        self.tasks
            .iter()
            .map(|t| t.execution * t.count() as u64)
            .sum()
    }

    /// Re-checks the schedule against the task parameters.
    ///
    /// Tasks are matched by name; tasks missing from `tasks` are skipped.
    /// Checks per instance `n`:
    /// - release bound (`r ≥ n·T + O`, or `|r − (n·T + S)| ≤ J`)
    /// - fit (`r + C ≤ H − gap`)
    /// - deadline (`r + C ≤ n·T + D + J`)
    /// - spacing (`|r[n] − r[n−1] − T| ≤ J`)
    /// - sequencing (`r[n−1] + C + gap ≤ r[n]`)
    ///
    /// and, across tasks of the group, that execution windows inflated by
    /// `wcet_gap` never overlap.
    pub fn violations(&self, tasks: &[PeriodicTask], wcet_gap: u64) -> Vec<Violation> {
        let mut violations = Vec::new();
        let h = self.hyperperiod as i128;
        let gap = wcet_gap as i128;

        for acts in &self.tasks {
            let Some(task) = tasks.iter().find(|t| t.name == acts.name) else {
                continue;
            };
            let (t, c, d, j) = (
                task.period as i128,
                task.execution as i128,
                task.deadline as i128,
                task.jitter as i128,
            );

            for (n, &instant) in acts.instants.iter().enumerate() {
                let r = instant as i128;
                let base = n as i128 * t;

                match task.fixed_release {
                    Some(s) => {
                        let nominal = base + s as i128;
                        if (r - nominal).abs() > j {
                            violations.push(Violation::release_bound(
                                &acts.name,
                                format!("instance {n} at {r}, expected {nominal} ± {j}"),
                            ));
                        }
                    }
                    None => {
                        let earliest = base + task.offset as i128;
                        if r < earliest {
                            violations.push(Violation::release_bound(
                                &acts.name,
                                format!("instance {n} at {r} before release {earliest}"),
                            ));
                        }
                    }
                }

                if r + c > h - gap {
                    violations.push(Violation::hyperperiod_overrun(
                        &acts.name,
                        format!("instance {n} ends at {} beyond {}", r + c, h - gap),
                    ));
                }

                if r + c > base + d + j {
                    violations.push(Violation::deadline_miss(
                        &acts.name,
                        format!("instance {n} ends at {} after {}", r + c, base + d + j),
                    ));
                }

                if n > 0 {
                    let spacing = r - acts.instants[n - 1] as i128;
                    if (spacing - t).abs() > j {
                        violations.push(Violation::jitter_exceeded(
                            &acts.name,
                            format!("spacing {spacing} before instance {n}, period {t} ± {j}"),
                        ));
                    }
                    if spacing < c + gap {
                        violations.push(Violation::overlap(
                            &acts.name,
                            format!("instance {n} starts {spacing} after instance {} of length {c}", n - 1),
                        ));
                    }
                }
            }
        }

        for (i, a) in self.tasks.iter().enumerate() {
            for b in &self.tasks[i + 1..] {
                for (a_start, a_end) in a.windows() {
                    for (b_start, b_end) in b.windows() {
                        let separated = a_end as i128 + gap <= b_start as i128
                            || a_start as i128 >= b_end as i128 + gap;
                        if !separated {
                            violations.push(Violation::overlap(
                                &a.name,
                                format!(
                                    "{} [{a_start}, {a_end}) overlaps {} [{b_start}, {b_end}) with gap {wcet_gap}",
                                    a.name, b.name
                                ),
                            ));
                        }
                    }
                }
            }
        }

        violations
    }
}

/// A schedule constraint violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Type of violation.
    pub violation_type: ViolationType,
    /// Related task name.
    pub task: String,
    /// Human-readable description.
    pub message: String,
}

/// Classification of schedule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViolationType {
    /// Instance finishes after `n·T + D + J`.
    DeadlineMiss,
    /// Consecutive spacing deviates from the period by more than J.
    JitterExceeded,
    /// Execution windows (inflated by the guard gap) overlap.
    Overlap,
    /// Instance released outside its release bound.
    ReleaseBound,
    /// Instance does not fit in the hyperperiod.
    HyperperiodOverrun,
}

impl Violation {
    fn new(violation_type: ViolationType, task: &str, message: String) -> Self {
        Self {
            violation_type,
            task: task.to_string(),
            message,
        }
    }

    /// Creates a deadline miss violation.
    pub fn deadline_miss(task: &str, message: String) -> Self {
        Self::new(ViolationType::DeadlineMiss, task, message)
    }

    /// Creates a jitter violation.
    pub fn jitter_exceeded(task: &str, message: String) -> Self {
        Self::new(ViolationType::JitterExceeded, task, message)
    }

    /// Creates an overlap violation.
    pub fn overlap(task: &str, message: String) -> Self {
        Self::new(ViolationType::Overlap, task, message)
    }

    /// Creates a release bound violation.
    pub fn release_bound(task: &str, message: String) -> Self {
        Self::new(ViolationType::ReleaseBound, task, message)
    }

    /// Creates a hyperperiod overrun violation.
    pub fn hyperperiod_overrun(task: &str, message: String) -> Self {
        Self::new(ViolationType::HyperperiodOverrun, task, message)
    }
}
