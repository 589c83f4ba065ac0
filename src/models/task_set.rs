//! Task sets and per-core grouping.
//!
//! A [`TaskSet`] is an ordered collection of periodic tasks. It is passed
//! by reference into every component; nothing in the crate keeps a global
//! task list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::hyperperiod::hyperperiod;
use super::task::{utilization_percent, PeriodicTask};

/// An ordered collection of periodic tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSet {
    tasks: Vec<PeriodicTask>,
}

/// Tasks sharing one processing core.
///
/// Mutual exclusion is enforced only between members of the same group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreGroup {
    /// Core id. `None` for the implicit group of an unpartitioned set.
    pub core_id: Option<u32>,
    /// Members, in task-set order.
    pub tasks: Vec<PeriodicTask>,
}

impl TaskSet {
    /// Creates a task set from a list of tasks (order is preserved).
    pub fn new(tasks: Vec<PeriodicTask>) -> Self {
        Self { tasks }
    }

    /// Appends a task.
    pub fn push(&mut self, task: PeriodicTask) {
        self.tasks.push(task);
    }

    /// The tasks, in insertion order.
    pub fn tasks(&self) -> &[PeriodicTask] {
        &self.tasks
    }

    /// Consumes the set, returning the tasks.
    pub fn into_tasks(self) -> Vec<PeriodicTask> {
        self.tasks
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Finds a task by name.
    pub fn get(&self, name: &str) -> Option<&PeriodicTask> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Hyperperiod of the whole set. `None` if empty or on overflow.
    pub fn hyperperiod(&self) -> Option<u64> {
        let periods: Vec<u64> = self.tasks.iter().map(|t| t.period).collect();
        hyperperiod(&periods)
    }

    /// Aggregate utilization in percent.
    pub fn utilization_percent(&self) -> f64 {
        utilization_percent(&self.tasks)
    }

    /// Names of tasks without a core assignment.
    pub fn unassigned(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.core_id.is_none())
            .map(|t| t.name.as_str())
            .collect()
    }

    /// Stable partition by `core_id`.
    ///
    /// Groups are ordered by ascending core id; within a group, tasks keep
    /// their task-set order. Unassigned tasks form a trailing group with
    /// `core_id == None`.
    pub fn group_by_core(&self) -> Vec<CoreGroup> {
        let mut by_core: BTreeMap<u32, Vec<PeriodicTask>> = BTreeMap::new();
        let mut unassigned = Vec::new();

        for task in &self.tasks {
            match task.core_id {
                Some(core) => by_core.entry(core).or_default().push(task.clone()),
                None => unassigned.push(task.clone()),
            }
        }

        let mut groups: Vec<CoreGroup> = by_core
            .into_iter()
            .map(|(core_id, tasks)| CoreGroup {
                core_id: Some(core_id),
                tasks,
            })
            .collect();

        if !unassigned.is_empty() {
            groups.push(CoreGroup {
                core_id: None,
                tasks: unassigned,
            });
        }
        groups
    }
}

impl From<Vec<PeriodicTask>> for TaskSet {
    fn from(tasks: Vec<PeriodicTask>) -> Self {
        Self::new(tasks)
    }
}

impl FromIterator<PeriodicTask> for TaskSet {
    fn from_iter<I: IntoIterator<Item = PeriodicTask>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl CoreGroup {
    /// Hyperperiod of this group. `None` if empty or on overflow.
    pub fn hyperperiod(&self) -> Option<u64> {
        let periods: Vec<u64> = self.tasks.iter().map(|t| t.period).collect();
        hyperperiod(&periods)
    }

    /// Aggregate utilization of this group in percent.
    pub fn utilization_percent(&self) -> f64 {
        utilization_percent(&self.tasks)
    }
}
