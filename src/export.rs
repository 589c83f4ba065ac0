//! Output-boundary data.
//!
//! Plain data handed to external collaborators. Textual or binary
//! encoding of a dispatcher table, and any rendering of a timeline, are
//! the collaborator's job; this module only shapes the data.
//!
//! - [`ScheduleTable`]: per-task activation tables for code generation.
//! - [`timeline_bars`]: per-task execution bars for timeline plots.

use serde::{Deserialize, Serialize};

use crate::models::CyclicSchedule;

/// Activation table of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTable {
    pub name: String,
    pub period: u64,
    pub execution: u64,
    pub core_id: Option<u32>,
    pub handler_tag: String,
    /// Number of activations per hyperperiod.
    pub instance_count: usize,
    /// Activation instants, ascending.
    pub instants: Vec<u64>,
}

/// Dispatcher table of one core group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTable {
    pub num_tasks: usize,
    pub hyperperiod: u64,
    /// Group utilization in percent.
    pub utilization: f64,
    /// Whether the instants come from a proven model.
    pub verified: bool,
    pub tasks: Vec<TaskTable>,
}

impl ScheduleTable {
    /// Shapes a schedule into a dispatcher table.
    pub fn from_schedule(schedule: &CyclicSchedule) -> Self {
        let tasks: Vec<TaskTable> = schedule
            .tasks()
            .iter()
            .map(|t| TaskTable {
                name: t.name.clone(),
                period: t.period,
                execution: t.execution,
                core_id: t.core_id.or(schedule.core_id()),
                handler_tag: t.handler_tag.clone(),
                instance_count: t.count(),
                instants: t.instants.clone(),
            })
            .collect();

        Self {
            num_tasks: tasks.len(),
            hyperperiod: schedule.hyperperiod(),
            utilization: schedule.utilization(),
            verified: schedule.is_verified(),
            tasks,
        }
    }

    /// Serializes the table as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One execution bar on a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub start: u64,
    pub duration: u64,
}

/// Execution bars of one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineBar {
    pub task: String,
    pub bars: Vec<Bar>,
}

/// Execution bars of every task, repeated over `iterations` hyperperiods.
///
/// Bars that would start beyond `u64::MAX` are dropped.
pub fn timeline_bars(schedule: &CyclicSchedule, iterations: u32) -> Vec<TimelineBar> {
    let h = schedule.hyperperiod();
    schedule
        .tasks()
        .iter()
        .map(|t| {
            let bars = (0..u64::from(iterations))
                .flat_map(move |k| {
                    let base = k.checked_mul(h);
                    t.instants.iter().filter_map(move |&s| {
                        base.and_then(|b| b.checked_add(s)).map(|start| Bar {
                            start,
                            duration: t.execution,
                        })
                    })
                })
                .collect();
            TimelineBar {
                task: t.name.clone(),
                bars,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeriodicTask, TaskActivations};

    fn schedule() -> CyclicSchedule {
        let a = PeriodicTask::new("a", 10, 2).with_handler("on_a");
        let b = PeriodicTask::new("b", 20, 5);
        CyclicSchedule::new(
            Some(1),
            20,
            45.0,
            true,
            vec![
                TaskActivations {
                    instants: vec![0, 10],
                    ..TaskActivations::for_task(&a)
                },
                TaskActivations {
                    instants: vec![2],
                    ..TaskActivations::for_task(&b)
                },
            ],
        )
    }

    #[test]
    fn test_schedule_table() {
        let table = ScheduleTable::from_schedule(&schedule());
        assert_eq!(table.num_tasks, 2);
        assert_eq!(table.hyperperiod, 20);
        assert!(table.verified);
        assert_eq!(table.tasks[0].handler_tag, "on_a");
        assert_eq!(table.tasks[0].instance_count, 2);
        assert_eq!(table.tasks[1].instants, vec![2]);
        // tasks without their own core inherit the group's
        assert_eq!(table.tasks[1].core_id, Some(1));
    }

    #[test]
    fn test_schedule_table_json() {
        let json = ScheduleTable::from_schedule(&schedule()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["num_tasks"], 2);
        assert_eq!(value["tasks"][0]["instants"], serde_json::json!([0, 10]));
    }

    #[test]
    fn test_timeline_bars_repeat() {
        let bars = timeline_bars(&schedule(), 2);
        assert_eq!(bars.len(), 2);
        let starts: Vec<u64> = bars[0].bars.iter().map(|b| b.start).collect();
        assert_eq!(starts, vec![0, 10, 20, 30]);
        assert!(bars[1].bars.iter().all(|b| b.duration == 5));
        assert_eq!(bars[1].bars.len(), 2);
    }

    #[test]
    fn test_timeline_zero_iterations() {
        assert!(timeline_bars(&schedule(), 0).iter().all(|t| t.bars.is_empty()));
    }
}
