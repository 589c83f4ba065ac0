//! End-to-end scenarios through the synthesis pipeline.

use u_cyclic::allocation::{AllocationMode, CoreAllocator};
use u_cyclic::analysis::{jitter_per_task, jitter_stats};
use u_cyclic::config::SynthesisConfig;
use u_cyclic::error::{AllocationError, SynthesisError};
use u_cyclic::export::{timeline_bars, ScheduleTable};
use u_cyclic::models::{CyclicSchedule, PeriodicTask, TaskRecord};
use u_cyclic::scheduler::{rate_monotonic_fallback, synthesize, GroupOutcome, SynthesisReport};
use u_cyclic::validation::ValidationErrorKind;

fn single_core() -> SynthesisConfig {
    SynthesisConfig::default().with_allocation(AllocationMode::SingleCore)
}

fn scheduled(report: &SynthesisReport, index: usize) -> &CyclicSchedule {
    match &report.groups[index].outcome {
        GroupOutcome::Scheduled(s) => s,
        other => panic!("group {index} not scheduled: {other:?}"),
    }
}

/// Mutual exclusion with guard gap, checked directly on the table.
fn assert_exclusive(schedule: &CyclicSchedule, gap: u64) {
    let tasks = schedule.tasks();
    for (i, a) in tasks.iter().enumerate() {
        for b in &tasks[i + 1..] {
            for (a0, a1) in a.windows() {
                for (b0, b1) in b.windows() {
                    assert!(
                        a1 + gap <= b0 || b1 + gap <= a0,
                        "{} [{a0},{a1}) vs {} [{b0},{b1})",
                        a.name,
                        b.name
                    );
                }
            }
        }
    }
}

fn coprime_pair(jitter: u64) -> Vec<PeriodicTask> {
    vec![
        PeriodicTask::new("a", 5, 2).with_jitter(jitter),
        PeriodicTask::new("b", 7, 4).with_jitter(jitter),
    ]
}

#[test]
fn test_coprime_strict_periods_infeasible() {
    // coprime strictly periodic tasks always collide within the hyperperiod
    let report = synthesize(&coprime_pair(0), &single_core()).unwrap();

    assert_eq!(report.groups[0].hyperperiod, 35);
    assert_eq!(report.groups[0].outcome, GroupOutcome::Infeasible);
}

#[test]
fn test_jitter_makes_coprime_periods_schedulable() {
    let tasks = coprime_pair(2);
    let report = synthesize(&tasks, &single_core()).unwrap();
    let schedule = scheduled(&report, 0);

    assert_eq!(schedule.hyperperiod(), 35);
    assert_eq!(schedule.activations("a").unwrap().count(), 7);
    assert_eq!(schedule.activations("b").unwrap().count(), 5);
    assert!(schedule.is_verified());
    assert!(schedule.violations(&tasks, 0).is_empty());
    assert_exclusive(schedule, 0);

    for acts in schedule.tasks() {
        for (n, &r) in acts.instants.iter().enumerate() {
            assert!(r + acts.execution <= n as u64 * acts.period + acts.period + 2);
        }
    }
    for samples in jitter_per_task(schedule).values() {
        assert!(samples.iter().all(|d| d.abs() <= 2));
    }
}

#[test]
fn test_optimized_schedule_keeps_invariants() {
    let tasks = coprime_pair(2);
    let report = synthesize(&tasks, &single_core().with_optimize(true)).unwrap();
    let schedule = scheduled(&report, 0);

    assert!(schedule.violations(&tasks, 0).is_empty());
    let stats = jitter_stats(schedule);
    assert!(stats.values().all(|s| s.peak() <= 2));
}

#[test]
fn test_single_task_single_activation() {
    let tasks = vec![PeriodicTask::new("solo", 100, 20)];
    let report = synthesize(&tasks, &single_core()).unwrap();
    let schedule = scheduled(&report, 0);

    assert_eq!(schedule.hyperperiod(), 100);
    assert_eq!(schedule.tasks()[0].instants.len(), 1);
    assert!(schedule.tasks()[0].instants[0] + 20 <= 100);
    assert!((schedule.utilization() - 20.0).abs() < 1e-9);
}

#[test]
fn test_invalid_task_rejected_before_solving() {
    let tasks = vec![
        PeriodicTask::new("ok", 10, 1),
        PeriodicTask::new("bad", 10, 15).with_deadline(15),
    ];
    let err = synthesize(&tasks, &single_core()).unwrap_err();

    let SynthesisError::InvalidTaskSet(errors) = err else {
        panic!("expected InvalidTaskSet, got {err:?}");
    };
    assert!(errors.iter().all(|e| e.task == "bad"));
    assert!(errors
        .iter()
        .any(|e| e.kind == ValidationErrorKind::DeadlineExceedsPeriod));
}

#[test]
fn test_overloaded_core_infeasible() {
    let tasks = vec![PeriodicTask::new("x", 10, 6), PeriodicTask::new("y", 10, 6)];
    let report = synthesize(&tasks, &single_core()).unwrap();

    assert_eq!(report.groups[0].outcome, GroupOutcome::Infeasible);
    assert!(!report.is_feasible());
}

fn equal_period_tasks(executions: &[u64]) -> Vec<PeriodicTask> {
    executions
        .iter()
        .enumerate()
        .map(|(i, &c)| PeriodicTask::new(format!("e{i}"), 100, c))
        .collect()
}

#[test]
fn test_balanced_two_core_split() {
    let tasks = equal_period_tasks(&[20, 15, 15, 10, 10, 10, 10]);
    let config = SynthesisConfig::default().with_allocation(AllocationMode::automatic(2));
    let report = synthesize(&tasks, &config).unwrap();

    let allocation = report.allocation.as_ref().unwrap();
    assert_eq!(allocation.assignment.len(), 7);
    assert!(allocation.core_utilization.iter().all(|&u| u <= 50.0 + 1e-9));
    assert_eq!(report.groups.len(), 2);
    assert!(report.is_feasible());
    assert_eq!(report.aggregate_hyperperiod(), Some(100));
    for schedule in report.schedules() {
        assert_exclusive(schedule, 0);
    }
}

#[test]
fn test_unbalanceable_split_is_allocation_failure() {
    // three 26% tasks: one core must host two of them (52%)
    let tasks = equal_period_tasks(&[26, 26, 26, 3, 3, 3, 3]);
    let err = CoreAllocator::new(2).allocate(&tasks).unwrap_err();
    assert!(matches!(err, AllocationError::Infeasible { cores: 2, .. }));

    let config = SynthesisConfig::default().with_allocation(AllocationMode::automatic(2));
    assert!(matches!(
        synthesize(&tasks, &config),
        Err(SynthesisError::Allocation(AllocationError::Infeasible { .. }))
    ));
}

#[test]
fn test_static_cores_with_different_hyperperiods() {
    let tasks = vec![
        PeriodicTask::new("a", 5, 1).with_core(0),
        PeriodicTask::new("b", 10, 2).with_core(0),
        PeriodicTask::new("c", 15, 3).with_core(1),
    ];
    let report = synthesize(&tasks, &SynthesisConfig::default().with_wcet_gap(1)).unwrap();

    assert_eq!(report.groups[0].hyperperiod, 10);
    assert_eq!(report.groups[1].hyperperiod, 15);
    assert_eq!(report.aggregate_hyperperiod(), Some(30));
    assert!(report.is_feasible());
    assert_exclusive(scheduled(&report, 0), 1);
}

#[test]
fn test_fixed_release_pins_instants() {
    let tasks = vec![
        PeriodicTask::new("pinned", 10, 2).with_fixed_release(3),
        PeriodicTask::new("free", 20, 4),
    ];
    let report = synthesize(&tasks, &single_core()).unwrap();
    let schedule = scheduled(&report, 0);

    assert_eq!(schedule.activations("pinned").unwrap().instants, vec![3, 13]);
}

#[test]
fn test_rate_monotonic_fallback_is_unverified() {
    let schedule = rate_monotonic_fallback(&coprime_pair(0), 0).unwrap();

    assert_eq!(schedule.hyperperiod(), 35);
    assert!(!schedule.is_verified());
    assert_eq!(schedule.tasks()[0].name, "a");
    assert_eq!(&schedule.tasks()[0].instants[..3], &[0, 6, 12]);
}

#[test]
fn test_records_to_table() {
    let tasks: Vec<PeriodicTask> = [
        ["5.0", "2", "5", "0", "2", "0", "", "fast", "on_fast"],
        ["7", "3.2", "7", "0", "2", "0", "", "slow", "on_slow"],
    ]
    .iter()
    .map(|fields| TaskRecord::from_fields(fields).into_task())
    .collect();
    assert_eq!(tasks[1].execution, 4);

    let report = synthesize(&tasks, &SynthesisConfig::default()).unwrap();
    let table = ScheduleTable::from_schedule(scheduled(&report, 0));
    assert_eq!(table.num_tasks, 2);
    assert_eq!(table.hyperperiod, 35);
    assert_eq!(table.tasks[0].handler_tag, "on_fast");
    assert_eq!(table.tasks[0].instance_count, 7);

    let bars = timeline_bars(scheduled(&report, 0), 2);
    assert_eq!(bars[1].bars.len(), 10);
}

#[test]
fn test_config_document() {
    let config = SynthesisConfig::from_json(
        r#"{"wcet_gap": 1, "allocation": {"mode": "single_core"}, "parallel": false}"#,
    )
    .unwrap();
    let tasks = vec![PeriodicTask::new("a", 10, 2), PeriodicTask::new("b", 10, 3)];
    let report = synthesize(&tasks, &config).unwrap();

    assert_exclusive(scheduled(&report, 0), 1);
}

#[cfg(feature = "z3")]
#[test]
fn test_in_process_z3_matches_native_verdicts() {
    use u_cyclic::solver::SolverBackend;

    let z3 = single_core().with_backend(SolverBackend::Z3);
    let strict = synthesize(&coprime_pair(0), &z3).unwrap();
    assert_eq!(strict.groups[0].outcome, GroupOutcome::Infeasible);

    let tasks = coprime_pair(2);
    let report = synthesize(&tasks, &z3.with_optimize(true)).unwrap();
    let schedule = scheduled(&report, 0);
    assert!(schedule.violations(&tasks, 0).is_empty());
    assert_exclusive(schedule, 0);
}
