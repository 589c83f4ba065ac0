//! Rate-monotonic greedy fallback.
//!
//! A fast, solver-free candidate schedule for one core group.
//!
//! # Algorithm
//! 1. Order tasks by ascending period (rate-monotonic priority; stable for
//!    equal periods).
//! 2. Sweep the ordered tasks with a single time cursor starting at 0. A
//!    visited task whose last recorded instant has elapsed records the
//!    cursor and the projected next release `cursor + T`; a task visited
//!    for the first time does the same.
//! 3. After each visit the cursor advances by `C + wcet_gap`.
//! 4. Sweeps repeat while the cursor is within the hyperperiod.
//!
//! This is a heuristic. It runs no admission test and does not check
//! deadlines, jitter, or overlap; the trailing entry of each list is the
//! projected next release and may lie beyond the hyperperiod. The result
//! is never marked verified.
//!
//! # Complexity
//! O(n log n + H / min(C + gap) · n) for n tasks.
//!
//! # Reference
//! Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//! Hard-Real-Time Environment"

use tracing::{debug, warn};

use crate::error::SynthesisError;
use crate::models::{hyperperiod, utilization_percent, CyclicSchedule, PeriodicTask, TaskActivations};
use crate::validation::validate_tasks;

/// Builds a best-effort candidate schedule without a solver.
///
/// Tasks in the returned schedule are in rate-monotonic order.
///
/// An empty group yields an empty unverified schedule with hyperperiod 0.
///
/// # Errors
/// - [`SynthesisError::InvalidTaskSet`] when the tasks fail
///   [`validate_tasks`]
/// - [`SynthesisError::HyperperiodOverflow`] when the hyperperiod does not
///   fit in `u64`
///
/// # Example
/// ```
/// use u_cyclic::models::PeriodicTask;
/// use u_cyclic::scheduler::rate_monotonic_fallback;
///
/// let tasks = vec![PeriodicTask::new("slow", 10, 3), PeriodicTask::new("fast", 5, 1)];
/// let schedule = rate_monotonic_fallback(&tasks, 0).unwrap();
///
/// assert_eq!(schedule.hyperperiod(), 10);
/// assert_eq!(schedule.tasks()[0].name, "fast");
/// assert!(!schedule.is_verified());
/// ```
pub fn rate_monotonic_fallback(
    tasks: &[PeriodicTask],
    wcet_gap: u64,
) -> Result<CyclicSchedule, SynthesisError> {
    validate_tasks(tasks)?;
    if tasks.is_empty() {
        return Ok(CyclicSchedule::new(None, 0, 0.0, false, Vec::new()));
    }

    let mut ordered: Vec<&PeriodicTask> = tasks.iter().collect();
    ordered.sort_by_key(|t| t.period);

    let periods: Vec<u64> = ordered.iter().map(|t| t.period).collect();
    let h = hyperperiod(&periods).ok_or_else(|| {
        SynthesisError::HyperperiodOverflow(format!("rate-monotonic group of {} tasks", tasks.len()))
    })?;

    let mut lists: Vec<Vec<u64>> = vec![Vec::new(); ordered.len()];
    let mut cursor: u64 = 0;
    let mut sweeps = 0usize;

    while cursor <= h {
        let before = cursor;
        for (task, instants) in ordered.iter().zip(lists.iter_mut()) {
            match instants.pop() {
                Some(last) if cursor < last => instants.push(last),
                Some(_) | None => {
                    instants.push(cursor);
                    instants.push(cursor.saturating_add(task.period));
                }
            }
            cursor = cursor.saturating_add(task.execution).saturating_add(wcet_gap);
        }
        sweeps += 1;
        if cursor == before || cursor == u64::MAX {
            warn!(cursor, "rate-monotonic sweep made no progress");
            break;
        }
    }
    debug!(hyperperiod = h, sweeps, "rate-monotonic fallback done");

    let activations = ordered
        .iter()
        .zip(lists)
        .map(|(task, instants)| TaskActivations {
            instants,
            ..TaskActivations::for_task(task)
        })
        .collect();
    let core_id = tasks.first().and_then(|t| t.core_id);
    Ok(CyclicSchedule::new(
        core_id,
        h,
        utilization_percent(tasks.iter()),
        false,
        activations,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationErrorKind;

    #[test]
    fn test_greedy_trace() {
        let tasks = vec![PeriodicTask::new("a", 5, 2), PeriodicTask::new("b", 7, 4)];
        let s = rate_monotonic_fallback(&tasks, 0).unwrap();

        assert_eq!(s.hyperperiod(), 35);
        let a = &s.tasks()[0].instants;
        let b = &s.tasks()[1].instants;
        // sweep 1: a@0 (next 5), cursor 2; b@2 (next 9), cursor 6
        // sweep 2: a@6 (next 11), cursor 8; b waits for 9, cursor 12
        assert_eq!(&a[..3], &[0, 6, 12]);
        assert_eq!(&b[..2], &[2, 14]);
        assert!(!s.is_verified());
        assert!((s.utilization() - (40.0 + 400.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_sorted_by_period_stable() {
        let tasks = vec![
            PeriodicTask::new("x", 20, 1),
            PeriodicTask::new("y", 10, 1),
            PeriodicTask::new("z", 10, 1),
        ];
        let s = rate_monotonic_fallback(&tasks, 1).unwrap();
        let names: Vec<&str> = s.tasks().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["y", "z", "x"]);
    }

    #[test]
    fn test_gap_spreads_visits() {
        let tasks = vec![PeriodicTask::new("a", 10, 1)];
        let s = rate_monotonic_fallback(&tasks, 4).unwrap();
        // cursor 0 records 0/10, 5 waits, 10 records 10/20, 15 ends the loop
        assert_eq!(s.tasks()[0].instants, vec![0, 10, 20]);
    }

    #[test]
    fn test_zero_progress_terminates() {
        let tasks = vec![PeriodicTask::new("idle", 10, 0)];
        let s = rate_monotonic_fallback(&tasks, 0).unwrap();
        assert_eq!(s.tasks()[0].instants, vec![0, 10]);
    }

    #[test]
    fn test_empty_group_gives_empty_schedule() {
        let s = rate_monotonic_fallback(&[], 0).unwrap();
        assert!(s.tasks().is_empty());
        assert_eq!(s.hyperperiod(), 0);
        assert!(!s.is_verified());
    }

    #[test]
    fn test_zero_period_is_invalid_task_set() {
        let tasks = vec![PeriodicTask::new("ok", 10, 1), PeriodicTask::new("broken", 0, 0)];
        let err = rate_monotonic_fallback(&tasks, 0).unwrap_err();

        let SynthesisError::InvalidTaskSet(errors) = err else {
            panic!("expected InvalidTaskSet, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].task, "broken");
        assert_eq!(errors[0].kind, ValidationErrorKind::ZeroPeriod);
    }
}
