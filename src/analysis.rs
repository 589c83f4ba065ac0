//! Activation jitter analysis.
//!
//! Measures how far consecutive activations of each task drift from the
//! nominal period in a synthesized schedule.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Jitter sample | `(r[n] − r[n−1]) − T` for n = 1..count−1 |
//! | Min / Max | Extremes of the samples |
//! | Mean | Arithmetic mean of the samples |
//! | Std. deviation | Population standard deviation of the samples |
//!
//! Everything is derived from the schedule alone; nothing is cached.
//!
//! # Reference
//! Buttazzo (2011), "Hard Real-Time Computing Systems", Ch. 2.2: Timing
//! Constraints

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{CyclicSchedule, TaskActivations};

/// Signed deviation of each consecutive spacing from the period.
///
/// Tasks with fewer than two activations map to an empty sequence.
pub fn jitter_per_task(schedule: &CyclicSchedule) -> BTreeMap<String, Vec<i64>> {
    schedule
        .tasks()
        .iter()
        .map(|t| (t.name.clone(), task_jitter(t)))
        .collect()
}

fn task_jitter(task: &TaskActivations) -> Vec<i64> {
    let period = task.period as i128;
    task.instants
        .windows(2)
        .map(|w| {
            let deviation = w[1] as i128 - w[0] as i128 - period;
            deviation.clamp(i64::MIN as i128, i64::MAX as i128) as i64
        })
        .collect()
}

/// Summary statistics of a jitter sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterStats {
    /// Smallest deviation.
    pub min: i64,
    /// Largest deviation.
    pub max: i64,
    /// Mean deviation.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Number of samples.
    pub samples: usize,
}

impl JitterStats {
    /// Computes statistics from a jitter sequence. `None` if empty.
    pub fn from_samples(samples: &[i64]) -> Option<Self> {
        let min = *samples.iter().min()?;
        let max = *samples.iter().max()?;
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|&s| {
                let d = s as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        Some(Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
            samples: samples.len(),
        })
    }

    /// Largest absolute deviation.
    pub fn peak(&self) -> u64 {
        self.min.unsigned_abs().max(self.max.unsigned_abs())
    }
}

/// Statistics for every task with at least two activations.
pub fn jitter_stats(schedule: &CyclicSchedule) -> BTreeMap<String, JitterStats> {
    jitter_per_task(schedule)
        .into_iter()
        .filter_map(|(name, samples)| JitterStats::from_samples(&samples).map(|s| (name, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PeriodicTask;

    fn schedule() -> CyclicSchedule {
        let a = PeriodicTask::new("a", 5, 2);
        let b = PeriodicTask::new("b", 7, 4);
        let once = PeriodicTask::new("once", 35, 1);
        CyclicSchedule::new(
            None,
            35,
            0.0,
            true,
            vec![
                TaskActivations {
                    instants: vec![0, 6, 12, 15, 21, 27, 33],
                    ..TaskActivations::for_task(&a)
                },
                TaskActivations {
                    instants: vec![2, 8, 17, 23, 29],
                    ..TaskActivations::for_task(&b)
                },
                TaskActivations {
                    instants: vec![10],
                    ..TaskActivations::for_task(&once)
                },
            ],
        )
    }

    #[test]
    fn test_jitter_per_task() {
        let jitter = jitter_per_task(&schedule());
        assert_eq!(jitter["a"], vec![1, 1, -2, 1, 1, 1]);
        assert_eq!(jitter["b"], vec![-1, 2, -1, -1]);
        assert!(jitter["once"].is_empty());
    }

    #[test]
    fn test_idempotent() {
        let s = schedule();
        assert_eq!(jitter_per_task(&s), jitter_per_task(&s));
    }

    #[test]
    fn test_stats() {
        let stats = JitterStats::from_samples(&[-1, 2, -1, -1]).unwrap();
        assert_eq!(stats.min, -1);
        assert_eq!(stats.max, 2);
        assert_eq!(stats.samples, 4);
        assert!((stats.mean + 0.25).abs() < 1e-12);
        // deviations from mean: -0.75, 2.25, -0.75, -0.75
        let expected = ((3.0 * 0.5625 + 5.0625) / 4.0_f64).sqrt();
        assert!((stats.std_dev - expected).abs() < 1e-12);
        assert_eq!(stats.peak(), 2);
    }

    #[test]
    fn test_stats_skip_single_activation() {
        let stats = jitter_stats(&schedule());
        assert_eq!(stats.len(), 2);
        assert!(!stats.contains_key("once"));
        assert!(JitterStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_zero_jitter_for_exact_period() {
        let t = PeriodicTask::new("t", 10, 1);
        let s = CyclicSchedule::new(
            None,
            30,
            10.0,
            true,
            vec![TaskActivations {
                instants: vec![3, 13, 23],
                ..TaskActivations::for_task(&t)
            }],
        );
        let stats = jitter_stats(&s);
        assert_eq!(stats["t"].std_dev, 0.0);
        assert_eq!(stats["t"].peak(), 0);
    }
}
