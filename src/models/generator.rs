//! Synthetic periodic task-set generation.
//!
//! Produces random task sets with a prescribed total utilization, for
//! benchmarking the solver backends and for randomized property tests.
//!
//! # Algorithm
//! UUniFast draws `n` utilizations uniformly from the simplex
//! `Σ u_i = U`. Periods are drawn from a caller-supplied menu (harmonic
//! menus keep hyperperiods small), and `C_i = max(1, floor(u_i · T_i))`.
//!
//! # Reference
//! Bini & Buttazzo (2005), "Measuring the Performance of Schedulability Tests"

use rand::prelude::IndexedRandom;
use rand::Rng;

use super::PeriodicTask;

/// Parameters for [`generate_task_set`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of tasks.
    pub task_count: usize,
    /// Target total utilization (sum of `C/T`).
    pub total_utilization: f64,
    /// Period menu, sampled uniformly.
    pub periods: Vec<u64>,
    /// Jitter as a fraction of the period (0.0 = strictly periodic).
    pub jitter_ratio: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            task_count: 4,
            total_utilization: 0.5,
            periods: vec![10, 20, 40],
            jitter_ratio: 0.0,
        }
    }
}

impl GeneratorConfig {
    /// Sets the task count.
    pub fn with_task_count(mut self, n: usize) -> Self {
        self.task_count = n;
        self
    }

    /// Sets the target total utilization.
    pub fn with_utilization(mut self, u: f64) -> Self {
        self.total_utilization = u;
        self
    }

    /// Sets the period menu.
    pub fn with_periods(mut self, periods: Vec<u64>) -> Self {
        self.periods = periods;
        self
    }

    /// Sets the jitter ratio.
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }
}

/// UUniFast: `n` utilizations summing to `total`.
pub fn uunifast<R: Rng>(n: usize, total: f64, rng: &mut R) -> Vec<f64> {
    let mut utilizations = Vec::with_capacity(n);
    if n == 0 {
        return utilizations;
    }
    let mut remaining = total;
    for i in 1..n {
        let exponent = 1.0 / (n - i) as f64;
        let next = remaining * rng.random::<f64>().powf(exponent);
        utilizations.push(remaining - next);
        remaining = next;
    }
    utilizations.push(remaining);
    utilizations
}

/// Generates a random task set with implicit deadlines.
///
/// Task names are `tau0`, `tau1`, ... An empty period menu yields an
/// empty set.
pub fn generate_task_set<R: Rng>(config: &GeneratorConfig, rng: &mut R) -> Vec<PeriodicTask> {
    if config.periods.is_empty() {
        return Vec::new();
    }
    uunifast(config.task_count, config.total_utilization, rng)
        .into_iter()
        .enumerate()
        .filter_map(|(i, u)| {
            let period = *config.periods.choose(&mut *rng)?;
            let execution = ((u * period as f64).floor() as u64).clamp(1, period);
            let jitter = (config.jitter_ratio * period as f64).floor() as u64;
            Some(PeriodicTask::new(format!("tau{i}"), period, execution).with_jitter(jitter))
        })
        .collect()
}
