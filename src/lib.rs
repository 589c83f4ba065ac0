//! Offline cyclic schedule synthesis for periodic real-time tasks.
//!
//! Given periodic tasks (period, worst-case execution time, deadline,
//! offset, tolerated release jitter), computes a static table of
//! activation instants over one hyperperiod such that no two tasks on a
//! core overlap and every activation meets its deadline. The table is
//! consumed by an embedded cyclic dispatcher at run time.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `PeriodicTask`, `TaskSet`, `CoreGroup`,
//!   `CyclicSchedule`, hyperperiod arithmetic, record ingestion, synthetic
//!   workloads
//! - **`validation`**: Task-set integrity checks (`C ≤ D ≤ T`, `O ≤ T`,
//!   unique names)
//! - **`solver`**: Solver abstraction (`Term`, `Solver`) with a built-in
//!   integer backend, an SMT-LIB2 process backend, and an in-process Z3
//!   backend behind the `z3` feature
//! - **`cp`**: Constraint model of one core group and schedule extraction
//! - **`allocation`**: Static and automatic balanced task-to-core mapping
//! - **`scheduler`**: End-to-end `synthesize` and the rate-monotonic
//!   greedy fallback
//! - **`analysis`**: Activation jitter per task
//! - **`export`**: Data for code generation and timeline plots
//! - **`config`**: `SynthesisConfig`
//! - **`error`**: Error types
//!
//! # Example
//!
//! ```
//! use u_cyclic::config::SynthesisConfig;
//! use u_cyclic::models::PeriodicTask;
//! use u_cyclic::scheduler::{synthesize, GroupOutcome};
//!
//! let tasks = vec![
//!     PeriodicTask::new("imu", 5, 2).with_jitter(2).with_core(0),
//!     PeriodicTask::new("ctrl", 7, 4).with_jitter(2).with_core(0),
//! ];
//! let report = synthesize(&tasks, &SynthesisConfig::default()).unwrap();
//!
//! assert_eq!(report.groups[0].hyperperiod, 35);
//! assert!(matches!(report.groups[0].outcome, GroupOutcome::Scheduled(_)));
//! ```
//!
//! # References
//!
//! - Baker & Shaw (1989), "The Cyclic Executive Model and Ada"
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//!   Hard-Real-Time Environment"
//! - Bini & Buttazzo (2005), "Measuring the Performance of Schedulability
//!   Tests"
//! - Barrett, Fontaine & Tinelli (2016), "The SMT-LIB Standard: Version 2.6"

pub mod allocation;
pub mod analysis;
pub mod config;
pub mod cp;
pub mod error;
pub mod export;
pub mod models;
pub mod scheduler;
pub mod solver;
pub mod validation;
