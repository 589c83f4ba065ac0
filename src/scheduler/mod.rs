//! Schedule synthesis entry points.
//!
//! - [`synthesize`]: validate, allocate, and solve every core group
//!   through the constraint model, re-verifying each extracted schedule.
//! - [`rate_monotonic_fallback`]: solver-free greedy candidate for one
//!   group, never marked verified.
//!
//! # References
//!
//! - Baker & Shaw (1989), "The Cyclic Executive Model and Ada"
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//!   Hard-Real-Time Environment"

mod pipeline;
mod rate_monotonic;

pub use pipeline::{synthesize, GroupOutcome, GroupResult, SynthesisReport};
pub use rate_monotonic::rate_monotonic_fallback;
