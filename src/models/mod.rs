//! Cyclic scheduling domain models.
//!
//! Provides the data types for periodic task sets and the cyclic
//! schedules synthesized for them. All times are integer units (e.g.
//! microseconds); ingestion rounds fractional values up.
//!
//! # Domain Mappings
//!
//! | u-cyclic | Embedded RTOS | Avionics (IMA) | Automotive |
//! |----------|---------------|----------------|------------|
//! | PeriodicTask | Thread | Partition process | Runnable |
//! | CoreGroup | Core | Module | ECU core |
//! | CyclicSchedule | Dispatcher table | Major frame | Schedule table |
//! | Hyperperiod | Table length | Major frame length | Cycle |

mod generator;
mod hyperperiod;
mod record;
mod schedule;
mod task;
mod task_set;

pub use generator::{generate_task_set, uunifast, GeneratorConfig};
pub use hyperperiod::{gcd, hyperperiod, lcm};
pub use record::{discretize, parse_time_literal, TaskRecord};
pub use schedule::{CyclicSchedule, TaskActivations, Violation, ViolationType};
pub use task::{utilization_percent, PeriodicTask};
pub use task_set::{CoreGroup, TaskSet};
