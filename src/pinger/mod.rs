//! Periodic liveness checks
//!
//! - [`TargetChecker`]: one HTTP check against one URL, with retry backoff
//! - [`CycleCoordinator`]: checks every target concurrently, once
//! - [`Scheduler`]: runs cycles on a fixed interval until shutdown
//! - [`ResultSink`]: receives outcomes as they complete

mod checker;
mod coordinator;
mod outcome;
mod scheduler;
mod sink;

pub use checker::{CheckerConfig, TargetChecker, USER_AGENT};
pub use coordinator::{CycleCoordinator, CycleReport};
pub use outcome::{CheckError, CheckOutcome};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerSummary};
pub use sink::{MemorySink, ResultSink, TracingSink};

#[cfg(test)]
#[path = "test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "checker_test.rs"]
mod checker_tests;

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod coordinator_tests;

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_tests;

#[cfg(test)]
#[path = "sink_test.rs"]
mod sink_tests;
