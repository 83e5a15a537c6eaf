pub mod config;
pub mod logging;
pub mod pinger;
pub mod server;

// Re-export for main.rs and integration tests
pub use crate::config::{ConfigError, Settings};
pub use crate::pinger::{CheckOutcome, CycleCoordinator, Scheduler, TargetChecker};
