//! Periodic check-and-notify engine
//!
//! [`Scheduler`] fans out one [`CheckEngine::check`] per tracked resource on
//! every tick and waits for all of them before the tick counts as done.

pub mod engine;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CheckEngine, CheckOutcome, Delivery};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStatus, StatusSnapshot, TickReport};
