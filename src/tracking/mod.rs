//! Tracked resources and the alert state machine
//!
//! A tracked resource is one URL watched against a target price. The alert
//! flag on each record follows a two-state machine so that a price drop is
//! reported exactly once per episode.

pub mod model;
pub mod transition;

pub use model::{Registration, ResourceId, StateUpdate, TrackedResource};
pub use transition::{AlertState, Transition};
