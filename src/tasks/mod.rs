//! Background tasks module
//!
//! Tasks each instance runs next to its HTTP surface.

pub mod periodic_resync;
pub mod tick_scheduler;

// Re-export main functions
pub use periodic_resync::periodic_resync_task;
pub use tick_scheduler::{tick_scheduler_task, TickScheduler, TICK_PERIOD};
