//! Process-level helpers for the daemon binary.

pub mod signals;

pub use signals::shutdown_signal;
