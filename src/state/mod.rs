//! State management module
//!
//! The persisted record, the pure state machine over it, the derived view,
//! and the per-instance wrapper tying them to a store and a bus.

pub mod instance;
pub mod record;
pub mod timer_state;
pub mod view;

// Re-export main types
pub use instance::{TickOutcome, TimerInstance};
pub use record::{PopupPosition, TimerPatch, TimerRecord};
pub use timer_state::{TimerState, Transition};
pub use view::TimerView;
