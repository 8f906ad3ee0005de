//! Rest Timer - a countdown shared by independent instances
//!
//! Every instance keeps its own 1 s ticker; the only coordination is a shared
//! key-value store plus a change bus that tells each instance to re-read it.

pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod state;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use bus::ChangeBus;
pub use config::Config;
pub use error::{StoreError, ValidationError};
pub use state::{TimerInstance, TimerRecord, TimerState, TimerView};
pub use store::{FileStore, KeyValueStore, MemoryBackend, TimerStore};
pub use utils::signals::shutdown_signal;
