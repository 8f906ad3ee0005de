//! Persistent state store
//!
//! A [`KeyValueStore`] backend holds raw strings under well-known keys and
//! reports writes made by other contexts onto a [`ChangeBus`].
//! [`TimerStore`] layers the typed timer record on top of any backend.

pub mod file;
pub mod memory;

use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::{
    bus::ChangeBus,
    error::StoreError,
    state::{PopupPosition, TimerPatch, TimerRecord},
};

pub use file::FileStore;
pub use memory::{MemoryBackend, MemoryStore};

/// Key holding the logical timer record
pub const TIMER_STATE_KEY: &str = "REST_TIMER_STATE";
/// Key holding the compact indicator position
pub const POPUP_POSITION_KEY: &str = "REST_TIMER_POPUP_POS";

/// Raw key-value storage shared between contexts.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Replace the value at `key` with one computed from the current value.
    ///
    /// Backends that can hold other writers off for the duration make this
    /// atomic; the default is a plain read followed by a write.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> Result<String, StoreError>,
    ) -> Result<(), StoreError> {
        let current = self.get(key)?;
        let next = f(current.as_deref())?;
        self.set(key, &next)
    }

    /// Publish on `bus` whenever another context changes the store.
    /// Delivery stops when the guard is dropped.
    fn watch(&self, bus: ChangeBus) -> Result<WatchGuard, StoreError>;
}

/// Keeps a store watch alive.
pub struct WatchGuard {
    _inner: Mutex<Box<dyn Send>>,
}

impl WatchGuard {
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Self {
            _inner: Mutex::new(Box::new(inner)),
        }
    }
}

impl std::fmt::Debug for WatchGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchGuard").finish_non_exhaustive()
    }
}

/// Typed access to the timer's records.
#[derive(Clone)]
pub struct TimerStore {
    backend: Arc<dyn KeyValueStore>,
}

impl TimerStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Current record. Missing or unreadable data yields the defaults.
    pub fn read(&self) -> TimerRecord {
        match self.backend.get(TIMER_STATE_KEY) {
            Ok(raw) => record_or_default(raw.as_deref()),
            Err(e) => {
                warn!("Falling back to default timer record: {}", e);
                TimerRecord::new()
            }
        }
    }

    /// Current record without the fallback, `None` if never written.
    pub fn try_read(&self) -> Result<Option<TimerRecord>, StoreError> {
        self.get_json(TIMER_STATE_KEY)
    }

    /// Merge `patch` into the stored record and return what was written.
    ///
    /// The merge base is re-read inside the backend's update, so fields this
    /// patch doesn't name keep whatever another context last wrote.
    pub fn write(&self, patch: &TimerPatch) -> Result<TimerRecord, StoreError> {
        let mut merged = TimerRecord::new();
        self.backend.update(TIMER_STATE_KEY, &mut |current: Option<&str>| {
            merged = record_or_default(current).merged(patch);
            Ok(serde_json::to_string(&merged)?)
        })?;
        debug!("Stored timer record: {:?}", merged);
        Ok(merged)
    }

    pub fn popup_position(&self) -> PopupPosition {
        match self.get_json(POPUP_POSITION_KEY) {
            Ok(Some(pos)) => pos,
            Ok(None) => PopupPosition::default(),
            Err(e) => {
                warn!("Falling back to default popup position: {}", e);
                PopupPosition::default()
            }
        }
    }

    pub fn set_popup_position(&self, pos: PopupPosition) -> Result<PopupPosition, StoreError> {
        let pos = pos.clamped();
        self.set_json(POPUP_POSITION_KEY, &pos)?;
        Ok(pos)
    }

    pub fn watch(&self, bus: ChangeBus) -> Result<WatchGuard, StoreError> {
        self.backend.watch(bus)
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get(key)? {
            Some(raw) => decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, &raw)
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// The stored timer record, normalised, or the defaults when absent or corrupt.
fn record_or_default(raw: Option<&str>) -> TimerRecord {
    let Some(raw) = raw else {
        return TimerRecord::new();
    };
    match decode::<TimerRecord>(TIMER_STATE_KEY, raw) {
        Ok(record) => record.normalized(),
        Err(e) => {
            warn!("Falling back to default timer record: {}", e);
            TimerRecord::new()
        }
    }
}

impl std::fmt::Debug for TimerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerStore").finish_non_exhaustive()
    }
}
