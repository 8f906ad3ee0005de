//! In-process store shared by several contexts
//!
//! Each [`MemoryBackend::open`] hands out a handle with its own context id.
//! A write through one handle signals the buses watching through every other
//! handle, never the writer's own.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use tracing::debug;

use super::{KeyValueStore, WatchGuard};
use crate::{bus::ChangeBus, error::StoreError};

struct Watcher {
    id: u64,
    context: u64,
    bus: ChangeBus,
}

struct Shared {
    data: Mutex<HashMap<String, String>>,
    watchers: Mutex<Vec<Watcher>>,
    next_id: AtomicU64,
    writable: AtomicBool,
}

impl Shared {
    fn data(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn watchers(&self) -> MutexGuard<'_, Vec<Watcher>> {
        self.watchers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Signal every watcher outside `origin`. `None` reaches all of them.
    fn notify_others(&self, origin: Option<u64>) {
        let buses: Vec<ChangeBus> = self
            .watchers()
            .iter()
            .filter(|w| Some(w.context) != origin)
            .map(|w| w.bus.clone())
            .collect();
        debug!("Memory store change fanned out to {} contexts", buses.len());
        for bus in buses {
            bus.publish();
        }
    }
}

/// The shared storage itself.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                data: Mutex::new(HashMap::new()),
                watchers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                writable: AtomicBool::new(true),
            }),
        }
    }

    /// A new context onto this storage.
    pub fn open(&self) -> MemoryStore {
        MemoryStore {
            shared: Arc::clone(&self.shared),
            context: self.shared.next_id(),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_writable(&self, writable: bool) {
        self.shared.writable.store(writable, Ordering::SeqCst);
    }

    /// Store a raw value as if an outside writer had, signalling every watcher.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.shared.data().insert(key.to_string(), value.to_string());
        self.shared.notify_others(None);
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.shared.data().get(key).cloned()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's handle onto a [`MemoryBackend`].
pub struct MemoryStore {
    shared: Arc<Shared>,
    context: u64,
}

impl MemoryStore {
    pub fn context(&self) -> u64 {
        self.context
    }

    fn check_writable(&self, key: &str) -> Result<(), StoreError> {
        if self.shared.writable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                key: key.to_string(),
            })
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.shared.data().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_writable(key)?;
        self.shared.data().insert(key.to_string(), value.to_string());
        self.shared.notify_others(Some(self.context));
        Ok(())
    }

    /// Runs `f` with the map locked, so no other context writes in between.
    fn update(
        &self,
        key: &str,
        f: &mut dyn FnMut(Option<&str>) -> Result<String, StoreError>,
    ) -> Result<(), StoreError> {
        self.check_writable(key)?;
        {
            let mut data = self.shared.data();
            let next = f(data.get(key).map(String::as_str))?;
            data.insert(key.to_string(), next);
        }
        self.shared.notify_others(Some(self.context));
        Ok(())
    }

    fn watch(&self, bus: ChangeBus) -> Result<WatchGuard, StoreError> {
        let id = self.shared.next_id();
        self.shared.watchers().push(Watcher {
            id,
            context: self.context,
            bus,
        });
        Ok(WatchGuard::new(Unwatch {
            shared: Arc::clone(&self.shared),
            id,
        }))
    }
}

struct Unwatch {
    shared: Arc<Shared>,
    id: u64,
}

impl Drop for Unwatch {
    fn drop(&mut self) {
        self.shared.watchers().retain(|w| w.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contexts_share_data() {
        let backend = MemoryBackend::new();
        let a = backend.open();
        let b = backend.open();
        assert_ne!(a.context(), b.context());

        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn writes_signal_other_contexts_only() {
        let backend = MemoryBackend::new();
        let a = backend.open();
        let b = backend.open();
        let (bus_a, bus_b) = (ChangeBus::new(), ChangeBus::new());
        let (mut sub_a, mut sub_b) = (bus_a.subscribe(), bus_b.subscribe());
        let _wa = a.watch(bus_a).unwrap();
        let _wb = b.watch(bus_b).unwrap();

        a.set("k", "1").unwrap();

        assert!(!sub_a.try_drain());
        assert!(sub_b.try_drain());
    }

    #[test]
    fn dropping_the_guard_stops_delivery() {
        let backend = MemoryBackend::new();
        let a = backend.open();
        let b = backend.open();
        let bus = ChangeBus::new();
        let mut sub = bus.subscribe();

        let guard = b.watch(bus).unwrap();
        drop(guard);
        a.set("k", "1").unwrap();

        assert!(!sub.try_drain());
    }

    #[test]
    fn updates_from_many_threads_are_not_lost() {
        let backend = MemoryBackend::new();
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let store = backend.open();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        store
                            .update("count", &mut |current: Option<&str>| {
                                let n: u64 = current.map_or(0, |c| c.parse().unwrap());
                                Ok((n + 1).to_string())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(backend.raw("count").as_deref(), Some("1000"));
    }

    #[test]
    fn failed_update_leaves_the_value_alone() {
        let backend = MemoryBackend::new();
        let store = backend.open();
        store.set("k", "v").unwrap();

        let result = store.update("k", &mut |_: Option<&str>| {
            Err(StoreError::Unavailable { key: "k".to_string() })
        });

        assert!(result.is_err());
        assert_eq!(backend.raw("k").as_deref(), Some("v"));
    }

    #[test]
    fn unwritable_backend_rejects_writes() {
        let backend = MemoryBackend::new();
        let store = backend.open();
        backend.set_writable(false);

        assert!(matches!(store.set("k", "v"), Err(StoreError::Unavailable { .. })));
        assert!(backend.raw("k").is_none());

        backend.set_writable(true);
        store.set("k", "v").unwrap();
        assert_eq!(backend.raw("k").as_deref(), Some("v"));
    }
}
