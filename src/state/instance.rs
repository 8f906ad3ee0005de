//! One live instance of the timer

use std::{
    sync::{Mutex, MutexGuard},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{
    timer_state::{self, Transition},
    PopupPosition, TimerPatch, TimerRecord, TimerState, TimerView,
};
use crate::{
    bus::ChangeBus,
    error::ValidationError,
    store::{TimerStore, WatchGuard},
};

/// Result of applying one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Still running with this many seconds left
    Advanced { remaining: u64 },
    /// Reached zero and rewound to the full duration, stopped
    Completed { total: u64 },
    /// Nothing was running
    Idle,
}

/// An instance's view of the shared timer: its own bus, its projection of
/// the stored record, and the operations users and the tick scheduler
/// perform on it.
#[derive(Debug)]
pub struct TimerInstance {
    store: TimerStore,
    bus: ChangeBus,
    /// Last record this instance read or wrote
    projection: Mutex<TimerRecord>,
    /// Changes the store refused, laid over every read until a write lands
    unsaved: Mutex<Option<TimerPatch>>,
    /// Instance metadata
    pub start_time: Instant,
    last_action: Mutex<Option<String>>,
    last_action_time: Mutex<Option<DateTime<Utc>>>,
    last_store_error: Mutex<Option<String>>,
    _watch: Option<WatchGuard>,
}

impl TimerInstance {
    /// Join the store: read the current record and start listening for
    /// changes made by other instances.
    pub fn new(store: TimerStore) -> Self {
        let bus = ChangeBus::new();
        let watch = match store.watch(bus.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("Changes from other instances will only be seen on resync: {}", e);
                None
            }
        };
        let projection = store.read();
        info!("Instance joined with timer state {:?}", TimerState::of(&projection));

        Self {
            store,
            bus,
            projection: Mutex::new(projection),
            unsaved: Mutex::new(None),
            start_time: Instant::now(),
            last_action: Mutex::new(None),
            last_action_time: Mutex::new(None),
            last_store_error: Mutex::new(None),
            _watch: watch,
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn store(&self) -> &TimerStore {
        &self.store
    }

    fn projection(&self) -> MutexGuard<'_, TimerRecord> {
        self.projection.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current projection of the shared record
    pub fn snapshot(&self) -> TimerRecord {
        self.projection().clone()
    }

    pub fn state(&self) -> TimerState {
        TimerState::of(&self.projection())
    }

    pub fn view(&self) -> TimerView {
        TimerView::of(&self.projection())
    }

    fn unsaved(&self) -> MutexGuard<'_, Option<TimerPatch>> {
        self.unsaved.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Re-read the store and replace the projection with what it holds.
    ///
    /// Changes a failed write left behind are retried first; while the store
    /// keeps refusing them they stay applied on top of what was read.
    pub fn resync(&self) -> TimerRecord {
        let mut projection = self.projection();
        let mut unsaved = self.unsaved();
        let record = match unsaved.take() {
            None => self.store.read(),
            Some(patch) => match self.store.write(&patch) {
                Ok(stored) => {
                    info!("Stored changes held back by an earlier write failure");
                    self.set_store_error(None);
                    stored
                }
                Err(e) => {
                    debug!("Store still refusing writes: {}", e);
                    let record = self.store.read().merged(&patch);
                    *unsaved = Some(patch);
                    record
                }
            },
        };
        *projection = record.clone();
        record
    }

    /// Apply a transition to the projection, persist it and signal this
    /// instance's listeners.
    ///
    /// A failed write still updates the projection so this instance keeps
    /// responding; the error is remembered for `/status` and the change is
    /// kept until a later write or resync gets it into the store.
    pub fn apply(&self, transition: Transition) -> Result<TimerRecord, ValidationError> {
        self.commit(transition).map(|(record, _)| record)
    }

    /// Like [`apply`](Self::apply), also reporting whether anything changed.
    fn commit(&self, transition: Transition) -> Result<(TimerRecord, bool), ValidationError> {
        let mut projection = self.projection();
        let Some(patch) = timer_state::apply(&projection, transition)? else {
            debug!("{} is a no-op in state {:?}", transition.name(), TimerState::of(&projection));
            return Ok((projection.clone(), false));
        };

        let mut unsaved = self.unsaved();
        let outgoing = match unsaved.take() {
            Some(earlier) => earlier.then(&patch),
            None => patch,
        };
        let record = match self.store.write(&outgoing) {
            Ok(stored) => {
                self.set_store_error(None);
                stored
            }
            Err(e) => {
                warn!("Failed to persist {}: {}", transition.name(), e);
                self.set_store_error(Some(e.to_string()));
                let record = projection.clone().merged(&outgoing);
                *unsaved = Some(outgoing);
                record
            }
        };
        *projection = record.clone();
        drop(unsaved);
        drop(projection);

        self.bus.publish();
        Ok((record, true))
    }

    /// Apply a user intent, tracking it as the last action.
    fn intent(&self, transition: Transition) -> Result<TimerRecord, ValidationError> {
        let result = self.apply(transition);
        match &result {
            Ok(record) => {
                info!("{} -> {:?}", transition.name(), TimerState::of(record));
                if let Ok(mut last_action) = self.last_action.lock() {
                    *last_action = Some(transition.name().to_string());
                }
                if let Ok(mut last_time) = self.last_action_time.lock() {
                    *last_time = Some(Utc::now());
                }
            }
            Err(e) => info!("{} rejected: {}", transition.name(), e),
        }
        result
    }

    /// Transitions that cannot fail validation.
    fn infallible(&self, transition: Transition) -> TimerRecord {
        self.intent(transition).unwrap_or_else(|_| self.snapshot())
    }

    /// Arm a paused timer for `minutes:seconds`.
    pub fn confirm(&self, minutes: i64, seconds: i64) -> Result<TimerRecord, ValidationError> {
        self.intent(Transition::Confirm { minutes, seconds })
    }

    pub fn toggle(&self) -> TimerRecord {
        self.infallible(Transition::Toggle)
    }

    pub fn pause(&self) -> TimerRecord {
        self.infallible(Transition::Pause)
    }

    pub fn resume(&self) -> TimerRecord {
        self.infallible(Transition::Resume)
    }

    pub fn restart(&self) -> TimerRecord {
        self.infallible(Transition::Restart)
    }

    pub fn stop(&self) -> TimerRecord {
        self.infallible(Transition::Stop)
    }

    pub fn hide_popup(&self) -> TimerRecord {
        self.infallible(Transition::HidePopup)
    }

    pub fn show_popup(&self) -> TimerRecord {
        self.infallible(Transition::ShowPopup)
    }

    /// Advance the countdown by one second from the projection.
    pub fn tick(&self) -> TickOutcome {
        let record = match self.commit(Transition::Tick) {
            Ok((record, true)) => record,
            _ => return TickOutcome::Idle,
        };
        match TimerState::of(&record) {
            TimerState::Running { remaining, .. } => TickOutcome::Advanced { remaining },
            TimerState::Paused { total, .. } => TickOutcome::Completed { total },
            TimerState::Unarmed => TickOutcome::Idle,
        }
    }

    pub fn popup_position(&self) -> PopupPosition {
        self.store.popup_position()
    }

    pub fn set_popup_position(&self, pos: PopupPosition) -> PopupPosition {
        match self.store.set_popup_position(pos) {
            Ok(saved) => {
                self.set_store_error(None);
                saved
            }
            Err(e) => {
                warn!("Failed to persist popup position: {}", e);
                self.set_store_error(Some(e.to_string()));
                pos.clamped()
            }
        }
    }

    fn set_store_error(&self, error: Option<String>) {
        if let Ok(mut last) = self.last_store_error.lock() {
            *last = error;
        }
    }

    /// Most recent store write failure, cleared by the next successful write
    pub fn last_store_error(&self) -> Option<String> {
        self.last_store_error.lock().ok().and_then(|e| e.clone())
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Calculate instance uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
