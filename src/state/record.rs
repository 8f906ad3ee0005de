//! Persisted timer record and partial updates

use serde::{Deserialize, Serialize};

/// Minutes shown in the configuration form before anything was entered.
pub const DEFAULT_CONFIGURED_MINUTES: u64 = 1;

/// The whole persisted state of the logical timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerRecord {
    pub configured_minutes: u64,
    pub configured_seconds: u64,
    /// Duration of the current or most recent armed timer
    pub total_seconds: Option<u64>,
    /// Seconds left; `None` while unarmed
    pub remaining_seconds: Option<u64>,
    pub running: bool,
    pub paused: bool,
    /// Dismissed by the user; hides the compact indicator
    pub closed: bool,
    pub popup_hidden: bool,
}

impl TimerRecord {
    /// Fresh, never-armed record
    pub fn new() -> Self {
        Self {
            configured_minutes: DEFAULT_CONFIGURED_MINUTES,
            configured_seconds: 0,
            total_seconds: None,
            remaining_seconds: None,
            running: false,
            paused: false,
            closed: false,
            popup_hidden: false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.total_seconds.is_some() && self.remaining_seconds.is_some()
    }

    /// Duration held in the configuration form
    pub fn configured_total(&self) -> u64 {
        self.configured_minutes
            .saturating_mul(60)
            .saturating_add(self.configured_seconds)
    }

    /// Repair a record that breaks the armed/running invariants.
    ///
    /// Half-armed becomes unarmed, remaining is clamped to total, running
    /// wins over paused and an armed record that is not running is paused.
    pub fn normalized(mut self) -> Self {
        match (self.total_seconds, self.remaining_seconds) {
            (Some(total), Some(remaining)) => {
                self.remaining_seconds = Some(remaining.min(total));
                self.paused = !self.running;
            }
            _ => {
                self.total_seconds = None;
                self.remaining_seconds = None;
                self.running = false;
                self.paused = false;
            }
        }
        self
    }

    /// Merge a partial update into this record.
    pub fn apply(&mut self, patch: &TimerPatch) {
        if let Some(minutes) = patch.configured_minutes {
            self.configured_minutes = minutes;
        }
        if let Some(seconds) = patch.configured_seconds {
            self.configured_seconds = seconds;
        }
        if let Some(total) = patch.total_seconds {
            self.total_seconds = total;
        }
        if let Some(remaining) = patch.remaining_seconds {
            self.remaining_seconds = remaining;
        }
        if let Some(running) = patch.running {
            self.running = running;
        }
        if let Some(paused) = patch.paused {
            self.paused = paused;
        }
        if let Some(closed) = patch.closed {
            self.closed = closed;
        }
        if let Some(hidden) = patch.popup_hidden {
            self.popup_hidden = hidden;
        }
    }

    pub fn merged(mut self, patch: &TimerPatch) -> Self {
        self.apply(patch);
        self
    }
}

impl Default for TimerRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Partial update of a [`TimerRecord`]. `None` leaves a field untouched;
/// nullable fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerPatch {
    pub configured_minutes: Option<u64>,
    pub configured_seconds: Option<u64>,
    pub total_seconds: Option<Option<u64>>,
    pub remaining_seconds: Option<Option<u64>>,
    pub running: Option<bool>,
    pub paused: Option<bool>,
    pub closed: Option<bool>,
    pub popup_hidden: Option<bool>,
}

impl TimerPatch {
    /// Armed and stopped at the given position
    pub fn armed_paused(total: u64, remaining: u64) -> Self {
        Self {
            total_seconds: Some(Some(total)),
            remaining_seconds: Some(Some(remaining)),
            running: Some(false),
            paused: Some(true),
            ..Self::default()
        }
    }

    /// Armed and counting down from the given position
    pub fn armed_running(total: u64, remaining: u64) -> Self {
        Self {
            total_seconds: Some(Some(total)),
            remaining_seconds: Some(Some(remaining)),
            running: Some(true),
            paused: Some(false),
            ..Self::default()
        }
    }

    pub fn unarmed() -> Self {
        Self {
            total_seconds: Some(None),
            remaining_seconds: Some(None),
            running: Some(false),
            paused: Some(false),
            ..Self::default()
        }
    }

    pub fn with_closed(mut self, closed: bool) -> Self {
        self.closed = Some(closed);
        self
    }

    pub fn with_configured(mut self, minutes: u64, seconds: u64) -> Self {
        self.configured_minutes = Some(minutes);
        self.configured_seconds = Some(seconds);
        self
    }

    pub fn popup_hidden(hidden: bool) -> Self {
        Self {
            popup_hidden: Some(hidden),
            ..Self::default()
        }
    }

    /// This patch followed by `later`: fields `later` names win.
    pub fn then(&self, later: &TimerPatch) -> Self {
        Self {
            configured_minutes: later.configured_minutes.or(self.configured_minutes),
            configured_seconds: later.configured_seconds.or(self.configured_seconds),
            total_seconds: later.total_seconds.or(self.total_seconds),
            remaining_seconds: later.remaining_seconds.or(self.remaining_seconds),
            running: later.running.or(self.running),
            paused: later.paused.or(self.paused),
            closed: later.closed.or(self.closed),
            popup_hidden: later.popup_hidden.or(self.popup_hidden),
        }
    }
}

/// Screen position of the compact indicator. UI-only, stored under its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupPosition {
    pub x: i64,
    pub y: i64,
}

impl PopupPosition {
    /// Smallest distance kept from the top edge
    pub const MIN_Y: i64 = 6;

    pub fn clamped(self) -> Self {
        Self {
            x: self.x,
            y: self.y.max(Self::MIN_Y),
        }
    }
}

impl Default for PopupPosition {
    fn default() -> Self {
        Self { x: 9999, y: 12 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let record: TimerRecord = serde_json::from_str(r#"{"running":true}"#).unwrap();
        assert!(record.running);
        assert_eq!(record.configured_minutes, DEFAULT_CONFIGURED_MINUTES);
        assert_eq!(record.total_seconds, None);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(TimerRecord::new()).unwrap();
        assert!(json.get("configuredMinutes").is_some());
        assert!(json.get("remainingSeconds").is_some());
        assert!(json.get("popupHidden").is_some());
    }

    #[test]
    fn normalizing_half_armed_record_disarms_it() {
        let record = TimerRecord {
            total_seconds: Some(30),
            remaining_seconds: None,
            running: true,
            ..TimerRecord::new()
        }
        .normalized();

        assert!(!record.is_armed());
        assert_eq!(record.total_seconds, None);
        assert!(!record.running);
        assert!(!record.paused);
    }

    #[test]
    fn normalizing_clamps_remaining_and_resolves_flags() {
        let record = TimerRecord {
            total_seconds: Some(30),
            remaining_seconds: Some(45),
            running: true,
            paused: true,
            ..TimerRecord::new()
        }
        .normalized();

        assert_eq!(record.remaining_seconds, Some(30));
        assert!(record.running);
        assert!(!record.paused);

        let idle = TimerRecord {
            total_seconds: Some(30),
            remaining_seconds: Some(10),
            ..TimerRecord::new()
        }
        .normalized();
        assert!(idle.paused);
    }

    #[test]
    fn patch_touches_only_named_fields() {
        let base = TimerRecord {
            configured_minutes: 3,
            popup_hidden: true,
            ..TimerRecord::new()
        };
        let merged = base.merged(&TimerPatch::armed_running(60, 42));

        assert_eq!(merged.configured_minutes, 3);
        assert!(merged.popup_hidden);
        assert_eq!(merged.remaining_seconds, Some(42));
        assert!(merged.running);

        let cleared = merged.merged(&TimerPatch::unarmed());
        assert_eq!(cleared.total_seconds, None);
        assert_eq!(cleared.remaining_seconds, None);
    }

    #[test]
    fn chained_patches_apply_like_sequential_merges() {
        let first = TimerPatch::armed_paused(45, 45).with_configured(0, 45).with_closed(false);
        let second = TimerPatch::armed_running(45, 44);
        let base = TimerRecord::new();

        let chained = base.clone().merged(&first.then(&second));
        assert_eq!(chained, base.merged(&first).merged(&second));
        assert_eq!(chained.configured_seconds, 45);
        assert_eq!(chained.remaining_seconds, Some(44));
        assert!(chained.running);
    }

    #[test]
    fn popup_position_keeps_off_the_top_edge() {
        let pos = PopupPosition { x: -20, y: -5 }.clamped();
        assert_eq!(pos, PopupPosition { x: -20, y: PopupPosition::MIN_Y });
    }
}
