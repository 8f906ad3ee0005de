//! Read-only projection handed to whatever renders the timer

use serde::{Deserialize, Serialize};

use super::{TimerRecord, TimerState};

/// A record plus the values a renderer derives from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub state: TimerState,
    pub record: TimerRecord,
    /// Remaining seconds, or the configured duration while unarmed
    pub display_remaining: u64,
    /// Duration of the armed timer, or the configured duration
    pub display_total: u64,
    pub percent_elapsed: u8,
    /// Whether the compact indicator should be drawn
    pub compact_visible: bool,
    pub remaining_clock: String,
    pub total_clock: String,
}

impl TimerView {
    pub fn of(record: &TimerRecord) -> Self {
        let display_remaining = record
            .remaining_seconds
            .unwrap_or_else(|| record.configured_total());
        let display_total = record
            .total_seconds
            .unwrap_or_else(|| record.configured_total());

        Self {
            state: TimerState::of(record),
            record: record.clone(),
            display_remaining,
            display_total,
            percent_elapsed: percent_elapsed(record),
            compact_visible: record.is_armed() && !record.closed && !record.popup_hidden,
            remaining_clock: format_clock(display_remaining),
            total_clock: format_clock(display_total),
        }
    }
}

/// Share of the armed duration already spent, rounded, within `0..=100`.
pub fn percent_elapsed(record: &TimerRecord) -> u8 {
    match record.total_seconds {
        Some(total) if total > 0 => {
            let remaining = record.remaining_seconds.unwrap_or(total).min(total);
            let pct = (100.0 * (total - remaining) as f64 / total as f64).round();
            pct.clamp(0.0, 100.0) as u8
        }
        _ => 0,
    }
}

/// Render seconds as `mm:ss`; minutes grow past two digits as needed.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TimerPatch;

    #[test]
    fn unarmed_view_shows_configured_duration() {
        let record = TimerRecord {
            configured_minutes: 1,
            configured_seconds: 30,
            ..TimerRecord::new()
        };
        let view = TimerView::of(&record);

        assert_eq!(view.state, TimerState::Unarmed);
        assert_eq!(view.display_remaining, 90);
        assert_eq!(view.display_total, 90);
        assert_eq!(view.percent_elapsed, 0);
        assert!(!view.compact_visible);
        assert_eq!(view.remaining_clock, "01:30");
    }

    #[test]
    fn percent_rounds_to_nearest() {
        let record = TimerRecord::new().merged(&TimerPatch::armed_running(90, 60));
        assert_eq!(percent_elapsed(&record), 33);
        let record = TimerRecord::new().merged(&TimerPatch::armed_running(3, 1));
        assert_eq!(percent_elapsed(&record), 67);
        let record = TimerRecord::new().merged(&TimerPatch::armed_paused(90, 90));
        assert_eq!(percent_elapsed(&record), 0);
    }

    #[test]
    fn compact_indicator_hides_when_closed_or_hidden() {
        let armed = TimerRecord::new().merged(&TimerPatch::armed_paused(60, 60));
        assert!(TimerView::of(&armed).compact_visible);

        let hidden = armed.clone().merged(&TimerPatch::popup_hidden(true));
        assert!(!TimerView::of(&hidden).compact_visible);

        let closed = TimerRecord { closed: true, ..armed };
        assert!(!TimerView::of(&closed).compact_visible);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(59), "00:59");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(6000), "100:00");
        assert_eq!(format_clock(u64::MAX), "307445734561825860:15");
    }

    #[test]
    fn saturated_durations_render_their_full_length() {
        let record = TimerRecord::new().merged(&TimerPatch::armed_paused(u64::MAX, u64::MAX));
        let view = TimerView::of(&record);
        assert_eq!(view.remaining_clock, "307445734561825860:15");
        assert_eq!(view.total_clock, view.remaining_clock);
        assert_eq!(view.percent_elapsed, 0);
    }

    #[test]
    fn view_serializes_phase_tag() {
        let record = TimerRecord::new().merged(&TimerPatch::armed_running(60, 59));
        let json = serde_json::to_value(TimerView::of(&record)).unwrap();
        assert_eq!(json["phase"], "running");
        assert_eq!(json["remaining"], 59);
        assert_eq!(json["displayRemaining"], 59);
        assert_eq!(json["record"]["totalSeconds"], 60);
    }
}
