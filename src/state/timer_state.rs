//! Timer state machine
//!
//! ```text
//! Unarmed --confirm/restart--> Paused <--toggle--> Running
//!    ^                           ^                   |
//!    |                           +------tick(<=1)----+
//!    +------------stop (from anywhere)---------------+
//! ```
//!
//! Transitions are pure: they look at a record and return the patch to merge
//! into the store, or `None` when nothing changes.

use serde::{Deserialize, Serialize};

use super::record::{TimerPatch, TimerRecord};
use crate::error::ValidationError;

/// Logical state of the shared timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum TimerState {
    Unarmed,
    Paused { total: u64, remaining: u64 },
    Running { total: u64, remaining: u64 },
}

impl TimerState {
    /// Read the logical state out of a (normalized) record.
    pub fn of(record: &TimerRecord) -> Self {
        match (record.total_seconds, record.remaining_seconds) {
            (Some(total), Some(remaining)) if record.running => Self::Running { total, remaining },
            (Some(total), Some(remaining)) => Self::Paused { total, remaining },
            _ => Self::Unarmed,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn total(&self) -> Option<u64> {
        match *self {
            Self::Paused { total, .. } | Self::Running { total, .. } => Some(total),
            Self::Unarmed => None,
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        match *self {
            Self::Paused { remaining, .. } | Self::Running { remaining, .. } => Some(remaining),
            Self::Unarmed => None,
        }
    }
}

/// Everything that can happen to the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm { minutes: i64, seconds: i64 },
    Resume,
    Pause,
    Toggle,
    Tick,
    Restart,
    Stop,
    HidePopup,
    ShowPopup,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Confirm { .. } => "confirm",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Toggle => "toggle",
            Self::Tick => "tick",
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::HidePopup => "hide-popup",
            Self::ShowPopup => "show-popup",
        }
    }
}

/// Compute the patch a transition produces from `record`.
///
/// `Ok(None)` means the transition is a no-op in the current state.
pub fn apply(
    record: &TimerRecord,
    transition: Transition,
) -> Result<Option<TimerPatch>, ValidationError> {
    let state = TimerState::of(record);

    let patch = match transition {
        Transition::Confirm { minutes, seconds } => {
            let (m, s) = (minutes.max(0) as u64, seconds.max(0) as u64);
            let total = m.saturating_mul(60).saturating_add(s);
            if total == 0 {
                return Err(ValidationError::NonPositiveDuration { minutes, seconds });
            }
            Some(
                TimerPatch::armed_paused(total, total)
                    .with_configured(m, s)
                    .with_closed(false),
            )
        }
        Transition::Resume => resume(state),
        Transition::Pause => pause(state),
        Transition::Toggle => match state {
            TimerState::Running { .. } => pause(state),
            _ => resume(state),
        },
        Transition::Tick => match state {
            TimerState::Running { total, remaining } if remaining > 1 => {
                Some(TimerPatch::armed_running(total, remaining - 1))
            }
            // Completion resets to the full duration, stopped.
            TimerState::Running { total, .. } => Some(TimerPatch::armed_paused(total, total)),
            _ => None,
        },
        Transition::Restart => {
            let total = state.total().unwrap_or_else(|| record.configured_total());
            (total > 0).then(|| TimerPatch::armed_paused(total, total).with_closed(false))
        }
        Transition::Stop => Some(TimerPatch::unarmed().with_closed(true)),
        Transition::HidePopup => Some(TimerPatch::popup_hidden(true)),
        Transition::ShowPopup => Some(TimerPatch::popup_hidden(false)),
    };

    Ok(patch)
}

fn resume(state: TimerState) -> Option<TimerPatch> {
    match state {
        TimerState::Paused { total, remaining } if remaining > 0 => {
            Some(TimerPatch::armed_running(total, remaining).with_closed(false))
        }
        _ => None,
    }
}

fn pause(state: TimerState) -> Option<TimerPatch> {
    match state {
        TimerState::Running { total, remaining } => Some(TimerPatch::armed_paused(total, remaining)),
        _ => None,
    }
}
