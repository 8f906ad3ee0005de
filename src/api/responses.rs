//! API request and response structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{TimerState, TimerView};

/// Body of `POST /timer/confirm`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub minutes: i64,
    #[serde(default)]
    pub seconds: i64,
}

/// API response structure for timer intents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: String, message: String, timer: TimerView) -> Self {
        Self {
            status,
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// Response whose status names the timer's phase
    pub fn of(message: String, timer: TimerView) -> Self {
        let status = match timer.state {
            TimerState::Unarmed => "unarmed",
            TimerState::Paused { .. } => "paused",
            TimerState::Running { .. } => "running",
        };
        Self::new(status.to_string(), message, timer)
    }

    /// Create an error response
    pub fn error(message: String, timer: TimerView) -> Self {
        Self::new("error".to_string(), message, timer)
    }
}

/// Instance status with the current timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerView,
    pub uptime: String,
    pub subscribers: usize,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
    pub last_store_error: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
