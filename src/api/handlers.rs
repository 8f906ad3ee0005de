//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tracing::{info, warn};

use crate::state::{PopupPosition, TimerInstance, TimerRecord, TimerView};
use super::responses::{ApiResponse, ConfirmRequest, HealthResponse, StatusResponse};

type ApiResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

fn respond(message: &str, record: &TimerRecord) -> Json<ApiResponse> {
    Json(ApiResponse::of(message.to_string(), TimerView::of(record)))
}

/// Handle POST /timer/confirm - Arm a paused timer
pub async fn confirm_handler(
    State(instance): State<Arc<TimerInstance>>,
    Json(request): Json<ConfirmRequest>,
) -> ApiResult {
    match instance.confirm(request.minutes, request.seconds) {
        Ok(record) => Ok(respond("Timer armed", &record)),
        Err(e) => {
            info!("Confirm endpoint rejected input: {}", e);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::error(e.to_string(), instance.view())),
            ))
        }
    }
}

/// Handle POST /timer/toggle - Pause if running, resume if paused
pub async fn toggle_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Timer toggled", &instance.toggle())
}

/// Handle POST /timer/pause
pub async fn pause_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Timer paused", &instance.pause())
}

/// Handle POST /timer/resume
pub async fn resume_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Timer resumed", &instance.resume())
}

/// Handle POST /timer/restart - Rewind to the full duration
pub async fn restart_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Timer restarted", &instance.restart())
}

/// Handle POST /timer/stop - Disarm and close
pub async fn stop_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Timer stopped", &instance.stop())
}

/// Handle POST /timer/popup/hide
pub async fn hide_popup_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Popup hidden", &instance.hide_popup())
}

/// Handle POST /timer/popup/show
pub async fn show_popup_handler(State(instance): State<Arc<TimerInstance>>) -> Json<ApiResponse> {
    respond("Popup shown", &instance.show_popup())
}

/// Handle GET /timer - Current view of the shared timer
pub async fn view_handler(State(instance): State<Arc<TimerInstance>>) -> Json<TimerView> {
    Json(instance.view())
}

/// Handle GET /timer/events - Stream a fresh view after every change signal
pub async fn events_handler(
    State(instance): State<Arc<TimerInstance>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = instance.bus().subscribe();
    let first = instance.view();

    let events = stream::unfold(
        (instance, subscription, Some(first)),
        |(instance, mut subscription, first)| async move {
            let view = match first {
                Some(view) => view,
                None => {
                    subscription.recv().await?;
                    TimerView::of(&instance.resync())
                }
            };
            let event = Event::default()
                .event("timer")
                .json_data(&view)
                .unwrap_or_else(|e| {
                    warn!("Failed to encode timer event: {}", e);
                    Event::default().comment("encode error")
                });
            Some((Ok(event), (instance, subscription, None)))
        },
    );

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handle GET /timer/popup/position
pub async fn get_position_handler(
    State(instance): State<Arc<TimerInstance>>,
) -> Json<PopupPosition> {
    Json(instance.popup_position())
}

/// Handle PUT /timer/popup/position
pub async fn put_position_handler(
    State(instance): State<Arc<TimerInstance>>,
    Json(position): Json<PopupPosition>,
) -> Json<PopupPosition> {
    Json(instance.set_popup_position(position))
}

/// Handle GET /status - Instance status
pub async fn status_handler(State(instance): State<Arc<TimerInstance>>) -> Json<StatusResponse> {
    let (last_action, last_action_time) = instance.get_last_action();

    Json(StatusResponse {
        timer: instance.view(),
        uptime: instance.get_uptime(),
        subscribers: instance.bus().subscriber_count(),
        last_action,
        last_action_time,
        last_store_error: instance.last_store_error(),
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
