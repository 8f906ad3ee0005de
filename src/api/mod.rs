//! HTTP API module
//!
//! The gesture and display side of one instance: intents come in as POSTs,
//! the current view goes out as JSON or a server-sent event stream.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::TimerInstance;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(instance: Arc<TimerInstance>) -> Router {
    Router::new()
        .route("/timer", get(view_handler))
        .route("/timer/events", get(events_handler))
        .route("/timer/confirm", post(confirm_handler))
        .route("/timer/toggle", post(toggle_handler))
        .route("/timer/pause", post(pause_handler))
        .route("/timer/resume", post(resume_handler))
        .route("/timer/restart", post(restart_handler))
        .route("/timer/stop", post(stop_handler))
        .route("/timer/popup/hide", post(hide_popup_handler))
        .route("/timer/popup/show", post(show_popup_handler))
        .route(
            "/timer/popup/position",
            get(get_position_handler).put(put_position_handler),
        )
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::store::{MemoryBackend, TimerStore};

    fn instance() -> Arc<TimerInstance> {
        Arc::new(TimerInstance::new(TimerStore::new(Arc::new(
            MemoryBackend::new().open(),
        ))))
    }

    async fn call(router: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn confirm_then_toggle_runs_the_timer() {
        let instance = instance();
        let router = create_router(Arc::clone(&instance));

        let (status, body) = call(
            router.clone(),
            "POST",
            "/timer/confirm",
            Some(r#"{"minutes":1,"seconds":30}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "paused");
        assert_eq!(body["timer"]["total"], 90);

        let (_, body) = call(router.clone(), "POST", "/timer/toggle", None).await;
        assert_eq!(body["status"], "running");

        let (_, body) = call(router, "GET", "/timer", None).await;
        assert_eq!(body["phase"], "running");
        assert_eq!(body["remainingClock"], "01:30");
    }

    #[tokio::test]
    async fn zero_duration_is_unprocessable() {
        let router = create_router(instance());
        let (status, body) = call(
            router,
            "POST",
            "/timer/confirm",
            Some(r#"{"minutes":0,"seconds":0}"#),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");
        assert_eq!(body["timer"]["phase"], "unarmed");
    }

    #[tokio::test]
    async fn stop_reports_last_action_on_status() {
        let instance = instance();
        let router = create_router(Arc::clone(&instance));
        instance.confirm(0, 30).unwrap();

        let (_, body) = call(router.clone(), "POST", "/timer/stop", None).await;
        assert_eq!(body["status"], "unarmed");
        assert_eq!(body["timer"]["record"]["closed"], true);

        let (_, body) = call(router, "GET", "/status", None).await;
        assert_eq!(body["last_action"], "stop");
        assert!(body["last_store_error"].is_null());
    }

    #[tokio::test]
    async fn popup_position_round_trip() {
        let router = create_router(instance());
        let (_, body) = call(
            router.clone(),
            "PUT",
            "/timer/popup/position",
            Some(r#"{"x":320,"y":1}"#),
        )
        .await;
        assert_eq!(body["y"], 6);

        let (_, body) = call(router, "GET", "/timer/popup/position", None).await;
        assert_eq!(body["x"], 320);
    }
}
