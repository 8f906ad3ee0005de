//! Rest Timer - one instance of the shared rest timer
//!
//! This is the main entry point for the rest-timer daemon.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use rest_timer::{
    api::create_router,
    config::Config,
    state::TimerInstance,
    store::{FileStore, KeyValueStore, MemoryBackend, TimerStore},
    tasks::{periodic_resync_task, tick_scheduler_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("rest_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting rest-timer v{}", env!("CARGO_PKG_VERSION"));

    let backend: Arc<dyn KeyValueStore> = if config.memory {
        info!("Using in-memory store");
        Arc::new(MemoryBackend::new().open())
    } else {
        Arc::new(FileStore::open(config.store_dir())?)
    };

    // Join the shared timer
    let instance = Arc::new(TimerInstance::new(TimerStore::new(backend)));

    let ticker = Arc::clone(&instance);
    tokio::spawn(async move {
        tick_scheduler_task(ticker).await;
    });

    let resync = Arc::clone(&instance);
    let period = config.resync_period();
    tokio::spawn(async move {
        periodic_resync_task(resync, period).await;
    });

    let app = create_router(instance);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /timer                 - Current timer view");
    info!("  GET  /timer/events          - Timer view stream (SSE)");
    info!("  POST /timer/confirm         - Arm for {{minutes, seconds}}");
    info!("  POST /timer/toggle          - Pause or resume");
    info!("  POST /timer/restart         - Rewind to full duration");
    info!("  POST /timer/stop            - Disarm and close");
    info!("  POST /timer/popup/hide|show - Compact indicator visibility");
    info!("  GET  /status                - Instance status");
    info!("  GET  /health                - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
