use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use work_queue::QueueMonitor;

/// Reports whether the work queue is reachable
///
/// Returns 503 when the queue depth cannot be read
async fn health(State(monitor): State<QueueMonitor>) -> impl IntoResponse {
    match monitor.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "queue-worker",
                "queue": stats,
            })),
        ),
        Err(e) => {
            warn!("Queue health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "queue-worker",
                })),
            )
        }
    }
}

/// Router serving `GET /health`
pub fn router(monitor: QueueMonitor) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(monitor)
}

/// Start the health check HTTP server
///
/// # Errors
///
/// Returns an error if the server fails to bind to the specified address
pub async fn start_health_server(
    port: u16,
    monitor: QueueMonitor,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Health check server listening on {}", addr);

    axum::serve(listener, router(monitor))
        .with_graceful_shutdown(async move {
            shutdown_token.cancelled().await;
        })
        .await?;

    Ok(())
}
