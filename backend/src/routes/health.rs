use axum::{http::StatusCode, Extension, Json};
use schemars::JsonSchema;
use serde::Serialize;
use work_queue::{QueueMonitor, QueueStats};

use crate::types::AppError;

/// Approximate depth of the work queue
#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepth {
    /// Messages waiting to be received
    visible: u64,
    /// Messages received but not yet deleted
    in_flight: u64,
    /// Messages waiting for their delivery delay
    delayed: u64,
}

impl From<QueueStats> for QueueDepth {
    fn from(stats: QueueStats) -> Self {
        Self {
            visible: stats.visible,
            in_flight: stats.in_flight,
            delayed: stats.delayed,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct HealthResponse {
    status: String,
    /// Current version of the application
    semver: String,
    /// Commit hash of the current build (if available)
    rev: Option<String>,
    /// Work queue depth
    queue: QueueDepth,
}

/// Health check endpoint
///
/// Returns the current status and version information of the service
/// together with the work queue depth. Responds `503` when the queue
/// cannot be reached.
pub async fn handler(
    Extension(monitor): Extension<QueueMonitor>,
) -> Result<Json<HealthResponse>, AppError> {
    let stats = monitor.stats().await.map_err(|e| {
        tracing::error!("Queue health check failed: {e}");
        AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "queue_unavailable",
            "Queue service temporarily unavailable",
            true,
        )
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        semver: env!("CARGO_PKG_VERSION").to_string(),
        rev: option_env!("GIT_REV").map(ToString::to_string),
        queue: stats.into(),
    }))
}
