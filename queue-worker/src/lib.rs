//! Consumer-mode worker: receives queued requests and dispatches them by type

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod handlers;
pub mod health;
pub mod registry;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use work_queue::{Consumer, QueueManager, QueueMonitor, QueueTransport, StopReason};

use crate::types::Environment;

/// Resolves the queue, then runs the health server and the consumer until
/// `shutdown_token` is cancelled and every worker has drained.
///
/// # Errors
///
/// Returns an error if the handler registry is incomplete, the queue cannot
/// be resolved, or the health port is invalid
pub async fn run(
    env: &Environment,
    transport: Arc<dyn QueueTransport>,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let registry = handlers::default_registry(env.handler_work_duration());
    registry.validate().context("Invalid handler registry")?;

    let queue_url = QueueManager::new(transport.clone())
        .resolve(&env.queue_settings())
        .await
        .context("Failed to resolve work queue")?;
    info!(%queue_url, "Work queue resolved");

    let port = env.health_port().context("Invalid PORT")?;
    let monitor = QueueMonitor::new(transport.clone(), queue_url.clone());
    let health_shutdown = shutdown_token.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health::start_health_server(port, monitor, health_shutdown).await {
            error!("Health server error: {}", e);
        }
    });

    let consumer = Consumer::new(
        transport,
        env.consumer_config(&queue_url),
        Arc::new(registry),
    );

    match consumer.start(shutdown_token).await {
        StopReason::Cancelled => info!("Consumer stopped"),
        StopReason::WorkersFailed(count) => warn!(count, "Consumer stopped with failed workers"),
    }

    if let Err(e) = health_handle.await {
        error!("Health server task error: {e}");
    }

    Ok(())
}
