//! Producer-mode HTTP server: accepts user requests and queues them for the worker

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Request middleware
pub mod middleware;
/// HTTP routes
pub mod routes;
/// Server setup
pub mod server;
/// Environment, errors and extractors
pub mod types;
/// Typed queue of user requests
pub mod user_queue;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use work_queue::{Producer, QueueManager, QueueMonitor, QueueTransport};

use crate::{middleware::BearerAuth, types::Environment, user_queue::UserRequestQueue};

/// Resolves the work queue and serves the API until `shutdown_token` is cancelled
///
/// # Errors
///
/// Returns an error if the queue cannot be resolved or the server fails
pub async fn run(
    environment: Environment,
    transport: Arc<dyn QueueTransport>,
    shutdown_token: CancellationToken,
) -> anyhow::Result<()> {
    let queue_url = QueueManager::new(transport.clone())
        .resolve(&environment.queue_settings())
        .await
        .context("Failed to resolve work queue")?;
    tracing::info!(%queue_url, "Work queue resolved");

    let user_queue = Arc::new(UserRequestQueue::new(
        Producer::new(transport.clone(), queue_url.clone()),
        environment.send_delay_seconds(),
    ));
    let monitor = QueueMonitor::new(transport, queue_url);
    let auth = BearerAuth::new(environment.api_tokens());

    server::start(environment, user_queue, monitor, auth, shutdown_token).await
}
