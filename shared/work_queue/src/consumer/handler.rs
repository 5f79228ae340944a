use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    envelope::InFlightMessage,
    visibility::{HeartbeatGuard, VisibilityExtender},
};

/// Business logic invoked for every received message
///
/// Returning an error leaves the message on the queue, so it is redelivered
/// once its lease expires.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one message
    async fn handle(&self, ctx: &HandlerContext, message: &InFlightMessage) -> anyhow::Result<()>;
}

/// Per-worker context passed to the handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Id of the worker processing the message
    pub worker_id: usize,
    /// Cancelled when the consumer shuts down
    pub shutdown: CancellationToken,
    /// Lease extension for the consumer's queue
    pub visibility: VisibilityExtender,
}

impl HandlerContext {
    /// Starts a heartbeat that keeps `message` leased while the guard is alive
    #[must_use = "dropping the guard stops the heartbeat"]
    pub fn keep_alive(
        &self,
        message: &InFlightMessage,
        interval: Duration,
        extension_seconds: i32,
    ) -> HeartbeatGuard {
        self.visibility.spawn_heartbeat(
            message.lease_handle.clone(),
            interval,
            extension_seconds,
            &self.shutdown,
        )
    }
}
