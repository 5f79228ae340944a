use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    error::{QueueError, QueueResult},
    transport::QueueTransport,
};

/// Extends the lease of in-flight messages on one queue
#[derive(Clone)]
pub struct VisibilityExtender {
    transport: Arc<dyn QueueTransport>,
    queue_url: Arc<str>,
}

impl std::fmt::Debug for VisibilityExtender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisibilityExtender")
            .field("queue_url", &self.queue_url)
            .finish_non_exhaustive()
    }
}

impl VisibilityExtender {
    /// Creates an extender bound to one queue
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>, queue_url: &str) -> Self {
        Self {
            transport,
            queue_url: Arc::from(queue_url),
        }
    }

    /// Sets the remaining lease of a message to `additional_seconds` from now
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the extension call fails
    pub async fn extend(&self, lease_handle: &str, additional_seconds: i32) -> QueueResult<()> {
        self.transport
            .extend_visibility(&self.queue_url, lease_handle, additional_seconds)
            .await
            .map_err(QueueError::transport("Failed to change message visibility"))
    }

    /// Extends the lease every `interval` until cancelled.
    ///
    /// The first extension happens one full interval after the call. The
    /// heartbeat stops on the first failed extension.
    pub async fn heartbeat(
        &self,
        lease_handle: &str,
        interval: Duration,
        extension_seconds: i32,
        shutdown: CancellationToken,
    ) {
        if interval.is_zero() {
            warn!("Heartbeat interval must be positive, not extending lease");
            return;
        }

        let Some(start) = Instant::now().checked_add(interval) else {
            warn!("Heartbeat interval is too large, not extending lease");
            return;
        };

        let mut ticker = interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Heartbeat cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.extend(lease_handle, extension_seconds).await {
                        error!("Failed to extend message lease, stopping heartbeat: {e}");
                        return;
                    }
                    debug!(extension_seconds, "Extended message lease");
                }
            }
        }
    }

    /// Runs [`Self::heartbeat`] on a separate task.
    ///
    /// The heartbeat stops when the returned guard is stopped or dropped, or
    /// when `shutdown` is cancelled.
    #[must_use = "dropping the guard stops the heartbeat"]
    pub fn spawn_heartbeat(
        &self,
        lease_handle: impl Into<String>,
        interval: Duration,
        extension_seconds: i32,
        shutdown: &CancellationToken,
    ) -> HeartbeatGuard {
        let token = shutdown.child_token();
        let extender = self.clone();
        let lease_handle = lease_handle.into();
        let heartbeat_token = token.clone();

        let handle = tokio::spawn(async move {
            extender
                .heartbeat(&lease_handle, interval, extension_seconds, heartbeat_token)
                .await;
        });

        HeartbeatGuard {
            token,
            handle: Some(handle),
        }
    }
}

/// Stops a spawned heartbeat when dropped
#[derive(Debug)]
pub struct HeartbeatGuard {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatGuard {
    /// Whether the heartbeat task has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancels the heartbeat and waits for it to exit
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Heartbeat task failed: {e}");
            }
        }
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_support::{wait_until, CountingTransport},
        transport::memory::InMemoryTransport,
        types::{OutgoingMessage, QueueAttributes, ReceiveRequest},
    };

    async fn leased_message(transport: &CountingTransport) -> (String, String) {
        let queue_url = transport
            .create_queue("visibility-tests", QueueAttributes::new())
            .await
            .expect("Failed to create queue");
        transport
            .send(
                &queue_url,
                OutgoingMessage {
                    body: "work".to_string(),
                    ..OutgoingMessage::default()
                },
            )
            .await
            .expect("Failed to send");
        let received = transport
            .receive(
                &queue_url,
                ReceiveRequest {
                    max_messages: 1,
                    wait_time_seconds: 0,
                    visibility_timeout: 30,
                },
            )
            .await
            .expect("Failed to receive");

        (queue_url, received[0].receipt_handle.clone())
    }

    #[tokio::test]
    async fn test_extend_reports_transport_errors() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);

        extender
            .extend(&lease_handle, 60)
            .await
            .expect("Extension should succeed");

        let result = extender.extend("unknown-handle", 60).await;
        assert!(matches!(result, Err(QueueError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_heartbeat_extends_until_cancelled() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);
        let shutdown = CancellationToken::new();

        let guard =
            extender.spawn_heartbeat(lease_handle, Duration::from_millis(20), 30, &shutdown);

        assert!(wait_until(Duration::from_secs(2), || transport.extend_calls() >= 3).await);
        guard.stop().await;

        let calls = transport.extend_calls();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.extend_calls(), calls);
    }

    #[tokio::test]
    async fn test_heartbeat_waits_one_interval_before_first_extension() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);
        let shutdown = CancellationToken::new();

        let _guard =
            extender.spawn_heartbeat(lease_handle, Duration::from_secs(10), 30, &shutdown);
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(transport.extend_calls(), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_with_unrepresentable_interval_returns() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);

        tokio::time::timeout(
            Duration::from_secs(1),
            extender.heartbeat(&lease_handle, Duration::MAX, 30, CancellationToken::new()),
        )
        .await
        .expect("Heartbeat should return immediately");

        assert_eq!(transport.extend_calls(), 0);
    }

    #[tokio::test]
    async fn test_heartbeat_stops_on_first_failure() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);
        let shutdown = CancellationToken::new();
        transport.fail_extends(true);

        let guard =
            extender.spawn_heartbeat(lease_handle, Duration::from_millis(10), 30, &shutdown);

        assert!(wait_until(Duration::from_secs(2), || guard.is_finished()).await);
        assert_eq!(transport.extend_calls(), 1);
    }

    #[tokio::test]
    async fn test_heartbeat_follows_parent_cancellation() {
        let transport = Arc::new(CountingTransport::new(InMemoryTransport::new()));
        let (queue_url, lease_handle) = leased_message(&transport).await;
        let extender = VisibilityExtender::new(transport.clone(), &queue_url);
        let shutdown = CancellationToken::new();

        let guard =
            extender.spawn_heartbeat(lease_handle, Duration::from_secs(10), 30, &shutdown);
        shutdown.cancel();

        assert!(wait_until(Duration::from_secs(2), || guard.is_finished()).await);
        assert_eq!(transport.extend_calls(), 0);
    }
}
