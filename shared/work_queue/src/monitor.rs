use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::{QueueError, QueueResult},
    transport::QueueTransport,
    types::{QueueAttribute, QueueAttributes},
};

/// Approximate message counts of a queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    /// Messages available for retrieval
    pub visible: u64,
    /// Messages received but not yet deleted
    pub in_flight: u64,
    /// Messages waiting for their delivery delay
    pub delayed: u64,
}

/// Reads depth counters of one queue
#[derive(Clone)]
pub struct QueueMonitor {
    transport: Arc<dyn QueueTransport>,
    queue_url: String,
}

impl std::fmt::Debug for QueueMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueMonitor")
            .field("queue_url", &self.queue_url)
            .finish_non_exhaustive()
    }
}

/// Missing or unparsable counts read as zero
fn count(attributes: &QueueAttributes, attribute: QueueAttribute) -> u64 {
    attributes
        .get(&attribute)
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

impl QueueMonitor {
    /// Creates a monitor bound to one queue
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>, queue_url: impl Into<String>) -> Self {
        Self {
            transport,
            queue_url: queue_url.into(),
        }
    }

    /// URL of the monitored queue
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Reads the approximate visible, in-flight and delayed counts
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the attributes cannot be read
    pub async fn stats(&self) -> QueueResult<QueueStats> {
        let attributes = self
            .transport
            .get_attributes(
                &self.queue_url,
                &[
                    QueueAttribute::ApproximateNumberOfMessages,
                    QueueAttribute::ApproximateNumberOfMessagesNotVisible,
                    QueueAttribute::ApproximateNumberOfMessagesDelayed,
                ],
            )
            .await
            .map_err(QueueError::transport("Failed to get queue attributes"))?;

        Ok(QueueStats {
            visible: count(&attributes, QueueAttribute::ApproximateNumberOfMessages),
            in_flight: count(
                &attributes,
                QueueAttribute::ApproximateNumberOfMessagesNotVisible,
            ),
            delayed: count(
                &attributes,
                QueueAttribute::ApproximateNumberOfMessagesDelayed,
            ),
        })
    }

    /// Succeeds iff the queue depth can be read
    ///
    /// # Errors
    ///
    /// Returns the error of the depth read
    pub async fn health_check(&self) -> QueueResult<()> {
        self.stats().await.map(|_| ())
    }
}
