use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use crate::{
    envelope::{Envelope, NewMessage},
    error::{QueueError, QueueResult},
    transport::QueueTransport,
    types::{
        BatchResult, OutgoingMessage, SendBatchEntry, CORRELATION_ID_ATTRIBUTE, MAX_BATCH_SIZE,
        MESSAGE_TYPE_ATTRIBUTE,
    },
};

/// Maximum delivery delay accepted by the queue, in seconds
pub const MAX_DELAY_SECONDS: i32 = 900;

/// Serializes envelopes and submits them to a queue
#[derive(Clone)]
pub struct Producer {
    transport: Arc<dyn QueueTransport>,
    queue_url: String,
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("queue_url", &self.queue_url)
            .finish_non_exhaustive()
    }
}

impl Producer {
    /// Creates a producer bound to one queue
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>, queue_url: impl Into<String>) -> Self {
        Self {
            transport,
            queue_url: queue_url.into(),
        }
    }

    /// URL of the queue this producer sends to
    #[must_use]
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Sends a message with an optional delivery delay
    ///
    /// # Arguments
    ///
    /// * `message` - The message to send; id, version and timestamp are stamped here
    /// * `delay_seconds` - Delivery delay, 0 for immediate delivery
    ///
    /// # Returns
    ///
    /// The envelope id
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for an empty type or a delay outside 0 to 900 seconds,
    /// `QueueError::Encoding` if the envelope cannot be serialized and
    /// `QueueError::Transport` if the send fails
    pub async fn send(&self, message: NewMessage, delay_seconds: i32) -> QueueResult<String> {
        validate_kind(&message)?;
        if !(0..=MAX_DELAY_SECONDS).contains(&delay_seconds) {
            return Err(QueueError::Validation(format!(
                "delay must be between 0 and {MAX_DELAY_SECONDS} seconds, got {delay_seconds}"
            )));
        }

        let envelope = message.stamp();
        let outgoing = OutgoingMessage {
            delay_seconds,
            ..encode(&envelope)?
        };

        let message_id = self
            .transport
            .send(&self.queue_url, outgoing)
            .await
            .map_err(QueueError::transport("Failed to send message"))?;

        info!(
            id = %envelope.id,
            message_type = %envelope.kind,
            message_id = %message_id,
            delay_seconds,
            "Message sent"
        );

        Ok(envelope.id)
    }

    /// Sends a message to an ordered group of a FIFO queue
    ///
    /// The deduplication id defaults to the envelope id when empty.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for an empty type or group id,
    /// `QueueError::Encoding` if the envelope cannot be serialized and
    /// `QueueError::Transport` if the send fails
    pub async fn send_ordered(
        &self,
        message: NewMessage,
        group_id: &str,
        deduplication_id: Option<&str>,
    ) -> QueueResult<String> {
        validate_kind(&message)?;
        if group_id.is_empty() {
            return Err(QueueError::Validation(
                "group id must not be empty".to_string(),
            ));
        }

        let envelope = message.stamp();
        let deduplication_id = deduplication_id
            .filter(|id| !id.is_empty())
            .unwrap_or(&envelope.id)
            .to_string();
        let outgoing = OutgoingMessage {
            group_id: Some(group_id.to_string()),
            deduplication_id: Some(deduplication_id),
            ..encode(&envelope)?
        };

        let message_id = self
            .transport
            .send(&self.queue_url, outgoing)
            .await
            .map_err(QueueError::transport("Failed to send FIFO message"))?;

        info!(
            id = %envelope.id,
            message_type = %envelope.kind,
            message_id = %message_id,
            group_id,
            "Ordered message sent"
        );

        Ok(envelope.id)
    }

    /// Sends up to ten messages in a single call
    ///
    /// Entries are identified by their envelope ids. Per-entry rejections are
    /// reported in the returned [`BatchResult`], in input order.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for more than ten messages or an empty type,
    /// `QueueError::Encoding` if an envelope cannot be serialized and
    /// `QueueError::Transport` if the batch call fails as a whole
    pub async fn send_batch(&self, messages: Vec<NewMessage>) -> QueueResult<BatchResult> {
        if messages.is_empty() {
            return Ok(BatchResult::default());
        }
        if messages.len() > MAX_BATCH_SIZE {
            return Err(QueueError::Validation(format!(
                "batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                messages.len()
            )));
        }
        for message in &messages {
            validate_kind(message)?;
        }

        let entries = messages
            .into_iter()
            .map(|message| {
                let envelope = message.stamp();
                Ok(SendBatchEntry {
                    message: encode(&envelope)?,
                    id: envelope.id,
                })
            })
            .collect::<QueueResult<Vec<_>>>()?;
        let ids: Vec<String> = entries.iter().map(|entry| entry.id.clone()).collect();

        let result = self
            .transport
            .send_batch(&self.queue_url, entries)
            .await
            .map_err(QueueError::transport("Failed to send message batch"))?
            .in_input_order(&ids);

        debug!(
            successful = result.successful.len(),
            failed = result.failed.len(),
            "Message batch sent"
        );

        Ok(result)
    }
}

fn validate_kind(message: &NewMessage) -> QueueResult<()> {
    if message.kind.is_empty() {
        return Err(QueueError::Validation(
            "message type must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Serializes an envelope and attaches its type and id as message attributes
fn encode(envelope: &Envelope) -> QueueResult<OutgoingMessage> {
    Ok(OutgoingMessage {
        body: serde_json::to_string(envelope)?,
        attributes: HashMap::from([
            (MESSAGE_TYPE_ATTRIBUTE.to_string(), envelope.kind.clone()),
            (CORRELATION_ID_ATTRIBUTE.to_string(), envelope.id.clone()),
        ]),
        ..OutgoingMessage::default()
    })
}
