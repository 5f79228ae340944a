use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Maximum number of entries in a single batch call
pub const MAX_BATCH_SIZE: usize = 10;

/// Message attribute carrying the envelope type
pub const MESSAGE_TYPE_ATTRIBUTE: &str = "MessageType";

/// Message attribute carrying the envelope id
pub const CORRELATION_ID_ATTRIBUTE: &str = "CorrelationId";

/// System attribute carrying the number of times a message was received
pub const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

/// A message as returned by the transport, before it is parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Transport-assigned message id
    pub message_id: String,
    /// Raw message body
    pub body: String,
    /// Lease handle required to delete or extend the message
    pub receipt_handle: String,
    /// Message and system attributes flattened to strings
    pub attributes: HashMap<String, String>,
}

/// A message to be submitted to the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Serialized message body
    pub body: String,
    /// String message attributes
    pub attributes: HashMap<String, String>,
    /// Delivery delay in seconds
    pub delay_seconds: i32,
    /// Ordered group, for FIFO queues
    pub group_id: Option<String>,
    /// Deduplication id, for FIFO queues
    pub deduplication_id: Option<String>,
}

/// Parameters of a receive call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveRequest {
    /// Maximum number of messages to return
    pub max_messages: i32,
    /// Long-poll wait in seconds
    pub wait_time_seconds: i32,
    /// Lease applied to the received messages, in seconds
    pub visibility_timeout: i32,
}

/// One entry of a batch send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendBatchEntry {
    /// Entry id, unique within the batch
    pub id: String,
    /// Message to send
    pub message: OutgoingMessage,
}

/// One entry of a batch delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteBatchEntry {
    /// Entry id, unique within the batch
    pub id: String,
    /// Lease handle of the message to delete
    pub receipt_handle: String,
}

/// Per-entry failure reported by a batch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    /// Entry id
    pub id: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Outcome of a batch call that reached the transport
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// Ids of the entries that were accepted
    pub successful: Vec<String>,
    /// Entries that were rejected
    pub failed: Vec<BatchFailure>,
}

impl BatchResult {
    /// Total number of entries accounted for
    #[must_use]
    pub fn len(&self) -> usize {
        self.successful.len() + self.failed.len()
    }

    /// Whether the result accounts for no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successful.is_empty() && self.failed.is_empty()
    }

    /// Whether every entry was accepted
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Reorders both lists to follow the order of `ids`
    #[must_use]
    pub(crate) fn in_input_order(mut self, ids: &[String]) -> Self {
        let position = |id: &str| ids.iter().position(|i| i == id).unwrap_or(usize::MAX);
        self.successful.sort_by_key(|id| position(id));
        self.failed.sort_by_key(|failure| position(&failure.id));
        self
    }
}

/// Queue attributes understood by the transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum QueueAttribute {
    /// All attributes, only meaningful in requests
    All,
    /// Number of messages available for retrieval
    ApproximateNumberOfMessages,
    /// Number of messages in flight
    ApproximateNumberOfMessagesNotVisible,
    /// Number of messages waiting for their delivery delay
    ApproximateNumberOfMessagesDelayed,
    /// Queue ARN
    QueueArn,
    /// Default lease duration in seconds
    VisibilityTimeout,
    /// Retention period in seconds
    MessageRetentionPeriod,
    /// Default long-poll wait in seconds
    ReceiveMessageWaitTimeSeconds,
    /// Default delivery delay in seconds
    DelaySeconds,
    /// Whether the queue is FIFO
    FifoQueue,
    /// Whether FIFO deduplication uses the message body
    ContentBasedDeduplication,
    /// Dead-letter redirect, as JSON
    RedrivePolicy,
}

/// Attribute map of a queue
pub type QueueAttributes = HashMap<QueueAttribute, String>;

/// Dead-letter redirect of a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrivePolicy {
    /// ARN of the dead-letter queue
    pub dead_letter_target_arn: String,
    /// Receives after which a message is moved to the dead-letter queue
    #[serde(deserialize_with = "number_or_string")]
    pub max_receive_count: u32,
}

fn number_or_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(count) => Ok(count),
        Count::Text(text) => text.parse().map_err(serde::de::Error::custom),
    }
}
