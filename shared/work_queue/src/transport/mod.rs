//! Transport abstraction over the remote queue service
//!
//! The producer, consumer and manager only talk to the queue through
//! [`QueueTransport`]. Two implementations ship with the crate: [`sqs::SqsTransport`]
//! backed by `aws-sdk-sqs`, and [`memory::InMemoryTransport`], an in-process queue
//! service used by tests and local runs.

use async_trait::async_trait;

use crate::{
    error::TransportResult,
    types::{
        BatchResult, DeleteBatchEntry, OutgoingMessage, QueueAttribute, QueueAttributes,
        ReceiveRequest, ReceivedMessage, RedrivePolicy, SendBatchEntry,
    },
};

/// In-process queue service
pub mod memory;
/// AWS SQS transport
pub mod sqs;

/// Operations of the remote queue service
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Long-polls for messages and leases them for `request.visibility_timeout` seconds
    async fn receive(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> TransportResult<Vec<ReceivedMessage>>;

    /// Deletes one leased message
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> TransportResult<()>;

    /// Deletes several leased messages in one call
    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteBatchEntry>,
    ) -> TransportResult<BatchResult>;

    /// Sends one message and returns the transport-assigned id
    async fn send(&self, queue_url: &str, message: OutgoingMessage) -> TransportResult<String>;

    /// Sends several messages in one call
    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendBatchEntry>,
    ) -> TransportResult<BatchResult>;

    /// Sets the remaining lease of a message to `seconds` from now
    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        seconds: i32,
    ) -> TransportResult<()>;

    /// Creates a queue and returns its URL
    async fn create_queue(&self, name: &str, attributes: QueueAttributes)
        -> TransportResult<String>;

    /// Resolves a queue URL by name
    async fn get_queue_url(&self, name: &str) -> TransportResult<String>;

    /// Deletes a queue
    async fn delete_queue(&self, queue_url: &str) -> TransportResult<()>;

    /// Removes every message from a queue
    async fn purge_queue(&self, queue_url: &str) -> TransportResult<()>;

    /// Installs a dead-letter redirect on a queue
    async fn set_redrive_policy(
        &self,
        queue_url: &str,
        policy: &RedrivePolicy,
    ) -> TransportResult<()>;

    /// Reads queue attributes
    async fn get_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttribute],
    ) -> TransportResult<QueueAttributes>;
}
