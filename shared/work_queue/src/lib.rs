//! Work queue engine for the request/reply services
//!
//! This crate moves work from the request-accepting backend to background workers
//! through a pull-based queue. It provides the message envelope, a transport
//! abstraction with SQS and in-memory implementations, a producer, a polling
//! consumer with a bounded worker pool, lease extension, and queue management.

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

/// Consumer engine and handler contract
pub mod consumer;
/// Message envelope and in-flight message types
pub mod envelope;
/// Error types for queue operations
pub mod error;
/// Queue lifecycle operations
pub mod manager;
/// Queue depth monitoring
pub mod monitor;
/// Message producer
pub mod producer;
/// Process signal handling
pub mod signal;
/// Transport abstraction and implementations
pub mod transport;
/// Common types shared by producer, consumer and transports
pub mod types;
/// Lease extension for in-flight messages
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_support;

pub use consumer::{Consumer, ConsumerConfig, HandlerContext, MessageHandler, StopReason};
pub use envelope::{Envelope, InFlightMessage, NewMessage, Payload, ENVELOPE_VERSION};
pub use error::{QueueError, QueueResult, TransportError, TransportResult};
pub use manager::{DeadLetterSettings, QueueManager, QueueSettings};
pub use monitor::{QueueMonitor, QueueStats};
pub use producer::Producer;
pub use transport::{memory::InMemoryTransport, sqs::SqsTransport, QueueTransport};
pub use types::{
    BatchFailure, BatchResult, QueueAttribute, QueueAttributes, RedrivePolicy, MAX_BATCH_SIZE,
};
pub use visibility::{HeartbeatGuard, VisibilityExtender};
