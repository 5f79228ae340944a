use common_types::{CreateUserPayload, DeleteUserPayload, MessageKind};
use work_queue::{NewMessage, Producer, QueueResult};

/// Enqueues user requests for the worker
#[derive(Debug, Clone)]
pub struct UserRequestQueue {
    producer: Producer,
    delay_seconds: i32,
}

impl UserRequestQueue {
    /// Creates a queue that sends every request with `delay_seconds` delivery delay
    #[must_use]
    pub const fn new(producer: Producer, delay_seconds: i32) -> Self {
        Self {
            producer,
            delay_seconds,
        }
    }

    /// Queues a `user.create` request and returns its message id
    ///
    /// # Errors
    ///
    /// Returns the producer error if the message cannot be encoded or sent
    pub async fn enqueue_create(&self, payload: &CreateUserPayload) -> QueueResult<String> {
        let message = NewMessage::from_payload(MessageKind::UserCreate.as_ref(), payload)?;
        self.producer.send(message, self.delay_seconds).await
    }

    /// Queues a `user.delete` request and returns its message id
    ///
    /// # Errors
    ///
    /// Returns the producer error if the message cannot be encoded or sent
    pub async fn enqueue_delete(&self, payload: &DeleteUserPayload) -> QueueResult<String> {
        let message = NewMessage::from_payload(MessageKind::UserDelete.as_ref(), payload)?;
        self.producer.send(message, self.delay_seconds).await
    }
}
