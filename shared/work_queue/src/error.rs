use thiserror::Error;

/// Result type alias for transport calls
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors raised by a queue transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote service failed or rejected the request
    #[error("{operation} request failed: {message}")]
    Service {
        /// Name of the transport operation
        operation: &'static str,
        /// Error details reported by the service
        message: String,
        /// HTTP status of the response, when one was received
        status: Option<u16>,
    },

    /// The queue does not exist
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    /// The receipt handle does not match an in-flight message
    #[error("Receipt handle is invalid")]
    ReceiptHandleInvalid,

    /// The request was rejected as a whole before any entry was processed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The service response is missing a required field
    #[error("Missing field in response: {0}")]
    MalformedResponse(&'static str),
}

impl TransportError {
    /// Checks if this error represents an upstream (5xx) error
    #[must_use]
    pub const fn is_upstream_error(&self) -> bool {
        matches!(self, Self::Service { status: Some(status), .. } if *status >= 500)
    }

    /// Checks if this error reports a missing queue
    #[must_use]
    pub const fn is_queue_not_found(&self) -> bool {
        matches!(self, Self::QueueNotFound(_))
    }
}

/// Error types for queue operations
#[derive(Error, Debug)]
pub enum QueueError {
    /// The request was rejected before reaching the transport
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Error serializing message to JSON
    #[error("Failed to serialize message: {0}")]
    Encoding(#[from] serde_json::Error),

    /// The transport call failed
    #[error("{context}: {source}")]
    Transport {
        /// Operation-specific description
        context: &'static str,
        /// Underlying transport error
        #[source]
        source: TransportError,
    },

    /// Error deserializing message from JSON
    #[error("Failed to deserialize message: {0}")]
    Deserialization(String),
}

impl QueueError {
    /// Returns a mapper that wraps a transport error with an operation-specific message
    pub(crate) fn transport(context: &'static str) -> impl FnOnce(TransportError) -> Self {
        move |source| Self::Transport { context, source }
    }

    /// Checks if this error represents an upstream (5xx) error
    #[must_use]
    pub const fn is_upstream_error(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_upstream_error(),
            _ => false,
        }
    }

    /// Checks if this error was raised before any transport call
    #[must_use]
    pub const fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns the transport error, if any
    #[must_use]
    pub const fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
