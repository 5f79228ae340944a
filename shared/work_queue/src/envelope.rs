use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{QueueError, QueueResult},
    types::{ReceivedMessage, RECEIVE_COUNT_ATTRIBUTE},
};

/// Version stamped on every envelope by the producer
pub const ENVELOPE_VERSION: &str = "1.0.0";

/// Open key/value payload of an envelope
pub type Payload = serde_json::Map<String, Value>;

/// Wire format shared by producer and consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Producer-assigned format version
    pub version: String,
    /// Unique message identifier
    pub id: String,
    /// Type discriminator, e.g. `user.create`
    #[serde(rename = "type")]
    pub kind: String,
    /// Message payload
    #[serde(default)]
    pub payload: Payload,
    /// Send time
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Decodes the payload into a typed structure
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Deserialization` if the payload does not match `T`
    pub fn decode_payload<T>(&self) -> QueueResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(Value::Object(self.payload.clone()))
            .map_err(|e| QueueError::Deserialization(format!("{} payload: {e}", self.kind)))
    }
}

/// A message handed to the producer, before it is stamped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMessage {
    /// Caller-chosen id; a UUID is assigned when absent
    pub id: Option<String>,
    /// Type discriminator
    pub kind: String,
    /// Message payload
    pub payload: Payload,
}

impl NewMessage {
    /// Creates a message with an empty payload
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            payload: Payload::new(),
        }
    }

    /// Creates a message from a serializable payload
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Encoding` if the payload does not serialize to a JSON object
    pub fn from_payload<T>(kind: impl Into<String>, payload: &T) -> QueueResult<Self>
    where
        T: Serialize,
    {
        match serde_json::to_value(payload)? {
            Value::Object(payload) => Ok(Self::new(kind).with_payload(payload)),
            other => Err(QueueError::Encoding(serde::ser::Error::custom(format!(
                "payload must be a JSON object, got {other}"
            )))),
        }
    }

    /// Replaces the payload
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Sets a caller-chosen id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builds the envelope that goes on the wire.
    ///
    /// Version and timestamp are always overwritten; the id is kept if the
    /// caller provided a non-empty one.
    pub(crate) fn stamp(self) -> Envelope {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Envelope {
            version: ENVELOPE_VERSION.to_string(),
            id,
            kind: self.kind,
            payload: self.payload,
            timestamp: Utc::now(),
        }
    }
}

/// A message received by the consumer and currently leased to it
#[derive(Debug)]
pub struct InFlightMessage {
    /// Parsed envelope
    pub envelope: Envelope,
    /// Transport-assigned message id
    pub message_id: String,
    /// Lease handle required to delete or extend the message
    pub lease_handle: String,
    /// Transport metadata such as the receive count
    pub delivery_attributes: HashMap<String, String>,
}

impl InFlightMessage {
    /// Parses a received message
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Deserialization` if the body is not a valid envelope
    pub fn parse(message: ReceivedMessage) -> QueueResult<Self> {
        let envelope = serde_json::from_str::<Envelope>(&message.body)
            .map_err(|e| QueueError::Deserialization(e.to_string()))?;

        Ok(Self {
            envelope,
            message_id: message.message_id,
            lease_handle: message.receipt_handle,
            delivery_attributes: message.attributes,
        })
    }

    /// Number of times the transport has delivered this message, if reported
    #[must_use]
    pub fn receive_count(&self) -> Option<u32> {
        self.delivery_attributes
            .get(RECEIVE_COUNT_ATTRIBUTE)
            .and_then(|count| count.parse().ok())
    }

    /// Type discriminator of the envelope
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.envelope.kind
    }
}
