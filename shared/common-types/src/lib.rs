//! Message kinds and payloads shared by the producer server and the worker

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Closed set of message types carried in the envelope `type` field
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum MessageKind {
    /// Create a user account
    #[serde(rename = "user.create")]
    #[strum(serialize = "user.create")]
    UserCreate,
    /// Delete a user account
    #[serde(rename = "user.delete")]
    #[strum(serialize = "user.delete")]
    UserDelete,
}

/// Payload of a `user.create` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserPayload {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: u32,
}

/// Payload of a `user.delete` message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserPayload {
    pub email: String,
}
