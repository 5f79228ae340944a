//! Built-in message handlers

use std::{sync::Arc, time::Duration};

use common_types::MessageKind;

use crate::registry::HandlerRegistry;

pub mod user;

pub use user::{CreateUserHandler, DeleteUserHandler};

/// Registry with a handler for every known message kind
#[must_use]
pub fn default_registry(work_duration: Duration) -> HandlerRegistry {
    HandlerRegistry::new()
        .register(
            MessageKind::UserCreate,
            Arc::new(CreateUserHandler::new(work_duration)),
        )
        .register(
            MessageKind::UserDelete,
            Arc::new(DeleteUserHandler::new(work_duration)),
        )
}
