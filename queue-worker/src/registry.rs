//! Dispatch of received messages to per-type handlers

use std::{collections::HashMap, str::FromStr, sync::Arc};

use async_trait::async_trait;
use common_types::MessageKind;
use metrics::counter;
use strum::IntoEnumIterator;
use tracing::warn;
use work_queue::{HandlerContext, InFlightMessage, MessageHandler};

/// Errors raised while validating a registry
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No handler registered for message types: {}", format_kinds(.0))]
    MissingHandlers(Vec<MessageKind>),
}

fn format_kinds(kinds: &[MessageKind]) -> String {
    kinds
        .iter()
        .map(MessageKind::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Maps every [`MessageKind`] to the handler that processes it
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageKind, Arc<dyn MessageHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous one
    #[must_use]
    pub fn register(mut self, kind: MessageKind, handler: Arc<dyn MessageHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Checks that every message kind has a handler
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::MissingHandlers` listing the kinds without one
    pub fn validate(&self) -> Result<(), RegistryError> {
        let missing: Vec<MessageKind> = MessageKind::iter()
            .filter(|kind| !self.handlers.contains_key(kind))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingHandlers(missing))
        }
    }
}

#[async_trait]
impl MessageHandler for HandlerRegistry {
    async fn handle(&self, ctx: &HandlerContext, message: &InFlightMessage) -> anyhow::Result<()> {
        let handler = MessageKind::from_str(message.kind())
            .ok()
            .and_then(|kind| self.handlers.get(&kind));

        let Some(handler) = handler else {
            // Unknown types are acknowledged so they do not cycle through redelivery
            warn!(
                message_id = %message.envelope.id,
                message_type = message.kind(),
                "No handler for message type, discarding"
            );
            counter!("queue_messages_unhandled").increment(1);
            return Ok(());
        };

        handler.handle(ctx, message).await
    }
}
