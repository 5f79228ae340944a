use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use common_types::{CreateUserPayload, DeleteUserPayload};
use tracing::info;
use work_queue::{HandlerContext, InFlightMessage, MessageHandler};

/// Handles `user.create` messages
#[derive(Debug, Clone)]
pub struct CreateUserHandler {
    work_duration: Duration,
}

impl CreateUserHandler {
    #[must_use]
    pub const fn new(work_duration: Duration) -> Self {
        Self { work_duration }
    }
}

#[async_trait]
impl MessageHandler for CreateUserHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &InFlightMessage) -> anyhow::Result<()> {
        let payload: CreateUserPayload = message
            .envelope
            .decode_payload()
            .context("Invalid user.create payload")?;

        tokio::time::sleep(self.work_duration).await;

        info!(
            worker_id = ctx.worker_id,
            message_id = %message.envelope.id,
            name = %payload.name,
            email = %payload.email,
            age = payload.age,
            "User created"
        );
        Ok(())
    }
}

/// Handles `user.delete` messages
#[derive(Debug, Clone)]
pub struct DeleteUserHandler {
    work_duration: Duration,
}

impl DeleteUserHandler {
    #[must_use]
    pub const fn new(work_duration: Duration) -> Self {
        Self { work_duration }
    }
}

#[async_trait]
impl MessageHandler for DeleteUserHandler {
    async fn handle(&self, ctx: &HandlerContext, message: &InFlightMessage) -> anyhow::Result<()> {
        let payload: DeleteUserPayload = message
            .envelope
            .decode_payload()
            .context("Invalid user.delete payload")?;

        tokio::time::sleep(self.work_duration).await;

        info!(
            worker_id = ctx.worker_id,
            message_id = %message.envelope.id,
            email = %payload.email,
            "User deleted"
        );
        Ok(())
    }
}
