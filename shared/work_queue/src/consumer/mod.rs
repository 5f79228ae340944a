//! Polling consumer with a bounded worker pool
//!
//! The poll loop long-polls the queue and pushes parsed messages onto a
//! bounded `flume` channel; `worker_count` workers pull from the channel and
//! run the handler under a timeout derived from the lease. A message is
//! deleted only after its handler succeeds. Failures, panics and timeouts
//! leave the message alone so the lease expiry redelivers it.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    envelope::InFlightMessage,
    error::{QueueError, QueueResult},
    transport::QueueTransport,
    types::{BatchResult, DeleteBatchEntry, ReceiveRequest, MAX_BATCH_SIZE},
    visibility::VisibilityExtender,
};

/// Consumer configuration
pub mod config;
/// Handler contract
pub mod handler;

pub use config::ConsumerConfig;
pub use handler::{HandlerContext, MessageHandler};

/// Pause after a failed receive before polling again
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Why [`Consumer::start`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown token was cancelled and all workers exited
    Cancelled,
    /// The shutdown token was cancelled but some worker tasks failed to join
    WorkersFailed(usize),
}

fn count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Receives messages from one queue and dispatches them to a handler
pub struct Consumer {
    transport: Arc<dyn QueueTransport>,
    config: ConsumerConfig,
    handler: Arc<dyn MessageHandler>,
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Consumer {
    /// Creates a consumer; out-of-range configuration values are replaced by defaults
    #[must_use]
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        config: ConsumerConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            transport,
            config: config.clamped(),
            handler,
        }
    }

    /// Effective configuration
    #[must_use]
    pub const fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Lease extension bound to the consumer's queue
    #[must_use]
    pub fn visibility_extender(&self) -> VisibilityExtender {
        VisibilityExtender::new(self.transport.clone(), &self.config.queue_url)
    }

    /// Runs the poll loop and the worker pool until `shutdown` is cancelled.
    ///
    /// Returns once the poll loop has stopped and every worker has exited.
    /// Messages still buffered in the channel at shutdown are not processed;
    /// their leases expire and the queue redelivers them.
    pub async fn start(&self, shutdown: CancellationToken) -> StopReason {
        info!(
            queue_url = %self.config.queue_url,
            workers = self.config.worker_count,
            max_messages_per_poll = self.config.max_messages_per_poll,
            lease_duration_seconds = self.config.lease_duration_seconds,
            "Starting consumer"
        );

        let (sender, receiver) = flume::bounded(self.config.channel_capacity());
        let handles = self.spawn_workers(&receiver, &shutdown);
        drop(receiver);

        self.poll(sender, &shutdown).await;

        let mut failed_workers = 0;
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task error: {e}");
                failed_workers += 1;
            }
        }

        info!("All workers stopped");
        if failed_workers == 0 {
            StopReason::Cancelled
        } else {
            StopReason::WorkersFailed(failed_workers)
        }
    }

    fn spawn_workers(
        &self,
        receiver: &flume::Receiver<InFlightMessage>,
        shutdown: &CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        (0..self.config.worker_count)
            .map(|worker_id| {
                let worker = Worker {
                    transport: self.transport.clone(),
                    queue_url: self.config.queue_url.clone(),
                    handler: self.handler.clone(),
                    handler_timeout: self.config.handler_timeout(),
                    ctx: HandlerContext {
                        worker_id,
                        shutdown: shutdown.clone(),
                        visibility: self.visibility_extender(),
                    },
                };
                let rx = receiver.clone();

                tokio::spawn(async move {
                    worker.run(rx).await;
                })
            })
            .collect()
    }

    /// Long-polls until cancelled; dropping `sender` on return closes the channel
    async fn poll(&self, sender: flume::Sender<InFlightMessage>, shutdown: &CancellationToken) {
        let request = ReceiveRequest {
            max_messages: self.config.max_messages_per_poll,
            wait_time_seconds: self.config.long_poll_wait_seconds,
            visibility_timeout: self.config.lease_duration_seconds,
        };

        'poll: loop {
            let result = tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.transport.receive(&self.config.queue_url, request) => result,
            };

            let messages = match result {
                Ok(messages) => messages,
                Err(e) => {
                    error!("Failed to receive messages: {e}");
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(RECEIVE_ERROR_BACKOFF) => continue,
                    }
                }
            };

            if messages.is_empty() {
                continue;
            }
            debug!(count = messages.len(), "Received messages");
            counter!("queue_messages_received").increment(count(messages.len()));

            for received in messages {
                let message_id = received.message_id.clone();
                let message = match InFlightMessage::parse(received) {
                    Ok(message) => message,
                    Err(e) => {
                        counter!("queue_messages_dropped").increment(1);
                        warn!(message_id = %message_id, "Dropping unparsable message: {e}");
                        continue;
                    }
                };

                tokio::select! {
                    () = shutdown.cancelled() => break 'poll,
                    result = sender.send_async(message) => {
                        if result.is_err() {
                            error!("All workers have stopped, stopping poll loop");
                            break 'poll;
                        }
                    }
                }
            }
        }

        info!("Poll loop stopped");
    }

    /// Deletes up to ten messages in a single call, using envelope ids as entry ids
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for more than ten messages and
    /// `QueueError::Transport` if the batch call fails as a whole
    pub async fn delete_message_batch(
        &self,
        messages: &[InFlightMessage],
    ) -> QueueResult<BatchResult> {
        if messages.is_empty() {
            return Ok(BatchResult::default());
        }
        if messages.len() > MAX_BATCH_SIZE {
            return Err(QueueError::Validation(format!(
                "batch size {} exceeds maximum of {MAX_BATCH_SIZE}",
                messages.len()
            )));
        }

        let entries = messages
            .iter()
            .map(|message| DeleteBatchEntry {
                id: message.envelope.id.clone(),
                receipt_handle: message.lease_handle.clone(),
            })
            .collect();

        let result = self
            .transport
            .delete_batch(&self.config.queue_url, entries)
            .await
            .map_err(QueueError::transport("Failed to delete message batch"))?;

        counter!("queue_messages_deleted").increment(count(result.successful.len()));
        Ok(result)
    }
}

/// One member of the worker pool
struct Worker {
    transport: Arc<dyn QueueTransport>,
    queue_url: String,
    handler: Arc<dyn MessageHandler>,
    handler_timeout: Duration,
    ctx: HandlerContext,
}

impl Worker {
    async fn run(&self, receiver: flume::Receiver<InFlightMessage>) {
        debug!("Worker {} started", self.ctx.worker_id);

        loop {
            tokio::select! {
                biased;
                () = self.ctx.shutdown.cancelled() => {
                    debug!("Worker {} received shutdown signal", self.ctx.worker_id);
                    break;
                }
                result = receiver.recv_async() => {
                    match result {
                        Ok(message) => self.process(message).await,
                        Err(flume::RecvError::Disconnected) => {
                            debug!("Message channel closed for worker {}", self.ctx.worker_id);
                            break;
                        }
                    }
                }
            }
        }

        debug!("Worker {} stopped", self.ctx.worker_id);
    }

    #[instrument(
        skip_all,
        fields(
            worker_id = self.ctx.worker_id,
            message_id = %message.message_id,
            message_type = %message.kind(),
        )
    )]
    async fn process(&self, message: InFlightMessage) {
        let handled = tokio::time::timeout(
            self.handler_timeout,
            AssertUnwindSafe(self.handler.handle(&self.ctx, &message)).catch_unwind(),
        )
        .await;

        match handled {
            Ok(Ok(Ok(()))) => {
                counter!("queue_messages_processed").increment(1);
                self.delete(&message).await;
            }
            Ok(Ok(Err(e))) => {
                counter!("queue_messages_failed").increment(1);
                warn!(
                    receive_count = ?message.receive_count(),
                    "Handler failed, message left for redelivery: {e:#}"
                );
            }
            Ok(Err(_)) => {
                counter!("queue_messages_failed").increment(1);
                error!("Handler panicked, message left for redelivery");
            }
            Err(_) => {
                counter!("queue_messages_failed").increment(1);
                warn!(
                    timeout_seconds = self.handler_timeout.as_secs(),
                    "Handler timed out, message left for redelivery"
                );
            }
        }
    }

    /// Best-effort delete; a failure means the message is redelivered and processed again
    async fn delete(&self, message: &InFlightMessage) {
        match self
            .transport
            .delete(&self.queue_url, &message.lease_handle)
            .await
        {
            Ok(()) => {
                counter!("queue_messages_deleted").increment(1);
                debug!("Message deleted");
            }
            Err(e) => error!("Failed to delete processed message: {e}"),
        }
    }
}
