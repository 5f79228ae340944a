use std::{env, sync::Arc};

use tracing::info;

use crate::{
    error::{QueueError, QueueResult, TransportError},
    transport::QueueTransport,
    types::{QueueAttribute, QueueAttributes, RedrivePolicy},
};

/// Lease applied by queues created at startup, in seconds
pub const DEFAULT_VISIBILITY_TIMEOUT_SECONDS: i32 = 30;
/// Retention of queues created at startup (4 days), in seconds
pub const DEFAULT_RETENTION_SECONDS: i32 = 345_600;

/// Receives before a message is dead-lettered when `MAX_RECEIVE_COUNT` is unset
pub const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;

const FIFO_SUFFIX: &str = ".fifo";
const RECEIVE_WAIT_SECONDS: &str = "20";

/// Dead-letter redirect wired at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterSettings {
    /// Name of the dead-letter queue, created when missing
    pub queue_name: String,
    /// Receives after which a message is moved to the dead-letter queue
    pub max_receive_count: u32,
}

/// Where the work queue lives and how it is wired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Pre-resolved queue URL; when set, `queue_name` is not looked up
    pub queue_url: Option<String>,
    /// Queue name, resolved or created when no URL is given
    pub queue_name: String,
    /// Optional dead-letter redirect
    pub dead_letter: Option<DeadLetterSettings>,
}

impl QueueSettings {
    /// Reads `QUEUE_URL`, `QUEUE_NAME`, `DEAD_LETTER_QUEUE_NAME` and `MAX_RECEIVE_COUNT`.
    ///
    /// `default_queue_name` is used when `QUEUE_NAME` is unset or empty. An
    /// unparsable `MAX_RECEIVE_COUNT` falls back to 3.
    ///
    /// # Panics
    ///
    /// Panics if neither `QUEUE_URL`, `QUEUE_NAME` nor a default name is available
    #[must_use]
    pub fn from_env(default_queue_name: Option<&str>) -> Self {
        let queue_url = env::var("QUEUE_URL").ok().filter(|url| !url.is_empty());
        let queue_name = match (env::var("QUEUE_NAME"), default_queue_name) {
            (Ok(name), _) if !name.is_empty() => name,
            (_, Some(name)) => name.to_string(),
            _ if queue_url.is_some() => String::new(),
            _ => panic!("QUEUE_URL or QUEUE_NAME environment variable must be set"),
        };

        let dead_letter = env::var("DEAD_LETTER_QUEUE_NAME")
            .ok()
            .filter(|name| !name.is_empty())
            .map(|queue_name| DeadLetterSettings {
                queue_name,
                max_receive_count: env::var("MAX_RECEIVE_COUNT")
                    .ok()
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(DEFAULT_MAX_RECEIVE_COUNT),
            });

        Self {
            queue_url,
            queue_name,
            dead_letter,
        }
    }
}

/// Lifecycle operations on queue resources
#[derive(Clone)]
pub struct QueueManager {
    transport: Arc<dyn QueueTransport>,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager").finish_non_exhaustive()
    }
}

impl QueueManager {
    /// Creates a manager over a transport
    #[must_use]
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Creates a standard queue with long polling enabled
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the queue cannot be created
    pub async fn create_standard_queue(
        &self,
        name: &str,
        visibility_timeout: i32,
        retention_seconds: i32,
    ) -> QueueResult<String> {
        let attributes = QueueAttributes::from([
            (
                QueueAttribute::VisibilityTimeout,
                visibility_timeout.to_string(),
            ),
            (
                QueueAttribute::MessageRetentionPeriod,
                retention_seconds.to_string(),
            ),
            (
                QueueAttribute::ReceiveMessageWaitTimeSeconds,
                RECEIVE_WAIT_SECONDS.to_string(),
            ),
        ]);

        let queue_url = self
            .transport
            .create_queue(name, attributes)
            .await
            .map_err(QueueError::transport("Failed to create queue"))?;

        info!(queue_url = %queue_url, "Created standard queue");
        Ok(queue_url)
    }

    /// Creates a FIFO queue; `.fifo` is appended to `name` when missing
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the queue cannot be created
    pub async fn create_fifo_queue(
        &self,
        name: &str,
        visibility_timeout: i32,
        content_based_deduplication: bool,
    ) -> QueueResult<String> {
        let name = if name.ends_with(FIFO_SUFFIX) {
            name.to_string()
        } else {
            format!("{name}{FIFO_SUFFIX}")
        };

        let mut attributes = QueueAttributes::from([
            (QueueAttribute::FifoQueue, "true".to_string()),
            (
                QueueAttribute::VisibilityTimeout,
                visibility_timeout.to_string(),
            ),
            (
                QueueAttribute::ReceiveMessageWaitTimeSeconds,
                RECEIVE_WAIT_SECONDS.to_string(),
            ),
        ]);
        if content_based_deduplication {
            attributes.insert(
                QueueAttribute::ContentBasedDeduplication,
                "true".to_string(),
            );
        }

        let queue_url = self
            .transport
            .create_queue(&name, attributes)
            .await
            .map_err(QueueError::transport("Failed to create FIFO queue"))?;

        info!(queue_url = %queue_url, "Created FIFO queue");
        Ok(queue_url)
    }

    /// Resolves a queue URL by name
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` wrapping `TransportError::QueueNotFound` for a missing queue
    pub async fn get_queue_url(&self, name: &str) -> QueueResult<String> {
        self.transport
            .get_queue_url(name)
            .await
            .map_err(QueueError::transport("Failed to get queue URL"))
    }

    /// Resolves a queue by name, creating it when it does not exist.
    ///
    /// Names ending in `.fifo` are created as FIFO queues with content-based
    /// deduplication; other names as standard queues.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for an empty name and
    /// `QueueError::Transport` if the lookup fails for any reason other than a
    /// missing queue, or if creation fails
    pub async fn ensure_queue(
        &self,
        name: &str,
        visibility_timeout: i32,
        retention_seconds: i32,
    ) -> QueueResult<String> {
        if name.is_empty() {
            return Err(QueueError::Validation(
                "queue name must not be empty".to_string(),
            ));
        }

        match self.transport.get_queue_url(name).await {
            Ok(queue_url) => Ok(queue_url),
            Err(TransportError::QueueNotFound(_)) if name.ends_with(FIFO_SUFFIX) => {
                self.create_fifo_queue(name, visibility_timeout, true).await
            }
            Err(TransportError::QueueNotFound(_)) => {
                self.create_standard_queue(name, visibility_timeout, retention_seconds)
                    .await
            }
            Err(e) => Err(QueueError::transport("Failed to get queue URL")(e)),
        }
    }

    /// Deletes a queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the queue cannot be deleted
    pub async fn delete_queue(&self, queue_url: &str) -> QueueResult<()> {
        self.transport
            .delete_queue(queue_url)
            .await
            .map_err(QueueError::transport("Failed to delete queue"))?;

        info!(queue_url = %queue_url, "Deleted queue");
        Ok(())
    }

    /// Removes every message from a queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the queue cannot be purged
    pub async fn purge_queue(&self, queue_url: &str) -> QueueResult<()> {
        self.transport
            .purge_queue(queue_url)
            .await
            .map_err(QueueError::transport("Failed to purge queue"))?;

        info!(queue_url = %queue_url, "Purged queue");
        Ok(())
    }

    /// Redirects messages received more than `max_receive_count` times to a dead-letter queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` for a zero receive count and
    /// `QueueError::Transport` if the policy cannot be installed
    pub async fn configure_dead_letter_queue(
        &self,
        queue_url: &str,
        dead_letter_arn: &str,
        max_receive_count: u32,
    ) -> QueueResult<()> {
        if max_receive_count == 0 {
            return Err(QueueError::Validation(
                "max receive count must be at least 1".to_string(),
            ));
        }

        let policy = RedrivePolicy {
            dead_letter_target_arn: dead_letter_arn.to_string(),
            max_receive_count,
        };
        self.transport
            .set_redrive_policy(queue_url, &policy)
            .await
            .map_err(QueueError::transport("Failed to configure dead letter queue"))?;

        info!(
            queue_url = %queue_url,
            dead_letter_arn,
            max_receive_count,
            "Configured dead letter queue"
        );
        Ok(())
    }

    /// Reads the requested attributes of a queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the attributes cannot be read
    pub async fn get_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttribute],
    ) -> QueueResult<QueueAttributes> {
        self.transport
            .get_attributes(queue_url, names)
            .await
            .map_err(QueueError::transport("Failed to get queue attributes"))
    }

    /// Reads the ARN of a queue
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Transport` if the attributes cannot be read or carry no ARN
    pub async fn get_queue_arn(&self, queue_url: &str) -> QueueResult<String> {
        let context = "Failed to get queue ARN";
        let mut attributes = self
            .transport
            .get_attributes(queue_url, &[QueueAttribute::QueueArn])
            .await
            .map_err(QueueError::transport(context))?;

        attributes
            .remove(&QueueAttribute::QueueArn)
            .ok_or_else(|| QueueError::transport(context)(TransportError::MalformedResponse("QueueArn")))
    }

    /// Resolves the work queue described by `settings` and wires its dead-letter redirect
    ///
    /// # Errors
    ///
    /// Returns the first error raised while resolving, creating or wiring queues
    pub async fn resolve(&self, settings: &QueueSettings) -> QueueResult<String> {
        let queue_url = match &settings.queue_url {
            Some(queue_url) => queue_url.clone(),
            None => {
                self.ensure_queue(
                    &settings.queue_name,
                    DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
                    DEFAULT_RETENTION_SECONDS,
                )
                .await?
            }
        };

        if let Some(dead_letter) = &settings.dead_letter {
            let dead_letter_url = self
                .ensure_queue(
                    &dead_letter.queue_name,
                    DEFAULT_VISIBILITY_TIMEOUT_SECONDS,
                    DEFAULT_RETENTION_SECONDS,
                )
                .await?;
            let dead_letter_arn = self.get_queue_arn(&dead_letter_url).await?;
            self.configure_dead_letter_queue(
                &queue_url,
                &dead_letter_arn,
                dead_letter.max_receive_count,
            )
            .await?;
        }

        Ok(queue_url)
    }
}
