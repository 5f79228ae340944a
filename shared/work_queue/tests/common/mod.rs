//! LocalStack test setup utilities

#![allow(dead_code)]

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_sqs::Client as SqsClient;
use uuid::Uuid;
use work_queue::{QueueManager, QueueTransport, SqsTransport};

/// Test context with a uniquely named queue on LocalStack, deleted on drop
pub struct QueueTestContext {
    pub transport: Arc<SqsTransport>,
    pub manager: QueueManager,
    pub queue_url: String,
}

impl QueueTestContext {
    /// Creates a standard queue named after the test
    pub async fn new(test_name: &str) -> Self {
        Self::create(test_name, false).await
    }

    /// Creates a FIFO queue named after the test
    pub async fn new_fifo(test_name: &str) -> Self {
        Self::create(test_name, true).await
    }

    async fn create(test_name: &str, fifo: bool) -> Self {
        // Setup LocalStack client with hardcoded credentials for CI
        let credentials = Credentials::from_keys("test", "test", None);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url("http://localhost:4566")
            .region("us-east-1")
            .credentials_provider(credentials)
            .load()
            .await;

        let transport = Arc::new(SqsTransport::new(Arc::new(SqsClient::new(&config))));
        let manager = QueueManager::new(transport.clone());

        let queue_name = format!("{test_name}-{}", Uuid::new_v4());
        let queue_url = if fifo {
            manager.create_fifo_queue(&queue_name, 30, false).await
        } else {
            manager.create_standard_queue(&queue_name, 30, 345_600).await
        }
        .expect("Failed to create test queue");

        Self {
            transport,
            manager,
            queue_url,
        }
    }
}

impl Drop for QueueTestContext {
    fn drop(&mut self) {
        let transport = self.transport.clone();
        let queue_url = self.queue_url.clone();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = transport.delete_queue(&queue_url).await;
            });
        }
    }
}
