//! Test doubles shared by the unit tests

#![allow(dead_code)]

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    error::{TransportError, TransportResult},
    transport::{memory::InMemoryTransport, QueueTransport},
    types::{
        BatchResult, DeleteBatchEntry, OutgoingMessage, QueueAttribute, QueueAttributes,
        ReceiveRequest, ReceivedMessage, RedrivePolicy, SendBatchEntry,
    },
};

/// Wraps the memory transport, counting calls and injecting failures
#[derive(Debug, Default)]
pub struct CountingTransport {
    inner: InMemoryTransport,
    receive_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    delete_batch_calls: AtomicUsize,
    send_calls: AtomicUsize,
    send_batch_calls: AtomicUsize,
    extend_calls: AtomicUsize,
    fail_receives: AtomicUsize,
    fail_extends: AtomicBool,
    fail_deletes: AtomicBool,
}

fn unavailable(operation: &'static str) -> TransportError {
    TransportError::Service {
        operation,
        message: "service unavailable".to_string(),
        status: Some(503),
    }
}

impl CountingTransport {
    pub fn new(inner: InMemoryTransport) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// Makes the next `count` receive calls fail
    pub fn fail_next_receives(&self, count: usize) {
        self.fail_receives.store(count, Ordering::SeqCst);
    }

    pub fn fail_extends(&self, fail: bool) {
        self.fail_extends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn delete_batch_calls(&self) -> usize {
        self.delete_batch_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn send_batch_calls(&self) -> usize {
        self.send_batch_calls.load(Ordering::SeqCst)
    }

    pub fn extend_calls(&self) -> usize {
        self.extend_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueTransport for CountingTransport {
    async fn receive(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> TransportResult<Vec<ReceivedMessage>> {
        self.receive_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .fail_receives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if should_fail {
            return Err(unavailable("ReceiveMessage"));
        }
        self.inner.receive(queue_url, request).await
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> TransportResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(unavailable("DeleteMessage"));
        }
        self.inner.delete(queue_url, receipt_handle).await
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteBatchEntry>,
    ) -> TransportResult<BatchResult> {
        self.delete_batch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_batch(queue_url, entries).await
    }

    async fn send(&self, queue_url: &str, message: OutgoingMessage) -> TransportResult<String> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send(queue_url, message).await
    }

    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendBatchEntry>,
    ) -> TransportResult<BatchResult> {
        self.send_batch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send_batch(queue_url, entries).await
    }

    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        seconds: i32,
    ) -> TransportResult<()> {
        self.extend_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_extends.load(Ordering::SeqCst) {
            return Err(unavailable("ChangeMessageVisibility"));
        }
        self.inner
            .extend_visibility(queue_url, receipt_handle, seconds)
            .await
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
    ) -> TransportResult<String> {
        self.inner.create_queue(name, attributes).await
    }

    async fn get_queue_url(&self, name: &str) -> TransportResult<String> {
        self.inner.get_queue_url(name).await
    }

    async fn delete_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.inner.delete_queue(queue_url).await
    }

    async fn purge_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.inner.purge_queue(queue_url).await
    }

    async fn set_redrive_policy(
        &self,
        queue_url: &str,
        policy: &RedrivePolicy,
    ) -> TransportResult<()> {
        self.inner.set_redrive_policy(queue_url, policy).await
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttribute],
    ) -> TransportResult<QueueAttributes> {
        self.inner.get_attributes(queue_url, names).await
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
