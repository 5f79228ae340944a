use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::{sync::Notify, time::Instant};
use uuid::Uuid;

use super::QueueTransport;
use crate::{
    error::{TransportError, TransportResult},
    types::{
        BatchFailure, BatchResult, DeleteBatchEntry, OutgoingMessage, QueueAttribute,
        QueueAttributes, ReceiveRequest, ReceivedMessage, RedrivePolicy, SendBatchEntry,
        MAX_BATCH_SIZE, RECEIVE_COUNT_ATTRIBUTE,
    },
};

const ACCOUNT_ID: &str = "000000000000";
const FIFO_SUFFIX: &str = ".fifo";
const MAX_QUEUE_NAME_LENGTH: usize = 80;
const MAX_BODY_BYTES: usize = 256 * 1024;
const MAX_DELAY_SECONDS: i32 = 900;
const MAX_VISIBILITY_SECONDS: i32 = 43_200;
const MAX_WAIT_SECONDS: i32 = 20;
const MAX_RECEIVE_COUNT_LIMIT: u32 = 1000;
const DEFAULT_VISIBILITY_SECONDS: i32 = 30;
const DEFAULT_RETENTION_SECONDS: i32 = 345_600;
const DEDUPLICATION_WINDOW: Duration = Duration::from_secs(300);
const LONG_POLL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

const MISSING_PARAMETER: &str = "MissingParameter";
const INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
const RECEIPT_HANDLE_IS_INVALID: &str = "ReceiptHandleIsInvalid";
const MESSAGE_NOT_INFLIGHT: &str = "MessageNotInflight";

fn seconds(value: i32) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or_default())
}

/// Rejection of a single request or batch entry
#[derive(Debug)]
struct Rejection {
    code: &'static str,
    message: String,
}

impl Rejection {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn into_error(self, operation: &'static str) -> TransportError {
        if self.code == RECEIPT_HANDLE_IS_INVALID {
            return TransportError::ReceiptHandleInvalid;
        }

        TransportError::Service {
            operation,
            message: format!("{}: {}", self.code, self.message),
            status: Some(400),
        }
    }

    fn into_failure(self, id: String) -> BatchFailure {
        BatchFailure {
            id,
            code: self.code.to_string(),
            message: self.message,
        }
    }
}

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    attributes: HashMap<String, String>,
    group_id: Option<String>,
    sent_at: Instant,
    sent_timestamp_ms: i64,
    visible_at: Instant,
    receive_count: u32,
    receipt_handle: Option<String>,
}

impl StoredMessage {
    fn is_in_flight(&self, now: Instant) -> bool {
        self.receive_count > 0 && self.visible_at > now
    }

    fn is_delayed(&self, now: Instant) -> bool {
        self.receive_count == 0 && self.visible_at > now
    }

    fn to_received(&self, receipt_handle: String) -> ReceivedMessage {
        let mut attributes = self.attributes.clone();
        attributes.insert(
            RECEIVE_COUNT_ATTRIBUTE.to_string(),
            self.receive_count.to_string(),
        );
        attributes.insert(
            "SentTimestamp".to_string(),
            self.sent_timestamp_ms.to_string(),
        );
        if let Some(group_id) = &self.group_id {
            attributes.insert("MessageGroupId".to_string(), group_id.clone());
        }

        ReceivedMessage {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            receipt_handle,
            attributes,
        }
    }

    /// Resets delivery state when the message is moved to a dead-letter queue
    fn into_dead_letter(mut self, now: Instant) -> Self {
        self.visible_at = now;
        self.receive_count = 0;
        self.receipt_handle = None;
        self
    }
}

#[derive(Debug)]
struct MemoryQueue {
    arn: String,
    attributes: QueueAttributes,
    messages: Vec<StoredMessage>,
    deduplication: HashMap<String, (String, Instant)>,
    redrive: Option<RedrivePolicy>,
}

impl MemoryQueue {
    fn new(name: &str, mut attributes: QueueAttributes) -> Self {
        attributes.remove(&QueueAttribute::All);
        for (attribute, default) in [
            (QueueAttribute::VisibilityTimeout, DEFAULT_VISIBILITY_SECONDS),
            (
                QueueAttribute::MessageRetentionPeriod,
                DEFAULT_RETENTION_SECONDS,
            ),
            (QueueAttribute::DelaySeconds, 0),
            (QueueAttribute::ReceiveMessageWaitTimeSeconds, 0),
        ] {
            attributes
                .entry(attribute)
                .or_insert_with(|| default.to_string());
        }

        Self {
            arn: format!("arn:aws:sqs:memory:{ACCOUNT_ID}:{name}"),
            attributes,
            messages: Vec::new(),
            deduplication: HashMap::new(),
            redrive: None,
        }
    }

    fn flag(&self, attribute: QueueAttribute) -> bool {
        self.attributes
            .get(&attribute)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
    }

    fn is_fifo(&self) -> bool {
        self.flag(QueueAttribute::FifoQueue)
    }

    fn seconds_attribute(&self, attribute: QueueAttribute, default: i32) -> i32 {
        self.attributes
            .get(&attribute)
            .and_then(|value| value.parse().ok())
            .unwrap_or(default)
    }

    /// Drops expired messages and deduplication entries
    fn prune(&mut self, now: Instant) {
        let retention = seconds(self.seconds_attribute(
            QueueAttribute::MessageRetentionPeriod,
            DEFAULT_RETENTION_SECONDS,
        ));
        self.messages
            .retain(|message| now.duration_since(message.sent_at) < retention);
        self.deduplication
            .retain(|_, (_, sent_at)| now.duration_since(*sent_at) < DEDUPLICATION_WINDOW);
    }

    fn enqueue(&mut self, message: OutgoingMessage, now: Instant) -> Result<String, Rejection> {
        if message.body.is_empty() {
            return Err(Rejection::new(
                MISSING_PARAMETER,
                "The request must contain the parameter MessageBody",
            ));
        }
        if message.body.len() > MAX_BODY_BYTES {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("Message must be shorter than {MAX_BODY_BYTES} bytes"),
            ));
        }
        if !(0..=MAX_DELAY_SECONDS).contains(&message.delay_seconds) {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("DelaySeconds must be between 0 and {MAX_DELAY_SECONDS}"),
            ));
        }

        let mut deduplication_key = None;
        let delay = if self.is_fifo() {
            if message.delay_seconds > 0 {
                return Err(Rejection::new(
                    INVALID_PARAMETER_VALUE,
                    "DelaySeconds is only supported at the queue level for FIFO queues",
                ));
            }
            if message.group_id.as_deref().is_none_or(str::is_empty) {
                return Err(Rejection::new(
                    MISSING_PARAMETER,
                    "The request must contain the parameter MessageGroupId",
                ));
            }

            let key = message
                .deduplication_id
                .clone()
                .filter(|id| !id.is_empty())
                .or_else(|| {
                    self.flag(QueueAttribute::ContentBasedDeduplication)
                        .then(|| message.body.clone())
                })
                .ok_or_else(|| {
                    Rejection::new(
                        MISSING_PARAMETER,
                        "The queue should either have ContentBasedDeduplication enabled or MessageDeduplicationId provided explicitly",
                    )
                })?;

            // A duplicate inside the window is accepted but not enqueued again
            if let Some((message_id, _)) = self.deduplication.get(&key) {
                return Ok(message_id.clone());
            }
            deduplication_key = Some(key);

            self.seconds_attribute(QueueAttribute::DelaySeconds, 0)
        } else if message.delay_seconds > 0 {
            message.delay_seconds
        } else {
            self.seconds_attribute(QueueAttribute::DelaySeconds, 0)
        };

        let message_id = Uuid::new_v4().to_string();
        if let Some(key) = deduplication_key {
            self.deduplication.insert(key, (message_id.clone(), now));
        }

        self.messages.push(StoredMessage {
            message_id: message_id.clone(),
            body: message.body,
            attributes: message.attributes,
            group_id: message.group_id,
            sent_at: now,
            sent_timestamp_ms: Utc::now().timestamp_millis(),
            visible_at: now + seconds(delay),
            receive_count: 0,
            receipt_handle: None,
        });

        Ok(message_id)
    }

    /// Leases up to `max` visible messages, moving exhausted ones aside for dead-lettering
    fn take_available(
        &mut self,
        max: usize,
        visibility: Duration,
        redrive_limit: Option<u32>,
        now: Instant,
    ) -> (Vec<ReceivedMessage>, Vec<StoredMessage>) {
        let blocked_groups: HashSet<String> = if self.is_fifo() {
            self.messages
                .iter()
                .filter(|message| message.is_in_flight(now))
                .filter_map(|message| message.group_id.clone())
                .collect()
        } else {
            HashSet::new()
        };

        let mut delivered = Vec::new();
        let mut dead_lettered = Vec::new();
        let mut index = 0;

        while index < self.messages.len() && delivered.len() < max {
            let candidate = &self.messages[index];
            let blocked = candidate
                .group_id
                .as_ref()
                .is_some_and(|group| blocked_groups.contains(group));
            if candidate.visible_at > now || blocked {
                index += 1;
                continue;
            }

            if redrive_limit.is_some_and(|limit| candidate.receive_count >= limit) {
                dead_lettered.push(self.messages.remove(index));
                continue;
            }

            let message = &mut self.messages[index];
            let receipt_handle = Uuid::new_v4().to_string();
            message.receive_count += 1;
            message.visible_at = now + visibility;
            message.receipt_handle = Some(receipt_handle.clone());
            delivered.push(message.to_received(receipt_handle));
            index += 1;
        }

        (delivered, dead_lettered)
    }

    fn find_by_handle(&mut self, receipt_handle: &str) -> Result<usize, Rejection> {
        self.messages
            .iter()
            .position(|message| message.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| {
                Rejection::new(
                    RECEIPT_HANDLE_IS_INVALID,
                    format!("The receipt handle \"{receipt_handle}\" is not valid"),
                )
            })
    }

    fn delete(&mut self, receipt_handle: &str) -> Result<(), Rejection> {
        let index = self.find_by_handle(receipt_handle)?;
        self.messages.remove(index);
        Ok(())
    }

    fn describe(&self, names: &[QueueAttribute], now: Instant) -> QueueAttributes {
        let mut attributes = self.attributes.clone();
        let count = |predicate: &dyn Fn(&StoredMessage) -> bool| {
            self.messages
                .iter()
                .filter(|message| predicate(message))
                .count()
                .to_string()
        };

        attributes.insert(
            QueueAttribute::ApproximateNumberOfMessages,
            count(&|message| message.visible_at <= now),
        );
        attributes.insert(
            QueueAttribute::ApproximateNumberOfMessagesNotVisible,
            count(&|message| message.is_in_flight(now)),
        );
        attributes.insert(
            QueueAttribute::ApproximateNumberOfMessagesDelayed,
            count(&|message| message.is_delayed(now)),
        );
        attributes.insert(QueueAttribute::QueueArn, self.arn.clone());

        if names.contains(&QueueAttribute::All) {
            return attributes;
        }
        attributes.retain(|name, _| names.contains(name));
        attributes
    }
}

#[derive(Debug, Default)]
struct State {
    /// Queues keyed by URL
    queues: HashMap<String, MemoryQueue>,
}

impl State {
    fn queue(&self, queue_url: &str) -> TransportResult<&MemoryQueue> {
        self.queues
            .get(queue_url)
            .ok_or_else(|| TransportError::QueueNotFound(queue_url.to_string()))
    }

    fn queue_mut(&mut self, queue_url: &str) -> TransportResult<&mut MemoryQueue> {
        self.queues
            .get_mut(queue_url)
            .ok_or_else(|| TransportError::QueueNotFound(queue_url.to_string()))
    }

    fn url_for_arn(&self, arn: &str) -> Option<String> {
        self.queues
            .iter()
            .find(|(_, queue)| queue.arn == arn)
            .map(|(url, _)| url.clone())
    }
}

/// In-process queue service with SQS semantics.
///
/// Supports leases with fresh receipt handles on every receive, delivery
/// delays, long polling woken by sends, receive counts, FIFO queues with
/// group blocking and a five minute deduplication window, redrive to a
/// dead-letter queue, purge and per-entry batch failures.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    state: Mutex<State>,
    arrivals: Notify,
}

impl InMemoryTransport {
    /// Creates an empty queue service
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// URL under which a queue with `name` is addressed
    #[must_use]
    pub fn queue_url(name: &str) -> String {
        format!("memory://queue/{ACCOUNT_ID}/{name}")
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_receive(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> TransportResult<Vec<ReceivedMessage>> {
        let mut state = self.lock();
        let now = Instant::now();

        let dead_letter = state
            .queue(queue_url)?
            .redrive
            .as_ref()
            .and_then(|policy| {
                state
                    .url_for_arn(&policy.dead_letter_target_arn)
                    .map(|url| (url, policy.max_receive_count))
            });

        let queue = state.queue_mut(queue_url)?;
        queue.prune(now);
        let (received, dead_lettered) = queue.take_available(
            usize::try_from(request.max_messages).unwrap_or_default(),
            seconds(request.visibility_timeout),
            dead_letter.as_ref().map(|(_, limit)| *limit),
            now,
        );

        if let Some((dead_letter_url, _)) = dead_letter {
            if let Some(dead_letter_queue) = state.queues.get_mut(&dead_letter_url) {
                dead_letter_queue.messages.extend(
                    dead_lettered
                        .into_iter()
                        .map(|message| message.into_dead_letter(now)),
                );
            }
        }

        Ok(received)
    }
}

fn validate_batch_ids<'a>(ids: impl Iterator<Item = &'a str>) -> TransportResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(TransportError::InvalidRequest(format!(
                "BatchEntryIdsNotDistinct: Id {id} repeated"
            )));
        }
    }

    match seen.len() {
        0 => Err(TransportError::InvalidRequest(
            "EmptyBatchRequest: There should be at least one entry in the request".to_string(),
        )),
        len if len > MAX_BATCH_SIZE => Err(TransportError::InvalidRequest(format!(
            "TooManyEntriesInBatchRequest: Maximum number of entries per request are {MAX_BATCH_SIZE}"
        ))),
        _ => Ok(()),
    }
}

fn validate_queue_name(name: &str, attributes: &QueueAttributes) -> Result<(), Rejection> {
    let base = name.strip_suffix(FIFO_SUFFIX).unwrap_or(name);
    let valid_characters = !base.is_empty()
        && base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_characters || name.len() > MAX_QUEUE_NAME_LENGTH {
        return Err(Rejection::new(
            INVALID_PARAMETER_VALUE,
            "Queue name can only include alphanumeric characters, hyphens, or underscores. 1 to 80 in length",
        ));
    }

    let fifo = attributes
        .get(&QueueAttribute::FifoQueue)
        .is_some_and(|value| value.eq_ignore_ascii_case("true"));
    if fifo != name.ends_with(FIFO_SUFFIX) {
        return Err(Rejection::new(
            INVALID_PARAMETER_VALUE,
            "The name of a FIFO queue can only include alphanumeric characters, hyphens, or underscores, must end with .fifo suffix",
        ));
    }

    Ok(())
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn receive(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> TransportResult<Vec<ReceivedMessage>> {
        let max_messages = i32::try_from(MAX_BATCH_SIZE).unwrap_or(i32::MAX);
        if !(1..=max_messages).contains(&request.max_messages) {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("MaxNumberOfMessages must be between 1 and {max_messages}"),
            )
            .into_error("ReceiveMessage"));
        }
        if !(0..=MAX_VISIBILITY_SECONDS).contains(&request.visibility_timeout) {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("VisibilityTimeout must be between 0 and {MAX_VISIBILITY_SECONDS}"),
            )
            .into_error("ReceiveMessage"));
        }

        let deadline =
            Instant::now() + seconds(request.wait_time_seconds.clamp(0, MAX_WAIT_SECONDS));

        loop {
            let received = self.try_receive(queue_url, request)?;
            let now = Instant::now();
            if !received.is_empty() || now >= deadline {
                return Ok(received);
            }

            // Sends wake the waiter; the cap also catches expiring leases and delays
            let wait = (deadline - now).min(LONG_POLL_CHECK_INTERVAL);
            let _ = tokio::time::timeout(wait, self.arrivals.notified()).await;
        }
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> TransportResult<()> {
        self.lock()
            .queue_mut(queue_url)?
            .delete(receipt_handle)
            .map_err(|rejection| rejection.into_error("DeleteMessage"))
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteBatchEntry>,
    ) -> TransportResult<BatchResult> {
        validate_batch_ids(entries.iter().map(|entry| entry.id.as_str()))?;

        let mut state = self.lock();
        let queue = state.queue_mut(queue_url)?;

        let mut result = BatchResult::default();
        for entry in entries {
            match queue.delete(&entry.receipt_handle) {
                Ok(()) => result.successful.push(entry.id),
                Err(rejection) => result.failed.push(rejection.into_failure(entry.id)),
            }
        }

        Ok(result)
    }

    async fn send(&self, queue_url: &str, message: OutgoingMessage) -> TransportResult<String> {
        let message_id = {
            let mut state = self.lock();
            let queue = state.queue_mut(queue_url)?;
            let now = Instant::now();
            queue.prune(now);
            queue
                .enqueue(message, now)
                .map_err(|rejection| rejection.into_error("SendMessage"))?
        };

        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendBatchEntry>,
    ) -> TransportResult<BatchResult> {
        validate_batch_ids(entries.iter().map(|entry| entry.id.as_str()))?;

        let result = {
            let mut state = self.lock();
            let queue = state.queue_mut(queue_url)?;
            let now = Instant::now();
            queue.prune(now);

            let mut result = BatchResult::default();
            for entry in entries {
                match queue.enqueue(entry.message, now) {
                    Ok(_) => result.successful.push(entry.id),
                    Err(rejection) => result.failed.push(rejection.into_failure(entry.id)),
                }
            }
            result
        };

        if !result.successful.is_empty() {
            self.arrivals.notify_waiters();
        }
        Ok(result)
    }

    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        seconds_from_now: i32,
    ) -> TransportResult<()> {
        if !(0..=MAX_VISIBILITY_SECONDS).contains(&seconds_from_now) {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("VisibilityTimeout must be between 0 and {MAX_VISIBILITY_SECONDS}"),
            )
            .into_error("ChangeMessageVisibility"));
        }

        let mut state = self.lock();
        let queue = state.queue_mut(queue_url)?;
        let now = Instant::now();

        let index = queue
            .find_by_handle(receipt_handle)
            .map_err(|rejection| rejection.into_error("ChangeMessageVisibility"))?;
        let message = &mut queue.messages[index];
        if !message.is_in_flight(now) {
            return Err(Rejection::new(
                MESSAGE_NOT_INFLIGHT,
                "Message does not exist or is not available for visibility timeout change",
            )
            .into_error("ChangeMessageVisibility"));
        }

        message.visible_at = now + seconds(seconds_from_now);
        Ok(())
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
    ) -> TransportResult<String> {
        validate_queue_name(name, &attributes)
            .map_err(|rejection| rejection.into_error("CreateQueue"))?;

        let queue_url = Self::queue_url(name);
        self.lock()
            .queues
            .entry(queue_url.clone())
            .or_insert_with(|| MemoryQueue::new(name, attributes));

        Ok(queue_url)
    }

    async fn get_queue_url(&self, name: &str) -> TransportResult<String> {
        let queue_url = Self::queue_url(name);
        if self.lock().queues.contains_key(&queue_url) {
            Ok(queue_url)
        } else {
            Err(TransportError::QueueNotFound(name.to_string()))
        }
    }

    async fn delete_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.lock()
            .queues
            .remove(queue_url)
            .map(|_| ())
            .ok_or_else(|| TransportError::QueueNotFound(queue_url.to_string()))
    }

    async fn purge_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.lock().queue_mut(queue_url)?.messages.clear();
        Ok(())
    }

    async fn set_redrive_policy(
        &self,
        queue_url: &str,
        policy: &RedrivePolicy,
    ) -> TransportResult<()> {
        if !(1..=MAX_RECEIVE_COUNT_LIMIT).contains(&policy.max_receive_count) {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!("maxReceiveCount must be between 1 and {MAX_RECEIVE_COUNT_LIMIT}"),
            )
            .into_error("SetQueueAttributes"));
        }

        let mut state = self.lock();
        if state.url_for_arn(&policy.dead_letter_target_arn).is_none() {
            return Err(Rejection::new(
                INVALID_PARAMETER_VALUE,
                format!(
                    "Dead letter target does not exist: {}",
                    policy.dead_letter_target_arn
                ),
            )
            .into_error("SetQueueAttributes"));
        }

        let encoded = serde_json::to_string(policy)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        let queue = state.queue_mut(queue_url)?;
        queue
            .attributes
            .insert(QueueAttribute::RedrivePolicy, encoded);
        queue.redrive = Some(policy.clone());

        Ok(())
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttribute],
    ) -> TransportResult<QueueAttributes> {
        let state = self.lock();
        Ok(state.queue(queue_url)?.describe(names, Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn receive_request(visibility_timeout: i32) -> ReceiveRequest {
        ReceiveRequest {
            max_messages: 10,
            wait_time_seconds: 0,
            visibility_timeout,
        }
    }

    fn outgoing(body: &str) -> OutgoingMessage {
        OutgoingMessage {
            body: body.to_string(),
            ..OutgoingMessage::default()
        }
    }

    fn grouped(body: &str, group_id: &str, deduplication_id: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            body: body.to_string(),
            group_id: Some(group_id.to_string()),
            deduplication_id: deduplication_id.map(ToString::to_string),
            ..OutgoingMessage::default()
        }
    }

    async fn create_fifo(transport: &InMemoryTransport, name: &str) -> String {
        transport
            .create_queue(
                name,
                HashMap::from([(QueueAttribute::FifoQueue, "true".to_string())]),
            )
            .await
            .expect("Failed to create FIFO queue")
    }

    async fn depth(transport: &InMemoryTransport, queue_url: &str) -> (String, String, String) {
        let attributes = transport
            .get_attributes(
                queue_url,
                &[
                    QueueAttribute::ApproximateNumberOfMessages,
                    QueueAttribute::ApproximateNumberOfMessagesNotVisible,
                    QueueAttribute::ApproximateNumberOfMessagesDelayed,
                ],
            )
            .await
            .expect("Failed to read attributes");

        (
            attributes[&QueueAttribute::ApproximateNumberOfMessages].clone(),
            attributes[&QueueAttribute::ApproximateNumberOfMessagesNotVisible].clone(),
            attributes[&QueueAttribute::ApproximateNumberOfMessagesDelayed].clone(),
        )
    }

    #[tokio::test]
    async fn test_send_receive_delete() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");

        let message_id = transport
            .send(&queue_url, outgoing("hello"))
            .await
            .expect("Failed to send");

        let received = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].message_id, message_id);
        assert_eq!(received[0].body, "hello");
        assert_eq!(received[0].attributes[RECEIVE_COUNT_ATTRIBUTE], "1");

        // Leased messages are hidden from other receivers
        let again = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        assert!(again.is_empty());

        transport
            .delete(&queue_url, &received[0].receipt_handle)
            .await
            .expect("Failed to delete");
        assert_eq!(
            depth(&transport, &queue_url).await,
            ("0".to_string(), "0".to_string(), "0".to_string())
        );
    }

    #[tokio::test]
    async fn test_expired_lease_redelivers_with_new_handle() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");
        transport
            .send(&queue_url, outgoing("hello"))
            .await
            .expect("Failed to send");

        let first = transport
            .receive(&queue_url, receive_request(0))
            .await
            .expect("Failed to receive");
        let second = transport
            .receive(&queue_url, receive_request(0))
            .await
            .expect("Failed to receive");

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].receipt_handle, second[0].receipt_handle);
        assert_eq!(second[0].attributes[RECEIVE_COUNT_ATTRIBUTE], "2");

        let stale = transport.delete(&queue_url, &first[0].receipt_handle).await;
        assert!(matches!(stale, Err(TransportError::ReceiptHandleInvalid)));
    }

    #[tokio::test]
    async fn test_delayed_message_is_counted_but_not_delivered() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");

        transport
            .send(
                &queue_url,
                OutgoingMessage {
                    delay_seconds: 60,
                    ..outgoing("later")
                },
            )
            .await
            .expect("Failed to send");

        let received = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        assert!(received.is_empty());
        assert_eq!(
            depth(&transport, &queue_url).await,
            ("0".to_string(), "0".to_string(), "1".to_string())
        );
    }

    #[tokio::test]
    async fn test_long_poll_is_woken_by_send() {
        let transport = Arc::new(InMemoryTransport::new());
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");

        let sender = {
            let transport = transport.clone();
            let queue_url = queue_url.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                transport.send(&queue_url, outgoing("wake up")).await
            })
        };

        let started = std::time::Instant::now();
        let received = transport
            .receive(
                &queue_url,
                ReceiveRequest {
                    wait_time_seconds: 5,
                    ..receive_request(30)
                },
            )
            .await
            .expect("Failed to receive");

        assert_eq!(received.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        sender
            .await
            .expect("Sender task panicked")
            .expect("Failed to send");
    }

    #[tokio::test]
    async fn test_extend_visibility() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");
        transport
            .send(&queue_url, outgoing("hello"))
            .await
            .expect("Failed to send");

        let received = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");

        // Shortening the lease to zero makes the message visible again
        transport
            .extend_visibility(&queue_url, &received[0].receipt_handle, 0)
            .await
            .expect("Failed to change visibility");
        let again = transport
            .receive(&queue_url, receive_request(0))
            .await
            .expect("Failed to receive");
        assert_eq!(again.len(), 1);

        // The message is no longer in flight after a zero lease
        let result = transport
            .extend_visibility(&queue_url, &again[0].receipt_handle, 30)
            .await;
        assert!(matches!(
            result,
            Err(TransportError::Service {
                status: Some(400),
                ..
            })
        ));

        let unknown = transport
            .extend_visibility(&queue_url, "not-a-handle", 30)
            .await;
        assert!(matches!(unknown, Err(TransportError::ReceiptHandleInvalid)));
    }

    #[tokio::test]
    async fn test_fifo_requires_group_and_deduplicates() {
        let transport = InMemoryTransport::new();
        let queue_url = create_fifo(&transport, "orders.fifo").await;

        let missing_group = transport.send(&queue_url, outgoing("hello")).await;
        assert!(matches!(
            missing_group,
            Err(TransportError::Service { ref message, .. }) if message.starts_with(MISSING_PARAMETER)
        ));

        let first = transport
            .send(&queue_url, grouped("one", "g1", Some("dedup-1")))
            .await
            .expect("Failed to send");
        let duplicate = transport
            .send(&queue_url, grouped("one again", "g1", Some("dedup-1")))
            .await
            .expect("Duplicate send should be accepted");
        assert_eq!(first, duplicate);

        let received = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "one");
        assert_eq!(received[0].attributes["MessageGroupId"], "g1");
    }

    #[tokio::test]
    async fn test_fifo_group_is_blocked_while_in_flight() {
        let transport = InMemoryTransport::new();
        let queue_url = create_fifo(&transport, "orders.fifo").await;

        for (body, group) in [("a1", "a"), ("b1", "b"), ("a2", "a")] {
            transport
                .send(&queue_url, grouped(body, group, Some(body)))
                .await
                .expect("Failed to send");
        }

        let first = transport
            .receive(
                &queue_url,
                ReceiveRequest {
                    max_messages: 1,
                    ..receive_request(30)
                },
            )
            .await
            .expect("Failed to receive");
        assert_eq!(first[0].body, "a1");

        // Group "a" stays blocked until a1 is deleted
        let second = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        let bodies: Vec<_> = second.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["b1"]);

        transport
            .delete(&queue_url, &first[0].receipt_handle)
            .await
            .expect("Failed to delete");
        let third = transport
            .receive(&queue_url, receive_request(30))
            .await
            .expect("Failed to receive");
        assert_eq!(third[0].body, "a2");
    }

    #[tokio::test]
    async fn test_redrive_moves_message_after_max_receives() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");
        let dead_letter_url = transport
            .create_queue("jobs-dlq", QueueAttributes::new())
            .await
            .expect("Failed to create dead-letter queue");
        let dead_letter_arn = transport
            .get_attributes(&dead_letter_url, &[QueueAttribute::QueueArn])
            .await
            .expect("Failed to read ARN")[&QueueAttribute::QueueArn]
            .clone();

        transport
            .set_redrive_policy(
                &queue_url,
                &RedrivePolicy {
                    dead_letter_target_arn: dead_letter_arn,
                    max_receive_count: 2,
                },
            )
            .await
            .expect("Failed to set redrive policy");
        transport
            .send(&queue_url, outgoing("poison"))
            .await
            .expect("Failed to send");

        for _ in 0..2 {
            let received = transport
                .receive(&queue_url, receive_request(0))
                .await
                .expect("Failed to receive");
            assert_eq!(received.len(), 1);
        }

        let exhausted = transport
            .receive(&queue_url, receive_request(0))
            .await
            .expect("Failed to receive");
        assert!(exhausted.is_empty());

        let dead_lettered = transport
            .receive(&dead_letter_url, receive_request(30))
            .await
            .expect("Failed to receive from dead-letter queue");
        assert_eq!(dead_lettered.len(), 1);
        assert_eq!(dead_lettered[0].body, "poison");
    }

    #[tokio::test]
    async fn test_batch_calls_report_per_entry_failures() {
        let transport = InMemoryTransport::new();
        let queue_url = create_fifo(&transport, "orders.fifo").await;

        let result = transport
            .send_batch(
                &queue_url,
                vec![
                    SendBatchEntry {
                        id: "ok".to_string(),
                        message: grouped("one", "g1", Some("1")),
                    },
                    SendBatchEntry {
                        id: "no-group".to_string(),
                        message: outgoing("two"),
                    },
                ],
            )
            .await
            .expect("Batch call should succeed");

        assert_eq!(result.successful, vec!["ok".to_string()]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].id, "no-group");
        assert_eq!(result.failed[0].code, MISSING_PARAMETER);

        let deleted = transport
            .delete_batch(
                &queue_url,
                vec![DeleteBatchEntry {
                    id: "stale".to_string(),
                    receipt_handle: "unknown".to_string(),
                }],
            )
            .await
            .expect("Batch call should succeed");
        assert_eq!(deleted.failed[0].code, RECEIPT_HANDLE_IS_INVALID);
    }

    #[tokio::test]
    async fn test_batch_with_duplicate_ids_is_rejected() {
        let transport = InMemoryTransport::new();
        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");

        let entry = SendBatchEntry {
            id: "same".to_string(),
            message: outgoing("body"),
        };
        let result = transport
            .send_batch(&queue_url, vec![entry.clone(), entry])
            .await;

        assert!(matches!(result, Err(TransportError::InvalidRequest(_))));
        assert_eq!(
            depth(&transport, &queue_url).await,
            ("0".to_string(), "0".to_string(), "0".to_string())
        );
    }

    #[tokio::test]
    async fn test_queue_lifecycle() {
        let transport = InMemoryTransport::new();

        let missing = transport.get_queue_url("jobs").await;
        assert!(matches!(missing, Err(TransportError::QueueNotFound(_))));

        let invalid = transport
            .create_queue(
                "jobs",
                HashMap::from([(QueueAttribute::FifoQueue, "true".to_string())]),
            )
            .await;
        assert!(invalid.is_err());

        let queue_url = transport
            .create_queue("jobs", QueueAttributes::new())
            .await
            .expect("Failed to create queue");
        assert_eq!(
            transport
                .get_queue_url("jobs")
                .await
                .expect("Queue should resolve"),
            queue_url
        );

        transport
            .send(&queue_url, outgoing("hello"))
            .await
            .expect("Failed to send");
        transport
            .purge_queue(&queue_url)
            .await
            .expect("Failed to purge");
        assert_eq!(
            depth(&transport, &queue_url).await,
            ("0".to_string(), "0".to_string(), "0".to_string())
        );

        transport
            .delete_queue(&queue_url)
            .await
            .expect("Failed to delete queue");
        let gone = transport.send(&queue_url, outgoing("hello")).await;
        assert!(matches!(gone, Err(TransportError::QueueNotFound(_))));
    }
}
