use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use aws_sdk_sqs::{
    error::{DisplayErrorContext, SdkError},
    operation::get_queue_url::GetQueueUrlError,
    types::{
        DeleteMessageBatchRequestEntry, MessageAttributeValue, MessageSystemAttributeName,
        QueueAttributeName, SendMessageBatchRequestEntry,
    },
    Client as SqsClient,
};

use super::QueueTransport;
use crate::{
    error::{TransportError, TransportResult},
    types::{
        BatchFailure, BatchResult, DeleteBatchEntry, OutgoingMessage, QueueAttribute,
        QueueAttributes, ReceiveRequest, ReceivedMessage, RedrivePolicy, SendBatchEntry,
    },
};

/// Queue transport backed by AWS SQS
#[derive(Debug, Clone)]
pub struct SqsTransport {
    sqs_client: Arc<SqsClient>,
}

impl SqsTransport {
    /// Creates a transport from a pre-configured SQS client
    #[must_use]
    pub const fn new(sqs_client: Arc<SqsClient>) -> Self {
        Self { sqs_client }
    }

    /// Creates a transport from shared AWS configuration
    #[must_use]
    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Arc::new(SqsClient::new(config)))
    }
}

/// Converts an SDK error into a transport error tagged with the operation name
fn sdk_error<E>(operation: &'static str) -> impl FnOnce(SdkError<E>) -> TransportError
where
    E: std::error::Error + Send + Sync + 'static,
{
    move |err| {
        let status = match &err {
            SdkError::ServiceError(service_err) => Some(service_err.raw().status().as_u16()),
            _ => None,
        };

        TransportError::Service {
            operation,
            message: DisplayErrorContext(&err).to_string(),
            status,
        }
    }
}

fn string_attribute(value: &str) -> TransportResult<MessageAttributeValue> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

fn message_attributes(
    attributes: &HashMap<String, String>,
) -> TransportResult<HashMap<String, MessageAttributeValue>> {
    attributes
        .iter()
        .map(|(name, value)| Ok((name.clone(), string_attribute(value)?)))
        .collect()
}

fn batch_failure(entry: &aws_sdk_sqs::types::BatchResultErrorEntry) -> BatchFailure {
    BatchFailure {
        id: entry.id().to_string(),
        code: entry.code().to_string(),
        message: entry.message().unwrap_or_default().to_string(),
    }
}

#[async_trait]
impl QueueTransport for SqsTransport {
    async fn receive(
        &self,
        queue_url: &str,
        request: ReceiveRequest,
    ) -> TransportResult<Vec<ReceivedMessage>> {
        let result = self
            .sqs_client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(request.max_messages)
            .wait_time_seconds(request.wait_time_seconds)
            .visibility_timeout(request.visibility_timeout)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(sdk_error("ReceiveMessage"))?;

        let messages = result
            .messages()
            .iter()
            .filter_map(|msg| {
                let body = msg.body()?.to_string();
                let receipt_handle = msg.receipt_handle()?.to_string();
                let message_id = msg.message_id()?.to_string();

                let mut attributes: HashMap<String, String> = msg
                    .message_attributes()
                    .into_iter()
                    .flatten()
                    .filter_map(|(name, value)| {
                        value
                            .string_value()
                            .map(|value| (name.clone(), value.to_string()))
                    })
                    .collect();
                attributes.extend(
                    msg.attributes()
                        .into_iter()
                        .flatten()
                        .map(|(name, value)| (name.as_str().to_string(), value.clone())),
                );

                Some(ReceivedMessage {
                    message_id,
                    body,
                    receipt_handle,
                    attributes,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> TransportResult<()> {
        self.sqs_client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(sdk_error("DeleteMessage"))?;

        Ok(())
    }

    async fn delete_batch(
        &self,
        queue_url: &str,
        entries: Vec<DeleteBatchEntry>,
    ) -> TransportResult<BatchResult> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .receipt_handle(entry.receipt_handle)
                    .build()
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))
            })
            .collect::<TransportResult<Vec<_>>>()?;

        let result = self
            .sqs_client
            .delete_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(sdk_error("DeleteMessageBatch"))?;

        Ok(BatchResult {
            successful: result
                .successful()
                .iter()
                .map(|entry| entry.id().to_string())
                .collect(),
            failed: result.failed().iter().map(batch_failure).collect(),
        })
    }

    async fn send(&self, queue_url: &str, message: OutgoingMessage) -> TransportResult<String> {
        let mut request = self
            .sqs_client
            .send_message()
            .queue_url(queue_url)
            .message_body(message.body)
            .set_message_attributes(Some(message_attributes(&message.attributes)?))
            .set_message_group_id(message.group_id)
            .set_message_deduplication_id(message.deduplication_id);

        // FIFO queues reject per-message delays, so only set one when asked
        if message.delay_seconds > 0 {
            request = request.delay_seconds(message.delay_seconds);
        }

        let result = request.send().await.map_err(sdk_error("SendMessage"))?;

        result
            .message_id()
            .map(ToString::to_string)
            .ok_or(TransportError::MalformedResponse("MessageId"))
    }

    async fn send_batch(
        &self,
        queue_url: &str,
        entries: Vec<SendBatchEntry>,
    ) -> TransportResult<BatchResult> {
        let entries = entries
            .into_iter()
            .map(|entry| {
                let message = entry.message;
                let delay = (message.delay_seconds > 0).then_some(message.delay_seconds);

                SendMessageBatchRequestEntry::builder()
                    .id(entry.id)
                    .message_body(message.body)
                    .set_message_attributes(Some(message_attributes(&message.attributes)?))
                    .set_delay_seconds(delay)
                    .set_message_group_id(message.group_id)
                    .set_message_deduplication_id(message.deduplication_id)
                    .build()
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))
            })
            .collect::<TransportResult<Vec<_>>>()?;

        let result = self
            .sqs_client
            .send_message_batch()
            .queue_url(queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(sdk_error("SendMessageBatch"))?;

        Ok(BatchResult {
            successful: result
                .successful()
                .iter()
                .map(|entry| entry.id().to_string())
                .collect(),
            failed: result.failed().iter().map(batch_failure).collect(),
        })
    }

    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        seconds: i32,
    ) -> TransportResult<()> {
        self.sqs_client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds)
            .send()
            .await
            .map_err(sdk_error("ChangeMessageVisibility"))?;

        Ok(())
    }

    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
    ) -> TransportResult<String> {
        let attributes = attributes
            .into_iter()
            .map(|(name, value)| (QueueAttributeName::from(name.as_ref()), value))
            .collect();

        let result = self
            .sqs_client
            .create_queue()
            .queue_name(name)
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(sdk_error("CreateQueue"))?;

        result
            .queue_url()
            .map(ToString::to_string)
            .ok_or(TransportError::MalformedResponse("QueueUrl"))
    }

    async fn get_queue_url(&self, name: &str) -> TransportResult<String> {
        let result = self
            .sqs_client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(GetQueueUrlError::is_queue_does_not_exist)
                {
                    TransportError::QueueNotFound(name.to_string())
                } else {
                    sdk_error("GetQueueUrl")(err)
                }
            })?;

        result
            .queue_url()
            .map(ToString::to_string)
            .ok_or(TransportError::MalformedResponse("QueueUrl"))
    }

    async fn delete_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.sqs_client
            .delete_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(sdk_error("DeleteQueue"))?;

        Ok(())
    }

    async fn purge_queue(&self, queue_url: &str) -> TransportResult<()> {
        self.sqs_client
            .purge_queue()
            .queue_url(queue_url)
            .send()
            .await
            .map_err(sdk_error("PurgeQueue"))?;

        Ok(())
    }

    async fn set_redrive_policy(
        &self,
        queue_url: &str,
        policy: &RedrivePolicy,
    ) -> TransportResult<()> {
        let policy = serde_json::to_string(policy)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        self.sqs_client
            .set_queue_attributes()
            .queue_url(queue_url)
            .attributes(QueueAttributeName::RedrivePolicy, policy)
            .send()
            .await
            .map_err(sdk_error("SetQueueAttributes"))?;

        Ok(())
    }

    async fn get_attributes(
        &self,
        queue_url: &str,
        names: &[QueueAttribute],
    ) -> TransportResult<QueueAttributes> {
        let names = names
            .iter()
            .map(|name| QueueAttributeName::from(name.as_ref()))
            .collect();

        let result = self
            .sqs_client
            .get_queue_attributes()
            .queue_url(queue_url)
            .set_attribute_names(Some(names))
            .send()
            .await
            .map_err(sdk_error("GetQueueAttributes"))?;

        Ok(result
            .attributes()
            .into_iter()
            .flatten()
            .filter_map(|(name, value)| {
                name.as_str()
                    .parse::<QueueAttribute>()
                    .ok()
                    .map(|name| (name, value.clone()))
            })
            .collect())
    }
}
