//! Transport-neutral queue message.

use aws_lambda_events::sqs::SqsMessage;
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};

const RECEIVE_COUNT_ATTRIBUTE: &str = "ApproximateReceiveCount";

/// One delivery unit, whichever transport handed it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEnvelope {
    /// Identifier reported back for partial-batch failures. Empty if the
    /// transport omitted it; Lambda then retries the whole batch.
    pub message_id: String,
    /// Needed to delete or release the message when polling.
    pub receipt_handle: Option<String>,
    pub body: Option<String>,
    pub receive_count: Option<u32>,
}

impl QueueEnvelope {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            receipt_handle: None,
            body: Some(body.into()),
            receive_count: None,
        }
    }
}

impl From<SqsMessage> for QueueEnvelope {
    fn from(message: SqsMessage) -> Self {
        Self {
            receive_count: message
                .attributes
                .get(RECEIVE_COUNT_ATTRIBUTE)
                .and_then(|c| c.parse().ok()),
            message_id: message.message_id.unwrap_or_default(),
            receipt_handle: message.receipt_handle,
            body: message.body,
        }
    }
}

impl From<Message> for QueueEnvelope {
    fn from(message: Message) -> Self {
        let receive_count = message
            .attributes()
            .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|c| c.parse().ok());

        Self {
            message_id: message.message_id.unwrap_or_default(),
            receipt_handle: message.receipt_handle,
            body: message.body,
            receive_count,
        }
    }
}
