use std::fmt::Display;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::lib::status::types::{CanonicalStatus, FailureReason};

/// Outbound record describing one observed container transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotification {
    pub id: String,
    pub status: CanonicalStatus,
    pub cluster: String,
    pub image: String,
    /// Logical name of the task's first container.
    pub task: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_decimal_string"
    )]
    pub exit_code: Option<i64>,
    #[serde(
        rename = "time",
        skip_serializing_if = "Option::is_none",
        serialize_with = "as_decimal_string"
    )]
    pub elapsed_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

// Consumers expect numbers quoted.
fn as_decimal_string<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    match value {
        Some(value) => serializer.collect_str(value),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot encode notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("publish to {topic} failed: {source}")]
    Transport {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

pub type PublishResult<T> = Result<T, PublishError>;

/// Delivers an encoded notification. Delivery is at-most-once.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, payload: String) -> PublishResult<()>;
}

pub struct SnsPublisher {
    pub client: aws_sdk_sns::Client,
    pub topic_arn: String,
}

/// Writes payloads to the log instead of a topic.
pub struct LogPublisher;

/// Producer side of the publish queue; enqueueing never blocks.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    pub sender: mpsc::UnboundedSender<StatusNotification>,
}
