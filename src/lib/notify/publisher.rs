use std::sync::Arc;

use super::types::{
    LogPublisher, NotificationQueue, PublishError, PublishResult, Publisher, SnsPublisher,
    StatusNotification,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sns::config::Region;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

impl SnsPublisher {
    pub async fn connect(region: &str, topic_arn: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        info!(region = %region, topic = %topic_arn, "SNS publisher ready");

        SnsPublisher {
            client: aws_sdk_sns::Client::new(&config),
            topic_arn: topic_arn.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for SnsPublisher {
    async fn publish(&self, payload: String) -> PublishResult<()> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(payload)
            .send()
            .await
            .map_err(|err| PublishError::Transport {
                topic: self.topic_arn.clone(),
                source: Box::new(err),
            })?;

        Ok(())
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, payload: String) -> PublishResult<()> {
        info!(payload = %payload, "dry run, notification not published");
        Ok(())
    }
}

impl NotificationQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (NotificationQueue { sender }, receiver)
    }

    /// Hands a notification to the dispatcher. Returns false once the
    /// dispatcher is gone; the notification is dropped in that case.
    pub fn enqueue(&self, notification: StatusNotification) -> bool {
        match self.sender.send(notification) {
            Ok(()) => true,
            Err(mpsc::error::SendError(dropped)) => {
                warn!(container = %dropped.id, "publish queue closed, dropping notification");
                false
            }
        }
    }
}

pub async fn publish_notification(
    publisher: &dyn Publisher,
    notification: &StatusNotification,
) -> PublishResult<()> {
    let payload = serde_json::to_string(notification)?;
    publisher.publish(payload).await
}

/// Starts the publishing side of the queue.
///
/// Every dequeued notification is published by its own spawned task, so
/// delivery order is not guaranteed and a slow publish never holds up the
/// queue. The dispatcher stops when all queue handles are dropped; publishes
/// already spawned keep running.
pub fn spawn_dispatcher(publisher: Arc<dyn Publisher>) -> (NotificationQueue, JoinHandle<()>) {
    let (queue, mut receiver) = NotificationQueue::channel();

    let handle = tokio::spawn(async move {
        while let Some(notification) = receiver.recv().await {
            let publisher = publisher.clone();
            tokio::spawn(async move {
                match publish_notification(publisher.as_ref(), &notification).await {
                    Ok(()) => debug!(container = %notification.id, status = %notification.status, "published"),
                    Err(err) => warn!(container = %notification.id, error = %err, "publish failed"),
                }
            });
        }
        debug!("publish queue drained");
    });

    (queue, handle)
}
