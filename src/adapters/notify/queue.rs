//! Bounded mpsc queue in front of the notification worker.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::NotificationSink;
use tokio::sync::mpsc;
use tracing::debug;

/// Sends each message to the worker. When the queue is full, `dispatch`
/// waits on `send().await` until the worker catches up (backpressure).
#[derive(Clone)]
pub struct QueueNotifier {
    tx: mpsc::Sender<OutgoingMessage>,
}

impl QueueNotifier {
    pub fn new(tx: mpsc::Sender<OutgoingMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait::async_trait]
impl NotificationSink for QueueNotifier {
    async fn dispatch(&self, messages: Vec<OutgoingMessage>) -> Result<(), DomainError> {
        let count = messages.len();
        for message in messages {
            self.tx
                .send(message)
                .await
                .map_err(|_| DomainError::Notify("notification queue closed".to_string()))?;
        }
        debug!(count, "notifications queued");
        Ok(())
    }
}
