//! Recording sink for testing. Keeps dispatched messages in memory.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::NotificationSink;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything dispatched so far.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut v) = self.sent.lock() {
            v.clear();
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotifier {
    async fn dispatch(&self, messages: Vec<OutgoingMessage>) -> Result<(), DomainError> {
        info!(count = messages.len(), "[RECORDING] notifications dispatched");
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| DomainError::Notify(e.to_string()))?;
        sent.extend(messages);
        Ok(())
    }
}
