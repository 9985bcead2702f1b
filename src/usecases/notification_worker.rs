//! Async task: reads OutgoingMessage from the mpsc channel and stores them.
//!
//! Fed by QueueNotifier after each committed unit of work. Drains whatever is
//! queued and writes it in one transaction.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::ChatStore;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Messages written per transaction at most.
const MAX_BATCH: usize = 64;

pub struct NotificationWorker {
    store: Arc<dyn ChatStore>,
    rx: mpsc::Receiver<OutgoingMessage>,
}

impl NotificationWorker {
    pub fn new(store: Arc<dyn ChatStore>, rx: mpsc::Receiver<OutgoingMessage>) -> Self {
        Self { store, rx }
    }

    /// Run the worker. Processes until every sender is dropped.
    pub async fn run(mut self) {
        let mut batch = Vec::with_capacity(MAX_BATCH);
        while self.rx.recv_many(&mut batch, MAX_BATCH).await > 0 {
            let count = batch.len();
            match Self::store_batch(self.store.as_ref(), &batch).await {
                Ok(last_id) => debug!(count, last_id, "notifications delivered"),
                Err(e) => error!(count, error = %e, "notification delivery failed"),
            }
            batch.clear();
        }
        info!("notification worker finished (channel closed)");
    }

    async fn store_batch(
        store: &dyn ChatStore,
        batch: &[OutgoingMessage],
    ) -> Result<i64, DomainError> {
        let mut tx = store.begin().await?;
        let mut last_id = 0;
        for message in batch {
            last_id = tx.insert_message(message).await?;
        }
        tx.commit().await?;
        Ok(last_id)
    }
}
