//! Unit of work: one store transaction plus the notifications it produced.
//!
//! Notifications are only handed to the sink after COMMIT succeeds, so a
//! rolled-back request never announces anything.

use crate::domain::{DomainError, OutgoingMessage};
use crate::ports::{ChatStore, NotificationSink, StoreTx};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::warn;

pub struct UnitOfWork {
    tx: Box<dyn StoreTx>,
    outbox: Vec<OutgoingMessage>,
}

impl UnitOfWork {
    pub async fn begin(store: &dyn ChatStore) -> Result<Self, DomainError> {
        Ok(Self {
            tx: store.begin().await?,
            outbox: Vec::new(),
        })
    }

    pub fn tx(&mut self) -> &mut dyn StoreTx {
        self.tx.as_mut()
    }

    /// Queue a message for delivery after commit.
    pub fn notify(&mut self, message: OutgoingMessage) {
        self.outbox.push(message);
    }

    /// Commit on `Ok`, roll back on `Err`, then dispatch queued notifications.
    ///
    /// A failed dispatch is logged; the data change is already durable.
    pub async fn finish<T>(
        self,
        result: Result<T, DomainError>,
        sink: &dyn NotificationSink,
    ) -> Result<T, DomainError> {
        let UnitOfWork { tx, outbox } = self;
        match result {
            Ok(value) => {
                tx.commit().await?;
                if !outbox.is_empty() {
                    let count = outbox.len();
                    if let Err(e) = sink.dispatch(outbox).await {
                        warn!(count, error = %e, "notification dispatch failed");
                    }
                }
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "rollback failed");
                }
                Err(err)
            }
        }
    }
}

pub type ViewResult = Result<Map<String, Value>, DomainError>;

/// A deferred handler body that runs against a shared unit of work.
pub type View = Box<dyn for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, ViewResult> + Send>;

pub fn view<F>(f: F) -> View
where
    F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, ViewResult> + Send + 'static,
{
    Box::new(f)
}

/// Run `views` in order against one unit of work and merge their JSON objects.
/// Later keys overwrite earlier ones. The first error aborts the rest; the caller's
/// `finish` then rolls back everything.
pub async fn compose_views(uow: &mut UnitOfWork, views: Vec<View>) -> ViewResult {
    let mut merged = Map::new();
    for v in views {
        let part = v(&mut *uow).await?;
        merged.extend(part);
    }
    Ok(merged)
}
