//! Delete every message in a topic, in short batches under a time budget.
//!
//! Each batch commits on its own, so a call that runs out of time keeps its
//! progress and the client simply repeats the request.

use crate::domain::{DomainError, User};
use crate::ports::{ChatStore, NotificationSink};
use crate::usecases::access::{access_stream_by_id, history_floor};
use crate::usecases::unit_of_work::UnitOfWork;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct TopicDeletionSettings {
    pub batch_size: usize,
    pub time_budget: Duration,
}

impl Default for TopicDeletionSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            time_budget: Duration::from_secs(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TopicDeletionOutcome {
    pub complete: bool,
    /// Non-empty batches committed by this call.
    pub batches: usize,
    pub deleted: usize,
}

pub struct TopicDeletionService {
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn NotificationSink>,
    settings: TopicDeletionSettings,
}

impl TopicDeletionService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
        settings: TopicDeletionSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            settings,
        }
    }

    pub async fn delete_in_topic(
        &self,
        actor: &User,
        stream_id: i64,
        topic: &str,
    ) -> Result<TopicDeletionOutcome, DomainError> {
        let started = Instant::now();
        let budget = self.settings.time_budget;
        self.delete_until(actor, stream_id, topic, |_| started.elapsed() >= budget)
            .await
    }

    /// Batch loop. `out_of_time` is asked before every batch with the number of
    /// batches committed so far.
    async fn delete_until(
        &self,
        actor: &User,
        stream_id: i64,
        topic: &str,
        mut out_of_time: impl FnMut(usize) -> bool,
    ) -> Result<TopicDeletionOutcome, DomainError> {
        if !actor.is_realm_admin() {
            return Err(DomainError::forbidden("Must be an organization administrator"));
        }

        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let access = access_stream_by_id(uow.tx(), actor, stream_id, false)
            .await
            .map(|(stream, sub)| history_floor(&stream, sub.as_ref()));
        let floor = uow.finish(access, self.notifier.as_ref()).await?;

        let mut outcome = TopicDeletionOutcome {
            complete: false,
            batches: 0,
            deleted: 0,
        };
        // Nothing in the stream is visible to the actor.
        let Some(min_id) = floor else {
            outcome.complete = true;
            return Ok(outcome);
        };

        loop {
            if out_of_time(outcome.batches) {
                info!(
                    stream_id,
                    topic,
                    batches = outcome.batches,
                    deleted = outcome.deleted,
                    "topic deletion stopped at time budget"
                );
                return Ok(outcome);
            }

            let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
            let batch = match uow
                .tx()
                .topic_message_ids(stream_id, topic, min_id, self.settings.batch_size)
                .await
            {
                Ok(ids) if ids.is_empty() => Ok(0),
                Ok(ids) => uow.tx().delete_messages(&ids).await.map(|_| ids.len()),
                Err(e) => Err(e),
            };
            let deleted = uow.finish(batch, self.notifier.as_ref()).await?;
            if deleted == 0 {
                break;
            }
            outcome.batches += 1;
            outcome.deleted += deleted;
            debug!(stream_id, topic, deleted, "topic batch deleted");
        }

        outcome.complete = true;
        info!(
            stream_id,
            topic,
            batches = outcome.batches,
            deleted = outcome.deleted,
            "topic deleted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::Fixture;

    fn settings(batch_size: usize) -> TopicDeletionSettings {
        TopicDeletionSettings {
            batch_size,
            ..TopicDeletionSettings::default()
        }
    }

    #[tokio::test]
    async fn test_batches_are_ceil_of_count() {
        let fx = Fixture::new().await;
        let stream = fx.create_stream("ops", false).await;
        fx.post(&stream, "deploys", 25).await;
        fx.post(&stream, "other", 3).await;

        let outcome = fx
            .topic_deletion(settings(10))
            .delete_in_topic(&fx.admin, stream.id, "DEPLOYS")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TopicDeletionOutcome {
                complete: true,
                batches: 3,
                deleted: 25
            }
        );
        assert_eq!(fx.message_count(stream.id).await, 3);
    }

    #[tokio::test]
    async fn test_non_ascii_topic_matches_any_case() {
        let fx = Fixture::new().await;
        let stream = fx.create_stream("ops", false).await;
        fx.post(&stream, "Ärger", 3).await;

        let outcome = fx
            .topic_deletion(settings(10))
            .delete_in_topic(&fx.admin, stream.id, "ärger")
            .await
            .unwrap();
        assert!(outcome.complete);
        assert_eq!(outcome.deleted, 3);
        assert_eq!(fx.message_count(stream.id).await, 0);
    }

    #[tokio::test]
    async fn test_timed_out_call_then_retry_deletes_everything_once() {
        let fx = Fixture::new().await;
        let stream = fx.create_stream("ops", false).await;
        fx.post(&stream, "deploys", 25).await;
        let svc = fx.topic_deletion(settings(10));

        let partial = svc
            .delete_until(&fx.admin, stream.id, "deploys", |batches| batches >= 2)
            .await
            .unwrap();
        assert!(!partial.complete);
        assert_eq!(partial.deleted, 20);
        assert_eq!(fx.message_count(stream.id).await, 5);

        let retry = svc
            .delete_in_topic(&fx.admin, stream.id, "deploys")
            .await
            .unwrap();
        assert!(retry.complete);
        assert_eq!(partial.deleted + retry.deleted, 25);
        assert_eq!(fx.message_count(stream.id).await, 0);
    }

    #[tokio::test]
    async fn test_zero_budget_returns_incomplete_without_deleting() {
        let fx = Fixture::new().await;
        let stream = fx.create_stream("ops", false).await;
        fx.post(&stream, "deploys", 3).await;
        let svc = fx.topic_deletion(TopicDeletionSettings {
            batch_size: 10,
            time_budget: Duration::ZERO,
        });
        let outcome = svc
            .delete_in_topic(&fx.admin, stream.id, "deploys")
            .await
            .unwrap();
        assert!(!outcome.complete);
        assert_eq!(fx.message_count(stream.id).await, 3);
    }

    #[tokio::test]
    async fn test_only_admins_delete_and_only_visible_history() {
        let fx = Fixture::new().await;
        let svc = fx.topic_deletion(settings(10));
        let secret = fx.create_stream("secret", true).await;
        fx.subscribe(&fx.member, &secret).await;
        fx.post(&secret, "plans", 4).await;

        assert_eq!(
            svc.delete_in_topic(&fx.member, secret.id, "plans").await,
            Err(DomainError::forbidden("Must be an organization administrator"))
        );
        assert_eq!(
            svc.delete_in_topic(&fx.admin, secret.id, "plans").await,
            Err(DomainError::invalid_stream_id())
        );

        // The admin joins late: protected history hides the earlier messages.
        fx.subscribe(&fx.admin, &secret).await;
        fx.post(&secret, "plans", 1).await;
        let outcome = svc
            .delete_in_topic(&fx.admin, secret.id, "plans")
            .await
            .unwrap();
        assert_eq!(outcome.deleted, 1);
        assert_eq!(fx.message_count(secret.id).await, 4);
    }
}
