//! Shared setup for use-case tests: a temp-dir store with one user per role.

use crate::adapters::notify::RecordingNotifier;
use crate::adapters::persistence::SqliteStore;
use crate::domain::{
    NewStream, NewUser, Realm, Stream, StreamPostPolicy, Subscription, SystemGroup, User, UserRole,
};
use crate::ports::{ChatStore, NotificationSink, StoreTx};
use crate::usecases::default_streams::DefaultStreamService;
use crate::usecases::stream_service::StreamService;
use crate::usecases::subscription_service::SubscriptionService;
use crate::usecases::topic_deletion::{TopicDeletionService, TopicDeletionSettings};
use std::sync::Arc;

pub struct Fixture {
    _dir: tempfile::TempDir,
    pub store: Arc<SqliteStore>,
    pub sink: RecordingNotifier,
    pub bot: User,
    pub owner: User,
    pub admin: User,
    pub member: User,
    pub guest: User,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path()).await.unwrap());
        let mut tx = store.begin().await.unwrap();
        tx.save_realm(&Realm::default()).await.unwrap();
        tx.commit().await.unwrap();

        let mut fx = Self {
            _dir: dir,
            store,
            sink: RecordingNotifier::new(),
            bot: placeholder(),
            owner: placeholder(),
            admin: placeholder(),
            member: placeholder(),
            guest: placeholder(),
        };
        fx.bot = fx.user("notification-bot@example.com", UserRole::Member, true).await;
        fx.owner = fx.user("desdemona@example.com", UserRole::Owner, false).await;
        fx.admin = fx.user("iago@example.com", UserRole::Administrator, false).await;
        fx.member = fx.user("hamlet@example.com", UserRole::Member, false).await;
        fx.guest = fx.user("polonius@example.com", UserRole::Guest, false).await;
        fx
    }

    pub fn chat_store(&self) -> Arc<dyn ChatStore> {
        self.store.clone()
    }

    pub fn notifier(&self) -> Arc<dyn NotificationSink> {
        Arc::new(self.sink.clone())
    }

    pub fn streams(&self) -> StreamService {
        StreamService::new(
            self.chat_store(),
            self.notifier(),
            Some("zulip.example.com".to_string()),
        )
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.chat_store(), self.notifier(), self.bot.id)
    }

    pub fn defaults(&self) -> DefaultStreamService {
        DefaultStreamService::new(self.chat_store(), self.notifier())
    }

    pub fn topic_deletion(&self, settings: TopicDeletionSettings) -> TopicDeletionService {
        TopicDeletionService::new(self.chat_store(), self.notifier(), settings)
    }

    pub async fn tx(&self) -> Box<dyn StoreTx> {
        self.store.begin().await.unwrap()
    }

    pub async fn user(&self, email: &str, role: UserRole, is_bot: bool) -> User {
        let mut tx = self.tx().await;
        let user = tx
            .insert_user(&NewUser {
                email: email.to_string(),
                full_name: email.split('@').next().unwrap_or(email).to_string(),
                role,
                is_bot,
                bot_owner_id: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        user
    }

    pub async fn create_stream(&self, name: &str, invite_only: bool) -> Stream {
        let mut tx = self.tx().await;
        let stream = tx
            .insert_stream(&NewStream {
                name: name.to_string(),
                description: String::new(),
                invite_only,
                is_web_public: false,
                history_public_to_subscribers: !invite_only,
                stream_post_policy: StreamPostPolicy::Everyone,
                message_retention_days: None,
                can_administer_channel_group: SystemGroup::Administrators,
                can_remove_subscribers_group: SystemGroup::Administrators,
                creator_id: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        stream
    }

    pub async fn subscribe(&self, user: &User, stream: &Stream) {
        let mut tx = self.tx().await;
        let joined = tx.max_message_id().await.unwrap();
        tx.upsert_subscription(&Subscription {
            user_id: user.id,
            stream_id: stream.id,
            active: true,
            color: "#76ce90".to_string(),
            is_muted: false,
            pin_to_top: false,
            desktop_notifications: None,
            audible_notifications: None,
            push_notifications: None,
            email_notifications: None,
            wildcard_mentions_notify: None,
            joined_after_message_id: joined,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn find_stream(&self, name: &str) -> Option<Stream> {
        let mut tx = self.tx().await;
        let stream = tx.stream_by_name(name).await.unwrap();
        tx.rollback().await.unwrap();
        stream
    }

    pub async fn stream(&self, name: &str) -> Stream {
        self.find_stream(name).await.unwrap()
    }

    pub async fn stream_by_id(&self, id: i64) -> Stream {
        let mut tx = self.tx().await;
        let stream = tx.stream_by_id(id).await.unwrap().unwrap();
        tx.rollback().await.unwrap();
        stream
    }

    pub async fn subscriber_ids(&self, stream_id: i64) -> Vec<i64> {
        let mut tx = self.tx().await;
        let ids = tx.subscriber_ids(stream_id).await.unwrap();
        tx.rollback().await.unwrap();
        ids
    }

    pub async fn default_stream_ids(&self) -> Vec<i64> {
        let mut tx = self.tx().await;
        let ids = tx.default_stream_ids().await.unwrap();
        tx.rollback().await.unwrap();
        ids
    }

    pub async fn update_realm(&self, f: impl FnOnce(&mut Realm)) {
        let mut tx = self.tx().await;
        let mut realm = tx.realm().await.unwrap();
        f(&mut realm);
        tx.save_realm(&realm).await.unwrap();
        tx.commit().await.unwrap();
    }

    /// Post `count` messages to a stream topic and return their ids.
    pub async fn post(&self, stream: &Stream, topic: &str, count: usize) -> Vec<i64> {
        let mut tx = self.tx().await;
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let id = tx
                .insert_message(&crate::domain::OutgoingMessage {
                    sender_id: self.member.id,
                    recipient: crate::domain::Recipient::Stream {
                        stream_id: stream.id,
                        topic: topic.to_string(),
                    },
                    content: format!("message {}", i),
                })
                .await
                .unwrap();
            ids.push(id);
        }
        tx.commit().await.unwrap();
        ids
    }

    pub async fn message_count(&self, stream_id: i64) -> usize {
        let mut tx = self.tx().await;
        let count = tx.stream_messages(stream_id).await.unwrap().len();
        tx.rollback().await.unwrap();
        count
    }
}

fn placeholder() -> User {
    User {
        id: 0,
        email: String::new(),
        full_name: String::new(),
        role: UserRole::Member,
        is_bot: false,
        bot_owner_id: None,
        is_active: true,
        api_key: String::new(),
    }
}
