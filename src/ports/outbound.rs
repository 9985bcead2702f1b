//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    DefaultStreamGroup, DomainError, Message, NewStream, NewUser, OutgoingMessage, Realm, Stream,
    Subscription, TopicSummary, User,
};

/// Chat database. Every unit of work runs inside one write transaction.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Open a write transaction. Dropping the handle without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DomainError>;
}

/// An open write transaction.
///
/// Lookups return `Ok(None)` for missing rows; errors are storage failures only.
#[async_trait::async_trait]
pub trait StoreTx: Send {
    async fn realm(&mut self) -> Result<Realm, DomainError>;
    async fn save_realm(&mut self, realm: &Realm) -> Result<(), DomainError>;

    async fn user_by_id(&mut self, id: i64) -> Result<Option<User>, DomainError>;
    /// Case-insensitive.
    async fn user_by_email(&mut self, email: &str) -> Result<Option<User>, DomainError>;
    async fn user_by_api_key(&mut self, api_key: &str) -> Result<Option<User>, DomainError>;
    async fn insert_user(&mut self, user: &NewUser) -> Result<User, DomainError>;
    async fn count_users(&mut self) -> Result<i64, DomainError>;

    async fn stream_by_id(&mut self, id: i64) -> Result<Option<Stream>, DomainError>;
    /// Case-insensitive; includes archived streams.
    async fn stream_by_name(&mut self, name: &str) -> Result<Option<Stream>, DomainError>;
    async fn insert_stream(&mut self, stream: &NewStream) -> Result<Stream, DomainError>;
    /// Writes every mutable column of `stream`.
    async fn update_stream(&mut self, stream: &Stream) -> Result<(), DomainError>;
    /// All streams including archived ones, ordered by id.
    async fn list_streams(&mut self) -> Result<Vec<Stream>, DomainError>;

    /// The row for (user, stream), active or not.
    async fn subscription(
        &mut self,
        user_id: i64,
        stream_id: i64,
    ) -> Result<Option<Subscription>, DomainError>;
    /// Active subscriptions of a user.
    async fn subscriptions_for_user(&mut self, user_id: i64)
    -> Result<Vec<Subscription>, DomainError>;
    /// Active subscribers of a stream, ascending.
    async fn subscriber_ids(&mut self, stream_id: i64) -> Result<Vec<i64>, DomainError>;
    /// Inserts the row, or reactivates an existing one keeping its properties.
    async fn upsert_subscription(&mut self, sub: &Subscription) -> Result<(), DomainError>;
    async fn deactivate_subscription(
        &mut self,
        user_id: i64,
        stream_id: i64,
    ) -> Result<(), DomainError>;
    /// Writes the display properties of an existing row.
    async fn update_subscription(&mut self, sub: &Subscription) -> Result<(), DomainError>;

    async fn default_stream_ids(&mut self) -> Result<Vec<i64>, DomainError>;
    async fn add_default_stream(&mut self, stream_id: i64) -> Result<(), DomainError>;
    async fn remove_default_stream(&mut self, stream_id: i64) -> Result<(), DomainError>;

    async fn default_stream_groups(&mut self) -> Result<Vec<DefaultStreamGroup>, DomainError>;
    async fn default_stream_group(
        &mut self,
        id: i64,
    ) -> Result<Option<DefaultStreamGroup>, DomainError>;
    /// Case-insensitive.
    async fn default_stream_group_by_name(
        &mut self,
        name: &str,
    ) -> Result<Option<DefaultStreamGroup>, DomainError>;
    async fn insert_default_stream_group(
        &mut self,
        name: &str,
        description: &str,
        stream_ids: &[i64],
    ) -> Result<DefaultStreamGroup, DomainError>;
    /// Writes name and description and replaces the stream list.
    async fn update_default_stream_group(
        &mut self,
        group: &DefaultStreamGroup,
    ) -> Result<(), DomainError>;
    async fn delete_default_stream_group(&mut self, id: i64) -> Result<(), DomainError>;

    async fn insert_message(&mut self, message: &OutgoingMessage) -> Result<i64, DomainError>;
    /// 0 when there are no messages.
    async fn max_message_id(&mut self) -> Result<i64, DomainError>;
    /// Topics of a stream among messages with id > `min_id`, most recent first.
    async fn topics(
        &mut self,
        stream_id: i64,
        min_id: i64,
    ) -> Result<Vec<TopicSummary>, DomainError>;
    /// Ids of messages in a topic (case-insensitive) with id > `min_id`, newest first.
    async fn topic_message_ids(
        &mut self,
        stream_id: i64,
        topic: &str,
        min_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>, DomainError>;
    async fn delete_messages(&mut self, ids: &[i64]) -> Result<(), DomainError>;
    async fn stream_messages(&mut self, stream_id: i64) -> Result<Vec<Message>, DomainError>;
    async fn direct_messages_to(&mut self, user_id: i64) -> Result<Vec<Message>, DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Delivers notification messages produced by a committed unit of work.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, messages: Vec<OutgoingMessage>) -> Result<(), DomainError>;
}
