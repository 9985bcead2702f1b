//! Application use cases. Orchestrate domain logic via ports.

pub mod access;
pub mod auth_service;
pub mod default_streams;
pub mod notification_worker;
pub mod notifications;
pub mod stream_service;
pub mod subscription_service;
pub mod topic_deletion;
pub mod unit_of_work;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth_service::{AuthService, Bootstrapped, RealmSettings};
pub use default_streams::DefaultStreamService;
pub use notification_worker::NotificationWorker;
pub use stream_service::StreamService;
pub use subscription_service::SubscriptionService;
pub use topic_deletion::{TopicDeletionService, TopicDeletionSettings};
pub use unit_of_work::UnitOfWork;
