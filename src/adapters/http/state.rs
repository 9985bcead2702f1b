//! Shared application state handed to every handler.

use crate::integrations::IntegrationRegistry;
use crate::ports::{ChatStore, NotificationSink};
use crate::usecases::{
    AuthService, DefaultStreamService, StreamService, SubscriptionService, TopicDeletionService,
    TopicDeletionSettings,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub streams: Arc<StreamService>,
    pub subscriptions: Arc<SubscriptionService>,
    pub default_streams: Arc<DefaultStreamService>,
    pub topic_deletion: Arc<TopicDeletionService>,
    pub integrations: Arc<IntegrationRegistry>,
}

/// Inputs for [`AppState::new`] that come from configuration and bootstrap.
pub struct ServiceSettings {
    pub notification_bot_id: i64,
    pub email_gateway_domain: Option<String>,
    pub topic_deletion: TopicDeletionSettings,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
        integrations: IntegrationRegistry,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            auth: Arc::new(AuthService::new(Arc::clone(&store))),
            streams: Arc::new(StreamService::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                settings.email_gateway_domain,
            )),
            subscriptions: Arc::new(SubscriptionService::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                settings.notification_bot_id,
            )),
            default_streams: Arc::new(DefaultStreamService::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
            )),
            topic_deletion: Arc::new(TopicDeletionService::new(
                store,
                notifier,
                settings.topic_deletion,
            )),
            integrations: Arc::new(integrations),
        }
    }
}
