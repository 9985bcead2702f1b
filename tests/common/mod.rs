//! Test utilities and common setup.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chat_streams::adapters::http::{AppState, ServiceSettings, create_router};
use chat_streams::adapters::notify::RecordingNotifier;
use chat_streams::adapters::persistence::SqliteStore;
use chat_streams::domain::{NewUser, UserRole};
use chat_streams::integrations::IntegrationRegistry;
use chat_streams::ports::{ChatStore, NotificationSink};
use chat_streams::usecases::{AuthService, RealmSettings, TopicDeletionSettings};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A router over a fresh store plus API keys for a few users.
pub struct TestApp {
    pub router: Router,
    pub owner_key: String,
    pub member_key: String,
    pub notifier: Arc<RecordingNotifier>,
    _dir: TempDir,
}

fn new_user(email: &str, role: UserRole, is_bot: bool) -> NewUser {
    NewUser {
        email: email.to_string(),
        full_name: email.split('@').next().unwrap_or(email).to_string(),
        role,
        is_bot,
        bot_owner_id: None,
    }
}

/// Create a test application with all services initialized.
pub async fn test_app() -> TestApp {
    test_app_with(false).await
}

/// Like [`test_app`], with web-public streams enabled for the realm.
pub async fn test_app_with(web_public_streams_enabled: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ChatStore> = Arc::new(SqliteStore::connect(dir.path()).await.unwrap());

    let settings = RealmSettings {
        name: "Test".to_string(),
        legacy_mirror_realm: false,
        web_public_streams_enabled,
        limited_plan: false,
    };
    let boot = AuthService::new(Arc::clone(&store))
        .bootstrap(
            &settings,
            Some(new_user("desdemona@zulip.example.com", UserRole::Owner, false)),
            new_user("notification-bot@zulip.example.com", UserRole::Member, true),
        )
        .await
        .unwrap();

    let mut tx = store.begin().await.unwrap();
    let member = tx
        .insert_user(&new_user("hamlet@zulip.example.com", UserRole::Member, false))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let notifier = Arc::new(RecordingNotifier::new());
    let sink: Arc<dyn NotificationSink> = notifier.clone();
    let state = AppState::new(
        store,
        sink,
        IntegrationRegistry::builtin(None).unwrap(),
        ServiceSettings {
            notification_bot_id: boot.notification_bot.id,
            email_gateway_domain: Some("zulip.example.com".to_string()),
            topic_deletion: TopicDeletionSettings::default(),
        },
    );

    TestApp {
        router: create_router(state),
        owner_key: boot.owner.unwrap().api_key,
        member_key: member.api_key,
        notifier,
        _dir: dir,
    }
}

impl TestApp {
    /// Send one request and decode the JSON body.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        api_key: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = api_key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, api_key, None).await
    }

    /// Subscribe the member to `name`, creating it if needed, and return its id.
    pub async fn member_stream(&self, name: &str) -> i64 {
        let (status, _) = self
            .send(
                Method::POST,
                "/api/v1/users/me/subscriptions",
                Some(&self.member_key),
                Some(serde_json::json!({ "subscriptions": [{ "name": name }] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, json) = self
            .get(
                &format!("/api/v1/get_stream_id?stream={}", name.replace(' ', "%20")),
                Some(&self.member_key),
            )
            .await;
        json["stream_id"].as_i64().unwrap()
    }
}
