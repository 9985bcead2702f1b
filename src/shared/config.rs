//! Application configuration. Bind address, paths, realm settings.

use crate::domain::{NewUser, UserRole};
use crate::usecases::{RealmSettings, TopicDeletionSettings};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default capacity for the notification channel. When full, request handlers
/// wait on send().await until the worker catches up.
pub const DEFAULT_NOTIFICATION_QUEUE_SIZE: usize = 1000;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Read from STREAMS_BIND_ADDR.
    #[serde(default)]
    pub bind_addr: Option<String>,
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Directory holding integration logos. Read from STREAMS_STATIC_ROOT.
    #[serde(default)]
    pub static_root: Option<String>,
    /// Domain of the incoming email gateway; stream email addresses are unavailable without it.
    #[serde(default)]
    pub email_gateway_domain: Option<String>,
    #[serde(default)]
    pub notification_bot_email: Option<String>,
    #[serde(default)]
    pub notification_queue_size: Option<usize>,

    #[serde(default)]
    pub topic_delete_batch_size: Option<usize>,
    #[serde(default)]
    pub topic_delete_budget_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Realm
    // ─────────────────────────────────────────────────────────────────────────
    /// Owner account created on first start. Its API key is logged once.
    #[serde(default)]
    pub bootstrap_owner_email: Option<String>,
    #[serde(default)]
    pub bootstrap_owner_name: Option<String>,
    #[serde(default)]
    pub realm_name: Option<String>,
    #[serde(default)]
    pub web_public_streams_enabled: Option<bool>,
    #[serde(default)]
    pub legacy_mirror_realm: Option<bool>,
    #[serde(default)]
    pub limited_plan: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("STREAMS"));
        if let Ok(path) = std::env::var("STREAMS_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        c.build()?.try_deserialize()
    }

    pub fn bind_addr_or_default(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| "127.0.0.1:9991".to_string())
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    pub fn static_root(&self) -> Option<PathBuf> {
        self.static_root.as_deref().map(PathBuf::from)
    }

    pub fn notification_bot_email_or_default(&self) -> String {
        self.notification_bot_email
            .clone()
            .unwrap_or_else(|| "notification-bot@streams.local".to_string())
    }

    pub fn notification_queue_size_or_default(&self) -> usize {
        self.notification_queue_size
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_NOTIFICATION_QUEUE_SIZE)
    }

    /// Batch size and time budget of topic deletion. Defaults to 100 messages and 50 s.
    pub fn topic_deletion(&self) -> TopicDeletionSettings {
        let defaults = TopicDeletionSettings::default();
        TopicDeletionSettings {
            batch_size: self
                .topic_delete_batch_size
                .filter(|n| *n > 0)
                .unwrap_or(defaults.batch_size),
            time_budget: self
                .topic_delete_budget_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.time_budget),
        }
    }

    pub fn realm_settings(&self) -> RealmSettings {
        RealmSettings {
            name: self
                .realm_name
                .clone()
                .unwrap_or_else(|| "Chat".to_string()),
            legacy_mirror_realm: self.legacy_mirror_realm.unwrap_or(false),
            web_public_streams_enabled: self.web_public_streams_enabled.unwrap_or(false),
            limited_plan: self.limited_plan.unwrap_or(false),
        }
    }

    pub fn notification_bot(&self) -> NewUser {
        NewUser {
            email: self.notification_bot_email_or_default(),
            full_name: "Notification Bot".to_string(),
            role: UserRole::Member,
            is_bot: true,
            bot_owner_id: None,
        }
    }

    /// None unless STREAMS_BOOTSTRAP_OWNER_EMAIL is set.
    pub fn bootstrap_owner(&self) -> Option<NewUser> {
        let email = self.bootstrap_owner_email.clone()?;
        Some(NewUser {
            full_name: self
                .bootstrap_owner_name
                .clone()
                .unwrap_or_else(|| email.split('@').next().unwrap_or("owner").to_string()),
            email,
            role: UserRole::Owner,
            is_bot: false,
            bot_owner_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bind_addr_or_default(), "127.0.0.1:9991");
        assert_eq!(cfg.notification_queue_size_or_default(), 1000);
        let deletion = cfg.topic_deletion();
        assert_eq!(deletion.batch_size, 100);
        assert_eq!(deletion.time_budget, Duration::from_secs(50));
        assert!(cfg.bootstrap_owner().is_none());
        assert!(cfg.notification_bot().is_bot);
    }

    #[test]
    fn test_owner_name_falls_back_to_email_local_part() {
        let cfg = AppConfig {
            bootstrap_owner_email: Some("desdemona@example.com".into()),
            topic_delete_batch_size: Some(0),
            ..AppConfig::default()
        };
        let owner = cfg.bootstrap_owner().unwrap();
        assert_eq!(owner.full_name, "desdemona");
        assert_eq!(owner.role, UserRole::Owner);
        assert_eq!(cfg.topic_deletion().batch_size, 100);
    }
}
