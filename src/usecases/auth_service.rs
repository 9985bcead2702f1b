//! API key authentication and first-start bootstrap of the realm and its
//! service users.

use crate::domain::{DomainError, NewUser, Realm, User};
use crate::ports::{ChatStore, StoreTx};
use std::sync::Arc;
use tracing::{info, warn};

/// Realm settings owned by configuration. Policies and announcement streams
/// stay as stored.
#[derive(Debug, Clone)]
pub struct RealmSettings {
    pub name: String,
    pub legacy_mirror_realm: bool,
    pub web_public_streams_enabled: bool,
    pub limited_plan: bool,
}

#[derive(Debug, Clone)]
pub struct Bootstrapped {
    pub realm: Realm,
    pub notification_bot: User,
    pub owner: Option<User>,
}

pub struct AuthService {
    store: Arc<dyn ChatStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self { store }
    }

    /// Active user owning `api_key`, if any.
    pub async fn authenticate(&self, api_key: &str) -> Result<Option<User>, DomainError> {
        if api_key.is_empty() {
            return Ok(None);
        }
        let mut tx = self.store.begin().await?;
        let user = tx.user_by_api_key(api_key).await?;
        tx.rollback().await?;
        Ok(user.filter(|u| u.is_active))
    }

    /// Apply configured realm settings and make sure the notification bot
    /// (and optionally an owner) exist. Safe to run on every start.
    pub async fn bootstrap(
        &self,
        settings: &RealmSettings,
        owner: Option<NewUser>,
        notification_bot: NewUser,
    ) -> Result<Bootstrapped, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut realm = tx.realm().await?;
        realm.name = settings.name.clone();
        realm.legacy_mirror_realm = settings.legacy_mirror_realm;
        realm.web_public_streams_enabled = settings.web_public_streams_enabled;
        realm.limited_plan = settings.limited_plan;
        tx.save_realm(&realm).await?;

        let notification_bot = ensure_user(tx.as_mut(), &notification_bot).await?;
        if !notification_bot.is_bot {
            warn!(email = %notification_bot.email, "notification sender is not a bot account");
        }
        let owner = match owner {
            Some(owner) => Some(ensure_user(tx.as_mut(), &owner).await?),
            None => None,
        };
        tx.commit().await?;

        info!(realm = %realm.name, bot_id = notification_bot.id, "realm ready");
        Ok(Bootstrapped {
            realm,
            notification_bot,
            owner,
        })
    }
}

async fn ensure_user(tx: &mut dyn StoreTx, user: &NewUser) -> Result<User, DomainError> {
    if let Some(existing) = tx.user_by_email(&user.email).await? {
        return Ok(existing);
    }
    let created = tx.insert_user(user).await?;
    // Only chance to see the key of a fresh account.
    info!(
        user_id = created.id,
        email = %created.email,
        role = created.role.as_str(),
        api_key = %created.api_key,
        "user created"
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::SqliteStore;
    use crate::domain::UserRole;

    fn settings() -> RealmSettings {
        RealmSettings {
            name: "Zulip Dev".into(),
            legacy_mirror_realm: false,
            web_public_streams_enabled: true,
            limited_plan: false,
        }
    }

    fn new_user(email: &str, role: UserRole, is_bot: bool) -> NewUser {
        NewUser {
            email: email.into(),
            full_name: "Someone".into(),
            role,
            is_bot,
            bot_owner_id: None,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent_and_keys_authenticate() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect(dir.path()).await.unwrap());
        let auth = AuthService::new(store.clone());

        let owner = Some(new_user("desdemona@example.com", UserRole::Owner, false));
        let bot = new_user("notification-bot@example.com", UserRole::Member, true);
        let first = auth.bootstrap(&settings(), owner.clone(), bot.clone()).await.unwrap();
        let second = auth.bootstrap(&settings(), owner, bot).await.unwrap();
        assert_eq!(first.notification_bot.id, second.notification_bot.id);
        assert_eq!(second.realm.name, "Zulip Dev");
        assert!(second.realm.web_public_streams_enabled);

        let owner = first.owner.unwrap();
        let found = auth.authenticate(&owner.api_key).await.unwrap().unwrap();
        assert_eq!(found.id, owner.id);
        assert!(auth.authenticate("bogus").await.unwrap().is_none());
        assert!(auth.authenticate("").await.unwrap().is_none());
    }
}
