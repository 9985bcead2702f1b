//! Stream and user access checks shared by the workflows.
//!
//! Missing and hidden streams produce the same "Invalid channel ID" error so
//! callers cannot probe for private streams.

use crate::domain::{DomainError, Realm, Stream, Subscription, User};
use crate::ports::StoreTx;
use serde::Deserialize;
use std::collections::HashSet;

/// Users named in a request, either all by id or all by email.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Principals {
    Ids(Vec<i64>),
    Emails(Vec<String>),
}

impl Principals {
    pub fn is_empty(&self) -> bool {
        match self {
            Principals::Ids(ids) => ids.is_empty(),
            Principals::Emails(emails) => emails.is_empty(),
        }
    }

    /// True when every entry names `user`.
    pub fn only(&self, user: &User) -> bool {
        match self {
            Principals::Ids(ids) => ids.iter().all(|id| *id == user.id),
            Principals::Emails(emails) => {
                emails.iter().all(|e| e.eq_ignore_ascii_case(&user.email))
            }
        }
    }
}

/// Resolve principals to active users, deduplicated, in request order.
pub async fn resolve_principals(
    tx: &mut dyn StoreTx,
    principals: &Principals,
) -> Result<Vec<User>, DomainError> {
    let mut users = Vec::new();
    let mut seen = HashSet::new();
    match principals {
        Principals::Ids(ids) => {
            for id in ids {
                let user = tx
                    .user_by_id(*id)
                    .await?
                    .filter(|u| u.is_active)
                    .ok_or_else(|| DomainError::invalid(format!("Invalid user ID: {}", id)))?;
                if seen.insert(user.id) {
                    users.push(user);
                }
            }
        }
        Principals::Emails(emails) => {
            for email in emails {
                let user = tx
                    .user_by_email(email)
                    .await?
                    .filter(|u| u.is_active)
                    .ok_or_else(|| DomainError::invalid(format!("Invalid email '{}'", email)))?;
                if seen.insert(user.id) {
                    users.push(user);
                }
            }
        }
    }
    Ok(users)
}

pub async fn active_subscription(
    tx: &mut dyn StoreTx,
    user_id: i64,
    stream_id: i64,
) -> Result<Option<Subscription>, DomainError> {
    Ok(tx
        .subscription(user_id, stream_id)
        .await?
        .filter(|s| s.active))
}

/// Can the user see the stream's messages (not just its metadata)?
pub fn has_content_access(user: &User, stream: &Stream, sub: Option<&Subscription>) -> bool {
    if stream.is_web_public {
        return true;
    }
    if sub.is_some_and(|s| s.active) {
        return true;
    }
    !user.is_guest() && !stream.invite_only
}

/// Lowest message id (exclusive) the user may read in this stream, or None when
/// no history is visible at all.
pub fn history_floor(stream: &Stream, sub: Option<&Subscription>) -> Option<i64> {
    if stream.history_public_to_subscribers {
        Some(0)
    } else {
        sub.filter(|s| s.active).map(|s| s.joined_after_message_id)
    }
}

pub fn can_administer(user: &User, stream: &Stream) -> bool {
    user.is_realm_admin()
        || (!user.is_guest() && stream.can_administer_channel_group.contains(user.role))
}

pub fn can_remove_subscribers(user: &User, stream: &Stream) -> bool {
    user.is_realm_admin()
        || (!user.is_guest() && stream.can_remove_subscribers_group.contains(user.role))
}

pub fn can_subscribe_others(realm: &Realm, user: &User) -> bool {
    !user.is_guest() && realm.invite_to_stream_policy.contains(user.role)
}

/// Stream by id that the user may access. With `allow_realm_admin`, admins may
/// read metadata of private streams they are not subscribed to.
pub async fn access_stream_by_id(
    tx: &mut dyn StoreTx,
    user: &User,
    stream_id: i64,
    allow_realm_admin: bool,
) -> Result<(Stream, Option<Subscription>), DomainError> {
    let stream = tx
        .stream_by_id(stream_id)
        .await?
        .filter(|s| !s.deactivated)
        .ok_or_else(DomainError::invalid_stream_id)?;
    let sub = active_subscription(tx, user.id, stream.id).await?;
    if has_content_access(user, &stream, sub.as_ref())
        || (allow_realm_admin && user.is_realm_admin())
    {
        Ok((stream, sub))
    } else {
        Err(DomainError::invalid_stream_id())
    }
}

pub async fn access_stream_by_name(
    tx: &mut dyn StoreTx,
    user: &User,
    name: &str,
    allow_realm_admin: bool,
) -> Result<(Stream, Option<Subscription>), DomainError> {
    let invalid = || DomainError::invalid(format!("Invalid channel name '{}'", name));
    let stream = tx.stream_by_name(name).await?.ok_or_else(invalid)?;
    if stream.deactivated {
        return Err(DomainError::invalid(format!(
            "Channel '{}' is archived.",
            stream.name
        )));
    }
    let sub = active_subscription(tx, user.id, stream.id).await?;
    if has_content_access(user, &stream, sub.as_ref())
        || (allow_realm_admin && user.is_realm_admin())
    {
        Ok((stream, sub))
    } else {
        Err(invalid())
    }
}

/// Stream the user may administer (rename, re-describe, archive, ...).
///
/// Realm admins pass even for private streams they are not subscribed to.
/// Users who can see the stream but not administer it get "Insufficient permission".
pub async fn access_stream_for_update(
    tx: &mut dyn StoreTx,
    user: &User,
    stream_id: i64,
) -> Result<(Stream, Option<Subscription>), DomainError> {
    let stream = tx
        .stream_by_id(stream_id)
        .await?
        .filter(|s| !s.deactivated)
        .ok_or_else(DomainError::invalid_stream_id)?;
    let sub = active_subscription(tx, user.id, stream.id).await?;
    if user.is_realm_admin() {
        return Ok((stream, sub));
    }
    let visible = has_content_access(user, &stream, sub.as_ref());
    if visible && can_administer(user, &stream) {
        Ok((stream, sub))
    } else if visible {
        Err(DomainError::insufficient_permission())
    } else {
        Err(DomainError::invalid_stream_id())
    }
}

/// Web-public stream for an anonymous caller.
pub async fn access_web_public_stream(
    tx: &mut dyn StoreTx,
    stream_id: i64,
) -> Result<Stream, DomainError> {
    let realm = tx.realm().await?;
    if !realm.web_public_streams_enabled {
        return Err(DomainError::invalid_stream_id());
    }
    tx.stream_by_id(stream_id)
        .await?
        .filter(|s| s.is_web_public && !s.deactivated)
        .ok_or_else(DomainError::invalid_stream_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StreamPostPolicy, SystemGroup, UserRole};

    fn user(role: UserRole) -> User {
        User {
            id: 10,
            email: "hamlet@example.com".into(),
            full_name: "Hamlet".into(),
            role,
            is_bot: false,
            bot_owner_id: None,
            is_active: true,
            api_key: String::new(),
        }
    }

    fn stream(invite_only: bool, web_public: bool, history_public: bool) -> Stream {
        Stream {
            id: 1,
            name: "verona".into(),
            description: String::new(),
            invite_only,
            is_web_public: web_public,
            history_public_to_subscribers: history_public,
            stream_post_policy: StreamPostPolicy::Everyone,
            message_retention_days: None,
            can_administer_channel_group: SystemGroup::Administrators,
            can_remove_subscribers_group: SystemGroup::Administrators,
            email_token: "tok".into(),
            deactivated: false,
            date_created: 0,
            creator_id: None,
        }
    }

    fn sub(joined_after: i64) -> Subscription {
        Subscription {
            user_id: 10,
            stream_id: 1,
            active: true,
            color: "#76ce90".into(),
            is_muted: false,
            pin_to_top: false,
            desktop_notifications: None,
            audible_notifications: None,
            push_notifications: None,
            email_notifications: None,
            wildcard_mentions_notify: None,
            joined_after_message_id: joined_after,
        }
    }

    #[test]
    fn test_guest_sees_only_subscribed_or_web_public() {
        let guest = user(UserRole::Guest);
        assert!(!has_content_access(&guest, &stream(false, false, true), None));
        assert!(has_content_access(&guest, &stream(false, true, true), None));
        assert!(has_content_access(&guest, &stream(false, false, true), Some(&sub(0))));
    }

    #[test]
    fn test_private_stream_needs_subscription_even_for_admins() {
        let admin = user(UserRole::Administrator);
        let private = stream(true, false, false);
        assert!(!has_content_access(&admin, &private, None));
        assert!(has_content_access(&admin, &private, Some(&sub(0))));
    }

    #[test]
    fn test_history_floor() {
        assert_eq!(history_floor(&stream(true, false, true), None), Some(0));
        assert_eq!(history_floor(&stream(true, false, false), Some(&sub(42))), Some(42));
        assert_eq!(history_floor(&stream(true, false, false), None), None);
    }

    #[test]
    fn test_principals_only_self() {
        let me = user(UserRole::Member);
        assert!(Principals::Ids(vec![10, 10]).only(&me));
        assert!(!Principals::Ids(vec![10, 11]).only(&me));
        assert!(Principals::Emails(vec!["HAMLET@example.com".into()]).only(&me));
        let parsed: Principals = serde_json::from_str(r#"["a@b.c"]"#).unwrap();
        assert_eq!(parsed, Principals::Emails(vec!["a@b.c".into()]));
    }

    #[test]
    fn test_moderators_can_administer_when_group_allows() {
        let moderator = user(UserRole::Moderator);
        let mut s = stream(false, false, true);
        assert!(!can_administer(&moderator, &s));
        s.can_administer_channel_group = SystemGroup::Moderators;
        assert!(can_administer(&moderator, &s));
    }
}
