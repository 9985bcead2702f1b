//! Stream administration and read operations.
//!
//! `update_stream` validates the proposed permission state before writing
//! anything; all writes happen in the caller's single unit of work.

use crate::domain::policy::{
    PermissionProposal, RetentionInput, check_group_setting, check_stream_name,
    normalize_description, parse_retention,
};
use crate::domain::{DomainError, Stream, StreamPostPolicy, SystemGroup, TopicSummary, User};
use crate::ports::{ChatStore, NotificationSink};
use crate::usecases::access::{
    access_stream_by_id, access_stream_by_name, access_stream_for_update,
    access_web_public_stream, history_floor,
};
use crate::usecases::unit_of_work::UnitOfWork;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// `{new, old?}`: `old`, when given, must match the current value.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GroupSettingChange {
    pub new: SystemGroup,
    #[serde(default)]
    pub old: Option<SystemGroup>,
}

/// Optional changes for `PATCH /streams/{id}`. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChanges {
    pub description: Option<String>,
    pub is_private: Option<bool>,
    /// Legacy alias for `stream_post_policy`.
    pub is_announcement_only: Option<bool>,
    pub is_default_stream: Option<bool>,
    pub stream_post_policy: Option<StreamPostPolicy>,
    pub history_public_to_subscribers: Option<bool>,
    pub is_web_public: Option<bool>,
    pub new_name: Option<String>,
    pub message_retention_days: Option<RetentionInput>,
    pub can_administer_channel_group: Option<GroupSettingChange>,
    pub can_remove_subscribers_group: Option<GroupSettingChange>,
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetStreamsQuery {
    #[serde(default = "yes")]
    pub include_public: bool,
    #[serde(default)]
    pub include_web_public: bool,
    #[serde(default = "yes")]
    pub include_subscribed: bool,
    #[serde(default = "yes")]
    pub exclude_archived: bool,
    #[serde(default)]
    pub include_all_active: bool,
    #[serde(default)]
    pub include_default: bool,
    #[serde(default)]
    pub include_owner_subscribed: bool,
}

impl Default for GetStreamsQuery {
    fn default() -> Self {
        Self {
            include_public: true,
            include_web_public: false,
            include_subscribed: true,
            exclude_archived: true,
            include_all_active: false,
            include_default: false,
            include_owner_subscribed: false,
        }
    }
}

/// A stream as returned by the read endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamView {
    pub stream_id: i64,
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: StreamPostPolicy,
    pub is_announcement_only: bool,
    pub message_retention_days: Option<i32>,
    pub can_administer_channel_group: SystemGroup,
    pub can_remove_subscribers_group: SystemGroup,
    pub date_created: i64,
    pub creator_id: Option<i64>,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

impl StreamView {
    pub fn new(stream: &Stream, is_default: Option<bool>) -> Self {
        Self {
            stream_id: stream.id,
            name: stream.name.clone(),
            description: stream.description.clone(),
            invite_only: stream.invite_only,
            is_web_public: stream.is_web_public,
            history_public_to_subscribers: stream.history_public_to_subscribers,
            stream_post_policy: stream.stream_post_policy,
            is_announcement_only: stream.stream_post_policy == StreamPostPolicy::Admins,
            message_retention_days: stream.message_retention_days,
            can_administer_channel_group: stream.can_administer_channel_group,
            can_remove_subscribers_group: stream.can_remove_subscribers_group,
            date_created: stream.date_created,
            creator_id: stream.creator_id,
            is_archived: stream.deactivated,
            is_default,
        }
    }
}

pub struct StreamService {
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn NotificationSink>,
    email_gateway_domain: Option<String>,
}

impl StreamService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
        email_gateway_domain: Option<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            email_gateway_domain,
        }
    }

    pub async fn update_stream(
        &self,
        actor: &User,
        stream_id: i64,
        changes: StreamChanges,
    ) -> Result<(), DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = update_stream_in(&mut uow, actor, stream_id, &changes).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Archive a stream. It keeps its name and subscriptions but leaves every
    /// default list and the realm announcement setting.
    pub async fn deactivate_stream(&self, actor: &User, stream_id: i64) -> Result<(), DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = deactivate_in(&mut uow, actor, stream_id).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn get_streams(
        &self,
        actor: &User,
        query: GetStreamsQuery,
    ) -> Result<Vec<StreamView>, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = get_streams_in(&mut uow, actor, &query).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn get_stream(&self, actor: &User, stream_id: i64) -> Result<StreamView, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = access_stream_by_id(uow.tx(), actor, stream_id, true)
            .await
            .map(|(stream, _)| StreamView::new(&stream, None));
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn get_stream_id(&self, actor: &User, name: &str) -> Result<i64, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = access_stream_by_name(uow.tx(), actor, name, false)
            .await
            .map(|(stream, _)| stream.id);
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Subscriber ids. Realm admins may list private streams they are not on.
    pub async fn subscribers(&self, actor: &User, stream_id: i64) -> Result<Vec<i64>, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = match access_stream_by_id(uow.tx(), actor, stream_id, true).await {
            Ok((stream, _)) => uow.tx().subscriber_ids(stream.id).await,
            Err(e) => Err(e),
        };
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Address that posts to the stream by email, showing the original sender.
    pub async fn email_address(&self, actor: &User, stream_id: i64) -> Result<String, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = match access_stream_by_id(uow.tx(), actor, stream_id, false).await {
            Ok((stream, _)) => match &self.email_gateway_domain {
                Some(domain) => Ok(format!(
                    "{}.{}.show-sender@{}",
                    email_slug(&stream.name),
                    stream.email_token,
                    domain
                )),
                None => Err(DomainError::invalid("Email gateway is not configured.")),
            },
            Err(e) => Err(e),
        };
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Topic history, newest first. `actor` is None for anonymous callers,
    /// who only see web-public streams.
    pub async fn topics(
        &self,
        actor: Option<&User>,
        stream_id: i64,
    ) -> Result<Vec<TopicSummary>, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = topics_in(&mut uow, actor, stream_id).await;
        uow.finish(result, self.notifier.as_ref()).await
    }
}

/// Lowercase alphanumerics; every other run of characters becomes one dash.
fn email_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "stream".to_string()
    } else {
        slug.to_string()
    }
}

fn apply_group_change(
    setting_name: &str,
    current: &mut SystemGroup,
    change: &GroupSettingChange,
) -> Result<bool, DomainError> {
    check_group_setting(setting_name, change.new)?;
    if change.old.is_some_and(|old| old != *current) {
        return Err(DomainError::invalid(
            "'old' value does not match the expected value.",
        ));
    }
    if change.new == *current {
        return Ok(false);
    }
    *current = change.new;
    Ok(true)
}

pub(crate) async fn update_stream_in(
    uow: &mut UnitOfWork,
    actor: &User,
    stream_id: i64,
    changes: &StreamChanges,
) -> Result<(), DomainError> {
    let (mut stream, sub) = access_stream_for_update(uow.tx(), actor, stream_id).await?;
    let realm = uow.tx().realm().await?;

    let proposed_private = changes.is_private.unwrap_or(stream.invite_only);
    let proposed_web_public = changes.is_web_public.unwrap_or(stream.is_web_public);
    let currently_default = uow.tx().default_stream_ids().await?.contains(&stream.id);
    let proposed_default = changes.is_default_stream.unwrap_or(currently_default);
    let proposed_history = if realm.legacy_mirror_realm {
        false
    } else if let Some(history) = changes.history_public_to_subscribers {
        history
    } else if let Some(is_private) = changes.is_private {
        !is_private
    } else {
        stream.history_public_to_subscribers
    };

    PermissionProposal {
        is_private: proposed_private,
        is_web_public: proposed_web_public,
        is_default_stream: proposed_default,
        history_public_to_subscribers: proposed_history,
        is_moderation_channel: realm.moderation_request_channel_id == Some(stream.id),
        legacy_mirror_realm: realm.legacy_mirror_realm,
    }
    .validate()?;

    if changes.is_private.is_some() {
        // Admins must actually be able to read the stream to flip its privacy.
        access_stream_by_id(uow.tx(), actor, stream_id, false).await?;
    }

    if changes.is_web_public == Some(true) {
        if !realm.web_public_streams_enabled {
            return Err(DomainError::invalid("Web-public channels are not enabled."));
        }
        if actor.is_guest() || !realm.create_web_public_stream_policy.contains(actor.role) {
            return Err(DomainError::insufficient_permission());
        }
    }

    if changes.is_private.is_some()
        || changes.is_web_public.is_some()
        || changes.history_public_to_subscribers.is_some()
    {
        stream.invite_only = proposed_private;
        stream.is_web_public = proposed_web_public;
        stream.history_public_to_subscribers = proposed_history;
    }

    if let Some(is_default) = changes.is_default_stream {
        if !actor.can_manage_default_streams() {
            return Err(DomainError::forbidden(
                "You do not have permission to change default channels.",
            ));
        }
        if is_default {
            uow.tx().add_default_stream(stream.id).await?;
        } else {
            uow.tx().remove_default_stream(stream.id).await?;
        }
    }

    if let Some(retention) = &changes.message_retention_days {
        if !actor.is_realm_owner() {
            return Err(DomainError::forbidden("Must be an organization owner"));
        }
        if realm.limited_plan {
            return Err(DomainError::invalid("Feature unavailable on your current plan."));
        }
        stream.message_retention_days = parse_retention(retention)?;
    }

    if let Some(description) = &changes.description {
        stream.description = normalize_description(description)?;
    }

    if let Some(new_name) = &changes.new_name {
        let new_name = new_name.trim();
        if stream.name == new_name {
            return Err(DomainError::invalid("Channel already has that name."));
        }
        check_stream_name(new_name)?;
        // A case-only rename may reuse the stream's own name.
        if stream.name.to_lowercase() != new_name.to_lowercase()
            && uow.tx().stream_by_name(new_name).await?.is_some()
        {
            return Err(DomainError::invalid("Channel name already in use."));
        }
        info!(stream_id = stream.id, from = %stream.name, to = %new_name, "stream renamed");
        stream.name = new_name.to_string();
    }

    // The legacy flag overrides an explicit policy sent alongside it.
    let post_policy = changes
        .is_announcement_only
        .map(|only| {
            if only {
                StreamPostPolicy::Admins
            } else {
                StreamPostPolicy::Everyone
            }
        })
        .or(changes.stream_post_policy);
    if let Some(policy) = post_policy {
        stream.stream_post_policy = policy;
    }

    let group_changes = [
        (
            "can_administer_channel_group",
            changes.can_administer_channel_group,
        ),
        (
            "can_remove_subscribers_group",
            changes.can_remove_subscribers_group,
        ),
    ];
    // Admins cannot change these for private streams they are not on.
    let hidden_from_actor = stream.invite_only && sub.is_none();
    for (setting_name, change) in group_changes {
        let Some(change) = change else { continue };
        let current = match setting_name {
            "can_administer_channel_group" => &mut stream.can_administer_channel_group,
            _ => &mut stream.can_remove_subscribers_group,
        };
        let mut proposed = *current;
        if apply_group_change(setting_name, &mut proposed, &change)? {
            if hidden_from_actor {
                return Err(DomainError::invalid_stream_id());
            }
            *current = proposed;
        }
    }

    uow.tx().update_stream(&stream).await
}

async fn deactivate_in(
    uow: &mut UnitOfWork,
    actor: &User,
    stream_id: i64,
) -> Result<(), DomainError> {
    let (mut stream, _) = access_stream_for_update(uow.tx(), actor, stream_id).await?;
    stream.deactivated = true;
    uow.tx().update_stream(&stream).await?;
    uow.tx().remove_default_stream(stream.id).await?;

    for mut group in uow.tx().default_stream_groups().await? {
        if group.stream_ids.contains(&stream.id) {
            group.stream_ids.retain(|id| *id != stream.id);
            uow.tx().update_default_stream_group(&group).await?;
        }
    }

    let mut realm = uow.tx().realm().await?;
    if realm.new_stream_announcements_stream_id == Some(stream.id) {
        realm.new_stream_announcements_stream_id = None;
        uow.tx().save_realm(&realm).await?;
    }
    info!(stream_id = stream.id, actor = actor.id, "stream archived");
    Ok(())
}

async fn get_streams_in(
    uow: &mut UnitOfWork,
    actor: &User,
    query: &GetStreamsQuery,
) -> Result<Vec<StreamView>, DomainError> {
    if query.include_all_active && !actor.is_realm_admin() {
        return Err(DomainError::forbidden("User not authorized for this query"));
    }

    let subscribed: HashSet<i64> = uow
        .tx()
        .subscriptions_for_user(actor.id)
        .await?
        .into_iter()
        .map(|s| s.stream_id)
        .collect();
    let owner_subscribed: HashSet<i64> = match actor.bot_owner_id {
        Some(owner_id) if actor.is_bot && query.include_owner_subscribed => uow
            .tx()
            .subscriptions_for_user(owner_id)
            .await?
            .into_iter()
            .map(|s| s.stream_id)
            .collect(),
        _ => HashSet::new(),
    };
    let defaults: HashSet<i64> = if query.include_default {
        uow.tx().default_stream_ids().await?.into_iter().collect()
    } else {
        HashSet::new()
    };

    let mut views: Vec<StreamView> = uow
        .tx()
        .list_streams()
        .await?
        .into_iter()
        .filter(|s| !(query.exclude_archived && s.deactivated))
        .filter(|s| {
            query.include_all_active
                || (query.include_public && !actor.is_guest() && !s.invite_only)
                || (query.include_web_public && s.is_web_public)
                || (query.include_subscribed && subscribed.contains(&s.id))
                || owner_subscribed.contains(&s.id)
        })
        .map(|s| {
            let is_default = query.include_default.then(|| defaults.contains(&s.id));
            StreamView::new(&s, is_default)
        })
        .collect();
    views.sort_by_key(|v| v.name.to_lowercase());
    Ok(views)
}

async fn topics_in(
    uow: &mut UnitOfWork,
    actor: Option<&User>,
    stream_id: i64,
) -> Result<Vec<TopicSummary>, DomainError> {
    let floor = match actor {
        None => {
            let stream = access_web_public_stream(uow.tx(), stream_id).await?;
            history_floor(&stream, None)
        }
        Some(user) => {
            let (stream, sub) = access_stream_by_id(uow.tx(), user, stream_id, false).await?;
            history_floor(&stream, sub.as_ref())
        }
    };
    match floor {
        Some(min_id) => uow.tx().topics(stream_id, min_id).await,
        None => Ok(Vec::new()),
    }
}
