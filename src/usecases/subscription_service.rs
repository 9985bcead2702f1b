//! Subscribe and unsubscribe users, create streams on demand, and edit
//! per-subscription display properties.
//!
//! Each public method is one unit of work. The `*_in` functions run against an
//! existing unit of work so that `update_subscriptions` can compose them.

use crate::domain::policy::{
    NEW_CHANNELS_TOPIC, PermissionProposal, RetentionInput, STREAM_EVENTS_TOPIC, check_color,
    check_group_setting, check_stream_name, default_history_public, normalize_description,
    parse_retention, pick_color,
};
use crate::domain::{
    DomainError, NewStream, OutgoingMessage, Realm, Recipient, Stream, StreamPostPolicy,
    Subscription, SystemGroup, User,
};
use crate::ports::{ChatStore, NotificationSink};
use crate::usecases::access::{
    Principals, active_subscription, can_remove_subscribers, can_subscribe_others,
    has_content_access, resolve_principals,
};
use crate::usecases::notifications;
use crate::usecases::unit_of_work::{UnitOfWork, compose_views, view};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// One entry of the `subscriptions` list when subscribing.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSpec {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl StreamSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
            description: None,
        }
    }
}

fn yes() -> bool {
    true
}

/// Body of `POST /users/me/subscriptions`. Stream-creation options apply only to
/// streams that do not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct AddSubscriptions {
    pub subscriptions: Vec<StreamSpec>,
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub is_web_public: bool,
    #[serde(default)]
    pub is_default_stream: bool,
    #[serde(default)]
    pub stream_post_policy: StreamPostPolicy,
    #[serde(default)]
    pub history_public_to_subscribers: Option<bool>,
    #[serde(default)]
    pub message_retention_days: RetentionInput,
    #[serde(default)]
    pub can_administer_channel_group: Option<SystemGroup>,
    #[serde(default)]
    pub can_remove_subscribers_group: Option<SystemGroup>,
    #[serde(default)]
    pub announce: bool,
    #[serde(default)]
    pub principals: Option<Principals>,
    #[serde(default = "yes")]
    pub authorization_errors_fatal: bool,
}

impl AddSubscriptions {
    pub fn new(subscriptions: Vec<StreamSpec>) -> Self {
        Self {
            subscriptions,
            invite_only: false,
            is_web_public: false,
            is_default_stream: false,
            stream_post_policy: StreamPostPolicy::Everyone,
            history_public_to_subscribers: None,
            message_retention_days: RetentionInput::default(),
            can_administer_channel_group: None,
            can_remove_subscribers_group: None,
            announce: false,
            principals: None,
            authorization_errors_fatal: true,
        }
    }
}

/// Stream names per user id (as a string key, matching the wire format).
pub type NamesByUser = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddSubscriptionsResult {
    pub subscribed: NamesByUser,
    pub already_subscribed: NamesByUser,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unauthorized: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveSubscriptions {
    pub subscriptions: Vec<String>,
    #[serde(default)]
    pub principals: Option<Principals>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveSubscriptionsResult {
    pub removed: Vec<String>,
    pub not_removed: Vec<String>,
}

/// Body of the combined add+delete endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSubscriptions {
    #[serde(default)]
    pub add: Option<Vec<StreamSpec>>,
    #[serde(default)]
    pub delete: Option<Vec<String>>,
}

/// A raw property change as sent by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyChange {
    pub stream_id: i64,
    pub property: String,
    pub value: Value,
}

/// Validated subscription property change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionProperty {
    Color(String),
    InHomeView(bool),
    IsMuted(bool),
    DesktopNotifications(bool),
    AudibleNotifications(bool),
    PushNotifications(bool),
    EmailNotifications(bool),
    PinToTop(bool),
    WildcardMentionsNotify(bool),
}

impl SubscriptionProperty {
    pub fn parse(property: &str, value: &Value) -> Result<Self, DomainError> {
        if property == "color" {
            let color = value.as_str().unwrap_or_default();
            return Ok(Self::Color(check_color("color", color)?));
        }
        let ctor: fn(bool) -> Self = match property {
            "in_home_view" => Self::InHomeView,
            "is_muted" => Self::IsMuted,
            "desktop_notifications" => Self::DesktopNotifications,
            "audible_notifications" => Self::AudibleNotifications,
            "push_notifications" => Self::PushNotifications,
            "email_notifications" => Self::EmailNotifications,
            "pin_to_top" => Self::PinToTop,
            "wildcard_mentions_notify" => Self::WildcardMentionsNotify,
            other => {
                return Err(DomainError::invalid(format!(
                    "Unknown subscription property: {}",
                    other
                )));
            }
        };
        value
            .as_bool()
            .map(ctor)
            .ok_or_else(|| DomainError::invalid(format!("{} is not a boolean", property)))
    }

    fn apply(&self, sub: &mut Subscription) {
        match self {
            Self::Color(c) => sub.color = c.clone(),
            // in_home_view is the inverse of is_muted
            Self::InHomeView(v) => sub.is_muted = !v,
            Self::IsMuted(v) => sub.is_muted = *v,
            Self::DesktopNotifications(v) => sub.desktop_notifications = Some(*v),
            Self::AudibleNotifications(v) => sub.audible_notifications = Some(*v),
            Self::PushNotifications(v) => sub.push_notifications = Some(*v),
            Self::EmailNotifications(v) => sub.email_notifications = Some(*v),
            Self::PinToTop(v) => sub.pin_to_top = *v,
            Self::WildcardMentionsNotify(v) => sub.wildcard_mentions_notify = Some(*v),
        }
    }
}

/// A subscription as listed to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionView {
    pub stream_id: i64,
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: StreamPostPolicy,
    pub message_retention_days: Option<i32>,
    pub color: String,
    pub is_muted: bool,
    pub in_home_view: bool,
    pub pin_to_top: bool,
    pub desktop_notifications: Option<bool>,
    pub audible_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub email_notifications: Option<bool>,
    pub wildcard_mentions_notify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribers: Option<Vec<i64>>,
}

impl SubscriptionView {
    fn new(stream: &Stream, sub: &Subscription, subscribers: Option<Vec<i64>>) -> Self {
        Self {
            stream_id: stream.id,
            name: stream.name.clone(),
            description: stream.description.clone(),
            invite_only: stream.invite_only,
            is_web_public: stream.is_web_public,
            history_public_to_subscribers: stream.history_public_to_subscribers,
            stream_post_policy: stream.stream_post_policy,
            message_retention_days: stream.message_retention_days,
            color: sub.color.clone(),
            is_muted: sub.is_muted,
            in_home_view: !sub.is_muted,
            pin_to_top: sub.pin_to_top,
            desktop_notifications: sub.desktop_notifications,
            audible_notifications: sub.audible_notifications,
            push_notifications: sub.push_notifications,
            email_notifications: sub.email_notifications,
            wildcard_mentions_notify: sub.wildcard_mentions_notify,
            subscribers,
        }
    }
}

/// Subscription workflows. `notification_bot_id` is the sender of every
/// notification these workflows produce.
pub struct SubscriptionService {
    store: Arc<dyn ChatStore>,
    notifier: Arc<dyn NotificationSink>,
    notification_bot_id: i64,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        notifier: Arc<dyn NotificationSink>,
        notification_bot_id: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            notification_bot_id,
        }
    }

    pub async fn list_subscriptions(
        &self,
        actor: &User,
        include_subscribers: bool,
    ) -> Result<Vec<SubscriptionView>, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = list_in(&mut uow, actor, include_subscribers).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn add_subscriptions(
        &self,
        actor: &User,
        request: AddSubscriptions,
    ) -> Result<AddSubscriptionsResult, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = add_subscriptions_in(&mut uow, actor, &request, self.notification_bot_id).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    pub async fn remove_subscriptions(
        &self,
        actor: &User,
        request: RemoveSubscriptions,
    ) -> Result<RemoveSubscriptionsResult, DomainError> {
        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = remove_subscriptions_in(&mut uow, actor, &request).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Add and remove in one transaction. A failure in either part rolls back both.
    pub async fn update_subscriptions(
        &self,
        actor: &User,
        request: UpdateSubscriptions,
    ) -> Result<Map<String, Value>, DomainError> {
        let add = request.add.unwrap_or_default();
        let delete = request.delete.unwrap_or_default();
        if add.is_empty() && delete.is_empty() {
            return Err(DomainError::invalid(
                "Nothing to do. Specify at least one of \"add\" or \"delete\".",
            ));
        }

        let mut views = Vec::new();
        if !add.is_empty() {
            let actor = actor.clone();
            let bot_id = self.notification_bot_id;
            let request = AddSubscriptions::new(add);
            views.push(view(move |uow| {
                Box::pin(async move {
                    let result = add_subscriptions_in(uow, &actor, &request, bot_id).await?;
                    to_object(&result)
                })
            }));
        }
        if !delete.is_empty() {
            let actor = actor.clone();
            let request = RemoveSubscriptions {
                subscriptions: delete,
                principals: None,
            };
            views.push(view(move |uow| {
                Box::pin(async move {
                    let result = remove_subscriptions_in(uow, &actor, &request).await?;
                    to_object(&result)
                })
            }));
        }

        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = compose_views(&mut uow, views).await;
        uow.finish(result, self.notifier.as_ref()).await
    }

    /// Apply property changes to the actor's own subscriptions. All changes are
    /// validated before any is written.
    pub async fn update_properties(
        &self,
        actor: &User,
        changes: Vec<PropertyChange>,
    ) -> Result<(), DomainError> {
        let parsed = changes
            .iter()
            .map(|c| Ok((c.stream_id, SubscriptionProperty::parse(&c.property, &c.value)?)))
            .collect::<Result<Vec<_>, DomainError>>()?;

        let mut uow = UnitOfWork::begin(self.store.as_ref()).await?;
        let result = update_properties_in(&mut uow, actor, &parsed).await;
        uow.finish(result, self.notifier.as_ref()).await
    }
}

fn to_object<T: Serialize>(value: &T) -> Result<Map<String, Value>, DomainError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(DomainError::Repo(e.to_string())),
    }
}

async fn list_in(
    uow: &mut UnitOfWork,
    actor: &User,
    include_subscribers: bool,
) -> Result<Vec<SubscriptionView>, DomainError> {
    let subs = uow.tx().subscriptions_for_user(actor.id).await?;
    let mut out = Vec::with_capacity(subs.len());
    for sub in subs {
        let Some(stream) = uow.tx().stream_by_id(sub.stream_id).await? else {
            continue;
        };
        if stream.deactivated {
            continue;
        }
        let subscribers = if include_subscribers {
            Some(uow.tx().subscriber_ids(stream.id).await?)
        } else {
            None
        };
        out.push(SubscriptionView::new(&stream, &sub, subscribers));
    }
    out.sort_by_key(|v| v.name.to_lowercase());
    Ok(out)
}

/// Stream creation options shared by every stream created in one request.
struct CreationTemplate {
    invite_only: bool,
    is_web_public: bool,
    history_public_to_subscribers: bool,
    stream_post_policy: StreamPostPolicy,
    message_retention_days: Option<i32>,
    can_administer_channel_group: SystemGroup,
    can_remove_subscribers_group: SystemGroup,
}

fn check_can_create(realm: &Realm, actor: &User, template: &CreationTemplate) -> Result<(), DomainError> {
    let allowed = if template.is_web_public {
        if !realm.web_public_streams_enabled {
            return Err(DomainError::invalid("Web-public channels are not enabled."));
        }
        realm.create_web_public_stream_policy.contains(actor.role)
    } else if template.invite_only {
        realm.create_private_stream_policy.contains(actor.role)
    } else {
        realm.create_public_stream_policy.contains(actor.role)
    };
    if allowed && !actor.is_guest() {
        Ok(())
    } else {
        Err(DomainError::insufficient_permission())
    }
}

pub(crate) async fn add_subscriptions_in(
    uow: &mut UnitOfWork,
    actor: &User,
    request: &AddSubscriptions,
    notification_bot_id: i64,
) -> Result<AddSubscriptionsResult, DomainError> {
    if actor.is_guest() {
        return Err(DomainError::forbidden("Not allowed for guest users"));
    }
    let realm = uow.tx().realm().await?;

    let administer_group = request
        .can_administer_channel_group
        .unwrap_or(SystemGroup::Administrators);
    check_group_setting("can_administer_channel_group", administer_group)?;
    let remove_group = request
        .can_remove_subscribers_group
        .unwrap_or(SystemGroup::Administrators);
    check_group_setting("can_remove_subscribers_group", remove_group)?;
    let message_retention_days = parse_retention(&request.message_retention_days)?;

    // Validate every requested stream up front; duplicates collapse onto the first occurrence.
    let mut specs: Vec<(String, Option<String>)> = Vec::new();
    let mut color_map: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();
    for spec in &request.subscriptions {
        let name = spec.name.trim().to_string();
        check_stream_name(&name)?;
        if let Some(color) = &spec.color {
            color_map.insert(name.to_lowercase(), check_color("add.color", color)?);
        }
        let description = spec
            .description
            .as_deref()
            .map(normalize_description)
            .transpose()?;
        if seen.insert(name.to_lowercase()) {
            specs.push((name, description));
        }
    }

    let subscribing_others = request
        .principals
        .as_ref()
        .is_some_and(|p| !p.is_empty() && !p.only(actor));
    let subscribers = match &request.principals {
        Some(principals) if subscribing_others => {
            if !can_subscribe_others(&realm, actor) {
                return Err(DomainError::insufficient_permission());
            }
            resolve_principals(uow.tx(), principals).await?
        }
        _ => vec![actor.clone()],
    };

    let template = CreationTemplate {
        invite_only: request.invite_only,
        is_web_public: request.is_web_public,
        history_public_to_subscribers: default_history_public(
            &realm,
            request.invite_only,
            request.history_public_to_subscribers,
        ),
        stream_post_policy: request.stream_post_policy,
        message_retention_days,
        can_administer_channel_group: administer_group,
        can_remove_subscribers_group: remove_group,
    };

    // Partition into existing and to-be-created streams.
    let mut existing = Vec::new();
    let mut missing = Vec::new();
    for (name, description) in specs {
        match uow.tx().stream_by_name(&name).await? {
            Some(stream) if stream.deactivated => {
                return Err(DomainError::invalid(format!(
                    "Channel '{}' is archived.",
                    stream.name
                )));
            }
            Some(stream) => existing.push(stream),
            None => missing.push((name, description)),
        }
    }

    let mut created = Vec::new();
    if !missing.is_empty() {
        if template.message_retention_days.is_some() {
            if !actor.is_realm_owner() {
                return Err(DomainError::forbidden("Must be an organization owner"));
            }
            if realm.limited_plan {
                return Err(DomainError::invalid("Feature unavailable on your current plan."));
            }
        }
        check_can_create(&realm, actor, &template)?;
        if request.is_default_stream && !actor.can_manage_default_streams() {
            return Err(DomainError::insufficient_permission());
        }
        PermissionProposal {
            is_private: template.invite_only,
            is_web_public: template.is_web_public,
            is_default_stream: request.is_default_stream,
            history_public_to_subscribers: template.history_public_to_subscribers,
            is_moderation_channel: false,
            legacy_mirror_realm: realm.legacy_mirror_realm,
        }
        .validate()?;

        for (name, description) in missing {
            let stream = uow
                .tx()
                .insert_stream(&NewStream {
                    name,
                    description: description.unwrap_or_default(),
                    invite_only: template.invite_only,
                    is_web_public: template.is_web_public,
                    history_public_to_subscribers: template.history_public_to_subscribers,
                    stream_post_policy: template.stream_post_policy,
                    message_retention_days: template.message_retention_days,
                    can_administer_channel_group: template.can_administer_channel_group,
                    can_remove_subscribers_group: template.can_remove_subscribers_group,
                    creator_id: Some(actor.id),
                })
                .await?;
            info!(stream_id = stream.id, name = %stream.name, creator = actor.id, "stream created");
            created.push(stream);
        }
    }

    let mut authorized = Vec::new();
    let mut unauthorized = Vec::new();
    for stream in existing {
        let sub = active_subscription(uow.tx(), actor.id, stream.id).await?;
        if has_content_access(actor, &stream, sub.as_ref()) {
            authorized.push(stream);
        } else {
            unauthorized.push(stream);
        }
    }
    if request.authorization_errors_fatal {
        if let Some(stream) = unauthorized.first() {
            return Err(DomainError::invalid(format!(
                "Unable to access channel ({}).",
                stream.name
            )));
        }
    }

    let streams: Vec<Stream> = authorized.into_iter().chain(created.iter().cloned()).collect();

    if subscribing_others && realm.legacy_mirror_realm && !streams.iter().all(|s| s.invite_only) {
        return Err(DomainError::invalid(
            "You can only invite other mirror users to private channels.",
        ));
    }

    if request.is_default_stream {
        for stream in &created {
            uow.tx().add_default_stream(stream.id).await?;
        }
    }

    let mut result = AddSubscriptionsResult::default();
    let max_message_id = uow.tx().max_message_id().await?;
    for user in &subscribers {
        let mut used_colors: Vec<String> = uow
            .tx()
            .subscriptions_for_user(user.id)
            .await?
            .into_iter()
            .map(|s| s.color)
            .collect();
        for stream in &streams {
            let key = user.id.to_string();
            match uow.tx().subscription(user.id, stream.id).await? {
                Some(sub) if sub.active => {
                    result
                        .already_subscribed
                        .entry(key)
                        .or_default()
                        .push(stream.name.clone());
                }
                previous => {
                    // A reactivated row keeps its properties; history restarts now.
                    let sub = match previous {
                        Some(sub) => Subscription {
                            active: true,
                            joined_after_message_id: max_message_id,
                            ..sub
                        },
                        None => {
                            let color = color_map
                                .get(&stream.name.to_lowercase())
                                .cloned()
                                .unwrap_or_else(|| pick_color(&used_colors));
                            used_colors.push(color.clone());
                            Subscription {
                                user_id: user.id,
                                stream_id: stream.id,
                                active: true,
                                color,
                                is_muted: false,
                                pin_to_top: false,
                                desktop_notifications: None,
                                audible_notifications: None,
                                push_notifications: None,
                                email_notifications: None,
                                wildcard_mentions_notify: None,
                                joined_after_message_id: max_message_id,
                            }
                        }
                    };
                    uow.tx().upsert_subscription(&sub).await?;
                    result
                        .subscribed
                        .entry(key)
                        .or_default()
                        .push(stream.name.clone());
                }
            }
        }
    }
    debug!(
        actor = actor.id,
        subscribers = subscribers.len(),
        streams = streams.len(),
        created = created.len(),
        "subscriptions added"
    );

    queue_new_subscriber_notifications(
        uow,
        &realm,
        actor,
        &subscribers,
        &result.subscribed,
        &created,
        request.announce,
        notification_bot_id,
    )
    .await?;

    if !request.authorization_errors_fatal {
        result.unauthorized = Some(unauthorized.into_iter().map(|s| s.name).collect());
    }
    Ok(result)
}

#[allow(clippy::too_many_arguments)]
async fn queue_new_subscriber_notifications(
    uow: &mut UnitOfWork,
    realm: &Realm,
    actor: &User,
    subscribers: &[User],
    subscribed: &NamesByUser,
    created: &[Stream],
    announce: bool,
    bot_id: i64,
) -> Result<(), DomainError> {
    let created_names: HashSet<&str> = created.iter().map(|s| s.name.as_str()).collect();

    for user in subscribers {
        if user.id == actor.id || user.is_bot {
            continue;
        }
        let Some(names) = subscribed.get(&user.id.to_string()) else {
            continue;
        };
        let notify: BTreeSet<String> = names
            .iter()
            .filter(|n| !created_names.contains(n.as_str()))
            .cloned()
            .collect();
        if notify.is_empty() {
            continue;
        }
        uow.notify(OutgoingMessage {
            sender_id: bot_id,
            recipient: Recipient::Direct { user_id: user.id },
            content: notifications::you_were_just_subscribed(actor, &notify),
        });
    }

    if announce && !created.is_empty() {
        if let Some(stream_id) = realm.new_stream_announcements_stream_id {
            let target = uow.tx().stream_by_id(stream_id).await?;
            if let Some(target) = target.filter(|s| !s.deactivated) {
                uow.notify(OutgoingMessage {
                    sender_id: bot_id,
                    recipient: Recipient::Stream {
                        stream_id: target.id,
                        topic: NEW_CHANNELS_TOPIC.to_string(),
                    },
                    content: notifications::new_channels_announcement(actor, created),
                });
            }
        }
    }

    if !realm.legacy_mirror_realm {
        for stream in created {
            uow.notify(OutgoingMessage {
                sender_id: bot_id,
                recipient: Recipient::Stream {
                    stream_id: stream.id,
                    topic: STREAM_EVENTS_TOPIC.to_string(),
                },
                content: notifications::channel_created(actor, stream),
            });
        }
    }
    Ok(())
}

pub(crate) async fn remove_subscriptions_in(
    uow: &mut UnitOfWork,
    actor: &User,
    request: &RemoveSubscriptions,
) -> Result<RemoveSubscriptionsResult, DomainError> {
    let targets = match &request.principals {
        Some(principals) if !principals.is_empty() => {
            resolve_principals(uow.tx(), principals).await?
        }
        _ => vec![actor.clone()],
    };
    let unsubscribing_others = targets.iter().any(|t| !actor.directly_controls(t));

    let mut streams = Vec::new();
    let mut missing = Vec::new();
    for raw in &request.subscriptions {
        let name = raw.trim();
        match uow.tx().stream_by_name(name).await? {
            Some(stream) => streams.push(stream),
            None => missing.push(name.to_string()),
        }
    }
    if !missing.is_empty() {
        return Err(DomainError::invalid(format!(
            "Channel(s) ({}) do not exist",
            missing.join(", ")
        )));
    }
    if unsubscribing_others && streams.iter().any(|s| !can_remove_subscribers(actor, s)) {
        return Err(DomainError::insufficient_permission());
    }

    let mut result = RemoveSubscriptionsResult::default();
    for target in &targets {
        for stream in &streams {
            if active_subscription(uow.tx(), target.id, stream.id)
                .await?
                .is_some()
            {
                uow.tx().deactivate_subscription(target.id, stream.id).await?;
                result.removed.push(stream.name.clone());
            } else {
                result.not_removed.push(stream.name.clone());
            }
        }
    }
    debug!(
        actor = actor.id,
        removed = result.removed.len(),
        not_removed = result.not_removed.len(),
        "subscriptions removed"
    );
    Ok(result)
}

async fn update_properties_in(
    uow: &mut UnitOfWork,
    actor: &User,
    changes: &[(i64, SubscriptionProperty)],
) -> Result<(), DomainError> {
    for (stream_id, property) in changes {
        let (_, sub) =
            crate::usecases::access::access_stream_by_id(uow.tx(), actor, *stream_id, false).await?;
        let mut sub = sub.ok_or_else(|| {
            DomainError::invalid(format!("Not subscribed to channel ID {}", stream_id))
        })?;
        property.apply(&mut sub);
        uow.tx().update_subscription(&sub).await?;
    }
    Ok(())
}
