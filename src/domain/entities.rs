//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/SQL types here; adapters map rows and requests into these.

use serde::{Deserialize, Serialize};

/// Organization role. Lower rank means more privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Owner,
    Administrator,
    Moderator,
    Member,
    Guest,
}

impl UserRole {
    fn rank(self) -> u8 {
        match self {
            UserRole::Owner => 1,
            UserRole::Administrator => 2,
            UserRole::Moderator => 3,
            UserRole::Member => 4,
            UserRole::Guest => 6,
        }
    }

    /// True if `self` carries at least the privileges of `other`.
    pub fn at_least(self, other: UserRole) -> bool {
        self.rank() <= other.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Administrator => "administrator",
            UserRole::Moderator => "moderator",
            UserRole::Member => "member",
            UserRole::Guest => "guest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(UserRole::Owner),
            "administrator" => Some(UserRole::Administrator),
            "moderator" => Some(UserRole::Moderator),
            "member" => Some(UserRole::Member),
            "guest" => Some(UserRole::Guest),
            _ => None,
        }
    }
}

/// Role-based permission group. Stream settings and realm policies point at one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemGroup {
    #[serde(rename = "role:nobody")]
    Nobody,
    #[serde(rename = "role:owners")]
    Owners,
    #[serde(rename = "role:administrators")]
    Administrators,
    #[serde(rename = "role:moderators")]
    Moderators,
    #[serde(rename = "role:members")]
    Members,
    #[serde(rename = "role:everyone")]
    Everyone,
}

impl SystemGroup {
    pub fn contains(self, role: UserRole) -> bool {
        match self {
            SystemGroup::Nobody => false,
            SystemGroup::Owners => role.at_least(UserRole::Owner),
            SystemGroup::Administrators => role.at_least(UserRole::Administrator),
            SystemGroup::Moderators => role.at_least(UserRole::Moderator),
            SystemGroup::Members => role.at_least(UserRole::Member),
            SystemGroup::Everyone => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemGroup::Nobody => "role:nobody",
            SystemGroup::Owners => "role:owners",
            SystemGroup::Administrators => "role:administrators",
            SystemGroup::Moderators => "role:moderators",
            SystemGroup::Members => "role:members",
            SystemGroup::Everyone => "role:everyone",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "role:nobody" => Some(SystemGroup::Nobody),
            "role:owners" => Some(SystemGroup::Owners),
            "role:administrators" => Some(SystemGroup::Administrators),
            "role:moderators" => Some(SystemGroup::Moderators),
            "role:members" => Some(SystemGroup::Members),
            "role:everyone" => Some(SystemGroup::Everyone),
            _ => None,
        }
    }
}

/// Organization-wide settings. A single row per server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Realm {
    pub name: String,
    /// Mirrors an external chat system; history is never shared with new subscribers.
    #[serde(default)]
    pub legacy_mirror_realm: bool,
    #[serde(default)]
    pub web_public_streams_enabled: bool,
    /// Plans without message retention controls.
    #[serde(default)]
    pub limited_plan: bool,
    #[serde(default)]
    pub new_stream_announcements_stream_id: Option<i64>,
    #[serde(default)]
    pub moderation_request_channel_id: Option<i64>,
    pub create_public_stream_policy: SystemGroup,
    pub create_private_stream_policy: SystemGroup,
    pub create_web_public_stream_policy: SystemGroup,
    /// Who may subscribe users other than themselves.
    pub invite_to_stream_policy: SystemGroup,
}

impl Default for Realm {
    fn default() -> Self {
        Self {
            name: "Chat".to_string(),
            legacy_mirror_realm: false,
            web_public_streams_enabled: false,
            limited_plan: false,
            new_stream_announcements_stream_id: None,
            moderation_request_channel_id: None,
            create_public_stream_policy: SystemGroup::Members,
            create_private_stream_policy: SystemGroup::Members,
            create_web_public_stream_policy: SystemGroup::Owners,
            invite_to_stream_policy: SystemGroup::Members,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_bot: bool,
    pub bot_owner_id: Option<i64>,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub api_key: String,
}

impl User {
    pub fn is_guest(&self) -> bool {
        self.role == UserRole::Guest
    }

    pub fn is_realm_admin(&self) -> bool {
        self.role.at_least(UserRole::Administrator)
    }

    pub fn is_realm_owner(&self) -> bool {
        self.role == UserRole::Owner
    }

    pub fn can_manage_default_streams(&self) -> bool {
        self.is_realm_admin()
    }

    /// The target is this user, or a bot this user owns.
    pub fn directly_controls(&self, target: &User) -> bool {
        self.id == target.id || (target.is_bot && target.bot_owner_id == Some(self.id))
    }

    /// Markdown mention that renders without notifying.
    pub fn silent_mention(&self) -> String {
        format!("@_**{}|{}**", self.full_name, self.id)
    }

    pub fn mention(&self) -> String {
        format!("@**{}|{}**", self.full_name, self.id)
    }
}

/// User to insert. Id and API key are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub is_bot: bool,
    pub bot_owner_id: Option<i64>,
}

/// Who may post in a stream. Wire format is the legacy integer code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StreamPostPolicy {
    #[default]
    Everyone,
    Admins,
    RestrictNewMembers,
    Moderators,
}

impl From<StreamPostPolicy> for u8 {
    fn from(p: StreamPostPolicy) -> u8 {
        match p {
            StreamPostPolicy::Everyone => 1,
            StreamPostPolicy::Admins => 2,
            StreamPostPolicy::RestrictNewMembers => 3,
            StreamPostPolicy::Moderators => 4,
        }
    }
}

impl TryFrom<u8> for StreamPostPolicy {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(StreamPostPolicy::Everyone),
            2 => Ok(StreamPostPolicy::Admins),
            3 => Ok(StreamPostPolicy::RestrictNewMembers),
            4 => Ok(StreamPostPolicy::Moderators),
            other => Err(format!("Invalid stream_post_policy: {}", other)),
        }
    }
}

/// A channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stream {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: StreamPostPolicy,
    /// None = realm default, -1 = unlimited.
    pub message_retention_days: Option<i32>,
    pub can_administer_channel_group: SystemGroup,
    pub can_remove_subscribers_group: SystemGroup,
    pub email_token: String,
    pub deactivated: bool,
    pub date_created: i64,
    pub creator_id: Option<i64>,
}

/// Stream to insert.
#[derive(Debug, Clone)]
pub struct NewStream {
    pub name: String,
    pub description: String,
    pub invite_only: bool,
    pub is_web_public: bool,
    pub history_public_to_subscribers: bool,
    pub stream_post_policy: StreamPostPolicy,
    pub message_retention_days: Option<i32>,
    pub can_administer_channel_group: SystemGroup,
    pub can_remove_subscribers_group: SystemGroup,
    pub creator_id: Option<i64>,
}

/// A user's membership in a stream plus display preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub user_id: i64,
    pub stream_id: i64,
    pub active: bool,
    pub color: String,
    pub is_muted: bool,
    pub pin_to_top: bool,
    pub desktop_notifications: Option<bool>,
    pub audible_notifications: Option<bool>,
    pub push_notifications: Option<bool>,
    pub email_notifications: Option<bool>,
    pub wildcard_mentions_notify: Option<bool>,
    /// Highest message id that existed when the user first joined.
    pub joined_after_message_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultStreamGroup {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub stream_ids: Vec<i64>,
}

/// Where a message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Stream { stream_id: i64, topic: String },
    Direct { user_id: i64 },
}

/// Message stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient: Recipient,
    pub content: String,
    pub date_sent: i64,
}

/// Message composed by a workflow, persisted by the notification worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub sender_id: i64,
    pub recipient: Recipient,
    pub content: String,
}

/// One row of a stream's topic history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    pub name: String,
    pub max_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_group_membership() {
        assert!(SystemGroup::Administrators.contains(UserRole::Owner));
        assert!(SystemGroup::Administrators.contains(UserRole::Administrator));
        assert!(!SystemGroup::Administrators.contains(UserRole::Moderator));
        assert!(SystemGroup::Members.contains(UserRole::Member));
        assert!(!SystemGroup::Members.contains(UserRole::Guest));
        assert!(SystemGroup::Everyone.contains(UserRole::Guest));
        assert!(!SystemGroup::Nobody.contains(UserRole::Owner));
    }

    #[test]
    fn test_post_policy_wire_format() {
        let json = serde_json::to_string(&StreamPostPolicy::Moderators).unwrap();
        assert_eq!(json, "4");
        let parsed: StreamPostPolicy = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, StreamPostPolicy::Admins);
        assert!(serde_json::from_str::<StreamPostPolicy>("9").is_err());
    }

    #[test]
    fn test_directly_controls_own_bot() {
        let owner = User {
            id: 1,
            email: "iago@example.com".into(),
            full_name: "Iago".into(),
            role: UserRole::Member,
            is_bot: false,
            bot_owner_id: None,
            is_active: true,
            api_key: String::new(),
        };
        let bot = User {
            id: 2,
            email: "bot@example.com".into(),
            full_name: "Bot".into(),
            is_bot: true,
            bot_owner_id: Some(1),
            ..owner.clone()
        };
        let stranger = User {
            id: 3,
            bot_owner_id: None,
            is_bot: false,
            ..bot.clone()
        };
        assert!(owner.directly_controls(&owner));
        assert!(owner.directly_controls(&bot));
        assert!(!owner.directly_controls(&stranger));
    }
}
