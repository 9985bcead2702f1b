//! Stream business rules that need no I/O: name/description/color validation,
//! retention parsing and the permission-state invariants.

use super::entities::{Realm, SystemGroup};
use super::errors::DomainError;
use serde::Deserialize;

pub const MAX_NAME_LENGTH: usize = 60;
pub const MAX_DESCRIPTION_LENGTH: usize = 1024;

/// Topic of the message posted into a freshly created stream.
pub const STREAM_EVENTS_TOPIC: &str = "channel events";
/// Topic of the announcement posted to the realm's announcement stream.
pub const NEW_CHANNELS_TOPIC: &str = "new channels";

const STREAM_ASSIGNMENT_COLORS: &[&str] = &[
    "#76ce90", "#fae589", "#a6c7e5", "#e79ab5", "#bfd56f", "#f4ae55", "#b0a5fd", "#addfe5",
    "#f5ce6e", "#c2726a", "#94c849", "#bd86e5", "#ee7e4a", "#a6dcbf", "#95a5fd", "#53a063",
    "#9987e1", "#e4523d", "#c2c2c2", "#4f8de4", "#c6a8ad", "#e7cc4d", "#c8bebf", "#a47462",
];

pub fn check_stream_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::invalid("Channel name can't be empty."));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::invalid(format!(
            "Channel name too long (limit: {} characters).",
            MAX_NAME_LENGTH
        )));
    }
    if let Some(pos) = name.chars().position(|c| c.is_control()) {
        return Err(DomainError::invalid(format!(
            "Invalid character in channel name, at position {}.",
            pos + 1
        )));
    }
    Ok(())
}

/// Enforces the length limit and flattens newlines, which descriptions may not contain.
pub fn normalize_description(description: &str) -> Result<String, DomainError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(DomainError::invalid(format!(
            "description is too long (limit: {} characters)",
            MAX_DESCRIPTION_LENGTH
        )));
    }
    Ok(description.replace('\n', " "))
}

/// Accepts `#rgb` and `#rrggbb`.
pub fn check_color(var_name: &str, value: &str) -> Result<String, DomainError> {
    let hex = value.strip_prefix('#').unwrap_or("");
    let ok = value.starts_with('#')
        && (hex.len() == 3 || hex.len() == 6)
        && hex.chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        Ok(value.to_string())
    } else {
        Err(DomainError::invalid(format!(
            "{} is not a valid hex color code",
            var_name
        )))
    }
}

/// First palette color the user is not already using; cycles once exhausted.
pub fn pick_color(used: &[String]) -> String {
    STREAM_ASSIGNMENT_COLORS
        .iter()
        .find(|c| !used.iter().any(|u| u.eq_ignore_ascii_case(c)))
        .copied()
        .unwrap_or(STREAM_ASSIGNMENT_COLORS[used.len() % STREAM_ASSIGNMENT_COLORS.len()])
        .to_string()
}

/// `message_retention_days` as sent by clients: `"realm_default"`, `"unlimited"` or a day count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RetentionInput {
    Days(i64),
    Text(String),
}

impl Default for RetentionInput {
    fn default() -> Self {
        RetentionInput::Text("realm_default".to_string())
    }
}

impl RetentionInput {
    pub fn is_realm_default(&self) -> bool {
        matches!(self, RetentionInput::Text(s) if s == "realm_default")
    }
}

/// None = realm default, Some(-1) = unlimited.
pub fn parse_retention(input: &RetentionInput) -> Result<Option<i32>, DomainError> {
    fn bad(v: impl std::fmt::Display) -> DomainError {
        DomainError::invalid(format!("Bad value for 'message_retention_days': {}", v))
    }
    match input {
        RetentionInput::Text(s) if s == "realm_default" => Ok(None),
        RetentionInput::Text(s) if s == "unlimited" => Ok(Some(-1)),
        RetentionInput::Text(s) => Err(bad(s)),
        RetentionInput::Days(d) if *d > 0 && *d <= i32::MAX as i64 => Ok(Some(*d as i32)),
        RetentionInput::Days(d) => Err(bad(d)),
    }
}

/// History visibility a new stream gets when the client did not insist.
pub fn default_history_public(realm: &Realm, invite_only: bool, requested: Option<bool>) -> bool {
    if realm.legacy_mirror_realm {
        return false;
    }
    if invite_only {
        requested.unwrap_or(false)
    } else {
        true
    }
}

/// Proposed permission state of a stream after an update or at creation.
#[derive(Debug, Clone, Copy)]
pub struct PermissionProposal {
    pub is_private: bool,
    pub is_web_public: bool,
    pub is_default_stream: bool,
    pub history_public_to_subscribers: bool,
    pub is_moderation_channel: bool,
    pub legacy_mirror_realm: bool,
}

impl PermissionProposal {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_web_public && !self.history_public_to_subscribers {
            return Err(DomainError::invalid("Invalid parameters"));
        }
        if self.is_web_public && self.is_private {
            return Err(DomainError::invalid("Invalid parameters"));
        }
        if !self.is_private && !self.history_public_to_subscribers && !self.legacy_mirror_realm {
            return Err(DomainError::invalid("Invalid parameters"));
        }
        if self.is_private && self.is_default_stream {
            return Err(DomainError::invalid("A default channel cannot be private."));
        }
        if !self.is_private && self.is_moderation_channel {
            return Err(DomainError::invalid(
                "Moderation request channel must be private.",
            ));
        }
        Ok(())
    }
}

/// Stream permission settings may not point at `role:everyone`.
pub fn check_group_setting(setting_name: &str, group: SystemGroup) -> Result<(), DomainError> {
    if group == SystemGroup::Everyone {
        return Err(DomainError::invalid(format!(
            "'{}' setting cannot be set to 'role:everyone' group.",
            setting_name
        )));
    }
    Ok(())
}

/// Human label used in the "channel created" notification.
pub fn permission_policy_name(
    invite_only: bool,
    history_public_to_subscribers: bool,
    is_web_public: bool,
) -> &'static str {
    if is_web_public {
        "Web-public"
    } else if invite_only && history_public_to_subscribers {
        "Private, shared history"
    } else if invite_only {
        "Private, protected history"
    } else if history_public_to_subscribers {
        "Public"
    } else {
        "Public, protected history"
    }
}
