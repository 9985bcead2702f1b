//! Notification message bodies. Pure string builders; delivery happens after commit.

use crate::domain::policy::permission_policy_name;
use crate::domain::{Stream, User};
use std::collections::BTreeSet;

/// Direct message telling a user someone else subscribed them.
pub fn you_were_just_subscribed(actor: &User, stream_names: &BTreeSet<String>) -> String {
    if stream_names.len() == 1 {
        let name = stream_names.iter().next().map(String::as_str).unwrap_or("");
        return format!(
            "{} subscribed you to the channel #**{}**.",
            actor.mention(),
            name
        );
    }
    let mut message = format!(
        "{} subscribed you to the following channels:\n\n",
        actor.mention()
    );
    for name in stream_names {
        message.push_str(&format!("* #**{}**\n", name));
    }
    message
}

/// Posted to the realm's new-stream announcement channel.
pub fn new_channels_announcement(actor: &User, created: &[Stream]) -> String {
    let channels = created
        .iter()
        .map(|s| format!("#**{}**", s.name))
        .collect::<Vec<_>>()
        .join(", ");
    if created.len() > 1 {
        format!(
            "{} created the following channels: {}.",
            actor.silent_mention(),
            channels
        )
    } else {
        format!("{} created a new channel {}.", actor.silent_mention(), channels)
    }
}

/// First message in a freshly created stream.
pub fn channel_created(actor: &User, stream: &Stream) -> String {
    let description = if stream.description.is_empty() {
        "*No description.*"
    } else {
        stream.description.as_str()
    };
    format!(
        "**{}** channel created by {}. **Description:**\n```` quote\n{}\n````",
        permission_policy_name(
            stream.invite_only,
            stream.history_public_to_subscribers,
            stream.is_web_public
        ),
        actor.silent_mention(),
        description
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StreamPostPolicy, SystemGroup, UserRole};

    fn iago() -> User {
        User {
            id: 5,
            email: "iago@example.com".into(),
            full_name: "Iago".into(),
            role: UserRole::Administrator,
            is_bot: false,
            bot_owner_id: None,
            is_active: true,
            api_key: String::new(),
        }
    }

    fn stream(name: &str, description: &str) -> Stream {
        Stream {
            id: 1,
            name: name.into(),
            description: description.into(),
            invite_only: false,
            is_web_public: false,
            history_public_to_subscribers: true,
            stream_post_policy: StreamPostPolicy::Everyone,
            message_retention_days: None,
            can_administer_channel_group: SystemGroup::Administrators,
            can_remove_subscribers_group: SystemGroup::Administrators,
            email_token: String::new(),
            deactivated: false,
            date_created: 0,
            creator_id: None,
        }
    }

    #[test]
    fn test_single_and_multiple_subscriptions() {
        let one: BTreeSet<String> = ["rome".to_string()].into();
        assert_eq!(
            you_were_just_subscribed(&iago(), &one),
            "@**Iago|5** subscribed you to the channel #**rome**."
        );
        let many: BTreeSet<String> = ["venice".to_string(), "rome".to_string()].into();
        assert_eq!(
            you_were_just_subscribed(&iago(), &many),
            "@**Iago|5** subscribed you to the following channels:\n\n* #**rome**\n* #**venice**\n"
        );
    }

    #[test]
    fn test_announcement_wording() {
        assert_eq!(
            new_channels_announcement(&iago(), &[stream("a", "")]),
            "@_**Iago|5** created a new channel #**a**."
        );
        assert_eq!(
            new_channels_announcement(&iago(), &[stream("a", ""), stream("b", "")]),
            "@_**Iago|5** created the following channels: #**a**, #**b**."
        );
    }

    #[test]
    fn test_channel_created_message() {
        assert_eq!(
            channel_created(&iago(), &stream("a", "")),
            "**Public** channel created by @_**Iago|5**. **Description:**\n```` quote\n*No description.*\n````"
        );
        assert!(channel_created(&iago(), &stream("a", "Plans")).contains("quote\nPlans\n"));
    }
}
