//! Entity model shared between the gateway and the dispatch layer.
//!
//! These are plain data snapshots. A gateway implementation fills them in from
//! whatever the platform sends; the framework only ever reads them.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw numeric id.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Identifies a user account.
    UserId
);
snowflake!(
    /// Identifies a text, voice or private channel.
    ChannelId
);
snowflake!(
    /// Identifies a guild (server).
    GuildId
);
snowflake!(
    /// Identifies a message.
    MessageId
);
snowflake!(
    /// Identifies a guild role.
    RoleId
);

// ============================================================================
// Users
// ============================================================================

/// A user account as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// Whether the account is a bot account.
    #[serde(default)]
    pub bot: bool,
    /// Whether the message author is a webhook rather than a real account.
    #[serde(default)]
    pub webhook: bool,
}

impl User {
    /// Creates a regular (human) user.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot: false,
            webhook: false,
        }
    }

    /// Creates a bot user.
    pub fn bot(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            bot: true,
            ..Self::new(id, name)
        }
    }

    /// Creates a webhook author.
    pub fn webhook(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            webhook: true,
            ..Self::new(id, name)
        }
    }

    /// Returns true for bot accounts and webhooks.
    pub fn is_automated(&self) -> bool {
        self.bot || self.webhook
    }

    /// Formats the mention string for this user, e.g. `<@1234>`.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// A user in the context of a specific guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: GuildId,
    pub user: User,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleId>,
}

impl GuildMember {
    pub fn new(guild_id: impl Into<GuildId>, user: User) -> Self {
        Self {
            guild_id: guild_id.into(),
            user,
            nickname: None,
            roles: Vec::new(),
        }
    }

    /// Nickname if set, otherwise the account name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.user.name)
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.roles.contains(&role)
    }
}

/// A recipient of a group direct-message channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUser {
    pub channel_id: ChannelId,
    pub user: User,
}

// ============================================================================
// Channels and guilds
// ============================================================================

/// Where a channel lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelKind {
    /// A channel belonging to a guild.
    Guild { guild_id: GuildId },
    /// A one-to-one direct message channel.
    Direct,
    /// A group direct message channel.
    Group,
}

/// Lightweight reference to the channel a message was posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: ChannelId,
    pub kind: ChannelKind,
}

impl ChannelRef {
    pub fn guild(id: impl Into<ChannelId>, guild_id: impl Into<GuildId>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Guild {
                guild_id: guild_id.into(),
            },
        }
    }

    pub fn direct(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Direct,
        }
    }

    pub fn group(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Group,
        }
    }

    /// The owning guild, if this is a guild channel.
    pub fn guild_id(&self) -> Option<GuildId> {
        match self.kind {
            ChannelKind::Guild { guild_id } => Some(guild_id),
            ChannelKind::Direct | ChannelKind::Group => None,
        }
    }

    pub fn is_guild(&self) -> bool {
        matches!(self.kind, ChannelKind::Guild { .. })
    }

    /// Direct and group channels are both private.
    pub fn is_private(&self) -> bool {
        !self.is_guild()
    }
}

/// A full channel snapshot, as carried by channel lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

impl Channel {
    pub fn to_ref(&self) -> ChannelRef {
        ChannelRef {
            id: self.id,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub guild_id: GuildId,
    pub name: String,
}

// ============================================================================
// Messages and reactions
// ============================================================================

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: User,
    /// Raw text content, including any prefix or mention.
    pub content: String,
    pub channel: ChannelRef,
}

impl Message {
    pub fn new(
        id: impl Into<MessageId>,
        author: User,
        channel: ChannelRef,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            author,
            content: content.into(),
            channel,
        }
    }
}

/// A single reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub user_id: UserId,
    /// Unicode emoji or custom emoji name.
    pub emoji: String,
}

// ============================================================================
// Voice
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    /// `None` when the user is not connected to voice.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub deafened: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceServer {
    pub guild_id: GuildId,
    pub endpoint: String,
}

// ============================================================================
// Gateway log records
// ============================================================================

/// Severity attached to a gateway log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Critical,
    Error,
    Warning,
    Info,
    Verbose,
    Debug,
}

impl LogSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic record produced by the gateway client itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: LogSeverity,
    /// Component inside the gateway that produced the record.
    pub source: String,
    pub message: String,
}

impl LogRecord {
    pub fn new(
        severity: LogSeverity,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            source: source.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ref_privacy() {
        assert!(ChannelRef::guild(1, 2).is_guild());
        assert_eq!(ChannelRef::guild(1, 2).guild_id(), Some(GuildId(2)));
        assert!(ChannelRef::direct(1).is_private());
        assert!(ChannelRef::group(1).is_private());
        assert_eq!(ChannelRef::group(1).guild_id(), None);
    }

    #[test]
    fn test_user_flags() {
        assert!(!User::new(1, "alice").is_automated());
        assert!(User::bot(2, "robot").is_automated());
        assert!(User::webhook(3, "hook").is_automated());
        assert_eq!(User::new(42, "alice").mention(), "<@42>");
    }

    #[test]
    fn test_member_display_name() {
        let mut member = GuildMember::new(7, User::new(1, "alice"));
        assert_eq!(member.display_name(), "alice");
        member.nickname = Some("Al".into());
        assert_eq!(member.display_name(), "Al");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&UserId(247081094799687682)).unwrap();
        assert_eq!(json, "247081094799687682");
        let kind: ChannelKind = serde_json::from_str(r#"{"type":"guild","guild_id":5}"#).unwrap();
        assert_eq!(kind, ChannelKind::Guild { guild_id: GuildId(5) });
    }
}
