//! Gateway events.
//!
//! Every notification the gateway can deliver is one variant of
//! [`GatewayEvent`]. Each variant has a matching [`EventKind`], which is what
//! listeners subscribe to.
//!
//! [`EventKind::ALL`] is the fixed table of kinds that are relayed to
//! handlers. [`EventKind::Log`] is deliberately absent from it: gateway
//! diagnostics are consumed by the bootstrapper, not by business logic.

use std::fmt;
use std::sync::Arc;

use crate::model::{
    Channel, ChannelId, Guild, GuildId, GuildMember, GroupUser, LogRecord, Message, MessageId,
    Reaction, Role, User, VoiceServer, VoiceState,
};

/// An event delivered by the gateway.
///
/// Payloads that may be large or are shared between many listeners
/// (messages) are reference counted, so cloning an event is cheap.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    ChannelCreated(Channel),
    ChannelDestroyed(Channel),
    ChannelUpdated {
        before: Channel,
        after: Channel,
    },
    Connected,
    CurrentUserUpdated {
        before: User,
        after: User,
    },
    Disconnected {
        /// Description of the failure that closed the connection, if any.
        reason: Option<String>,
    },
    GuildAvailable(Guild),
    GuildMembersDownloaded(Guild),
    GuildMemberUpdated {
        before: GuildMember,
        after: GuildMember,
    },
    GuildUpdated {
        before: Guild,
        after: Guild,
    },
    JoinedGuild(Guild),
    LatencyUpdated {
        before_ms: u32,
        after_ms: u32,
    },
    LeftGuild(Guild),
    LoggedIn,
    LoggedOut,
    MessageDeleted {
        message_id: MessageId,
        channel_id: ChannelId,
    },
    MessageReceived(Arc<Message>),
    MessageUpdated {
        /// Previous version, if it was cached.
        before: Option<Arc<Message>>,
        after: Arc<Message>,
    },
    ReactionAdded(Reaction),
    ReactionRemoved(Reaction),
    ReactionsCleared {
        message_id: MessageId,
        channel_id: ChannelId,
    },
    Ready,
    RecipientAdded(GroupUser),
    RecipientRemoved(GroupUser),
    RoleCreated(Role),
    RoleDeleted(Role),
    RoleUpdated {
        before: Role,
        after: Role,
    },
    UserBanned {
        user: User,
        guild_id: GuildId,
    },
    UserIsTyping {
        user: User,
        channel_id: ChannelId,
    },
    UserJoined(GuildMember),
    UserLeft(GuildMember),
    UserUnbanned {
        user: User,
        guild_id: GuildId,
    },
    UserUpdated {
        before: User,
        after: User,
    },
    UserVoiceStateUpdated {
        user: User,
        before: VoiceState,
        after: VoiceState,
    },
    VoiceServerUpdated(VoiceServer),
    /// Diagnostic output of the gateway client.
    Log(LogRecord),
}

impl GatewayEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ChannelCreated(_) => EventKind::ChannelCreated,
            Self::ChannelDestroyed(_) => EventKind::ChannelDestroyed,
            Self::ChannelUpdated { .. } => EventKind::ChannelUpdated,
            Self::Connected => EventKind::Connected,
            Self::CurrentUserUpdated { .. } => EventKind::CurrentUserUpdated,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::GuildAvailable(_) => EventKind::GuildAvailable,
            Self::GuildMembersDownloaded(_) => EventKind::GuildMembersDownloaded,
            Self::GuildMemberUpdated { .. } => EventKind::GuildMemberUpdated,
            Self::GuildUpdated { .. } => EventKind::GuildUpdated,
            Self::JoinedGuild(_) => EventKind::JoinedGuild,
            Self::LatencyUpdated { .. } => EventKind::LatencyUpdated,
            Self::LeftGuild(_) => EventKind::LeftGuild,
            Self::LoggedIn => EventKind::LoggedIn,
            Self::LoggedOut => EventKind::LoggedOut,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::MessageReceived(_) => EventKind::MessageReceived,
            Self::MessageUpdated { .. } => EventKind::MessageUpdated,
            Self::ReactionAdded(_) => EventKind::ReactionAdded,
            Self::ReactionRemoved(_) => EventKind::ReactionRemoved,
            Self::ReactionsCleared { .. } => EventKind::ReactionsCleared,
            Self::Ready => EventKind::Ready,
            Self::RecipientAdded(_) => EventKind::RecipientAdded,
            Self::RecipientRemoved(_) => EventKind::RecipientRemoved,
            Self::RoleCreated(_) => EventKind::RoleCreated,
            Self::RoleDeleted(_) => EventKind::RoleDeleted,
            Self::RoleUpdated { .. } => EventKind::RoleUpdated,
            Self::UserBanned { .. } => EventKind::UserBanned,
            Self::UserIsTyping { .. } => EventKind::UserIsTyping,
            Self::UserJoined(_) => EventKind::UserJoined,
            Self::UserLeft(_) => EventKind::UserLeft,
            Self::UserUnbanned { .. } => EventKind::UserUnbanned,
            Self::UserUpdated { .. } => EventKind::UserUpdated,
            Self::UserVoiceStateUpdated { .. } => EventKind::UserVoiceStateUpdated,
            Self::VoiceServerUpdated(_) => EventKind::VoiceServerUpdated,
            Self::Log(_) => EventKind::Log,
        }
    }

    /// Shorthand for a `MessageReceived` event.
    pub fn message(message: Message) -> Self {
        Self::MessageReceived(Arc::new(message))
    }
}

/// Discriminant of [`GatewayEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ChannelCreated,
    ChannelDestroyed,
    ChannelUpdated,
    Connected,
    CurrentUserUpdated,
    Disconnected,
    GuildAvailable,
    GuildMembersDownloaded,
    GuildMemberUpdated,
    GuildUpdated,
    JoinedGuild,
    LatencyUpdated,
    LeftGuild,
    LoggedIn,
    LoggedOut,
    MessageDeleted,
    MessageReceived,
    MessageUpdated,
    ReactionAdded,
    ReactionRemoved,
    ReactionsCleared,
    Ready,
    RecipientAdded,
    RecipientRemoved,
    RoleCreated,
    RoleDeleted,
    RoleUpdated,
    UserBanned,
    UserIsTyping,
    UserJoined,
    UserLeft,
    UserUnbanned,
    UserUpdated,
    UserVoiceStateUpdated,
    VoiceServerUpdated,
    Log,
}

impl EventKind {
    /// Every kind that is relayed to handlers, in a stable order.
    pub const ALL: [EventKind; 35] = [
        Self::ChannelCreated,
        Self::ChannelDestroyed,
        Self::ChannelUpdated,
        Self::Connected,
        Self::CurrentUserUpdated,
        Self::Disconnected,
        Self::GuildAvailable,
        Self::GuildMembersDownloaded,
        Self::GuildMemberUpdated,
        Self::GuildUpdated,
        Self::JoinedGuild,
        Self::LatencyUpdated,
        Self::LeftGuild,
        Self::LoggedIn,
        Self::LoggedOut,
        Self::MessageDeleted,
        Self::MessageReceived,
        Self::MessageUpdated,
        Self::ReactionAdded,
        Self::ReactionRemoved,
        Self::ReactionsCleared,
        Self::Ready,
        Self::RecipientAdded,
        Self::RecipientRemoved,
        Self::RoleCreated,
        Self::RoleDeleted,
        Self::RoleUpdated,
        Self::UserBanned,
        Self::UserIsTyping,
        Self::UserJoined,
        Self::UserLeft,
        Self::UserUnbanned,
        Self::UserUpdated,
        Self::UserVoiceStateUpdated,
        Self::VoiceServerUpdated,
    ];

    /// Snake-case name, used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChannelCreated => "channel_created",
            Self::ChannelDestroyed => "channel_destroyed",
            Self::ChannelUpdated => "channel_updated",
            Self::Connected => "connected",
            Self::CurrentUserUpdated => "current_user_updated",
            Self::Disconnected => "disconnected",
            Self::GuildAvailable => "guild_available",
            Self::GuildMembersDownloaded => "guild_members_downloaded",
            Self::GuildMemberUpdated => "guild_member_updated",
            Self::GuildUpdated => "guild_updated",
            Self::JoinedGuild => "joined_guild",
            Self::LatencyUpdated => "latency_updated",
            Self::LeftGuild => "left_guild",
            Self::LoggedIn => "logged_in",
            Self::LoggedOut => "logged_out",
            Self::MessageDeleted => "message_deleted",
            Self::MessageReceived => "message_received",
            Self::MessageUpdated => "message_updated",
            Self::ReactionAdded => "reaction_added",
            Self::ReactionRemoved => "reaction_removed",
            Self::ReactionsCleared => "reactions_cleared",
            Self::Ready => "ready",
            Self::RecipientAdded => "recipient_added",
            Self::RecipientRemoved => "recipient_removed",
            Self::RoleCreated => "role_created",
            Self::RoleDeleted => "role_deleted",
            Self::RoleUpdated => "role_updated",
            Self::UserBanned => "user_banned",
            Self::UserIsTyping => "user_is_typing",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserUnbanned => "user_unbanned",
            Self::UserUpdated => "user_updated",
            Self::UserVoiceStateUpdated => "user_voice_state_updated",
            Self::VoiceServerUpdated => "voice_server_updated",
            Self::Log => "log",
        }
    }

    /// Whether handlers receive this kind.
    pub fn is_relayed(&self) -> bool {
        !matches!(self, Self::Log)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelRef, LogSeverity};
    use std::collections::HashSet;

    #[test]
    fn test_all_kinds_are_unique_and_relayed() {
        let set: HashSet<_> = EventKind::ALL.iter().copied().collect();
        assert_eq!(set.len(), EventKind::ALL.len());
        assert!(EventKind::ALL.iter().all(EventKind::is_relayed));
        assert!(!set.contains(&EventKind::Log));
    }

    #[test]
    fn test_all_kinds_have_distinct_names() {
        let names: HashSet<_> = EventKind::ALL.iter().map(EventKind::as_str).collect();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_event_kind_mapping() {
        let msg = Message::new(1, User::new(2, "alice"), ChannelRef::direct(3), "hi");
        assert_eq!(
            GatewayEvent::message(msg).kind(),
            EventKind::MessageReceived
        );
        assert_eq!(GatewayEvent::Ready.kind(), EventKind::Ready);
        let log = LogRecord::new(LogSeverity::Info, "gateway", "hello");
        assert_eq!(GatewayEvent::Log(log).kind(), EventKind::Log);
    }
}
