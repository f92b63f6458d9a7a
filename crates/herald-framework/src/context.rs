//! Per-message dispatch context.

use std::sync::Arc;

use herald_core::{
    BoxedGateway, ChannelRef, GatewayResult, GuildId, GuildMember, Message, MessageId, User,
};

/// Context handed to a matched command callback.
///
/// Built fresh for every match and dropped when the callback returns. It is
/// cheap to clone: the message is shared and the gateway is reference counted.
#[derive(Clone)]
pub struct CommandContext {
    gateway: BoxedGateway,
    message: Arc<Message>,
    text: String,
    member: Option<GuildMember>,
}

impl CommandContext {
    pub fn new(
        gateway: BoxedGateway,
        message: Arc<Message>,
        text: String,
        member: Option<GuildMember>,
    ) -> Self {
        Self {
            gateway,
            message,
            text,
            member,
        }
    }

    /// The gateway the message arrived on.
    pub fn gateway(&self) -> &BoxedGateway {
        &self.gateway
    }

    pub fn message(&self) -> &Arc<Message> {
        &self.message
    }

    pub fn author(&self) -> &User {
        &self.message.author
    }

    pub fn channel(&self) -> ChannelRef {
        self.message.channel
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.message.channel.guild_id()
    }

    /// The command text the pattern was matched against.
    ///
    /// For verified commands this is the content with its prefix stripped,
    /// otherwise the raw content.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The author's guild membership, resolved for guild-user commands only.
    pub fn member(&self) -> Option<&GuildMember> {
        self.member.as_ref()
    }

    /// Sends `content` to the channel the message came from.
    pub async fn reply(&self, content: &str) -> GatewayResult<MessageId> {
        self.gateway
            .send_message(self.message.channel.id, content)
            .await
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("message", &self.message.id)
            .field("author", &self.message.author.id)
            .field("text", &self.text)
            .field("member", &self.member.is_some())
            .finish()
    }
}
