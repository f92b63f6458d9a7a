//! The [`EventHooks`] trait and the event relay.
//!
//! A handler type implements [`EventHooks`] and overrides the hooks it cares
//! about. Every hook defaults to doing nothing, except
//! [`on_message_received`](EventHooks::on_message_received), which runs the
//! message through the handler's [`ProcessorChain`].
//!
//! ```rust,ignore
//! use herald_framework::prelude::*;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl EventHooks for Greeter {
//!     fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
//!         chain.command("^hi$", |ctx, _| async move {
//!             ctx.reply("hello!").await?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     }
//!
//!     async fn on_user_joined(&self, ctx: &HandlerContext, member: GuildMember) -> anyhow::Result<()> {
//!         tracing::info!(user = %member.user.id, "Welcome");
//!         Ok(())
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{
    Channel, ChannelId, GatewayEvent, GroupUser, Guild, GuildId, GuildMember, Message, MessageId,
    Reaction, Role, User, VoiceServer, VoiceState,
};

use super::context::HandlerContext;
use crate::chain::ProcessorChain;
use crate::error::FrameworkResult;

/// Overridable reactions to gateway events.
///
/// One hook exists per relayed event kind. Hooks receive the handler's
/// [`HandlerContext`] and the event payload by value.
#[async_trait]
pub trait EventHooks: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Adds this handler's commands to its chain.
    ///
    /// Called once while the handler is attached. An error aborts the attach.
    fn register_commands(&self, _chain: &mut ProcessorChain) -> FrameworkResult<()> {
        Ok(())
    }

    async fn on_channel_created(&self, _ctx: &HandlerContext, _channel: Channel) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_channel_destroyed(&self, _ctx: &HandlerContext, _channel: Channel) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_channel_updated(
        &self,
        _ctx: &HandlerContext,
        _before: Channel,
        _after: Channel,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_connected(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_current_user_updated(
        &self,
        _ctx: &HandlerContext,
        _before: User,
        _after: User,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_disconnected(&self, _ctx: &HandlerContext, _reason: Option<String>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_guild_available(&self, _ctx: &HandlerContext, _guild: Guild) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_guild_members_downloaded(&self, _ctx: &HandlerContext, _guild: Guild) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_guild_member_updated(
        &self,
        _ctx: &HandlerContext,
        _before: GuildMember,
        _after: GuildMember,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_guild_updated(
        &self,
        _ctx: &HandlerContext,
        _before: Guild,
        _after: Guild,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_joined_guild(&self, _ctx: &HandlerContext, _guild: Guild) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_latency_updated(
        &self,
        _ctx: &HandlerContext,
        _before_ms: u32,
        _after_ms: u32,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_left_guild(&self, _ctx: &HandlerContext, _guild: Guild) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_logged_in(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_logged_out(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_message_deleted(
        &self,
        _ctx: &HandlerContext,
        _message_id: MessageId,
        _channel_id: ChannelId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs the message through [`HandlerContext::chain`].
    ///
    /// Override to pre-filter messages; call
    /// `ctx.chain().dispatch(..)` yourself to keep command handling.
    async fn on_message_received(&self, ctx: &HandlerContext, message: Arc<Message>) -> anyhow::Result<()> {
        let gateway = ctx.gateway()?;
        ctx.chain().dispatch(&gateway, message).await?;
        Ok(())
    }

    async fn on_message_updated(
        &self,
        _ctx: &HandlerContext,
        _before: Option<Arc<Message>>,
        _after: Arc<Message>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_reaction_added(&self, _ctx: &HandlerContext, _reaction: Reaction) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_reaction_removed(&self, _ctx: &HandlerContext, _reaction: Reaction) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_reactions_cleared(
        &self,
        _ctx: &HandlerContext,
        _message_id: MessageId,
        _channel_id: ChannelId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_ready(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_recipient_added(&self, _ctx: &HandlerContext, _user: GroupUser) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_recipient_removed(&self, _ctx: &HandlerContext, _user: GroupUser) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_role_created(&self, _ctx: &HandlerContext, _role: Role) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_role_deleted(&self, _ctx: &HandlerContext, _role: Role) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_role_updated(&self, _ctx: &HandlerContext, _before: Role, _after: Role) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_banned(&self, _ctx: &HandlerContext, _user: User, _guild_id: GuildId) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_is_typing(
        &self,
        _ctx: &HandlerContext,
        _user: User,
        _channel_id: ChannelId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_joined(&self, _ctx: &HandlerContext, _member: GuildMember) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_left(&self, _ctx: &HandlerContext, _member: GuildMember) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_unbanned(
        &self,
        _ctx: &HandlerContext,
        _user: User,
        _guild_id: GuildId,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_updated(&self, _ctx: &HandlerContext, _before: User, _after: User) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_user_voice_state_updated(
        &self,
        _ctx: &HandlerContext,
        _user: User,
        _before: VoiceState,
        _after: VoiceState,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_voice_server_updated(&self, _ctx: &HandlerContext, _server: VoiceServer) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Calls the hook matching `event`.
///
/// `Log` events have no hook and are ignored.
pub(crate) async fn relay<H: EventHooks>(
    hooks: &H,
    ctx: &HandlerContext,
    event: GatewayEvent,
) -> anyhow::Result<()> {
    use GatewayEvent as E;

    match event {
        E::ChannelCreated(channel) => hooks.on_channel_created(ctx, channel).await,
        E::ChannelDestroyed(channel) => hooks.on_channel_destroyed(ctx, channel).await,
        E::ChannelUpdated { before, after } => hooks.on_channel_updated(ctx, before, after).await,
        E::Connected => hooks.on_connected(ctx).await,
        E::CurrentUserUpdated { before, after } => {
            hooks.on_current_user_updated(ctx, before, after).await
        }
        E::Disconnected { reason } => hooks.on_disconnected(ctx, reason).await,
        E::GuildAvailable(guild) => hooks.on_guild_available(ctx, guild).await,
        E::GuildMembersDownloaded(guild) => hooks.on_guild_members_downloaded(ctx, guild).await,
        E::GuildMemberUpdated { before, after } => {
            hooks.on_guild_member_updated(ctx, before, after).await
        }
        E::GuildUpdated { before, after } => hooks.on_guild_updated(ctx, before, after).await,
        E::JoinedGuild(guild) => hooks.on_joined_guild(ctx, guild).await,
        E::LatencyUpdated {
            before_ms,
            after_ms,
        } => hooks.on_latency_updated(ctx, before_ms, after_ms).await,
        E::LeftGuild(guild) => hooks.on_left_guild(ctx, guild).await,
        E::LoggedIn => hooks.on_logged_in(ctx).await,
        E::LoggedOut => hooks.on_logged_out(ctx).await,
        E::MessageDeleted {
            message_id,
            channel_id,
        } => hooks.on_message_deleted(ctx, message_id, channel_id).await,
        E::MessageReceived(message) => hooks.on_message_received(ctx, message).await,
        E::MessageUpdated { before, after } => hooks.on_message_updated(ctx, before, after).await,
        E::ReactionAdded(reaction) => hooks.on_reaction_added(ctx, reaction).await,
        E::ReactionRemoved(reaction) => hooks.on_reaction_removed(ctx, reaction).await,
        E::ReactionsCleared {
            message_id,
            channel_id,
        } => hooks.on_reactions_cleared(ctx, message_id, channel_id).await,
        E::Ready => hooks.on_ready(ctx).await,
        E::RecipientAdded(user) => hooks.on_recipient_added(ctx, user).await,
        E::RecipientRemoved(user) => hooks.on_recipient_removed(ctx, user).await,
        E::RoleCreated(role) => hooks.on_role_created(ctx, role).await,
        E::RoleDeleted(role) => hooks.on_role_deleted(ctx, role).await,
        E::RoleUpdated { before, after } => hooks.on_role_updated(ctx, before, after).await,
        E::UserBanned { user, guild_id } => hooks.on_user_banned(ctx, user, guild_id).await,
        E::UserIsTyping { user, channel_id } => hooks.on_user_is_typing(ctx, user, channel_id).await,
        E::UserJoined(member) => hooks.on_user_joined(ctx, member).await,
        E::UserLeft(member) => hooks.on_user_left(ctx, member).await,
        E::UserUnbanned { user, guild_id } => hooks.on_user_unbanned(ctx, user, guild_id).await,
        E::UserUpdated { before, after } => hooks.on_user_updated(ctx, before, after).await,
        E::UserVoiceStateUpdated {
            user,
            before,
            after,
        } => hooks.on_user_voice_state_updated(ctx, user, before, after).await,
        E::VoiceServerUpdated(server) => hooks.on_voice_server_updated(ctx, server).await,
        E::Log(_) => Ok(()),
    }
}
