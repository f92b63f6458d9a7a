//! The gateway connection seam.
//!
//! [`Gateway`] is everything the dispatch layer needs from a chat platform
//! client: event subscription, a handful of cache lookups, message sending,
//! and the login/start/stop lifecycle. Connection management, reconnection
//! and rate limiting all live behind this trait.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{GatewayResult, HookResult};
use crate::event::{EventKind, GatewayEvent};
use crate::model::{ChannelId, GuildId, GuildMember, MessageId, User, UserId};

/// Callback invoked by the gateway for each delivered event.
///
/// The gateway awaits the returned future before delivering the next event of
/// the same subscription, so a listener that does its work inline applies
/// backpressure to the delivery loop.
pub type EventListener = Arc<dyn Fn(GatewayEvent) -> BoxFuture<'static, HookResult> + Send + Sync>;

/// Wraps an async closure as an [`EventListener`].
pub fn listener<F, Fut>(f: F) -> EventListener
where
    F: Fn(GatewayEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Opaque handle returned by [`Gateway::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A live connection to the chat platform.
///
/// Implementations must be safe to share between tasks: handlers send
/// messages and look up cached entities concurrently.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Registers `listener` for events of `kind`.
    fn subscribe(&self, kind: EventKind, listener: EventListener) -> SubscriptionId;

    /// Removes a subscription. Returns `false` if it was already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// The account this connection is logged in as, if any.
    fn current_user(&self) -> Option<User>;

    /// Looks a user up in the local cache.
    fn cached_user(&self, id: UserId) -> Option<User>;

    /// Resolves a guild member, downloading it when it is not cached.
    ///
    /// `Ok(None)` means the user is not a member of the guild.
    async fn guild_member(&self, guild: GuildId, user: UserId)
    -> GatewayResult<Option<GuildMember>>;

    /// Posts a text message to a channel.
    async fn send_message(&self, channel: ChannelId, content: &str) -> GatewayResult<MessageId>;

    /// Authenticates the connection.
    async fn login(&self, token: &str) -> GatewayResult<()>;

    /// Opens the event stream. Events start flowing after this returns.
    async fn start(&self) -> GatewayResult<()>;

    /// Closes the event stream and logs out.
    async fn stop(&self) -> GatewayResult<()>;
}

/// A shared, type-erased gateway.
pub type BoxedGateway = Arc<dyn Gateway>;
