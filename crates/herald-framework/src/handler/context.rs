//! State shared by a handler's hooks.

use std::sync::Arc;

use herald_core::{BoxedGateway, User, UserId};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::chain::ProcessorChain;
use crate::error::{FrameworkError, FrameworkResult};
use crate::verifier::VerificationPolicy;

/// Options for attaching a handler.
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    /// Run each hook on its own task instead of inside the relay.
    pub fan_out: bool,
    /// Account reported by [`HandlerContext::author`].
    pub author_id: Option<UserId>,
    /// Policy used by the handler's verified commands unless they name their own.
    pub policy: Arc<VerificationPolicy>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            fan_out: true,
            author_id: None,
            policy: VerificationPolicy::shared_prefixed(),
        }
    }
}

impl HandlerOptions {
    pub fn fan_out(mut self, fan_out: bool) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn author_id(mut self, id: impl Into<UserId>) -> Self {
        self.author_id = Some(id.into());
        self
    }

    pub fn policy(mut self, policy: Arc<VerificationPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

enum AuthorSlot {
    Unresolved,
    Resolved(User),
    Released,
}

struct Shared {
    gateway: RwLock<Option<BoxedGateway>>,
    chain: ProcessorChain,
    options: HandlerOptions,
    author: Mutex<AuthorSlot>,
}

/// Everything a hook can reach besides its event payload.
///
/// Each relayed event gets its own context holding the gateway as it was
/// when the event arrived, so a hook that was scheduled before detach still
/// reaches the gateway while it runs.
#[derive(Clone)]
pub struct HandlerContext {
    pinned: Option<BoxedGateway>,
    shared: Arc<Shared>,
}

impl HandlerContext {
    pub(crate) fn new(gateway: BoxedGateway, chain: ProcessorChain, options: HandlerOptions) -> Self {
        Self {
            pinned: None,
            shared: Arc::new(Shared {
                gateway: RwLock::new(Some(gateway)),
                chain,
                options,
                author: Mutex::new(AuthorSlot::Unresolved),
            }),
        }
    }

    /// A context for one relayed event, or `None` once detached.
    pub(crate) fn for_event(&self) -> Option<Self> {
        let gateway = self.shared.gateway.read().clone()?;
        Some(Self {
            pinned: Some(gateway),
            shared: Arc::clone(&self.shared),
        })
    }

    /// The gateway this handler is attached to.
    ///
    /// Inside a hook this is the gateway the event came from. Otherwise it
    /// fails with [`FrameworkError::Detached`] once the handler has been
    /// detached.
    pub fn gateway(&self) -> FrameworkResult<BoxedGateway> {
        match &self.pinned {
            Some(gateway) => Ok(Arc::clone(gateway)),
            None => self.shared.gateway.read().clone().ok_or(FrameworkError::Detached),
        }
    }

    /// The handler's commands.
    pub fn chain(&self) -> &ProcessorChain {
        &self.shared.chain
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.shared.options
    }

    /// The configured author account, looked up in the gateway's user cache.
    ///
    /// The first successful lookup is cached. A miss is not remembered, so a
    /// later call may still resolve the user once the cache has it. Returns
    /// `None` when no author is configured or after detach.
    pub fn author(&self) -> Option<User> {
        let id = self.shared.options.author_id?;
        let mut slot = self.shared.author.lock();
        match &*slot {
            AuthorSlot::Resolved(user) => Some(user.clone()),
            AuthorSlot::Released => None,
            AuthorSlot::Unresolved => {
                let user = self.gateway().ok()?.cached_user(id)?;
                debug!(user = %id, "Resolved author");
                *slot = AuthorSlot::Resolved(user.clone());
                Some(user)
            }
        }
    }

    /// The prefix users are expected to type before a command.
    ///
    /// This is the policy's string prefix, or the bot's own mention when the
    /// policy has none. `None` if neither is available.
    pub fn default_prefix(&self) -> Option<String> {
        if let Some(prefix) = self.shared.options.policy.string_prefix() {
            return Some(prefix.to_string());
        }
        let gateway = self.gateway().ok()?;
        gateway.current_user().map(|me| me.mention())
    }

    /// Whether the handler has been detached.
    pub fn is_released(&self) -> bool {
        self.shared.gateway.read().is_none()
    }

    /// Drops the gateway reference and the cached author.
    ///
    /// Contexts already handed to hooks keep their own gateway.
    pub(crate) fn release(&self) -> Option<BoxedGateway> {
        *self.shared.author.lock() = AuthorSlot::Released;
        self.shared.gateway.write().take()
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("chain", &self.shared.chain)
            .field("options", &self.shared.options)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{Gateway, LocalGateway};

    fn context(gw: Arc<LocalGateway>, options: HandlerOptions) -> HandlerContext {
        HandlerContext::new(gw, ProcessorChain::new(), options)
    }

    #[test]
    fn test_author_is_resolved_lazily() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        let ctx = context(Arc::clone(&gw), HandlerOptions::default().author_id(42));

        assert_eq!(ctx.author(), None);
        gw.cache_user(User::new(42, "owner"));
        assert_eq!(ctx.author().map(|u| u.name), Some("owner".to_string()));

        // Later cache changes do not affect the resolved author.
        gw.cache_user(User::new(42, "renamed"));
        assert_eq!(ctx.author().map(|u| u.name), Some("owner".to_string()));
    }

    #[test]
    fn test_release_forgets_author_and_gateway() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        gw.cache_user(User::new(42, "owner"));
        let ctx = context(gw, HandlerOptions::default().author_id(42));
        assert!(ctx.author().is_some());

        assert!(ctx.release().is_some());
        assert!(ctx.is_released());
        assert!(ctx.author().is_none());
        assert!(matches!(ctx.gateway(), Err(FrameworkError::Detached)));
        assert!(ctx.release().is_none());
    }

    #[test]
    fn test_event_context_outlives_release() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        let ctx = context(gw, HandlerOptions::default());
        let event = ctx.for_event().unwrap();

        ctx.release();
        assert!(event.gateway().is_ok());
        assert!(event.is_released());
        assert!(ctx.for_event().is_none());
    }

    #[tokio::test]
    async fn test_default_prefix() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        let ctx = context(Arc::clone(&gw), HandlerOptions::default());
        assert_eq!(ctx.default_prefix().as_deref(), Some("!"));

        let mention_only = Arc::new(VerificationPolicy::builder().no_string_prefix().build());
        let ctx = context(Arc::clone(&gw), HandlerOptions::default().policy(mention_only));
        assert_eq!(ctx.default_prefix(), None);
        gw.login("token").await.unwrap();
        assert_eq!(ctx.default_prefix().as_deref(), Some("<@1000>"));
    }

    #[test]
    fn test_options_defaults() {
        let options = HandlerOptions::default();
        assert!(options.fan_out);
        assert!(options.author_id.is_none());
        assert_eq!(options.policy.string_prefix(), Some("!"));
    }
}
