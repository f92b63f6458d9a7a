//! Command verification.
//!
//! A [`Verifier`] decides whether a message is a command candidate at all and,
//! if so, returns the command text with its prefix removed. The built-in
//! implementation is [`VerificationPolicy`], which checks, in order:
//!
//! 1. bot and webhook authors (when `ignore_bots` is set)
//! 2. guild messages (when they are not accepted)
//! 3. private messages (when they are not accepted)
//! 4. if no prefix is required, the whole content is the command
//! 5. a mention of the bot itself, e.g. `<@1234> ping`
//! 6. the configured string prefix, e.g. `!ping`
//!
//! Whitespace after a mention is always trimmed. Whitespace after a string
//! prefix is only trimmed when `trim_space_after_string_prefix` is set.
//!
//! ```rust,ignore
//! use herald_framework::verifier::VerificationPolicy;
//!
//! let policy = VerificationPolicy::builder()
//!     .string_prefix("?")
//!     .trim_space_after_string_prefix(true)
//!     .build();
//! ```

use std::fmt;
use std::sync::{Arc, OnceLock};

use herald_core::{Message, UserId};
use serde::{Deserialize, Serialize};

/// Decides whether a message is a command and strips its prefix.
///
/// Implementations must be pure: the same message and identity always give
/// the same verdict, and verifying never mutates shared state.
pub trait Verifier: Send + Sync {
    /// Verifies `message`. `me` is the bot's own id, used for mention prefixes.
    fn verify(&self, message: &Message, me: Option<UserId>) -> Verdict;
}

/// Outcome of [`Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The message is a command candidate; carries the stripped command text.
    Accepted(String),
    /// The message is not a command.
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The stripped command text, if accepted.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Accepted(text) => Some(text),
            Self::Rejected(_) => None,
        }
    }
}

/// Why a message was not considered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Author is a bot or webhook.
    AutomatedAuthor,
    /// Guild messages are not accepted.
    GuildMessage,
    /// Private messages are not accepted.
    PrivateMessage,
    /// Neither the mention nor the string prefix was present.
    MissingPrefix,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AutomatedAuthor => "automated author",
            Self::GuildMessage => "guild message",
            Self::PrivateMessage => "private message",
            Self::MissingPrefix => "missing prefix",
        })
    }
}

// ============================================================================
// VerificationPolicy
// ============================================================================

/// The configurable prefix and origin policy.
///
/// Immutable once built; share it behind an `Arc` between any number of
/// commands and concurrently running dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPolicy {
    ignore_bots: bool,
    accept_mention_prefix: bool,
    string_prefix: Option<String>,
    accept_guild_messages: bool,
    accept_private_messages: bool,
    trim_space_after_string_prefix: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::prefixed()
    }
}

impl VerificationPolicy {
    /// Starts a builder from the [`prefixed`](Self::prefixed) preset.
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder {
            policy: Self::prefixed(),
        }
    }

    /// Ignores bots, accepts the mention prefix and `!`, in guilds and
    /// private channels alike. Whitespace after `!` is kept.
    pub fn prefixed() -> Self {
        Self {
            ignore_bots: true,
            accept_mention_prefix: true,
            string_prefix: Some("!".to_string()),
            accept_guild_messages: true,
            accept_private_messages: true,
            trim_space_after_string_prefix: false,
        }
    }

    /// Same as [`prefixed`](Self::prefixed), but private messages are rejected.
    pub fn prefixed_guild_only() -> Self {
        Self {
            accept_private_messages: false,
            ..Self::prefixed()
        }
    }

    /// Process-wide shared instance of the [`prefixed`](Self::prefixed) preset.
    pub fn shared_prefixed() -> Arc<Self> {
        static SHARED: OnceLock<Arc<VerificationPolicy>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::prefixed())))
    }

    /// Process-wide shared instance of the [`prefixed_guild_only`](Self::prefixed_guild_only) preset.
    pub fn shared_prefixed_guild_only() -> Arc<Self> {
        static SHARED: OnceLock<Arc<VerificationPolicy>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::prefixed_guild_only())))
    }

    pub fn ignore_bots(&self) -> bool {
        self.ignore_bots
    }

    pub fn accept_mention_prefix(&self) -> bool {
        self.accept_mention_prefix
    }

    /// The string prefix, if one is configured and not blank.
    pub fn string_prefix(&self) -> Option<&str> {
        self.string_prefix
            .as_deref()
            .filter(|prefix| !prefix.trim().is_empty())
    }

    pub fn accept_guild_messages(&self) -> bool {
        self.accept_guild_messages
    }

    pub fn accept_private_messages(&self) -> bool {
        self.accept_private_messages
    }

    pub fn trim_space_after_string_prefix(&self) -> bool {
        self.trim_space_after_string_prefix
    }

    /// Whether any prefix (mention or string) is required.
    pub fn requires_prefix(&self) -> bool {
        self.accept_mention_prefix || self.string_prefix().is_some()
    }
}

impl Verifier for VerificationPolicy {
    fn verify(&self, message: &Message, me: Option<UserId>) -> Verdict {
        if self.ignore_bots && message.author.is_automated() {
            return Verdict::Rejected(Rejection::AutomatedAuthor);
        }
        if !self.accept_guild_messages && message.channel.is_guild() {
            return Verdict::Rejected(Rejection::GuildMessage);
        }
        if !self.accept_private_messages && message.channel.is_private() {
            return Verdict::Rejected(Rejection::PrivateMessage);
        }
        if !self.requires_prefix() {
            return Verdict::Accepted(message.content.clone());
        }

        let content = message.content.as_str();
        if self.accept_mention_prefix
            && let Some(me) = me
            && let Some(rest) = strip_mention(content, me)
        {
            return Verdict::Accepted(rest.trim_start().to_string());
        }
        if let Some(prefix) = self.string_prefix()
            && let Some(rest) = content.strip_prefix(prefix)
        {
            let rest = if self.trim_space_after_string_prefix {
                rest.trim_start()
            } else {
                rest
            };
            return Verdict::Accepted(rest.to_string());
        }

        Verdict::Rejected(Rejection::MissingPrefix)
    }
}

/// Strips a leading `<@id>` or `<@!id>` mention of `me`.
///
/// The mention must be followed by whitespace; the returned remainder starts
/// at that whitespace.
fn strip_mention(content: &str, me: UserId) -> Option<&str> {
    let rest = content.strip_prefix("<@")?;
    let rest = rest.strip_prefix('!').unwrap_or(rest);
    let end = rest.find('>')?;
    let digits = &rest[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id: u64 = digits.parse().ok()?;
    if id != me.get() {
        return None;
    }
    let rest = &rest[end + 1..];
    rest.starts_with(char::is_whitespace).then_some(rest)
}

// ============================================================================
// PolicyBuilder
// ============================================================================

/// Builder for [`VerificationPolicy`]. Consumed by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    policy: VerificationPolicy,
}

impl PolicyBuilder {
    pub fn ignore_bots(mut self, ignore: bool) -> Self {
        self.policy.ignore_bots = ignore;
        self
    }

    pub fn accept_mention_prefix(mut self, accept: bool) -> Self {
        self.policy.accept_mention_prefix = accept;
        self
    }

    pub fn string_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.policy.string_prefix = Some(prefix.into());
        self
    }

    /// Removes the string prefix; only mentions (if accepted) remain.
    pub fn no_string_prefix(mut self) -> Self {
        self.policy.string_prefix = None;
        self
    }

    pub fn accept_guild_messages(mut self, accept: bool) -> Self {
        self.policy.accept_guild_messages = accept;
        self
    }

    pub fn accept_private_messages(mut self, accept: bool) -> Self {
        self.policy.accept_private_messages = accept;
        self
    }

    pub fn trim_space_after_string_prefix(mut self, trim: bool) -> Self {
        self.policy.trim_space_after_string_prefix = trim;
        self
    }

    pub fn build(self) -> VerificationPolicy {
        self.policy
    }
}
