//! Command definitions.
//!
//! A [`Command`] pairs a regular expression with an async callback. When it
//! processes a message it runs three steps:
//!
//! 1. resolve the text to match according to its [`MatchMode`]
//! 2. apply the pattern
//! 3. on a match, build a [`CommandContext`] and await the callback
//!
//! The match modes are:
//!
//! - [`MatchMode::Verified`]: a [`Verifier`] decides whether the message is a
//!   command and strips its prefix; the pattern sees the stripped text.
//! - [`MatchMode::AnyUser`]: no prefix handling; the pattern sees the raw
//!   content.
//! - [`MatchMode::GuildUser`]: like `AnyUser`, but only in guild channels,
//!   and the author's [`GuildMember`](herald_core::GuildMember) is resolved
//!   and attached to the context first.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_framework::Command;
//!
//! let ping = Command::builder(r"^ping$")
//!     .name("ping")
//!     .handler(|ctx, _m| async move {
//!         ctx.reply("pong").await?;
//!         Ok(())
//!     })?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{BoxedGateway, Message};
use regex::{Captures, Regex, RegexBuilder};
use tracing::{debug, trace};

use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult, FrameworkError, FrameworkResult};
use crate::verifier::{Verdict, VerificationPolicy, Verifier};

/// Type-erased command callback.
pub type CommandFn =
    Arc<dyn Fn(CommandContext, CommandMatch) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One message to be evaluated, together with the connection it came from.
#[derive(Clone)]
pub struct DispatchRequest {
    pub gateway: BoxedGateway,
    pub message: Arc<Message>,
}

impl DispatchRequest {
    pub fn new(gateway: BoxedGateway, message: Arc<Message>) -> Self {
        Self { gateway, message }
    }
}

/// Something that can be placed in a [`ProcessorChain`](crate::ProcessorChain).
///
/// `process` returns `Ok(true)` exactly when it has handled the message,
/// which stops the chain.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    async fn process(&self, request: &DispatchRequest) -> CommandResult<bool>;
}

// ============================================================================
// CommandMatch
// ============================================================================

/// Owned snapshot of the pattern's capture groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandMatch {
    groups: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl CommandMatch {
    fn from_captures(regex: &Regex, caps: &Captures<'_>) -> Self {
        let groups = caps
            .iter()
            .map(|g| g.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
            .collect();
        Self { groups, named }
    }

    /// The whole matched text.
    pub fn full(&self) -> &str {
        self.get(0).unwrap_or_default()
    }

    /// Positional group `index`; `0` is the whole match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.groups.get(index).and_then(|g| g.as_deref())
    }

    /// Named group `name`, if it participated in the match.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    /// Number of groups, including the implicit whole-match group.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// MatchMode
// ============================================================================

/// How a command decides which text to match and what to resolve.
#[derive(Clone)]
pub enum MatchMode {
    /// Verify and strip the prefix before matching.
    Verified(Arc<dyn Verifier>),
    /// Match the raw content from any author.
    AnyUser {
        ignore_bots: bool,
    },
    /// Match the raw content in guild channels, resolving the author's membership.
    GuildUser {
        ignore_bots: bool,
    },
}

impl std::fmt::Debug for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified(_) => f.write_str("Verified"),
            Self::AnyUser { ignore_bots } => f
                .debug_struct("AnyUser")
                .field("ignore_bots", ignore_bots)
                .finish(),
            Self::GuildUser { ignore_bots } => f
                .debug_struct("GuildUser")
                .field("ignore_bots", ignore_bots)
                .finish(),
        }
    }
}

// ============================================================================
// Command
// ============================================================================

/// A pattern plus the callback to run when it matches.
pub struct Command {
    name: String,
    regex: Regex,
    mode: MatchMode,
    callback: CommandFn,
}

impl Command {
    /// Starts building a command for `pattern`.
    ///
    /// Patterns are case-insensitive and `.` matches newlines unless the
    /// builder says otherwise.
    pub fn builder(pattern: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(pattern)
    }

    pub fn mode(&self) -> &MatchMode {
        &self.mode
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    /// Resolves the text to match and, for guild-user commands, the member.
    ///
    /// Returns `Ok(None)` when the message is not a candidate for this command.
    async fn candidate(
        &self,
        request: &DispatchRequest,
    ) -> CommandResult<Option<(String, Option<herald_core::GuildMember>)>> {
        let message = &request.message;
        match &self.mode {
            MatchMode::Verified(verifier) => {
                let me = request.gateway.current_user().map(|u| u.id);
                match verifier.verify(message, me) {
                    Verdict::Accepted(text) => Ok(Some((text, None))),
                    Verdict::Rejected(reason) => {
                        trace!(command = %self.name, %reason, "Message rejected by verifier");
                        Ok(None)
                    }
                }
            }
            MatchMode::AnyUser { ignore_bots } => {
                if *ignore_bots && message.author.is_automated() {
                    return Ok(None);
                }
                Ok(Some((message.content.clone(), None)))
            }
            MatchMode::GuildUser { ignore_bots } => {
                let Some(guild) = message.channel.guild_id() else {
                    return Ok(None);
                };
                if *ignore_bots && message.author.is_automated() {
                    return Ok(None);
                }
                let member = request
                    .gateway
                    .guild_member(guild, message.author.id)
                    .await?;
                match member {
                    Some(member) => Ok(Some((message.content.clone(), Some(member)))),
                    None => {
                        trace!(command = %self.name, guild = %guild, "Author is not a guild member");
                        Ok(None)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl CommandProcessor for Command {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, request: &DispatchRequest) -> CommandResult<bool> {
        let Some((text, member)) = self.candidate(request).await? else {
            return Ok(false);
        };

        let matched = match self.regex.captures(&text) {
            Some(caps) => CommandMatch::from_captures(&self.regex, &caps),
            None => {
                trace!(command = %self.name, "Pattern did not match");
                return Ok(false);
            }
        };

        debug!(
            command = %self.name,
            message = %request.message.id,
            "Command matched, invoking callback"
        );

        let ctx = CommandContext::new(
            Arc::clone(&request.gateway),
            Arc::clone(&request.message),
            text,
            member,
        );
        (self.callback)(ctx, matched)
            .await
            .map_err(|source| CommandError::Callback {
                command: self.name.clone(),
                source,
            })?;

        Ok(true)
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("pattern", &self.regex.as_str())
            .field("mode", &self.mode)
            .finish()
    }
}

// ============================================================================
// CommandBuilder
// ============================================================================

#[derive(Clone, Copy, Debug)]
enum ModeKind {
    Verified,
    AnyUser,
    GuildUser,
}

/// Builder for [`Command`].
///
/// The pattern is compiled in [`handler`](Self::handler); an invalid pattern
/// is reported there as [`FrameworkError::InvalidPattern`].
pub struct CommandBuilder {
    pattern: String,
    name: Option<String>,
    mode: ModeKind,
    verifier: Option<Arc<dyn Verifier>>,
    ignore_bots: bool,
    case_insensitive: bool,
    dot_matches_new_line: bool,
}

impl CommandBuilder {
    fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            name: None,
            mode: ModeKind::Verified,
            verifier: None,
            ignore_bots: true,
            case_insensitive: true,
            dot_matches_new_line: true,
        }
    }

    /// Sets a name for diagnostics. Defaults to the pattern.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Verifies messages with `verifier` before matching.
    ///
    /// Without this, verified commands use the shared
    /// [`VerificationPolicy::prefixed`] preset.
    pub fn verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.mode = ModeKind::Verified;
        self.verifier = Some(verifier);
        self
    }

    /// Matches the raw content of any message, skipping verification.
    pub fn any_user(mut self) -> Self {
        self.mode = ModeKind::AnyUser;
        self
    }

    /// Matches the raw content of guild messages and resolves the author's membership.
    pub fn guild_user(mut self) -> Self {
        self.mode = ModeKind::GuildUser;
        self
    }

    /// Whether bot and webhook authors are skipped in unverified modes (default: `true`).
    pub fn ignore_bots(mut self, ignore: bool) -> Self {
        self.ignore_bots = ignore;
        self
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn dot_matches_new_line(mut self, yes: bool) -> Self {
        self.dot_matches_new_line = yes;
        self
    }

    /// Compiles the pattern and attaches the callback.
    pub fn handler<F, Fut>(self, f: F) -> FrameworkResult<Command>
    where
        F: Fn(CommandContext, CommandMatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let callback: CommandFn = Arc::new(move |ctx, m| f(ctx, m).boxed());
        self.build(callback)
    }

    /// Like [`handler`](Self::handler) for an already boxed callback.
    pub fn build(self, callback: CommandFn) -> FrameworkResult<Command> {
        let name = self.name.unwrap_or_else(|| self.pattern.clone());
        let regex = RegexBuilder::new(&self.pattern)
            .case_insensitive(self.case_insensitive)
            .dot_matches_new_line(self.dot_matches_new_line)
            .build()
            .map_err(|source| FrameworkError::InvalidPattern {
                command: name.clone(),
                source,
            })?;

        let mode = match self.mode {
            ModeKind::Verified => match self.verifier {
                Some(verifier) => MatchMode::Verified(verifier),
                None => MatchMode::Verified(VerificationPolicy::shared_prefixed()),
            },
            ModeKind::AnyUser => MatchMode::AnyUser {
                ignore_bots: self.ignore_bots,
            },
            ModeKind::GuildUser => MatchMode::GuildUser {
                ignore_bots: self.ignore_bots,
            },
        };

        Ok(Command {
            name,
            regex,
            mode,
            callback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{ChannelRef, Gateway, GuildMember, LocalGateway, User};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn logged_in() -> Arc<LocalGateway> {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        gw.login("token").await.unwrap();
        gw
    }

    fn request(gw: &Arc<LocalGateway>, author: User, channel: ChannelRef, content: &str) -> DispatchRequest {
        let gateway: BoxedGateway = gw.clone();
        DispatchRequest::new(gateway, Arc::new(Message::new(1, author, channel, content)))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(CommandContext, CommandMatch) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_, _| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_verified_command_matches_stripped_text() {
        let gw = logged_in().await;
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let cmd = Command::builder(r"^say (?P<what>.+)$")
            .handler(move |ctx, m| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    *seen.lock() = Some((ctx.text().to_string(), m.name("what").map(String::from)));
                    Ok(())
                }
            })
            .unwrap();

        let req = request(&gw, User::new(5, "alice"), ChannelRef::guild(10, 20), "!say hello");
        assert!(cmd.process(&req).await.unwrap());
        assert_eq!(
            *seen.lock(),
            Some(("say hello".to_string(), Some("hello".to_string())))
        );
    }

    #[tokio::test]
    async fn test_default_pattern_options() {
        let gw = logged_in().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let cmd = Command::builder(r"^echo .+$").handler(counting(&counter)).unwrap();

        let req = request(&gw, User::new(5, "alice"), ChannelRef::direct(10), "!ECHO line one\nline two");
        assert!(cmd.process(&req).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let strict = Command::builder(r"^echo$")
            .case_insensitive(false)
            .handler(counting(&counter))
            .unwrap();
        let req = request(&gw, User::new(5, "alice"), ChannelRef::direct(10), "!ECHO");
        assert!(!strict.process(&req).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejected_message_skips_callback() {
        let gw = logged_in().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let cmd = Command::builder("^ping$").handler(counting(&counter)).unwrap();

        let req = request(&gw, User::bot(6, "robot"), ChannelRef::guild(10, 20), "!ping");
        assert!(!cmd.process(&req).await.unwrap());
        let req = request(&gw, User::new(5, "alice"), ChannelRef::guild(10, 20), "ping");
        assert!(!cmd.process(&req).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_any_user_matches_raw_content() {
        let gw = logged_in().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let cmd = Command::builder(r"\bhello\b")
            .any_user()
            .handler(counting(&counter))
            .unwrap();

        let req = request(&gw, User::new(5, "alice"), ChannelRef::direct(10), "well hello there");
        assert!(cmd.process(&req).await.unwrap());
        let req = request(&gw, User::bot(6, "robot"), ChannelRef::direct(10), "hello");
        assert!(!cmd.process(&req).await.unwrap());

        let lenient = Command::builder("hello")
            .any_user()
            .ignore_bots(false)
            .handler(counting(&counter))
            .unwrap();
        assert!(lenient.process(&req).await.unwrap());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_guild_user_resolves_member() {
        let gw = logged_in().await;
        gw.add_remote_member(GuildMember::new(20, User::new(5, "alice")));
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let cmd = Command::builder("^roles$")
            .guild_user()
            .handler(move |ctx, _| {
                let seen = Arc::clone(&seen_clone);
                async move {
                    *seen.lock() = ctx.member().map(|m| m.display_name().to_string());
                    Ok(())
                }
            })
            .unwrap();

        let req = request(&gw, User::new(5, "alice"), ChannelRef::guild(10, 20), "roles");
        assert!(cmd.process(&req).await.unwrap());
        assert_eq!(seen.lock().as_deref(), Some("alice"));

        // Not a member of the guild.
        let req = request(&gw, User::new(7, "bob"), ChannelRef::guild(10, 20), "roles");
        assert!(!cmd.process(&req).await.unwrap());
        // Private channel.
        let req = request(&gw, User::new(5, "alice"), ChannelRef::direct(11), "roles");
        assert!(!cmd.process(&req).await.unwrap());
    }

    #[tokio::test]
    async fn test_callback_error_is_reported() {
        let gw = logged_in().await;
        let cmd = Command::builder("^fail$")
            .name("fail")
            .handler(|_, _| async { Err(anyhow::anyhow!("nope")) })
            .unwrap();

        let req = request(&gw, User::new(5, "alice"), ChannelRef::direct(10), "!fail");
        let err = cmd.process(&req).await.unwrap_err();
        assert!(err.is_callback());
        assert_eq!(err.to_string(), "command 'fail' failed: nope");
    }

    #[test]
    fn test_invalid_pattern_fails_fast() {
        let err = Command::builder("(unclosed")
            .name("broken")
            .handler(|_, _| async { Ok(()) })
            .unwrap_err();
        assert!(matches!(err, FrameworkError::InvalidPattern { ref command, .. } if command == "broken"));
    }

    #[test]
    fn test_command_match_groups() {
        let regex = Regex::new(r"^(?P<verb>\w+)(?: (\d+))?$").unwrap();
        let caps = regex.captures("roll").unwrap();
        let m = CommandMatch::from_captures(&regex, &caps);
        assert_eq!(m.full(), "roll");
        assert_eq!(m.name("verb"), Some("roll"));
        assert_eq!(m.get(2), None);
        assert_eq!(m.len(), 3);
    }
}
