//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use herald_core::UserId;
use herald_framework::{HandlerOptions, VerificationPolicy};
use serde::{Deserialize, Serialize};

use super::loader::Profile;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Active profile name (development, production or a custom name).
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Gateway credentials.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Account reported as the bot's author.
    #[serde(default)]
    pub author_id: Option<u64>,

    /// Default command verification.
    #[serde(default)]
    pub commands: CommandsConfig,

    /// Handler scheduling and discovery.
    #[serde(default)]
    pub handlers: HandlersConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            auth: AuthConfig::default(),
            author_id: None,
            commands: CommandsConfig::default(),
            handlers: HandlersConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl HeraldConfig {
    /// The parsed active profile.
    pub fn active_profile(&self) -> Profile {
        Profile::parse(&self.profile)
    }

    /// Options for every handler attached under this configuration.
    pub fn handler_options(&self) -> HandlerOptions {
        HandlerOptions {
            fan_out: self.handlers.fan_out,
            author_id: self.author_id.map(UserId),
            policy: Arc::new(self.commands.to_policy()),
        }
    }
}

fn default_profile() -> String {
    Profile::Development.as_str().to_string()
}

// =============================================================================
// Auth
// =============================================================================

/// Gateway credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Login token. Usually supplied through `HERALD_AUTH__TOKEN`.
    #[serde(default)]
    pub token: Option<Token>,
}

/// A secret login token. Its `Debug` output is redacted.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the gateway.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Empties the token in place.
    pub fn clear(&mut self) {
        self.0.clear();
        self.0.shrink_to_fit();
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

// =============================================================================
// Commands
// =============================================================================

/// Settings of the default verification policy.
///
/// The defaults match [`VerificationPolicy::prefixed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_true")]
    pub ignore_bots: bool,

    #[serde(default = "default_true")]
    pub accept_mention_prefix: bool,

    /// Prefix such as `!`. Empty or absent means no string prefix.
    #[serde(default = "default_string_prefix")]
    pub string_prefix: Option<String>,

    #[serde(default = "default_true")]
    pub accept_guild_messages: bool,

    #[serde(default = "default_true")]
    pub accept_private_messages: bool,

    #[serde(default)]
    pub trim_space_after_string_prefix: bool,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            ignore_bots: true,
            accept_mention_prefix: true,
            string_prefix: default_string_prefix(),
            accept_guild_messages: true,
            accept_private_messages: true,
            trim_space_after_string_prefix: false,
        }
    }
}

impl CommandsConfig {
    /// Builds the policy described by these settings.
    pub fn to_policy(&self) -> VerificationPolicy {
        let builder = VerificationPolicy::builder()
            .ignore_bots(self.ignore_bots)
            .accept_mention_prefix(self.accept_mention_prefix)
            .accept_guild_messages(self.accept_guild_messages)
            .accept_private_messages(self.accept_private_messages)
            .trim_space_after_string_prefix(self.trim_space_after_string_prefix);
        let builder = match self.string_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => builder.string_prefix(prefix),
            _ => builder.no_string_prefix(),
        };
        builder.build()
    }
}

fn default_true() -> bool {
    true
}

fn default_string_prefix() -> Option<String> {
    Some("!".to_string())
}

// =============================================================================
// Handlers
// =============================================================================

/// Handler scheduling and discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlersConfig {
    /// Run hooks on spawned tasks instead of inside the gateway's delivery.
    #[serde(default = "default_true")]
    pub fan_out: bool,

    /// Attach every handler registered with `#[register_handler]`.
    #[serde(default = "default_true")]
    pub auto_discover: bool,

    /// Forward gateway log records to `tracing`.
    #[serde(default = "default_true")]
    pub relay_logs: bool,

    /// How long shutdown waits for running hooks, in milliseconds.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Per-handler settings, keyed by registered handler name.
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            fan_out: true,
            auto_discover: true,
            relay_logs: true,
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            settings: HashMap::new(),
        }
    }
}

fn default_shutdown_timeout_ms() -> u64 {
    5000
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `herald_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let auth = AuthConfig {
            token: Some(Token::new("super-secret")),
        };
        let printed = format!("{auth:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_token_clear() {
        let mut token = Token::new("abc");
        token.clear();
        assert_eq!(token.expose(), "");
        assert!(token.is_blank());
    }

    #[test]
    fn test_default_commands_match_prefixed_preset() {
        assert_eq!(
            CommandsConfig::default().to_policy(),
            VerificationPolicy::prefixed()
        );
    }

    #[test]
    fn test_empty_prefix_means_none() {
        let commands = CommandsConfig {
            string_prefix: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(commands.to_policy().string_prefix(), None);
    }

    #[test]
    fn test_handler_options_from_config() {
        let config = HeraldConfig {
            author_id: Some(42),
            handlers: HandlersConfig {
                fan_out: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let options = config.handler_options();
        assert!(!options.fan_out);
        assert_eq!(options.author_id, Some(UserId(42)));
        assert_eq!(options.policy.string_prefix(), Some("!"));
    }
}
