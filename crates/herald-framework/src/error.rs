//! Error types for the Herald framework.

use herald_core::GatewayError;
use thiserror::Error;

/// Errors raised while processing a message against a command.
///
/// A verification rejection or a pattern mismatch is not an error: those
/// surface as `Ok(false)` from [`CommandProcessor::process`](crate::CommandProcessor::process).
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command matched and its callback returned an error.
    #[error("command '{command}' failed: {source}")]
    Callback {
        /// Name of the command whose callback failed.
        command: String,
        /// Error produced by the callback.
        #[source]
        source: anyhow::Error,
    },

    /// A gateway lookup needed to evaluate the command failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl CommandError {
    /// Returns true if the error came out of a command callback.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback { .. })
    }
}

/// Result type for command processing.
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised while setting up or running a handler.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// A command pattern failed to compile.
    #[error("invalid pattern for command '{command}': {source}")]
    InvalidPattern {
        /// Name of the offending command.
        command: String,
        #[source]
        source: regex::Error,
    },

    /// A handler failed to register its commands or to build itself.
    #[error("handler setup failed: {0}")]
    Setup(String),

    /// Handler settings could not be deserialized.
    #[error("invalid settings for handler '{handler}': {source}")]
    Settings {
        handler: String,
        #[source]
        source: serde_json::Error,
    },

    /// The handler has been detached and no longer holds a connection.
    #[error("handler is detached from its gateway")]
    Detached,
}

impl FrameworkError {
    /// Creates a setup error.
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }
}

/// Result type for framework operations.
pub type FrameworkResult<T> = Result<T, FrameworkError>;
