//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;
use herald_core::GatewayError;
use herald_framework::FrameworkError;

/// Errors that can occur while bootstrapping or running the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the configuration failed.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The gateway refused to log in, start or stop.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// A handler could not be built or attached.
    #[error("Handler error: {0}")]
    Handler(#[from] FrameworkError),

    /// `start` was called while already running.
    #[error("Bootstrapper is already running")]
    AlreadyStarted,

    /// `stop` was called without a successful `start`.
    #[error("Bootstrapper is not running")]
    NotStarted,

    /// No login token is configured, or it was consumed by an earlier login.
    #[error("No login token available; set auth.token or HERALD_AUTH__TOKEN")]
    MissingToken,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
