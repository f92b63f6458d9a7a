//! Error types for gateway operations.

use thiserror::Error;

use crate::model::{ChannelId, GuildId, UserId};

/// Boxed error returned by event listeners.
///
/// Listeners sit on the boundary between the gateway and arbitrary
/// application code, so their failures are type-erased here.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of delivering one event to one listener.
pub type HookResult = Result<(), BoxError>;

/// Errors that can occur while talking to the chat gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// An operation requires an authenticated session.
    #[error("gateway is not logged in")]
    NotLoggedIn,

    /// `start` was called on a connection that is already running.
    #[error("gateway connection already started")]
    AlreadyStarted,

    /// The token was rejected.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// Why the token was rejected.
        reason: String,
    },

    /// The target channel does not exist or is not visible.
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),

    /// Sending a message failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Downloading a guild member failed.
    #[error("failed to download member {user} of guild {guild}: {reason}")]
    MemberDownload {
        /// Guild the member was requested from.
        guild: GuildId,
        /// Requested user.
        user: UserId,
        /// Reason for failure.
        reason: String,
    },

    /// Underlying connection failure.
    #[error("connection error: {0}")]
    Connection(String),
}

impl GatewayError {
    /// Creates an invalid token error.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// Creates a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
