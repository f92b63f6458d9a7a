//! # Herald Core
//!
//! Foundation types for the Herald command framework.
//!
//! This crate defines the boundary between the dispatch layer and the chat
//! platform client:
//!
//! - **Model**: identifiers and entity snapshots ([`User`], [`Message`], [`GuildMember`], ...)
//! - **Events**: the [`GatewayEvent`] enum and its [`EventKind`] subscription keys
//! - **Gateway**: the [`Gateway`] trait every platform client implements
//! - **Local gateway**: [`LocalGateway`], an in-process implementation
//!
//! ```text
//! ┌───────────────┐ subscribe(kind, listener) ┌───────────┐
//! │    Gateway    │◀──────────────────────────│  Handler  │
//! │ (platform io) │──────── GatewayEvent ────▶│  (relay)  │
//! └───────────────┘                           └───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use herald_core::{EventKind, Gateway, LocalGateway, User, listener};
//!
//! let gateway = LocalGateway::new(User::bot(1, "herald"));
//! gateway.subscribe(EventKind::Ready, listener(|_| async {
//!     println!("ready");
//!     Ok(())
//! }));
//! gateway.login("token").await?;
//! gateway.start().await?;
//! ```

pub mod error;
pub mod event;
pub mod gateway;
pub mod local;
pub mod model;

pub use error::{BoxError, GatewayError, GatewayResult, HookResult};
pub use event::{EventKind, GatewayEvent};
pub use gateway::{BoxedGateway, EventListener, Gateway, SubscriptionId, listener};
pub use local::{Delivery, LocalGateway, SentMessage};
pub use model::{
    Channel, ChannelId, ChannelKind, ChannelRef, GroupUser, Guild, GuildId, GuildMember,
    LogRecord, LogSeverity, Message, MessageId, Reaction, Role, RoleId, User, UserId,
    VoiceServer, VoiceState,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::event::{EventKind, GatewayEvent};
    pub use super::gateway::{BoxedGateway, Gateway};
    pub use super::model::*;
}
