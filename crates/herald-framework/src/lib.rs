//! # Herald Framework
//!
//! Command dispatch on top of [`herald_core`].
//!
//! This layer provides:
//! - [`Verifier`] and [`VerificationPolicy`]: decide whether a message is a
//!   command and strip its prefix
//! - [`Command`]: a pattern and callback, evaluated in one of three [`MatchMode`]s
//! - [`ProcessorChain`]: ordered, first-match-wins command evaluation
//! - [`Handler`]: relays every gateway event to [`EventHooks`], inline or on
//!   spawned tasks depending on its [`Scheduler`]
//! - [`HANDLERS`]: link-time registry used for automatic handler discovery

pub mod chain;
pub mod command;
pub mod context;
pub mod error;
pub mod handler;
pub mod registry;
pub mod scheduler;
pub mod verifier;

pub use chain::ProcessorChain;
pub use command::{
    Command, CommandBuilder, CommandFn, CommandMatch, CommandProcessor, DispatchRequest, MatchMode,
};
pub use context::CommandContext;
pub use error::{CommandError, CommandResult, FrameworkError, FrameworkResult};
pub use handler::{EventHooks, Handler, HandlerContext, HandlerOptions};
pub use registry::{
    AttachedHandler, Discoverable, HANDLERS, HandlerFactory, HandlerInit, HandlerRegistration,
    registered_handlers,
};
pub use scheduler::{
    FaultObserver, HookFault, HookFuture, InlineScheduler, Scheduler, TaskScheduler,
};
pub use verifier::{PolicyBuilder, Rejection, Verdict, VerificationPolicy, Verifier};

pub use async_trait::async_trait;
pub use linkme;

/// Prelude for writing handlers.
pub mod prelude {
    pub use super::{
        Command, CommandContext, CommandMatch, Discoverable, EventHooks, FrameworkResult,
        HandlerContext, HandlerInit, HandlerOptions, ProcessorChain, VerificationPolicy,
        async_trait,
    };
}
