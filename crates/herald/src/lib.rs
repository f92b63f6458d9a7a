//! # Herald
//!
//! Command dispatch for bots that sit on a chat gateway connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ one listener per kind ┌────────────────────┐
//! │   Gateway   │──────────────────────▶│ Handler "ping"     │──▶ ProcessorChain ──▶ Command
//! │ (platform)  │──────────────────────▶│ Handler "moderate" │──▶ ProcessorChain ──▶ Command
//! └─────────────┘                       └────────────────────┘
//!        ▲
//!        └── login / start / stop ── Bootstrapper
//! ```
//!
//! - **Gateway**: the platform client; delivers events serially ([`core`])
//! - **Handlers**: [`EventHooks`](framework::EventHooks) implementations, each
//!   with its own processor chain; hooks run on spawned tasks by default
//! - **Processor chain**: ordered commands; the first one that matches a
//!   message handles it
//! - **Verifier**: decides whether a message is a command and strips its
//!   prefix
//! - **Bootstrapper**: attaches every handler before connecting ([`runtime`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[register_handler(name = "ping")]
//! struct Ping;
//!
//! #[async_trait]
//! impl EventHooks for Ping {
//!     fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
//!         chain.command("^ping$", |ctx, _| async move {
//!             ctx.reply("pong").await?;
//!             Ok(())
//!         })?;
//!         Ok(())
//!     }
//! }
//!
//! impl Discoverable for Ping {
//!     fn create(_init: &HandlerInit) -> FrameworkResult<Self> {
//!         Ok(Ping)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = connect_to_platform();
//!     Bootstrapper::builder().build(gateway)?.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: read `herald.toml`
//! - `yaml-config`: read `herald.yaml`
//! - `json-config`: read `herald.json`
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

pub use herald_macros::register_handler;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{Bootstrapper, HeraldConfig};

    // Handlers and commands
    pub use herald_framework::prelude::*;
    pub use herald_macros::register_handler;

    // Gateway model
    pub use herald_core::prelude::*;
}
