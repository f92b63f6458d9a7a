//! Herald Runtime - configuration, logging and lifecycle for Herald bots.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `HeraldConfig`)
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - The `Bootstrapper`, which attaches handlers and drives the gateway
//!
//! ```ignore
//! use herald_runtime::Bootstrapper;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = connect_to_platform();
//!
//!     // herald.toml + HERALD_* variables, logging initialized from them
//!     let bootstrapper = Bootstrapper::builder().build(gateway)?;
//!
//!     // Run until Ctrl+C
//!     bootstrapper.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use bootstrap::{BootstrapBuilder, Bootstrapper};
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, HeraldConfig, Profile, load_config,
    load_config_from_file, validate_config,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents, init_from_config};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
