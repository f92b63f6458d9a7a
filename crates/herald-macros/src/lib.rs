//! Procedural macros for the Herald framework.
//!
//! This crate provides:
//!
//! - `#[register_handler]` - Adds a handler type to the link-time handler registry
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! #[register_handler]
//! struct Moderation;
//!
//! impl Discoverable for Moderation {
//!     fn create(_init: &HandlerInit) -> FrameworkResult<Self> {
//!         Ok(Moderation)
//!     }
//! }
//! ```

mod handler;

use proc_macro::TokenStream;

/// Registers a handler type for automatic discovery.
///
/// The type must implement `herald_framework::Discoverable`. The item is left
/// unchanged; a static entry is appended to `herald_framework::HANDLERS`.
///
/// # Arguments
///
/// - `name = "..."` - Registered name, also the key of the handler's settings
///   section (default: the type name)
/// - `production_only` - Only attach the handler under the production profile
///
/// ```rust,ignore
/// #[register_handler(name = "audit", production_only)]
/// struct AuditLog {
///     channel: ChannelId,
/// }
/// ```
#[proc_macro_attribute]
pub fn register_handler(attr: TokenStream, item: TokenStream) -> TokenStream {
    handler::register_handler(attr, item)
}
