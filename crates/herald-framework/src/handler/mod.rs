//! Event relay for handlers.
//!
//! A handler is any type implementing [`EventHooks`]. Wrapping it in a
//! [`Handler`] attaches it to a gateway:
//!
//! ```text
//! gateway ──GatewayEvent──▶ relay listener ──▶ Scheduler ──▶ EventHooks::on_*
//!                                                             │
//!                                   on_message_received ──────┴──▶ ProcessorChain
//! ```
//!
//! - **Hooks** ([`traits`]): one overridable async method per event kind
//! - **Context** ([`context`]): the gateway, chain, options and lazily
//!   resolved author shared by all hooks of one handler
//! - **Relay** ([`relay`]): subscription bookkeeping and scheduling
//!
//! ```rust,ignore
//! let handler = Handler::attach(MyHooks::default(), gateway, HandlerOptions::default())?;
//! // ...
//! handler.detach();
//! handler.drain().await;
//! ```

pub mod context;
pub mod relay;
pub mod traits;

pub use context::{HandlerContext, HandlerOptions};
pub use relay::Handler;
pub use traits::EventHooks;
