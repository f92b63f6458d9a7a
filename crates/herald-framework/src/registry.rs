//! Link-time handler registry.
//!
//! Handler types register themselves into the [`HANDLERS`] distributed slice,
//! usually through `#[register_handler]` from `herald-macros`. A bootstrapper
//! walks the slice at startup and attaches one instance of each.
//!
//! ```rust,ignore
//! use herald_framework::prelude::*;
//!
//! #[register_handler]
//! struct Ping;
//!
//! impl Discoverable for Ping {
//!     fn create(_init: &HandlerInit) -> FrameworkResult<Self> {
//!         Ok(Ping)
//!     }
//! }
//! ```

use std::any::TypeId;

use async_trait::async_trait;
use herald_core::BoxedGateway;
use linkme::distributed_slice;
use serde::de::DeserializeOwned;

use crate::error::{FrameworkError, FrameworkResult};
use crate::handler::{EventHooks, Handler, HandlerOptions};

/// What a discoverable handler is built from.
#[derive(Clone)]
pub struct HandlerInit {
    /// Registered name of the handler being built.
    pub name: &'static str,
    pub gateway: BoxedGateway,
    pub options: HandlerOptions,
    /// The handler's own settings section, `Null` if none was configured.
    pub settings: serde_json::Value,
}

impl HandlerInit {
    pub fn new(name: &'static str, gateway: BoxedGateway, options: HandlerOptions) -> Self {
        Self {
            name,
            gateway,
            options,
            settings: serde_json::Value::Null,
        }
    }

    pub fn with_settings(mut self, settings: serde_json::Value) -> Self {
        self.settings = settings;
        self
    }

    /// Deserializes the settings section.
    ///
    /// A missing section is read as an empty table, so types whose fields
    /// all have serde defaults need no configuration.
    pub fn settings<T: DeserializeOwned>(&self) -> FrameworkResult<T> {
        let value = match &self.settings {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|source| FrameworkError::Settings {
            handler: self.name.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for HandlerInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerInit")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("settings", &self.settings)
            .finish()
    }
}

/// A handler type that can build itself for automatic registration.
pub trait Discoverable: EventHooks + Sized {
    fn create(init: &HandlerInit) -> FrameworkResult<Self>;
}

/// Type-erased view of an attached [`Handler`].
#[async_trait]
pub trait AttachedHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn detach(&self) -> bool;

    fn is_attached(&self) -> bool;

    fn in_flight(&self) -> usize;

    async fn drain(&self);
}

#[async_trait]
impl<H: EventHooks> AttachedHandler for Handler<H> {
    fn name(&self) -> &'static str {
        self.hooks().name()
    }

    fn detach(&self) -> bool {
        Handler::detach(self)
    }

    fn is_attached(&self) -> bool {
        Handler::is_attached(self)
    }

    fn in_flight(&self) -> usize {
        Handler::in_flight(self)
    }

    async fn drain(&self) {
        Handler::drain(self).await;
    }
}

/// Builds and attaches a handler.
pub type HandlerFactory = fn(HandlerInit) -> FrameworkResult<Box<dyn AttachedHandler>>;

/// One entry in [`HANDLERS`].
#[derive(Clone, Copy)]
pub struct HandlerRegistration {
    /// Name used in logs and as the key of the handler's settings section.
    pub name: &'static str,
    /// Only attach this handler under the production profile.
    pub production_only: bool,
    type_key: fn() -> TypeId,
    factory: HandlerFactory,
}

impl HandlerRegistration {
    /// Registration for handler type `H`.
    pub const fn of<H: Discoverable>(name: &'static str, production_only: bool) -> Self {
        Self {
            name,
            production_only,
            type_key: TypeId::of::<H>,
            factory: instantiate::<H>,
        }
    }

    /// Identity of the registered type; two registrations of one type compare equal.
    pub fn handler_type(&self) -> TypeId {
        (self.type_key)()
    }

    /// Builds the handler and attaches it to `init.gateway`.
    pub fn instantiate(&self, init: HandlerInit) -> FrameworkResult<Box<dyn AttachedHandler>> {
        (self.factory)(init)
    }
}

impl std::fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("name", &self.name)
            .field("production_only", &self.production_only)
            .finish()
    }
}

fn instantiate<H: Discoverable>(init: HandlerInit) -> FrameworkResult<Box<dyn AttachedHandler>> {
    let hooks = H::create(&init)?;
    let handler = Handler::attach(hooks, init.gateway, init.options)?;
    Ok(Box::new(handler))
}

/// Every handler registered at link time.
#[distributed_slice]
pub static HANDLERS: [HandlerRegistration];

/// Returns the registrations collected in [`HANDLERS`].
pub fn registered_handlers() -> &'static [HandlerRegistration] {
    &HANDLERS
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::{EventKind, LocalGateway, User};
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize)]
    struct GreeterSettings {
        #[serde(default = "default_greeting")]
        greeting: String,
    }

    fn default_greeting() -> String {
        "hello".to_string()
    }

    struct Greeter {
        greeting: String,
    }

    impl EventHooks for Greeter {}

    impl Discoverable for Greeter {
        fn create(init: &HandlerInit) -> FrameworkResult<Self> {
            let settings: GreeterSettings = init.settings()?;
            Ok(Self {
                greeting: settings.greeting,
            })
        }
    }

    #[distributed_slice(HANDLERS)]
    static GREETER: HandlerRegistration = HandlerRegistration::of::<Greeter>("greeter", false);

    fn init(gw: &Arc<LocalGateway>) -> HandlerInit {
        let gateway: BoxedGateway = gw.clone();
        HandlerInit::new("greeter", gateway, HandlerOptions::default().fan_out(false))
    }

    #[test]
    fn test_slice_contains_registration() {
        let found = registered_handlers()
            .iter()
            .find(|r| r.name == "greeter")
            .expect("greeter registered");
        assert!(!found.production_only);
        assert_eq!(found.handler_type(), TypeId::of::<Greeter>());
    }

    #[tokio::test]
    async fn test_instantiate_attaches_handler() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        let handler = GREETER.instantiate(init(&gw)).unwrap();

        assert!(handler.is_attached());
        assert!(handler.name().ends_with("Greeter"));
        assert_eq!(gw.subscriber_count(EventKind::MessageReceived), 1);

        assert!(handler.detach());
        assert_eq!(gw.total_subscribers(), 0);
    }

    #[test]
    fn test_settings_defaults_and_overrides() {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));

        let built = Greeter::create(&init(&gw)).unwrap();
        assert_eq!(built.greeting, "hello");

        let custom = init(&gw).with_settings(serde_json::json!({ "greeting": "hi" }));
        assert_eq!(Greeter::create(&custom).unwrap().greeting, "hi");

        let broken = init(&gw).with_settings(serde_json::json!({ "greeting": 5 }));
        let err = Greeter::create(&broken).err().unwrap();
        assert!(matches!(err, FrameworkError::Settings { ref handler, .. } if handler == "greeter"));
    }
}
