//! Bringing a bot up and down.
//!
//! The [`Bootstrapper`] owns the gateway connection for the lifetime of the
//! process. Starting it attaches every handler, then logs in and opens the
//! connection, so no event is delivered before the handlers are listening.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::Bootstrapper;
//!
//! // Loads herald.toml and HERALD_* variables, initializes logging
//! let bootstrapper = Bootstrapper::builder().build(gateway)?;
//! bootstrapper.run().await?;
//! ```
//!
//! Handlers annotated with `#[register_handler]` are picked up automatically.
//! Others can be added by type:
//!
//! ```rust,ignore
//! let bootstrapper = Bootstrapper::new(config, gateway).handler::<Ping>("ping");
//! ```

use std::any::TypeId;
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use herald_core::{
    BoxedGateway, EventKind, EventListener, Gateway, GatewayEvent, LogRecord, LogSeverity,
    SubscriptionId, listener,
};
use herald_framework::{
    AttachedHandler, Discoverable, HandlerInit, HandlerRegistration, registered_handlers,
};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigLoader, HeraldConfig, Token, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

#[derive(Default)]
struct State {
    running: bool,
    handlers: Vec<Box<dyn AttachedHandler>>,
    log_relay: Option<SubscriptionId>,
    /// Present until the first login attempt.
    token: Option<Token>,
}

/// Attaches handlers to a gateway and drives its lifecycle.
pub struct Bootstrapper {
    /// Configuration with the token removed.
    config: HeraldConfig,
    gateway: BoxedGateway,
    registrations: Vec<HandlerRegistration>,
    state: Mutex<State>,
}

impl Bootstrapper {
    /// Creates a bootstrapper for `gateway`.
    ///
    /// The token is moved out of `config`; [`config`](Self::config) never
    /// exposes it.
    pub fn new(mut config: HeraldConfig, gateway: BoxedGateway) -> Self {
        let token = config.auth.token.take();
        Self {
            config,
            gateway,
            registrations: Vec::new(),
            state: Mutex::new(State {
                token,
                ..Default::default()
            }),
        }
    }

    /// Loads configuration from files and the environment.
    pub fn builder() -> BootstrapBuilder {
        BootstrapBuilder::new()
    }

    /// Adds a handler registration next to the discovered ones.
    pub fn register(mut self, registration: HandlerRegistration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Adds handler type `H` under `name`.
    pub fn handler<H: Discoverable>(self, name: &'static str) -> Self {
        self.register(HandlerRegistration::of::<H>(name, false))
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn gateway(&self) -> &BoxedGateway {
        &self.gateway
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// Whether a login token is still held.
    pub async fn has_token(&self) -> bool {
        self.state.lock().await.token.is_some()
    }

    /// Names of the handlers that [`start`](Self::start) will attach.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.discover().iter().map(|r| r.name).collect()
    }

    /// Explicit registrations first, then the link-time ones.
    ///
    /// Production-only handlers are skipped outside the production profile
    /// and each handler type is kept once.
    fn discover(&self) -> Vec<HandlerRegistration> {
        let production = self.config.active_profile().is_production();
        let discovered: &[HandlerRegistration] = if self.config.handlers.auto_discover {
            registered_handlers()
        } else {
            &[]
        };

        let mut seen = HashSet::<TypeId>::new();
        let mut selected = Vec::new();
        for registration in self.registrations.iter().chain(discovered) {
            if registration.production_only && !production {
                trace!(handler = registration.name, "Skipping production-only handler");
                continue;
            }
            if !seen.insert(registration.handler_type()) {
                trace!(handler = registration.name, "Skipping duplicate handler registration");
                continue;
            }
            selected.push(*registration);
        }
        selected
    }

    /// Attaches handlers, logs in and starts the gateway.
    ///
    /// The token is cleared after the login attempt, whatever its outcome.
    /// On failure everything attached so far is detached again.
    pub async fn start(&self) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        if state.running {
            return Err(RuntimeError::AlreadyStarted);
        }
        if state.token.is_none() {
            return Err(RuntimeError::MissingToken);
        }

        info!(profile = %self.config.profile, "Starting Herald");

        if self.config.handlers.relay_logs {
            state.log_relay = Some(self.gateway.subscribe(EventKind::Log, log_relay()));
        }

        if let Err(e) = self.connect(&mut state).await {
            error!(error = %e, "Startup failed");
            self.rollback(&mut state).await;
            return Err(e);
        }

        state.running = true;
        info!(handlers = state.handlers.len(), "Herald started");
        Ok(())
    }

    async fn connect(&self, state: &mut State) -> RuntimeResult<()> {
        state.handlers = self.attach_handlers()?;

        let mut token = state.token.take().ok_or(RuntimeError::MissingToken)?;
        let login = self.gateway.login(token.expose()).await;
        token.clear();
        login?;

        self.gateway.start().await?;
        Ok(())
    }

    fn attach_handlers(&self) -> RuntimeResult<Vec<Box<dyn AttachedHandler>>> {
        let options = self.config.handler_options();
        let mut attached = Vec::new();

        for registration in self.discover() {
            let settings = self
                .config
                .handlers
                .settings
                .get(registration.name)
                .cloned()
                .unwrap_or_default();
            let init = HandlerInit::new(registration.name, Arc::clone(&self.gateway), options.clone())
                .with_settings(settings);

            let handler = registration.instantiate(init).inspect_err(|e| {
                error!(handler = registration.name, error = %e, "Failed to attach handler");
            })?;
            debug!(handler = registration.name, "Handler ready");
            attached.push(handler);
        }

        Ok(attached)
    }

    async fn rollback(&self, state: &mut State) {
        for handler in state.handlers.drain(..) {
            handler.detach();
        }
        if self.gateway.current_user().is_some()
            && let Err(e) = self.gateway.stop().await
        {
            warn!(error = %e, "Failed to stop gateway during rollback");
        }
        if let Some(id) = state.log_relay.take() {
            self.gateway.unsubscribe(id);
        }
    }

    /// Detaches handlers, waits for their running hooks, then stops the
    /// gateway.
    ///
    /// The wait is bounded by `handlers.shutdown_timeout_ms`; hooks still
    /// running after it are left to finish on their own.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Err(RuntimeError::NotStarted);
        }
        state.running = false;

        info!("Stopping Herald");

        for handler in &state.handlers {
            handler.detach();
        }

        let handlers = std::mem::take(&mut state.handlers);
        let timeout = Duration::from_millis(self.config.handlers.shutdown_timeout_ms);
        let drain = join_all(handlers.iter().map(|h| h.drain()));
        if tokio::time::timeout(timeout, drain).await.is_err() {
            let in_flight: usize = handlers.iter().map(|h| h.in_flight()).sum();
            warn!(
                in_flight,
                timeout_ms = self.config.handlers.shutdown_timeout_ms,
                "Timed out waiting for handler tasks"
            );
        }

        let stopped = self.gateway.stop().await;
        if let Some(id) = state.log_relay.take() {
            self.gateway.unsubscribe(id);
        }

        stopped?;
        info!("Herald stopped");
        Ok(())
    }

    /// Starts, waits for Ctrl+C or SIGTERM, then stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Herald is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await
    }

    /// Starts, waits for `shutdown`, then stops.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }
}

impl Drop for Bootstrapper {
    fn drop(&mut self) {
        if let Some(id) = self.state.get_mut().log_relay.take() {
            self.gateway.unsubscribe(id);
        }
    }
}

impl std::fmt::Debug for Bootstrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrapper")
            .field("config", &self.config)
            .field("registrations", &self.registrations)
            .finish_non_exhaustive()
    }
}

fn log_relay() -> EventListener {
    listener(|event: GatewayEvent| async move {
        if let GatewayEvent::Log(record) = event {
            relay_log(&record);
        }
        Ok(())
    })
}

fn relay_log(record: &LogRecord) {
    let source = record.source.as_str();
    let message = record.message.as_str();
    match record.severity {
        LogSeverity::Critical | LogSeverity::Error => {
            error!(target: "herald::gateway", source, "{message}")
        }
        LogSeverity::Warning => warn!(target: "herald::gateway", source, "{message}"),
        LogSeverity::Info => info!(target: "herald::gateway", source, "{message}"),
        LogSeverity::Verbose => debug!(target: "herald::gateway", source, "{message}"),
        LogSeverity::Debug => trace!(target: "herald::gateway", source, "{message}"),
    }
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = wait_for_ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                wait_for_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// BootstrapBuilder
// =============================================================================

/// Builds a [`Bootstrapper`] from layered configuration.
///
/// `build` loads and validates the configuration and initializes logging
/// from its `logging` section.
///
/// ```rust,ignore
/// let bootstrapper = Bootstrapper::builder()
///     .config_file("deploy/herald.toml")
///     .profile("production")
///     .build(gateway)?;
/// ```
pub struct BootstrapBuilder {
    config_loader: ConfigLoader,
}

impl BootstrapBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
        }
    }

    /// Loads this file instead of searching for one.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` as the lowest configuration layer.
    pub fn base(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.base(config);
        self
    }

    /// Overrides one dotted key above every other source.
    pub fn set<T: serde::Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    pub fn build(self, gateway: BoxedGateway) -> RuntimeResult<Bootstrapper> {
        let config = self.config_loader.load()?;
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        info!(
            profile = %config.profile,
            log_level = %config.logging.level,
            "Configuration loaded"
        );
        Ok(Bootstrapper::new(config, gateway))
    }
}

impl Default for BootstrapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
