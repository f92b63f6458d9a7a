//! Ordered command evaluation.
//!
//! A [`ProcessorChain`] holds the processors of one handler. Dispatch walks
//! them in registration order and stops at the first one that handles the
//! message:
//!
//! 1. each processor is asked in turn whether it handles the message
//! 2. the first `Ok(true)` ends the walk; later processors are not evaluated
//! 3. an error also ends the walk and is returned to the caller
//!
//! ```rust,ignore
//! use herald_framework::ProcessorChain;
//!
//! let mut chain = ProcessorChain::new();
//! chain.command("^ping$", |ctx, _| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! })?;
//!
//! let handled = chain.dispatch(&gateway, message).await?;
//! ```
//!
//! The chain also implements `tower::Service<DispatchRequest>`, so dispatch
//! can be wrapped in tower middleware such as timeouts.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use herald_core::{BoxedGateway, Message};
use tower::Service;
use tracing::{Instrument, debug, debug_span, trace, trace_span};

use crate::command::{Command, CommandMatch, CommandProcessor, DispatchRequest};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult, FrameworkResult};
use crate::verifier::VerificationPolicy;

#[derive(Clone)]
struct ChainInner {
    processors: Vec<Arc<dyn CommandProcessor>>,
    default_policy: Arc<VerificationPolicy>,
}

/// An ordered, first-match-wins list of command processors.
///
/// Cloning is cheap; clones share processors until one of them is modified.
#[derive(Clone)]
pub struct ProcessorChain {
    inner: Arc<ChainInner>,
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorChain {
    /// Creates an empty chain whose verified commands use the shared prefixed preset.
    pub fn new() -> Self {
        Self::with_policy(VerificationPolicy::shared_prefixed())
    }

    /// Creates an empty chain whose [`command`](Self::command) shorthand uses `policy`.
    pub fn with_policy(policy: Arc<VerificationPolicy>) -> Self {
        Self {
            inner: Arc::new(ChainInner {
                processors: Vec::new(),
                default_policy: policy,
            }),
        }
    }

    fn inner_mut(&mut self) -> &mut ChainInner {
        Arc::make_mut(&mut self.inner)
    }

    /// Appends a processor. It is evaluated after every processor added before it.
    pub fn push(&mut self, processor: impl CommandProcessor + 'static) -> &mut Self {
        self.push_arc(Arc::new(processor))
    }

    /// Appends an already shared processor.
    pub fn push_arc(&mut self, processor: Arc<dyn CommandProcessor>) -> &mut Self {
        self.inner_mut().processors.push(processor);
        self
    }

    /// Adds a verified command that uses the chain's default policy.
    ///
    /// Fails if `pattern` is not a valid regular expression.
    pub fn command<F, Fut>(&mut self, pattern: &str, f: F) -> FrameworkResult<&mut Self>
    where
        F: Fn(CommandContext, CommandMatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let policy = Arc::clone(&self.inner.default_policy);
        let command = Command::builder(pattern).verifier(policy).handler(f)?;
        Ok(self.push(command))
    }

    /// The policy used by [`command`](Self::command).
    pub fn default_policy(&self) -> &Arc<VerificationPolicy> {
        &self.inner.default_policy
    }

    pub fn len(&self) -> usize {
        self.inner.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.processors.is_empty()
    }

    /// Processor names in evaluation order.
    pub fn names(&self) -> Vec<&str> {
        self.inner.processors.iter().map(|p| p.name()).collect()
    }

    /// Evaluates `message` against the processors in order.
    ///
    /// Returns `Ok(true)` if a processor handled it and `Ok(false)` if none
    /// matched. At most one callback runs per call.
    pub async fn dispatch(
        &self,
        gateway: &BoxedGateway,
        message: Arc<Message>,
    ) -> CommandResult<bool> {
        let span = debug_span!("dispatch", message = %message.id, author = %message.author.id);
        let request = DispatchRequest::new(Arc::clone(gateway), message);
        self.run(&request).instrument(span).await
    }

    async fn run(&self, request: &DispatchRequest) -> CommandResult<bool> {
        for processor in &self.inner.processors {
            let span = trace_span!("command", name = processor.name());
            if processor.process(request).instrument(span).await? {
                debug!(command = processor.name(), "Message handled");
                return Ok(true);
            }
        }
        trace!(processors = self.len(), "No command matched");
        Ok(false)
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}

// ============================================================================
// Tower Service
// ============================================================================

/// ```rust,ignore
/// use std::time::Duration;
/// use tower::{ServiceBuilder, ServiceExt};
///
/// let service = ServiceBuilder::new()
///     .timeout(Duration::from_secs(5))
///     .service(chain);
/// let handled = service.oneshot(DispatchRequest::new(gateway, message)).await?;
/// ```
impl Service<DispatchRequest> for ProcessorChain {
    type Response = bool;
    type Error = CommandError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: DispatchRequest) -> Self::Future {
        let chain = self.clone();
        Box::pin(async move { chain.dispatch(&request.gateway, request.message).await })
    }
}
