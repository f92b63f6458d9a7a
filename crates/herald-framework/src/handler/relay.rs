//! Attaching hooks to a gateway.

use std::sync::Arc;

use futures::FutureExt;
use herald_core::{BoxedGateway, EventKind, EventListener, GatewayEvent, SubscriptionId, listener};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::context::{HandlerContext, HandlerOptions};
use super::traits::{EventHooks, relay};
use crate::chain::ProcessorChain;
use crate::error::FrameworkResult;
use crate::scheduler::{HookFuture, InlineScheduler, Scheduler, TaskScheduler};

/// A set of [`EventHooks`] attached to a gateway.
///
/// Attaching subscribes one relay listener per kind in [`EventKind::ALL`].
/// Each relayed event is handed to the handler's [`Scheduler`], which runs
/// the matching hook.
///
/// Dropping the handler detaches it.
pub struct Handler<H: EventHooks> {
    hooks: Arc<H>,
    context: HandlerContext,
    scheduler: Arc<dyn Scheduler>,
    subscriptions: Mutex<Option<Vec<SubscriptionId>>>,
}

impl<H: EventHooks> Handler<H> {
    /// Builds the handler's commands and subscribes it to `gateway`.
    ///
    /// Hooks run on spawned tasks when `options.fan_out` is set, and inside
    /// the relay otherwise.
    pub fn attach(hooks: H, gateway: BoxedGateway, options: HandlerOptions) -> FrameworkResult<Self> {
        let scheduler: Arc<dyn Scheduler> = if options.fan_out {
            Arc::new(TaskScheduler::new())
        } else {
            Arc::new(InlineScheduler)
        };
        Self::attach_with_scheduler(hooks, gateway, options, scheduler)
    }

    /// Like [`attach`](Self::attach), with an explicit scheduler.
    ///
    /// `options.fan_out` is ignored.
    pub fn attach_with_scheduler(
        hooks: H,
        gateway: BoxedGateway,
        options: HandlerOptions,
        scheduler: Arc<dyn Scheduler>,
    ) -> FrameworkResult<Self> {
        let hooks = Arc::new(hooks);

        let mut chain = ProcessorChain::with_policy(Arc::clone(&options.policy));
        hooks.register_commands(&mut chain)?;
        debug!(handler = hooks.name(), commands = chain.len(), "Commands registered");

        let context = HandlerContext::new(Arc::clone(&gateway), chain, options);

        let subscriptions: Vec<SubscriptionId> = EventKind::ALL
            .iter()
            .map(|&kind| gateway.subscribe(kind, relay_listener(kind, &hooks, &context, &scheduler)))
            .collect();

        info!(
            handler = hooks.name(),
            subscriptions = subscriptions.len(),
            "Handler attached"
        );

        Ok(Self {
            hooks,
            context,
            scheduler,
            subscriptions: Mutex::new(Some(subscriptions)),
        })
    }

    /// Unsubscribes every relay listener and releases the gateway.
    ///
    /// Returns `false` if the handler was already detached. Hooks that were
    /// already scheduled still run with the gateway their event came from;
    /// see [`drain`](Self::drain).
    pub fn detach(&self) -> bool {
        let Some(subscriptions) = self.subscriptions.lock().take() else {
            return false;
        };

        if let Some(gateway) = self.context.release() {
            let removed = subscriptions
                .iter()
                .filter(|&&id| gateway.unsubscribe(id))
                .count();
            info!(handler = self.hooks.name(), removed, "Handler detached");
        }
        true
    }

    pub fn is_attached(&self) -> bool {
        self.subscriptions.lock().is_some()
    }

    pub fn hooks(&self) -> &Arc<H> {
        &self.hooks
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// Number of hook invocations still running.
    pub fn in_flight(&self) -> usize {
        self.scheduler.in_flight()
    }

    /// Waits for running hook invocations to finish.
    pub async fn drain(&self) {
        self.scheduler.drain().await;
    }
}

impl<H: EventHooks> Drop for Handler<H> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<H: EventHooks> std::fmt::Debug for Handler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("hooks", &self.hooks.name())
            .field("attached", &self.is_attached())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

fn relay_listener<H: EventHooks>(
    kind: EventKind,
    hooks: &Arc<H>,
    context: &HandlerContext,
    scheduler: &Arc<dyn Scheduler>,
) -> EventListener {
    let hooks = Arc::clone(hooks);
    let context = context.clone();
    let scheduler = Arc::clone(scheduler);

    listener(move |event: GatewayEvent| {
        let hooks = Arc::clone(&hooks);
        let ctx = context.for_event();
        let scheduler = Arc::clone(&scheduler);
        async move {
            let Some(ctx) = ctx else {
                return Ok(());
            };
            let task: HookFuture = async move { relay(hooks.as_ref(), &ctx, event).await }.boxed();
            scheduler.schedule(kind, task).await
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::HookFault;
    use async_trait::async_trait;
    use herald_core::{ChannelRef, Gateway, GuildMember, LocalGateway, Message, User};
    use std::time::Duration;

    type Timeline = Arc<Mutex<Vec<String>>>;

    /// Records hook entry and exit; `ready` takes 100ms.
    struct Recorder {
        timeline: Timeline,
    }

    #[async_trait]
    impl EventHooks for Recorder {
        fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
            chain.command("^ping$", |ctx, _| async move {
                ctx.reply("pong").await?;
                Ok(())
            })?;
            Ok(())
        }

        async fn on_ready(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
            self.timeline.lock().push("ready:start".into());
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.timeline.lock().push("ready:end".into());
            Ok(())
        }

        async fn on_connected(&self, _ctx: &HandlerContext) -> anyhow::Result<()> {
            self.timeline.lock().push("connected:start".into());
            self.timeline.lock().push("connected:end".into());
            Ok(())
        }

        async fn on_user_joined(&self, _ctx: &HandlerContext, member: GuildMember) -> anyhow::Result<()> {
            anyhow::bail!("cannot greet {}", member.user.name)
        }
    }

    fn recorder() -> (Recorder, Timeline) {
        let timeline = Timeline::default();
        (
            Recorder {
                timeline: Arc::clone(&timeline),
            },
            timeline,
        )
    }

    async fn gateway() -> Arc<LocalGateway> {
        let gw = Arc::new(LocalGateway::new(User::bot(1000, "herald")));
        gw.login("token").await.unwrap();
        gw
    }

    fn user_message(content: &str) -> Message {
        Message::new(1, User::new(5, "alice"), ChannelRef::guild(10, 20), content)
    }

    #[tokio::test]
    async fn test_attach_subscribes_every_kind_once() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let handler = Handler::attach(hooks, gw.clone(), HandlerOptions::default()).unwrap();

        assert_eq!(gw.total_subscribers(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            assert_eq!(gw.subscriber_count(kind), 1, "{kind}");
        }
        assert_eq!(gw.subscriber_count(EventKind::Log), 0);

        assert!(handler.detach());
        assert_eq!(gw.total_subscribers(), 0);
        assert!(!handler.detach());
        assert!(!handler.is_attached());
        assert!(handler.context().is_released());
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let handler = Handler::attach(hooks, gw.clone(), HandlerOptions::default()).unwrap();
        assert_eq!(gw.total_subscribers(), 35);
        drop(handler);
        assert_eq!(gw.total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_message_runs_through_chain_inline() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let _handler =
            Handler::attach(hooks, gw.clone(), HandlerOptions::default().fan_out(false)).unwrap();

        let delivery = gw.emit_message(user_message("!ping")).await;
        assert!(delivery.is_clean());
        let sent = gw.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "pong");

        gw.emit_message(user_message("ping")).await;
        assert_eq!(gw.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn test_message_runs_through_chain_fanned_out() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let _handler = Handler::attach(hooks, gw.clone(), HandlerOptions::default()).unwrap();

        gw.emit_message(user_message("!ping")).await;
        let sent = gw.wait_for_sent(1).await;
        assert_eq!(sent[0].content, "pong");
    }

    #[tokio::test(start_paused = true)]
    async fn test_inline_hooks_run_in_delivery_order() {
        let gw = gateway().await;
        let (hooks, timeline) = recorder();
        let _handler =
            Handler::attach(hooks, gw.clone(), HandlerOptions::default().fan_out(false)).unwrap();

        gw.emit(GatewayEvent::Ready).await;
        gw.emit(GatewayEvent::Connected).await;

        assert_eq!(
            *timeline.lock(),
            vec!["ready:start", "ready:end", "connected:start", "connected:end"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_does_not_block_delivery() {
        let gw = gateway().await;
        let (hooks, timeline) = recorder();
        let handler = Handler::attach(hooks, gw.clone(), HandlerOptions::default()).unwrap();

        gw.emit(GatewayEvent::Ready).await;
        gw.emit(GatewayEvent::Connected).await;
        assert_eq!(handler.in_flight(), 2);

        handler.drain().await;
        assert_eq!(handler.in_flight(), 0);
        let timeline = timeline.lock().clone();
        assert_eq!(timeline.len(), 4);
        assert_eq!(timeline.last().map(String::as_str), Some("ready:end"));
    }

    #[tokio::test]
    async fn test_inline_fault_reaches_gateway() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let _handler =
            Handler::attach(hooks, gw.clone(), HandlerOptions::default().fan_out(false)).unwrap();

        let member = GuildMember::new(20, User::new(5, "alice"));
        let delivery = gw.emit(GatewayEvent::UserJoined(member)).await;
        assert_eq!(delivery.faults.len(), 1);
        assert_eq!(delivery.faults[0].to_string(), "cannot greet alice");
    }

    #[tokio::test]
    async fn test_fanned_out_fault_goes_to_observer() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let scheduler = Arc::new(TaskScheduler::with_observer(Arc::new(move |fault: HookFault| {
            sink.lock().push(fault.to_string());
        })));
        let handler =
            Handler::attach_with_scheduler(hooks, gw.clone(), HandlerOptions::default(), scheduler)
                .unwrap();

        let member = GuildMember::new(20, User::new(5, "alice"));
        let delivery = gw.emit(GatewayEvent::UserJoined(member)).await;
        assert!(delivery.is_clean());

        handler.drain().await;
        assert_eq!(
            *faults.lock(),
            vec!["user_joined hook failed: cannot greet alice".to_string()]
        );

        // Relaying continues after a fault.
        gw.emit_message(user_message("!ping")).await;
        assert_eq!(gw.wait_for_sent(1).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_registration_aborts_attach() {
        struct Broken;

        #[async_trait]
        impl EventHooks for Broken {
            fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
                chain.command("(", |_, _| async { Ok(()) })?;
                Ok(())
            }
        }

        let gw = gateway().await;
        let result = Handler::attach(Broken, gw.clone(), HandlerOptions::default());
        assert!(result.is_err());
        assert_eq!(gw.total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_overridden_message_hook_skips_chain() {
        struct Silent;

        #[async_trait]
        impl EventHooks for Silent {
            fn register_commands(&self, chain: &mut ProcessorChain) -> FrameworkResult<()> {
                chain.command("^ping$", |ctx, _| async move {
                    ctx.reply("pong").await?;
                    Ok(())
                })?;
                Ok(())
            }

            async fn on_message_received(
                &self,
                _ctx: &HandlerContext,
                _message: Arc<Message>,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let gw = gateway().await;
        let _handler =
            Handler::attach(Silent, gw.clone(), HandlerOptions::default().fan_out(false)).unwrap();
        gw.emit_message(user_message("!ping")).await;
        assert!(gw.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_detach_lets_scheduled_commands_reply() {
        let gw = gateway().await;
        let (hooks, _) = recorder();
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let scheduler = Arc::new(TaskScheduler::with_observer(Arc::new(move |fault: HookFault| {
            sink.lock().push(fault.to_string());
        })));
        let handler =
            Handler::attach_with_scheduler(hooks, gw.clone(), HandlerOptions::default(), scheduler)
                .unwrap();

        gw.emit_message(user_message("!ping")).await;
        assert!(handler.detach());
        handler.drain().await;

        assert!(faults.lock().is_empty(), "{:?}", faults.lock());
        let sent = gw.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "pong");
        assert_eq!(gw.total_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_events_after_detach_are_not_relayed() {
        let gw = gateway().await;
        let (hooks, timeline) = recorder();
        let handler =
            Handler::attach(hooks, gw.clone(), HandlerOptions::default().fan_out(false)).unwrap();
        handler.detach();

        let delivery = gw.emit(GatewayEvent::Connected).await;
        assert_eq!(delivery.delivered, 0);
        assert!(timeline.lock().is_empty());
    }
}
