//! Hook scheduling strategies.
//!
//! A handler hands every hook invocation to a [`Scheduler`]. Two strategies
//! are provided:
//!
//! | Scheduler           | Relay waits for the hook | Hook faults go to          |
//! |---------------------|--------------------------|----------------------------|
//! | [`InlineScheduler`] | yes                      | the gateway's delivery call |
//! | [`TaskScheduler`]   | no                       | a [`FaultObserver`]         |
//!
//! With the inline scheduler, a slow hook delays delivery of the next event
//! to the same handler. With the task scheduler, each hook runs on its own
//! tokio task and hooks of one handler may overlap.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{EventKind, HookResult};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{error, trace};

/// A hook invocation ready to run.
pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Decides where and when hook invocations run.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Runs or queues `task`, which handles one event of `kind`.
    async fn schedule(&self, kind: EventKind, task: HookFuture) -> HookResult;

    /// Number of scheduled tasks that have not finished yet.
    fn in_flight(&self) -> usize {
        0
    }

    /// Waits for every scheduled task to finish.
    async fn drain(&self) {}
}

// ============================================================================
// InlineScheduler
// ============================================================================

/// Awaits each hook inside the relay.
///
/// Events reach the hooks strictly in delivery order and a hook error is
/// returned to the gateway.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

#[async_trait]
impl Scheduler for InlineScheduler {
    async fn schedule(&self, kind: EventKind, task: HookFuture) -> HookResult {
        trace!(event = %kind, "Running hook inline");
        task.await.map_err(Into::into)
    }
}

// ============================================================================
// TaskScheduler
// ============================================================================

/// A hook that failed on a spawned task.
#[derive(Debug)]
pub enum HookFault {
    /// The hook returned an error.
    Error {
        event: EventKind,
        error: anyhow::Error,
    },
    /// The hook panicked.
    Panic { event: EventKind, message: String },
}

impl HookFault {
    pub fn event(&self) -> EventKind {
        match self {
            Self::Error { event, .. } | Self::Panic { event, .. } => *event,
        }
    }
}

impl std::fmt::Display for HookFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error { event, error } => write!(f, "{event} hook failed: {error:#}"),
            Self::Panic { event, message } => write!(f, "{event} hook panicked: {message}"),
        }
    }
}

/// Receives faults from hooks run by a [`TaskScheduler`].
pub type FaultObserver = Arc<dyn Fn(HookFault) + Send + Sync>;

fn log_fault(fault: HookFault) {
    error!(event = %fault.event(), "{fault}");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawns each hook onto its own tokio task.
///
/// `schedule` returns as soon as the task is spawned. Tasks are tracked so
/// they can be counted and awaited during shutdown. Must be used from within
/// a tokio runtime.
#[derive(Clone)]
pub struct TaskScheduler {
    tracker: TaskTracker,
    observer: FaultObserver,
    /// Held for the whole close, wait, reopen sequence.
    draining: Arc<Mutex<()>>,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskScheduler {
    /// Creates a scheduler that logs hook faults at `error` level.
    pub fn new() -> Self {
        Self::with_observer(Arc::new(log_fault))
    }

    /// Creates a scheduler that reports hook faults to `observer`.
    pub fn with_observer(observer: FaultObserver) -> Self {
        Self {
            tracker: TaskTracker::new(),
            observer,
            draining: Arc::new(Mutex::new(())),
        }
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("in_flight", &self.tracker.len())
            .finish()
    }
}

#[async_trait]
impl Scheduler for TaskScheduler {
    async fn schedule(&self, kind: EventKind, task: HookFuture) -> HookResult {
        let observer = Arc::clone(&self.observer);
        self.tracker.spawn(async move {
            let fault = match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => return,
                Ok(Err(error)) => HookFault::Error { event: kind, error },
                Err(payload) => HookFault::Panic {
                    event: kind,
                    message: panic_message(payload.as_ref()),
                },
            };
            observer(fault);
        });
        trace!(event = %kind, "Hook spawned");
        Ok(())
    }

    fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    async fn drain(&self) {
        let _draining = self.draining.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio_test::{assert_ok, assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_inline_propagates_error() {
        let scheduler = InlineScheduler;
        let ok = scheduler
            .schedule(EventKind::Ready, async { Ok(()) }.boxed())
            .await;
        assert!(ok.is_ok());

        let err = scheduler
            .schedule(
                EventKind::Ready,
                async { Err(anyhow::anyhow!("broken")) }.boxed(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "broken");
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_scheduler_returns_before_hook_completes() {
        let scheduler = TaskScheduler::new();
        let done = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&done);

        scheduler
            .schedule(
                EventKind::MessageReceived,
                async move {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    *flag.lock() = true;
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();

        assert!(!*done.lock());
        assert_eq!(scheduler.in_flight(), 1);

        scheduler.drain().await;
        assert!(*done.lock());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_task_scheduler_reports_faults() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let scheduler = TaskScheduler::with_observer(Arc::new(move |fault: HookFault| {
            sink.lock().push(fault.to_string());
        }));

        scheduler
            .schedule(
                EventKind::UserJoined,
                async { Err(anyhow::anyhow!("lookup failed")) }.boxed(),
            )
            .await
            .unwrap();
        scheduler
            .schedule(
                EventKind::Ready,
                async {
                    if true {
                        panic!("hook exploded");
                    }
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();
        scheduler.drain().await;

        let mut faults = faults.lock().clone();
        faults.sort();
        assert_eq!(
            faults,
            vec![
                "ready hook panicked: hook exploded".to_string(),
                "user_joined hook failed: lookup failed".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_scheduler_usable_after_drain() {
        let scheduler = TaskScheduler::new();
        scheduler.drain().await;
        let ran = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&ran);
        scheduler
            .schedule(
                EventKind::Connected,
                async move {
                    *counter.lock() += 1;
                    Ok(())
                }
                .boxed(),
            )
            .await
            .unwrap();
        scheduler.drain().await;
        assert_eq!(*ran.lock(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_drains_both_finish() {
        let scheduler = TaskScheduler::new();
        assert_ok!(
            scheduler
                .schedule(
                    EventKind::Ready,
                    async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(())
                    }
                    .boxed(),
                )
                .await
        );

        let mut first = task::spawn(scheduler.drain());
        let mut second = task::spawn(scheduler.drain());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_ready!(first.poll());
        assert_ready!(second.poll());
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[test]
    fn test_panic_message_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "non-string panic payload");
    }
}
