//! In-process gateway.
//!
//! [`LocalGateway`] implements [`Gateway`] without any network connection.
//! Events are injected with [`LocalGateway::emit`] and delivered to the
//! subscribers of their kind one after another, each listener awaited before
//! the next one runs. That is the same delivery discipline a socket client
//! has, which makes this gateway suitable for tests, demos and for embedding
//! the dispatch layer behind a custom transport.

use std::collections::{BTreeMap, HashMap};
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, info, trace, warn};

use crate::error::{BoxError, GatewayError, GatewayResult};
use crate::event::{EventKind, GatewayEvent};
use crate::gateway::{EventListener, Gateway, SubscriptionId};
use crate::model::{
    ChannelId, GuildId, GuildMember, LogRecord, LogSeverity, Message, MessageId, User, UserId,
};

/// A message recorded by [`Gateway::send_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub content: String,
}

/// Outcome of delivering one event to its subscribers.
#[derive(Debug, Default)]
pub struct Delivery {
    /// Number of listeners the event was handed to.
    pub delivered: usize,
    /// Errors returned by listeners, in delivery order.
    pub faults: Vec<BoxError>,
}

impl Delivery {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    logged_in: bool,
    started: bool,
}

/// A [`Gateway`] backed by in-memory state.
pub struct LocalGateway {
    me: User,
    expected_token: Option<String>,
    session: Mutex<SessionState>,
    next_subscription: AtomicU64,
    subscribers: RwLock<BTreeMap<EventKind, Vec<(SubscriptionId, EventListener)>>>,
    users: RwLock<HashMap<UserId, User>>,
    members: RwLock<HashMap<(GuildId, UserId), GuildMember>>,
    /// Members that are not cached but can be fetched on demand.
    remote_members: RwLock<HashMap<(GuildId, UserId), GuildMember>>,
    next_message: AtomicU64,
    sent: Mutex<Vec<SentMessage>>,
    sent_notify: Notify,
}

impl LocalGateway {
    /// Creates a gateway that logs in as `me`.
    pub fn new(me: User) -> Self {
        let mut users = HashMap::new();
        users.insert(me.id, me.clone());
        Self {
            me,
            expected_token: None,
            session: Mutex::new(SessionState::default()),
            next_subscription: AtomicU64::new(1),
            subscribers: RwLock::new(BTreeMap::new()),
            users: RwLock::new(users),
            members: RwLock::new(HashMap::new()),
            remote_members: RwLock::new(HashMap::new()),
            next_message: AtomicU64::new(1),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
        }
    }

    /// Only accept this exact token on login.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.expected_token = Some(token.into());
        self
    }

    /// Adds a user to the user cache.
    pub fn cache_user(&self, user: User) {
        self.users.write().insert(user.id, user);
    }

    /// Adds a member to the member cache (and its user to the user cache).
    pub fn cache_member(&self, member: GuildMember) {
        self.cache_user(member.user.clone());
        self.members
            .write()
            .insert((member.guild_id, member.user.id), member);
    }

    /// Registers a member that is only available through a download.
    pub fn add_remote_member(&self, member: GuildMember) {
        self.remote_members
            .write()
            .insert((member.guild_id, member.user.id), member);
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.lock().logged_in
    }

    pub fn is_started(&self) -> bool {
        self.session.lock().started
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Number of live subscriptions across all kinds.
    pub fn total_subscribers(&self) -> usize {
        self.subscribers.read().values().map(Vec::len).sum()
    }

    /// Snapshot of every message sent so far.
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Waits until at least `count` messages have been sent and returns them.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<SentMessage> {
        loop {
            let mut notified = pin!(self.sent_notify.notified());
            notified.as_mut().enable();
            {
                let sent = self.sent.lock();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }

    /// Delivers `event` to every subscriber of its kind.
    ///
    /// Listeners run one at a time in subscription order. A failing listener
    /// is logged and recorded in the returned [`Delivery`]; delivery carries
    /// on with the next one.
    pub async fn emit(&self, event: GatewayEvent) -> Delivery {
        let kind = event.kind();
        let listeners: Vec<EventListener> = self
            .subscribers
            .read()
            .get(&kind)
            .map(|subs| subs.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        trace!(event = %kind, listeners = listeners.len(), "Delivering event");

        let mut delivery = Delivery::default();
        for listener in listeners {
            delivery.delivered += 1;
            if let Err(e) = listener(event.clone()).await {
                warn!(event = %kind, error = %e, "Event listener failed");
                delivery.faults.push(e);
            }
        }
        delivery
    }

    /// Shorthand for emitting a `MessageReceived` event.
    pub async fn emit_message(&self, message: Message) -> Delivery {
        self.emit(GatewayEvent::message(message)).await
    }

    async fn emit_log(&self, severity: LogSeverity, message: &str) {
        self.emit(GatewayEvent::Log(LogRecord::new(severity, "Gateway", message)))
            .await;
    }
}

impl std::fmt::Debug for LocalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalGateway")
            .field("me", &self.me.id)
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

#[async_trait]
impl Gateway for LocalGateway {
    fn subscribe(&self, kind: EventKind, listener: EventListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(kind)
            .or_default()
            .push((id, listener));
        trace!(event = %kind, subscription = %id, "Subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for subs in subscribers.values_mut() {
            if let Some(pos) = subs.iter().position(|(sid, _)| *sid == id) {
                subs.remove(pos);
                trace!(subscription = %id, "Unsubscribed");
                return true;
            }
        }
        false
    }

    fn current_user(&self) -> Option<User> {
        self.is_logged_in().then(|| self.me.clone())
    }

    fn cached_user(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    async fn guild_member(
        &self,
        guild: GuildId,
        user: UserId,
    ) -> GatewayResult<Option<GuildMember>> {
        if let Some(member) = self.members.read().get(&(guild, user)) {
            return Ok(Some(member.clone()));
        }

        let downloaded = self.remote_members.write().remove(&(guild, user));
        if let Some(member) = downloaded {
            debug!(guild = %guild, user = %user, "Downloaded guild member");
            self.cache_member(member.clone());
            return Ok(Some(member));
        }
        Ok(None)
    }

    async fn send_message(&self, channel: ChannelId, content: &str) -> GatewayResult<MessageId> {
        if !self.is_logged_in() {
            return Err(GatewayError::NotLoggedIn);
        }
        let id = MessageId(self.next_message.fetch_add(1, Ordering::Relaxed));
        self.sent.lock().push(SentMessage {
            id,
            channel_id: channel,
            content: content.to_string(),
        });
        self.sent_notify.notify_waiters();
        trace!(channel = %channel, message = %id, "Message sent");
        Ok(id)
    }

    async fn login(&self, token: &str) -> GatewayResult<()> {
        if token.trim().is_empty() {
            return Err(GatewayError::invalid_token("token is empty"));
        }
        if let Some(expected) = &self.expected_token
            && expected != token
        {
            return Err(GatewayError::invalid_token("token rejected"));
        }

        self.session.lock().logged_in = true;
        info!(user = %self.me.id, "Logged in");
        self.emit(GatewayEvent::LoggedIn).await;
        Ok(())
    }

    async fn start(&self) -> GatewayResult<()> {
        {
            let mut session = self.session.lock();
            if !session.logged_in {
                return Err(GatewayError::NotLoggedIn);
            }
            if session.started {
                return Err(GatewayError::AlreadyStarted);
            }
            session.started = true;
        }

        self.emit_log(LogSeverity::Info, "Connecting").await;
        self.emit(GatewayEvent::Connected).await;
        self.emit(GatewayEvent::Ready).await;
        Ok(())
    }

    async fn stop(&self) -> GatewayResult<()> {
        let (was_started, was_logged_in) = {
            let mut session = self.session.lock();
            let snapshot = (session.started, session.logged_in);
            *session = SessionState::default();
            snapshot
        };

        if was_started {
            self.emit(GatewayEvent::Disconnected { reason: None }).await;
        }
        if was_logged_in {
            self.emit(GatewayEvent::LoggedOut).await;
            info!(user = %self.me.id, "Logged out");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::listener;
    use crate::model::ChannelRef;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn gateway() -> LocalGateway {
        LocalGateway::new(User::bot(100, "herald"))
    }

    fn counting(counter: &Arc<AtomicUsize>) -> EventListener {
        let counter = Arc::clone(counter);
        listener(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_emit_reaches_only_matching_kind() {
        let gw = gateway();
        let counter = Arc::new(AtomicUsize::new(0));
        gw.subscribe(EventKind::Ready, counting(&counter));
        gw.subscribe(EventKind::Connected, counting(&counter));

        let delivery = gw.emit(GatewayEvent::Ready).await;
        assert_eq!(delivery.delivered, 1);
        assert!(delivery.is_clean());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_exact() {
        let gw = gateway();
        let counter = Arc::new(AtomicUsize::new(0));
        let a = gw.subscribe(EventKind::Ready, counting(&counter));
        let _b = gw.subscribe(EventKind::Ready, counting(&counter));

        assert!(gw.unsubscribe(a));
        assert!(!gw.unsubscribe(a));
        assert_eq!(gw.subscriber_count(EventKind::Ready), 1);

        gw.emit(GatewayEvent::Ready).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_listener_fault_does_not_stop_delivery() {
        let gw = gateway();
        let counter = Arc::new(AtomicUsize::new(0));
        gw.subscribe(
            EventKind::Ready,
            listener(|_| async { Err::<(), BoxError>("boom".into()) }),
        );
        gw.subscribe(EventKind::Ready, counting(&counter));

        let delivery = gw.emit(GatewayEvent::Ready).await;
        assert_eq!(delivery.delivered, 2);
        assert_eq!(delivery.faults.len(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let gw = gateway().with_token("secret");
        assert!(gw.current_user().is_none());
        assert!(matches!(gw.start().await, Err(GatewayError::NotLoggedIn)));
        assert!(matches!(
            gw.login("wrong").await,
            Err(GatewayError::InvalidToken { .. })
        ));

        let ready = Arc::new(AtomicUsize::new(0));
        gw.subscribe(EventKind::Ready, counting(&ready));

        gw.login("secret").await.unwrap();
        gw.start().await.unwrap();
        assert_eq!(ready.load(Ordering::SeqCst), 1);
        assert_eq!(gw.current_user().map(|u| u.id), Some(UserId(100)));
        assert!(matches!(gw.start().await, Err(GatewayError::AlreadyStarted)));

        gw.stop().await.unwrap();
        assert!(!gw.is_started());
        assert!(gw.current_user().is_none());
    }

    #[tokio::test]
    async fn test_guild_member_downloads_once() {
        let gw = gateway();
        let member = GuildMember::new(9, User::new(5, "alice"));
        gw.add_remote_member(member.clone());

        let first = gw.guild_member(GuildId(9), UserId(5)).await.unwrap();
        assert_eq!(first, Some(member.clone()));
        // Now served from cache.
        let second = gw.guild_member(GuildId(9), UserId(5)).await.unwrap();
        assert_eq!(second, Some(member));
        assert_eq!(gw.cached_user(UserId(5)).map(|u| u.name), Some("alice".into()));

        assert_eq!(gw.guild_member(GuildId(9), UserId(6)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_message_requires_login() {
        let gw = gateway();
        assert!(matches!(
            gw.send_message(ChannelId(1), "hi").await,
            Err(GatewayError::NotLoggedIn)
        ));

        gw.login("token").await.unwrap();
        gw.send_message(ChannelId(1), "hi").await.unwrap();
        let sent = gw.wait_for_sent(1).await;
        assert_eq!(sent[0].content, "hi");
        assert_eq!(sent[0].channel_id, ChannelId(1));
    }

    #[test]
    fn test_emit_message_shorthand() {
        let gw = gateway();
        let counter = Arc::new(AtomicUsize::new(0));
        gw.subscribe(EventKind::MessageReceived, counting(&counter));
        let msg = Message::new(1, User::new(2, "bob"), ChannelRef::direct(3), "hello");
        let delivery = tokio_test::block_on(gw.emit_message(msg));
        assert_eq!(delivery.delivered, 1);
    }
}
