//! Connection lifecycle and reconnect policy for the trade feed.
//!
//! One [`ConnectionManager`] owns one logical connection. Its background task
//! (the driver) is the only code that ever holds a [`Session`]; callers reach
//! the wire by queueing commands.
//!
//! # Architecture
//!
//! ```text
//!   FeedClient (any task/thread)
//!      │  lock Control, mutate registry/state
//!      │  queue Command::{Connect, Send, Close}
//!      ▼
//!   ┌──────────────────────── driver task ─────────────────────────┐
//!   │ select! { command | open future | deadline | event | retry } │
//!   │        │                                  │                  │
//!   │   Session (replaced per attempt)   MessageProcessor          │
//!   └────────┼──────────────────────────────────┼──────────────────┘
//!            ▼                                  ▼
//!        Transport                          TradeStore
//! ```
//!
//! # Generations
//!
//! Every connection attempt gets a new *generation* number, stored in the
//! shared [`Control`] block. Commands and transport events carry (or are
//! checked against) the generation they belong to; anything from a
//! superseded attempt is discarded. `close()` bumps the generation too, so an
//! attempt that completes after the owner closed the client is ignored.
//!
//! # Retry policy
//!
//! - A connection attempt must open within `connect_timeout` of `connect()`.
//! - Every close (or failed/timed-out attempt) increments the retry counter.
//! - Below `max_retries` the manager waits a fixed `reconnect_delay` and tries
//!   again. At `max_retries` it enters [`ConnectionState::Failed`] and stops.
//! - A successful open resets the counter.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

use crate::constants::{TOKEN_QUERY_PARAM, WS_TRADE_FEED_URL, policy};
use crate::error::{FeedError, Result};
use crate::store::TradeStore;
use crate::subscription::SubscriptionRegistry;
use crate::types::{ConnectionState, FeedNotice, NoticeKind};
use crate::ws::processor::{Dispatch, MessageProcessor};
use crate::ws::protocol::OutboundFrame;
use crate::ws::transport::{Session, Transport, TransportEvent};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed endpoint.
    pub url: String,
    /// API token, appended as the `token` query parameter when set.
    pub token: Option<String>,
    /// Deadline for one connection attempt, measured from `connect()`.
    pub connect_timeout: Duration,
    /// Fixed wait between a close and the next automatic attempt.
    pub reconnect_delay: Duration,
    /// Consecutive closes tolerated before entering `Failed` (at least 1).
    pub max_retries: u32,
    /// Capacity of the notification broadcast channel (at least 1).
    pub notice_channel_capacity: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: WS_TRADE_FEED_URL.to_owned(),
            token: None,
            connect_timeout: policy::CONNECT_TIMEOUT,
            reconnect_delay: policy::RECONNECT_DELAY,
            max_retries: policy::MAX_RETRIES,
            notice_channel_capacity: policy::NOTICE_CHANNEL_CAPACITY,
        }
    }
}

impl FeedConfig {
    /// The endpoint URL with the token applied.
    pub fn endpoint(&self) -> Result<Url> {
        let url = match self.token.as_deref() {
            Some(token) if !token.is_empty() => {
                Url::parse_with_params(&self.url, &[(TOKEN_QUERY_PARAM, token)])?
            }
            _ => Url::parse(&self.url)?,
        };
        Ok(url)
    }

    fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(FeedError::InvalidArgument(
                "max_retries must be at least 1".into(),
            ));
        }
        if self.notice_channel_capacity == 0 {
            return Err(FeedError::InvalidArgument(
                "notice_channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Everything guarded by the per-client control lock.
#[derive(Debug)]
pub(crate) struct Control {
    pub state: ConnectionState,
    pub retries: u32,
    pub generation: u64,
    pub registry: SubscriptionRegistry,
}

/// State shared between the caller-facing handle and the driver task.
pub(crate) struct Shared {
    pub control: Mutex<Control>,
    pub store: Arc<TradeStore>,
    notices: broadcast::Sender<FeedNotice>,
    state_tx: watch::Sender<ConnectionState>,
    last_error: Mutex<Option<FeedNotice>>,
}

impl Shared {
    fn new(notice_capacity: usize) -> Self {
        let store = Arc::new(TradeStore::new());
        let (notices, _) = broadcast::channel(notice_capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            control: Mutex::new(Control {
                state: ConnectionState::Disconnected,
                retries: 0,
                generation: 0,
                registry: SubscriptionRegistry::new(store.clone()),
            }),
            store,
            notices,
            state_tx,
            last_error: Mutex::new(None),
        }
    }

    /// Transition while holding the control lock so watchers see transitions
    /// in the order they happened.
    pub fn set_state(&self, ctl: &mut Control, state: ConnectionState) {
        if ctl.state != state {
            tracing::debug!(from = %ctl.state, to = %state, "Connection state changed");
        }
        ctl.state = state;
        self.state_tx.send_replace(state);
    }

    pub fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        let notice = FeedNotice::new(kind, message);
        if kind.is_error() {
            *self.last_error.lock() = Some(notice.clone());
        }
        // No receivers is fine
        let _ = self.notices.send(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<FeedNotice> {
        self.notices.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn last_error(&self) -> Option<FeedNotice> {
        self.last_error.lock().clone()
    }

    pub fn clear_error(&self) {
        *self.last_error.lock() = None;
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Command {
    /// Start attempt `generation`; the deadline runs from `requested_at`.
    Connect {
        generation: u64,
        requested_at: Instant,
    },
    /// Write `frame` if session `generation` is still current.
    Send {
        generation: u64,
        frame: OutboundFrame,
    },
    /// Drop any session, attempt, and pending retry.
    Close,
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// Owns the feed connection and drives its state machine.
///
/// Dropping the manager aborts its driver task and with it the session.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
    max_retries: u32,
}

impl ConnectionManager {
    /// Spawn the driver task on the current Tokio runtime.
    ///
    /// Fails with [`FeedError::InvalidArgument`] when called outside one.
    pub(crate) fn spawn(config: &FeedConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let url = config.endpoint()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            FeedError::InvalidArgument("feed client must be created inside a Tokio runtime".into())
        })?;

        let shared = Arc::new(Shared::new(config.notice_channel_capacity));
        let (commands, rx) = mpsc::unbounded_channel();

        let driver = Driver {
            processor: MessageProcessor::new(shared.store.clone()),
            shared: shared.clone(),
            transport,
            commands: rx,
            url: url.into(),
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
            max_retries: config.max_retries,
            generation: 0,
            opening: None,
            deadline: None,
            session: None,
            retry_at: None,
        };
        let task = runtime.spawn(driver.run());

        Ok(Self {
            shared,
            commands,
            task,
            max_retries: config.max_retries,
        })
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Begin connecting. Does not wait for the session to open.
    ///
    /// No-op while `Connecting` or `Connected`. Fails with
    /// [`FeedError::MaxRetriesExceeded`] once retries are exhausted, until
    /// [`reset_retries`](Self::reset_retries) is called.
    pub fn connect(&self) -> Result<()> {
        let mut ctl = self.shared.control.lock();
        if ctl.state.is_live() {
            return Ok(());
        }
        if ctl.retries >= self.max_retries {
            return Err(FeedError::MaxRetriesExceeded(self.max_retries));
        }

        ctl.generation += 1;
        let generation = ctl.generation;
        self.shared.set_state(&mut ctl, ConnectionState::Connecting);
        self.commands
            .send(Command::Connect {
                generation,
                requested_at: Instant::now(),
            })
            .map_err(|_| FeedError::SessionClosed)
    }

    /// Tear down the session, cancel timers, and enter `Disconnected`.
    ///
    /// Safe to call from any state, any number of times.
    pub fn close(&self) {
        let mut ctl = self.shared.control.lock();
        ctl.generation += 1;
        ctl.registry.clear_active();
        self.shared
            .set_state(&mut ctl, ConnectionState::Disconnected);
        let _ = self.commands.send(Command::Close);
        tracing::info!("Feed connection closed by owner");
    }

    /// Zero the retry counter, leaving `Failed` for `Disconnected`.
    pub fn reset_retries(&self) {
        let mut ctl = self.shared.control.lock();
        ctl.retries = 0;
        if ctl.state == ConnectionState::Failed {
            self.shared
                .set_state(&mut ctl, ConnectionState::Disconnected);
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.control.lock().state
    }

    /// Consecutive closes since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.shared.control.lock().retries
    }

    /// Queue `frame` for the session current under `ctl`.
    ///
    /// Takes the locked control block so the frame is ordered with the
    /// mutation that produced it.
    pub(crate) fn send(&self, ctl: &Control, frame: OutboundFrame) {
        let _ = self.commands.send(Command::Send {
            generation: ctl.generation,
            frame,
        });
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// What woke the driver.
enum Step {
    Command(Option<Command>),
    Opened(Result<Session>),
    DeadlineElapsed,
    Event(Option<TransportEvent>),
    RetryDue,
}

struct Driver {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    processor: MessageProcessor,
    commands: mpsc::UnboundedReceiver<Command>,
    url: String,
    connect_timeout: Duration,
    reconnect_delay: Duration,
    max_retries: u32,
    /// Generation of the attempt/session this driver is working on.
    generation: u64,
    opening: Option<BoxFuture<'static, Result<Session>>>,
    deadline: Option<Instant>,
    session: Option<Session>,
    retry_at: Option<Instant>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                biased;
                cmd = self.commands.recv() => Step::Command(cmd),
                res = poll_opening(&mut self.opening) => Step::Opened(res),
                () = sleep_until(self.deadline) => Step::DeadlineElapsed,
                ev = next_event(&mut self.session) => Step::Event(ev),
                () = sleep_until(self.retry_at) => Step::RetryDue,
            };

            match step {
                Step::Command(None) => break,
                Step::Command(Some(cmd)) => self.on_command(cmd),
                Step::Opened(res) => {
                    self.opening = None;
                    self.deadline = None;
                    match res {
                        Ok(session) => self.on_open(session),
                        Err(e) => self.on_close(format!("connect failed: {e}")),
                    }
                }
                Step::DeadlineElapsed => {
                    self.opening = None;
                    self.deadline = None;
                    tracing::warn!(generation = self.generation, "Connection attempt timed out");
                    self.on_close("connection attempt timed out".into());
                }
                Step::Event(Some(TransportEvent::Message(text))) => self.on_message(&text),
                Step::Event(Some(TransportEvent::Error(msg))) => {
                    tracing::warn!(error = %msg, "Transport error");
                    self.shared
                        .notify(NoticeKind::TransportError, format!("transport error: {msg}"));
                }
                Step::Event(Some(TransportEvent::Closed { code, reason })) => {
                    self.session = None;
                    let desc = match code {
                        Some(code) => format!("closed with code {code}: {reason}"),
                        None => format!("closed: {reason}"),
                    };
                    self.on_close(desc);
                }
                Step::Event(None) => {
                    self.session = None;
                    self.on_close("transport went away".into());
                }
                Step::RetryDue => {
                    self.retry_at = None;
                    self.on_retry_due();
                }
            }
        }
        tracing::debug!("Feed driver stopped");
    }

    fn on_command(&mut self, cmd: Command) {
        match cmd {
            Command::Connect {
                generation,
                requested_at,
            } => {
                if self.shared.control.lock().generation != generation {
                    tracing::debug!(generation, "Skipping superseded connect");
                    return;
                }
                self.start_attempt(generation, requested_at);
            }
            Command::Send { generation, frame } => {
                if generation != self.generation {
                    tracing::debug!(generation, ?frame, "Discarding frame for stale session");
                    return;
                }
                self.write(&frame);
            }
            Command::Close => {
                self.opening = None;
                self.deadline = None;
                self.retry_at = None;
                self.session = None;
            }
        }
    }

    /// Replace any previous session wholesale and open a new one.
    fn start_attempt(&mut self, generation: u64, requested_at: Instant) {
        self.generation = generation;
        self.retry_at = None;
        self.session = None;
        self.opening = Some(self.transport.open(&self.url));
        self.deadline = Some(requested_at + self.connect_timeout);
        tracing::info!(generation, "Opening feed session");
    }

    fn on_open(&mut self, session: Session) {
        let frames = {
            let mut ctl = self.shared.control.lock();
            if ctl.generation != self.generation {
                tracing::debug!(generation = self.generation, "Dropping session opened after close");
                return;
            }
            ctl.retries = 0;
            self.shared.set_state(&mut ctl, ConnectionState::Connected);
            ctl.registry.replay_all()
        };

        self.session = Some(session);
        tracing::info!(
            generation = self.generation,
            subscriptions = frames.len(),
            "Feed connected, replaying subscriptions"
        );
        for frame in &frames {
            self.write(frame);
        }
        self.shared
            .notify(NoticeKind::Connected, "connected to trade feed");
    }

    fn on_close(&mut self, reason: String) {
        let mut ctl = self.shared.control.lock();
        if ctl.generation != self.generation {
            return;
        }
        ctl.registry.clear_active();
        self.shared
            .set_state(&mut ctl, ConnectionState::Disconnected);
        ctl.retries += 1;
        let retries = ctl.retries;

        if retries < self.max_retries {
            self.shared
                .set_state(&mut ctl, ConnectionState::Reconnecting);
            drop(ctl);
            self.retry_at = Some(Instant::now() + self.reconnect_delay);
            tracing::info!(
                %reason,
                attempt = retries,
                max = self.max_retries,
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Feed disconnected, reconnecting..."
            );
            self.shared.notify(
                NoticeKind::Disconnected,
                format!(
                    "disconnected ({reason}), retrying in {:?} ({retries}/{})",
                    self.reconnect_delay, self.max_retries
                ),
            );
        } else {
            self.shared.set_state(&mut ctl, ConnectionState::Failed);
            drop(ctl);
            tracing::error!(%reason, attempts = retries, "Feed connection failed, giving up");
            self.shared.notify(
                NoticeKind::ConnectionFailed,
                format!("connection failed after {retries} attempts: {reason}"),
            );
        }
    }

    fn on_retry_due(&mut self) {
        let generation = {
            let mut ctl = self.shared.control.lock();
            if ctl.state != ConnectionState::Reconnecting || ctl.generation != self.generation {
                return;
            }
            ctl.generation += 1;
            self.shared
                .set_state(&mut ctl, ConnectionState::Connecting);
            ctl.generation
        };
        self.start_attempt(generation, Instant::now());
    }

    fn on_message(&mut self, text: &str) {
        let result = {
            // Held across the store write so an unsubscribe cannot interleave
            // between the desired check and the put.
            let ctl = self.shared.control.lock();
            self.processor
                .process(text, |symbol| ctl.registry.is_desired(symbol.as_str()))
        };

        match result {
            Ok(Dispatch::Trades { applied, dropped }) => {
                tracing::debug!(applied, dropped, "Processed trade frame");
            }
            Ok(Dispatch::Reply(frame)) => self.write(&frame),
            Ok(Dispatch::Unrecognized) => {
                let excerpt: String = text.chars().take(120).collect();
                tracing::debug!(payload = %excerpt, "Unrecognized feed message");
                self.shared.notify(
                    NoticeKind::Unrecognized,
                    format!("unrecognized message: {excerpt}"),
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse feed message");
                self.shared.notify(
                    NoticeKind::ParseError,
                    format!("error processing feed message: {e}"),
                );
            }
        }
    }

    /// Write on the current session. Failures are reported, never raised.
    fn write(&mut self, frame: &OutboundFrame) {
        let Some(session) = self.session.as_ref() else {
            tracing::debug!(?frame, "No open session, frame not sent");
            return;
        };
        let sent = frame.to_json().and_then(|json| session.send(json));
        match sent {
            Ok(()) => tracing::debug!(?frame, "Sent frame"),
            Err(e) => {
                tracing::warn!(error = %e, ?frame, "Failed to send frame");
                self.shared
                    .notify(NoticeKind::TransportError, format!("send failed: {e}"));
            }
        }
    }
}

async fn poll_opening(opening: &mut Option<BoxFuture<'static, Result<Session>>>) -> Result<Session> {
    match opening {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_event(session: &mut Option<Session>) -> Option<TransportEvent> {
    match session {
        Some(s) => s.next_event().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
