// Connection manager: socket lifecycle with automatic reconnection.
//
// Owns the `Disconnected → Connecting → Connected → Reconnecting → …` state
// machine and publishes a human-readable status label for the host UI.
//
// Transport is abstracted via `Connector` for testability. The WebSocket
// implementation lives in `ws`.

pub mod ws;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use coedit_common::protocol::{encode, SyncMessage};
use rand::Rng;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};
use url::Url;

pub use ws::WsConnector;

// ── Reconnect policy ────────────────────────────────────────────────

/// How the delay between reconnect attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait `delay`.
    Fixed,
    /// Double per consecutive failure up to `max_delay`, then pick uniformly
    /// in `[0, cap]`.
    ExponentialJitter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_delay: Duration,
    pub backoff: Backoff,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            backoff: Backoff::Fixed,
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay, max_delay: delay, backoff: Backoff::Fixed }
    }

    /// Delay before the next attempt after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::ExponentialJitter => {
                let exp = failures.saturating_sub(1).min(16);
                let cap = self.delay.saturating_mul(1u32 << exp).min(self.max_delay);
                rand::thread_rng().gen_range(Duration::ZERO..=cap)
            }
        }
    }
}

// ── Transport seam ──────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("socket error: {0}")]
    Socket(String),
}

/// Something that arrived on an open link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Text(String),
    /// The peer closed the socket (with an optional reason).
    Closed(Option<String>),
    Error(String),
}

/// An open socket, reduced to a pair of channels.
///
/// Dropping the link closes the outbound channel, which lets the writer send
/// a close frame, and aborts the reader.
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<LinkEvent>,
    reader: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> Self {
        Self { outbound, inbound, reader: None }
    }

    pub fn abort_on_drop(mut self, reader: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

pub type ConnectFuture = Pin<Box<dyn Future<Output = Result<Link, TransportError>> + Send>>;

/// Opens links to an endpoint.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, endpoint: &Url) -> ConnectFuture;
}

/// Parse a socket endpoint, accepting only `ws` and `wss`.
pub fn parse_endpoint(value: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidEndpoint {
        endpoint: value.to_string(),
        reason,
    };
    let parsed = Url::parse(value).map_err(|error| invalid(error.to_string()))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(invalid(format!("scheme `{other}` is not ws or wss"))),
    }
}

// ── Connection state ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Status label shown by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Disconnected,
    Connected,
    Reconnecting,
    ConnectionError,
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "Disconnected",
            Self::Connected => "Connected",
            Self::Reconnecting => "Reconnecting…",
            Self::ConnectionError => "Connection error",
        })
    }
}

/// Events surfaced to the engine, in socket-delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket is open; the caller should announce itself.
    Opened,
    Inbound(String),
    /// The peer closed the socket; a reconnect has been scheduled.
    Closed { reason: Option<String> },
    /// Connecting or reading failed; a reconnect has been scheduled.
    Failed(TransportError),
    /// The reconnect delay elapsed and a new attempt has started.
    Reconnecting { attempt: u32 },
}

enum Phase {
    Idle,
    Connecting(ConnectFuture),
    Open(Link),
    Waiting(Pin<Box<Sleep>>),
}

// ── Connection manager ──────────────────────────────────────────────

pub struct ConnectionManager<C: Connector> {
    endpoint: Url,
    connector: C,
    policy: ReconnectPolicy,
    state: ConnectionState,
    phase: Phase,
    consecutive_failures: u32,
    status_tx: watch::Sender<StatusLabel>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(endpoint: Url, connector: C, status_tx: watch::Sender<StatusLabel>) -> Self {
        Self {
            endpoint,
            connector,
            policy: ReconnectPolicy::default(),
            state: ConnectionState::Disconnected,
            phase: Phase::Idle,
            consecutive_failures: 0,
            status_tx,
        }
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Start a connection attempt. No-op while connecting or connected.
    pub fn connect(&mut self) {
        if matches!(self.phase, Phase::Connecting(_) | Phase::Open(_)) {
            return;
        }
        self.begin_connect();
    }

    /// Encode and send a frame. Returns false (and drops the frame) when the
    /// socket is not open.
    pub fn send(&mut self, message: &SyncMessage) -> bool {
        let Phase::Open(link) = &self.phase else {
            debug!(kind = message.kind.as_str(), state = ?self.state, "not connected, frame dropped");
            return false;
        };
        let text = match encode(message) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "failed to encode outbound frame");
                return false;
            }
        };
        if link.outbound.send(text).is_err() {
            debug!(kind = message.kind.as_str(), "socket writer gone, frame dropped");
            return false;
        }
        true
    }

    /// Close the socket and cancel any pending attempt or reconnect timer.
    pub fn close(&mut self) {
        if matches!(self.phase, Phase::Idle) && self.state == ConnectionState::Disconnected {
            return;
        }
        self.phase = Phase::Idle;
        self.state = ConnectionState::Disconnected;
        self.consecutive_failures = 0;
        self.publish(StatusLabel::Disconnected);
        info!(endpoint = %self.endpoint, "connection closed");
    }

    /// Wait for the next connection event.
    ///
    /// Cancel-safe: dropping the returned future loses nothing, so it can sit
    /// in a `select!` next to other branches. Pends forever while idle.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        match &mut self.phase {
            Phase::Idle => std::future::pending().await,

            Phase::Connecting(attempt) => match attempt.as_mut().await {
                Ok(link) => {
                    self.phase = Phase::Open(link);
                    self.state = ConnectionState::Connected;
                    self.consecutive_failures = 0;
                    self.publish(StatusLabel::Connected);
                    info!(endpoint = %self.endpoint, "connected");
                    ConnectionEvent::Opened
                }
                Err(error) => {
                    warn!(endpoint = %self.endpoint, %error, "connection attempt failed");
                    self.publish(StatusLabel::ConnectionError);
                    self.schedule_reconnect();
                    ConnectionEvent::Failed(error)
                }
            },

            Phase::Open(link) => match link.inbound.recv().await {
                Some(LinkEvent::Text(text)) => ConnectionEvent::Inbound(text),
                Some(LinkEvent::Error(reason)) => {
                    warn!(endpoint = %self.endpoint, %reason, "socket error");
                    self.publish(StatusLabel::ConnectionError);
                    self.schedule_reconnect();
                    ConnectionEvent::Failed(TransportError::Socket(reason))
                }
                Some(LinkEvent::Closed(reason)) => {
                    info!(endpoint = %self.endpoint, ?reason, "socket closed by peer");
                    self.publish(StatusLabel::Reconnecting);
                    self.schedule_reconnect();
                    ConnectionEvent::Closed { reason }
                }
                None => {
                    info!(endpoint = %self.endpoint, "socket reader ended");
                    self.publish(StatusLabel::Reconnecting);
                    self.schedule_reconnect();
                    ConnectionEvent::Closed { reason: None }
                }
            },

            Phase::Waiting(timer) => {
                timer.as_mut().await;
                self.begin_connect();
                ConnectionEvent::Reconnecting { attempt: self.consecutive_failures + 1 }
            }
        }
    }

    fn begin_connect(&mut self) {
        debug!(endpoint = %self.endpoint, "opening socket");
        self.state = ConnectionState::Connecting;
        self.phase = Phase::Connecting(self.connector.connect(&self.endpoint));
    }

    fn schedule_reconnect(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let delay = self.policy.delay_for(self.consecutive_failures);
        info!(
            endpoint = %self.endpoint,
            delay_ms = delay.as_millis() as u64,
            failures = self.consecutive_failures,
            "reconnect scheduled"
        );
        self.state = ConnectionState::Reconnecting;
        self.phase = Phase::Waiting(Box::pin(tokio::time::sleep(delay)));
    }

    fn publish(&self, label: StatusLabel) {
        self.status_tx.send_replace(label);
    }
}
