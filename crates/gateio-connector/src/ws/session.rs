/*
[INPUT]:  Signer, stream configuration, channel subscriptions
[OUTPUT]: Authenticated stream session, cloneable handle and take-once message stream
[POS]:    WebSocket layer - session state machine and public API
[UPDATE]: When changing session states, subscription bookkeeping or reconnect behavior
*/

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{SinkExt, Stream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use super::connection::Connection;
use super::frames::{FrameBuilder, SubscriptionEvent};
use super::message::{ChannelSubscription, CloseReason, StreamMessage};
use crate::auth::{Signer, SystemClock, TimestampSource};
use crate::http::{GateioError, Result};

/// Spot stream endpoint
pub const DEFAULT_STREAM_URL: &str = "wss://api.gateio.ws/ws/v4/";
pub const DEFAULT_AUTH_CHANNEL: &str = "spot.login";
pub const DEFAULT_PING_CHANNEL: &str = "spot.ping";
pub const DEFAULT_PONG_CHANNEL: &str = "spot.pong";

/// Stream session configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub auth_channel: String,
    pub ping_channel: String,
    pub pong_channel: String,
    pub connect_timeout: Duration,
    pub auth_timeout: Duration,
    /// `None` disables application heartbeats
    pub heartbeat_interval: Option<Duration>,
    pub pong_timeout: Duration,
    pub close_timeout: Duration,
    pub message_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            auth_channel: DEFAULT_AUTH_CHANNEL.to_string(),
            ping_channel: DEFAULT_PING_CHANNEL.to_string(),
            pong_channel: DEFAULT_PONG_CHANNEL.to_string(),
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(10),
            heartbeat_interval: Some(Duration::from_secs(10)),
            pong_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
            message_buffer: 1024,
        }
    }
}

impl StreamConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
    Reconnecting,
    Closed(CloseReason),
}

impl SessionState {
    /// Dialing or logging in; subscriptions are queued
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SessionState::Connecting | SessionState::Authenticating | SessionState::Reconnecting
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Reconnecting => write!(f, "reconnecting"),
            SessionState::Closed(reason) => write!(f, "closed ({reason:?})"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SessionShared {
    pub state: SessionState,
    pub outbound: Option<mpsc::UnboundedSender<WsMessage>>,
    /// Requested before Ready, flushed in order on login success
    pub pending: Vec<ChannelSubscription>,
    pub active: Vec<ChannelSubscription>,
    /// Subscribe frames awaiting ack or refusal, by frame id
    pub requests: HashMap<u64, ChannelSubscription>,
}

/// State shared between the session, its handles and the connection task
#[derive(Debug)]
pub(crate) struct SessionCore {
    pub shared: Mutex<SessionShared>,
    pub frames: FrameBuilder,
    state_tx: watch::Sender<SessionState>,
    close_timeout: Duration,
}

impl SessionCore {
    fn new(frames: FrameBuilder, close_timeout: Duration) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Disconnected);
        Self {
            shared: Mutex::new(SessionShared {
                state: SessionState::Disconnected,
                outbound: None,
                pending: Vec::new(),
                active: Vec::new(),
                requests: HashMap::new(),
            }),
            frames,
            state_tx,
            close_timeout,
        }
    }

    /// Caller must hold the shared lock
    pub fn set_state(&self, shared: &mut SessionShared, state: SessionState) {
        if shared.state != state {
            debug!(from = %shared.state, to = %state, "stream session state change");
        }
        shared.state = state.clone();
        self.state_tx.send_replace(state);
    }
}

/// Cloneable control surface of a session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    core: Arc<SessionCore>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.core.state_tx.borrow().clone()
    }

    /// Resolve once the session leaves the connecting/authenticating phase
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state_rx = self.core.state_tx.subscribe();
        let state = state_rx
            .wait_for(|state| !state.is_pending())
            .await
            .map_err(|_| GateioError::NotConnected)?
            .clone();

        match state {
            SessionState::Ready => Ok(()),
            SessionState::Closed(reason) => Err(reason.to_error()),
            _ => Err(GateioError::NotConnected),
        }
    }

    /// Subscribe without waiting for the acknowledgment
    pub async fn subscribe(&self, subscription: ChannelSubscription) -> Result<()> {
        let mut shared = self.core.shared.lock().await;
        let state = shared.state.clone();
        match state {
            SessionState::Ready => {
                let (id, text) = self
                    .core
                    .frames
                    .subscription(&subscription, SubscriptionEvent::Subscribe)?;
                let outbound = shared.outbound.as_ref().ok_or(GateioError::NotConnected)?;
                outbound
                    .send(WsMessage::Text(text.into()))
                    .map_err(|_| GateioError::NotConnected)?;

                info!(id, channel = %subscription.channel, action = "subscribe", "ws subscription sent");
                shared.requests.insert(id, subscription.clone());
                if !shared.active.iter().any(|s| s.same_topic(&subscription)) {
                    shared.active.push(subscription);
                }
                Ok(())
            }
            state if state.is_pending() => {
                if !shared.pending.iter().any(|s| s.same_topic(&subscription)) {
                    debug!(channel = %subscription.channel, "ws subscription queued until login");
                    shared.pending.push(subscription);
                }
                Ok(())
            }
            _ => Err(GateioError::NotConnected),
        }
    }

    pub async fn unsubscribe(&self, subscription: &ChannelSubscription) -> Result<()> {
        let mut shared = self.core.shared.lock().await;
        let queued = shared.pending.len();
        shared.pending.retain(|s| !s.same_topic(subscription));
        let was_pending = shared.pending.len() != queued;

        let state = shared.state.clone();
        match state {
            SessionState::Ready => {
                if !shared.active.iter().any(|s| s.same_topic(subscription)) {
                    return Ok(());
                }
                let (id, text) = self
                    .core
                    .frames
                    .subscription(subscription, SubscriptionEvent::Unsubscribe)?;
                let outbound = shared.outbound.as_ref().ok_or(GateioError::NotConnected)?;
                outbound
                    .send(WsMessage::Text(text.into()))
                    .map_err(|_| GateioError::NotConnected)?;

                info!(id, channel = %subscription.channel, action = "unsubscribe", "ws subscription sent");
                shared.active.retain(|s| !s.same_topic(subscription));
                shared.requests.retain(|_, s| !s.same_topic(subscription));
                Ok(())
            }
            state if state.is_pending() || was_pending => Ok(()),
            _ => Err(GateioError::NotConnected),
        }
    }

    pub async fn active_subscriptions(&self) -> Vec<ChannelSubscription> {
        self.core.shared.lock().await.active.clone()
    }

    pub async fn pending_subscriptions(&self) -> Vec<ChannelSubscription> {
        self.core.shared.lock().await.pending.clone()
    }

    /// Ask the connection task to close and wait for it to report Closed
    pub async fn close(&self) {
        let requested = {
            let mut shared = self.core.shared.lock().await;
            match shared.outbound.take() {
                Some(_) => true,
                None => {
                    if !matches!(shared.state, SessionState::Closed(_)) {
                        self.core
                            .set_state(&mut shared, SessionState::Closed(CloseReason::Requested));
                    }
                    false
                }
            }
        };

        if requested {
            let mut state_rx = self.core.state_tx.subscribe();
            let closed = timeout(
                self.core.close_timeout,
                state_rx.wait_for(|state| matches!(state, SessionState::Closed(_))),
            )
            .await;
            if closed.is_err() {
                warn!(
                    timeout_ms = self.core.close_timeout.as_millis() as u64,
                    "stream close not acknowledged in time"
                );
            }
        }
    }
}

/// Take-once sequence of messages for one connection
#[derive(Debug)]
pub struct MessageStream {
    rx: mpsc::Receiver<StreamMessage>,
}

impl MessageStream {
    /// Next message; `None` after the connection has closed
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        self.rx.recv().await
    }
}

impl Stream for MessageStream {
    type Item = StreamMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Authenticated streaming session over one socket at a time
#[derive(Debug)]
pub struct StreamSession {
    config: StreamConfig,
    core: Arc<SessionCore>,
    message_rx: Option<mpsc::Receiver<StreamMessage>>,
    task: Option<JoinHandle<()>>,
}

impl StreamSession {
    pub fn new(signer: Arc<Signer>, config: StreamConfig) -> Self {
        Self::with_timestamp_source(signer, config, Arc::new(SystemClock::new()))
    }

    pub fn with_timestamp_source(
        signer: Arc<Signer>,
        config: StreamConfig,
        timestamps: Arc<dyn TimestampSource>,
    ) -> Self {
        let frames = FrameBuilder::new(
            signer,
            timestamps,
            config.auth_channel.clone(),
            config.ping_channel.clone(),
        );
        let core = Arc::new(SessionCore::new(frames, config.close_timeout));
        Self {
            config,
            core,
            message_rx: None,
            task: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            core: self.core.clone(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.handle().state()
    }

    /// Open the socket and send the login frame; does not wait for the login result
    pub async fn connect(&mut self) -> Result<()> {
        {
            let mut shared = self.core.shared.lock().await;
            let state = shared.state.clone();
            match state {
                SessionState::Disconnected | SessionState::Closed(_) => {
                    self.core.set_state(&mut shared, SessionState::Connecting);
                }
                SessionState::Reconnecting => {}
                other => {
                    return Err(GateioError::InvalidState(format!(
                        "connect called while {other}"
                    )));
                }
            }
            shared.active.clear();
            shared.requests.clear();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }

        info!(url = %self.config.url, "connecting stream session");
        let dial = timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await;
        let mut ws = match dial {
            Ok(Ok((ws, _response))) => ws,
            Ok(Err(err)) => {
                warn!(url = %self.config.url, error = %err, "stream connect failed");
                self.reset_after_failed_dial().await;
                return Err(GateioError::WebSocket(err.to_string()));
            }
            Err(_) => {
                warn!(url = %self.config.url, "stream connect timed out");
                self.reset_after_failed_dial().await;
                return Err(GateioError::Timeout {
                    duration_ms: self.config.connect_timeout.as_millis() as u64,
                });
            }
        };

        let (login_id, login) = match self.core.frames.login() {
            Ok(login) => login,
            Err(err) => {
                let _ = ws.close(None).await;
                self.reset_after_failed_dial().await;
                return Err(err);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        {
            let mut shared = self.core.shared.lock().await;
            if let SessionState::Closed(reason) = shared.state.clone() {
                drop(shared);
                let _ = ws.close(None).await;
                return Err(reason.to_error());
            }
            shared.outbound = Some(outbound_tx);
            self.core.set_state(&mut shared, SessionState::Authenticating);
        }

        if let Err(err) = ws.send(WsMessage::Text(login.into())).await {
            let mut shared = self.core.shared.lock().await;
            shared.outbound = None;
            self.core.set_state(
                &mut shared,
                SessionState::Closed(CloseReason::Transport(err.to_string())),
            );
            return Err(GateioError::WebSocket(err.to_string()));
        }
        info!(login_id, channel = %self.config.auth_channel, "stream login sent");

        let (message_tx, message_rx) = mpsc::channel(self.config.message_buffer.max(1));
        self.message_rx = Some(message_rx);
        let connection = Connection::new(
            self.core.clone(),
            self.config.clone(),
            login_id,
            message_tx,
        );
        self.task = Some(tokio::spawn(connection.run(ws, outbound_rx)));
        Ok(())
    }

    async fn reset_after_failed_dial(&self) {
        let mut shared = self.core.shared.lock().await;
        self.core.set_state(&mut shared, SessionState::Disconnected);
    }

    pub async fn wait_ready(&self) -> Result<()> {
        self.handle().wait_ready().await
    }

    /// Message stream of the current connection; `None` once taken
    pub fn messages(&mut self) -> Option<MessageStream> {
        self.message_rx.take().map(|rx| MessageStream { rx })
    }

    pub async fn subscribe(&self, subscription: ChannelSubscription) -> Result<()> {
        self.handle().subscribe(subscription).await
    }

    pub async fn unsubscribe(&self, subscription: &ChannelSubscription) -> Result<()> {
        self.handle().unsubscribe(subscription).await
    }

    pub async fn active_subscriptions(&self) -> Vec<ChannelSubscription> {
        self.handle().active_subscriptions().await
    }

    /// Close the socket; any pending `recv` resolves
    pub async fn close(&mut self) {
        let handle = self.handle();
        {
            let mut shared = self.core.shared.lock().await;
            shared.outbound = None;
        }

        if let Some(mut task) = self.task.take() {
            if timeout(self.config.close_timeout, &mut task).await.is_err() {
                warn!(
                    timeout_ms = self.config.close_timeout.as_millis() as u64,
                    "stream connection task did not stop, aborting"
                );
                task.abort();
            }
        }
        handle.close().await;
    }

    /// Tear down the socket, requeue active subscriptions and connect again
    pub async fn reconnect(&mut self) -> Result<()> {
        self.close().await;
        let requeued = {
            let mut shared = self.core.shared.lock().await;
            let active = std::mem::take(&mut shared.active);
            let pending = std::mem::take(&mut shared.pending);
            let mut queue: Vec<ChannelSubscription> = Vec::with_capacity(active.len() + pending.len());
            for subscription in active.into_iter().chain(pending) {
                if !queue.iter().any(|s| s.same_topic(&subscription)) {
                    queue.push(subscription);
                }
            }
            let requeued = queue.len();
            shared.pending = queue;
            self.core.set_state(&mut shared, SessionState::Reconnecting);
            requeued
        };
        info!(requeued, "stream session reconnecting");
        self.connect().await
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    fn session(url: &str) -> StreamSession {
        let signer = Arc::new(Signer::new(Credentials::new("key", "secret").unwrap()));
        let config = StreamConfig {
            connect_timeout: Duration::from_secs(2),
            ..StreamConfig::with_url(url)
        };
        StreamSession::new(signer, config)
    }

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.url, "wss://api.gateio.ws/ws/v4/");
        assert_eq!(config.auth_channel, "spot.login");
        assert_eq!(config.auth_timeout, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_subscribe_before_connect_fails() {
        let session = session("ws://127.0.0.1:1");
        assert_eq!(session.state(), SessionState::Disconnected);
        let err = session
            .subscribe(ChannelSubscription::balances())
            .await
            .unwrap_err();
        assert!(matches!(err, GateioError::NotConnected));
        assert!(matches!(session.wait_ready().await, Err(GateioError::NotConnected)));
    }

    #[tokio::test]
    async fn test_unsubscribe_while_disconnected_fails() {
        let session = session("ws://127.0.0.1:1");
        let err = session
            .unsubscribe(&ChannelSubscription::balances())
            .await
            .unwrap_err();
        assert!(matches!(err, GateioError::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_failure_resets_state() {
        let mut session = session("ws://127.0.0.1:1");
        let err = session.connect().await.unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.messages().is_none());
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let mut session = session("ws://127.0.0.1:1");
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed(CloseReason::Requested));
    }
}
