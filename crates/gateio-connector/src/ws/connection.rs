/*
[INPUT]:  An open WebSocket, outbound frame queue, session core
[OUTPUT]: Classified StreamMessage values in arrival order, session state transitions
[POS]:    WebSocket layer - the single reader/writer task of one connection
[UPDATE]: When changing auth handshake, heartbeat or close handling
*/

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::frames::SubscriptionEvent;
use super::message::{
    AuthResult, CloseReason, FrameClassifier, InboundFrame, StreamError, StreamErrorKind,
    StreamMessage, SubscriptionAck,
};
use super::session::{SessionCore, SessionState, StreamConfig};
use crate::http::normalizer::truncate_for_log;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

const RAW_LOG_MAX_BYTES: usize = 1024;

pub(crate) struct Connection {
    core: Arc<SessionCore>,
    config: StreamConfig,
    login_id: u64,
    message_tx: mpsc::Sender<StreamMessage>,
    buffered: VecDeque<StreamMessage>,
    authenticating: bool,
    pong_deadline: Option<Instant>,
}

impl Connection {
    pub fn new(
        core: Arc<SessionCore>,
        config: StreamConfig,
        login_id: u64,
        message_tx: mpsc::Sender<StreamMessage>,
    ) -> Self {
        Self {
            core,
            config,
            login_id,
            message_tx,
            buffered: VecDeque::new(),
            authenticating: true,
            pong_deadline: None,
        }
    }

    pub async fn run(mut self, ws: WsStream, mut outbound_rx: mpsc::UnboundedReceiver<WsMessage>) {
        let (mut write, mut read) = ws.split();
        let auth_deadline = Instant::now() + self.config.auth_timeout;
        let mut heartbeat = self.config.heartbeat_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        let reason = loop {
            tokio::select! {
                outbound = outbound_rx.recv() => {
                    match outbound {
                        Some(message) => {
                            if let Err(err) = write.send(message).await {
                                break CloseReason::Transport(err.to_string());
                            }
                        }
                        None => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break CloseReason::Requested;
                        }
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(reason) = self.handle_text(text.as_str(), &mut write).await {
                                break reason;
                            }
                        }
                        Some(Ok(WsMessage::Binary(bytes))) => {
                            let text = String::from_utf8_lossy(&bytes).into_owned();
                            if let Some(reason) = self.handle_text(&text, &mut write).await {
                                break reason;
                            }
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break match frame {
                                Some(frame) => CloseReason::Remote {
                                    code: Some(u16::from(frame.code)),
                                    reason: frame.reason.as_str().to_string(),
                                },
                                None => CloseReason::Remote { code: None, reason: String::new() },
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => break CloseReason::Transport(err.to_string()),
                        None => {
                            break CloseReason::Remote {
                                code: None,
                                reason: "stream ended".to_string(),
                            };
                        }
                    }
                }
                _ = sleep_until(auth_deadline), if self.authenticating => {
                    warn!(timeout_ms = self.config.auth_timeout.as_millis() as u64, "stream login timed out");
                    let _ = write.send(WsMessage::Close(None)).await;
                    break CloseReason::AuthenticationTimeout(self.config.auth_timeout);
                }
                _ = next_tick(&mut heartbeat), if !self.authenticating => {
                    if self.pong_deadline.is_none() {
                        if let Err(reason) = self.send_ping(&mut write).await {
                            break reason;
                        }
                    }
                }
                _ = sleep_until_opt(self.pong_deadline), if self.pong_deadline.is_some() => {
                    warn!(timeout_ms = self.config.pong_timeout.as_millis() as u64, "stream heartbeat pong missing");
                    let _ = write.send(WsMessage::Close(None)).await;
                    break CloseReason::LivenessFailure(self.config.pong_timeout);
                }
            }
        };

        self.finish(reason).await;
    }

    async fn handle_text(&mut self, text: &str, write: &mut WsSink) -> Option<CloseReason> {
        debug!(
            bytes = text.len(),
            message = %truncate_for_log(text, RAW_LOG_MAX_BYTES),
            "ws frame received"
        );

        let classifier = FrameClassifier {
            auth_channel: &self.config.auth_channel,
            pong_channel: &self.config.pong_channel,
        };

        match classifier.classify(text) {
            InboundFrame::Pong => {
                self.pong_deadline = None;
                None
            }
            InboundFrame::Message(StreamMessage::AuthResult(result))
                if self.authenticating && self.is_login_result(&result) =>
            {
                self.complete_login(result, write).await
            }
            InboundFrame::Message(message) if self.authenticating => {
                self.buffered.push_back(message);
                None
            }
            InboundFrame::Message(message) => {
                match &message {
                    StreamMessage::Error(err) => self.on_stream_error(err).await,
                    StreamMessage::SubscriptionAck(ack) => self.on_subscription_ack(ack).await,
                    _ => {}
                }
                self.deliver(message).await;
                None
            }
        }
    }

    fn is_login_result(&self, result: &AuthResult) -> bool {
        result.id.is_none_or(|id| id == self.login_id)
    }

    async fn complete_login(&mut self, result: AuthResult, write: &mut WsSink) -> Option<CloseReason> {
        if !result.success {
            let message = result
                .message
                .clone()
                .unwrap_or_else(|| "login rejected".to_string());
            warn!(reason = %message, "stream login rejected");
            while let Some(buffered) = self.buffered.pop_front() {
                self.deliver(buffered).await;
            }
            self.deliver(StreamMessage::AuthResult(result)).await;
            let _ = write.send(WsMessage::Close(None)).await;
            return Some(CloseReason::AuthenticationRejected(message));
        }

        self.authenticating = false;
        let frames = {
            let mut shared = self.core.shared.lock().await;
            let pending = std::mem::take(&mut shared.pending);
            let mut frames = Vec::with_capacity(pending.len());
            for subscription in pending {
                match self
                    .core
                    .frames
                    .subscription(&subscription, SubscriptionEvent::Subscribe)
                {
                    Ok((id, text)) => {
                        if !shared.active.iter().any(|s| s.same_topic(&subscription)) {
                            shared.active.push(subscription.clone());
                        }
                        frames.push((id, subscription.channel.clone(), text));
                        shared.requests.insert(id, subscription);
                    }
                    Err(err) => {
                        warn!(channel = %subscription.channel, error = %err, "ws subscription frame failed");
                        self.buffered.push_back(StreamMessage::Error(StreamError {
                            kind: StreamErrorKind::Subscription,
                            id: None,
                            channel: Some(subscription.channel.clone()),
                            code: None,
                            message: err.to_string(),
                            raw: String::new(),
                        }));
                    }
                }
            }
            self.core.set_state(&mut shared, SessionState::Ready);
            frames
        };
        info!(queued = frames.len(), "stream session authenticated");

        for (id, channel, text) in frames {
            if let Err(err) = write.send(WsMessage::Text(text.into())).await {
                return Some(CloseReason::Transport(err.to_string()));
            }
            info!(id, channel = %channel, action = "subscribe", "ws subscription sent");
        }

        self.deliver(StreamMessage::AuthResult(result)).await;
        while let Some(message) = self.buffered.pop_front() {
            self.deliver(message).await;
        }
        None
    }

    async fn on_subscription_ack(&self, ack: &SubscriptionAck) {
        if let Some(id) = ack.id {
            self.core.shared.lock().await.requests.remove(&id);
        }
    }

    async fn on_stream_error(&self, err: &StreamError) {
        match err.kind {
            StreamErrorKind::Subscription => {
                warn!(id = ?err.id, channel = ?err.channel, code = ?err.code, message = %err.message, "ws subscription refused");
                let mut shared = self.core.shared.lock().await;
                match err.id {
                    Some(id) => {
                        if let Some(refused) = shared.requests.remove(&id) {
                            shared.active.retain(|s| !s.same_topic(&refused));
                        }
                    }
                    None => {
                        let Some(channel) = &err.channel else {
                            return;
                        };
                        let matching = shared
                            .active
                            .iter()
                            .filter(|s| &s.channel == channel)
                            .count();
                        if matching == 1 {
                            shared.active.retain(|s| &s.channel != channel);
                            shared.requests.retain(|_, s| &s.channel != channel);
                        } else if matching > 1 {
                            warn!(%channel, matching, "refusal without id is ambiguous, keeping subscriptions");
                        }
                    }
                }
            }
            StreamErrorKind::Venue => {
                warn!(channel = ?err.channel, code = ?err.code, message = %err.message, "ws venue error");
            }
            StreamErrorKind::Malformed => {
                warn!(
                    message = %err.message,
                    raw = %truncate_for_log(&err.raw, RAW_LOG_MAX_BYTES),
                    "ws frame contract violation"
                );
            }
        }
    }

    async fn send_ping(&mut self, write: &mut WsSink) -> Result<(), CloseReason> {
        let text = match self.core.frames.ping() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "ws ping frame failed");
                return Ok(());
            }
        };
        write
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|err| CloseReason::Transport(err.to_string()))?;
        self.pong_deadline = Some(Instant::now() + self.config.pong_timeout);
        debug!("ws ping sent");
        Ok(())
    }

    async fn deliver(&self, message: StreamMessage) {
        if self.message_tx.send(message).await.is_err() {
            debug!("stream consumer dropped, message discarded");
        }
    }

    async fn finish(mut self, reason: CloseReason) {
        let subscriptions = {
            let mut shared = self.core.shared.lock().await;
            shared.outbound = None;
            self.core
                .set_state(&mut shared, SessionState::Closed(reason.clone()));
            shared.active.clone()
        };

        match &reason {
            CloseReason::Requested => info!("stream session closed"),
            other => warn!(reason = ?other, "stream session closed"),
        }

        while let Some(message) = self.buffered.pop_front() {
            self.deliver(message).await;
        }
        self.deliver(StreamMessage::ConnectionClosed {
            reason,
            subscriptions,
        })
        .await;
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
