/*
[INPUT]:  Signer, timestamp source, channel subscriptions
[OUTPUT]: Serialized login, subscribe/unsubscribe and ping frames
[POS]:    WebSocket layer - outbound frame construction
[UPDATE]: When changing request frame layout or login payload fields
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{AuthScope, ChannelSubscription};
use crate::auth::{Signer, TimestampSource};
use crate::http::Result;

pub const LOGIN_EVENT: &str = "login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Subscribe,
    Unsubscribe,
}

impl SubscriptionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionEvent::Subscribe => "subscribe",
            SubscriptionEvent::Unsubscribe => "unsubscribe",
        }
    }
}

/// Login payload fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPayload {
    pub api_key: String,
    pub signature: String,
    pub timestamp: String,
    pub req_id: String,
}

/// Per-subscription credentials for private channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAuth {
    pub method: String,
    #[serde(rename = "KEY")]
    pub key: String,
    #[serde(rename = "SIGN")]
    pub sign: String,
}

#[derive(Debug, Serialize)]
struct RequestFrame<'a, P: Serialize> {
    time: u64,
    id: u64,
    channel: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<P>,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<ChannelAuth>,
}

/// Builds outbound frames; ids increase monotonically per session
#[derive(Debug)]
pub(crate) struct FrameBuilder {
    signer: Arc<Signer>,
    timestamps: Arc<dyn TimestampSource>,
    auth_channel: String,
    ping_channel: String,
    next_id: AtomicU64,
}

impl FrameBuilder {
    pub fn new(
        signer: Arc<Signer>,
        timestamps: Arc<dyn TimestampSource>,
        auth_channel: impl Into<String>,
        ping_channel: impl Into<String>,
    ) -> Self {
        Self {
            signer,
            timestamps,
            auth_channel: auth_channel.into(),
            ping_channel: ping_channel.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Login frame with a fresh timestamp; returns (frame id, text)
    pub fn login(&self) -> Result<(u64, String)> {
        let time = self.timestamps.now_secs();
        let id = self.next_id();
        let signature = self
            .signer
            .sign_login(LOGIN_EVENT, &self.auth_channel, "", time)?;

        let frame = RequestFrame {
            time,
            id,
            channel: &self.auth_channel,
            event: LOGIN_EVENT,
            payload: Some(LoginPayload {
                api_key: self.signer.api_key().to_string(),
                signature,
                timestamp: time.to_string(),
                req_id: Uuid::new_v4().to_string(),
            }),
            auth: None,
        };
        Ok((id, serde_json::to_string(&frame)?))
    }

    /// Subscribe/unsubscribe frame, carrying channel auth for private scope;
    /// returns (frame id, text)
    pub fn subscription(
        &self,
        subscription: &ChannelSubscription,
        event: SubscriptionEvent,
    ) -> Result<(u64, String)> {
        let time = self.timestamps.now_secs();
        let auth = match subscription.scope {
            AuthScope::Public => None,
            AuthScope::Private => Some(ChannelAuth {
                method: "api_key".to_string(),
                key: self.signer.api_key().to_string(),
                sign: self
                    .signer
                    .sign_channel(&subscription.channel, event.as_str(), time)?,
            }),
        };

        let id = self.next_id();
        let frame = RequestFrame {
            time,
            id,
            channel: &subscription.channel,
            event: event.as_str(),
            payload: Some(&subscription.payload),
            auth,
        };
        Ok((id, serde_json::to_string(&frame)?))
    }

    /// Application-level heartbeat
    pub fn ping(&self) -> Result<String> {
        let frame = RequestFrame::<()> {
            time: self.timestamps.now_secs(),
            id: self.next_id(),
            channel: &self.ping_channel,
            event: "",
            payload: None,
            auth: None,
        };
        Ok(serde_json::to_string(&frame)?)
    }
}
