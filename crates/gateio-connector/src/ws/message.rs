/*
[INPUT]:  Raw WebSocket text frames
[OUTPUT]: Classified StreamMessage values (auth result, ack, data, error, closed)
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing format
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::GateioError;

/// Whether a channel needs per-subscription credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthScope {
    Public,
    Private,
}

/// One logical stream topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelSubscription {
    pub channel: String,
    pub payload: Vec<String>,
    pub scope: AuthScope,
}

impl ChannelSubscription {
    pub fn new<I, S>(channel: impl Into<String>, payload: I, scope: AuthScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel: channel.into(),
            payload: payload.into_iter().map(Into::into).collect(),
            scope,
        }
    }

    pub fn public<I, S>(channel: impl Into<String>, payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(channel, payload, AuthScope::Public)
    }

    pub fn private<I, S>(channel: impl Into<String>, payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(channel, payload, AuthScope::Private)
    }

    /// `spot.balances` (private)
    pub fn balances() -> Self {
        Self::private("spot.balances", Vec::<String>::new())
    }

    /// `spot.orders` for the given pairs (private)
    pub fn orders<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::private("spot.orders", pairs)
    }

    /// `spot.trades` for the given pairs (public)
    pub fn trades<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::public("spot.trades", pairs)
    }

    /// Same channel and parameters, regardless of scope
    pub fn same_topic(&self, other: &ChannelSubscription) -> bool {
        self.channel == other.channel && self.payload == other.payload
    }
}

/// Login outcome
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResult {
    pub id: Option<u64>,
    pub success: bool,
    pub message: Option<String>,
    pub raw: Value,
}

/// Subscribe/unsubscribe acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionAck {
    pub id: Option<u64>,
    pub channel: String,
    pub event: String,
    pub status: String,
}

/// Channel update
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    pub channel: String,
    pub event: String,
    pub time: Option<i64>,
    pub result: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// A subscribe/unsubscribe request was refused; the session stays up
    Subscription,
    /// Venue reported an error outside a subscription request
    Venue,
    /// Frame is not the JSON shape the venue documents
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    pub kind: StreamErrorKind,
    /// Id of the request frame this error answers, when the venue echoes it
    pub id: Option<u64>,
    pub channel: Option<String>,
    pub code: Option<i64>,
    pub message: String,
    pub raw: String,
}

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Requested,
    Remote { code: Option<u16>, reason: String },
    AuthenticationRejected(String),
    AuthenticationTimeout(Duration),
    LivenessFailure(Duration),
    Transport(String),
}

impl CloseReason {
    pub fn to_error(&self) -> GateioError {
        match self {
            CloseReason::Requested => GateioError::ConnectionClosed("closed by caller".to_string()),
            CloseReason::Remote { code, reason } => GateioError::ConnectionClosed(match code {
                Some(code) => format!("closed by venue ({code}): {reason}"),
                None => format!("closed by venue: {reason}"),
            }),
            CloseReason::AuthenticationRejected(message) => GateioError::AuthenticationRejected {
                message: message.clone(),
            },
            CloseReason::AuthenticationTimeout(duration) => GateioError::AuthenticationTimeout {
                duration_ms: duration.as_millis() as u64,
            },
            CloseReason::LivenessFailure(duration) => GateioError::LivenessFailure {
                duration_ms: duration.as_millis() as u64,
            },
            CloseReason::Transport(message) => GateioError::WebSocket(message.clone()),
        }
    }
}

/// Everything a consumer can receive from a session
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    AuthResult(AuthResult),
    SubscriptionAck(SubscriptionAck),
    Data(DataEvent),
    Error(StreamError),
    ConnectionClosed {
        reason: CloseReason,
        subscriptions: Vec<ChannelSubscription>,
    },
}

/// Classification of one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum InboundFrame {
    Message(StreamMessage),
    Pong,
}

/// Channel names the classifier needs to recognise
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameClassifier<'a> {
    pub auth_channel: &'a str,
    pub pong_channel: &'a str,
}

impl FrameClassifier<'_> {
    pub fn classify(&self, text: &str) -> InboundFrame {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => return malformed(None, format!("invalid JSON: {err}"), text),
        };
        let Some(object) = value.as_object() else {
            return malformed(None, "frame is not a JSON object".to_string(), text);
        };

        let channel = object.get("channel").and_then(Value::as_str);
        let event = object
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let id = object.get("id").and_then(Value::as_u64);
        let error = extract_error(object);
        let result = object.get("result").cloned().unwrap_or(Value::Null);
        let status = result
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(channel) = channel else {
            return match error {
                Some((code, message)) => InboundFrame::Message(StreamMessage::Error(StreamError {
                    kind: StreamErrorKind::Venue,
                    id,
                    channel: None,
                    code,
                    message,
                    raw: text.to_string(),
                })),
                None => malformed(None, "frame has no channel".to_string(), text),
            };
        };

        if channel == self.pong_channel {
            return InboundFrame::Pong;
        }

        if channel == self.auth_channel {
            let success = error.is_none() && status.as_deref() == Some("success");
            let message = match error {
                Some((_, message)) => Some(message),
                None if !success => Some(format!(
                    "login status: {}",
                    status.as_deref().unwrap_or("missing")
                )),
                None => None,
            };
            return InboundFrame::Message(StreamMessage::AuthResult(AuthResult {
                id,
                success,
                message,
                raw: value,
            }));
        }

        let message = match event {
            "subscribe" | "unsubscribe" => match (error, status) {
                (None, Some(status)) if status == "success" => {
                    StreamMessage::SubscriptionAck(SubscriptionAck {
                        id,
                        channel: channel.to_string(),
                        event: event.to_string(),
                        status,
                    })
                }
                (Some((code, message)), _) => StreamMessage::Error(StreamError {
                    kind: StreamErrorKind::Subscription,
                    id,
                    channel: Some(channel.to_string()),
                    code,
                    message,
                    raw: text.to_string(),
                }),
                (None, status) => StreamMessage::Error(StreamError {
                    kind: StreamErrorKind::Subscription,
                    id,
                    channel: Some(channel.to_string()),
                    code: None,
                    message: format!("{event} status: {}", status.as_deref().unwrap_or("missing")),
                    raw: text.to_string(),
                }),
            },
            _ => match error {
                Some((code, message)) => StreamMessage::Error(StreamError {
                    kind: StreamErrorKind::Venue,
                    id,
                    channel: Some(channel.to_string()),
                    code,
                    message,
                    raw: text.to_string(),
                }),
                None => StreamMessage::Data(DataEvent {
                    channel: channel.to_string(),
                    event: event.to_string(),
                    time: object.get("time").and_then(Value::as_i64),
                    result,
                }),
            },
        };
        InboundFrame::Message(message)
    }
}

fn malformed(channel: Option<String>, message: String, raw: &str) -> InboundFrame {
    InboundFrame::Message(StreamMessage::Error(StreamError {
        kind: StreamErrorKind::Malformed,
        id: None,
        channel,
        code: None,
        message,
        raw: raw.to_string(),
    }))
}

/// `error` / `errs` as (code, message); null means no error
fn extract_error(object: &serde_json::Map<String, Value>) -> Option<(Option<i64>, String)> {
    let error = object
        .get("error")
        .filter(|value| !value.is_null())
        .or_else(|| object.get("errs").filter(|value| !value.is_null()))?;

    match error {
        Value::String(message) => Some((None, message.clone())),
        Value::Object(fields) => {
            let code = fields.get("code").and_then(Value::as_i64);
            let message = fields
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Some((code, message))
        }
        other => Some((None, other.to_string())),
    }
}
