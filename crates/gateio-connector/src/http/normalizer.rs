/*
[INPUT]:  Pending reqwest calls, or raw status + body bytes
[OUTPUT]: NormalizedResult separating success, HTTP/business, transport and malformed outcomes
[POS]:    HTTP layer - response classification shared by every REST call
[UPDATE]: When venue error markers or classification rules change
*/

use std::future::Future;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{GateioError, Result};

const RAW_LOG_MAX_BYTES: usize = 1024;

/// Keys a bare business-error body may consist of
const ERROR_BODY_KEYS: &[&str] = &["label", "message", "detail", "code"];

/// Discriminant of a [`NormalizedResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    HttpError,
    TransportError,
    MalformedResponse,
}

/// Venue rejection, body kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpErrorDetail {
    pub status: u16,
    pub label: Option<String>,
    pub message: String,
    /// Lossy UTF-8 view of `raw_body`
    pub body: String,
    pub raw_body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailureKind {
    Timeout,
    Connect,
    Body,
    Request,
}

/// Network-level failure before a complete response was read
#[derive(Debug)]
pub struct TransportFailure {
    pub kind: TransportFailureKind,
    pub source: reqwest::Error,
}

impl TransportFailure {
    fn from_reqwest(source: reqwest::Error) -> Self {
        let kind = if source.is_timeout() {
            TransportFailureKind::Timeout
        } else if source.is_connect() {
            TransportFailureKind::Connect
        } else if source.is_body() || source.is_decode() {
            TransportFailureKind::Body
        } else {
            TransportFailureKind::Request
        };
        Self { kind, source }
    }
}

/// Response that broke the JSON contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDetail {
    pub status: u16,
    pub reason: String,
    pub body: String,
    pub raw_body: Vec<u8>,
}

/// Uniform outcome of a REST call
#[derive(Debug)]
pub enum NormalizedResult<T> {
    Success(T),
    HttpError(HttpErrorDetail),
    TransportError(TransportFailure),
    MalformedResponse(MalformedDetail),
}

impl<T> NormalizedResult<T> {
    pub fn status(&self) -> ResultStatus {
        match self {
            NormalizedResult::Success(_) => ResultStatus::Success,
            NormalizedResult::HttpError(_) => ResultStatus::HttpError,
            NormalizedResult::TransportError(_) => ResultStatus::TransportError,
            NormalizedResult::MalformedResponse(_) => ResultStatus::MalformedResponse,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, NormalizedResult::Success(_))
    }

    /// Success payload, if any
    pub fn success(self) -> Option<T> {
        match self {
            NormalizedResult::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Venue rejection detail, if any
    pub fn http_error(&self) -> Option<&HttpErrorDetail> {
        match self {
            NormalizedResult::HttpError(detail) => Some(detail),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NormalizedResult<U> {
        match self {
            NormalizedResult::Success(value) => NormalizedResult::Success(f(value)),
            NormalizedResult::HttpError(detail) => NormalizedResult::HttpError(detail),
            NormalizedResult::TransportError(failure) => NormalizedResult::TransportError(failure),
            NormalizedResult::MalformedResponse(detail) => {
                NormalizedResult::MalformedResponse(detail)
            }
        }
    }

    /// Collapse into the crate error taxonomy
    pub fn into_result(self) -> Result<T> {
        match self {
            NormalizedResult::Success(value) => Ok(value),
            NormalizedResult::HttpError(detail) => Err(GateioError::Api {
                status: detail.status,
                label: detail.label,
                message: detail.message,
                body: detail.body,
            }),
            NormalizedResult::TransportError(failure) => Err(GateioError::Http(failure.source)),
            NormalizedResult::MalformedResponse(detail) => {
                Err(GateioError::MalformedResponse(detail.reason))
            }
        }
    }
}

impl NormalizedResult<Value> {
    /// Decode a success payload; a shape mismatch is a malformed response
    pub fn decode<T: DeserializeOwned>(self) -> NormalizedResult<T> {
        match self {
            NormalizedResult::Success(value) => {
                let body = value.to_string();
                match serde_json::from_value::<T>(value) {
                    Ok(decoded) => NormalizedResult::Success(decoded),
                    Err(err) => {
                        warn!(
                            error = %err,
                            body = %truncate_for_log(&body, RAW_LOG_MAX_BYTES),
                            "response contract violation: unexpected payload shape"
                        );
                        NormalizedResult::MalformedResponse(MalformedDetail {
                            status: 200,
                            reason: err.to_string(),
                            raw_body: body.clone().into_bytes(),
                            body,
                        })
                    }
                }
            }
            NormalizedResult::HttpError(detail) => NormalizedResult::HttpError(detail),
            NormalizedResult::TransportError(failure) => NormalizedResult::TransportError(failure),
            NormalizedResult::MalformedResponse(detail) => {
                NormalizedResult::MalformedResponse(detail)
            }
        }
    }
}

/// Classifies REST outcomes
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    /// Await a transport call and classify its outcome
    pub async fn normalize<F>(call: F) -> NormalizedResult<Value>
    where
        F: Future<Output = reqwest::Result<Response>>,
    {
        let response = match call.await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "rest transport failure");
                return NormalizedResult::TransportError(TransportFailure::from_reqwest(err));
            }
        };

        let status = response.status();
        match response.bytes().await {
            Ok(body) => Self::classify(status, &body),
            Err(err) => {
                warn!(status = status.as_u16(), error = %err, "rest body read failure");
                NormalizedResult::TransportError(TransportFailure::from_reqwest(err))
            }
        }
    }

    /// Classify a complete HTTP response
    pub fn classify(status: StatusCode, body: &[u8]) -> NormalizedResult<Value> {
        let code = status.as_u16();
        let text = String::from_utf8_lossy(body).into_owned();
        let parsed = if text.trim().is_empty() {
            Ok(Value::Null)
        } else {
            serde_json::from_slice::<Value>(body)
        };

        if status.is_client_error() || status.is_server_error() {
            let (label, message) = match &parsed {
                Ok(value) => business_error(value).unwrap_or_else(|| {
                    (None, fallback_message(status, &text))
                }),
                Err(_) => (None, fallback_message(status, &text)),
            };
            debug!(status = code, label = ?label, message = %message, "rest http error");
            return NormalizedResult::HttpError(HttpErrorDetail {
                status: code,
                label,
                message,
                body: text,
                raw_body: body.to_vec(),
            });
        }

        match parsed {
            Ok(value) => match business_error(&value) {
                Some((label, message)) => {
                    debug!(status = code, label = ?label, message = %message, "rest business rejection");
                    NormalizedResult::HttpError(HttpErrorDetail {
                        status: code,
                        label,
                        message,
                        body: text,
                        raw_body: body.to_vec(),
                    })
                }
                None => NormalizedResult::Success(value),
            },
            Err(err) => {
                warn!(
                    status = code,
                    error = %err,
                    body = %truncate_for_log(&text, RAW_LOG_MAX_BYTES),
                    "response contract violation: body is not JSON"
                );
                NormalizedResult::MalformedResponse(MalformedDetail {
                    status: code,
                    reason: err.to_string(),
                    body: text,
                    raw_body: body.to_vec(),
                })
            }
        }
    }
}

fn business_error(value: &Value) -> Option<(Option<String>, String)> {
    let object = value.as_object()?;
    let label = object
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = object
        .get("message")
        .or_else(|| object.get("detail"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if label.is_some() {
        return Some((label, message.unwrap_or_default()));
    }

    let only_error_keys = object
        .keys()
        .all(|key| ERROR_BODY_KEYS.contains(&key.as_str()));
    match message {
        Some(message) if only_error_keys => Some((None, message)),
        _ => None,
    }
}

fn fallback_message(status: StatusCode, text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown status")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
