/*
[INPUT]:  Error sources (credentials, HTTP, venue, serialization, stream session)
[OUTPUT]: Structured error types with context and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the Gate.io connector
#[derive(Error, Debug)]
pub enum GateioError {
    /// A credential field is empty or absent
    #[error("Credentials missing: {0}")]
    CredentialsMissing(&'static str),

    /// HMAC computation failed
    #[error("Signing failure: {0}")]
    SigningFailure(String),

    /// HTTP transport failed before a usable response was obtained
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport failure
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Venue rejected the request (HTTP status >= 400 or business error body)
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        label: Option<String>,
        message: String,
        body: String,
    },

    /// Stream login rejected by the venue
    #[error("Authentication rejected: {message}")]
    AuthenticationRejected { message: String },

    /// No login result within the bounded wait
    #[error("Authentication timed out after {duration_ms}ms")]
    AuthenticationTimeout { duration_ms: u64 },

    /// Heartbeat pong not received in time
    #[error("Liveness failure: no pong within {duration_ms}ms")]
    LivenessFailure { duration_ms: u64 },

    /// Venue refused a channel subscription
    #[error("Subscription to {channel} failed: {message}")]
    SubscriptionError { channel: String, message: String },

    /// Venue response violates the expected wire contract
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Socket closed
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Session has no live connection
    #[error("Stream session not connected")]
    NotConnected,

    /// Operation not valid in the current session state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection timeout
    #[error("Connection timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

impl GateioError {
    /// Check if the error is retryable by caller policy
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GateioError::Http(_)
                | GateioError::WebSocket(_)
                | GateioError::Timeout { .. }
                | GateioError::AuthenticationTimeout { .. }
                | GateioError::LivenessFailure { .. }
                | GateioError::ConnectionClosed(_)
        )
    }

    /// Check if error indicates authentication failure
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            GateioError::CredentialsMissing(_)
                | GateioError::AuthenticationRejected { .. }
                | GateioError::AuthenticationTimeout { .. }
        )
    }

    /// Check if error happened below the HTTP/application layer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            GateioError::Http(_) | GateioError::WebSocket(_) | GateioError::Timeout { .. }
        )
    }
}

/// Result type alias for connector operations
pub type Result<T> = std::result::Result<T, GateioError>;
