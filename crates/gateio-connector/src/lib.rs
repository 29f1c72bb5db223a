/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public Gate.io connector crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod http;
pub mod types;
pub mod ws;

// Re-export commonly used types from auth
pub use auth::{Credentials, FixedTimestamp, Signer, SystemClock, TimestampSource};

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    GateioClient,
    GateioError,
    NormalizedResult,
    RequestSigner,
    ResponseNormalizer,
    Result,
    ResultStatus,
    SignedRequest,
};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    ChannelSubscription,
    CloseReason,
    MessageStream,
    SessionHandle,
    SessionState,
    StreamConfig,
    StreamMessage,
    StreamSession,
};
