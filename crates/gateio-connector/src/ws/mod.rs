/*
[INPUT]:  Stream configuration, signer and channel subscriptions
[OUTPUT]: Authenticated stream session producing typed StreamMessage values
[POS]:    WebSocket layer - authenticated streaming
[UPDATE]: When adding new channels or changing connection logic
*/

mod connection;
pub mod frames;
pub mod message;
pub mod session;

pub use frames::{ChannelAuth, LoginPayload, SubscriptionEvent};
pub use message::{
    AuthResult, AuthScope, ChannelSubscription, CloseReason, DataEvent, StreamError,
    StreamErrorKind, StreamMessage, SubscriptionAck,
};
pub use session::{MessageStream, SessionHandle, SessionState, StreamConfig, StreamSession};
