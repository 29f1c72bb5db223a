/*
[INPUT]:  API credentials and timestamp sources
[OUTPUT]: HMAC signatures for REST headers and stream login payloads
[POS]:    Auth layer - handles Gate.io API authentication
[UPDATE]: When auth flow or signature methods change
*/

pub mod clock;
pub mod credentials;
pub mod signer;

pub use clock::{FixedTimestamp, SystemClock, TimestampSource};
pub use credentials::{API_KEY_ENV, Credentials, SECRET_KEY_ENV};
pub use signer::{CANONICAL_DELIMITER, SIGN_ALGORITHM, Signer};
