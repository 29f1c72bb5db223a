/*
[INPUT]:  API key and secret key strings (explicit or from environment)
[OUTPUT]: Validated, immutable credential pair
[POS]:    Auth layer - credential ownership for the signer
[UPDATE]: When credential sources or validation rules change
*/

use std::fmt;

use crate::http::{GateioError, Result};

/// Default environment variable holding the API key
pub const API_KEY_ENV: &str = "GATEIO_API_KEY";
/// Default environment variable holding the secret key
pub const SECRET_KEY_ENV: &str = "GATEIO_SECRET_KEY";

/// API key + secret key pair
///
/// The secret is only ever used as HMAC key material and never leaves the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
}

impl Credentials {
    /// Create credentials, rejecting empty values
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into().trim().to_string();
        let secret_key = secret_key.into().trim().to_string();

        if api_key.is_empty() {
            return Err(GateioError::CredentialsMissing("api key"));
        }
        if secret_key.is_empty() {
            return Err(GateioError::CredentialsMissing("secret key"));
        }

        Ok(Self {
            api_key,
            secret_key,
        })
    }

    /// Load credentials from `GATEIO_API_KEY` / `GATEIO_SECRET_KEY`
    pub fn from_env() -> Result<Self> {
        Self::from_env_vars(API_KEY_ENV, SECRET_KEY_ENV)
    }

    /// Load credentials from custom environment variable names
    pub fn from_env_vars(api_key_var: &str, secret_key_var: &str) -> Result<Self> {
        let api_key = std::env::var(api_key_var).unwrap_or_default();
        let secret_key = std::env::var(secret_key_var).unwrap_or_default();
        Self::new(api_key, secret_key)
    }

    /// Public API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn secret_bytes(&self) -> &[u8] {
        self.secret_key.as_bytes()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
