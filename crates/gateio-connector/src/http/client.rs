/*
[INPUT]:  HTTP configuration (base URL, timeouts, replay window, credentials)
[OUTPUT]: Configured reqwest client issuing signed and public calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::auth::{Credentials, Signer, SystemClock};
use crate::http::normalizer::{NormalizedResult, ResponseNormalizer};
use crate::http::signature::RequestSigner;
use crate::http::{GateioError, Result};

/// Base URL for Gate.io API
pub const DEFAULT_BASE_URL: &str = "https://api.gateio.ws";
/// Path prefix of every v4 endpoint
pub const API_V4_PREFIX: &str = "/api/v4";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub base_url: String,
    pub api_prefix: String,
    /// Tolerated local/server clock skew before a warning is logged
    pub replay_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: API_V4_PREFIX.to_string(),
            replay_window: Duration::from_secs(5),
        }
    }
}

/// Main HTTP client for Gate.io API
#[derive(Debug)]
pub struct GateioClient {
    http_client: Client,
    base_url: Url,
    config: ClientConfig,
    clock: Arc<SystemClock>,
    signer: Option<RequestSigner>,
}

impl GateioClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(&config.base_url)?,
            config,
            clock: Arc::new(SystemClock::new()),
            signer: None,
        })
    }

    /// Create an authenticated client
    pub fn with_credentials(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.set_credentials(credentials);
        Ok(client)
    }

    /// Install credentials for authenticated requests
    pub fn set_credentials(&mut self, credentials: Credentials) {
        let signer = Arc::new(Signer::new(credentials));
        self.signer = Some(RequestSigner::new(signer, self.clock.clone()));
    }

    /// Signer if credentials are set
    pub fn signer(&self) -> Option<&Arc<Signer>> {
        self.signer.as_ref().map(RequestSigner::signer)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Clock used for signing timestamps
    pub fn clock(&self) -> &Arc<SystemClock> {
        &self.clock
    }

    /// Full signed path for an endpoint, e.g. `/spot/accounts` -> `/api/v4/spot/accounts`
    pub fn endpoint_path(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_prefix.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Issue an unauthenticated call
    pub async fn execute_public(
        &self,
        method: Method,
        endpoint: &str,
        query: &str,
    ) -> Result<NormalizedResult<Value>> {
        let path = self.endpoint_path(endpoint);
        let mut url = self.base_url.join(&path)?;
        if !query.is_empty() {
            url.set_query(Some(query));
        }

        debug!(method = %method, path = %path, "rest public request");
        let builder = self
            .http_client
            .request(method, url)
            .header(ACCEPT, "application/json");
        Ok(ResponseNormalizer::normalize(builder.send()).await)
    }

    /// Issue a signed call; `body` is sent exactly as signed
    pub async fn execute_signed(
        &self,
        method: Method,
        endpoint: &str,
        query: &str,
        body: Option<Vec<u8>>,
    ) -> Result<NormalizedResult<Value>> {
        let signer = self
            .signer
            .as_ref()
            .ok_or(GateioError::CredentialsMissing("api key"))?;
        let path = self.endpoint_path(endpoint);
        let signed = signer.sign(method, &path, query, body)?;

        debug!(
            method = %signed.method(),
            path = %signed.path(),
            timestamp = signed.timestamp(),
            "rest signed request"
        );
        let builder = signed.into_request(&self.http_client, &self.base_url)?;
        Ok(ResponseNormalizer::normalize(builder.send()).await)
    }
}
