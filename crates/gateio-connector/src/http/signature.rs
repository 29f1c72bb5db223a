/*
[INPUT]:  Request method, path, query, body bytes and a timestamp source
[OUTPUT]: Immutable signed requests carrying KEY/Timestamp/SIGN headers
[POS]:    HTTP layer - request signing for authenticated endpoints
[UPDATE]: When changing signing algorithm or header format
*/

use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Url};

use crate::auth::{SIGN_ALGORITHM, Signer, TimestampSource};
use crate::http::Result;

pub const HEADER_API_KEY: &str = "KEY";
pub const HEADER_TIMESTAMP: &str = "Timestamp";
pub const HEADER_SIGNATURE: &str = "SIGN";
pub const HEADER_SIGN_ALGORITHM: &str = "SIGN-ALGORITHM";
pub const HEADER_PAYLOAD_HASH: &str = "X-Content-Sha512";

/// A request bound to its signature
///
/// Fields are read-only: the signature is only valid for this exact
/// (method, path, query, body, timestamp) tuple. Consumed when sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    method: Method,
    path: String,
    query: String,
    body: Option<Vec<u8>>,
    timestamp: u64,
    payload_hash: String,
    signature: String,
    api_key: String,
}

impl SignedRequest {
    /// Sign a request at an explicit timestamp
    pub fn new(
        signer: &Signer,
        method: Method,
        path: impl Into<String>,
        query: impl Into<String>,
        body: Option<Vec<u8>>,
        timestamp: u64,
    ) -> Result<Self> {
        let path = path.into();
        let query = query.into();
        let payload_hash = Signer::hash_payload(body.as_deref());
        let canonical =
            Signer::canonical_request(method.as_str(), &path, &query, &payload_hash, timestamp);
        let signature = signer.sign_message(&canonical)?;

        Ok(Self {
            method,
            path,
            query,
            body,
            timestamp,
            payload_hash,
            signature,
            api_key: signer.api_key().to_string(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Canonical string the signature was computed over
    pub fn canonical_string(&self) -> String {
        Signer::canonical_request(
            self.method.as_str(),
            &self.path,
            &self.query,
            &self.payload_hash,
            self.timestamp,
        )
    }

    /// Authentication headers, in wire order
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_API_KEY, self.api_key.clone()),
            (HEADER_TIMESTAMP, self.timestamp.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_SIGN_ALGORITHM, SIGN_ALGORITHM.to_string()),
            (HEADER_PAYLOAD_HASH, self.payload_hash.clone()),
        ]
    }

    /// Build the outbound request, sending exactly the signed bytes
    pub(crate) fn into_request(self, client: &Client, base_url: &Url) -> Result<RequestBuilder> {
        let mut url = base_url.join(&self.path)?;
        if !self.query.is_empty() {
            url.set_query(Some(&self.query));
        }

        let mut builder = client
            .request(self.method.clone(), url)
            .header(ACCEPT, "application/json");
        for (name, value) in self.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = self.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        Ok(builder)
    }
}

/// Signs requests with timestamps taken from a shared source
#[derive(Debug, Clone)]
pub struct RequestSigner {
    signer: Arc<Signer>,
    timestamps: Arc<dyn TimestampSource>,
}

impl RequestSigner {
    pub fn new(signer: Arc<Signer>, timestamps: Arc<dyn TimestampSource>) -> Self {
        Self { signer, timestamps }
    }

    pub fn signer(&self) -> &Arc<Signer> {
        &self.signer
    }

    /// Sign with a fresh timestamp
    pub fn sign(
        &self,
        method: Method,
        path: &str,
        query: &str,
        body: Option<Vec<u8>>,
    ) -> Result<SignedRequest> {
        SignedRequest::new(
            &self.signer,
            method,
            path,
            query,
            body,
            self.timestamps.now_secs(),
        )
    }
}

/// Url-encode query parameters in the given order
pub fn encode_query(params: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}
