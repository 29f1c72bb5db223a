/*
[INPUT]:  Credentials, canonical request fields, timestamps
[OUTPUT]: Lowercase-hex HMAC-SHA512 signatures and payload hashes
[POS]:    Auth layer - cryptographic signing for request authentication
[UPDATE]: When changing signing algorithm or canonical string format
*/

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};

use super::Credentials;
use crate::http::{GateioError, Result};

type HmacSha512 = Hmac<Sha512>;

/// Field delimiter of every canonical string
pub const CANONICAL_DELIMITER: char = '\n';

/// Scheme identifier sent alongside signatures
pub const SIGN_ALGORITHM: &str = "HMAC-SHA512";

/// HMAC-SHA512 signer bound to one credential set
///
/// Pure: no I/O, no mutable state, safe to share across tasks.
#[derive(Debug, Clone)]
pub struct Signer {
    credentials: Credentials,
}

impl Signer {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Public API key sent with every signature
    pub fn api_key(&self) -> &str {
        self.credentials.api_key()
    }

    /// Hex SHA-512 of the payload; an absent body hashes as the empty string
    pub fn hash_payload(body: Option<&[u8]>) -> String {
        let mut hasher = Sha512::new();
        hasher.update(body.unwrap_or_default());
        hex::encode(hasher.finalize())
    }

    /// REST canonical string: `METHOD\nPATH\nQUERY\nPAYLOAD_HASH\nTIMESTAMP`
    pub fn canonical_request(
        method: &str,
        path: &str,
        query: &str,
        payload_hash: &str,
        timestamp: u64,
    ) -> String {
        join_fields(&[
            method,
            path,
            query,
            payload_hash,
            &timestamp.to_string(),
        ])
    }

    /// Stream login canonical string: `EVENT\nCHANNEL\nREQ_PARAM\nTIMESTAMP`
    pub fn canonical_login(event: &str, channel: &str, req_param: &str, timestamp: u64) -> String {
        join_fields(&[event, channel, req_param, &timestamp.to_string()])
    }

    /// Private channel canonical string: `channel=..&event=..&time=..`
    pub fn canonical_channel(channel: &str, event: &str, time: u64) -> String {
        format!("channel={channel}&event={event}&time={time}")
    }

    /// Sign an arbitrary canonical string
    pub fn sign_message(&self, message: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Sign the stream login fields
    pub fn sign_login(
        &self,
        event: &str,
        channel: &str,
        req_param: &str,
        timestamp: u64,
    ) -> Result<String> {
        self.sign_message(&Self::canonical_login(event, channel, req_param, timestamp))
    }

    /// Sign a private channel subscription
    pub fn sign_channel(&self, channel: &str, event: &str, time: u64) -> Result<String> {
        self.sign_message(&Self::canonical_channel(channel, event, time))
    }

    /// Verify a hex signature against a canonical string (constant time)
    pub fn verify(&self, message: &str, signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(message.as_bytes());
        mac.verify_slice(&expected).is_ok()
    }

    fn mac(&self) -> Result<HmacSha512> {
        HmacSha512::new_from_slice(self.credentials.secret_bytes())
            .map_err(|e| GateioError::SigningFailure(format!("invalid HMAC key: {e}")))
    }
}

fn join_fields(fields: &[&str]) -> String {
    let mut out = String::with_capacity(fields.iter().map(|f| f.len() + 1).sum());
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(CANONICAL_DELIMITER);
        }
        out.push_str(field);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_SHA512: &str = "cf83e1357eefb8bdf1542850d66d8007d620e4050b5715dc83f4a921d36ce9ce47d0d13c5d85f2b0ff8318d2877eec2f63b931bd47417a81a538327af927da3e";

    fn signer() -> Signer {
        Signer::new(Credentials::new("test-key", "test-secret").unwrap())
    }

    #[test]
    fn test_empty_payload_hash() {
        assert_eq!(Signer::hash_payload(None), EMPTY_SHA512);
        assert_eq!(Signer::hash_payload(Some(b"")), EMPTY_SHA512);
    }

    #[test]
    fn test_canonical_request_layout() {
        let canonical =
            Signer::canonical_request("GET", "/api/v4/spot/accounts", "", EMPTY_SHA512, 1_700_000_000);
        assert_eq!(
            canonical,
            format!("GET\n/api/v4/spot/accounts\n\n{EMPTY_SHA512}\n1700000000")
        );
    }

    #[test]
    fn test_canonical_login_layout() {
        assert_eq!(
            Signer::canonical_login("login", "spot.login", "", 42),
            "login\nspot.login\n\n42"
        );
    }

    #[test]
    fn test_canonical_channel_layout() {
        assert_eq!(
            Signer::canonical_channel("spot.balances", "subscribe", 42),
            "channel=spot.balances&event=subscribe&time=42"
        );
    }

    #[test]
    fn test_signature_is_lowercase_hex_128() {
        let signature = signer().sign_message("payload").unwrap();
        assert_eq!(signature.len(), 128);
        assert!(
            signature
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let a = signer().sign_message("GET\n/a\n\nhash\n1").unwrap();
        let b = signer().sign_message("GET\n/a\n\nhash\n1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_secret_changes_signature() {
        let other = Signer::new(Credentials::new("test-key", "other-secret").unwrap());
        assert_ne!(
            signer().sign_message("message").unwrap(),
            other.sign_message("message").unwrap()
        );
    }

    #[test]
    fn test_verify_roundtrip_and_tamper() {
        let signer = signer();
        let body = br#"{"currency_pair":"ETH_BTC"}"#.to_vec();
        let canonical = Signer::canonical_request(
            "POST",
            "/api/v4/spot/orders",
            "",
            &Signer::hash_payload(Some(&body)),
            1_700_000_000,
        );
        let signature = signer.sign_message(&canonical).unwrap();
        assert!(signer.verify(&canonical, &signature));

        let mut tampered = body.clone();
        tampered[3] ^= 0x01;
        let tampered_canonical = Signer::canonical_request(
            "POST",
            "/api/v4/spot/orders",
            "",
            &Signer::hash_payload(Some(&tampered)),
            1_700_000_000,
        );
        assert!(!signer.verify(&tampered_canonical, &signature));
    }

    #[test]
    fn test_verify_rejects_non_hex() {
        assert!(!signer().verify("message", "not-hex"));
    }
}
