/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for gateio-connector tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gateio_connector::{ClientConfig, Credentials, GateioClient, Signer, StreamConfig};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_async};
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_SECRET_KEY: &str = "test-secret-key";

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new(TEST_API_KEY, TEST_SECRET_KEY).expect("test credentials")
}

pub fn test_signer() -> Arc<Signer> {
    Arc::new(Signer::new(test_credentials()))
}

/// Signed client pointed at the mock server
pub fn signed_client(server: &MockServer) -> GateioClient {
    let config = ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    };
    GateioClient::with_credentials(config, test_credentials()).expect("client init")
}

/// Stream config for the mock venue with heartbeats off and short timeouts
pub fn stream_config(url: &str) -> StreamConfig {
    StreamConfig {
        connect_timeout: Duration::from_secs(2),
        auth_timeout: Duration::from_secs(2),
        heartbeat_interval: None,
        close_timeout: Duration::from_secs(1),
        ..StreamConfig::with_url(url)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("gateio_connector=debug")
        .with_test_writer()
        .try_init();
}

/// In-process stream venue; each accepted socket is handed to the test
pub struct MockVenue {
    pub url: String,
    connections: mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>,
}

impl MockVenue {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind venue");
        let addr = listener.local_addr().expect("venue addr");
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            connections: rx,
        }
    }

    pub async fn accept(&mut self) -> VenueConnection {
        let ws = timeout(STEP_TIMEOUT, self.connections.recv())
            .await
            .expect("venue accept timed out")
            .expect("venue listener stopped");
        VenueConnection { ws }
    }
}

/// Server side of one stream connection
pub struct VenueConnection {
    ws: WebSocketStream<TcpStream>,
}

impl VenueConnection {
    /// Next text frame as JSON
    pub async fn recv_json(&mut self) -> Value {
        loop {
            let frame = timeout(STEP_TIMEOUT, self.ws.next())
                .await
                .expect("venue recv timed out")
                .expect("client went away")
                .expect("venue read failed");
            match frame {
                Message::Text(text) => {
                    return serde_json::from_str(text.as_str()).expect("client frame is JSON");
                }
                Message::Close(_) => panic!("client closed the socket"),
                _ => continue,
            }
        }
    }

    /// Next frame, or `None` when the client closed or went silent for `wait`
    pub async fn try_recv_json(&mut self, wait: Duration) -> Option<Value> {
        loop {
            match timeout(wait, self.ws.next()).await {
                Ok(Some(Ok(Message::Text(text)))) => {
                    return serde_json::from_str(text.as_str()).ok();
                }
                Ok(Some(Ok(Message::Close(_)))) | Ok(Some(Err(_))) | Ok(None) | Err(_) => {
                    return None;
                }
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("venue send failed");
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("venue send failed");
    }

    /// Read the login frame and check its shape
    pub async fn expect_login(&mut self) -> Value {
        let frame = self.recv_json().await;
        assert_eq!(frame["channel"], "spot.login");
        assert_eq!(frame["event"], "login");
        assert_eq!(frame["payload"]["api_key"], TEST_API_KEY);
        frame
    }

    pub async fn accept_login(&mut self, login: &Value) {
        self.send_json(json!({
            "time": login["time"],
            "id": login["id"],
            "channel": "spot.login",
            "event": "login",
            "result": { "status": "success" }
        }))
        .await;
    }

    pub async fn reject_login(&mut self, login: &Value, message: &str) {
        self.send_json(json!({
            "time": login["time"],
            "id": login["id"],
            "channel": "spot.login",
            "event": "login",
            "error": { "code": 2, "message": message },
            "result": null
        }))
        .await;
    }

    /// Acknowledge a subscribe/unsubscribe request frame
    pub async fn ack(&mut self, request: &Value) {
        self.send_json(json!({
            "time": request["time"],
            "id": request["id"],
            "channel": request["channel"],
            "event": request["event"],
            "result": { "status": "success" }
        }))
        .await;
    }

    /// Refuse a subscribe request frame, echoing its id
    pub async fn refuse(&mut self, request: &Value, message: &str) {
        self.send_json(json!({
            "time": request["time"],
            "id": request["id"],
            "channel": request["channel"],
            "event": request["event"],
            "error": { "code": 2, "message": message },
            "result": null
        }))
        .await;
    }

    pub async fn pong(&mut self, ping: &Value) {
        self.send_json(json!({
            "time": ping["time"],
            "id": ping["id"],
            "channel": "spot.pong",
            "event": "",
            "result": null
        }))
        .await;
    }

    pub async fn update(&mut self, channel: &str, result: Value) {
        self.send_json(json!({
            "time": 1_700_000_000,
            "channel": channel,
            "event": "update",
            "result": result
        }))
        .await;
    }

    pub async fn close(&mut self, reason: &'static str) {
        let _ = self
            .ws
            .close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: reason.into(),
            }))
            .await;
    }
}
