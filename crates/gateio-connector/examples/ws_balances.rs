/*
[INPUT]:  GATEIO_API_KEY / GATEIO_SECRET_KEY environment variables
[OUTPUT]: Authenticated stream with balance updates
[POS]:    Examples - stream session handling
[UPDATE]: When stream session API changes
*/

use std::sync::Arc;

use futures_util::StreamExt;
use gateio_connector::*;
use tracing_subscriber::EnvFilter;

/// Example: authenticated stream session
///
/// Subscriptions issued before login completes are queued and flushed once
/// the session is Ready. A closed connection is reported as a message so the
/// caller decides whether to reconnect.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Gate.io Stream Example ===\n");

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Failed to load credentials: {}", e);
            return;
        }
    };

    let signer = Arc::new(Signer::new(credentials));
    let mut session = StreamSession::new(signer, StreamConfig::default());

    if let Err(e) = session.connect().await {
        eprintln!("✗ Connect failed: {}", e);
        return;
    }
    println!("✓ Socket open, logging in");

    if let Err(e) = session.subscribe(ChannelSubscription::balances()).await {
        eprintln!("✗ Subscribe failed: {}", e);
        return;
    }

    let Some(mut messages) = session.messages() else {
        return;
    };
    let mut reconnects = 0;

    loop {
        match messages.next().await {
            Some(StreamMessage::AuthResult(result)) => {
                println!("✓ Login: success={}", result.success);
            }
            Some(StreamMessage::SubscriptionAck(ack)) => {
                println!("✓ Subscribed to {}", ack.channel);
            }
            Some(StreamMessage::Data(event)) => {
                println!("← {} {}: {}", event.channel, event.event, event.result);
            }
            Some(StreamMessage::Error(err)) => {
                eprintln!("✗ {:?} error: {}", err.kind, err.message);
            }
            Some(StreamMessage::ConnectionClosed { reason, subscriptions }) => {
                eprintln!("✗ Closed: {:?} ({} subscriptions)", reason, subscriptions.len());
                if reconnects >= 3 || matches!(reason, CloseReason::AuthenticationRejected(_)) {
                    break;
                }
                reconnects += 1;
                if let Err(e) = session.reconnect().await {
                    eprintln!("✗ Reconnect failed: {}", e);
                    break;
                }
                match session.messages() {
                    Some(next) => messages = next,
                    None => break,
                }
            }
            None => break,
        }
    }

    session.close().await;
    println!("\n✓ Stream example complete");
}
