/*
[INPUT]:  GATEIO_API_KEY / GATEIO_SECRET_KEY environment variables
[OUTPUT]: Server time offset and spot balances
[POS]:    Examples - signed REST calls
[UPDATE]: When REST client or normalizer API changes
*/

use gateio_connector::*;
use tracing_subscriber::EnvFilter;

/// Example: signed REST calls
///
/// 1. Load credentials from the environment
/// 2. Align the signing clock with the venue
/// 3. List spot balances and inspect the normalized outcome
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Gate.io Signed REST Example ===\n");

    let credentials = match Credentials::from_env() {
        Ok(credentials) => credentials,
        Err(e) => {
            eprintln!("Failed to load credentials: {}", e);
            return;
        }
    };

    let client = match GateioClient::with_credentials(ClientConfig::default(), credentials) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ HTTP client created");

    match client.sync_time().await {
        Ok(offset) => println!("✓ Clock offset: {} ms", offset),
        Err(e) => eprintln!("✗ Time sync failed: {}", e),
    }

    match client.list_spot_accounts(None).await {
        Ok(NormalizedResult::Success(accounts)) => {
            println!("✓ {} spot balances", accounts.len());
            for account in accounts.iter().filter(|a| !a.available.is_zero()) {
                println!("  {}: {} (locked {})", account.currency, account.available, account.locked);
            }
        }
        Ok(NormalizedResult::HttpError(detail)) => {
            eprintln!(
                "✗ Rejected ({}): {:?} {}",
                detail.status, detail.label, detail.message
            );
        }
        Ok(other) => eprintln!("✗ Request failed: {:?}", other.status()),
        Err(e) => eprintln!("✗ Request not sent: {}", e),
    }
}
