/*
[INPUT]:  Mock HTTP responses
[OUTPUT]: Test results for signed REST calls and response normalization
[POS]:    Integration tests - HTTP endpoints
[UPDATE]: When HTTP endpoints change
*/

mod common;

use common::{TEST_API_KEY, setup_mock_server, signed_client, test_signer};
use gateio_connector::http::{HttpErrorDetail, TransportFailureKind};
use gateio_connector::{
    ClientConfig, GateioClient, GateioError, NewOrderRequest, NormalizedResult, ResultStatus,
    Side, Signer,
};
use reqwest::Method;
use rust_decimal::Decimal;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn header_value<'a>(request: &'a wiremock::Request, name: &str) -> &'a str {
    request
        .headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .expect("ascii header")
}

#[tokio::test]
async fn test_signed_get_carries_verifiable_headers() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/accounts"))
        .and(header("KEY", TEST_API_KEY))
        .and(header("SIGN-ALGORITHM", "HMAC-SHA512"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "currency": "USDT", "available": "1000.5", "locked": "0" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let before = chrono::Utc::now().timestamp() as u64;
    let accounts = assert_ok!(client.list_spot_accounts(None).await)
        .success()
        .expect("accounts");
    assert_eq!(accounts[0].currency, "USDT");
    assert_eq!(accounts[0].available, Decimal::new(10005, 1));

    let requests = server.received_requests().await.expect("recording enabled");
    let request = &requests[0];
    let timestamp: u64 = header_value(request, "Timestamp").parse().expect("numeric timestamp");
    assert!(timestamp >= before && timestamp <= before + 5);

    let signature = header_value(request, "SIGN");
    assert_eq!(signature.len(), 128);
    assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));

    let empty_hash = Signer::hash_payload(None);
    assert_eq!(header_value(request, "X-Content-Sha512"), empty_hash);
    let canonical =
        Signer::canonical_request("GET", "/api/v4/spot/accounts", "", &empty_hash, timestamp);
    assert!(test_signer().verify(&canonical, signature));
}

#[tokio::test]
async fn test_signed_query_is_part_of_signature() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/accounts"))
        .and(query_param("currency", "BTC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let accounts = assert_ok!(client.list_spot_accounts(Some("BTC")).await);
    assert_eq!(accounts.success().map(|a| a.len()), Some(0));

    let requests = server.received_requests().await.expect("recording enabled");
    let request = &requests[0];
    let timestamp: u64 = header_value(request, "Timestamp").parse().unwrap();
    let canonical = Signer::canonical_request(
        "GET",
        "/api/v4/spot/accounts",
        "currency=BTC",
        &Signer::hash_payload(None),
        timestamp,
    );
    assert!(test_signer().verify(&canonical, header_value(request, "SIGN")));
}

#[tokio::test]
async fn test_order_too_small_is_http_error() {
    let server = setup_mock_server().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/spot/orders"))
        .and(body_json(serde_json::json!({
            "currency_pair": "ETH_BTC",
            "type": "limit",
            "side": "buy",
            "amount": "0.00000001",
            "price": "0.0000001"
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "label": "INVALID_PARAM_VALUE",
            "message": "Your order size 0.00000001 is too small"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let order = NewOrderRequest::limit(
        "ETH_BTC",
        Side::Buy,
        Decimal::new(1, 8),
        Decimal::new(1, 7),
    );
    let result = assert_ok!(client.create_order(&order).await);
    assert_eq!(result.status(), ResultStatus::HttpError);
    let detail: &HttpErrorDetail = result.http_error().expect("http error");
    assert_eq!(detail.status, 400);
    assert_eq!(detail.label.as_deref(), Some("INVALID_PARAM_VALUE"));
    assert!(detail.message.contains("too small"));

    let err = result.into_result().unwrap_err();
    assert!(matches!(err, GateioError::Api { status: 400, .. }));
    assert!(!err.is_retryable());

    let requests = server.received_requests().await.expect("recording enabled");
    let request = &requests[0];
    let body_hash = Signer::hash_payload(Some(request.body.as_slice()));
    assert_eq!(header_value(request, "X-Content-Sha512"), body_hash);
    let canonical = Signer::canonical_request(
        "POST",
        "/api/v4/spot/orders",
        "",
        &body_hash,
        header_value(request, "Timestamp").parse().unwrap(),
    );
    assert!(test_signer().verify(&canonical, header_value(request, "SIGN")));
}

#[tokio::test]
async fn test_business_error_on_200_is_http_error() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/orders/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "label": "INVALID_KEY",
            "message": "Invalid key provided"
        })))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let result = assert_ok!(client.get_order("42", "ETH_BTC").await);
    let detail = result.http_error().expect("business error");
    assert_eq!(detail.status, 200);
    assert_eq!(detail.label.as_deref(), Some("INVALID_KEY"));
}

#[tokio::test]
async fn test_non_json_success_is_malformed() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/time"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    let result = assert_ok!(client.server_time().await);
    assert_eq!(result.status(), ResultStatus::MalformedResponse);
    assert!(matches!(
        result.into_result(),
        Err(GateioError::MalformedResponse(_))
    ));
}

#[tokio::test]
async fn test_non_json_error_keeps_raw_text() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/time"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = signed_client(&server);
    match assert_ok!(client.server_time().await) {
        NormalizedResult::HttpError(detail) => {
            assert_eq!(detail.status, 502);
            assert_eq!(detail.message, "Bad Gateway");
            assert_eq!(detail.body, "Bad Gateway");
            assert_eq!(detail.raw_body, b"Bad Gateway");
        }
        other => panic!("unexpected {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let config = ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..ClientConfig::default()
    };
    let client = assert_ok!(GateioClient::with_credentials(
        config,
        common::test_credentials()
    ));

    let result = assert_ok!(
        client
            .execute_signed(Method::GET, "/spot/accounts", "", None)
            .await
    );
    match result {
        NormalizedResult::TransportError(failure) => {
            assert_eq!(failure.kind, TransportFailureKind::Connect);
        }
        other => panic!("unexpected {:?}", other.status()),
    }
}

#[tokio::test]
async fn test_public_call_is_unsigned() {
    let server = setup_mock_server().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/spot/time"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "server_time": 1 })),
        )
        .mount(&server)
        .await;

    let client = assert_ok!(GateioClient::with_config(ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    }));
    let time = assert_ok!(client.server_time().await).success().expect("time");
    assert_eq!(time.server_time, 1);

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("SIGN").is_none());
    assert!(requests[0].headers.get("KEY").is_none());
}
