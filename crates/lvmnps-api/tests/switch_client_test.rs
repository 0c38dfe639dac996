#![allow(clippy::unwrap_used)]
// Integration tests for `SwitchClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lvmnps_api::{Error, SwitchClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, SwitchClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = SwitchClient::with_client(
        reqwest::Client::new(),
        base_url,
        "admin",
        "1234".to_string().into(),
    );
    (server, client)
}

fn outlets_body() -> serde_json::Value {
    json!([
        { "name": "Telescope", "state": true, "physical_state": true, "locked": false },
        { "name": "Camera", "state": false, "physical_state": false, "locked": false },
        { "name": "Outlet 3", "state": false, "locked": true }
    ])
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_returns_outlet_count() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(outlets_body()))
        .mount(&server)
        .await;

    assert_eq!(client.login().await.unwrap(), 3);
}

#[tokio::test]
async fn test_login_failure() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(result.unwrap_err().is_auth());
}

// ── Relay tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_outlets() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(outlets_body()))
        .mount(&server)
        .await;

    let outlets = client.outlets().await.unwrap();
    assert_eq!(outlets.len(), 3);
    assert_eq!(outlets[0].name, "Telescope");
    assert!(outlets[0].state);
    assert!(!outlets[1].state);
    assert!(outlets[2].locked);
    assert_eq!(outlets[2].physical_state, None);
}

#[tokio::test]
async fn test_outlet_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/1/state/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .mount(&server)
        .await;

    assert!(client.outlet_state(1).await.unwrap());
}

#[tokio::test]
async fn test_set_outlet_state_sends_form_and_csrf() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/restapi/relay/outlets/0/state/"))
        .and(header("X-CSRF", "x"))
        .and(body_string("value=true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.set_outlet_state(0, true).await.unwrap();
}

#[tokio::test]
async fn test_cycle_outlet() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/restapi/relay/outlets/2/cycle/"))
        .and(header("X-CSRF", "x"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.cycle_outlet(2).await.unwrap();
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.outlets().await.unwrap_err();
    assert!(
        matches!(err, Error::Status { status: 503, ref body } if body == "busy"),
        "unexpected error: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_maps_to_deserialization() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/restapi/relay/outlets/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let err = client.outlets().await.unwrap_err();
    assert!(
        matches!(err, Error::Deserialization { ref body, .. } if body.contains("login")),
        "unexpected error: {err:?}"
    );
}
