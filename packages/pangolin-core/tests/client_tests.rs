use std::time::Duration;

use pangolin_core::api::{ApiError, DeviceAuthPollResponse, HttpConnector, PangolinClient};
use pangolin_core::auth::{self, DeviceAuthEngine, PollResult};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL_PATH: &str = "/api/v1/auth/device-web-auth/poll/ABCD-1234";

fn envelope(data: serde_json::Value) -> serde_json::Value {
    json!({
        "data": data,
        "success": true,
        "error": false,
        "message": "",
        "status": 200
    })
}

fn client(server: &MockServer) -> PangolinClient {
    PangolinClient::with_timeout(&server.uri(), Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn start_device_auth_returns_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/device-web-auth/start"))
        .and(header("x-csrf-token", "x-csrf-protection"))
        .and(body_json(json!({
            "applicationName": "Pangolin CLI",
            "deviceName": "build-box"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "code": "ABCD-1234",
            "expiresInSeconds": 300
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let started = auth::request_device_code(&client(&server), "Pangolin CLI", "build-box", false)
        .await
        .expect("device code");

    assert_eq!(started.code, "ABCD-1234");
    assert_eq!(started.expires_in_seconds, 300);
    assert_eq!(
        started.verification_url,
        format!("{}/auth/login/device?code=ABCD-1234", server.uri())
    );
}

#[tokio::test]
async fn poll_pending_has_no_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "verified": false
        }))))
        .expect(1)
        .mount(&server)
        .await;

    let poll = client(&server).poll_device_auth("ABCD-1234").await.expect("poll");

    assert_eq!(poll.response, DeviceAuthPollResponse::default());
    assert_eq!(poll.token, None);
}

#[tokio::test]
async fn poll_prefers_payload_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "p_session_token=from-cookie; Path=/")
                .set_body_json(envelope(json!({
                    "verified": true,
                    "token": "from-body"
                }))),
        )
        .mount(&server)
        .await;

    let poll = client(&server).poll_device_auth("ABCD-1234").await.expect("poll");

    assert!(poll.response.verified);
    assert_eq!(poll.token.as_deref(), Some("from-body"));
}

#[tokio::test]
async fn poll_falls_back_to_session_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "p_session_token=from-cookie; Path=/; HttpOnly")
                .set_body_json(envelope(json!({ "verified": true }))),
        )
        .mount(&server)
        .await;

    let poll = client(&server).poll_device_auth("ABCD-1234").await.expect("poll");

    assert_eq!(poll.token.as_deref(), Some("from-cookie"));
}

#[tokio::test]
async fn poll_classifies_http_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "data": null,
            "success": false,
            "error": true,
            "message": "Device code rejected",
            "status": 403
        })))
        .mount(&server)
        .await;

    let err = client(&server).poll_device_auth("ABCD-1234").await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Http {
            status: 403,
            message: Some("Device code rejected".to_string()),
        }
    );
}

#[tokio::test]
async fn poll_404_is_not_found() {
    let server = MockServer::start().await;

    let err = client(&server).poll_device_auth("ABCD-1234").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn poll_empty_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client(&server).poll_device_auth("ABCD-1234").await.unwrap_err();

    assert_eq!(err, ApiError::InvalidResponse);
}

#[tokio::test]
async fn poll_missing_data_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!(null))))
        .mount(&server)
        .await;

    let err = client(&server).poll_device_auth("ABCD-1234").await.unwrap_err();

    assert_eq!(err, ApiError::InvalidResponse);
}

#[tokio::test]
async fn poll_malformed_body_is_decoding_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(json!({
            "verified": "yes"
        }))))
        .mount(&server)
        .await;

    let err = client(&server).poll_device_auth("ABCD-1234").await.unwrap_err();

    assert!(matches!(err, ApiError::Decoding(_)), "got {:?}", err);
}

#[tokio::test]
async fn poll_unreachable_server_is_network_error() {
    // Grab a free port and release it so nothing is listening there
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let uri = format!("http://127.0.0.1:{}", port);
    let client = PangolinClient::with_timeout(&uri, Duration::from_secs(2)).expect("client");
    let err = client.poll_device_auth("ABCD-1234").await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn poll_times_out_as_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_json(envelope(json!({ "verified": false }))),
        )
        .mount(&server)
        .await;

    let client = PangolinClient::with_timeout(&server.uri(), Duration::from_millis(200)).expect("client");
    let err = client.poll_device_auth("ABCD-1234").await.unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn engine_signs_in_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(POLL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "p_session_token=cookie-token; Path=/")
                .set_body_json(envelope(json!({ "verified": true }))),
        )
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let engine = DeviceAuthEngine::new(HttpConnector::new(Duration::from_secs(5)))
        .with_poll_interval(Duration::from_millis(20));
    let mut results = engine.subscribe();

    engine.start("ABCD-1234", &server.uri(), 30).expect("start");

    let result = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(result) = results.borrow_and_update().clone() {
                return result;
            }
            results.changed().await.expect("channel open");
        }
    })
    .await
    .expect("result within deadline");

    assert_eq!(
        result,
        PollResult::Success {
            token: "cookie-token".to_string(),
            hostname: server.uri(),
        }
    );
}
