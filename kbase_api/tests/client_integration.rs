use std::time::Duration;

use kbase_api::{Client, Error, RequestOptions, Transport};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_envelope_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "response": {"users": [{"id": "u1", "username": "ada", "role": "admin"}]}
        })))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let result = client.request(RequestOptions::get("/admin/users")).await;
    assert!(result.is_ok());

    let env = result.unwrap();
    assert!(env.is_success());
    assert_eq!(env.into_payload()["users"][0]["username"], "ada");
}

#[tokio::test]
async fn sends_bearer_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let opts = RequestOptions::get("/user/profile").with_token(Some("secret-token".into()));
    assert!(client.request(opts).await.is_ok());
}

#[tokio::test]
async fn query_string_is_forwarded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .and(query_param("role", "admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"users": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let result = client.request(RequestOptions::get("/admin/users?role=admin")).await;
    assert!(result.unwrap().is_success());
}

#[tokio::test]
async fn error_envelope_is_not_a_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "message": "reports disabled",
            "detail": {"feature": "reports"}
        })))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let env = client
        .request(RequestOptions::get("/admin/reports"))
        .await
        .unwrap();
    assert!(env.is_error());
    assert_eq!(env.message.as_deref(), Some("reports disabled"));
}

#[tokio::test]
async fn server_error_carries_status_and_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/files"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "maintenance"})))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let err = client
        .request(RequestOptions::get("/admin/files"))
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), 503);
    assert!(err.is_retryable());
    assert_eq!(err.detail(), Some(&json!({"detail": "maintenance"})));
}

#[tokio::test]
async fn not_found_with_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/list"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let err = client
        .request(RequestOptions::get("/files/list"))
        .await
        .unwrap_err();
    match err {
        Error::HttpStatus {
            status,
            body,
            detail,
        } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not Found");
            assert!(detail.is_none());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json}"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let err = client
        .request(RequestOptions::get("/admin/users"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"users": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri()).unwrap();
    let opts = RequestOptions::get("/admin/users").with_timeout(Duration::from_millis(100));
    let err = client.request(opts).await.unwrap_err();
    assert_eq!(err, Error::Timeout(Duration::from_millis(100)));
    assert_eq!(err.http_status(), 408);
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    // Port 9 (discard) on localhost is reliably closed in test environments.
    let client = Client::with_base_url("http://127.0.0.1:9").unwrap();
    let err = client
        .request(RequestOptions::get("/admin/users"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Network(_)));
    assert_eq!(err.http_status(), 0);
}
