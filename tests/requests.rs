//! Integration tests for the request executor, using wiremock.

use integrations_casework::{
    CaseworkClient, CaseworkConfig, CaseworkErrorKind, RequestOptions, StaticIdentityProvider,
    UserDetails,
};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider() -> Arc<StaticIdentityProvider> {
    Arc::new(StaticIdentityProvider::new(
        "user-token",
        "service-token",
        UserDetails {
            id: "51".to_owned(),
            roles: vec!["caseworker".to_owned(), "caseworker-employment".to_owned()],
        },
    ))
}

fn client(server: &MockServer, provider: Arc<StaticIdentityProvider>) -> CaseworkClient {
    let config = CaseworkConfig::builder()
        .base_url(server.uri())
        .document_store_url(server.uri())
        .build()
        .unwrap();
    CaseworkClient::new(config, provider).unwrap()
}

#[tokio::test]
async fn get_decodes_a_successful_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"test":"value"}"#))
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123", server.uri());
    let result = client
        .get_json_with_login(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result, json!({"test": "value"}));
}

#[tokio::test]
async fn get_sends_identity_and_default_content_type_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123"))
        .and(header("authorization", "Bearer user-token"))
        .and(header("serviceauthorization", "Bearer service-token"))
        .and(header("user-id", "51"))
        .and(header("user-roles", "caseworker,caseworker-employment"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"test": "value"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123", server.uri());
    client
        .get_json_with_login(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn caller_headers_take_precedence_over_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123"))
        .and(header("content-type", "application/vnd.casework+json"))
        .and(header("authorization", "Bearer caller-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123", server.uri());
    let extra = RequestOptions::new()
        .header(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.casework+json"),
        )
        .header(
            reqwest::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer caller-token"),
        );
    client
        .get_json_with_login(&url, "Get case", &extra)
        .await
        .unwrap();
}

#[tokio::test]
async fn cookies_are_folded_into_a_cookie_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123", server.uri());
    let extra = RequestOptions::new().cookie("session", "abc");
    client
        .get_json_with_login(&url, "Get case", &extra)
        .await
        .unwrap();
}

#[tokio::test]
async fn get_text_returns_the_raw_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("raw case export"))
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123.txt", server.uri());
    let body = client
        .get_text_with_login(&url, "Export case", &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(body, "raw case export");
}

#[tokio::test]
async fn post_sends_the_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/cases"))
        .and(wiremock::matchers::body_json(json!({"case_data": {"claimant": "A"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "9"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases", server.uri());
    let result = client
        .post_json_with_login(
            &url,
            &json!({"case_data": {"claimant": "A"}}),
            "Create case",
            &RequestOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, json!({"id": "9"}));
}

#[tokio::test]
async fn not_found_raises_immediately_without_relogin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("plain text"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider();
    let client = client(&server, Arc::clone(&provider));
    let url = format!("{}/cases/404", server.uri());
    let error = client
        .get_json_with_login(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), CaseworkErrorKind::NotFound);
    assert_eq!(error.to_string(), "Not Found");
    assert_eq!(provider.login_calls(), 0);
}

#[tokio::test]
async fn unmapped_status_raises_the_base_api_kind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/500"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "database unavailable"})),
        )
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/500", server.uri());
    let error = client
        .get_json_with_login(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), CaseworkErrorKind::Api);
    assert_eq!(
        error.to_string(),
        format!("500 Internal Server Error - database unavailable ('{url}')")
    );
    assert_eq!(error.status_code().map(|s| s.as_u16()), Some(500));
}

#[tokio::test]
async fn malformed_json_in_a_success_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/123", server.uri());
    let error = client
        .get_json_with_login(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.kind(), CaseworkErrorKind::Decode);
}

#[tokio::test]
async fn typed_errors_carry_the_request_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cases/403"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Forbidden"})))
        .mount(&server)
        .await;

    let client = client(&server, provider());
    let url = format!("{}/cases/403", server.uri());
    let error = client
        .get_json(&url, "Get case", &RequestOptions::new())
        .await
        .unwrap_err();

    assert_eq!(error.url(), Some(url.as_str()));
    let request = error.request().unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, url);
    assert!(request.verify_tls);
    let response = error.response().unwrap();
    assert_eq!(response.status.as_u16(), 403);
    assert_eq!(response.body, r#"{"error":"Forbidden"}"#);
}
