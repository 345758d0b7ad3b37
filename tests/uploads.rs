//! Integration tests for document-store uploads, using wiremock.

use integrations_casework::{
    CaseworkClient, CaseworkConfig, RequestOptions, RewriteRule, StaticIdentityProvider,
    UploadedFile, UserDetails,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider() -> Arc<StaticIdentityProvider> {
    Arc::new(StaticIdentityProvider::new(
        "user-token",
        "service-token",
        UserDetails {
            id: "51".to_owned(),
            roles: vec!["caseworker".to_owned()],
        },
    ))
}

fn client_with(
    server: &MockServer,
    provider: Arc<StaticIdentityProvider>,
    rewrite: Option<RewriteRule>,
) -> CaseworkClient {
    let mut builder = CaseworkConfig::builder()
        .base_url(server.uri())
        .document_store_url(server.uri());
    if let Some(rule) = rewrite {
        builder = builder.document_rewrite(rule);
    }
    CaseworkClient::new(builder.build().unwrap(), provider).unwrap()
}

fn temp_pdf(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("claim.pdf");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(b"%PDF-1.4 claim")
        .unwrap();
    path
}

fn document_response() -> serde_json::Value {
    json!({
        "_embedded": {
            "documents": [
                {"_links": {"self": {"href": "http://internalhost:1111/documents/9"}}}
            ]
        }
    })
}

#[tokio::test]
async fn upload_from_path_posts_multipart_with_bearer_headers_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .and(header("authorization", "Bearer user-token"))
        .and(header("serviceauthorization", "Bearer service-token"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_response()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = client_with(&server, provider(), None);
    let result = client
        .documents()
        .upload_from_path(temp_pdf(&dir), "application/pdf")
        .await
        .unwrap();

    assert_eq!(
        result["_embedded"]["documents"][0]["_links"]["self"]["href"],
        "http://internalhost:1111/documents/9"
    );

    // Multipart uploads carry the bearer headers, not the user identity.
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|request| !request.headers.contains_key("user-id")));
}

#[tokio::test]
async fn upload_rewrites_internal_hosts_to_external_when_enabled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_response()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = client_with(
        &server,
        provider(),
        Some(RewriteRule::new("internalhost", 1111, "externalhost", 2222)),
    );
    let result = client
        .documents()
        .upload_from_path(temp_pdf(&dir), "application/pdf")
        .await
        .unwrap();

    assert_eq!(
        result["_embedded"]["documents"][0]["_links"]["self"]["href"],
        "http://externalhost:2222/documents/9"
    );
}

#[tokio::test]
async fn upload_from_url_downloads_without_authentication_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/remote/claim.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.4 remote".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_response()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, provider(), None);
    let remote = format!("{}/remote/claim.pdf", server.uri());
    let result = client
        .documents()
        .upload_from_url(&remote, "application/pdf", None)
        .await
        .unwrap();

    assert!(result["_embedded"]["documents"].is_array());

    // The download is unauthenticated.
    let requests = server.received_requests().await.unwrap();
    let download = requests
        .iter()
        .find(|request| request.url.path() == "/remote/claim.pdf")
        .unwrap();
    assert!(!download.headers.contains_key("authorization"));
}

#[tokio::test]
async fn upload_retries_once_after_a_denial() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Forbidden"})))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/documents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(document_response()))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider();
    let client = client_with(&server, Arc::clone(&provider), None);
    let file = UploadedFile::from_bytes(b"%PDF-1.4".to_vec(), "application/pdf", "claim.pdf");
    let result = client.documents().upload(&file, "filename").await.unwrap();

    assert!(result["_embedded"]["documents"].is_array());
    assert_eq!(provider.login_calls(), 1);
}

#[tokio::test]
async fn start_upload_fetches_the_document_event_trigger() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/caseworkers/51/jurisdictions/EMPLOYMENT/case-types/Manchester\
             /cases/1234/event-triggers/uploadDocument/token",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-3"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, provider(), None);
    let result = client
        .documents()
        .start_upload("Manchester", "1234", &RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(result["token"], "tok-3");
}

#[tokio::test]
async fn update_case_documents_posts_the_event_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/caseworkers/51/jurisdictions/EMPLOYMENT/case-types/Manchester/cases/1234/events",
        ))
        .and(wiremock::matchers::body_partial_json(json!({
            "event": {"id": "uploadDocument"},
            "event_token": "tok-3",
            "ignore_warning": false
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1234"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with(&server, provider(), None);
    let files = json!([{"value": {"document_url": "http://dm/documents/9"}}]);
    client
        .documents()
        .update_case_documents("tok-3", files, "1234", "Manchester", &RequestOptions::new())
        .await
        .unwrap();
}
