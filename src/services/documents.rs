//! Document operations: upload-event triggers and document-store uploads.

use crate::auth::bearer_headers;
use crate::client::{CaseworkClient, RequestOptions};
use crate::errors::{CaseworkError, CaseworkResult};
use crate::upload::UploadedFile;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::debug;

/// Event id for attaching documents to a case.
const UPLOAD_DOCUMENT_EVENT_ID: &str = "uploadDocument";

/// Classification sent with every document-store upload.
const UPLOAD_CLASSIFICATION: &str = "PUBLIC";

/// Service for document operations.
pub struct DocumentsService<'a> {
    client: &'a CaseworkClient,
}

impl<'a> DocumentsService<'a> {
    /// Creates a new documents service.
    pub(crate) fn new(client: &'a CaseworkClient) -> Self {
        Self { client }
    }

    /// Initiates a document upload for a case, returning the event-trigger
    /// token response.
    pub async fn start_upload(
        &self,
        case_type_id: &str,
        case_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let config = self.client.config();
        let details = self.client.provider().user_details().await?;
        let url = format!(
            "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/cases/{}/event-triggers/{}/token",
            config.base_url.trim_end_matches('/'),
            details.id,
            config.jurisdiction_id,
            case_type_id,
            case_id,
            UPLOAD_DOCUMENT_EVENT_ID,
        );
        self.client
            .get_json_with_login(&url, "Start upload document", extra)
            .await
    }

    /// Attaches uploaded documents to a case via the upload-document event.
    pub async fn update_case_documents(
        &self,
        event_token: &str,
        files: Value,
        case_id: &str,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let config = self.client.config();
        let details = self.client.provider().user_details().await?;
        let url = format!(
            "{}/caseworkers/{}/jurisdictions/{}/case-types/{}/cases/{}/events",
            config.base_url.trim_end_matches('/'),
            details.id,
            config.jurisdiction_id,
            case_type_id,
            case_id,
        );
        let payload = json!({
            "data": { "documentCollection": files },
            "event": { "id": UPLOAD_DOCUMENT_EVENT_ID, "summary": "", "description": "" },
            "event_token": event_token,
            "ignore_warning": false,
        });
        self.client
            .post_json_with_login(&url, &payload, "Caseworker update documents", extra)
            .await
    }

    /// Uploads a local file to the document store.
    pub async fn upload_from_path(
        &self,
        path: impl AsRef<std::path::Path>,
        content_type: &str,
    ) -> CaseworkResult<Value> {
        let file = UploadedFile::from_path(path, content_type)?;
        self.upload(&file, "filename").await
    }

    /// Downloads a remote file and uploads it to the document store. The
    /// download itself is unauthenticated; the original filename defaults to
    /// the URL's basename.
    pub async fn upload_from_url(
        &self,
        url: &str,
        content_type: &str,
        original_filename: Option<&str>,
    ) -> CaseworkResult<Value> {
        let bytes = self.client.download_file(url).await?;
        let name = match original_filename {
            Some(name) => name.to_owned(),
            None => url_basename(url),
        };
        let file = UploadedFile::from_bytes(bytes, content_type, name);
        self.upload(&file, "url").await
    }

    /// Uploads a staged file to the document store.
    pub async fn upload(&self, file: &UploadedFile, source_name: &str) -> CaseworkResult<Value> {
        self.client
            .with_login_retry(|| self.upload_once(file, source_name))
            .await
    }

    /// One upload attempt: headers and the multipart form are rebuilt here so
    /// a retried attempt carries refreshed tokens.
    async fn upload_once(&self, file: &UploadedFile, source_name: &str) -> CaseworkResult<Value> {
        let url = format!(
            "{}/documents",
            self.client.config().document_store_url.trim_end_matches('/')
        );
        debug!(source = source_name, url = %url, "uploading file");

        let headers = bearer_headers(self.client.provider().as_ref()).await?;
        let part = Part::bytes(file.read().await?)
            .file_name(file.original_filename().to_owned())
            .mime_str(file.content_type())
            .map_err(|e| {
                CaseworkError::invalid_parameter(format!(
                    "invalid content type {}: {e}",
                    file.content_type()
                ))
            })?;
        let form = Form::new()
            .part("files", part)
            .text("classification", UPLOAD_CLASSIFICATION);

        let subject = format!("Upload file from {source_name}");
        let raw = self
            .client
            .post_multipart(&url, form, &subject, headers)
            .await?;
        let rewritten = self.client.rewriter().rewrite_outbound(&raw);
        serde_json::from_str(&rewritten).map_err(|e| {
            CaseworkError::decode(format!("failed to decode upload response: {e}"))
        })
    }
}

/// The final path segment of a URL, used as a fallback original filename.
fn url_basename(url: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment))
        .unwrap_or_default()
        .to_owned()
}
