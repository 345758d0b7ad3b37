//! Casework API client implementation.

use crate::auth::{identity_headers, IdentityProvider};
use crate::config::CaseworkConfig;
use crate::errors::{CaseworkError, CaseworkResult, RequestDescriptor};
use crate::observability::Metrics;
use crate::rewrite::DocumentUrlRewriter;
use crate::services::{CasesService, DocumentsService};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, USER_AGENT};
use reqwest::multipart::Form;
use reqwest::{Client as HttpClient, Method};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Per-request options supplied by a caller: extra headers and cookies.
///
/// Caller headers take precedence over anything the executor sets, including
/// the default `content-type` and the identity headers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra request headers.
    pub headers: HeaderMap,
    /// Cookies folded into a `Cookie` header.
    pub cookies: BTreeMap<String, String>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, replacing any previous value for the name.
    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a cookie.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }
}

/// Casework API client.
///
/// One instance holds one identity-provider session; the pool hands instances
/// out for exclusive use, so a client never runs two requests concurrently.
pub struct CaseworkClient {
    /// HTTP client.
    http: HttpClient,
    /// Configuration.
    config: CaseworkConfig,
    /// Identity provider owning the session.
    provider: Arc<dyn IdentityProvider>,
    /// Document-store URL rewriter.
    rewriter: DocumentUrlRewriter,
    /// Metrics collector.
    metrics: Arc<Metrics>,
}

impl CaseworkClient {
    /// Creates a new casework client.
    pub fn new(config: CaseworkConfig, provider: Arc<dyn IdentityProvider>) -> CaseworkResult<Self> {
        config.validate()?;

        let mut builder = HttpClient::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.verify_tls);

        if let Some(proxy) = config.proxy.as_deref().filter(|proxy| !proxy.is_empty()) {
            let proxy = reqwest::Proxy::all(format!("http://{proxy}"))
                .map_err(|e| CaseworkError::configuration(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder.build().map_err(|e| {
            CaseworkError::configuration(format!("failed to create HTTP client: {e}"))
        })?;

        let rewriter = DocumentUrlRewriter::new(config.document_rewrite.clone());

        Ok(Self {
            http,
            config,
            provider,
            rewriter,
            metrics: Arc::new(Metrics::new()),
        })
    }

    /// Logs in via the identity provider, populating or refreshing the
    /// session.
    pub async fn login(&self) -> CaseworkResult<()> {
        self.provider.login().await
    }

    /// Gets the configuration.
    pub fn config(&self) -> &CaseworkConfig {
        &self.config
    }

    /// Gets the identity provider.
    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    /// Gets the document-store URL rewriter.
    pub fn rewriter(&self) -> &DocumentUrlRewriter {
        &self.rewriter
    }

    /// Gets the metrics collector.
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    // Service accessors

    /// Gets the caseworker case-operations service.
    pub fn cases(&self) -> CasesService<'_> {
        CasesService::new(self)
    }

    /// Gets the document-operations service.
    pub fn documents(&self) -> DocumentsService<'_> {
        DocumentsService::new(self)
    }

    // Re-authentication wrapper

    /// Runs `op`, re-logging-in and retrying exactly once when it fails with
    /// `Unauthorized` or `Forbidden`.
    ///
    /// A second auth denial propagates; every other error kind propagates
    /// immediately without a login.
    pub async fn with_login_retry<T, F, Fut>(&self, op: F) -> CaseworkResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CaseworkResult<T>>,
    {
        match op().await {
            Err(e) if e.is_auth_denied() => {
                info!(error = %e, "re-authenticating after denial");
                self.metrics.record_relogin();
                self.provider.login().await?;
                op().await
            }
            other => other,
        }
    }

    // HTTP entry points with transparent re-login

    /// Makes an authenticated GET request and decodes the JSON body,
    /// retrying once with a re-login on an auth denial.
    pub async fn get_json_with_login(
        &self,
        url: &str,
        log_subject: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        self.with_login_retry(|| async move {
            let opts = self.identity_options(extra).await?;
            self.get_json(url, log_subject, &opts).await
        })
        .await
    }

    /// Makes an authenticated GET request and returns the raw body,
    /// retrying once with a re-login on an auth denial.
    pub async fn get_text_with_login(
        &self,
        url: &str,
        log_subject: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<String> {
        self.with_login_retry(|| async move {
            let opts = self.identity_options(extra).await?;
            self.get_text(url, log_subject, &opts).await
        })
        .await
    }

    /// Makes an authenticated POST request and decodes the JSON body,
    /// retrying once with a re-login on an auth denial.
    pub async fn post_json_with_login<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        log_subject: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        self.with_login_retry(|| async move {
            let opts = self.identity_options(extra).await?;
            self.post_json(url, body, log_subject, &opts).await
        })
        .await
    }

    /// Makes an authenticated POST request and returns the raw body,
    /// retrying once with a re-login on an auth denial.
    pub async fn post_text_with_login<B: Serialize + Sync>(
        &self,
        url: &str,
        body: &B,
        log_subject: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<String> {
        self.with_login_retry(|| async move {
            let opts = self.identity_options(extra).await?;
            self.post_text(url, body, log_subject, &opts).await
        })
        .await
    }

    // Single-exchange executors (no retry at this layer)

    /// Makes a GET request and decodes the JSON body.
    pub async fn get_json(
        &self,
        url: &str,
        log_subject: &str,
        opts: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let body = self.execute(Method::GET, url, None, log_subject, opts).await?;
        decode_json(&body)
    }

    /// Makes a GET request and returns the raw body.
    pub async fn get_text(
        &self,
        url: &str,
        log_subject: &str,
        opts: &RequestOptions,
    ) -> CaseworkResult<String> {
        self.execute(Method::GET, url, None, log_subject, opts).await
    }

    /// Makes a POST request and decodes the JSON body.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        log_subject: &str,
        opts: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let payload = encode_json(body)?;
        let body = self
            .execute(Method::POST, url, Some(payload), log_subject, opts)
            .await?;
        decode_json(&body)
    }

    /// Makes a POST request and returns the raw body.
    pub async fn post_text<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        log_subject: &str,
        opts: &RequestOptions,
    ) -> CaseworkResult<String> {
        let payload = encode_json(body)?;
        self.execute(Method::POST, url, Some(payload), log_subject, opts)
            .await
    }

    /// Posts a multipart form and returns the raw body. The form cannot be
    /// reused, so callers compose this with [`Self::with_login_retry`] by
    /// rebuilding the form per attempt.
    pub async fn post_multipart(
        &self,
        url: &str,
        form: Form,
        log_subject: &str,
        headers: HeaderMap,
    ) -> CaseworkResult<String> {
        let descriptor = self.descriptor(&Method::POST, url, &headers, None);

        debug!(method = %Method::POST, subject = log_subject, url, "sending request");
        self.metrics.record_request();
        let started = Instant::now();

        let response = self
            .http
            .post(url)
            .headers(headers)
            .multipart(form)
            .send()
            .await;
        self.handle_response(response, started, url, log_subject, descriptor)
            .await
    }

    /// Downloads a remote file without authentication, returning its bytes.
    pub async fn download_file(&self, url: &str) -> CaseworkResult<Vec<u8>> {
        debug!(url, "downloading remote file");
        let descriptor = self.descriptor(&Method::GET, url, &HeaderMap::new(), None);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CaseworkError::transport(e, url, descriptor.clone()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CaseworkError::transport(e, url, descriptor.clone()))?;

        if !status.is_success() {
            debug!(url, status = status.as_u16(), "download failed");
            return Err(CaseworkError::from_response(
                status,
                String::from_utf8_lossy(&bytes).into_owned(),
                url,
                descriptor,
            ));
        }

        debug!(url, "download complete, body not logged (likely binary)");
        Ok(bytes.to_vec())
    }

    /// Merges the identity headers under the caller's extras; the caller wins
    /// on conflict. Built per attempt so a retried request carries refreshed
    /// tokens.
    pub async fn identity_options(&self, extra: &RequestOptions) -> CaseworkResult<RequestOptions> {
        let mut opts = extra.clone();
        let identity = identity_headers(self.provider.as_ref()).await?;
        for (name, value) in identity.iter() {
            if !opts.headers.contains_key(name) {
                opts.headers.insert(name.clone(), value.clone());
            }
        }
        Ok(opts)
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
        log_subject: &str,
        opts: &RequestOptions,
    ) -> CaseworkResult<String> {
        let headers = self.build_headers(opts)?;
        let descriptor = self.descriptor(&method, url, &headers, body.clone());

        debug!(method = %method, subject = log_subject, url, "sending request");
        self.metrics.record_request();
        let started = Instant::now();

        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await;
        self.handle_response(response, started, url, log_subject, descriptor)
            .await
    }

    async fn handle_response(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
        started: Instant,
        url: &str,
        log_subject: &str,
        descriptor: RequestDescriptor,
    ) -> CaseworkResult<String> {
        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_failure();
                debug!(subject = log_subject, error = %e, "transport failure");
                return Err(CaseworkError::transport(e, url, descriptor));
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                self.metrics.record_failure();
                return Err(CaseworkError::transport(e, url, descriptor));
            }
        };
        self.metrics.record_latency(started.elapsed());

        if !status.is_success() {
            self.metrics.record_failure();
            debug!(subject = log_subject, body = %text, "request failed");
            return Err(CaseworkError::from_response(status, text, url, descriptor));
        }

        debug!(subject = log_subject, body = %text, "response received");
        Ok(text)
    }

    fn build_headers(&self, opts: &RequestOptions) -> CaseworkResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.config.user_agent)
                .map_err(|e| CaseworkError::configuration(format!("invalid user agent: {e}")))?,
        );

        for (name, value) in opts.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        if !opts.cookies.is_empty() {
            let cookie = opts
                .cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&cookie)
                    .map_err(|e| CaseworkError::configuration(format!("invalid cookie: {e}")))?,
            );
        }

        Ok(headers)
    }

    fn descriptor(
        &self,
        method: &Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<String>,
    ) -> RequestDescriptor {
        RequestDescriptor::new(method, url)
            .with_headers(headers)
            .with_body(body)
            .with_proxy(self.config.proxy.clone())
            .with_verify_tls(self.config.verify_tls)
    }
}

fn encode_json<B: Serialize + ?Sized>(body: &B) -> CaseworkResult<String> {
    serde_json::to_string(body)
        .map_err(|e| CaseworkError::invalid_parameter(format!("failed to serialize request body: {e}")))
}

fn decode_json(body: &str) -> CaseworkResult<Value> {
    serde_json::from_str(body)
        .map_err(|e| CaseworkError::decode(format!("failed to decode response body: {e}")).with_source(e))
}
