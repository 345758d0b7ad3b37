//! Error types for the casework client.

use once_cell::sync::Lazy;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Result type alias for casework operations.
pub type CaseworkResult<T> = Result<T, CaseworkError>;

/// Error kinds for categorizing casework failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseworkErrorKind {
    // API errors mapped from response statuses
    /// Credentials rejected by the backend (HTTP 401).
    Unauthorized,
    /// Authenticated but not permitted (HTTP 403).
    Forbidden,
    /// Resource absent (HTTP 404).
    NotFound,
    /// Validation failure (HTTP 422).
    UnprocessableEntity,
    /// Any other failure status, or a transport error without a mapped kind.
    Api,

    // Request construction errors
    /// A request body or parameter could not be serialized.
    InvalidParameter,
    /// Invalid client configuration.
    InvalidConfiguration,

    // Response errors
    /// Malformed JSON in a successful response.
    Decode,

    // Local errors
    /// A local file could not be read.
    Io,
    /// Timed out waiting for a pooled client.
    PoolTimeout,
}

impl fmt::Display for CaseworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::NotFound => write!(f, "not_found"),
            Self::UnprocessableEntity => write!(f, "unprocessable_entity"),
            Self::Api => write!(f, "api"),
            Self::InvalidParameter => write!(f, "invalid_parameter"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::Decode => write!(f, "decode"),
            Self::Io => write!(f, "io"),
            Self::PoolTimeout => write!(f, "pool_timeout"),
        }
    }
}

/// Registry mapping a status discriminator to its error kind.
///
/// Classification never inspects statuses directly; adding a new mapped kind
/// is an edit to this table only. Unregistered discriminators fall back to
/// [`CaseworkErrorKind::Api`].
static KIND_REGISTRY: Lazy<HashMap<&'static str, CaseworkErrorKind>> = Lazy::new(|| {
    HashMap::from([
        ("Unauthorized", CaseworkErrorKind::Unauthorized),
        ("Forbidden", CaseworkErrorKind::Forbidden),
        ("NotFound", CaseworkErrorKind::NotFound),
        ("UnprocessableEntity", CaseworkErrorKind::UnprocessableEntity),
    ])
});

/// Looks up the kind registered for a discriminator, falling back to
/// [`CaseworkErrorKind::Api`].
pub fn kind_for_discriminator(discriminator: &str) -> CaseworkErrorKind {
    KIND_REGISTRY
        .get(discriminator)
        .copied()
        .unwrap_or(CaseworkErrorKind::Api)
}

/// Derives the registry discriminator from a status: the canonical reason
/// phrase with whitespace removed, e.g. `422` becomes `UnprocessableEntity`.
fn discriminator_for_status(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or_default()
        .split_whitespace()
        .collect()
}

/// Headers whose values are replaced before being captured in a descriptor.
const REDACTED_HEADERS: [&str; 2] = ["authorization", "serviceauthorization"];

/// A single exchange attempt as captured for error context.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: String,
    /// Request headers, with bearer values redacted.
    pub headers: Vec<(String, String)>,
    /// Request body, if one was sent.
    pub body: Option<String>,
    /// Proxy in effect for the exchange.
    pub proxy: Option<String>,
    /// Whether TLS certificates were verified.
    pub verify_tls: bool,
}

impl RequestDescriptor {
    /// Creates a descriptor for a method and URL.
    pub fn new(method: &Method, url: impl Into<String>) -> Self {
        Self {
            method: method.to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            proxy: None,
            verify_tls: true,
        }
    }

    /// Captures the request headers, redacting bearer tokens.
    pub fn with_headers(mut self, headers: &HeaderMap) -> Self {
        self.headers = headers
            .iter()
            .map(|(name, value)| {
                let captured = if REDACTED_HEADERS.contains(&name.as_str()) {
                    "Bearer ***".to_owned()
                } else {
                    value.to_str().unwrap_or("<opaque>").to_owned()
                };
                (name.as_str().to_owned(), captured)
            })
            .collect();
        self
    }

    /// Captures the request body.
    pub fn with_body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    /// Captures the proxy in effect.
    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Captures the TLS-verification flag.
    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }
}

/// The response that produced a typed error.
#[derive(Debug, Clone)]
pub struct CapturedResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Raw response body.
    pub body: String,
}

/// Casework API error with full exchange context.
#[derive(Error, Debug)]
pub struct CaseworkError {
    kind: CaseworkErrorKind,
    message: String,
    url: Option<String>,
    request: Option<RequestDescriptor>,
    response: Option<CapturedResponse>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CaseworkError {
    /// Creates a new error.
    pub fn new(kind: CaseworkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: None,
            request: None,
            response: None,
            source: None,
        }
    }

    /// Classifies a failed response into a typed error.
    ///
    /// The discriminator derived from `status` selects the kind through the
    /// registry; anything unregistered becomes the base
    /// [`CaseworkErrorKind::Api`] kind.
    pub fn from_response(
        status: StatusCode,
        body: String,
        url: impl Into<String>,
        request: RequestDescriptor,
    ) -> Self {
        let kind = kind_for_discriminator(&discriminator_for_status(status));
        let message = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        Self {
            kind,
            message,
            url: Some(url.into()),
            request: Some(request),
            response: Some(CapturedResponse { status, body }),
            source: None,
        }
    }

    /// Wraps a transport failure that produced no classifiable response.
    pub fn transport(source: reqwest::Error, url: impl Into<String>, request: RequestDescriptor) -> Self {
        Self {
            kind: CaseworkErrorKind::Api,
            message: source.to_string(),
            url: Some(url.into()),
            request: Some(request),
            response: None,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(CaseworkErrorKind::InvalidConfiguration, message)
    }

    /// Creates a serialization error for a request parameter or body.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(CaseworkErrorKind::InvalidParameter, message)
    }

    /// Creates a response-decoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(CaseworkErrorKind::Decode, message)
    }

    /// Creates a local I/O error.
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self {
            kind: CaseworkErrorKind::Io,
            message: message.into(),
            url: None,
            request: None,
            response: None,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a pool-acquire timeout error.
    pub fn pool_timeout(message: impl Into<String>) -> Self {
        Self::new(CaseworkErrorKind::PoolTimeout, message)
    }

    /// Sets the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> CaseworkErrorKind {
        self.kind
    }

    /// Gets the URL of the failed exchange.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Gets the captured request descriptor.
    pub fn request(&self) -> Option<&RequestDescriptor> {
        self.request.as_ref()
    }

    /// Gets the captured response.
    pub fn response(&self) -> Option<&CapturedResponse> {
        self.response.as_ref()
    }

    /// Gets the HTTP status, when a response was received.
    pub fn status_code(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Returns true for the kinds that trigger a re-login retry.
    pub fn is_auth_denied(&self) -> bool {
        matches!(
            self.kind,
            CaseworkErrorKind::Unauthorized | CaseworkErrorKind::Forbidden
        )
    }

    /// Extracts the server-supplied message from the response body: its JSON
    /// `message` or `error` field, or the empty string.
    fn server_message(&self) -> String {
        self.response
            .as_ref()
            .and_then(|r| serde_json::from_str::<Value>(&r.body).ok())
            .and_then(|json| {
                json.get("message")
                    .or_else(|| json.get("error"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
            .unwrap_or_default()
    }

    /// Field-level validation errors from `details.field_errors`, rendered as
    /// `id => message` pairs.
    fn field_errors(&self) -> Option<Vec<String>> {
        let response = self.response.as_ref()?;
        let json: Value = serde_json::from_str(&response.body).ok()?;
        let errors = json.get("details")?.get("field_errors")?.as_array()?;
        Some(
            errors
                .iter()
                .map(|entry| {
                    format!(
                        "{} => {}",
                        entry.get("id").and_then(Value::as_str).unwrap_or_default(),
                        entry
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                    )
                })
                .collect(),
        )
    }

    /// The base rendering: underlying message, extracted server message, and
    /// the URL when one was captured.
    fn fmt_composed(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extracted = self.server_message();
        match &self.url {
            Some(url) => write!(f, "{} - {} ('{}')", self.message, extracted, url),
            None => write!(f, "{} - {}", self.message, extracted),
        }
    }
}

impl fmt::Display for CaseworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CaseworkErrorKind::InvalidParameter
            | CaseworkErrorKind::InvalidConfiguration
            | CaseworkErrorKind::Decode
            | CaseworkErrorKind::Io
            | CaseworkErrorKind::PoolTimeout => write!(f, "{}", self.message),
            CaseworkErrorKind::NotFound => {
                let body_is_json = self
                    .response
                    .as_ref()
                    .is_some_and(|r| serde_json::from_str::<Value>(&r.body).is_ok());
                if body_is_json {
                    self.fmt_composed(f)
                } else {
                    write!(f, "Not Found")
                }
            }
            CaseworkErrorKind::UnprocessableEntity => {
                self.fmt_composed(f)?;
                if let Some(errors) = self.field_errors() {
                    write!(f, " - {}", errors.join(", "))?;
                }
                Ok(())
            }
            _ => self.fmt_composed(f),
        }
    }
}
