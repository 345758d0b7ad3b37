//! Configuration types for the casework client.

use crate::errors::{CaseworkError, CaseworkResult};
use std::time::Duration;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-casework/0.1.0";

/// Default jurisdiction identifier.
pub const DEFAULT_JURISDICTION_ID: &str = "EMPLOYMENT";

/// Default event id for starting a single-claim case.
pub const DEFAULT_INITIATE_CLAIM_EVENT_ID: &str = "initiateCase";

/// Default event id for starting a bulk case.
pub const DEFAULT_INITIATE_BULK_EVENT_ID: &str = "createMultiple";

/// Default number of pooled client instances.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Default time to wait for a pooled client before failing.
pub const DEFAULT_POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Document-store host rewrite rule.
///
/// Response bodies have occurrences of the internal authority swapped for the
/// external one (and back), preserving the URL scheme of each match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    /// Host as routable from inside the deployment.
    pub internal_host: String,
    /// Port paired with the internal host.
    pub internal_port: u16,
    /// Host as reachable by external consumers.
    pub external_host: String,
    /// Port paired with the external host.
    pub external_port: u16,
}

impl RewriteRule {
    /// Creates a rewrite rule from the two host:port pairs.
    pub fn new(
        internal_host: impl Into<String>,
        internal_port: u16,
        external_host: impl Into<String>,
        external_port: u16,
    ) -> Self {
        Self {
            internal_host: internal_host.into(),
            internal_port,
            external_host: external_host.into(),
            external_port,
        }
    }

    /// The internal `host:port` authority.
    pub fn internal_authority(&self) -> String {
        format!("{}:{}", self.internal_host, self.internal_port)
    }

    /// The external `host:port` authority.
    pub fn external_authority(&self) -> String {
        format!("{}:{}", self.external_host, self.external_port)
    }
}

/// Client pool settings.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum number of pooled client instances.
    pub size: usize,
    /// How long an acquire may block before failing with a pool timeout.
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            size: DEFAULT_POOL_SIZE,
            acquire_timeout: DEFAULT_POOL_ACQUIRE_TIMEOUT,
        }
    }
}

/// Casework client configuration.
#[derive(Debug, Clone)]
pub struct CaseworkConfig {
    /// Case-data API base URL.
    pub base_url: String,
    /// Document-store API base URL.
    pub document_store_url: String,
    /// Endpoint for starting a multiple, when the deployment provides one.
    pub start_multiple_url: Option<String>,
    /// Jurisdiction scoping every caseworker path.
    pub jurisdiction_id: String,
    /// Event id used when starting single-claim case creation.
    pub initiate_claim_event_id: String,
    /// Event id used when starting bulk case creation.
    pub initiate_bulk_event_id: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Whether TLS certificates are verified.
    pub verify_tls: bool,
    /// Proxy authority (`host:port`), or no proxy.
    pub proxy: Option<String>,
    /// Document-store URL rewriting, or disabled.
    pub document_rewrite: Option<RewriteRule>,
    /// Client pool settings.
    pub pool: PoolSettings,
}

impl CaseworkConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CaseworkConfigBuilder {
        CaseworkConfigBuilder::new()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CaseworkResult<()> {
        validate_url("base_url", &self.base_url)?;
        validate_url("document_store_url", &self.document_store_url)?;
        if let Some(url) = &self.start_multiple_url {
            validate_url("start_multiple_url", url)?;
        }
        if self.jurisdiction_id.is_empty() {
            return Err(CaseworkError::configuration(
                "jurisdiction_id cannot be empty",
            ));
        }
        if self.pool.size == 0 {
            return Err(CaseworkError::configuration(
                "pool size must be at least 1",
            ));
        }
        Ok(())
    }
}

fn validate_url(field: &str, url: &str) -> CaseworkResult<()> {
    if url.is_empty() {
        return Err(CaseworkError::configuration(format!(
            "{field} cannot be empty"
        )));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(CaseworkError::configuration(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Builder for [`CaseworkConfig`].
#[derive(Debug, Default)]
pub struct CaseworkConfigBuilder {
    base_url: Option<String>,
    document_store_url: Option<String>,
    start_multiple_url: Option<String>,
    jurisdiction_id: Option<String>,
    initiate_claim_event_id: Option<String>,
    initiate_bulk_event_id: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
    verify_tls: Option<bool>,
    proxy: Option<String>,
    document_rewrite: Option<RewriteRule>,
    pool: Option<PoolSettings>,
}

impl CaseworkConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the case-data API base URL (required).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the document-store API base URL (required).
    pub fn document_store_url(mut self, url: impl Into<String>) -> Self {
        self.document_store_url = Some(url.into());
        self
    }

    /// Sets the start-multiple endpoint.
    pub fn start_multiple_url(mut self, url: impl Into<String>) -> Self {
        self.start_multiple_url = Some(url.into());
        self
    }

    /// Sets the jurisdiction id.
    pub fn jurisdiction_id(mut self, id: impl Into<String>) -> Self {
        self.jurisdiction_id = Some(id.into());
        self
    }

    /// Sets the event id for starting single-claim case creation.
    pub fn initiate_claim_event_id(mut self, id: impl Into<String>) -> Self {
        self.initiate_claim_event_id = Some(id.into());
        self
    }

    /// Sets the event id for starting bulk case creation.
    pub fn initiate_bulk_event_id(mut self, id: impl Into<String>) -> Self {
        self.initiate_bulk_event_id = Some(id.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Sets whether TLS certificates are verified.
    pub fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    /// Sets the proxy authority (`host:port`). An empty string disables the
    /// proxy, matching an unset value.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Enables document-store URL rewriting.
    pub fn document_rewrite(mut self, rule: RewriteRule) -> Self {
        self.document_rewrite = Some(rule);
        self
    }

    /// Sets the client pool settings.
    pub fn pool(mut self, pool: PoolSettings) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> CaseworkResult<CaseworkConfig> {
        let config = CaseworkConfig {
            base_url: self
                .base_url
                .ok_or_else(|| CaseworkError::configuration("base_url is required"))?,
            document_store_url: self
                .document_store_url
                .ok_or_else(|| CaseworkError::configuration("document_store_url is required"))?,
            start_multiple_url: self.start_multiple_url,
            jurisdiction_id: self
                .jurisdiction_id
                .unwrap_or_else(|| DEFAULT_JURISDICTION_ID.to_string()),
            initiate_claim_event_id: self
                .initiate_claim_event_id
                .unwrap_or_else(|| DEFAULT_INITIATE_CLAIM_EVENT_ID.to_string()),
            initiate_bulk_event_id: self
                .initiate_bulk_event_id
                .unwrap_or_else(|| DEFAULT_INITIATE_BULK_EVENT_ID.to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            verify_tls: self.verify_tls.unwrap_or(true),
            proxy: self.proxy.filter(|proxy| !proxy.is_empty()),
            document_rewrite: self.document_rewrite,
            pool: self.pool.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}
