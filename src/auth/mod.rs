//! Identity-provider integration for the casework client.
//!
//! The identity provider's own login protocol is not implemented here; it is
//! consumed through [`IdentityProvider`]. A session becomes stale only when
//! the backend rejects a request; there is no local expiry tracking.

use crate::errors::{CaseworkError, CaseworkResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Identity of the logged-in user as reported by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct UserDetails {
    /// User id.
    pub id: String,
    /// Roles granted to the user.
    pub roles: Vec<String>,
}

/// Credentials obtained from the identity provider.
#[derive(Clone)]
pub struct Session {
    /// Token identifying the user.
    pub user_token: SecretString,
    /// Token identifying the calling service.
    pub service_token: SecretString,
    /// The logged-in user.
    pub user_details: UserDetails,
}

/// A client for the identity provider.
///
/// `login` may be called repeatedly; each call refreshes the session. The
/// accessors report the most recent session state.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Populates or refreshes the session.
    async fn login(&self) -> CaseworkResult<()>;

    /// The current user token.
    async fn user_token(&self) -> CaseworkResult<SecretString>;

    /// The current service token.
    async fn service_token(&self) -> CaseworkResult<SecretString>;

    /// The current user details.
    async fn user_details(&self) -> CaseworkResult<UserDetails>;
}

/// Identity provider backed by fixed credentials.
///
/// `login` is a no-op beyond recording that it was called, which makes this
/// provider the natural double for exercising the re-login path in tests.
pub struct StaticIdentityProvider {
    session: Session,
    login_calls: AtomicUsize,
}

impl StaticIdentityProvider {
    /// Creates a provider with fixed tokens and user details.
    pub fn new(
        user_token: impl Into<String>,
        service_token: impl Into<String>,
        user_details: UserDetails,
    ) -> Self {
        Self {
            session: Session {
                user_token: SecretString::new(user_token.into()),
                service_token: SecretString::new(service_token.into()),
                user_details,
            },
            login_calls: AtomicUsize::new(0),
        }
    }

    /// Number of times `login` has been called.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn login(&self) -> CaseworkResult<()> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn user_token(&self) -> CaseworkResult<SecretString> {
        Ok(self.session.user_token.clone())
    }

    async fn service_token(&self) -> CaseworkResult<SecretString> {
        Ok(self.session.service_token.clone())
    }

    async fn user_details(&self) -> CaseworkResult<UserDetails> {
        Ok(self.session.user_details.clone())
    }
}

/// Builds the two bearer headers sent on every authenticated exchange:
/// `ServiceAuthorization` and `Authorization`.
pub async fn bearer_headers(provider: &dyn IdentityProvider) -> CaseworkResult<HeaderMap> {
    let service_token = provider.service_token().await?;
    let user_token = provider.user_token().await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        "serviceauthorization",
        bearer_value(&service_token)?,
    );
    headers.insert(AUTHORIZATION, bearer_value(&user_token)?);
    Ok(headers)
}

/// Builds the full identity header set: the bearer headers plus `user-id`
/// and comma-joined `user-roles`.
pub async fn identity_headers(provider: &dyn IdentityProvider) -> CaseworkResult<HeaderMap> {
    let mut headers = bearer_headers(provider).await?;
    let details = provider.user_details().await?;

    headers.insert("user-id", header_value(&details.id)?);
    headers.insert("user-roles", header_value(&details.roles.join(","))?);
    Ok(headers)
}

fn bearer_value(token: &SecretString) -> CaseworkResult<HeaderValue> {
    let mut value = header_value(&format!("Bearer {}", token.expose_secret()))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(value: &str) -> CaseworkResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CaseworkError::configuration(format!("invalid header value: {e}")))
}
