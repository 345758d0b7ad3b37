//! # Casework Integration Library
//!
//! A production-ready case-management API client with:
//! - A fixed-size pool of pre-authenticated client instances
//! - Transparent re-login with a single retry on 401/403 denials
//! - A typed error taxonomy carrying the URL, request, and response context
//! - Bidirectional document-store URL rewriting
//! - Caseworker case operations and multipart document upload
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_casework::{
//!     CaseworkClient, CaseworkConfig, ClientPool, StaticIdentityProvider, UserDetails,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CaseworkConfig::builder()
//!         .base_url("http://ccd.internal:4452")
//!         .document_store_url("http://dm.internal:4506")
//!         .build()?;
//!
//!     let provider = Arc::new(StaticIdentityProvider::new(
//!         "user-token",
//!         "service-token",
//!         UserDetails {
//!             id: "51".to_owned(),
//!             roles: vec!["caseworker".to_owned()],
//!         },
//!     ));
//!
//!     let pool = ClientPool::new(config.pool.size, config.pool.acquire_timeout, move || {
//!         CaseworkClient::new(config.clone(), provider.clone())
//!     });
//!
//!     let client = pool.acquire().await?;
//!     let case = client
//!         .cases()
//!         .case("1234567890123456", "Manchester", &Default::default())
//!         .await?;
//!     println!("{case}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;

// Authentication
pub mod auth;

// HTTP client
pub mod client;

// Client pool
pub mod pool;

// Document-store URL rewriting
pub mod rewrite;

// API services
pub mod services;

// File upload handling
pub mod upload;

// Observability
pub mod observability;

// Re-exports for convenience
pub use auth::{IdentityProvider, Session, StaticIdentityProvider, UserDetails};
pub use client::{CaseworkClient, RequestOptions};
pub use config::{CaseworkConfig, CaseworkConfigBuilder, PoolSettings, RewriteRule};
pub use errors::{CaseworkError, CaseworkErrorKind, CaseworkResult, RequestDescriptor};
pub use pool::{ClientPool, PooledClient};
pub use rewrite::DocumentUrlRewriter;
pub use services::{CasesService, DocumentsService, SortDirection};
pub use upload::UploadedFile;
