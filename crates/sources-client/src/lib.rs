//! Source and Inventory Registry Client
//!
//! A Rust client library for the multi-tenant source registry and the
//! inventory registry that lists tenant accounts. Every request carries the
//! base64-encoded tenant identity header.
//!
//! # Example
//!
//! ```no_run
//! use sources_client::{CredentialResolver, SourcesApi, SourcesClient, SourcesClientConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SourcesClient::new(SourcesClientConfig {
//!     sources_url: "http://sources-api:8000".to_string(),
//!     inventory_url: "http://inventory-api:8000".to_string(),
//!     ..Default::default()
//! })?;
//!
//! for tenant in client.list_tenants().await? {
//!     let sources = client.list_sources(&tenant.external_tenant).await?;
//!     println!("{} has {} sources", tenant.external_tenant, sources.len());
//! }
//!
//! // Privileged lookup of an authentication's password
//! let resolver = client.credential_resolver("/internal/v1.0");
//! let credential = resolver.resolve_credential("42", "1000").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Tenant scoping**: identity header on every request
//! - **Pagination**: follows `links.next` until the last page
//! - **Credential lookup**: separate trait for the privileged password lookup
//! - **Mocking**: `test-util` feature exposes an in-memory client

pub mod client;
pub mod common;
pub mod credential;
pub mod error;
pub mod identity;
pub mod models;
#[path = "trait.rs"]
pub mod sources_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::{SourcesClient, SourcesClientConfig};
pub use common::HttpClient;
pub use credential::{CredentialResolver, InternalCredentialResolver};
pub use error::SourcesError;
pub use models::*;
pub use sources_trait::SourcesApi;
#[cfg(feature = "test-util")]
pub use mock::{MockOperation, MockSourcesClient};
