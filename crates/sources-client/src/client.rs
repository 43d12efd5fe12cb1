//! Registry API client
//!
//! Talks to two registries: the inventory registry, which knows the tenant
//! accounts, and the source registry, which holds per-tenant sources, their
//! endpoints and authentications. Both speak the same paginated JSON envelope.

use crate::common::HttpClient;
use crate::common::query::list_resources;
use crate::credential::InternalCredentialResolver;
use crate::error::SourcesError;
use crate::identity::SYSTEM_ACCOUNT;
use crate::models::*;
use crate::sources_trait::SourcesApi;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Connection settings for both registries
#[derive(Debug, Clone)]
pub struct SourcesClientConfig {
    /// Source registry base URL (e.g., "http://sources-api:8000")
    pub sources_url: String,
    /// Inventory registry base URL (e.g., "http://inventory-api:8000")
    pub inventory_url: String,
    /// Public API prefix of the source registry
    pub sources_path_prefix: String,
    /// Internal API prefix of the inventory registry
    pub inventory_path_prefix: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Records requested per page
    pub page_size: u32,
}

impl Default for SourcesClientConfig {
    fn default() -> Self {
        Self {
            sources_url: String::new(),
            inventory_url: String::new(),
            sources_path_prefix: "/api/sources/v1.0".to_string(),
            inventory_path_prefix: "/internal/v1.0".to_string(),
            timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Source and inventory registry client
#[derive(Debug, Clone)]
pub struct SourcesClient {
    sources: HttpClient,
    inventory: HttpClient,
    sources_path_prefix: String,
    inventory_path_prefix: String,
    page_size: u32,
}

impl SourcesClient {
    /// Create a new client
    ///
    /// Both base URLs are validated up front so a typo fails at startup rather
    /// than on the first poll.
    pub fn new(config: SourcesClientConfig) -> Result<Self, SourcesError> {
        validate_url(&config.sources_url)?;
        validate_url(&config.inventory_url)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(SourcesError::Http)?;

        Ok(Self {
            sources: HttpClient::new(client.clone(), config.sources_url),
            inventory: HttpClient::new(client, config.inventory_url),
            sources_path_prefix: trim_prefix(&config.sources_path_prefix),
            inventory_path_prefix: trim_prefix(&config.inventory_path_prefix),
            page_size: config.page_size.max(1),
        })
    }

    /// Source registry base URL
    pub fn sources_url(&self) -> &str {
        self.sources.base_url()
    }

    /// Inventory registry base URL
    pub fn inventory_url(&self) -> &str {
        self.inventory.base_url()
    }

    /// Build the privileged credential resolver sharing this client's connection pool
    pub fn credential_resolver(&self, internal_path_prefix: &str) -> InternalCredentialResolver {
        InternalCredentialResolver::new(self.sources.clone(), internal_path_prefix)
    }

    fn sources_path(&self, suffix: &str) -> String {
        format!("{}{}", self.sources_path_prefix, suffix)
    }
}

fn validate_url(url: &str) -> Result<(), SourcesError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| SourcesError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(SourcesError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            url, other
        ))),
    }
}

fn trim_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[async_trait::async_trait]
impl SourcesApi for SourcesClient {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, SourcesError> {
        let path = format!("{}/tenants", self.inventory_path_prefix);
        debug!("Listing tenants from {}", self.inventory.base_url());
        list_resources(&self.inventory, &path, self.page_size, SYSTEM_ACCOUNT, true).await
    }

    async fn list_source_types(&self) -> Result<Vec<SourceType>, SourcesError> {
        let path = self.sources_path("/source_types");
        list_resources(&self.sources, &path, self.page_size, SYSTEM_ACCOUNT, true).await
    }

    async fn list_sources(&self, tenant: &str) -> Result<Vec<RegisteredSource>, SourcesError> {
        let path = self.sources_path("/sources");
        let mut sources: Vec<RegisteredSource> =
            list_resources(&self.sources, &path, self.page_size, tenant, true).await?;
        for source in &mut sources {
            source.tenant = tenant.to_string();
        }
        debug!("Tenant {} has {} sources", tenant, sources.len());
        Ok(sources)
    }

    async fn list_endpoints(&self, tenant: &str, source_id: &str) -> Result<Vec<Endpoint>, SourcesError> {
        let path = self.sources_path(&format!(
            "/sources/{}/endpoints",
            urlencoding::encode(source_id)
        ));
        list_resources(&self.sources, &path, self.page_size, tenant, false).await
    }

    async fn list_authentications(
        &self,
        tenant: &str,
        endpoint_id: &str,
    ) -> Result<Vec<Authentication>, SourcesError> {
        let path = self.sources_path(&format!(
            "/endpoints/{}/authentications",
            urlencoding::encode(endpoint_id)
        ));
        list_resources(&self.sources, &path, self.page_size, tenant, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::CredentialResolver;
    use crate::identity::{IDENTITY_HEADER, encode_identity};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, page_size: u32) -> SourcesClient {
        SourcesClient::new(SourcesClientConfig {
            sources_url: server.uri(),
            inventory_url: server.uri(),
            page_size,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_invalid_urls_are_rejected() {
        let config = SourcesClientConfig {
            sources_url: "not a url".to_string(),
            inventory_url: "http://inventory".to_string(),
            ..Default::default()
        };
        assert!(matches!(SourcesClient::new(config), Err(SourcesError::InvalidUrl(_))));

        let config = SourcesClientConfig {
            sources_url: "http://sources".to_string(),
            inventory_url: "ftp://inventory".to_string(),
            ..Default::default()
        };
        assert!(matches!(SourcesClient::new(config), Err(SourcesError::InvalidUrl(_))));
    }

    #[test]
    fn test_prefixes_are_normalized() {
        assert_eq!(trim_prefix("/api/sources/v1.0/"), "/api/sources/v1.0");
        assert_eq!(trim_prefix("internal/v1.0"), "/internal/v1.0");
        assert_eq!(trim_prefix(""), "");
    }

    #[tokio::test]
    async fn test_list_tenants_uses_system_account() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/internal/v1.0/tenants"))
            .and(query_param("limit", "100"))
            .and(header(IDENTITY_HEADER, encode_identity(SYSTEM_ACCOUNT).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": {"next": null},
                "data": [
                    {"id": 1, "external_tenant": "1000"},
                    {"id": 2, "external_tenant": "2000"},
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tenants = client_for(&server, DEFAULT_PAGE_SIZE).list_tenants().await.unwrap();
        let accounts: Vec<_> = tenants.iter().map(|t| t.external_tenant.as_str()).collect();
        assert_eq!(accounts, vec!["1000", "2000"]);
    }

    #[tokio::test]
    async fn test_list_sources_follows_pages_and_tags_tenant() {
        let server = MockServer::start().await;

        let source = |i: usize| serde_json::json!({"id": i, "uid": format!("u{}", i), "source_type_id": 1});

        Mock::given(method("GET"))
            .and(path("/api/sources/v1.0/sources"))
            .and(query_param("offset", "0"))
            .and(header(IDENTITY_HEADER, encode_identity("acct-9").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": {"next": "/api/sources/v1.0/sources?limit=2&offset=2"},
                "data": [source(1), source(2)],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/sources/v1.0/sources"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": {},
                "data": [source(3)],
            })))
            .mount(&server)
            .await;

        let sources = client_for(&server, 2).list_sources("acct-9").await.unwrap();
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().all(|s| s.tenant == "acct-9"));
    }

    #[tokio::test]
    async fn test_endpoints_only_read_first_page() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/sources/v1.0/sources/5/endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "links": {"next": "/api/sources/v1.0/sources/5/endpoints?offset=1"},
                "data": [{"id": "50", "host": "h.example.com", "port": 443, "scheme": "https"}],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoints = client_for(&server, 1).list_endpoints("acct", "5").await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].host.as_deref(), Some("h.example.com"));
        assert_eq!(endpoints[0].port, Some(443));
    }

    #[tokio::test]
    async fn test_list_authentications() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/sources/v1.0/endpoints/50/authentications"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": 500, "authtype": "token", "username": "svc"}],
            })))
            .mount(&server)
            .await;

        let auths = client_for(&server, 10).list_authentications("acct", "50").await.unwrap();
        assert_eq!(auths[0].id, "500");
        assert_eq!(auths[0].username.as_deref(), Some("svc"));
    }

    #[tokio::test]
    async fn test_list_source_types_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/sources/v1.0/source_types"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server, 10).list_source_types().await;
        assert!(matches!(result, Err(SourcesError::Api(_))));
    }

    #[tokio::test]
    async fn test_credential_resolver_shares_source_registry() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/internal/v1.0/authentications/500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "500",
                "username": "svc",
                "password": "pw",
            })))
            .mount(&server)
            .await;

        let resolver = client_for(&server, 10).credential_resolver("/internal/v1.0");
        let credential = resolver.resolve_credential("500", "acct").await.unwrap().unwrap();
        assert_eq!(credential.password(), "pw");
    }
}
