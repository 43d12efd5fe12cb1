//! Integration tests for the registry client
//!
//! These tests require running source and inventory registries.
//! Set SOURCES_URL and INVENTORY_URL environment variables to run.

use sources_client::{SourcesApi, SourcesClient, SourcesClientConfig};

fn client() -> SourcesClient {
    let sources_url =
        std::env::var("SOURCES_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());
    let inventory_url =
        std::env::var("INVENTORY_URL").unwrap_or_else(|_| "http://localhost:8001".to_string());

    SourcesClient::new(SourcesClientConfig {
        sources_url,
        inventory_url,
        ..Default::default()
    })
    .expect("Failed to create client")
}

#[tokio::test]
#[ignore] // Requires running inventory registry
async fn test_list_tenants() {
    let tenants = client().list_tenants().await.expect("Failed to list tenants");
    println!("Found {} tenants", tenants.len());
}

#[tokio::test]
#[ignore]
async fn test_list_source_types() {
    let types = client()
        .list_source_types()
        .await
        .expect("Failed to list source types");
    assert!(types.iter().all(|t| !t.name.is_empty()));
}

#[tokio::test]
#[ignore]
async fn test_walk_first_tenant() {
    let client = client();
    let tenants = client.list_tenants().await.expect("Failed to list tenants");
    let Some(tenant) = tenants.first() else {
        return;
    };

    let sources = client
        .list_sources(&tenant.external_tenant)
        .await
        .expect("Failed to list sources");

    for source in sources.iter().take(5) {
        let endpoints = client
            .list_endpoints(&tenant.external_tenant, &source.id)
            .await
            .expect("Failed to list endpoints");
        println!("Source {} has {} endpoints", source.id, endpoints.len());
    }
}
