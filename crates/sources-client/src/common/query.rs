//! Query utilities for the registry APIs
//!
//! Provides helpers for building list queries and handling pagination.

use crate::common::HttpClient;
use crate::error::SourcesError;
use serde::Deserialize;

/// List a collection with a page size, either following every page or returning the first
pub async fn list_resources<T: for<'de> Deserialize<'de>>(
    http: &HttpClient,
    path: &str,
    page_size: u32,
    tenant: &str,
    fetch_all: bool,
) -> Result<Vec<T>, SourcesError> {
    let limit = page_size.to_string();
    let query_string = http.build_query_string(&[("limit", &limit), ("offset", "0")]);
    let url = http.build_url(&format!("{}?{}", path, query_string));

    if fetch_all {
        http.fetch_all_pages(url, tenant).await
    } else {
        Ok(http.fetch_page(&url, tenant).await?.data)
    }
}
