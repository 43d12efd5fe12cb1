//! Common utilities for the registry clients
//!
//! Provides the shared HTTP wrapper used by both registries and by the
//! privileged credential lookup.

pub mod query;

use crate::error::SourcesError;
use crate::identity::{IDENTITY_HEADER, encode_identity};
use crate::models::PaginatedResponse;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// HTTP client wrapper bound to one registry base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path (absolute URLs are returned unchanged)
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Send an authenticated GET acting as `tenant`
    async fn send_get(&self, url: &str, tenant: &str) -> Result<Response, SourcesError> {
        self.client
            .get(url)
            .header(IDENTITY_HEADER, encode_identity(tenant))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(SourcesError::Http)
    }

    /// Fetch a single page
    pub async fn fetch_page<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        tenant: &str,
    ) -> Result<PaginatedResponse<T>, SourcesError> {
        debug!("Fetching page: {}", url);

        let response = self.send_get(url, tenant).await?;

        let status = response.status();
        if status == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourcesError::NotFound(format!("{} - {}", url, body)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourcesError::Api(format!(
                "Failed to fetch page {}: {} - {}",
                url, status, body
            )));
        }

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            SourcesError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Fetch all pages of a paginated response, following `links.next`
    ///
    /// Any failing page fails the whole listing; no partial result is returned.
    pub async fn fetch_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        mut url: String,
        tenant: &str,
    ) -> Result<Vec<T>, SourcesError> {
        let mut all_results = Vec::new();
        let mut visited = HashSet::new();

        loop {
            if !visited.insert(url.clone()) {
                return Err(SourcesError::Pagination(format!(
                    "next link {} was already visited",
                    url
                )));
            }

            let page: PaginatedResponse<T> = self.fetch_page(&url, tenant).await?;
            all_results.extend(page.data);

            match page.links.next {
                Some(next_url) if !next_url.is_empty() => {
                    url = self.build_url(&next_url);
                }
                _ => break,
            }
        }

        Ok(all_results)
    }

    /// Make a GET request for a single document
    pub async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        tenant: &str,
    ) -> Result<T, SourcesError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.send_get(&url, tenant).await?;

        let status = response.status();
        if status == 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourcesError::NotFound(format!(
                "Resource not found: {} - {}",
                path, body
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourcesError::Api(format!(
                "GET {} failed: {} - {}",
                path, status, body
            )));
        }

        response.json().await.map_err(SourcesError::Http)
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(&str, &str)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}
