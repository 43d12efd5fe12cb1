//! Mock registry client for unit testing
//!
//! This module provides an in-memory implementation of [`SourcesApi`] and
//! [`CredentialResolver`] so controller tests can run without either registry.

use crate::credential::CredentialResolver;
use crate::error::SourcesError;
use crate::models::*;
use crate::sources_trait::SourcesApi;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use workload_spec::Credential;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    ListTenants,
    ListSourceTypes,
    ListSources,
    ListEndpoints,
    ListAuthentications,
    ResolveCredential,
}

/// Mock registry client for testing
///
/// Stores registry content in memory. Clones share state, so a test can keep
/// one handle for setup while the code under test owns another.
#[derive(Clone, Default)]
pub struct MockSourcesClient {
    tenants: Arc<Mutex<Vec<Tenant>>>,
    source_types: Arc<Mutex<Vec<SourceType>>>,
    // Keyed by tenant account
    sources: Arc<Mutex<HashMap<String, Vec<RegisteredSource>>>>,
    // Keyed by source id
    endpoints: Arc<Mutex<HashMap<String, Vec<Endpoint>>>>,
    // Keyed by endpoint id
    authentications: Arc<Mutex<HashMap<String, Vec<Authentication>>>>,
    // Keyed by authentication id
    credentials: Arc<Mutex<HashMap<String, Credential>>>,
    failing: Arc<Mutex<HashSet<MockOperation>>>,
    credential_lookups: Arc<Mutex<u64>>,
}

impl MockSourcesClient {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tenant account
    pub fn add_tenant(&self, account: &str) {
        let mut tenants = self.tenants.lock().unwrap();
        let id = (tenants.len() + 1).to_string();
        tenants.push(Tenant {
            id,
            external_tenant: account.to_string(),
        });
    }

    /// Add a source type
    pub fn add_source_type(&self, id: &str, name: &str) {
        self.source_types.lock().unwrap().push(SourceType {
            id: id.to_string(),
            name: name.to_string(),
            product_name: None,
        });
    }

    /// Register a source under a tenant
    pub fn add_source(&self, tenant: &str, id: &str, uid: &str, source_type_id: &str) {
        self.sources
            .lock()
            .unwrap()
            .entry(tenant.to_string())
            .or_default()
            .push(RegisteredSource {
                id: id.to_string(),
                uid: uid.to_string(),
                source_type_id: source_type_id.to_string(),
                name: None,
                tenant: String::new(),
            });
    }

    /// Remove a source (and leave its endpoints dangling, as a deleted source would)
    pub fn remove_source(&self, tenant: &str, id: &str) {
        if let Some(sources) = self.sources.lock().unwrap().get_mut(tenant) {
            sources.retain(|s| s.id != id);
        }
    }

    /// Attach an endpoint to a source
    pub fn add_endpoint(&self, source_id: &str, endpoint: Endpoint) {
        self.endpoints
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push(endpoint);
    }

    /// Attach an authentication to an endpoint
    pub fn add_authentication(&self, endpoint_id: &str, authentication: Authentication) {
        self.authentications
            .lock()
            .unwrap()
            .entry(endpoint_id.to_string())
            .or_default()
            .push(authentication);
    }

    /// Set (or rotate) the secret value of an authentication
    pub fn set_credential(&self, authentication_id: &str, username: &str, password: &str) {
        self.credentials
            .lock()
            .unwrap()
            .insert(authentication_id.to_string(), Credential::new(username, password));
    }

    /// Make an operation fail until [`MockSourcesClient::clear_failures`] is called
    pub fn fail(&self, operation: MockOperation) {
        self.failing.lock().unwrap().insert(operation);
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Number of privileged credential lookups served
    pub fn credential_lookups(&self) -> u64 {
        *self.credential_lookups.lock().unwrap()
    }

    fn check(&self, operation: MockOperation) -> Result<(), SourcesError> {
        if self.failing.lock().unwrap().contains(&operation) {
            return Err(SourcesError::Api(format!("injected failure for {:?}", operation)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SourcesApi for MockSourcesClient {
    async fn list_tenants(&self) -> Result<Vec<Tenant>, SourcesError> {
        self.check(MockOperation::ListTenants)?;
        Ok(self.tenants.lock().unwrap().clone())
    }

    async fn list_source_types(&self) -> Result<Vec<SourceType>, SourcesError> {
        self.check(MockOperation::ListSourceTypes)?;
        Ok(self.source_types.lock().unwrap().clone())
    }

    async fn list_sources(&self, tenant: &str) -> Result<Vec<RegisteredSource>, SourcesError> {
        self.check(MockOperation::ListSources)?;
        let mut sources = self
            .sources
            .lock()
            .unwrap()
            .get(tenant)
            .cloned()
            .unwrap_or_default();
        for source in &mut sources {
            source.tenant = tenant.to_string();
        }
        Ok(sources)
    }

    async fn list_endpoints(&self, _tenant: &str, source_id: &str) -> Result<Vec<Endpoint>, SourcesError> {
        self.check(MockOperation::ListEndpoints)?;
        Ok(self
            .endpoints
            .lock()
            .unwrap()
            .get(source_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_authentications(
        &self,
        _tenant: &str,
        endpoint_id: &str,
    ) -> Result<Vec<Authentication>, SourcesError> {
        self.check(MockOperation::ListAuthentications)?;
        Ok(self
            .authentications
            .lock()
            .unwrap()
            .get(endpoint_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl CredentialResolver for MockSourcesClient {
    async fn resolve_credential(
        &self,
        authentication_id: &str,
        _tenant: &str,
    ) -> Result<Option<Credential>, SourcesError> {
        self.check(MockOperation::ResolveCredential)?;
        *self.credential_lookups.lock().unwrap() += 1;
        Ok(self.credentials.lock().unwrap().get(authentication_id).cloned())
    }
}
