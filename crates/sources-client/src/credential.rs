//! Privileged credential lookup
//!
//! The only code path that asks the source registry to expose an otherwise
//! redacted password. It is deliberately separate from [`SourcesApi`](crate::SourcesApi)
//! and talks to the registry's internal API prefix, so the elevated trust
//! boundary can be reviewed and permissioned on its own.

use crate::common::HttpClient;
use crate::error::SourcesError;
use crate::models::ExposedAuthentication;
use tracing::debug;
use workload_spec::Credential;

/// Resolves the secret value of an authentication
#[async_trait::async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve the credential of `authentication_id` acting as `tenant`
    ///
    /// Returns `Ok(None)` when the registry holds no password for the
    /// authentication or the authentication no longer exists.
    async fn resolve_credential(
        &self,
        authentication_id: &str,
        tenant: &str,
    ) -> Result<Option<Credential>, SourcesError>;
}

/// Credential resolver backed by the source registry's internal API
#[derive(Debug, Clone)]
pub struct InternalCredentialResolver {
    http: HttpClient,
    internal_path_prefix: String,
}

impl InternalCredentialResolver {
    /// Create a resolver
    ///
    /// # Arguments
    /// * `http` - HTTP client bound to the source registry
    /// * `internal_path_prefix` - Internal API prefix (e.g., "/internal/v1.0")
    pub fn new(http: HttpClient, internal_path_prefix: impl Into<String>) -> Self {
        Self {
            http,
            internal_path_prefix: internal_path_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    fn authentication_path(&self, authentication_id: &str) -> String {
        format!(
            "{}/authentications/{}?{}",
            self.internal_path_prefix,
            urlencoding::encode(authentication_id),
            self.http
                .build_query_string(&[("expose_encrypted_attribute[]", "password")])
        )
    }
}

#[async_trait::async_trait]
impl CredentialResolver for InternalCredentialResolver {
    async fn resolve_credential(
        &self,
        authentication_id: &str,
        tenant: &str,
    ) -> Result<Option<Credential>, SourcesError> {
        debug!("Resolving credential for authentication {}", authentication_id);

        let exposed: ExposedAuthentication = match self
            .http
            .get(&self.authentication_path(authentication_id), tenant)
            .await
        {
            Ok(exposed) => exposed,
            // Removed since it was listed
            Err(SourcesError::NotFound(_)) => {
                debug!("Authentication {} no longer exists", authentication_id);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(exposed
            .password
            .map(|password| Credential::new(exposed.username.unwrap_or_default(), password)))
    }
}
