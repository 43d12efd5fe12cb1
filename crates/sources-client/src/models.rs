//! Registry API models
//!
//! These models match the JSON documents returned by the source and inventory
//! registries. Ids are strings on the wire but some deployments emit integers,
//! so id fields accept both.

use serde::{Deserialize, Deserializer, Serialize};

/// Paginated list response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub meta: Option<PageMeta>,
    #[serde(default)]
    pub links: PageLinks,
    pub data: Vec<T>,
}

/// Pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

/// Pagination links; `next` is absent (or null) on the last page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub first: Option<String>,
    #[serde(default)]
    pub last: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub prev: Option<String>,
}

/// Tenant known to the inventory registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Account number used in the identity header
    pub external_tenant: String,
}

/// Source type (e.g., "openshift", "amazon")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceType {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub product_name: Option<String>,
}

/// Source registered by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredSource {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub uid: String,
    #[serde(deserialize_with = "string_or_number")]
    pub source_type_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Tenant account the source was listed under (filled in by the client)
    #[serde(skip_deserializing, default)]
    pub tenant: String,
}

/// Endpoint of a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub default: Option<bool>,
}

/// Authentication attached to an endpoint (password redacted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub authtype: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Authentication returned by the privileged lookup with the password exposed
#[derive(Clone, Deserialize)]
pub struct ExposedAuthentication {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl std::fmt::Debug for ExposedAuthentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExposedAuthentication")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Str(String),
        Num(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Str(s) => s,
        Id::Num(n) => n.to_string(),
    })
}
