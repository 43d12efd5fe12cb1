//! Workload specification model
//!
//! A [`WorkloadSpec`] is assembled by the source aggregator from one registered
//! source, its first endpoint, the first authentication on that endpoint and the
//! collector definition for the source type. It is never mutated afterwards: any
//! change upstream produces a new spec, and therefore a new [`Identity`].

use crate::identity::{self, Identity};
use std::fmt;

/// Connection details of the endpoint a collector talks to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointSpec {
    /// Hostname of the endpoint (required)
    pub host: String,

    /// Optional path prefix on the endpoint
    pub path: Option<String>,

    /// Optional port; collectors fall back to the scheme default
    pub port: Option<u16>,

    /// Optional scheme (e.g., "https")
    pub scheme: Option<String>,
}

/// Secret material resolved through the privileged credential lookup
///
/// The password is never printed: `Debug` redacts it so specs can be logged safely.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    /// Create a credential from a username and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Username (may be empty for token-style authentications)
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Password or token value
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything that determines one desired collector workload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkloadSpec {
    /// Endpoint the collector connects to
    pub endpoint: EndpointSpec,

    /// Collector image name (with tag)
    pub image: String,

    /// Namespace (repository) the image lives in
    pub image_namespace: String,

    /// Registry id of the source
    pub source_id: String,

    /// Registry uid of the source
    pub source_uid: String,

    /// Credential for the endpoint
    pub credential: Credential,
}

impl WorkloadSpec {
    /// Content-addressed identity of this spec
    pub fn identity(&self) -> Identity {
        identity::identity(self)
    }

    /// Fully qualified image reference used in the workload's container
    pub fn image_reference(&self) -> String {
        image_reference(&self.image_namespace, &self.image)
    }
}

/// Join an image namespace and image name into a container image reference
pub fn image_reference(image_namespace: &str, image: &str) -> String {
    if image_namespace.is_empty() {
        image.to_string()
    } else {
        format!("{}/{}", image_namespace.trim_end_matches('/'), image)
    }
}
