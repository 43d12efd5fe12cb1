//! Collector Workload Definitions
//!
//! Shared data model for the collector orchestrator:
//!
//! - [`WorkloadSpec`]: the immutable tuple that fully determines one desired collector workload
//! - [`Identity`]: the content-addressed identifier derived from a [`WorkloadSpec`]
//! - [`CollectorDefinitions`]: the static source-type to image table, loaded once at startup
//! - [`labels`]: label keys, selectors and deterministic object naming shared by every cluster object
//!
//! # Example
//!
//! ```
//! use workload_spec::{Credential, EndpointSpec, WorkloadSpec};
//!
//! let spec = WorkloadSpec {
//!     endpoint: EndpointSpec {
//!         host: "api.cluster.example.com".to_string(),
//!         path: Some("/".to_string()),
//!         port: Some(443),
//!         scheme: Some("https".to_string()),
//!     },
//!     image: "openshift-collector:latest".to_string(),
//!     image_namespace: "buildfactory".to_string(),
//!     source_id: "42".to_string(),
//!     source_uid: "6a3c5e2e-1b7f-4c1a-9d0e-2f1f3b1c9a77".to_string(),
//!     credential: Credential::new("admin", "s3cr3t"),
//! };
//!
//! // Identical content always yields the same identity
//! assert_eq!(spec.identity(), spec.clone().identity());
//! ```

pub mod collectors;
pub mod error;
pub mod identity;
pub mod labels;
pub mod spec;

pub use collectors::{CollectorDefinition, CollectorDefinitions};
pub use error::SpecError;
pub use identity::{Identity, identity};
pub use spec::{Credential, EndpointSpec, WorkloadSpec};
