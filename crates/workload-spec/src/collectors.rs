//! Static collector definitions
//!
//! Maps a source type name to the collector image that serves it. The table is
//! loaded once at startup and shared read-only for the lifetime of the process.
//! A source type without an entry is intentionally unmanaged.
//!
//! ```yaml
//! collectors:
//!   openshift:
//!     image: openshift-collector:latest
//!     image_namespace: buildfactory   # optional
//!     sources_per_collector: 10       # optional, enables grouped pairing
//! ```

use crate::error::SpecError;
use crate::spec::image_reference;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCollectorFile {
    #[serde(default)]
    collectors: BTreeMap<String, RawCollectorDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCollectorDefinition {
    image: String,
    #[serde(default)]
    image_namespace: Option<String>,
    #[serde(default)]
    sources_per_collector: Option<usize>,
}

/// Collector image for one source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorDefinition {
    /// Image name (with tag)
    pub image: String,

    /// Image namespace, already defaulted from process configuration
    pub image_namespace: String,

    /// When set, sources of this type are batched into shared workloads of at most this many members
    pub sources_per_collector: Option<usize>,
}

impl CollectorDefinition {
    /// Fully qualified image reference for this collector
    pub fn image_reference(&self) -> String {
        image_reference(&self.image_namespace, &self.image)
    }

    /// Whether sources of this type share grouped workloads
    pub fn is_grouped(&self) -> bool {
        self.sources_per_collector.is_some()
    }
}

/// Immutable source type -> collector table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorDefinitions {
    definitions: BTreeMap<String, CollectorDefinition>,
}

impl CollectorDefinitions {
    /// Load the table from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the collector configuration file
    /// * `default_image_namespace` - Namespace used for definitions that do not set one
    pub fn load(path: impl AsRef<Path>, default_image_namespace: &str) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SpecError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents, default_image_namespace)
    }

    /// Parse the table from YAML text
    pub fn from_yaml_str(yaml: &str, default_image_namespace: &str) -> Result<Self, SpecError> {
        let raw: RawCollectorFile = serde_yaml::from_str(yaml)?;

        let mut definitions = BTreeMap::new();
        for (source_type, raw_def) in raw.collectors {
            if raw_def.image.trim().is_empty() {
                return Err(SpecError::InvalidDefinition {
                    source_type,
                    reason: "image must not be empty".to_string(),
                });
            }
            if raw_def.sources_per_collector == Some(0) {
                return Err(SpecError::InvalidDefinition {
                    source_type,
                    reason: "sources_per_collector must be at least 1".to_string(),
                });
            }

            let definition = CollectorDefinition {
                image: raw_def.image,
                image_namespace: raw_def
                    .image_namespace
                    .unwrap_or_else(|| default_image_namespace.to_string()),
                sources_per_collector: raw_def.sources_per_collector,
            };
            debug!("Loaded collector definition for {}: {}", source_type, definition.image_reference());
            definitions.insert(source_type, definition);
        }

        Ok(Self { definitions })
    }

    /// Build a table directly from definitions
    pub fn from_definitions(definitions: impl IntoIterator<Item = (String, CollectorDefinition)>) -> Self {
        Self {
            definitions: definitions.into_iter().collect(),
        }
    }

    /// Keep only the source types named in `allowlist`
    ///
    /// An empty allowlist keeps every definition. Returns the restricted table
    /// and the allowlist entries that had no definition.
    pub fn restrict_to(self, allowlist: &[String]) -> (Self, Vec<String>) {
        if allowlist.is_empty() {
            return (self, Vec::new());
        }

        let wanted: BTreeSet<&str> = allowlist.iter().map(String::as_str).collect();
        let unknown = wanted
            .iter()
            .filter(|name| !self.definitions.contains_key(**name))
            .map(|name| name.to_string())
            .collect();

        let definitions = self
            .definitions
            .into_iter()
            .filter(|(name, _)| wanted.contains(name.as_str()))
            .collect();

        (Self { definitions }, unknown)
    }

    /// Look up the collector for a source type
    pub fn get(&self, source_type: &str) -> Option<&CollectorDefinition> {
        self.definitions.get(source_type)
    }

    /// Iterate over all definitions in source type order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CollectorDefinition)> {
        self.definitions.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Source types that use grouped pairing
    pub fn grouped(&self) -> impl Iterator<Item = (&str, &CollectorDefinition)> {
        self.iter().filter(|(_, def)| def.is_grouped())
    }

    /// Number of managed source types
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no source type is managed
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
