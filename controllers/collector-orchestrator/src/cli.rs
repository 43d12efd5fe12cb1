//! Command line and environment configuration

use crate::error::ControllerError;
use clap::Parser;
use sources_client::SourcesClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use workload_spec::CollectorDefinitions;

/// Keeps collector workloads in sync with registered data sources
#[derive(Debug, Clone, Parser)]
#[command(name = "collector-orchestrator", version, about)]
pub struct Cli {
    /// Source registry base URL
    #[arg(long, env = "SOURCES_URL")]
    pub sources_url: String,

    /// Inventory registry base URL
    #[arg(long, env = "INVENTORY_URL")]
    pub inventory_url: String,

    /// Public API prefix of the source registry
    #[arg(long, env = "SOURCES_PATH_PREFIX", default_value = "/api/sources/v1.0")]
    pub sources_path_prefix: String,

    /// Internal API prefix of the inventory registry
    #[arg(long, env = "INVENTORY_PATH_PREFIX", default_value = "/internal/v1.0")]
    pub inventory_path_prefix: String,

    /// Internal API prefix of the source registry (credential lookup only)
    #[arg(long, env = "SOURCES_INTERNAL_PATH_PREFIX", default_value = "/internal/v1.0")]
    pub sources_internal_path_prefix: String,

    /// Collector definitions file
    #[arg(long = "config", env = "COLLECTORS_CONFIG", default_value = "config/collectors.yaml")]
    pub config: PathBuf,

    /// Image namespace for definitions that do not set one
    #[arg(long, env = "IMAGE_NAMESPACE", default_value = "collectors")]
    pub image_namespace: String,

    /// Comma-separated source types to manage (empty: every defined type)
    #[arg(long, env = "SOURCE_TYPES", value_delimiter = ',')]
    pub source_types: Vec<String>,

    /// Namespace holding the managed objects
    #[arg(long, env = "WATCH_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Seconds between ticks
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 10)]
    pub interval: u64,

    /// Port of the metrics endpoint
    #[arg(long, env = "METRICS_PORT", default_value_t = 9394)]
    pub metrics_port: u16,

    /// Registry request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout: u64,

    /// Registry page size
    #[arg(long, env = "PAGE_SIZE", default_value_t = 100)]
    pub page_size: u32,
}

impl Cli {
    /// Allowlisted source types with blanks removed
    pub fn allowlist(&self) -> Vec<String> {
        self.source_types
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn poll_interval(&self) -> Result<Duration, ControllerError> {
        if self.interval == 0 {
            return Err(ControllerError::InvalidConfig(
                "poll interval must be at least one second".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.interval))
    }

    /// Registry client settings
    pub fn sources_config(&self) -> SourcesClientConfig {
        SourcesClientConfig {
            sources_url: self.sources_url.clone(),
            inventory_url: self.inventory_url.clone(),
            sources_path_prefix: self.sources_path_prefix.clone(),
            inventory_path_prefix: self.inventory_path_prefix.clone(),
            timeout: Duration::from_secs(self.request_timeout),
            page_size: self.page_size,
        }
    }

    /// Load the collector definitions and apply the allowlist
    pub fn load_definitions(&self) -> Result<CollectorDefinitions, ControllerError> {
        let definitions = CollectorDefinitions::load(&self.config, &self.image_namespace)?;
        Ok(self.restrict(definitions))
    }

    fn restrict(&self, definitions: CollectorDefinitions) -> CollectorDefinitions {
        let (definitions, unknown) = definitions.restrict_to(&self.allowlist());
        for source_type in &unknown {
            warn!("Source type {} is allowlisted but has no collector definition", source_type);
        }
        if definitions.is_empty() {
            warn!("No collector definitions are enabled; every source will be skipped");
        }
        info!("  Collector definitions ({}):", self.config.display());
        for (source_type, definition) in definitions.iter() {
            match definition.sources_per_collector {
                Some(size) => info!(
                    "  {} -> {} ({} sources per collector)",
                    source_type,
                    definition.image_reference(),
                    size
                ),
                None => info!("  {} -> {}", source_type, definition.image_reference()),
            }
        }
        definitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 5] = [
        "collector-orchestrator",
        "--sources-url",
        "http://sources:8000",
        "--inventory-url",
        "http://inventory:8000",
    ];

    fn parse(extra: &[&str]) -> Cli {
        Cli::try_parse_from(REQUIRED.iter().chain(extra.iter())).unwrap()
    }

    #[test]
    fn test_allowlist_splits_on_commas() {
        let cli = parse(&["--source-types", "openshift, amazon,,azure"]);
        assert_eq!(cli.allowlist(), vec!["openshift", "amazon", "azure"]);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let cli = parse(&["--interval", "0"]);
        assert!(matches!(cli.poll_interval(), Err(ControllerError::InvalidConfig(_))));

        let cli = parse(&["--interval", "15"]);
        assert_eq!(cli.poll_interval().unwrap(), Duration::from_secs(15));
    }

    #[test]
    fn test_sources_config_carries_flags() {
        let cli = parse(&["--request-timeout", "5", "--sources-path-prefix", "/api/v2"]);
        let config = cli.sources_config();
        assert_eq!(config.sources_url, "http://sources:8000");
        assert_eq!(config.sources_path_prefix, "/api/v2");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_restrict_applies_allowlist() {
        let yaml = "collectors:\n  openshift:\n    image: os\n  amazon:\n    image: aws\n";
        let definitions = CollectorDefinitions::from_yaml_str(yaml, "collectors").unwrap();

        let cli = parse(&["--source-types", "openshift,unknown"]);
        let restricted = cli.restrict(definitions);
        assert_eq!(restricted.len(), 1);
        assert!(restricted.get("openshift").is_some());
    }

    #[test]
    fn test_bundled_config_loads() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/collectors.yaml");
        let cli = parse(&["--config", path, "--source-types", "amazon"]);
        let definitions = cli.load_definitions().unwrap();
        let amazon = definitions.get("amazon").unwrap();
        assert!(amazon.is_grouped());
        assert_eq!(amazon.image_reference(), "collectors/amazon-collector:latest");
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/collectors.yaml"]);
        assert!(matches!(cli.load_definitions(), Err(ControllerError::Spec(_))));
    }
}
