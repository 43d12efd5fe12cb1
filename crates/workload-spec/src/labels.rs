//! Label keys, selectors and object naming
//!
//! Every cluster object owned by the orchestrator carries the marker label.
//! Objects paired one-to-one with a source additionally carry the workload
//! identity; grouped objects carry the group identity and source type. Names
//! are derived deterministically so the credentials object of a workload can
//! always be found from the workload name alone.

use crate::identity::Identity;
use std::collections::BTreeMap;

/// Marker label key
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Marker label value
pub const MANAGED_BY_VALUE: &str = "collector-orchestrator";

/// Identity of a per-source workload
pub const IDENTITY_LABEL: &str = "collector-orchestrator.io/identity";

/// Pairing shape of the object ("source" or "group")
pub const PAIRING_LABEL: &str = "collector-orchestrator.io/pairing";

/// Group identity of a grouped workload
pub const GROUP_LABEL: &str = "collector-orchestrator.io/group";

/// Source type served by a grouped workload
pub const SOURCE_TYPE_LABEL: &str = "collector-orchestrator.io/source-type";

/// Registry id of the source served by a per-source workload (informational)
pub const SOURCE_ID_LABEL: &str = "collector-orchestrator.io/source-id";

/// Pairing value for one workload per source
pub const PAIRING_SOURCE: &str = "source";

/// Pairing value for workloads shared through a grouping object
pub const PAIRING_GROUP: &str = "group";

/// Prefix of every generated object name
const NAME_PREFIX: &str = "collector";

/// Longest fragment of a user-controlled value embedded in a name
const MAX_FRAGMENT_LEN: usize = 32;

/// Selector matching every per-source object
pub fn source_selector() -> String {
    format!(
        "{}={},{}={}",
        MANAGED_BY_LABEL, MANAGED_BY_VALUE, PAIRING_LABEL, PAIRING_SOURCE
    )
}

/// Selector matching the objects of one per-source identity
pub fn identity_selector(identity: &Identity) -> String {
    format!("{},{}={}", source_selector(), IDENTITY_LABEL, identity)
}

/// Selector matching every grouped object
pub fn group_selector() -> String {
    format!(
        "{}={},{}={}",
        MANAGED_BY_LABEL, MANAGED_BY_VALUE, PAIRING_LABEL, PAIRING_GROUP
    )
}

/// Value of the source-type label for a source type name
pub fn source_type_label(source_type: &str) -> String {
    sanitize(source_type, MAX_FRAGMENT_LEN)
}

/// Selector matching the grouped objects of one source type
pub fn group_type_selector(source_type: &str) -> String {
    format!(
        "{},{}={}",
        group_selector(),
        SOURCE_TYPE_LABEL,
        source_type_label(source_type)
    )
}

/// Labels for the objects of a per-source workload
pub fn source_labels(identity: &Identity, source_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (PAIRING_LABEL.to_string(), PAIRING_SOURCE.to_string()),
        (IDENTITY_LABEL.to_string(), identity.to_string()),
        (SOURCE_ID_LABEL.to_string(), sanitize(source_id, MAX_FRAGMENT_LEN)),
    ])
}

/// Labels for the objects of a grouped workload
pub fn group_labels(group_id: &str, source_type: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (PAIRING_LABEL.to_string(), PAIRING_GROUP.to_string()),
        (GROUP_LABEL.to_string(), group_id.to_string()),
        (SOURCE_TYPE_LABEL.to_string(), source_type_label(source_type)),
    ])
}

/// Name of the workload object for a per-source identity
pub fn workload_name(source_id: &str, identity: &Identity) -> String {
    format!(
        "{}-{}-{}",
        NAME_PREFIX,
        sanitize(source_id, MAX_FRAGMENT_LEN),
        identity.short()
    )
}

/// Name of the workload object for a grouping
pub fn group_workload_name(source_type: &str, group_id: &str) -> String {
    let short: String = group_id.chars().filter(|c| *c != '-').take(12).collect();
    format!(
        "{}-{}-{}",
        NAME_PREFIX,
        sanitize(source_type, MAX_FRAGMENT_LEN),
        short.to_ascii_lowercase()
    )
}

/// Name of the credentials object paired with a workload
pub fn credentials_name(workload_name: &str) -> String {
    format!("{}-credentials", workload_name)
}

/// Name of the grouping (config) object paired with a grouped workload
pub fn group_config_name(workload_name: &str) -> String {
    format!("{}-config", workload_name)
}

/// Reduce an arbitrary string to a DNS-1123 label fragment
///
/// Lowercases, replaces anything outside `[a-z0-9-]` with `-`, trims leading and
/// trailing dashes and truncates to `max_len`. Empty results become `"x"`.
pub fn sanitize(value: &str, max_len: usize) -> String {
    let mapped: String = value
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    let truncated: String = mapped.trim_matches('-').chars().take(max_len).collect();
    let trimmed = truncated.trim_end_matches('-');
    if trimmed.is_empty() {
        "x".to_string()
    } else {
        trimmed.to_string()
    }
}
