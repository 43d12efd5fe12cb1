//! Builders for the managed cluster objects
//!
//! Per-source workloads read their endpoint from literal environment values
//! and their credential through `secretKeyRef`s into the paired Secret. Grouped
//! workloads mount the grouping ConfigMap and its Secret instead.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec,
    Secret, SecretKeySelector, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;
use workload_spec::labels::{GROUP_LABEL, IDENTITY_LABEL, credentials_name, group_config_name};
use workload_spec::{Credential, Identity, WorkloadSpec};

/// Name of the collector container in every managed deployment
pub const CONTAINER_NAME: &str = "collector";

/// Secret key holding the username
pub const USERNAME_KEY: &str = "username";

/// Secret key holding the password
pub const PASSWORD_KEY: &str = "password";

/// ConfigMap key holding a grouping's member list
pub const MEMBERS_KEY: &str = "sources.json";

/// Annotation recording when a grouping was created
pub const CREATED_AT_ANNOTATION: &str = "collector-orchestrator.io/created-at";

const CONFIG_MOUNT_PATH: &str = "/etc/collector/config";
const CREDENTIALS_MOUNT_PATH: &str = "/etc/collector/credentials";

fn literal(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn from_secret(name: &str, secret_name: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret_name.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn metadata(name: &str, namespace: &str, labels: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        ..Default::default()
    }
}

fn single_replica(
    labels: &BTreeMap<String, String>,
    selector: BTreeMap<String, String>,
    pod: PodSpec,
) -> DeploymentSpec {
    DeploymentSpec {
        replicas: Some(1),
        selector: LabelSelector {
            match_labels: Some(selector),
            ..Default::default()
        },
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(pod),
        },
        ..Default::default()
    }
}

/// Deployment for one source
pub fn source_deployment(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    identity: &Identity,
    spec: &WorkloadSpec,
) -> Deployment {
    let secret_name = credentials_name(name);
    let endpoint = &spec.endpoint;
    let mut env = vec![literal("ENDPOINT_HOST", endpoint.host.as_str())];
    if let Some(path) = &endpoint.path {
        env.push(literal("ENDPOINT_PATH", path.as_str()));
    }
    if let Some(port) = endpoint.port {
        env.push(literal("ENDPOINT_PORT", port.to_string()));
    }
    if let Some(scheme) = &endpoint.scheme {
        env.push(literal("ENDPOINT_SCHEME", scheme.as_str()));
    }
    env.push(literal("SOURCE_ID", spec.source_id.as_str()));
    env.push(literal("SOURCE_UID", spec.source_uid.as_str()));
    env.push(from_secret("AUTH_USERNAME", &secret_name, USERNAME_KEY));
    env.push(from_secret("AUTH_PASSWORD", &secret_name, PASSWORD_KEY));

    let pod = PodSpec {
        containers: vec![Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(spec.image_reference()),
            env: Some(env),
            ..Default::default()
        }],
        ..Default::default()
    };

    let selector = BTreeMap::from([(IDENTITY_LABEL.to_string(), identity.to_string())]);
    Deployment {
        metadata: metadata(name, namespace, labels),
        spec: Some(single_replica(labels, selector, pod)),
        ..Default::default()
    }
}

/// Credentials object for one source
pub fn source_secret(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    credential: &Credential,
) -> Secret {
    Secret {
        metadata: metadata(name, namespace, labels),
        type_: Some("Opaque".to_string()),
        string_data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), credential.username().to_string()),
            (PASSWORD_KEY.to_string(), credential.password().to_string()),
        ])),
        ..Default::default()
    }
}

/// Deployment shared by the members of a grouping
pub fn group_deployment(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    group_id: &str,
    source_type: &str,
    image: &str,
) -> Deployment {
    let config_name = group_config_name(name);
    let secret_name = credentials_name(name);
    let pod = PodSpec {
        containers: vec![Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(image.to_string()),
            env: Some(vec![
                literal("SOURCE_TYPE", source_type),
                literal("SOURCES_CONFIG", format!("{}/{}", CONFIG_MOUNT_PATH, MEMBERS_KEY)),
                literal("CREDENTIALS_DIR", CREDENTIALS_MOUNT_PATH),
            ]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: "config".to_string(),
                    mount_path: CONFIG_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: "credentials".to_string(),
                    mount_path: CREDENTIALS_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }],
        volumes: Some(vec![
            Volume {
                name: "config".to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: config_name,
                    ..Default::default()
                }),
                ..Default::default()
            },
            Volume {
                name: "credentials".to_string(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret_name),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let selector = BTreeMap::from([(GROUP_LABEL.to_string(), group_id.to_string())]);
    Deployment {
        metadata: metadata(name, namespace, labels),
        spec: Some(single_replica(labels, selector, pod)),
        ..Default::default()
    }
}

/// Credentials object of a grouping, one key pair per member identity
pub fn group_secret<'a>(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    members: impl IntoIterator<Item = (&'a Identity, &'a Credential)>,
) -> Secret {
    let mut data = BTreeMap::new();
    for (identity, credential) in members {
        data.insert(
            format!("{}.{}", identity, USERNAME_KEY),
            credential.username().to_string(),
        );
        data.insert(
            format!("{}.{}", identity, PASSWORD_KEY),
            credential.password().to_string(),
        );
    }

    Secret {
        metadata: metadata(name, namespace, labels),
        type_: Some("Opaque".to_string()),
        string_data: Some(data),
        ..Default::default()
    }
}

/// Grouping ConfigMap carrying the serialized member list
pub fn group_config_map(
    namespace: &str,
    name: &str,
    labels: &BTreeMap<String, String>,
    created_at: &str,
    members_json: String,
) -> ConfigMap {
    let mut meta = metadata(name, namespace, labels);
    meta.annotations = Some(BTreeMap::from([(
        CREATED_AT_ANNOTATION.to_string(),
        created_at.to_string(),
    )]));

    ConfigMap {
        metadata: meta,
        data: Some(BTreeMap::from([(MEMBERS_KEY.to_string(), members_json)])),
        ..Default::default()
    }
}

/// Image of the collector container, if set
pub fn container_image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .iter()
        .find(|c| c.name == CONTAINER_NAME)?
        .image
        .as_deref()
}
