//! Data model for the Kubernetes workload object stored inside deployment
//! templates and exchanged with the cluster gateway.
//!
//! Templates are arbitrary Kubernetes deployment manifests; armada only ever
//! mutates the namespace, the replica count, and container images. Everything
//! else passes through the `extra` flatten maps untouched, so a template round
//! trips byte-for-byte semantically even when it carries fields this crate
//! knows nothing about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: WorkloadSpec,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    /// Desired replica count. Kept optional so a template that omits it stays
    /// omitted on round trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub template: PodTemplate,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,

    #[serde(default)]
    pub spec: PodSpec,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub image: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workload {
    /// The pod containers of this workload.
    pub fn containers(&self) -> &[Container] {
        &self.spec.template.spec.containers
    }

    pub fn containers_mut(&mut self) -> &mut Vec<Container> {
        &mut self.spec.template.spec.containers
    }
}

#[derive(
    Debug, Clone, Display, Default, PartialEq, EnumString, Eq, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum PodPhase {
    #[default]
    Unknown,

    Pending,

    Running,

    Succeeded,

    Failed,
}

/// Read model for a single pod backing a workload; returned by the cluster
/// gateway's pod listing and surfaced verbatim on the status endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
    pub pod_ip: String,
    pub node_name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Container name -> restart count.
    #[serde(default)]
    pub restart_counts: HashMap<String, i32>,
}
