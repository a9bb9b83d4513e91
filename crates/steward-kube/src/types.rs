// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed views of the Kubernetes resources the executors read.
//!
//! Only the fields the tools actually consume are modeled; everything else
//! is ignored during deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Object metadata shared by all resources.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub labels: Option<BTreeMap<String, String>>,
    pub annotations: Option<BTreeMap<String, String>>,
    pub creation_timestamp: Option<String>,
}

/// A list of pods.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodList {
    pub items: Vec<Pod>,
}

/// A pod with the spec and status fields the tools inspect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Pod {
    pub metadata: ObjectMeta,
    pub spec: PodSpec,
    pub status: PodStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    pub node_name: Option<String>,
    pub containers: Vec<Container>,
    pub host_network: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    pub name: String,
    pub image: Option<String>,
    pub resources: ResourceRequirements,
    pub security_context: Option<SecurityContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceRequirements {
    pub limits: Option<BTreeMap<String, String>>,
    pub requests: Option<BTreeMap<String, String>>,
}

/// Container security context fields checked by the security scanner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityContext {
    pub run_as_non_root: Option<bool>,
    pub run_as_user: Option<i64>,
    pub privileged: Option<bool>,
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub add: Vec<String>,
    pub drop: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodStatus {
    pub phase: Option<String>,
    pub conditions: Vec<PodCondition>,
    pub container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerStatus {
    pub name: String,
    pub ready: bool,
    pub restart_count: i64,
}

/// A list of deployments.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentList {
    pub items: Vec<Deployment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
    pub status: DeploymentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeploymentSpec {
    pub replicas: Option<i64>,
    pub template: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodTemplateSpec {
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentStatus {
    pub ready_replicas: Option<i64>,
    pub available_replicas: Option<i64>,
}

/// A list of events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventList {
    pub items: Vec<Event>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub involved_object: ObjectRef,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

impl Event {
    /// Best-available event timestamp.
    pub fn timestamp(&self) -> Option<&str> {
        self.last_timestamp
            .as_deref()
            .or(self.first_timestamp.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

/// A list of pod metrics from the metrics API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetricsList {
    pub items: Vec<PodMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PodMetrics {
    pub metadata: ObjectMeta,
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerMetrics {
    pub name: String,
    pub usage: BTreeMap<String, String>,
}

/// The Status object Kubernetes returns on API errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiStatus {
    pub message: String,
    pub reason: String,
    pub code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_pod_with_partial_fields() {
        let json = r#"{
            "metadata": {"name": "web-1", "namespace": "default",
                         "creationTimestamp": "2026-01-01T00:00:00Z"},
            "spec": {
                "nodeName": "node-a",
                "containers": [{
                    "name": "web",
                    "image": "nginx:1.27",
                    "resources": {"limits": {"cpu": "500m", "memory": "512Mi"}},
                    "securityContext": {"runAsNonRoot": true, "capabilities": {"drop": ["ALL"]}}
                }]
            },
            "status": {
                "phase": "Running",
                "containerStatuses": [{"name": "web", "ready": true, "restartCount": 2}]
            }
        }"#;
        let pod: Pod = serde_json::from_str(json).unwrap();
        assert_eq!(pod.metadata.name, "web-1");
        assert_eq!(pod.spec.node_name.as_deref(), Some("node-a"));
        assert_eq!(pod.status.phase.as_deref(), Some("Running"));
        assert_eq!(pod.status.container_statuses[0].restart_count, 2);
        let sc = pod.spec.containers[0].security_context.as_ref().unwrap();
        assert_eq!(sc.run_as_non_root, Some(true));
        assert_eq!(sc.capabilities.as_ref().unwrap().drop, vec!["ALL"]);
    }

    #[test]
    fn missing_fields_default() {
        let pod: Pod = serde_json::from_str(r#"{"metadata": {"name": "p"}}"#).unwrap();
        assert_eq!(pod.metadata.name, "p");
        assert!(pod.status.phase.is_none());
        assert!(pod.spec.containers.is_empty());
        assert!(!pod.spec.host_network);
    }

    #[test]
    fn event_timestamp_prefers_last() {
        let mut event = Event {
            first_timestamp: Some("2026-01-01T00:00:00Z".into()),
            last_timestamp: Some("2026-01-01T01:00:00Z".into()),
            ..Default::default()
        };
        assert_eq!(event.timestamp(), Some("2026-01-01T01:00:00Z"));
        event.last_timestamp = None;
        assert_eq!(event.timestamp(), Some("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn deserializes_pod_metrics() {
        let json = r#"{
            "items": [{
                "metadata": {"name": "web-1", "namespace": "default"},
                "containers": [{"name": "web", "usage": {"cpu": "120m", "memory": "300Mi"}}]
            }]
        }"#;
        let list: PodMetricsList = serde_json::from_str(json).unwrap();
        assert_eq!(list.items[0].containers[0].usage["cpu"], "120m");
    }
}
