// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kubernetes operation executors.
//!
//! Read operations are idempotent views over the cluster API. Write
//! operations (scale, delete) perform exactly one API mutation and are
//! never retried here. `kubectl_top_pods` additionally feeds the metric
//! history consumed by the predictive tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::StewardError;
use steward_kube::types::{Pod, PodMetrics};
use steward_kube::{quantity, KubeClient};
use tracing::info;

use crate::catalog;
use crate::metrics::{MetricHistory, MetricSample};
use crate::registry::{ToolHandler, ToolRegistry};

/// Registers the Kubernetes operations and derived analytics.
pub fn register(registry: &mut ToolRegistry, kube: Arc<KubeClient>, history: Arc<MetricHistory>) {
    registry.register(catalog::kubectl_get_pods(), Arc::new(GetPods(kube.clone())));
    registry.register(
        catalog::kubectl_get_pod_logs(),
        Arc::new(GetPodLogs(kube.clone())),
    );
    registry.register(
        catalog::kubectl_describe_pod(),
        Arc::new(DescribePod(kube.clone())),
    );
    registry.register(
        catalog::kubectl_get_deployments(),
        Arc::new(GetDeployments(kube.clone())),
    );
    registry.register(
        catalog::kubectl_get_events(),
        Arc::new(GetEvents(kube.clone())),
    );
    registry.register(
        catalog::kubectl_top_pods(),
        Arc::new(TopPods {
            kube: kube.clone(),
            history: history.clone(),
        }),
    );
    registry.register(
        catalog::kubectl_scale_deployment(),
        Arc::new(ScaleDeployment(kube.clone())),
    );
    registry.register(
        catalog::kubectl_delete_pod(),
        Arc::new(DeletePod(kube.clone())),
    );
    registry.register(
        catalog::analyze_resource_efficiency(),
        Arc::new(AnalyzeResourceEfficiency(kube.clone())),
    );
    registry.register(
        catalog::auto_restart_pod(),
        Arc::new(AutoRestartPod(kube.clone())),
    );
    registry.register(
        catalog::auto_scale_if_needed(),
        Arc::new(AutoScaleIfNeeded(kube)),
    );
}

fn parse<T: DeserializeOwned>(params: Value) -> Result<T, StewardError> {
    serde_json::from_value(params).map_err(|e| StewardError::BadParams {
        detail: e.to_string(),
    })
}

fn pod_view(pod: &Pod) -> Value {
    let ready = pod
        .status
        .container_statuses
        .iter()
        .filter(|c| c.ready)
        .count();
    let restarts: i64 = pod
        .status
        .container_statuses
        .iter()
        .map(|c| c.restart_count)
        .sum();
    json!({
        "name": pod.metadata.name,
        "namespace": pod.metadata.namespace,
        "status": pod.status.phase,
        "node": pod.spec.node_name,
        "ready": ready,
        "total_containers": pod.spec.containers.len(),
        "restarts": restarts,
        "created_at": pod.metadata.creation_timestamp,
    })
}

/// Sums container usage for one pod's metrics entry.
fn usage_totals(metrics: &PodMetrics) -> (f64, f64) {
    let mut cpu = 0.0;
    let mut memory = 0.0;
    for container in &metrics.containers {
        if let Some(q) = container.usage.get("cpu") {
            cpu += quantity::cpu_millis(q).unwrap_or(0.0);
        }
        if let Some(q) = container.usage.get("memory") {
            memory += quantity::memory_mib(q).unwrap_or(0.0);
        }
    }
    (cpu, memory)
}

// --- kubectl_get_pods ---

#[derive(Debug, Deserialize)]
struct GetPodsParams {
    namespace: Option<String>,
    label_selector: Option<String>,
}

struct GetPods(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for GetPods {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: GetPodsParams = parse(params)?;
        let pods = self
            .0
            .list_pods(params.namespace.as_deref(), params.label_selector.as_deref())
            .await?;
        let views: Vec<Value> = pods.items.iter().map(pod_view).collect();
        Ok(json!({"pods": views, "count": views.len()}))
    }
}

// --- kubectl_get_pod_logs ---

#[derive(Debug, Deserialize)]
struct GetPodLogsParams {
    pod_name: String,
    namespace: String,
    container: Option<String>,
    tail_lines: Option<i64>,
}

struct GetPodLogs(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for GetPodLogs {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: GetPodLogsParams = parse(params)?;
        let tail = params.tail_lines.unwrap_or(100);
        let logs = self
            .0
            .pod_logs(
                &params.namespace,
                &params.pod_name,
                params.container.as_deref(),
                tail,
            )
            .await?;
        Ok(json!({
            "pod": params.pod_name,
            "namespace": params.namespace,
            "container": params.container,
            "tail_lines": tail,
            "logs": logs,
        }))
    }
}

// --- kubectl_describe_pod ---

#[derive(Debug, Deserialize)]
struct DescribePodParams {
    pod_name: String,
    namespace: String,
}

struct DescribePod(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for DescribePod {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: DescribePodParams = parse(params)?;
        let pod = self.0.get_pod(&params.namespace, &params.pod_name).await?;
        let events = self
            .0
            .list_events(Some(&params.namespace), Some(&params.pod_name))
            .await?;

        let conditions: Vec<Value> = pod
            .status
            .conditions
            .iter()
            .map(|c| json!({"type": c.type_, "status": c.status, "reason": c.reason}))
            .collect();
        let containers: Vec<Value> = pod
            .spec
            .containers
            .iter()
            .map(|c| {
                let status = pod
                    .status
                    .container_statuses
                    .iter()
                    .find(|s| s.name == c.name);
                json!({
                    "name": c.name,
                    "image": c.image,
                    "ready": status.map(|s| s.ready).unwrap_or(false),
                    "restarts": status.map(|s| s.restart_count).unwrap_or(0),
                })
            })
            .collect();
        // Last 10 events for the pod.
        let recent: Vec<Value> = events
            .items
            .iter()
            .rev()
            .take(10)
            .map(|e| {
                json!({
                    "type": e.type_,
                    "reason": e.reason,
                    "message": e.message,
                    "time": e.timestamp(),
                })
            })
            .collect();

        Ok(json!({
            "pod": {
                "name": pod.metadata.name,
                "namespace": pod.metadata.namespace,
                "labels": pod.metadata.labels,
                "status": pod.status.phase,
                "conditions": conditions,
                "containers": containers,
                "node": pod.spec.node_name,
                "created_at": pod.metadata.creation_timestamp,
            },
            "events": recent,
        }))
    }
}

// --- kubectl_get_deployments ---

#[derive(Debug, Deserialize)]
struct GetDeploymentsParams {
    namespace: Option<String>,
}

struct GetDeployments(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for GetDeployments {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: GetDeploymentsParams = parse(params)?;
        let deployments = self.0.list_deployments(params.namespace.as_deref()).await?;
        let views: Vec<Value> = deployments
            .items
            .iter()
            .map(|d| {
                let image = d
                    .spec
                    .template
                    .spec
                    .containers
                    .first()
                    .and_then(|c| c.image.clone());
                json!({
                    "name": d.metadata.name,
                    "namespace": d.metadata.namespace,
                    "replicas": d.spec.replicas.unwrap_or(0),
                    "ready_replicas": d.status.ready_replicas.unwrap_or(0),
                    "available_replicas": d.status.available_replicas.unwrap_or(0),
                    "image": image,
                })
            })
            .collect();
        Ok(json!({"deployments": views, "count": views.len()}))
    }
}

// --- kubectl_get_events ---

#[derive(Debug, Deserialize)]
struct GetEventsParams {
    namespace: Option<String>,
    resource_name: Option<String>,
    limit: Option<usize>,
}

struct GetEvents(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for GetEvents {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: GetEventsParams = parse(params)?;
        let limit = params.limit.unwrap_or(50);
        let events = self
            .0
            .list_events(params.namespace.as_deref(), params.resource_name.as_deref())
            .await?;

        let mut items = events.items;
        items.sort_by(|a, b| {
            b.timestamp()
                .unwrap_or_default()
                .cmp(a.timestamp().unwrap_or_default())
        });
        let views: Vec<Value> = items
            .iter()
            .take(limit)
            .map(|e| {
                json!({
                    "type": e.type_,
                    "reason": e.reason,
                    "message": e.message,
                    "object": e.involved_object.name,
                    "namespace": e.involved_object.namespace,
                    "time": e.timestamp(),
                })
            })
            .collect();
        Ok(json!({"events": views, "count": views.len()}))
    }
}

// --- kubectl_top_pods ---

#[derive(Debug, Deserialize)]
struct TopPodsParams {
    namespace: Option<String>,
}

struct TopPods {
    kube: Arc<KubeClient>,
    history: Arc<MetricHistory>,
}

#[async_trait]
impl ToolHandler for TopPods {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: TopPodsParams = parse(params)?;
        let metrics = self.kube.pod_metrics(params.namespace.as_deref()).await?;
        // Restart counts come from the pod list; join by name to enrich the
        // history samples the predictors rely on.
        let pods = self.kube.list_pods(params.namespace.as_deref(), None).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let mut views = Vec::new();
        for entry in &metrics.items {
            let (cpu_millis, memory_mib) = usage_totals(entry);
            let restarts = pods
                .items
                .iter()
                .find(|p| {
                    p.metadata.name == entry.metadata.name
                        && p.metadata.namespace == entry.metadata.namespace
                })
                .map(|p| {
                    p.status
                        .container_statuses
                        .iter()
                        .map(|c| c.restart_count)
                        .sum()
                })
                .unwrap_or(0);

            self.history.record(
                &entry.metadata.namespace,
                &entry.metadata.name,
                MetricSample {
                    timestamp: now.clone(),
                    cpu_millis,
                    memory_mib,
                    restart_count: restarts,
                },
            );

            views.push(json!({
                "name": entry.metadata.name,
                "namespace": entry.metadata.namespace,
                "cpu_millis": cpu_millis,
                "memory_mib": memory_mib,
                "restarts": restarts,
            }));
        }

        Ok(json!({"pods": views, "count": views.len()}))
    }
}

// --- kubectl_scale_deployment ---

#[derive(Debug, Deserialize)]
struct ScaleDeploymentParams {
    deployment_name: String,
    namespace: String,
    replicas: i64,
}

struct ScaleDeployment(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for ScaleDeployment {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: ScaleDeploymentParams = parse(params)?;
        let previous = self
            .0
            .scale_deployment(&params.namespace, &params.deployment_name, params.replicas)
            .await?;
        info!(
            deployment = %params.deployment_name,
            namespace = %params.namespace,
            previous,
            replicas = params.replicas,
            "deployment scaled"
        );
        Ok(json!({
            "deployment": params.deployment_name,
            "namespace": params.namespace,
            "previous_replicas": previous,
            "new_replicas": params.replicas,
            "message": format!(
                "Scaled {} to {} replicas",
                params.deployment_name, params.replicas
            ),
        }))
    }
}

// --- kubectl_delete_pod ---

#[derive(Debug, Deserialize)]
struct DeletePodParams {
    pod_name: String,
    namespace: String,
}

struct DeletePod(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for DeletePod {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: DeletePodParams = parse(params)?;
        self.0
            .delete_pod(&params.namespace, &params.pod_name, None)
            .await?;
        Ok(json!({
            "pod": params.pod_name,
            "namespace": params.namespace,
            "message": format!(
                "Pod {} deleted (will be recreated if managed by a controller)",
                params.pod_name
            ),
        }))
    }
}

// --- analyze_resource_efficiency ---

#[derive(Debug, Deserialize)]
struct EfficiencyParams {
    namespace: Option<String>,
}

struct AnalyzeResourceEfficiency(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for AnalyzeResourceEfficiency {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: EfficiencyParams = parse(params)?;
        let namespace = self
            .0
            .namespace_or_default(params.namespace.as_deref())
            .to_string();

        let pods = self.0.list_pods(Some(&namespace), None).await?;
        let metrics = self.0.pod_metrics(Some(&namespace)).await?;

        let mut recommendations = Vec::new();
        for pod in &pods.items {
            let Some(pod_metrics) = metrics
                .items
                .iter()
                .find(|m| m.metadata.name == pod.metadata.name)
            else {
                continue;
            };
            for container in &pod.spec.containers {
                let usage = pod_metrics
                    .containers
                    .iter()
                    .find(|c| c.name == container.name);
                let Some(usage) = usage else { continue };
                let Some(limits) = container.resources.limits.as_ref() else {
                    continue;
                };

                let cpu_limit = limits.get("cpu").and_then(|q| quantity::cpu_millis(q));
                let cpu_usage = usage.usage.get("cpu").and_then(|q| quantity::cpu_millis(q));
                if let (Some(limit), Some(used)) = (cpu_limit, cpu_usage) {
                    if limit > 0.0 {
                        push_recommendation(
                            &mut recommendations,
                            pod,
                            &container.name,
                            "cpu",
                            used / limit * 100.0,
                            limits.get("cpu"),
                        );
                    }
                }

                let mem_limit = limits.get("memory").and_then(|q| quantity::memory_mib(q));
                let mem_usage = usage
                    .usage
                    .get("memory")
                    .and_then(|q| quantity::memory_mib(q));
                if let (Some(limit), Some(used)) = (mem_limit, mem_usage) {
                    if limit > 0.0 {
                        push_recommendation(
                            &mut recommendations,
                            pod,
                            &container.name,
                            "memory",
                            used / limit * 100.0,
                            limits.get("memory"),
                        );
                    }
                }
            }
        }

        let over = recommendations
            .iter()
            .filter(|r| r["type"].as_str().unwrap_or_default().starts_with("over"))
            .count();
        let under = recommendations.len() - over;

        Ok(json!({
            "namespace": namespace,
            "pods_analyzed": pods.items.len(),
            "recommendations": recommendations,
            "summary": {"over_provisioned": over, "under_provisioned": under},
        }))
    }
}

fn push_recommendation(
    recommendations: &mut Vec<Value>,
    pod: &Pod,
    container: &str,
    resource: &str,
    usage_pct: f64,
    current_limit: Option<&String>,
) {
    let rounded = (usage_pct * 100.0).round() / 100.0;
    if usage_pct < 20.0 {
        recommendations.push(json!({
            "pod": pod.metadata.name,
            "container": container,
            "type": format!("over-provisioned-{resource}"),
            "current_limit": current_limit,
            "usage_percent": rounded,
            "recommendation": format!(
                "Consider reducing the {resource} limit (only using {usage_pct:.1}%)"
            ),
        }));
    } else if usage_pct > 80.0 {
        recommendations.push(json!({
            "pod": pod.metadata.name,
            "container": container,
            "type": format!("under-provisioned-{resource}"),
            "current_limit": current_limit,
            "usage_percent": rounded,
            "recommendation": format!(
                "Consider increasing the {resource} limit ({usage_pct:.1}% usage)"
            ),
        }));
    }
}

// --- auto_restart_pod ---

#[derive(Debug, Deserialize)]
struct AutoRestartParams {
    pod_name: String,
    namespace: String,
}

struct AutoRestartPod(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for AutoRestartPod {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: AutoRestartParams = parse(params)?;
        info!(pod = %params.pod_name, namespace = %params.namespace, "restarting pod");
        self.0
            .delete_pod(&params.namespace, &params.pod_name, Some(0))
            .await?;
        Ok(json!({
            "action": "pod_restarted",
            "pod": params.pod_name,
            "namespace": params.namespace,
            "message": format!(
                "Pod {} deleted and will be recreated automatically",
                params.pod_name
            ),
        }))
    }
}

// --- auto_scale_if_needed ---

#[derive(Debug, Deserialize)]
struct AutoScaleParams {
    deployment: String,
    namespace: String,
    max_replicas: Option<i64>,
}

struct AutoScaleIfNeeded(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for AutoScaleIfNeeded {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: AutoScaleParams = parse(params)?;
        let max_replicas = params.max_replicas.unwrap_or(10);

        let deployment = self
            .0
            .get_deployment(&params.namespace, &params.deployment)
            .await?;
        let current = deployment.spec.replicas.unwrap_or(0);
        let ready = deployment.status.ready_replicas.unwrap_or(0);

        if ready < current && current < max_replicas {
            let target = (current + 1).min(max_replicas);
            info!(
                deployment = %params.deployment,
                namespace = %params.namespace,
                current,
                target,
                "auto-scaling deployment with unready pods"
            );
            self.0
                .scale_deployment(&params.namespace, &params.deployment, target)
                .await?;
            return Ok(json!({
                "action": "auto_scaled",
                "deployment": params.deployment,
                "namespace": params.namespace,
                "old_replicas": current,
                "new_replicas": target,
                "reason": "Not all pods ready",
            }));
        }

        Ok(json!({
            "action": "no_scaling_needed",
            "deployment": params.deployment,
            "namespace": params.namespace,
            "replicas": current,
            "ready": ready,
        }))
    }
}
