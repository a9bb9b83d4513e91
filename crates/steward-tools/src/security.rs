// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pod security scanning and single-issue auto-remediation.
//!
//! The scanner inspects container security contexts for known-bad flags;
//! the auto-fix builds a JSON-Patch for exactly one issue type and applies
//! it to the pod. Severity levels mirror the scan checks: privileged mode
//! is critical, root and host network are high, the rest medium.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::StewardError;
use steward_kube::types::Pod;
use steward_kube::KubeClient;
use tracing::info;

use crate::catalog;
use crate::registry::{ToolHandler, ToolRegistry};

/// Registers the security tools.
pub fn register(registry: &mut ToolRegistry, kube: Arc<KubeClient>) {
    registry.register(
        catalog::scan_pod_security(),
        Arc::new(ScanPodSecurity(kube.clone())),
    );
    registry.register(
        catalog::auto_fix_security_issue(),
        Arc::new(AutoFixSecurityIssue(kube)),
    );
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, StewardError> {
    serde_json::from_value(params).map_err(|e| StewardError::BadParams {
        detail: e.to_string(),
    })
}

/// Scans a pod spec and returns issues plus remediation recommendations.
pub fn scan_pod(pod: &Pod) -> (Vec<Value>, Vec<Value>) {
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    for container in &pod.spec.containers {
        let name = container.name.as_str();
        let security = container.security_context.as_ref();

        if security.and_then(|s| s.run_as_non_root) != Some(true) {
            issues.push(json!({
                "type": "running_as_root",
                "severity": "high",
                "container": name,
                "description": "Container may be running as the root user",
            }));
            recommendations.push(json!({
                "issue": "running_as_root",
                "container": name,
                "fix": "Set securityContext.runAsNonRoot: true and runAsUser: 1000",
            }));
        }

        let limits = container.resources.limits.as_ref();
        let has_cpu = limits.map(|l| l.contains_key("cpu")).unwrap_or(false);
        let has_memory = limits.map(|l| l.contains_key("memory")).unwrap_or(false);
        if !has_cpu || !has_memory {
            issues.push(json!({
                "type": "missing_resource_limits",
                "severity": "medium",
                "container": name,
                "description": "Missing CPU or memory limits",
            }));
            recommendations.push(json!({
                "issue": "missing_resource_limits",
                "container": name,
                "fix": "Add resources.limits.cpu and resources.limits.memory",
            }));
        }

        if security.and_then(|s| s.privileged) == Some(true) {
            issues.push(json!({
                "type": "privileged_container",
                "severity": "critical",
                "container": name,
                "description": "Container running in privileged mode",
            }));
            recommendations.push(json!({
                "issue": "privileged_container",
                "container": name,
                "fix": "Remove securityContext.privileged or set it to false",
            }));
        }

        let capabilities = security.and_then(|s| s.capabilities.as_ref());
        let drops_all = capabilities
            .map(|c| c.drop.iter().any(|d| d == "ALL"))
            .unwrap_or(false);
        let adds_any = capabilities.map(|c| !c.add.is_empty()).unwrap_or(false);
        if !drops_all || adds_any {
            issues.push(json!({
                "type": "insecure_capabilities",
                "severity": "medium",
                "container": name,
                "description": "Capability adds present or not dropping all Linux capabilities",
            }));
            recommendations.push(json!({
                "issue": "insecure_capabilities",
                "container": name,
                "fix": "Set securityContext.capabilities.drop: [ALL] and remove adds",
            }));
        }
    }

    if pod.spec.host_network {
        issues.push(json!({
            "type": "host_network_access",
            "severity": "high",
            "description": "Pod has access to the host network",
        }));
        recommendations.push(json!({
            "issue": "host_network_access",
            "fix": "Remove spec.hostNetwork or set it to false",
        }));
    }

    (issues, recommendations)
}

fn severity_summary(issues: &[Value]) -> Value {
    let mut counts = [0u32; 4]; // critical, high, medium, low
    for issue in issues {
        match issue["severity"].as_str().unwrap_or("low") {
            "critical" => counts[0] += 1,
            "high" => counts[1] += 1,
            "medium" => counts[2] += 1,
            _ => counts[3] += 1,
        }
    }
    json!({
        "critical": counts[0],
        "high": counts[1],
        "medium": counts[2],
        "low": counts[3],
    })
}

// --- scan_pod_security ---

#[derive(Debug, Deserialize)]
struct ScanParams {
    pod_name: String,
    namespace: String,
}

struct ScanPodSecurity(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for ScanPodSecurity {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: ScanParams = parse(params)?;
        let pod = self.0.get_pod(&params.namespace, &params.pod_name).await?;
        let (issues, recommendations) = scan_pod(&pod);
        Ok(json!({
            "pod": params.pod_name,
            "namespace": params.namespace,
            "issues_found": issues.len(),
            "issues": issues,
            "recommendations": recommendations,
            "severity_summary": severity_summary(&issues),
        }))
    }
}

// --- auto_fix_security_issue ---

#[derive(Debug, Deserialize)]
struct AutoFixParams {
    pod_name: String,
    namespace: String,
    issue_type: String,
}

/// Builds the JSON-Patch remediating one issue type across all containers.
pub fn build_patch(pod: &Pod, issue_type: &str) -> Result<Value, StewardError> {
    let mut ops = Vec::new();

    match issue_type {
        "running_as_root" => {
            for (index, container) in pod.spec.containers.iter().enumerate() {
                let base = container_security_base(container, index, &mut ops);
                ops.push(json!({
                    "op": "add",
                    "path": format!("{base}/runAsNonRoot"),
                    "value": true,
                }));
                ops.push(json!({
                    "op": "add",
                    "path": format!("{base}/runAsUser"),
                    "value": 1000,
                }));
            }
        }
        "missing_resource_limits" => {
            for (index, container) in pod.spec.containers.iter().enumerate() {
                let has_limits = container.resources.limits.is_some();
                if !has_limits {
                    ops.push(json!({
                        "op": "add",
                        "path": format!("/spec/containers/{index}/resources/limits"),
                        "value": {"cpu": "500m", "memory": "512Mi"},
                    }));
                }
            }
        }
        "privileged_container" => {
            for (index, container) in pod.spec.containers.iter().enumerate() {
                let base = container_security_base(container, index, &mut ops);
                ops.push(json!({
                    "op": "add",
                    "path": format!("{base}/privileged"),
                    "value": false,
                }));
            }
        }
        "insecure_capabilities" => {
            for (index, container) in pod.spec.containers.iter().enumerate() {
                let base = container_security_base(container, index, &mut ops);
                ops.push(json!({
                    "op": "add",
                    "path": format!("{base}/capabilities"),
                    "value": {"drop": ["ALL"]},
                }));
            }
        }
        "host_network_access" => {
            ops.push(json!({
                "op": "add",
                "path": "/spec/hostNetwork",
                "value": false,
            }));
        }
        other => {
            return Err(StewardError::BadParams {
                detail: format!("unknown issue type: {other}"),
            });
        }
    }

    Ok(Value::Array(ops))
}

/// Ensures a securityContext object exists before nested adds target it.
fn container_security_base(
    container: &steward_kube::types::Container,
    index: usize,
    ops: &mut Vec<Value>,
) -> String {
    let base = format!("/spec/containers/{index}/securityContext");
    if container.security_context.is_none() {
        ops.push(json!({"op": "add", "path": base.clone(), "value": {}}));
    }
    base
}

struct AutoFixSecurityIssue(Arc<KubeClient>);

#[async_trait]
impl ToolHandler for AutoFixSecurityIssue {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: AutoFixParams = parse(params)?;
        let pod = self.0.get_pod(&params.namespace, &params.pod_name).await?;
        let patch = build_patch(&pod, &params.issue_type)?;
        let patch_count = patch.as_array().map(|a| a.len()).unwrap_or(0);

        info!(
            pod = %params.pod_name,
            namespace = %params.namespace,
            issue_type = %params.issue_type,
            patch_count,
            "applying security fix"
        );
        self.0
            .patch_pod(&params.namespace, &params.pod_name, &patch)
            .await?;

        let fix_applied = match params.issue_type.as_str() {
            "running_as_root" => "Applied runAsNonRoot: true and runAsUser: 1000",
            "missing_resource_limits" => "Applied CPU/memory limits",
            "privileged_container" => "Removed privileged mode",
            "insecure_capabilities" => "Dropped all Linux capabilities",
            "host_network_access" => "Disabled host network access",
            _ => "Applied fix",
        };

        Ok(json!({
            "action": "security_auto_fix",
            "issue_type": params.issue_type,
            "pod": params.pod_name,
            "namespace": params.namespace,
            "patch_count": patch_count,
            "fix_applied": fix_applied,
        }))
    }
}
