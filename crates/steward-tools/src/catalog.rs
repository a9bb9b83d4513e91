// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoritative tool catalog.
//!
//! Every callable operation is declared here with its parameter schema and
//! classification. Anything that mutates external state, deletes resources,
//! or executes arbitrary host code is `dangerous`; everything else is
//! observation-only and `safe`.

use serde_json::json;
use steward_core::{ToolClass, ToolSpec};

/// Default per-call execution timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
/// Timeout for process-spawning tools.
pub const SHELL_TIMEOUT_SECS: u64 = 120;

fn spec(
    name: &str,
    description: &str,
    input_schema: serde_json::Value,
    class: ToolClass,
    timeout_secs: u64,
) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
        class,
        timeout_secs,
    }
}

pub fn kubectl_get_pods() -> ToolSpec {
    spec(
        "kubectl_get_pods",
        "List pods in a namespace or across all namespaces. Returns pod names, status, node, readiness, and restart counts.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {
                    "type": "string",
                    "description": "Kubernetes namespace (all namespaces if not provided)"
                },
                "label_selector": {
                    "type": "string",
                    "description": "Label selector to filter pods (e.g. 'app=backend')"
                }
            }
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_get_pod_logs() -> ToolSpec {
    spec(
        "kubectl_get_pod_logs",
        "Get logs from a specific pod, tailing the last N lines.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string", "description": "Name of the pod"},
                "namespace": {"type": "string", "description": "Kubernetes namespace"},
                "container": {
                    "type": "string",
                    "description": "Container name (optional if the pod has a single container)"
                },
                "tail_lines": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 10000,
                    "description": "Number of lines from the end (default: 100)"
                }
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_describe_pod() -> ToolSpec {
    spec(
        "kubectl_describe_pod",
        "Detailed pod state: conditions, containers, restarts, and recent events.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"}
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_get_deployments() -> ToolSpec {
    spec(
        "kubectl_get_deployments",
        "List deployments with replica and readiness counts.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"}
            }
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_get_events() -> ToolSpec {
    spec(
        "kubectl_get_events",
        "Recent cluster events, useful for debugging scheduling and crash loops.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"},
                "resource_name": {
                    "type": "string",
                    "description": "Filter events for a specific resource"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 500,
                    "description": "Maximum events to return (default: 50)"
                }
            }
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_top_pods() -> ToolSpec {
    spec(
        "kubectl_top_pods",
        "Current CPU and memory usage per pod (requires the metrics API). Each run feeds the metric history used by the predictive tools.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"}
            }
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_scale_deployment() -> ToolSpec {
    spec(
        "kubectl_scale_deployment",
        "DANGEROUS: Set a deployment's replica count.",
        json!({
            "type": "object",
            "properties": {
                "deployment_name": {"type": "string"},
                "namespace": {"type": "string"},
                "replicas": {
                    "type": "integer",
                    "minimum": 0,
                    "maximum": 50,
                    "description": "Target replica count (0-50)"
                }
            },
            "required": ["deployment_name", "namespace", "replicas"]
        }),
        ToolClass::Dangerous,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn kubectl_delete_pod() -> ToolSpec {
    spec(
        "kubectl_delete_pod",
        "DANGEROUS: Delete a pod. A pod managed by a controller is recreated.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"}
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Dangerous,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn analyze_resource_efficiency() -> ToolSpec {
    spec(
        "analyze_resource_efficiency",
        "Compare live pod metrics against declared limits; flags over-provisioned (<20% usage) and under-provisioned (>80%) containers.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {
                    "type": "string",
                    "description": "Namespace to analyze (default namespace if omitted)"
                }
            }
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn auto_restart_pod() -> ToolSpec {
    spec(
        "auto_restart_pod",
        "DANGEROUS: Restart a failed pod by deleting it with zero grace so its controller recreates it.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"}
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Dangerous,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn auto_scale_if_needed() -> ToolSpec {
    spec(
        "auto_scale_if_needed",
        "DANGEROUS: Add one replica to a deployment whose pods are not all ready, up to a maximum.",
        json!({
            "type": "object",
            "properties": {
                "deployment": {"type": "string"},
                "namespace": {"type": "string"},
                "max_replicas": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50,
                    "description": "Upper bound for automatic scaling (default: 10)"
                }
            },
            "required": ["deployment", "namespace"]
        }),
        ToolClass::Dangerous,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn predict_resource_exhaustion() -> ToolSpec {
    spec(
        "predict_resource_exhaustion",
        "Predict whether a pod will exhaust resources soon, from recorded metric history (rising memory trend or restart counts).",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"},
                "lookahead_hours": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 24,
                    "description": "Hours to look ahead (default: 3)"
                }
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn suggest_preemptive_actions() -> ToolSpec {
    spec(
        "suggest_preemptive_actions",
        "Scan recorded metric history for a namespace and suggest preemptive actions before issues escalate.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"}
            },
            "required": ["namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn identify_failure_patterns() -> ToolSpec {
    spec(
        "identify_failure_patterns",
        "Identify failure patterns (frequent restarts) that may indicate systemic issues.",
        json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"}
            },
            "required": ["namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn predict_scaling_needs() -> ToolSpec {
    spec(
        "predict_scaling_needs",
        "Predict whether a deployment will need scaling soon based on pod health trends.",
        json!({
            "type": "object",
            "properties": {
                "deployment": {"type": "string"},
                "namespace": {"type": "string"},
                "current_replicas": {"type": "integer", "minimum": 0}
            },
            "required": ["deployment", "namespace", "current_replicas"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn scan_pod_security() -> ToolSpec {
    spec(
        "scan_pod_security",
        "Inspect a pod spec for known-bad flags: running as root, missing resource limits, privileged mode, capability adds, host network.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"}
            },
            "required": ["pod_name", "namespace"]
        }),
        ToolClass::Safe,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn auto_fix_security_issue() -> ToolSpec {
    spec(
        "auto_fix_security_issue",
        "DANGEROUS: Patch a pod spec to remediate one security issue found by scan_pod_security.",
        json!({
            "type": "object",
            "properties": {
                "pod_name": {"type": "string"},
                "namespace": {"type": "string"},
                "issue_type": {
                    "type": "string",
                    "enum": [
                        "running_as_root",
                        "missing_resource_limits",
                        "privileged_container",
                        "insecure_capabilities",
                        "host_network_access"
                    ]
                }
            },
            "required": ["pod_name", "namespace", "issue_type"]
        }),
        ToolClass::Dangerous,
        DEFAULT_TIMEOUT_SECS,
    )
}

pub fn execute_shell_command() -> ToolSpec {
    spec(
        "execute_shell_command",
        "DANGEROUS: Spawn a process on the host with the chosen shell interpreter and capture its combined output.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line to execute"},
                "shell": {
                    "type": "string",
                    "enum": ["sh", "cmd", "powershell"],
                    "description": "Interpreter to use (default from configuration)"
                },
                "timeout_sec": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 120,
                    "description": "Seconds before the process group is killed (default: 120)"
                }
            },
            "required": ["command"]
        }),
        ToolClass::Dangerous,
        SHELL_TIMEOUT_SECS,
    )
}

/// All catalog entries, in declaration order.
pub fn all() -> Vec<ToolSpec> {
    vec![
        kubectl_get_pods(),
        kubectl_get_pod_logs(),
        kubectl_describe_pod(),
        kubectl_get_deployments(),
        kubectl_get_events(),
        kubectl_top_pods(),
        kubectl_scale_deployment(),
        kubectl_delete_pod(),
        analyze_resource_efficiency(),
        auto_restart_pod(),
        auto_scale_if_needed(),
        predict_resource_exhaustion(),
        suggest_preemptive_actions(),
        identify_failure_patterns(),
        predict_scaling_needs(),
        scan_pod_security(),
        auto_fix_security_issue(),
        execute_shell_command(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_eighteen_tools_with_unique_names() {
        let specs = all();
        assert_eq!(specs.len(), 18);
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 18, "tool names must be unique");
    }

    #[test]
    fn mutating_operations_are_dangerous() {
        let dangerous = [
            "kubectl_scale_deployment",
            "kubectl_delete_pod",
            "auto_restart_pod",
            "auto_scale_if_needed",
            "auto_fix_security_issue",
            "execute_shell_command",
        ];
        for spec in all() {
            let expected = if dangerous.contains(&spec.name.as_str()) {
                ToolClass::Dangerous
            } else {
                ToolClass::Safe
            };
            assert_eq!(spec.class, expected, "classification of {}", spec.name);
        }
    }

    #[test]
    fn shell_tool_gets_extended_timeout() {
        assert_eq!(execute_shell_command().timeout_secs, SHELL_TIMEOUT_SECS);
        assert_eq!(kubectl_get_pods().timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn schemas_declare_object_parameters() {
        for spec in all() {
            assert_eq!(
                spec.input_schema["type"], "object",
                "schema of {} must be an object",
                spec.name
            );
            assert!(
                spec.input_schema["properties"].is_object(),
                "schema of {} must declare properties",
                spec.name
            );
        }
    }
}
