// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Predictive tools over the metric history ring buffer.
//!
//! Trend analysis is deliberately simple: restart counts rising across the
//! window, or the late-window memory average exceeding the early-window
//! average by more than 30%, produce a warning. Pods without enough samples
//! answer `insufficient_data` rather than guessing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use steward_core::StewardError;

use crate::catalog;
use crate::metrics::{MetricHistory, MetricSample};
use crate::registry::{ToolHandler, ToolRegistry};

/// Memory growth beyond this fraction of the early-window average warns.
const MEMORY_TREND_THRESHOLD: f64 = 0.30;
/// Fraction of unhealthy pods above which scale-up is recommended.
const UNHEALTHY_RATIO_THRESHOLD: f64 = 0.30;

/// Registers the predictive tools.
pub fn register(registry: &mut ToolRegistry, history: Arc<MetricHistory>) {
    registry.register(
        catalog::predict_resource_exhaustion(),
        Arc::new(PredictResourceExhaustion(history.clone())),
    );
    registry.register(
        catalog::suggest_preemptive_actions(),
        Arc::new(SuggestPreemptiveActions(history.clone())),
    );
    registry.register(
        catalog::identify_failure_patterns(),
        Arc::new(IdentifyFailurePatterns(history.clone())),
    );
    registry.register(
        catalog::predict_scaling_needs(),
        Arc::new(PredictScalingNeeds(history)),
    );
}

fn parse<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, StewardError> {
    serde_json::from_value(params).map_err(|e| StewardError::BadParams {
        detail: e.to_string(),
    })
}

/// Core exhaustion analysis shared by the per-pod and per-namespace tools.
fn analyze_pod(
    namespace: &str,
    pod_name: &str,
    samples: &[MetricSample],
    lookahead_hours: i64,
) -> Value {
    if samples.len() < 3 {
        return json!({
            "prediction": "insufficient_data",
            "pod": pod_name,
            "namespace": namespace,
            "message": "Need more data points for prediction",
        });
    }

    // Rising restart counts over the last three samples.
    let restarts: Vec<i64> = samples.iter().map(|s| s.restart_count).collect();
    let recent = &restarts[restarts.len() - 3..];
    if recent[2] > recent[0] {
        return json!({
            "prediction": "warning",
            "type": "increasing_restarts",
            "pod": pod_name,
            "namespace": namespace,
            "message": format!("Pod restart count increasing: {recent:?}"),
            "recommendation": "Check pod logs and resource limits",
            "urgency": "medium",
            "estimated_time_to_failure": format!("{lookahead_hours} hours"),
        });
    }

    // Memory trend: late-window average vs early-window average.
    if samples.len() >= 5 {
        let early: f64 = samples[..3].iter().map(|s| s.memory_mib).sum::<f64>() / 3.0;
        let late: f64 = samples[samples.len() - 3..]
            .iter()
            .map(|s| s.memory_mib)
            .sum::<f64>()
            / 3.0;
        if early > 0.0 && late > early * (1.0 + MEMORY_TREND_THRESHOLD) {
            let increase = (late / early - 1.0) * 100.0;
            return json!({
                "prediction": "warning",
                "type": "memory_trend_increase",
                "pod": pod_name,
                "namespace": namespace,
                "message": "Memory usage increasing trend detected",
                "early_avg_mib": (early * 100.0).round() / 100.0,
                "late_avg_mib": (late * 100.0).round() / 100.0,
                "increase_percent": (increase * 10.0).round() / 10.0,
                "recommendation": "Consider increasing memory limits or investigating a memory leak",
                "urgency": "medium",
                "estimated_time_to_exhaustion": format!("{lookahead_hours} hours"),
            });
        }
    }

    json!({
        "prediction": "ok",
        "pod": pod_name,
        "namespace": namespace,
        "message": "No issues predicted in the near term",
    })
}

// --- predict_resource_exhaustion ---

#[derive(Debug, Deserialize)]
struct ExhaustionParams {
    pod_name: String,
    namespace: String,
    lookahead_hours: Option<i64>,
}

struct PredictResourceExhaustion(Arc<MetricHistory>);

#[async_trait]
impl ToolHandler for PredictResourceExhaustion {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: ExhaustionParams = parse(params)?;
        let lookahead = params.lookahead_hours.unwrap_or(3);
        let samples = self.0.history(&params.namespace, &params.pod_name);
        Ok(analyze_pod(
            &params.namespace,
            &params.pod_name,
            &samples,
            lookahead,
        ))
    }
}

// --- suggest_preemptive_actions ---

#[derive(Debug, Deserialize)]
struct NamespaceParams {
    namespace: String,
}

struct SuggestPreemptiveActions(Arc<MetricHistory>);

#[async_trait]
impl ToolHandler for SuggestPreemptiveActions {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: NamespaceParams = parse(params)?;
        let mut suggestions = Vec::new();

        for pod in self.0.pods_in_namespace(&params.namespace) {
            let samples = self.0.history(&params.namespace, &pod);
            let prediction = analyze_pod(&params.namespace, &pod, &samples, 3);
            if prediction["prediction"] == "warning" {
                suggestions.push(json!({
                    "pod": pod,
                    "issue": prediction["type"],
                    "action": "preemptive_action",
                    "recommendation": prediction["recommendation"],
                    "urgency": prediction["urgency"],
                }));
            }
        }

        Ok(json!({
            "namespace": params.namespace,
            "suggestions": suggestions,
            "count": suggestions.len(),
        }))
    }
}

// --- identify_failure_patterns ---

struct IdentifyFailurePatterns(Arc<MetricHistory>);

#[async_trait]
impl ToolHandler for IdentifyFailurePatterns {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: NamespaceParams = parse(params)?;
        let mut frequent_restarts = Vec::new();

        for pod in self.0.pods_in_namespace(&params.namespace) {
            let samples = self.0.history(&params.namespace, &pod);
            if samples.len() < 5 {
                continue;
            }
            let latest = samples[samples.len() - 1].restart_count;
            if latest > 3 {
                frequent_restarts.push(json!({
                    "pod": pod,
                    "restart_count": latest,
                    "severity": if latest > 10 { "high" } else { "medium" },
                }));
            }
        }

        let mut recommendations = Vec::new();
        if !frequent_restarts.is_empty() {
            recommendations.push(format!(
                "{} pods with frequent restarts detected. Investigate resource limits, liveness probes, and application stability.",
                frequent_restarts.len()
            ));
        } else {
            recommendations
                .push("No concerning patterns detected. System appears healthy.".to_string());
        }

        Ok(json!({
            "namespace": params.namespace,
            "patterns_found": {"frequent_restarts": frequent_restarts},
            "analysis_time": chrono::Utc::now().to_rfc3339(),
            "recommendations": recommendations,
        }))
    }
}

// --- predict_scaling_needs ---

#[derive(Debug, Deserialize)]
struct ScalingParams {
    deployment: String,
    namespace: String,
    current_replicas: i64,
}

struct PredictScalingNeeds(Arc<MetricHistory>);

#[async_trait]
impl ToolHandler for PredictScalingNeeds {
    async fn invoke(&self, params: Value) -> Result<Value, StewardError> {
        let params: ScalingParams = parse(params)?;

        let pods = self.0.pods_in_namespace(&params.namespace);
        if pods.is_empty() {
            return Ok(json!({
                "prediction": "insufficient_data",
                "deployment": params.deployment,
                "message": "No pod metrics available",
            }));
        }

        let unhealthy = pods
            .iter()
            .filter(|pod| {
                self.0
                    .history(&params.namespace, pod)
                    .last()
                    .map(|s| s.restart_count > 2)
                    .unwrap_or(false)
            })
            .count();
        let ratio = unhealthy as f64 / pods.len() as f64;

        if ratio > UNHEALTHY_RATIO_THRESHOLD {
            let recommended = (params.current_replicas + 2).min(20);
            return Ok(json!({
                "prediction": "scale_up_recommended",
                "deployment": params.deployment,
                "namespace": params.namespace,
                "current_replicas": params.current_replicas,
                "recommended_replicas": recommended,
                "reason": format!("{:.1}% of pods showing issues", ratio * 100.0),
                "urgency": "high",
            }));
        }

        if unhealthy == 0 && params.current_replicas > 2 {
            let recommended = (params.current_replicas - 1).max(2);
            return Ok(json!({
                "prediction": "scale_down_possible",
                "deployment": params.deployment,
                "namespace": params.namespace,
                "current_replicas": params.current_replicas,
                "recommended_replicas": recommended,
                "reason": "All pods healthy, may be over-provisioned",
                "urgency": "low",
            }));
        }

        Ok(json!({
            "prediction": "no_scaling_needed",
            "deployment": params.deployment,
            "current_replicas": params.current_replicas,
            "message": "Current replica count appears optimal",
        }))
    }
}
