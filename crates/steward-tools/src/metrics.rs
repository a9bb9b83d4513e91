// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process metric history ring buffer.
//!
//! Keyed by `(namespace, pod_name)`, capped at the last N samples per pod,
//! appended by every `kubectl_top_pods` run. The predictors read through
//! the `record`/`history` interface only, so a multi-process deployment can
//! swap the implementation for a shared store without touching them.
//! The buffer is not persisted; predictions are cold-start after a restart.

use std::collections::VecDeque;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Default number of samples retained per pod.
pub const DEFAULT_CAPACITY: usize = 20;

/// One metric observation for a pod.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    /// ISO 8601 observation timestamp.
    pub timestamp: String,
    /// Total CPU usage across containers, in millicores.
    pub cpu_millis: f64,
    /// Total memory usage across containers, in MiB.
    pub memory_mib: f64,
    /// Total restart count across containers at observation time.
    pub restart_count: i64,
}

/// Shared ring buffer of recent samples per pod.
pub struct MetricHistory {
    capacity: usize,
    series: DashMap<(String, String), VecDeque<MetricSample>>,
}

impl MetricHistory {
    /// Creates a history retaining `capacity` samples per pod.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: DashMap::new(),
        }
    }

    /// Appends a sample for a pod, evicting the oldest past capacity.
    pub fn record(&self, namespace: &str, pod_name: &str, sample: MetricSample) {
        let mut entry = self
            .series
            .entry((namespace.to_string(), pod_name.to_string()))
            .or_default();
        if entry.len() == self.capacity {
            entry.pop_front();
        }
        entry.push_back(sample);
    }

    /// Returns the recorded samples for a pod, oldest first.
    pub fn history(&self, namespace: &str, pod_name: &str) -> Vec<MetricSample> {
        self.series
            .get(&(namespace.to_string(), pod_name.to_string()))
            .map(|entry| entry.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Pod names with recorded history in a namespace.
    pub fn pods_in_namespace(&self, namespace: &str) -> Vec<String> {
        let mut pods: Vec<String> = self
            .series
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect();
        pods.sort();
        pods
    }
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
