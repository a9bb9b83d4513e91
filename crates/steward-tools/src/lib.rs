// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool catalog and executors for the Steward agent.
//!
//! The catalog declares every callable operation with a typed parameter
//! schema and a safe/dangerous classification; the executors implement them
//! against the Kubernetes API, the metric history, and the local host.
//! Registering a new tool takes one [`steward_core::ToolSpec`] and one
//! [`ToolHandler`] -- the execution engine needs no other change.

pub mod catalog;
pub mod kubernetes;
pub mod metrics;
pub mod predictive;
pub mod registry;
pub mod schema;
pub mod security;
pub mod shell;

pub use metrics::{MetricHistory, MetricSample};
pub use registry::{ToolHandler, ToolRegistry};
pub use shell::ShellOptions;

use std::sync::Arc;

use steward_kube::KubeClient;

/// Builds the full built-in registry: Kubernetes operations, derived
/// analytics, predictive tools, security tools, and the shell executor.
pub fn builtin_registry(
    kube: Arc<KubeClient>,
    history: Arc<MetricHistory>,
    shell: ShellOptions,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    kubernetes::register(&mut registry, kube.clone(), history.clone());
    predictive::register(&mut registry, history);
    security::register(&mut registry, kube);
    shell::register(&mut registry, shell);
    registry
}
