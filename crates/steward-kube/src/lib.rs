// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal Kubernetes REST client for the Steward executors.
//!
//! Speaks the standard API verbs on pods, deployments, events, and the
//! metrics API over reqwest. Authenticates with in-cluster service-account
//! credentials when available, otherwise a configured server URL and token.

pub mod client;
pub mod quantity;
pub mod types;

pub use client::{KubeClient, KubeCredentials};
