// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Kubernetes API server.
//!
//! Reads authenticate the same way kubectl does: a bearer token against the
//! cluster REST API. Write operations (scale, delete, patch) are never
//! retried here; retrying is the LLM's decision via another turn.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use steward_core::StewardError;
use tracing::debug;

use crate::types::{
    ApiStatus, Deployment, DeploymentList, EventList, Pod, PodList, PodMetricsList,
};

/// Well-known in-cluster service-account paths mounted by the kubelet.
const SA_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SA_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Resolved credentials for reaching the cluster API.
#[derive(Debug, Clone)]
pub struct KubeCredentials {
    /// API server URL, e.g. `https://10.0.0.1:6443`.
    pub server: String,
    /// Bearer token, if the cluster requires one.
    pub token: Option<String>,
    /// PEM-encoded CA bundle for the API server certificate.
    pub ca_pem: Option<Vec<u8>>,
    /// Accept self-signed certificates (local dev clusters).
    pub accept_invalid_certs: bool,
}

impl KubeCredentials {
    /// Builds credentials from the in-cluster service account, if this
    /// process runs inside a pod. Returns `None` outside a cluster.
    pub fn in_cluster() -> Option<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").ok()?;
        let token = std::fs::read_to_string(SA_TOKEN_PATH).ok()?;
        let ca_pem = std::fs::read(SA_CA_PATH).ok();
        Some(Self {
            server: format!("https://{host}:{port}"),
            token: Some(token.trim().to_string()),
            ca_pem,
            accept_invalid_certs: false,
        })
    }

    /// Builds credentials from an explicit server URL and optional token.
    pub fn from_parts(server: String, token: Option<String>) -> Self {
        Self {
            server,
            token,
            ca_pem: None,
            accept_invalid_certs: false,
        }
    }
}

/// Client for the Kubernetes REST API.
#[derive(Debug, Clone)]
pub struct KubeClient {
    client: reqwest::Client,
    base_url: String,
    default_namespace: String,
}

impl KubeClient {
    /// Creates a client from resolved credentials.
    pub fn new(creds: KubeCredentials, default_namespace: String) -> Result<Self, StewardError> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = creds.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| StewardError::Config(format!("invalid cluster token: {e}")))?;
            headers.insert("authorization", value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30));

        if let Some(ref pem) = creds.ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| StewardError::Config(format!("invalid cluster CA bundle: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if creds.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| StewardError::Internal(
            format!("failed to build Kubernetes HTTP client: {e}"),
        ))?;

        Ok(Self {
            client,
            base_url: creds.server.trim_end_matches('/').to_string(),
            default_namespace,
        })
    }

    /// Namespace used when a tool call omits one.
    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    /// Resolves an optional namespace parameter against the default.
    pub fn namespace_or_default<'a>(&'a self, namespace: Option<&'a str>) -> &'a str {
        match namespace {
            Some(ns) if !ns.is_empty() => ns,
            _ => &self.default_namespace,
        }
    }

    /// Cheap reachability probe used by health checks.
    pub async fn ping(&self) -> Result<(), StewardError> {
        let url = format!("{}/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(unreachable_err)?;
        check_status(response).await.map(|_| ())
    }

    /// Lists pods in a namespace, or across all namespaces when `None`.
    pub async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<PodList, StewardError> {
        let url = match namespace {
            Some(ns) => format!("{}/api/v1/namespaces/{ns}/pods", self.base_url),
            None => format!("{}/api/v1/pods", self.base_url),
        };
        let mut req = self.client.get(&url);
        if let Some(selector) = label_selector {
            req = req.query(&[("labelSelector", selector)]);
        }
        self.get_json(req).await
    }

    /// Fetches one pod.
    pub async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, StewardError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods/{name}", self.base_url);
        self.get_json(self.client.get(&url)).await
    }

    /// Tails pod logs. Returns the raw log text.
    pub async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<&str>,
        tail_lines: i64,
    ) -> Result<String, StewardError> {
        let url = format!(
            "{}/api/v1/namespaces/{namespace}/pods/{name}/log",
            self.base_url
        );
        let mut req = self
            .client
            .get(&url)
            .query(&[("tailLines", tail_lines.to_string())]);
        if let Some(container) = container {
            req = req.query(&[("container", container)]);
        }
        let response = req.send().await.map_err(unreachable_err)?;
        let response = check_status(response).await?;
        response.text().await.map_err(|e| StewardError::Internal(
            format!("failed to read log body: {e}"),
        ))
    }

    /// Lists events, optionally namespaced and filtered by involved object.
    pub async fn list_events(
        &self,
        namespace: Option<&str>,
        resource_name: Option<&str>,
    ) -> Result<EventList, StewardError> {
        let url = match namespace {
            Some(ns) => format!("{}/api/v1/namespaces/{ns}/events", self.base_url),
            None => format!("{}/api/v1/events", self.base_url),
        };
        let mut req = self.client.get(&url);
        if let Some(name) = resource_name {
            req = req.query(&[("fieldSelector", format!("involvedObject.name={name}"))]);
        }
        self.get_json(req).await
    }

    /// Lists deployments in a namespace, or across all namespaces.
    pub async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<DeploymentList, StewardError> {
        let url = match namespace {
            Some(ns) => format!("{}/apis/apps/v1/namespaces/{ns}/deployments", self.base_url),
            None => format!("{}/apis/apps/v1/deployments", self.base_url),
        };
        self.get_json(self.client.get(&url)).await
    }

    /// Fetches one deployment.
    pub async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Deployment, StewardError> {
        let url = format!(
            "{}/apis/apps/v1/namespaces/{namespace}/deployments/{name}",
            self.base_url
        );
        self.get_json(self.client.get(&url)).await
    }

    /// Sets the replica count via the scale subresource. Returns the
    /// previous replica count.
    pub async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i64,
    ) -> Result<i64, StewardError> {
        let previous = self
            .get_deployment(namespace, name)
            .await?
            .spec
            .replicas
            .unwrap_or(0);

        let url = format!(
            "{}/apis/apps/v1/namespaces/{namespace}/deployments/{name}/scale",
            self.base_url
        );
        let body = serde_json::json!({"spec": {"replicas": replicas}});
        let response = self
            .client
            .patch(&url)
            .header("content-type", "application/merge-patch+json")
            .json(&body)
            .send()
            .await
            .map_err(unreachable_err)?;
        check_status(response).await?;
        debug!(namespace, deployment = name, previous, replicas, "deployment scaled");
        Ok(previous)
    }

    /// Deletes a pod. A managed pod is recreated by its controller.
    pub async fn delete_pod(
        &self,
        namespace: &str,
        name: &str,
        grace_period_seconds: Option<i64>,
    ) -> Result<(), StewardError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods/{name}", self.base_url);
        let mut req = self.client.delete(&url);
        if let Some(grace) = grace_period_seconds {
            req = req.query(&[("gracePeriodSeconds", grace.to_string())]);
        }
        let response = req.send().await.map_err(unreachable_err)?;
        check_status(response).await?;
        debug!(namespace, pod = name, "pod deleted");
        Ok(())
    }

    /// Applies a JSON-Patch to a pod (used by the security auto-fix).
    pub async fn patch_pod(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<(), StewardError> {
        let url = format!("{}/api/v1/namespaces/{namespace}/pods/{name}", self.base_url);
        let response = self
            .client
            .patch(&url)
            .header("content-type", "application/json-patch+json")
            .json(patch)
            .send()
            .await
            .map_err(unreachable_err)?;
        check_status(response).await?;
        Ok(())
    }

    /// Reads the pod metrics snapshot from the metrics API.
    pub async fn pod_metrics(
        &self,
        namespace: Option<&str>,
    ) -> Result<PodMetricsList, StewardError> {
        let url = match namespace {
            Some(ns) => format!(
                "{}/apis/metrics.k8s.io/v1beta1/namespaces/{ns}/pods",
                self.base_url
            ),
            None => format!("{}/apis/metrics.k8s.io/v1beta1/pods", self.base_url),
        };
        self.get_json(self.client.get(&url)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, StewardError> {
        let response = req.send().await.map_err(unreachable_err)?;
        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|e| StewardError::Internal(
            format!("failed to parse Kubernetes API response: {e}"),
        ))
    }
}

/// Maps transport failures to the Unreachable variant.
fn unreachable_err(e: reqwest::Error) -> StewardError {
    StewardError::Unreachable {
        message: format!("Kubernetes API unreachable: {e}"),
    }
}

/// Converts non-success responses into `ApiError` with the Status message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StewardError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let detail = match serde_json::from_str::<ApiStatus>(&body) {
        Ok(api_status) if !api_status.message.is_empty() => api_status.message,
        _ => {
            if body.is_empty() {
                StatusCode::from_u16(code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body
            }
        }
    };
    Err(StewardError::ApiError {
        status: code,
        detail,
    })
}
