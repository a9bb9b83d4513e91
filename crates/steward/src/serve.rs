// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `steward serve` command implementation.
//!
//! Wires config -> storage -> Anthropic provider -> Kubernetes client ->
//! tool catalog -> agent -> expiry sweeper -> gateway, then serves until
//! shutdown.

use std::sync::Arc;
use std::time::Instant;

use steward_anthropic::{AnthropicClient, AnthropicProvider};
use steward_config::model::KubernetesConfig;
use steward_config::StewardConfig;
use steward_core::{ConversationStore, StewardError};
use steward_engine::agent::SWEEP_INTERVAL;
use steward_engine::{Agent, DriverOptions};
use steward_gateway::{start_server, AuthConfig, GatewayState, ServerConfig};
use steward_kube::{KubeClient, KubeCredentials};
use steward_storage::SqliteStore;
use steward_tools::{builtin_registry, MetricHistory, ShellOptions};
use tracing::info;

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Runs the `steward serve` command.
pub async fn run_serve(config: StewardConfig) -> Result<(), StewardError> {
    init_tracing(&config.agent.log_level);
    info!(agent = %config.agent.name, "starting steward serve");

    // Storage (runs migrations on open).
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::new(config.storage.database_path.clone()));
    store.initialize().await?;

    // Kubernetes client: in-cluster service account, or configured server.
    let creds = resolve_kube_credentials(&config.kubernetes)?;
    info!(server = %creds.server, "kubernetes client configured");
    let kube = Arc::new(KubeClient::new(
        creds,
        config.kubernetes.default_namespace.clone(),
    )?);

    // Tool catalog and executors.
    let history = Arc::new(MetricHistory::default());
    let shell = ShellOptions {
        enabled: config.shell.enabled,
        default_interpreter: config.shell.default_interpreter.clone(),
    };
    let registry = Arc::new(builtin_registry(kube, history, shell));
    info!(tools = registry.len(), "tool registry initialized");

    // Anthropic provider.
    let api_key = config
        .anthropic
        .api_key
        .clone()
        .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
        .ok_or_else(|| {
            StewardError::Config(
                "Anthropic API key required: set anthropic.api_key or ANTHROPIC_API_KEY".into(),
            )
        })?;
    let client = AnthropicClient::new(
        api_key,
        ANTHROPIC_API_VERSION.to_string(),
        config.anthropic.default_model.clone(),
    )?;
    let provider = Arc::new(AnthropicProvider::new(client));

    // The agent and its background sweeper.
    let agent = Agent::new(
        provider,
        store,
        registry,
        DriverOptions {
            default_model: config.anthropic.default_model.clone(),
            max_tokens: config.anthropic.max_tokens,
        },
    );
    let _sweeper = agent.spawn_sweeper(SWEEP_INTERVAL);

    // Gateway.
    let state = GatewayState {
        agent,
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        start_time: Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    start_server(&server_config, state).await
}

/// Resolves cluster credentials: explicit config wins, then in-cluster.
pub fn resolve_kube_credentials(
    config: &KubernetesConfig,
) -> Result<KubeCredentials, StewardError> {
    if let Some(ref server) = config.api_server {
        let token = match (&config.token, &config.token_path) {
            (Some(token), _) => Some(token.clone()),
            (None, Some(path)) => Some(
                std::fs::read_to_string(path)
                    .map_err(|e| {
                        StewardError::Config(format!("failed to read token file {path}: {e}"))
                    })?
                    .trim()
                    .to_string(),
            ),
            (None, None) => None,
        };
        let mut creds = KubeCredentials::from_parts(server.clone(), token);
        creds.accept_invalid_certs = config.accept_invalid_certs;
        return Ok(creds);
    }

    KubeCredentials::in_cluster().ok_or_else(|| {
        StewardError::Config(
            "no Kubernetes credentials: set kubernetes.api_server or run in-cluster".into(),
        )
    })
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("steward={level},info")));
    // try_init: serve may run inside a process that already installed a
    // subscriber (tests).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_server_and_token_win() {
        let config = KubernetesConfig {
            api_server: Some("https://10.0.0.1:6443".into()),
            token: Some("sa-token".into()),
            token_path: None,
            default_namespace: "default".into(),
            accept_invalid_certs: true,
        };
        let creds = resolve_kube_credentials(&config).unwrap();
        assert_eq!(creds.server, "https://10.0.0.1:6443");
        assert_eq!(creds.token.as_deref(), Some("sa-token"));
        assert!(creds.accept_invalid_certs);
    }

    #[test]
    fn token_path_is_read_and_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let token_file = dir.path().join("token");
        std::fs::write(&token_file, "file-token\n").unwrap();

        let config = KubernetesConfig {
            api_server: Some("https://cluster:6443".into()),
            token: None,
            token_path: Some(token_file.to_str().unwrap().to_string()),
            default_namespace: "default".into(),
            accept_invalid_certs: false,
        };
        let creds = resolve_kube_credentials(&config).unwrap();
        assert_eq!(creds.token.as_deref(), Some("file-token"));
    }

    #[test]
    fn missing_credentials_fail_with_config_error() {
        let config = KubernetesConfig {
            api_server: None,
            token: None,
            token_path: None,
            default_namespace: "default".into(),
            accept_invalid_certs: false,
        };
        // Outside a cluster the in-cluster probe fails.
        if std::env::var("KUBERNETES_SERVICE_HOST").is_err() {
            assert!(matches!(
                resolve_kube_credentials(&config),
                Err(StewardError::Config(_))
            ));
        }
    }
}
