// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Steward agent.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Steward configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StewardConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Kubernetes cluster access settings.
    #[serde(default)]
    pub kubernetes: KubernetesConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Gateway HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Shell executor settings.
    #[serde(default)]
    pub shell: ShellConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_agent_name() -> String {
    "steward".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` requires the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default model for LLM requests; callers may override per turn.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Maximum tokens to generate per LLM call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

/// Kubernetes cluster access configuration.
///
/// When `api_server` is unset, in-cluster service-account credentials are
/// used (the well-known token and CA paths mounted by the kubelet).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KubernetesConfig {
    /// Cluster API server URL (e.g. `https://10.0.0.1:6443`).
    #[serde(default)]
    pub api_server: Option<String>,

    /// Bearer token for cluster authentication.
    #[serde(default)]
    pub token: Option<String>,

    /// Path to a file containing the bearer token.
    #[serde(default)]
    pub token_path: Option<String>,

    /// Namespace used when a tool call omits one.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Accept self-signed cluster certificates (local dev clusters).
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_server: None,
            token: None,
            token_path: None,
            default_namespace: default_namespace(),
            accept_invalid_certs: false,
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "steward.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Gateway HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for API auth. `None` rejects all requests (fail-closed).
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8420
}

/// Shell executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    /// Allow the `execute_shell_command` tool at all.
    #[serde(default = "default_shell_enabled")]
    pub enabled: bool,

    /// Interpreter used when a call omits one: "sh", "cmd", or "powershell".
    #[serde(default = "default_shell_interpreter")]
    pub default_interpreter: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enabled: default_shell_enabled(),
            default_interpreter: default_shell_interpreter(),
        }
    }
}

fn default_shell_enabled() -> bool {
    true
}

fn default_shell_interpreter() -> String {
    "sh".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = StewardConfig::default();
        assert_eq!(config.agent.name, "steward");
        assert_eq!(config.agent.log_level, "info");
        assert_eq!(config.anthropic.max_tokens, 4096);
        assert!(config.anthropic.default_model.starts_with("claude-"));
        assert_eq!(config.kubernetes.default_namespace, "default");
        assert_eq!(config.storage.database_path, "steward.db");
        assert!(config.storage.wal_mode);
        assert_eq!(config.gateway.port, 8420);
        assert!(config.gateway.bearer_token.is_none());
        assert!(config.shell.enabled);
        assert_eq!(config.shell.default_interpreter, "sh");
    }
}
