// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `steward doctor` command implementation.
//!
//! Runs diagnostic checks against the environment to identify configuration
//! issues and connectivity problems before the server starts.

use std::time::{Duration, Instant};

use steward_config::StewardConfig;
use steward_core::{ConversationStore, StewardError};
use steward_kube::KubeClient;
use steward_storage::SqliteStore;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed successfully.
    Pass,
    /// Check passed with a warning.
    Warn,
    /// Check failed.
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

/// Run the `steward doctor` command.
pub async fn run_doctor(config: &StewardConfig) -> Result<(), StewardError> {
    let results = run_checks(config).await;

    println!();
    println!("  steward doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    for result in &results {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => {
                fail_count += 1;
                "[FAIL]"
            }
        };
        println!(
            "    {tag} {:<16} {} ({}ms)",
            result.name,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    if fail_count > 0 {
        return Err(StewardError::Config(format!(
            "{fail_count} diagnostic check(s) failed"
        )));
    }
    Ok(())
}

async fn run_checks(config: &StewardConfig) -> Vec<CheckResult> {
    vec![
        check_anthropic_key(config),
        check_database(config).await,
        check_cluster(config).await,
        check_gateway_auth(config),
    ]
}

fn check_anthropic_key(config: &StewardConfig) -> CheckResult {
    let start = Instant::now();
    let present =
        config.anthropic.api_key.is_some() || std::env::var("ANTHROPIC_API_KEY").is_ok();
    CheckResult {
        name: "anthropic".to_string(),
        status: if present {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        },
        message: if present {
            "API key configured".to_string()
        } else {
            "no API key: set anthropic.api_key or ANTHROPIC_API_KEY".to_string()
        },
        duration: start.elapsed(),
    }
}

async fn check_database(config: &StewardConfig) -> CheckResult {
    let start = Instant::now();
    let store = SqliteStore::new(config.storage.database_path.clone());
    let (status, message) = match store.initialize().await {
        Ok(()) => {
            let _ = store.close().await;
            (
                CheckStatus::Pass,
                format!("opened {}", config.storage.database_path),
            )
        }
        Err(e) => (CheckStatus::Fail, format!("cannot open database: {e}")),
    };
    CheckResult {
        name: "database".to_string(),
        status,
        message,
        duration: start.elapsed(),
    }
}

async fn check_cluster(config: &StewardConfig) -> CheckResult {
    let start = Instant::now();
    let (status, message) = match crate::serve::resolve_kube_credentials(&config.kubernetes) {
        Err(e) => (CheckStatus::Warn, format!("no cluster credentials: {e}")),
        Ok(creds) => {
            match KubeClient::new(creds, config.kubernetes.default_namespace.clone()) {
                Err(e) => (CheckStatus::Fail, format!("client build failed: {e}")),
                Ok(client) => match client.ping().await {
                    Ok(()) => (CheckStatus::Pass, "cluster API reachable".to_string()),
                    Err(e) => (CheckStatus::Warn, format!("cluster unreachable: {e}")),
                },
            }
        }
    };
    CheckResult {
        name: "kubernetes".to_string(),
        status,
        message,
        duration: start.elapsed(),
    }
}

fn check_gateway_auth(config: &StewardConfig) -> CheckResult {
    let start = Instant::now();
    let configured = config.gateway.bearer_token.is_some();
    CheckResult {
        name: "gateway-auth".to_string(),
        status: if configured {
            CheckStatus::Pass
        } else {
            CheckStatus::Warn
        },
        message: if configured {
            "bearer token configured".to_string()
        } else {
            "no bearer token: all API requests will be rejected".to_string()
        },
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_config::load_config_from_str;

    #[tokio::test]
    async fn doctor_checks_cover_the_four_subsystems() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("doctor.db");
        let config = load_config_from_str(&format!(
            r#"
            [anthropic]
            api_key = "sk-test"

            [storage]
            database_path = "{}"

            [gateway]
            bearer_token = "secret"
            "#,
            db_path.to_str().unwrap()
        ))
        .unwrap();

        let results = run_checks(&config).await;
        assert_eq!(results.len(), 4);

        let by_name = |name: &str| results.iter().find(|r| r.name == name).unwrap();
        assert_eq!(by_name("anthropic").status, CheckStatus::Pass);
        assert_eq!(by_name("database").status, CheckStatus::Pass);
        assert_eq!(by_name("gateway-auth").status, CheckStatus::Pass);
        // Kubernetes is a warning outside a cluster, never a hard failure.
        assert_ne!(by_name("kubernetes").status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn missing_api_key_fails_the_anthropic_check() {
        if std::env::var("ANTHROPIC_API_KEY").is_ok() {
            return; // Ambient key would mask the failure.
        }
        let config = load_config_from_str("").unwrap();
        let result = check_anthropic_key(&config);
        assert_eq!(result.status, CheckStatus::Fail);
    }
}
