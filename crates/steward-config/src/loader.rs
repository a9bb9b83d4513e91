// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./steward.toml` > `~/.config/steward/steward.toml`
//! > `/etc/steward/steward.toml` with environment variable overrides via the
//! `STEWARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::StewardConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/steward/steward.toml` (system-wide)
/// 3. `~/.config/steward/steward.toml` (user XDG config)
/// 4. `./steward.toml` (local directory)
/// 5. `STEWARD_*` environment variables
pub fn load_config() -> Result<StewardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StewardConfig::default()))
        .merge(Toml::file("/etc/steward/steward.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("steward/steward.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("steward.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<StewardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StewardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<StewardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(StewardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `STEWARD_ANTHROPIC_API_KEY` must map to
/// `anthropic.api_key`, not `anthropic.api.key`.
fn env_provider() -> Env {
    Env::prefixed("STEWARD_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("anthropic_", "anthropic.", 1)
            .replacen("kubernetes_", "kubernetes.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("shell_", "shell.", 1);
        mapped.into()
    })
}
