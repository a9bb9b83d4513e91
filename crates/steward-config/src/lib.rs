// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading for the Steward agent.
//!
//! Layered TOML files merged via Figment, with environment variable
//! overrides under the `STEWARD_` prefix.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::StewardConfig;
