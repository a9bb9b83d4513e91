// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST gateway for the Steward agent.
//!
//! Exposes chat, approval, conversation, pending-execution, history, and
//! tool-catalog endpoints over axum, with bearer-token authentication.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{router, start_server, GatewayState, ServerConfig};
