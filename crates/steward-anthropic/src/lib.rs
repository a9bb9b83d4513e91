// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API integration for Steward.
//!
//! [`AnthropicClient`] speaks the wire protocol (tool_use and tool_result
//! content blocks included); [`AnthropicProvider`] adapts it to the
//! provider-neutral [`steward_core::LlmProvider`] contract consumed by the
//! conversation driver.

pub mod client;
pub mod provider;
pub mod types;

pub use client::AnthropicClient;
pub use provider::AnthropicProvider;
