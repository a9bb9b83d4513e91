// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM integrations.

use async_trait::async_trait;

use crate::error::StewardError;
use crate::types::{LlmReply, LlmRequest};

/// Adapter for LLM provider integrations.
///
/// The conversation driver renders turn history into an [`LlmRequest`] and
/// expects a parsed reply: optional text plus tool calls in emission order.
/// Transport failures must surface as [`StewardError::Unreachable`] so the
/// driver can apply its single-retry policy.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a completion request and returns the parsed reply.
    async fn complete(&self, request: LlmRequest) -> Result<LlmReply, StewardError>;

    /// Default model identifier used when the caller supplies no hint.
    fn default_model(&self) -> &str;
}
