// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Steward execution engine.

use thiserror::Error;

/// The primary error type used across all Steward adapter traits and core operations.
///
/// Tool-level variants (`UnknownTool`, `BadParams`, `ApiError`, `Timeout`,
/// `Unreachable`) are packaged into ToolResult turns by the conversation
/// driver so the LLM can react; infrastructure-level variants escape to the
/// caller as a failed request.
#[derive(Debug, Error)]
pub enum StewardError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors (API failure, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Tool name did not resolve against the catalog.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    /// Tool parameters violated the declared schema.
    #[error("invalid tool parameters: {detail}")]
    BadParams { detail: String },

    /// Model identifier not recognized by the provider.
    #[error("unknown model identifier: {model}")]
    BadModel { model: String },

    /// Cluster or LLM endpoint could not be reached.
    #[error("endpoint unreachable: {message}")]
    Unreachable { message: String },

    /// The remote API answered with an error status.
    #[error("api error (status {status}): {detail}")]
    ApiError { status: u16, detail: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A driver loop is already running for this conversation.
    #[error("conversation {conversation_id} is busy")]
    ConversationBusy { conversation_id: String },

    /// Approval decision arrived for an execution already in a terminal state.
    #[error("execution {execution_id} already decided (status: {status})")]
    AlreadyDecided {
        execution_id: String,
        status: String,
    },

    /// Requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StewardError {
    /// True for errors that are surfaced to the LLM as an error ToolResult
    /// so the conversation can continue; false for errors that abort the
    /// current call chain entirely.
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            StewardError::UnknownTool { .. }
                | StewardError::BadParams { .. }
                | StewardError::ApiError { .. }
                | StewardError::Timeout { .. }
        )
    }
}
