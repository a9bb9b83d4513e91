// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Steward agent.
//!
//! This crate provides the foundational error type, domain types, and
//! adapter traits used throughout the Steward workspace. The execution
//! engine, storage backend, and LLM provider all implement or consume the
//! contracts defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::StewardError;
pub use traits::{ConversationStore, LlmProvider};
pub use types::{
    ApprovalMode, AuditRecord, AuditStatus, Conversation, ConversationSummary, LlmBlock,
    LlmMessage, LlmReply, LlmRequest, LlmRole, PendingExecution, PendingStatus, TokenUsage,
    ToolCall, ToolClass, ToolResultStatus, ToolSpec, Turn,
};
