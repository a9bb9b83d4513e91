// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Steward workspace: conversation turns,
//! tool catalog entries, pending executions, audit records, and the
//! provider-neutral LLM message shapes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Per-turn policy governing when tool calls suspend for human decision.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every tool call suspends for approval, even observation-only ones.
    Strict,
    /// Safe calls auto-execute; dangerous calls suspend.
    #[default]
    Normal,
    /// No call suspends; dangerous calls are audited with `approver = "auto"`.
    Auto,
}

/// Classification of a tool: `Safe` is observation-only, `Dangerous`
/// mutates external state or spawns processes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolClass {
    Safe,
    Dangerous,
}

/// Static declaration of a callable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (snake_case, unique in the catalog).
    pub name: String,
    /// Human-readable description, also sent to the LLM.
    pub description: String,
    /// JSON Schema describing the tool's parameter object.
    pub input_schema: serde_json::Value,
    /// Safe/dangerous classification.
    pub class: ToolClass,
    /// Per-call execution timeout in seconds.
    pub timeout_secs: u64,
}

/// A structured tool-invocation request emitted by the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque call identifier assigned by the LLM (correlates the result).
    pub id: String,
    /// Tool name, matched against the catalog.
    pub name: String,
    /// Parameter object; validated against the tool's schema before dispatch.
    pub input: serde_json::Value,
}

/// Status carried by a ToolResult turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ToolResultStatus {
    Ok,
    Error,
    /// Synthetic status for a call suspended behind an approval gate;
    /// replaced by the real result when the decision arrives.
    ApprovalRequired,
}

/// One entry in a conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Turn {
    /// Free text from the user.
    User { text: String },
    /// Assistant text and/or an ordered list of tool calls.
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// Outcome of a single tool call, correlated by `call_id`.
    ToolResult {
        call_id: String,
        status: ToolResultStatus,
        payload: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<String>,
        /// Present when the result came through the approval workflow.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
    },
}

/// A persisted conversation: identifier, derived title, and the append-only
/// turn sequence. Turns are never mutated retroactively except for the
/// single documented case of replacing a synthetic `approval_required`
/// ToolResult with the real outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub turns: Vec<Turn>,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last-update timestamp.
    pub updated_at: String,
}

impl Conversation {
    /// Creates a conversation titled after the first user message.
    pub fn new(id: String, first_user_text: &str, now: String) -> Self {
        Self {
            id,
            title: derive_title(first_user_text),
            turns: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Number of turns in the log.
    pub fn message_count(&self) -> usize {
        self.turns.len()
    }
}

/// Derives a short human-readable title from the first user message:
/// truncated to at most 60 characters on a word boundary.
pub fn derive_title(text: &str) -> String {
    const MAX: usize = 60;
    let trimmed = text.trim();
    if trimmed.chars().count() <= MAX {
        return trimmed.to_string();
    }
    let mut title = String::new();
    for word in trimmed.split_whitespace() {
        if title.chars().count() + word.chars().count() + 1 > MAX {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }
    if title.is_empty() {
        // Single word longer than the cap.
        title = trimmed.chars().take(MAX).collect();
    }
    title.push('…');
    title
}

/// Listing row for a conversation, sorted by recency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub message_count: i64,
    pub last_updated: String,
}

/// Lifecycle states of a suspended execution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl PendingStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PendingStatus::Pending)
    }
}

/// A suspended tool call awaiting a human decision. TTL is one hour from
/// creation; the sweeper moves stale records to `Expired`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingExecution {
    pub id: String,
    pub conversation_id: String,
    pub tool: String,
    pub params: serde_json::Value,
    pub class: ToolClass,
    pub status: PendingStatus,
    /// Approval mode of the turn that suspended; resumption re-enters the
    /// driver loop under the same policy.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 expiry timestamp (created + 3600 s).
    pub expires_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    /// Execution result stored on the record so repeated identical
    /// decisions are idempotent no-ops returning the original outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Final status recorded in the audit log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Success,
    Error,
    Rejected,
    Expired,
}

/// Immutable audit entry for a completed, rejected, or expired execution.
/// Retained for 30 days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub execution_id: String,
    pub conversation_id: String,
    pub tool: String,
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    pub status: AuditStatus,
    pub requested_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Size of the serialized result in bytes.
    pub result_bytes: i64,
    /// Truncated preview of the result payload.
    pub result_preview: String,
    /// ISO 8601 retention expiry (requested + 30 d).
    pub expires_at: String,
}

// --- Provider-neutral LLM message types ---

/// Role of a message in the provider conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

/// A typed content block within a provider message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// A single message rendered for the LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub blocks: Vec<LlmBlock>,
}

/// A request to an LLM provider: history, system prompt, and tool schemas.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<LlmMessage>,
    pub tools: Vec<ToolSpec>,
    pub max_tokens: u32,
}

/// Token usage statistics reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    #[serde(default)]
    pub cache_read_tokens: u32,
    #[serde(default)]
    pub cache_creation_tokens: u32,
}

/// A reply from an LLM provider: optional text plus zero or more tool calls,
/// in the order the model emitted them.
#[derive(Debug, Clone, Default)]
pub struct LlmReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}
