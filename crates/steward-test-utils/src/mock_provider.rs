// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider for deterministic testing.
//!
//! `MockProvider` implements `LlmProvider` with pre-configured replies,
//! enabling fast, CI-runnable tests without external API calls. Replies are
//! popped from a FIFO queue; when the queue is empty, a plain
//! "mock response" text reply is returned.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use steward_core::{
    LlmProvider, LlmReply, LlmRequest, StewardError, TokenUsage, ToolCall,
};
use tokio::sync::Mutex;

/// A scripted reply the mock will return.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReply {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ScriptedReply {
    /// A plain text reply (terminal for the driver loop).
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply invoking one tool, with a generated call id.
    pub fn tool_call(name: &str, input: serde_json::Value) -> Self {
        Self {
            text: None,
            tool_calls: vec![ToolCall {
                id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
                name: name.to_string(),
                input,
            }],
        }
    }

    /// Adds leading assistant text to a tool-call reply.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    /// Adds a second tool call to the same reply.
    pub fn and_tool_call(mut self, name: &str, input: serde_json::Value) -> Self {
        self.tool_calls.push(ToolCall {
            id: format!("toolu_{}", uuid::Uuid::new_v4().simple()),
            name: name.to_string(),
            input,
        });
        self
    }
}

/// A mock LLM provider that returns pre-configured replies in FIFO order.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    fail_unreachable: Arc<Mutex<u32>>,
}

impl MockProvider {
    /// Create a mock provider with an empty reply queue.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_unreachable: Arc::new(Mutex::new(0)),
        }
    }

    /// Create a mock provider pre-loaded with the given replies.
    pub fn with_replies(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_unreachable: Arc::new(Mutex::new(0)),
        }
    }

    /// Queue another reply.
    pub async fn push_reply(&self, reply: ScriptedReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Fail the next `n` requests with `Unreachable` before serving replies.
    pub async fn fail_next_with_unreachable(&self, n: u32) {
        *self.fail_unreachable.lock().await = n;
    }

    /// Requests the mock has received, in order.
    pub async fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmReply, StewardError> {
        self.requests.lock().await.push(request);

        {
            let mut failures = self.fail_unreachable.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(StewardError::Unreachable {
                    message: "mock provider marked unreachable".into(),
                });
            }
        }

        let scripted = self
            .replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::text("mock response"));

        let stop_reason = if scripted.tool_calls.is_empty() {
            "end_turn"
        } else {
            "tool_use"
        };
        Ok(LlmReply {
            text: scripted.text,
            tool_calls: scripted.tool_calls,
            stop_reason: Some(stop_reason.to_string()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
                cache_read_tokens: 0,
                cache_creation_tokens: 0,
            },
        })
    }

    fn default_model(&self) -> &str {
        "claude-sonnet-4-20250514"
    }
}
