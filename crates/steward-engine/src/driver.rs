// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation driver: the iterative loop turning one user message
//! into LLM turns, tool executions, and a terminal reply.
//!
//! The loop is a protocol interpreter, not a coroutine. State is persisted
//! at every exit (terminal reply, approval gate, cap) and re-entry rebuilds
//! the loop from the stored conversation; nothing holds an in-memory
//! continuation across an approval gate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{json, Value};
use steward_core::{
    ApprovalMode, Conversation, ConversationStore, LlmBlock, LlmMessage, LlmProvider, LlmRequest,
    LlmRole, PendingExecution, StewardError, ToolCall, ToolResultStatus, Turn,
};
use tracing::{debug, info, warn};

use crate::engine::{ExecutionEngine, Outcome};
use crate::prompt::SYSTEM_PROMPT;

/// Hard cap on LLM iterations per user message.
pub const MAX_ITERATIONS: u32 = 16;
/// Overall wall-clock cap per user turn.
pub const TURN_CAP: Duration = Duration::from_secs(300);

const ITERATION_CAP_MESSAGE: &str =
    "I've reached the maximum number of tool executions for this request. \
     Please break the task into smaller steps and try again.";
const TURN_CAP_MESSAGE: &str =
    "This request exceeded the per-turn time budget, so I stopped before \
     completing it. Please retry with a narrower task.";

/// Per-call options supplied by the API caller.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub approval_mode: ApprovalMode,
    /// Model hint; falls back to the provider default when absent.
    pub model: Option<String>,
}

/// Driver-level configuration.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub default_model: String,
    pub max_tokens: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            default_model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 4096,
        }
    }
}

/// One executed (or rejected, or gated) tool call in a chat outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResultRecord {
    pub call_id: String,
    pub tool: String,
    pub status: ToolResultStatus,
    pub payload: Value,
}

/// What one user turn produced.
#[derive(Debug)]
pub struct ChatOutcome {
    pub conversation_id: String,
    pub response_text: String,
    pub tool_uses: Vec<ToolCall>,
    pub tool_results: Vec<ToolResultRecord>,
    /// Populated when the turn suspended behind an approval gate.
    pub pending_execution: Option<PendingExecution>,
    pub iterations: u32,
}

/// Replaces the synthetic `approval_required` ToolResult carrying
/// `execution_id` with the real outcome. A no-op when the gate was already
/// resolved.
pub fn replace_gate(
    conversation: &mut Conversation,
    execution_id: &str,
    status: ToolResultStatus,
    payload: Value,
    validation: Option<String>,
) {
    for turn in conversation.turns.iter_mut() {
        if let Turn::ToolResult {
            execution_id: Some(id),
            status: turn_status,
            payload: turn_payload,
            validation: turn_validation,
            ..
        } = turn
        {
            if id.as_str() == execution_id
                && *turn_status == ToolResultStatus::ApprovalRequired
            {
                *turn_status = status;
                *turn_payload = payload;
                *turn_validation = validation;
                return;
            }
        }
    }
}

enum CallResolution {
    Resolved {
        status: ToolResultStatus,
        payload: Value,
        validation: Option<String>,
    },
    Suspended {
        execution_id: String,
    },
    InfrastructureDown {
        message: String,
    },
}

enum LoopExit {
    Suspended { execution_id: String },
    Terminal { text: String },
}

/// Drives the conversation-to-tool loop for one conversation at a time.
pub struct ConversationDriver {
    provider: Arc<dyn LlmProvider>,
    engine: Arc<ExecutionEngine>,
    store: Arc<dyn ConversationStore>,
    options: DriverOptions,
    busy: Arc<DashMap<String, ()>>,
}

struct BusyGuard {
    busy: Arc<DashMap<String, ()>>,
    id: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.remove(&self.id);
    }
}

impl ConversationDriver {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        engine: Arc<ExecutionEngine>,
        store: Arc<dyn ConversationStore>,
        options: DriverOptions,
    ) -> Self {
        Self {
            provider,
            engine,
            store,
            options,
            busy: Arc::new(DashMap::new()),
        }
    }

    /// Runs one user turn. Creates the conversation on a fresh identifier.
    ///
    /// Concurrent messages for the same conversation fail fast with
    /// `ConversationBusy`; nothing queues behind a running loop.
    pub async fn chat(
        &self,
        conversation_id: Option<String>,
        user_text: &str,
        options: &ChatOptions,
    ) -> Result<ChatOutcome, StewardError> {
        let model = options
            .model
            .clone()
            .unwrap_or_else(|| self.options.default_model.clone());
        if !model.starts_with("claude-") {
            return Err(StewardError::BadModel { model });
        }

        let id = conversation_id
            .unwrap_or_else(|| format!("conv_{}", uuid::Uuid::new_v4().simple()));
        let _guard = self.acquire(&id)?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut conversation = match self.store.load_conversation(&id).await? {
            Some(existing) => existing,
            None => Conversation::new(id.clone(), user_text, now),
        };
        conversation.turns.push(Turn::User {
            text: user_text.to_string(),
        });

        self.run_loop(conversation, options.approval_mode, &model)
            .await
    }

    /// Re-enters the loop after an approval decision. `mutate` runs under
    /// the busy guard (it replaces the synthetic gate result) and the
    /// updated conversation is persisted before the loop continues, so the
    /// decision survives an LLM outage during resumption.
    pub async fn resume<F>(
        &self,
        conversation_id: &str,
        mode: ApprovalMode,
        mutate: F,
    ) -> Result<ChatOutcome, StewardError>
    where
        F: FnOnce(&mut Conversation) + Send,
    {
        let _guard = self.acquire(conversation_id)?;
        let mut conversation = self
            .store
            .load_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                StewardError::NotFound(format!("conversation {conversation_id}"))
            })?;

        mutate(&mut conversation);
        conversation.updated_at = chrono::Utc::now().to_rfc3339();
        self.store.save_conversation(&conversation).await?;

        let model = self.options.default_model.clone();
        self.run_loop(conversation, mode, &model).await
    }

    fn acquire(&self, conversation_id: &str) -> Result<BusyGuard, StewardError> {
        if self
            .busy
            .insert(conversation_id.to_string(), ())
            .is_some()
        {
            return Err(StewardError::ConversationBusy {
                conversation_id: conversation_id.to_string(),
            });
        }
        Ok(BusyGuard {
            busy: self.busy.clone(),
            id: conversation_id.to_string(),
        })
    }

    async fn run_loop(
        &self,
        mut conversation: Conversation,
        mode: ApprovalMode,
        model: &str,
    ) -> Result<ChatOutcome, StewardError> {
        let started = Instant::now();
        let mut tool_uses: Vec<ToolCall> = Vec::new();
        let mut tool_results: Vec<ToolResultRecord> = Vec::new();
        let mut iterations = 0u32;

        // Entry reconciliation: surface expired gates, then finish any
        // half-consumed batch left behind by a suspension.
        self.reconcile_gates(&mut conversation).await?;
        let unresolved = unresolved_calls(&conversation);
        if !unresolved.is_empty() {
            debug!(
                conversation_id = %conversation.id,
                count = unresolved.len(),
                "settling unresolved tool calls from a suspended batch"
            );
            let exit = self
                .process_calls(&mut conversation, &unresolved, mode, &mut tool_results, started)
                .await?;
            if let Some(exit) = exit {
                return self
                    .finish(conversation, exit, tool_uses, tool_results, iterations)
                    .await;
            }
        }

        loop {
            if iterations >= MAX_ITERATIONS {
                info!(conversation_id = %conversation.id, "iteration cap reached");
                conversation.turns.push(Turn::Assistant {
                    text: Some(ITERATION_CAP_MESSAGE.to_string()),
                    tool_calls: vec![],
                });
                let exit = LoopExit::Terminal {
                    text: ITERATION_CAP_MESSAGE.to_string(),
                };
                return self
                    .finish(conversation, exit, tool_uses, tool_results, iterations)
                    .await;
            }
            if started.elapsed() >= TURN_CAP {
                warn!(conversation_id = %conversation.id, "turn time cap reached");
                conversation.turns.push(Turn::Assistant {
                    text: Some(TURN_CAP_MESSAGE.to_string()),
                    tool_calls: vec![],
                });
                let exit = LoopExit::Terminal {
                    text: TURN_CAP_MESSAGE.to_string(),
                };
                return self
                    .finish(conversation, exit, tool_uses, tool_results, iterations)
                    .await;
            }
            iterations += 1;

            let request = self.compose_request(&conversation, model);
            let reply = self.invoke_llm(request).await?;

            if reply.tool_calls.is_empty() {
                let text = reply.text.unwrap_or_default();
                conversation.turns.push(Turn::Assistant {
                    text: Some(text.clone()),
                    tool_calls: vec![],
                });
                let exit = LoopExit::Terminal { text };
                return self
                    .finish(conversation, exit, tool_uses, tool_results, iterations)
                    .await;
            }

            let calls = reply.tool_calls.clone();
            conversation.turns.push(Turn::Assistant {
                text: reply.text,
                tool_calls: calls.clone(),
            });
            tool_uses.extend(calls.iter().cloned());

            let exit = self
                .process_calls(&mut conversation, &calls, mode, &mut tool_results, started)
                .await?;
            if let Some(exit) = exit {
                return self
                    .finish(conversation, exit, tool_uses, tool_results, iterations)
                    .await;
            }
        }
    }

    /// Executes tool calls strictly in the order the LLM emitted them.
    ///
    /// Returns `Some(exit)` when the loop must stop: an approval gate fired
    /// (later calls in the batch are left unconsumed) or the infrastructure
    /// is unreachable.
    async fn process_calls(
        &self,
        conversation: &mut Conversation,
        calls: &[ToolCall],
        mode: ApprovalMode,
        tool_results: &mut Vec<ToolResultRecord>,
        started: Instant,
    ) -> Result<Option<LoopExit>, StewardError> {
        for call in calls {
            if started.elapsed() >= TURN_CAP {
                conversation.turns.push(Turn::Assistant {
                    text: Some(TURN_CAP_MESSAGE.to_string()),
                    tool_calls: vec![],
                });
                return Ok(Some(LoopExit::Terminal {
                    text: TURN_CAP_MESSAGE.to_string(),
                }));
            }

            let resolution = self
                .execute_with_retry(call, &conversation.id, mode)
                .await?;
            match resolution {
                CallResolution::Resolved {
                    status,
                    payload,
                    validation,
                } => {
                    conversation.turns.push(Turn::ToolResult {
                        call_id: call.id.clone(),
                        status,
                        payload: payload.clone(),
                        validation,
                        execution_id: None,
                    });
                    tool_results.push(ToolResultRecord {
                        call_id: call.id.clone(),
                        tool: call.name.clone(),
                        status,
                        payload,
                    });
                }
                CallResolution::Suspended { execution_id } => {
                    let payload = json!({
                        "status": "approval_required",
                        "execution_id": execution_id,
                        "message": "This operation requires human approval before it can run.",
                    });
                    conversation.turns.push(Turn::ToolResult {
                        call_id: call.id.clone(),
                        status: ToolResultStatus::ApprovalRequired,
                        payload: payload.clone(),
                        validation: None,
                        execution_id: Some(execution_id.clone()),
                    });
                    tool_results.push(ToolResultRecord {
                        call_id: call.id.clone(),
                        tool: call.name.clone(),
                        status: ToolResultStatus::ApprovalRequired,
                        payload,
                    });
                    return Ok(Some(LoopExit::Suspended { execution_id }));
                }
                CallResolution::InfrastructureDown { message } => {
                    let text = format!(
                        "I could not reach the infrastructure needed for `{}`: {message}. \
                         Please check connectivity and try again.",
                        call.name
                    );
                    conversation.turns.push(Turn::Assistant {
                        text: Some(text.clone()),
                        tool_calls: vec![],
                    });
                    return Ok(Some(LoopExit::Terminal { text }));
                }
            }
        }
        Ok(None)
    }

    /// One engine execution with the single jittered retry on `Unreachable`.
    async fn execute_with_retry(
        &self,
        call: &ToolCall,
        conversation_id: &str,
        mode: ApprovalMode,
    ) -> Result<CallResolution, StewardError> {
        let mut attempt = 0u32;
        loop {
            let result = self.engine.execute(call, conversation_id, mode).await;
            return match result {
                Ok(Outcome::Completed {
                    payload,
                    validation,
                }) => Ok(CallResolution::Resolved {
                    status: ToolResultStatus::Ok,
                    payload,
                    validation,
                }),
                Ok(Outcome::Suspended { execution_id }) => {
                    Ok(CallResolution::Suspended { execution_id })
                }
                Err(StewardError::Unreachable { message }) => {
                    if attempt == 0 {
                        attempt += 1;
                        backoff_with_jitter().await;
                        continue;
                    }
                    Ok(CallResolution::InfrastructureDown { message })
                }
                Err(e) if e.is_tool_level() => Ok(CallResolution::Resolved {
                    status: ToolResultStatus::Error,
                    payload: json!({"error": e.to_string()}),
                    validation: None,
                }),
                Err(e) => Err(e),
            };
        }
    }

    /// Invokes the LLM, retrying once after a jittered backoff when the
    /// endpoint is unreachable. A second failure escapes to the caller and
    /// nothing is persisted for this turn.
    async fn invoke_llm(
        &self,
        request: LlmRequest,
    ) -> Result<steward_core::LlmReply, StewardError> {
        match self.provider.complete(request.clone()).await {
            Ok(reply) => Ok(reply),
            Err(StewardError::Unreachable { .. }) => {
                warn!("LLM endpoint unreachable, retrying once");
                backoff_with_jitter().await;
                self.provider.complete(request).await
            }
            Err(e) => Err(e),
        }
    }

    /// Rewrites dangling approval gates whose pending record is already
    /// terminal: expiry and crash-recovery cases. Decisions made through
    /// the normal flow replace their gate at decide time.
    async fn reconcile_gates(&self, conversation: &mut Conversation) -> Result<(), StewardError> {
        let gated: Vec<String> = conversation
            .turns
            .iter()
            .filter_map(|turn| match turn {
                Turn::ToolResult {
                    status: ToolResultStatus::ApprovalRequired,
                    execution_id: Some(id),
                    ..
                } => Some(id.clone()),
                _ => None,
            })
            .collect();

        for execution_id in gated {
            let Some(pending) = self.store.get_pending(&execution_id).await? else {
                // Record evaporated (TTL passed and row swept): treat as expired.
                replace_gate(
                    conversation,
                    &execution_id,
                    ToolResultStatus::Error,
                    json!({"status": "error", "reason": "expired",
                           "message": "Approval window elapsed before a decision arrived."}),
                    None,
                );
                continue;
            };
            match pending.status {
                steward_core::PendingStatus::Pending => {}
                steward_core::PendingStatus::Expired => {
                    replace_gate(
                        conversation,
                        &execution_id,
                        ToolResultStatus::Error,
                        json!({"status": "error", "reason": "expired",
                               "message": "Approval window elapsed before a decision arrived."}),
                        None,
                    );
                }
                steward_core::PendingStatus::Rejected => {
                    replace_gate(
                        conversation,
                        &execution_id,
                        ToolResultStatus::Error,
                        json!({"status": "error", "reason": "user_rejected",
                               "message": "Execution rejected by user"}),
                        None,
                    );
                }
                steward_core::PendingStatus::Approved => {
                    // Crash between dispatch and gate replacement; surface
                    // the stored result when we have one.
                    if let Some(result) = pending.result.clone() {
                        replace_gate(
                            conversation,
                            &execution_id,
                            ToolResultStatus::Ok,
                            result,
                            None,
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn compose_request(&self, conversation: &Conversation, model: &str) -> LlmRequest {
        LlmRequest {
            model: model.to_string(),
            system_prompt: SYSTEM_PROMPT.to_string(),
            messages: render_messages(&conversation.turns),
            tools: self.engine.tool_specs(),
            max_tokens: self.options.max_tokens,
        }
    }

    async fn finish(
        &self,
        mut conversation: Conversation,
        exit: LoopExit,
        tool_uses: Vec<ToolCall>,
        tool_results: Vec<ToolResultRecord>,
        iterations: u32,
    ) -> Result<ChatOutcome, StewardError> {
        conversation.updated_at = chrono::Utc::now().to_rfc3339();
        self.store.save_conversation(&conversation).await?;

        match exit {
            LoopExit::Terminal { text } => Ok(ChatOutcome {
                conversation_id: conversation.id,
                response_text: text,
                tool_uses,
                tool_results,
                pending_execution: None,
                iterations,
            }),
            LoopExit::Suspended { execution_id } => {
                let pending = self.store.get_pending(&execution_id).await?;
                let response_text = match &pending {
                    Some(p) => format!(
                        "I'd like to execute `{}`, which requires your approval \
                         (execution {}).",
                        p.tool, p.id
                    ),
                    None => "An operation is awaiting your approval.".to_string(),
                };
                Ok(ChatOutcome {
                    conversation_id: conversation.id,
                    response_text,
                    tool_uses,
                    tool_results,
                    pending_execution: pending,
                    iterations,
                })
            }
        }
    }
}

/// Tool calls in assistant turns that have no matching ToolResult yet,
/// in emission order.
fn unresolved_calls(conversation: &Conversation) -> Vec<ToolCall> {
    let mut unresolved = Vec::new();
    for turn in &conversation.turns {
        if let Turn::Assistant { tool_calls, .. } = turn {
            unresolved.extend(tool_calls.iter().cloned());
        }
        if let Turn::ToolResult { call_id, .. } = turn {
            unresolved.retain(|call: &ToolCall| call.id != *call_id);
        }
    }
    unresolved
}

/// Renders the turn log into provider messages, coalescing adjacent
/// same-role messages (multiple tool results collapse into one user
/// message, matching the provider's alternation requirement).
fn render_messages(turns: &[Turn]) -> Vec<LlmMessage> {
    let mut messages: Vec<LlmMessage> = Vec::new();

    let mut push_blocks = |role: LlmRole, blocks: Vec<LlmBlock>| {
        if let Some(last) = messages.last_mut() {
            if last.role == role {
                last.blocks.extend(blocks);
                return;
            }
        }
        messages.push(LlmMessage { role, blocks });
    };

    for turn in turns {
        match turn {
            Turn::User { text } => {
                push_blocks(LlmRole::User, vec![LlmBlock::Text { text: text.clone() }]);
            }
            Turn::Assistant { text, tool_calls } => {
                let mut blocks = Vec::new();
                if let Some(text) = text {
                    if !text.is_empty() {
                        blocks.push(LlmBlock::Text { text: text.clone() });
                    }
                }
                for call in tool_calls {
                    blocks.push(LlmBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.input.clone(),
                    });
                }
                if !blocks.is_empty() {
                    push_blocks(LlmRole::Assistant, blocks);
                }
            }
            Turn::ToolResult {
                call_id,
                status,
                payload,
                ..
            } => {
                let is_error = (*status == ToolResultStatus::Error).then_some(true);
                push_blocks(
                    LlmRole::User,
                    vec![LlmBlock::ToolResult {
                        tool_use_id: call_id.clone(),
                        content: payload.to_string(),
                        is_error,
                    }],
                );
            }
        }
    }
    messages
}

async fn backoff_with_jitter() {
    use rand::Rng;
    let jitter = rand::thread_rng().gen_range(0..250);
    tokio::time::sleep(Duration::from_millis(500 + jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use steward_core::{PendingStatus, ToolClass, ToolSpec};
    use steward_storage::SqliteStore;
    use steward_test_utils::{MockProvider, ScriptedReply};
    use steward_tools::{ToolHandler, ToolRegistry};
    use tempfile::tempdir;

    struct StaticHandler(Value);

    #[async_trait]
    impl ToolHandler for StaticHandler {
        async fn invoke(&self, _params: Value) -> Result<Value, StewardError> {
            Ok(self.0.clone())
        }
    }

    fn spec(name: &str, class: ToolClass) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "test".into(),
            input_schema: json!({
                "type": "object",
                "properties": {"namespace": {"type": "string"}}
            }),
            class,
            timeout_secs: 60,
        }
    }

    async fn driver_with(
        provider: MockProvider,
    ) -> (ConversationDriver, Arc<SqliteStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("driver.db");
        let store = Arc::new(SqliteStore::new(db_path.to_str().unwrap().to_string()));
        store.initialize().await.unwrap();

        let mut registry = ToolRegistry::new();
        registry.register(
            spec("kubectl_get_pods", ToolClass::Safe),
            Arc::new(StaticHandler(json!({"pods": ["web-1"], "count": 1}))),
        );
        registry.register(
            spec("kubectl_delete_pod", ToolClass::Dangerous),
            Arc::new(StaticHandler(json!({"pod": "web-1", "message": "deleted"}))),
        );

        let engine = Arc::new(ExecutionEngine::new(Arc::new(registry), store.clone()));
        let driver = ConversationDriver::new(
            Arc::new(provider),
            engine,
            store.clone(),
            DriverOptions::default(),
        );
        (driver, store, dir)
    }

    fn options() -> ChatOptions {
        ChatOptions {
            approval_mode: ApprovalMode::Normal,
            model: None,
        }
    }

    #[tokio::test]
    async fn safe_observation_runs_to_terminal_reply() {
        let provider = MockProvider::with_replies(vec![
            ScriptedReply::tool_call("kubectl_get_pods", json!({"namespace": "default"}))
                .with_text("Listing pods."),
            ScriptedReply::text("One pod is running: web-1."),
        ]);
        let (driver, store, _dir) = driver_with(provider).await;

        let outcome = driver
            .chat(None, "List pods in default namespace.", &options())
            .await
            .unwrap();

        assert_eq!(outcome.response_text, "One pod is running: web-1.");
        assert_eq!(outcome.tool_uses.len(), 1);
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].status, ToolResultStatus::Ok);
        assert!(outcome.pending_execution.is_none());
        assert_eq!(outcome.iterations, 2);

        // No pending created; one success audit record.
        assert!(store.list_pending().await.unwrap().is_empty());
        let audit = store.list_audit(10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].tool, "kubectl_get_pods");

        // Conversation persisted with the full turn sequence.
        let conversation = store
            .load_conversation(&outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conversation.turns.len(), 4); // user, assistant+call, result, assistant
    }

    #[tokio::test]
    async fn dangerous_call_suspends_and_persists_the_gate() {
        let provider = MockProvider::with_replies(vec![ScriptedReply::tool_call(
            "kubectl_delete_pod",
            json!({"namespace": "default"}),
        )]);
        let (driver, store, _dir) = driver_with(provider).await;

        let outcome = driver
            .chat(None, "Delete the stuck pod.", &options())
            .await
            .unwrap();

        let pending = outcome.pending_execution.expect("should suspend");
        assert_eq!(pending.tool, "kubectl_delete_pod");
        assert_eq!(pending.status, PendingStatus::Pending);
        assert!(outcome.response_text.contains("requires your approval"));

        let conversation = store
            .load_conversation(&outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();
        match conversation.turns.last().unwrap() {
            Turn::ToolResult {
                status, execution_id, ..
            } => {
                assert_eq!(*status, ToolResultStatus::ApprovalRequired);
                assert_eq!(execution_id.as_deref(), Some(pending.id.as_str()));
            }
            other => panic!("expected gated ToolResult, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_surfaced_and_loop_continues() {
        let provider = MockProvider::with_replies(vec![
            ScriptedReply::tool_call("kubectl_frobnicate", json!({})),
            ScriptedReply::text("That tool does not exist; here's what I can do instead."),
        ]);
        let (driver, store, _dir) = driver_with(provider).await;

        let outcome = driver.chat(None, "Frobnicate it.", &options()).await.unwrap();
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].status, ToolResultStatus::Error);
        assert!(outcome.tool_results[0].payload["error"]
            .as_str()
            .unwrap()
            .contains("unknown tool"));
        assert!(outcome.response_text.contains("instead"));
        // The rejected call never produced an audit record.
        assert!(store.list_audit(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn iteration_cap_produces_deterministic_synthetic_turn() {
        let replies: Vec<ScriptedReply> = (0..MAX_ITERATIONS + 4)
            .map(|_| ScriptedReply::tool_call("kubectl_get_pods", json!({})))
            .collect();
        let (driver, _store, _dir) = driver_with(MockProvider::with_replies(replies)).await;

        let outcome = driver
            .chat(None, "Keep checking pods forever.", &options())
            .await
            .unwrap();
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.response_text, ITERATION_CAP_MESSAGE);
        assert!(outcome.pending_execution.is_none());
    }

    #[tokio::test]
    async fn unknown_model_fails_before_any_turn_is_appended() {
        let (driver, store, _dir) = driver_with(MockProvider::new()).await;
        let result = driver
            .chat(
                None,
                "hello",
                &ChatOptions {
                    approval_mode: ApprovalMode::Normal,
                    model: Some("gpt-oss-20b".into()),
                },
            )
            .await;
        assert!(matches!(result, Err(StewardError::BadModel { .. })));
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn llm_outage_rolls_back_the_user_turn() {
        let provider = MockProvider::new();
        provider.fail_next_with_unreachable(2).await;
        let (driver, store, _dir) = driver_with(provider).await;

        let result = driver.chat(None, "List pods.", &options()).await;
        assert!(matches!(result, Err(StewardError::Unreachable { .. })));
        // Nothing persisted: the user message rolled back.
        assert!(store.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn llm_outage_recovers_after_single_retry() {
        let provider = MockProvider::with_replies(vec![ScriptedReply::text("Recovered.")]);
        provider.fail_next_with_unreachable(1).await;
        let (driver, _store, _dir) = driver_with(provider).await;

        let outcome = driver.chat(None, "List pods.", &options()).await.unwrap();
        assert_eq!(outcome.response_text, "Recovered.");
    }

    #[tokio::test]
    async fn second_message_on_busy_conversation_fails_fast() {
        let (driver, _store, _dir) = driver_with(MockProvider::new()).await;
        let guard = driver.acquire("conv-busy").unwrap();
        match driver.chat(Some("conv-busy".into()), "hi", &options()).await {
            Err(StewardError::ConversationBusy { conversation_id }) => {
                assert_eq!(conversation_id, "conv-busy");
            }
            other => panic!("expected ConversationBusy, got {other:?}"),
        }
        drop(guard);
        // Released: the conversation accepts messages again.
        driver
            .chat(Some("conv-busy".into()), "hi", &options())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn every_tool_call_gets_exactly_one_result() {
        let provider = MockProvider::with_replies(vec![
            ScriptedReply::tool_call("kubectl_get_pods", json!({}))
                .and_tool_call("kubectl_get_pods", json!({"namespace": "kube-system"})),
            ScriptedReply::text("Both namespaces checked."),
        ]);
        let (driver, store, _dir) = driver_with(provider).await;

        let outcome = driver.chat(None, "Check everything.", &options()).await.unwrap();
        let conversation = store
            .load_conversation(&outcome.conversation_id)
            .await
            .unwrap()
            .unwrap();

        let mut call_ids = Vec::new();
        let mut result_ids = Vec::new();
        for turn in &conversation.turns {
            match turn {
                Turn::Assistant { tool_calls, .. } => {
                    call_ids.extend(tool_calls.iter().map(|c| c.id.clone()))
                }
                Turn::ToolResult { call_id, .. } => result_ids.push(call_id.clone()),
                _ => {}
            }
        }
        call_ids.sort();
        result_ids.sort();
        assert_eq!(call_ids, result_ids);
        assert_eq!(call_ids.len(), 2);
    }

    #[test]
    fn rendering_coalesces_adjacent_same_role_messages() {
        let turns = vec![
            Turn::User {
                text: "check".into(),
            },
            Turn::Assistant {
                text: Some("on it".into()),
                tool_calls: vec![
                    ToolCall {
                        id: "a".into(),
                        name: "kubectl_get_pods".into(),
                        input: json!({}),
                    },
                    ToolCall {
                        id: "b".into(),
                        name: "kubectl_get_pods".into(),
                        input: json!({}),
                    },
                ],
            },
            Turn::ToolResult {
                call_id: "a".into(),
                status: ToolResultStatus::Ok,
                payload: json!({"count": 1}),
                validation: None,
                execution_id: None,
            },
            Turn::ToolResult {
                call_id: "b".into(),
                status: ToolResultStatus::Error,
                payload: json!({"error": "boom"}),
                validation: None,
                execution_id: None,
            },
        ];
        let messages = render_messages(&turns);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, LlmRole::User);
        assert_eq!(messages[1].role, LlmRole::Assistant);
        assert_eq!(messages[1].blocks.len(), 3); // text + two tool_use
        assert_eq!(messages[2].role, LlmRole::User);
        assert_eq!(messages[2].blocks.len(), 2); // both tool results in one message
        match &messages[2].blocks[1] {
            LlmBlock::ToolResult { is_error, .. } => assert_eq!(*is_error, Some(true)),
            other => panic!("expected ToolResult, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_calls_tracks_the_suspended_batch() {
        let conversation = Conversation {
            id: "c".into(),
            title: "t".into(),
            turns: vec![
                Turn::Assistant {
                    text: None,
                    tool_calls: vec![
                        ToolCall {
                            id: "a".into(),
                            name: "x".into(),
                            input: json!({}),
                        },
                        ToolCall {
                            id: "b".into(),
                            name: "y".into(),
                            input: json!({}),
                        },
                    ],
                },
                Turn::ToolResult {
                    call_id: "a".into(),
                    status: ToolResultStatus::Ok,
                    payload: json!({}),
                    validation: None,
                    execution_id: None,
                },
            ],
            created_at: String::new(),
            updated_at: String::new(),
        };
        let unresolved = unresolved_calls(&conversation);
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].id, "b");
    }
}
