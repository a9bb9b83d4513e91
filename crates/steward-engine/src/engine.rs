// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The execution engine: classification, approval gating, dispatch with
//! per-tool timeouts, result validation, and audit.
//!
//! Within one conversation turn the driver calls [`ExecutionEngine::execute`]
//! strictly sequentially; across conversations execution is concurrent and
//! nothing here takes a global lock.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use steward_core::{
    ApprovalMode, AuditRecord, AuditStatus, ConversationStore, PendingExecution, PendingStatus,
    StewardError, ToolCall, ToolClass, ToolSpec,
};
use steward_tools::schema::validate_params;
use steward_tools::{ToolHandler, ToolRegistry};
use tracing::{info, warn};

/// Pending executions expire one hour after creation.
pub const PENDING_TTL: Duration = Duration::from_secs(3600);
/// Audit records are retained for 30 days.
pub const AUDIT_RETENTION: Duration = Duration::from_secs(30 * 24 * 3600);
/// Maximum characters kept in the audit result preview.
const PREVIEW_LIMIT: usize = 512;

/// Result of asking the engine to execute one tool call.
#[derive(Debug)]
pub enum Outcome {
    /// The call ran; payload and optional validation notes attached.
    Completed {
        payload: Value,
        validation: Option<String>,
    },
    /// The call was suspended behind an approval gate.
    Suspended { execution_id: String },
}

/// Central orchestrator for tool execution.
pub struct ExecutionEngine {
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ConversationStore>,
}

impl ExecutionEngine {
    pub fn new(registry: Arc<ToolRegistry>, store: Arc<dyn ConversationStore>) -> Self {
        Self { registry, store }
    }

    /// All catalog specs, for the LLM request and the tools listing.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    /// Executes one tool call under the given approval mode.
    ///
    /// Steps, in order: catalog lookup, parameter validation against the
    /// declared schema, classification decision, pending creation when an
    /// approval is required, dispatch with the per-tool timeout, result
    /// validation, audit.
    pub async fn execute(
        &self,
        call: &ToolCall,
        conversation_id: &str,
        mode: ApprovalMode,
    ) -> Result<Outcome, StewardError> {
        let (spec, handler) = self
            .registry
            .get(&call.name)
            .ok_or_else(|| StewardError::UnknownTool {
                name: call.name.clone(),
            })?;
        let spec = spec.clone();

        validate_params(&spec.input_schema, &call.input)
            .map_err(|detail| StewardError::BadParams { detail })?;

        let needs_approval = match mode {
            ApprovalMode::Auto => false,
            ApprovalMode::Strict => true,
            ApprovalMode::Normal => spec.class == ToolClass::Dangerous,
        };

        if needs_approval {
            let now = chrono::Utc::now();
            let pending = PendingExecution {
                id: new_execution_id(),
                conversation_id: conversation_id.to_string(),
                tool: spec.name.clone(),
                params: call.input.clone(),
                class: spec.class,
                status: PendingStatus::Pending,
                approval_mode: mode,
                created_at: now.to_rfc3339(),
                expires_at: (now + chrono::Duration::seconds(PENDING_TTL.as_secs() as i64))
                    .to_rfc3339(),
                decided_at: None,
                approver: None,
                result: None,
            };
            self.store.insert_pending(&pending).await?;
            info!(
                execution_id = %pending.id,
                tool = %spec.name,
                conversation_id,
                "execution suspended for approval"
            );
            return Ok(Outcome::Suspended {
                execution_id: pending.id,
            });
        }

        let execution_id = new_execution_id();
        let requested_at = chrono::Utc::now().to_rfc3339();
        // In auto mode dangerous calls still get an audited approver.
        let approver = (mode == ApprovalMode::Auto && spec.class == ToolClass::Dangerous)
            .then(|| "auto".to_string());

        match self.dispatch(&spec, handler, &call.input).await {
            Ok((payload, validation)) => {
                self.append_audit(
                    &execution_id,
                    conversation_id,
                    &spec.name,
                    &call.input,
                    approver.as_deref(),
                    AuditStatus::Success,
                    &requested_at,
                    None,
                    Some(&payload),
                )
                .await?;
                Ok(Outcome::Completed {
                    payload,
                    validation,
                })
            }
            Err(e) => {
                let failure = json!({"error": e.to_string()});
                self.append_audit(
                    &execution_id,
                    conversation_id,
                    &spec.name,
                    &call.input,
                    approver.as_deref(),
                    AuditStatus::Error,
                    &requested_at,
                    None,
                    Some(&failure),
                )
                .await?;
                Err(e)
            }
        }
    }

    /// Dispatches a previously suspended call, bypassing the classification
    /// check, and audits the outcome under the approver's name.
    pub async fn dispatch_approved(
        &self,
        pending: &PendingExecution,
        approver: &str,
        decided_at: &str,
    ) -> Result<(Value, Option<String>), StewardError> {
        let (spec, handler) =
            self.registry
                .get(&pending.tool)
                .ok_or_else(|| StewardError::UnknownTool {
                    name: pending.tool.clone(),
                })?;
        let spec = spec.clone();

        match self.dispatch(&spec, handler, &pending.params).await {
            Ok((payload, validation)) => {
                self.append_audit(
                    &pending.id,
                    &pending.conversation_id,
                    &pending.tool,
                    &pending.params,
                    Some(approver),
                    AuditStatus::Success,
                    &pending.created_at,
                    Some(decided_at),
                    Some(&payload),
                )
                .await?;
                Ok((payload, validation))
            }
            Err(e) => {
                warn!(execution_id = %pending.id, error = %e, "approved execution failed");
                let failure = json!({"error": e.to_string()});
                self.append_audit(
                    &pending.id,
                    &pending.conversation_id,
                    &pending.tool,
                    &pending.params,
                    Some(approver),
                    AuditStatus::Error,
                    &pending.created_at,
                    Some(decided_at),
                    Some(&failure),
                )
                .await?;
                Err(e)
            }
        }
    }

    /// Writes the audit record for a rejection or expiry.
    pub async fn audit_decision(
        &self,
        pending: &PendingExecution,
        status: AuditStatus,
        approver: Option<&str>,
        decided_at: &str,
    ) -> Result<(), StewardError> {
        self.append_audit(
            &pending.id,
            &pending.conversation_id,
            &pending.tool,
            &pending.params,
            approver,
            status,
            &pending.created_at,
            Some(decided_at),
            None,
        )
        .await
    }

    async fn dispatch(
        &self,
        spec: &ToolSpec,
        handler: Arc<dyn ToolHandler>,
        params: &Value,
    ) -> Result<(Value, Option<String>), StewardError> {
        let duration = Duration::from_secs(spec.timeout_secs);
        match tokio::time::timeout(duration, handler.invoke(params.clone())).await {
            Ok(Ok(mut payload)) => {
                let validation = validate_result(&payload);
                if let (Some(note), Some(object)) = (&validation, payload.as_object_mut()) {
                    object.insert("validation_warning".to_string(), json!(note));
                }
                Ok((payload, validation))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(StewardError::Timeout { duration }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn append_audit(
        &self,
        execution_id: &str,
        conversation_id: &str,
        tool: &str,
        params: &Value,
        approver: Option<&str>,
        status: AuditStatus,
        requested_at: &str,
        decided_at: Option<&str>,
        payload: Option<&Value>,
    ) -> Result<(), StewardError> {
        let completed_at = chrono::Utc::now();
        let rendered = payload.map(|p| p.to_string()).unwrap_or_default();
        let record = AuditRecord {
            execution_id: execution_id.to_string(),
            conversation_id: conversation_id.to_string(),
            tool: tool.to_string(),
            params: params.clone(),
            approver: approver.map(str::to_string),
            status,
            requested_at: requested_at.to_string(),
            decided_at: decided_at.map(str::to_string),
            completed_at: Some(completed_at.to_rfc3339()),
            result_bytes: rendered.len() as i64,
            result_preview: truncate_preview(&rendered),
            expires_at: (completed_at
                + chrono::Duration::seconds(AUDIT_RETENTION.as_secs() as i64))
            .to_rfc3339(),
        };
        self.store.append_audit(&record).await
    }
}

/// Generates an opaque execution identifier.
pub fn new_execution_id() -> String {
    format!("exec_{}", uuid::Uuid::new_v4().simple())
}

/// Non-blocking result validation: error-indicator substrings and
/// structurally empty payloads produce a note, never a failure.
pub fn validate_result(payload: &Value) -> Option<String> {
    let empty = match payload {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    };
    if empty {
        return Some(
            "Result is empty. The operation may not have produced the expected output.".to_string(),
        );
    }

    const INDICATORS: [&str; 6] = [
        "error",
        "failed",
        "exception",
        "not found",
        "forbidden",
        "timeout",
    ];
    let rendered = payload.to_string().to_lowercase();
    if INDICATORS.iter().any(|needle| rendered.contains(needle)) {
        return Some(
            "Result contains error indicators. Verify the operation succeeded.".to_string(),
        );
    }
    None
}

fn truncate_preview(rendered: &str) -> String {
    if rendered.chars().count() <= PREVIEW_LIMIT {
        rendered.to_string()
    } else {
        rendered.chars().take(PREVIEW_LIMIT).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use steward_storage::SqliteStore;
    use tempfile::tempdir;

    struct StaticHandler(Value);

    #[async_trait]
    impl ToolHandler for StaticHandler {
        async fn invoke(&self, _params: Value) -> Result<Value, StewardError> {
            Ok(self.0.clone())
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl ToolHandler for SlowHandler {
        async fn invoke(&self, _params: Value) -> Result<Value, StewardError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({"late": true}))
        }
    }

    fn spec_named(name: &str, class: ToolClass, timeout_secs: u64) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "test tool".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "namespace": {"type": "string"},
                    "replicas": {"type": "integer", "minimum": 0}
                }
            }),
            class,
            timeout_secs,
        }
    }

    async fn engine_with(
        tools: Vec<(ToolSpec, Arc<dyn ToolHandler>)>,
    ) -> (ExecutionEngine, Arc<SqliteStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        let store = Arc::new(SqliteStore::new(db_path.to_str().unwrap().to_string()));
        store.initialize().await.unwrap();

        let mut registry = ToolRegistry::new();
        for (spec, handler) in tools {
            registry.register(spec, handler);
        }
        let engine = ExecutionEngine::new(Arc::new(registry), store.clone());
        (engine, store, dir)
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall {
            id: "toolu_1".into(),
            name: name.into(),
            input,
        }
    }

    #[tokio::test]
    async fn unknown_tool_never_reaches_an_executor() {
        let (engine, store, _dir) = engine_with(vec![]).await;
        let result = engine
            .execute(&call("kubectl_frobnicate", json!({})), "conv", ApprovalMode::Normal)
            .await;
        match result {
            Err(StewardError::UnknownTool { name }) => assert_eq!(name, "kubectl_frobnicate"),
            other => panic!("expected UnknownTool, got {other:?}"),
        }
        // Nothing audited, nothing pending.
        assert!(store.list_audit(10).await.unwrap().is_empty());
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_params_are_rejected_before_dispatch() {
        let (engine, _store, _dir) = engine_with(vec![(
            spec_named("scale", ToolClass::Dangerous, 60),
            Arc::new(StaticHandler(json!({"ok": true}))),
        )])
        .await;

        let result = engine
            .execute(
                &call("scale", json!({"replicas": -3})),
                "conv",
                ApprovalMode::Auto,
            )
            .await;
        match result {
            Err(StewardError::BadParams { detail }) => {
                assert!(detail.contains("below minimum"), "got: {detail}")
            }
            other => panic!("expected BadParams, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn normal_mode_executes_safe_and_suspends_dangerous() {
        let (engine, store, _dir) = engine_with(vec![
            (
                spec_named("observe", ToolClass::Safe, 60),
                Arc::new(StaticHandler(json!({"pods": ["a"], "count": 1}))),
            ),
            (
                spec_named("mutate", ToolClass::Dangerous, 60),
                Arc::new(StaticHandler(json!({"done": true}))),
            ),
        ])
        .await;

        let safe = engine
            .execute(&call("observe", json!({})), "conv", ApprovalMode::Normal)
            .await
            .unwrap();
        match safe {
            Outcome::Completed { payload, validation } => {
                assert_eq!(payload["count"], 1);
                assert!(validation.is_none());
            }
            other => panic!("expected Completed, got {other:?}"),
        }

        let dangerous = engine
            .execute(&call("mutate", json!({})), "conv", ApprovalMode::Normal)
            .await
            .unwrap();
        match dangerous {
            Outcome::Suspended { execution_id } => {
                let pending = store.get_pending(&execution_id).await.unwrap().unwrap();
                assert_eq!(pending.tool, "mutate");
                assert_eq!(pending.status, PendingStatus::Pending);
                assert_eq!(pending.approval_mode, ApprovalMode::Normal);
            }
            other => panic!("expected Suspended, got {other:?}"),
        }

        // One audit record for the safe execution only.
        let audit = store.list_audit(10).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].tool, "observe");
        assert_eq!(audit[0].status, AuditStatus::Success);
        assert!(audit[0].approver.is_none());
    }

    #[tokio::test]
    async fn strict_mode_suspends_even_safe_calls() {
        let (engine, store, _dir) = engine_with(vec![(
            spec_named("observe", ToolClass::Safe, 60),
            Arc::new(StaticHandler(json!({"count": 0}))),
        )])
        .await;

        let outcome = engine
            .execute(&call("observe", json!({})), "conv", ApprovalMode::Strict)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Suspended { .. }));
        assert_eq!(store.list_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn auto_mode_never_creates_pendings_and_audits_auto_approver() {
        let (engine, store, _dir) = engine_with(vec![(
            spec_named("mutate", ToolClass::Dangerous, 60),
            Arc::new(StaticHandler(json!({"done": true}))),
        )])
        .await;

        let outcome = engine
            .execute(&call("mutate", json!({})), "conv", ApprovalMode::Auto)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert!(store.list_pending().await.unwrap().is_empty());

        let audit = store.list_audit(10).await.unwrap();
        assert_eq!(audit[0].approver.as_deref(), Some("auto"));
    }

    #[tokio::test]
    async fn timeout_truncates_execution() {
        let (engine, store, _dir) = engine_with(vec![(
            spec_named("slow", ToolClass::Safe, 1),
            Arc::new(SlowHandler),
        )])
        .await;

        let result = engine
            .execute(&call("slow", json!({})), "conv", ApprovalMode::Normal)
            .await;
        match result {
            Err(StewardError::Timeout { duration }) => {
                assert_eq!(duration, Duration::from_secs(1))
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        let audit = store.list_audit(10).await.unwrap();
        assert_eq!(audit[0].status, AuditStatus::Error);
    }

    #[tokio::test]
    async fn validation_notes_attach_without_blocking() {
        let (engine, _store, _dir) = engine_with(vec![(
            spec_named("observe", ToolClass::Safe, 60),
            Arc::new(StaticHandler(json!({"message": "pod not found"}))),
        )])
        .await;

        let outcome = engine
            .execute(&call("observe", json!({})), "conv", ApprovalMode::Normal)
            .await
            .unwrap();
        match outcome {
            Outcome::Completed { payload, validation } => {
                assert!(validation.is_some());
                assert!(payload["validation_warning"].is_string());
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn result_validation_flags_empty_and_error_payloads() {
        assert!(validate_result(&json!({})).is_some());
        assert!(validate_result(&json!([])).is_some());
        assert!(validate_result(&Value::Null).is_some());
        assert!(validate_result(&json!({"status": "Forbidden"})).is_some());
        assert!(validate_result(&json!({"pods": ["a"], "count": 1})).is_none());
    }

    #[test]
    fn execution_ids_are_unique_and_prefixed() {
        let a = new_execution_id();
        let b = new_execution_id();
        assert_ne!(a, b);
        assert!(a.starts_with("exec_"));
    }
}
