// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete agent stack: temp SQLite storage, a
//! scripted mock provider, and a tool registry (stub handlers or a real
//! catalog). Provides `chat()` to drive the full driver loop in tests.

use std::sync::Arc;

use async_trait::async_trait;
use steward_core::{
    ApprovalMode, ConversationStore, StewardError, ToolClass, ToolSpec,
};
use steward_engine::{Agent, ChatOptions, ChatOutcome, DriverOptions};
use steward_storage::SqliteStore;
use steward_tools::{ToolHandler, ToolRegistry};

use crate::mock_provider::{MockProvider, ScriptedReply};

/// A tool handler that answers every invocation with a fixed payload.
pub struct StubTool(pub serde_json::Value);

#[async_trait]
impl ToolHandler for StubTool {
    async fn invoke(
        &self,
        _params: serde_json::Value,
    ) -> Result<serde_json::Value, StewardError> {
        Ok(self.0.clone())
    }
}

/// A permissive tool spec for stub registrations: the common Kubernetes
/// parameter names, nothing required, replicas bounded like the catalog.
pub fn stub_spec(name: &str, class: ToolClass) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: format!("test stub for {name}"),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "namespace": {"type": "string"},
                "pod_name": {"type": "string"},
                "deployment_name": {"type": "string"},
                "replicas": {"type": "integer", "minimum": 0, "maximum": 50}
            }
        }),
        class,
        timeout_secs: 60,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    replies: Vec<ScriptedReply>,
    registry: Option<ToolRegistry>,
    tools: Vec<(ToolSpec, Arc<dyn ToolHandler>)>,
    options: DriverOptions,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            replies: Vec::new(),
            registry: None,
            tools: Vec::new(),
            options: DriverOptions::default(),
        }
    }

    /// Queue scripted provider replies.
    pub fn with_replies(mut self, replies: Vec<ScriptedReply>) -> Self {
        self.replies = replies;
        self
    }

    /// Start from a pre-built registry (e.g. the real catalog wired to a
    /// mock cluster) instead of an empty one.
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register one tool on top of the base registry.
    pub fn with_tool(mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Self {
        self.tools.push((spec, handler));
        self
    }

    /// Override the driver options (model, max tokens).
    pub fn with_driver_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, StewardError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| StewardError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let store = Arc::new(SqliteStore::new(db_path.to_string_lossy().to_string()));
        store.initialize().await?;

        let mut registry = self.registry.unwrap_or_default();
        for (spec, handler) in self.tools {
            registry.register(spec, handler);
        }

        let provider = Arc::new(MockProvider::with_replies(self.replies));
        let agent = Agent::new(
            provider.clone(),
            store.clone(),
            Arc::new(registry),
            self.options,
        );

        Ok(TestHarness {
            agent,
            provider,
            store,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with a mock provider and temp storage.
pub struct TestHarness {
    /// The assembled agent under test.
    pub agent: Arc<Agent>,
    /// The scripted LLM provider.
    pub provider: Arc<MockProvider>,
    /// SQLite store (temp DB, cleaned up on drop).
    pub store: Arc<SqliteStore>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Send a user message through the full driver loop in normal mode.
    pub async fn chat(&self, text: &str) -> Result<ChatOutcome, StewardError> {
        self.chat_with(None, text, ApprovalMode::Normal).await
    }

    /// Send a user message with an explicit conversation id and mode.
    pub async fn chat_with(
        &self,
        conversation_id: Option<String>,
        text: &str,
        approval_mode: ApprovalMode,
    ) -> Result<ChatOutcome, StewardError> {
        self.agent
            .chat(
                conversation_id,
                text,
                &ChatOptions {
                    approval_mode,
                    model: None,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::ToolResultStatus;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        let conversations = harness.store.list_conversations().await.unwrap();
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn chat_returns_scripted_reply_and_persists() {
        let harness = TestHarness::builder()
            .with_replies(vec![ScriptedReply::text("custom response")])
            .build()
            .await
            .unwrap();

        let outcome = harness.chat("hello").await.unwrap();
        assert_eq!(outcome.response_text, "custom response");

        let conversations = harness.store.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 1);
        assert_eq!(conversations[0].message_count, 2); // user + assistant
    }

    #[tokio::test]
    async fn stub_tools_flow_through_the_loop() {
        let harness = TestHarness::builder()
            .with_tool(
                stub_spec("kubectl_get_pods", ToolClass::Safe),
                Arc::new(StubTool(serde_json::json!({"pods": [], "count": 0}))),
            )
            .with_replies(vec![
                ScriptedReply::tool_call("kubectl_get_pods", serde_json::json!({})),
                ScriptedReply::text("No pods running."),
            ])
            .build()
            .await
            .unwrap();

        let outcome = harness.chat("list pods").await.unwrap();
        assert_eq!(outcome.response_text, "No pods running.");
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].status, ToolResultStatus::Ok);
    }

    #[tokio::test]
    async fn strict_mode_gates_through_the_harness() {
        let harness = TestHarness::builder()
            .with_tool(
                stub_spec("kubectl_get_pods", ToolClass::Safe),
                Arc::new(StubTool(serde_json::json!({"count": 0}))),
            )
            .with_replies(vec![ScriptedReply::tool_call(
                "kubectl_get_pods",
                serde_json::json!({}),
            )])
            .build()
            .await
            .unwrap();

        let outcome = harness
            .chat_with(None, "list pods", ApprovalMode::Strict)
            .await
            .unwrap();
        assert!(outcome.pending_execution.is_some());
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder()
            .with_replies(vec![ScriptedReply::text("one")])
            .build()
            .await
            .unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();

        h1.chat("msg1").await.unwrap();
        assert_eq!(h1.store.list_conversations().await.unwrap().len(), 1);
        assert!(h2.store.list_conversations().await.unwrap().is_empty());
    }
}
