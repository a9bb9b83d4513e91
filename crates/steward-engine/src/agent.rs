// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent facade: one object owning the driver, engine, and approval
//! state machine, exposed to the gateway and the CLI.
//!
//! Approval decisions follow the state machine
//! `pending -> approved | rejected | expired`: the transition is an atomic
//! compare-and-set, terminal states never move again, and re-sending the
//! same decision is a no-op returning the original result.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use steward_core::{
    AuditRecord, AuditStatus, Conversation, ConversationStore, ConversationSummary, LlmProvider,
    PendingExecution, PendingStatus, StewardError, ToolResultStatus, ToolSpec,
};
use steward_tools::ToolRegistry;
use tracing::{info, warn};

use crate::driver::{replace_gate, ChatOptions, ChatOutcome, ConversationDriver, DriverOptions};
use crate::engine::ExecutionEngine;

/// Interval at which the background sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of an approval decision.
#[derive(Debug)]
pub enum DecisionOutcome {
    /// Approved: the call executed and the conversation continued.
    Approved(ChatOutcome),
    /// Rejected: the LLM observed the rejection and replied.
    Rejected(ChatOutcome),
    /// The same decision was re-sent for an already-decided execution;
    /// nothing ran again.
    Idempotent {
        execution_id: String,
        status: PendingStatus,
        result: Option<Value>,
    },
}

/// What one sweeper pass did.
#[derive(Debug, Clone, Copy)]
pub struct SweepReport {
    pub expired_pendings: usize,
    pub pruned_audit_records: u64,
}

/// The assembled Steward agent.
pub struct Agent {
    store: Arc<dyn ConversationStore>,
    engine: Arc<ExecutionEngine>,
    driver: ConversationDriver,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn ConversationStore>,
        registry: Arc<ToolRegistry>,
        options: DriverOptions,
    ) -> Arc<Self> {
        let engine = Arc::new(ExecutionEngine::new(registry, store.clone()));
        let driver = ConversationDriver::new(provider, engine.clone(), store.clone(), options);
        Arc::new(Self {
            store,
            engine,
            driver,
        })
    }

    /// Runs one user turn through the driver loop.
    pub async fn chat(
        &self,
        conversation_id: Option<String>,
        user_text: &str,
        options: &ChatOptions,
    ) -> Result<ChatOutcome, StewardError> {
        self.driver.chat(conversation_id, user_text, options).await
    }

    /// Resolves a pending execution and re-enters the driver loop.
    pub async fn decide(
        &self,
        execution_id: &str,
        approved: bool,
        approver: &str,
    ) -> Result<DecisionOutcome, StewardError> {
        let pending = self
            .store
            .get_pending(execution_id)
            .await?
            .ok_or_else(|| StewardError::NotFound(format!("execution {execution_id}")))?;

        if pending.status.is_terminal() {
            return already_decided(pending, approved);
        }

        let decided_at = chrono::Utc::now().to_rfc3339();
        let target = if approved {
            PendingStatus::Approved
        } else {
            PendingStatus::Rejected
        };
        let won = self
            .store
            .transition_pending(execution_id, target, Some(approver), &decided_at, None)
            .await?;
        if !won {
            // Lost the race: reload and report against the winner's state.
            let current = self
                .store
                .get_pending(execution_id)
                .await?
                .ok_or_else(|| StewardError::NotFound(format!("execution {execution_id}")))?;
            return already_decided(current, approved);
        }

        if !approved {
            info!(execution_id, approver, "execution rejected");
            let rejection = json!({
                "status": "error",
                "reason": "user_rejected",
                "message": "Execution rejected by user",
            });
            self.store
                .record_pending_result(execution_id, &rejection)
                .await?;
            self.engine
                .audit_decision(&pending, AuditStatus::Rejected, Some(approver), &decided_at)
                .await?;

            let gate_id = pending.id.clone();
            let outcome = self
                .driver
                .resume(&pending.conversation_id, pending.approval_mode, move |c| {
                    replace_gate(c, &gate_id, ToolResultStatus::Error, rejection, None);
                })
                .await?;
            return Ok(DecisionOutcome::Rejected(outcome));
        }

        info!(execution_id, approver, tool = %pending.tool, "execution approved, dispatching");
        match self
            .engine
            .dispatch_approved(&pending, approver, &decided_at)
            .await
        {
            Ok((payload, validation)) => {
                self.store
                    .record_pending_result(execution_id, &payload)
                    .await?;
                let gate_id = pending.id.clone();
                let gate_payload = payload.clone();
                let outcome = self
                    .driver
                    .resume(&pending.conversation_id, pending.approval_mode, move |c| {
                        replace_gate(c, &gate_id, ToolResultStatus::Ok, gate_payload, validation);
                    })
                    .await?;
                Ok(DecisionOutcome::Approved(outcome))
            }
            Err(e) if e.is_tool_level() || matches!(e, StewardError::Unreachable { .. }) => {
                // The approved call failed; the LLM decides what to do next.
                let failure = json!({"status": "error", "error": e.to_string()});
                self.store
                    .record_pending_result(execution_id, &failure)
                    .await?;
                let gate_id = pending.id.clone();
                let gate_payload = failure.clone();
                let outcome = self
                    .driver
                    .resume(&pending.conversation_id, pending.approval_mode, move |c| {
                        replace_gate(c, &gate_id, ToolResultStatus::Error, gate_payload, None);
                    })
                    .await?;
                Ok(DecisionOutcome::Approved(outcome))
            }
            Err(e) => Err(e),
        }
    }

    /// One sweeper pass: expire stale pendings and prune old audit records.
    pub async fn sweep_once(&self) -> Result<SweepReport, StewardError> {
        let now = chrono::Utc::now().to_rfc3339();
        let expired = self.store.expire_pending_before(&now).await?;
        for pending in &expired {
            warn!(execution_id = %pending.id, tool = %pending.tool, "pending execution expired");
            self.engine
                .audit_decision(pending, AuditStatus::Expired, None, &now)
                .await?;
        }
        let pruned = self.store.prune_audit_before(&now).await?;
        Ok(SweepReport {
            expired_pendings: expired.len(),
            pruned_audit_records: pruned,
        })
    }

    /// Spawns the background sweeper task.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match agent.sweep_once().await {
                    Ok(report) if report.expired_pendings > 0 || report.pruned_audit_records > 0 => {
                        info!(
                            expired = report.expired_pendings,
                            pruned = report.pruned_audit_records,
                            "sweeper pass complete"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "sweeper pass failed"),
                }
            }
        })
    }

    // --- Listing API used by the gateway ---

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StewardError> {
        self.store.list_conversations().await
    }

    pub async fn load_conversation(&self, id: &str) -> Result<Conversation, StewardError> {
        self.store
            .load_conversation(id)
            .await?
            .ok_or_else(|| StewardError::NotFound(format!("conversation {id}")))
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), StewardError> {
        if self.store.delete_conversation(id).await? {
            Ok(())
        } else {
            Err(StewardError::NotFound(format!("conversation {id}")))
        }
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingExecution>, StewardError> {
        self.store.list_pending().await
    }

    pub async fn history(&self, limit: i64) -> Result<Vec<AuditRecord>, StewardError> {
        self.store.list_audit(limit).await
    }

    pub fn tools(&self) -> Vec<ToolSpec> {
        self.engine.tool_specs()
    }
}

fn already_decided(
    pending: PendingExecution,
    approved: bool,
) -> Result<DecisionOutcome, StewardError> {
    let matches = (approved && pending.status == PendingStatus::Approved)
        || (!approved && pending.status == PendingStatus::Rejected);
    if matches {
        return Ok(DecisionOutcome::Idempotent {
            execution_id: pending.id,
            status: pending.status,
            result: pending.result,
        });
    }
    Err(StewardError::AlreadyDecided {
        execution_id: pending.id,
        status: pending.status.to_string(),
    })
}
