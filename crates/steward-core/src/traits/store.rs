// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the conversation, pending-execution, and
//! audit persistence tiers.

use async_trait::async_trait;

use crate::error::StewardError;
use crate::types::{
    AuditRecord, Conversation, ConversationSummary, PendingExecution, PendingStatus,
};

/// Adapter for the durable state store.
///
/// Conversations are snapshot blobs keyed by id with listing metadata;
/// pending executions carry a one-hour TTL and transition via atomic
/// compare-and-set; the audit log is append-only with 30-day retention.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Initializes the backend (runs migrations, opens connections).
    async fn initialize(&self) -> Result<(), StewardError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), StewardError>;

    // --- Conversations ---

    /// Inserts or replaces the full conversation snapshot.
    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), StewardError>;

    /// Loads a conversation with its full turn sequence, in order.
    async fn load_conversation(&self, id: &str) -> Result<Option<Conversation>, StewardError>;

    /// Lists conversations sorted by most-recent update.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StewardError>;

    /// Deletes a conversation. Returns false when the id was unknown.
    async fn delete_conversation(&self, id: &str) -> Result<bool, StewardError>;

    // --- Pending executions ---

    /// Stores a new pending execution record.
    async fn insert_pending(&self, pending: &PendingExecution) -> Result<(), StewardError>;

    /// Fetches a pending execution by id.
    async fn get_pending(&self, id: &str) -> Result<Option<PendingExecution>, StewardError>;

    /// Lists records currently in state `pending`.
    async fn list_pending(&self) -> Result<Vec<PendingExecution>, StewardError>;

    /// Atomic compare-and-set transition from `pending` to a terminal state.
    /// Returns false when the record was no longer pending (lost race).
    async fn transition_pending(
        &self,
        id: &str,
        to: PendingStatus,
        approver: Option<&str>,
        decided_at: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<bool, StewardError>;

    /// Stores the execution result on an already-decided record so repeated
    /// identical decisions can return the original outcome.
    async fn record_pending_result(
        &self,
        id: &str,
        result: &serde_json::Value,
    ) -> Result<(), StewardError>;

    /// Moves all `pending` records whose TTL elapsed before `cutoff` to
    /// `expired`, returning the transitioned records.
    async fn expire_pending_before(
        &self,
        cutoff: &str,
    ) -> Result<Vec<PendingExecution>, StewardError>;

    // --- Audit log ---

    /// Appends a write-once audit record. Duplicate execution ids error.
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StewardError>;

    /// Lists audit records, newest first, up to `limit`.
    async fn list_audit(&self, limit: i64) -> Result<Vec<AuditRecord>, StewardError>;

    /// Deletes audit records past their retention expiry. Returns the count.
    async fn prune_audit_before(&self, cutoff: &str) -> Result<u64, StewardError>;
}
