// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`ConversationStore`] trait.

use async_trait::async_trait;
use steward_core::{
    AuditRecord, Conversation, ConversationStore, ConversationSummary, PendingExecution,
    PendingStatus, StewardError,
};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::database::Database;
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily initialized on the first
/// call to [`ConversationStore::initialize`].
pub struct SqliteStore {
    database_path: String,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a new store for the given database path.
    ///
    /// The connection is not opened until [`initialize`] is called.
    pub fn new(database_path: String) -> Self {
        Self {
            database_path,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, StewardError> {
        self.db.get().ok_or_else(|| StewardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn initialize(&self) -> Result<(), StewardError> {
        let db = Database::open(&self.database_path).await?;
        self.db.set(db).map_err(|_| StewardError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.database_path, "SQLite store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), StewardError> {
        self.db()?.close().await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> Result<(), StewardError> {
        queries::conversations::save(self.db()?, conversation).await
    }

    async fn load_conversation(&self, id: &str) -> Result<Option<Conversation>, StewardError> {
        queries::conversations::load(self.db()?, id).await
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, StewardError> {
        queries::conversations::list(self.db()?).await
    }

    async fn delete_conversation(&self, id: &str) -> Result<bool, StewardError> {
        queries::conversations::delete(self.db()?, id).await
    }

    async fn insert_pending(&self, pending: &PendingExecution) -> Result<(), StewardError> {
        queries::pending::insert(self.db()?, pending).await
    }

    async fn get_pending(&self, id: &str) -> Result<Option<PendingExecution>, StewardError> {
        queries::pending::get(self.db()?, id).await
    }

    async fn list_pending(&self) -> Result<Vec<PendingExecution>, StewardError> {
        queries::pending::list_pending(self.db()?).await
    }

    async fn transition_pending(
        &self,
        id: &str,
        to: PendingStatus,
        approver: Option<&str>,
        decided_at: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<bool, StewardError> {
        queries::pending::transition(self.db()?, id, to, approver, decided_at, result).await
    }

    async fn record_pending_result(
        &self,
        id: &str,
        result: &serde_json::Value,
    ) -> Result<(), StewardError> {
        queries::pending::record_result(self.db()?, id, result).await
    }

    async fn expire_pending_before(
        &self,
        cutoff: &str,
    ) -> Result<Vec<PendingExecution>, StewardError> {
        queries::pending::expire_before(self.db()?, cutoff).await
    }

    async fn append_audit(&self, record: &AuditRecord) -> Result<(), StewardError> {
        queries::audit::append(self.db()?, record).await
    }

    async fn list_audit(&self, limit: i64) -> Result<Vec<AuditRecord>, StewardError> {
        queries::audit::list(self.db()?, limit).await
    }

    async fn prune_audit_before(&self, cutoff: &str) -> Result<u64, StewardError> {
        queries::audit::prune_before(self.db()?, cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::Turn;
    use tempfile::tempdir;

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(db_path.to_str().unwrap().to_string());

        store.initialize().await.unwrap();
        assert!(store.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_before_initialize_fail() {
        let store = SqliteStore::new("unused.db".to_string());
        assert!(store.list_conversations().await.is_err());
    }

    #[tokio::test]
    async fn full_conversation_lifecycle_through_store() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("lifecycle.db");
        let store = SqliteStore::new(db_path.to_str().unwrap().to_string());
        store.initialize().await.unwrap();

        let mut conversation = Conversation::new(
            "conv-1".into(),
            "Scale frontend to five replicas",
            "2026-01-01T00:00:00+00:00".into(),
        );
        conversation.turns.push(Turn::User {
            text: "Scale frontend to five replicas".into(),
        });
        store.save_conversation(&conversation).await.unwrap();

        let loaded = store.load_conversation("conv-1").await.unwrap().unwrap();
        assert_eq!(loaded, conversation);

        let summaries = store.list_conversations().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 1);

        assert!(store.delete_conversation("conv-1").await.unwrap());
        assert!(store.load_conversation("conv-1").await.unwrap().is_none());

        store.close().await.unwrap();
    }
}
