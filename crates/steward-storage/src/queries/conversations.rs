// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation snapshot CRUD.
//!
//! The turn sequence is stored as one JSON blob per conversation; listing
//! metadata (title, message count, recency) lives in plain columns so the
//! index query never parses blobs.

use rusqlite::params;
use steward_core::{Conversation, ConversationSummary, StewardError};

use crate::database::{map_tr_err, other_err, Database};

/// Insert or replace the full conversation snapshot.
pub async fn save(db: &Database, conversation: &Conversation) -> Result<(), StewardError> {
    let conversation = conversation.clone();
    db.connection()
        .call(move |conn| {
            let turns = serde_json::to_string(&conversation.turns).map_err(other_err)?;
            conn.execute(
                "INSERT INTO conversations (id, title, turns, message_count, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     title = excluded.title,
                     turns = excluded.turns,
                     message_count = excluded.message_count,
                     updated_at = excluded.updated_at",
                params![
                    conversation.id,
                    conversation.title,
                    turns,
                    conversation.turns.len() as i64,
                    conversation.created_at,
                    conversation.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load a conversation with its full turn sequence.
pub async fn load(db: &Database, id: &str) -> Result<Option<Conversation>, StewardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, turns, created_at, updated_at
                 FROM conversations WHERE id = ?1",
            )?;
            let result = stmt.query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            });
            match result {
                Ok((id, title, turns, created_at, updated_at)) => {
                    let turns = serde_json::from_str(&turns).map_err(other_err)?;
                    Ok(Some(Conversation {
                        id,
                        title,
                        turns,
                        created_at,
                        updated_at,
                    }))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List conversations sorted by most-recent update.
pub async fn list(db: &Database) -> Result<Vec<ConversationSummary>, StewardError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, message_count, updated_at
                 FROM conversations ORDER BY updated_at DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ConversationSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    message_count: row.get(2)?,
                    last_updated: row.get(3)?,
                })
            })?;
            let mut summaries = Vec::new();
            for row in rows {
                summaries.push(row?);
            }
            Ok(summaries)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a conversation. Returns false when the id was unknown.
pub async fn delete(db: &Database, id: &str) -> Result<bool, StewardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::Turn;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("conv.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_conversation(id: &str, updated_at: &str) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: "List pods".to_string(),
            turns: vec![
                Turn::User {
                    text: "List pods".into(),
                },
                Turn::Assistant {
                    text: Some("Done.".into()),
                    tool_calls: vec![],
                },
            ],
            created_at: "2026-01-01T00:00:00+00:00".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    #[tokio::test]
    async fn save_and_load_round_trips_turns() {
        let (db, _dir) = setup_db().await;
        let conversation = make_conversation("conv-1", "2026-01-01T01:00:00+00:00");

        save(&db, &conversation).await.unwrap();
        let loaded = load(&db, "conv-1").await.unwrap().unwrap();
        assert_eq!(loaded, conversation);
        assert_eq!(
            serde_json::to_string(&loaded).unwrap(),
            serde_json::to_string(&conversation).unwrap()
        );
    }

    #[tokio::test]
    async fn load_unknown_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(load(&db, "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_twice_replaces_snapshot() {
        let (db, _dir) = setup_db().await;
        let mut conversation = make_conversation("conv-1", "2026-01-01T01:00:00+00:00");
        save(&db, &conversation).await.unwrap();

        conversation.turns.push(Turn::User {
            text: "And deployments?".into(),
        });
        conversation.updated_at = "2026-01-01T02:00:00+00:00".into();
        save(&db, &conversation).await.unwrap();

        let loaded = load(&db, "conv-1").await.unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 3);

        let summaries = list(&db).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].message_count, 3);
    }

    #[tokio::test]
    async fn list_sorts_by_recency() {
        let (db, _dir) = setup_db().await;
        save(&db, &make_conversation("old", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        save(&db, &make_conversation("new", "2026-01-02T00:00:00+00:00"))
            .await
            .unwrap();

        let summaries = list(&db).await.unwrap();
        assert_eq!(summaries[0].id, "new");
        assert_eq!(summaries[1].id, "old");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (db, _dir) = setup_db().await;
        save(&db, &make_conversation("conv-1", "2026-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        assert!(delete(&db, "conv-1").await.unwrap());
        assert!(!delete(&db, "conv-1").await.unwrap());
        assert!(load(&db, "conv-1").await.unwrap().is_none());
    }
}
