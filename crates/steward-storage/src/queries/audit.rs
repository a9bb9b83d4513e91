// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only audit log queries.
//!
//! Records are write-once: the primary key on execution_id rejects
//! duplicates, and nothing here ever updates a row. Retention is enforced
//! by the sweep in [`prune_before`].

use std::str::FromStr;

use rusqlite::params;
use steward_core::{AuditRecord, AuditStatus, StewardError};

use crate::database::{map_tr_err, other_err, Database};

/// Append a write-once audit record. Duplicate execution ids error.
pub async fn append(db: &Database, record: &AuditRecord) -> Result<(), StewardError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            let params_json = serde_json::to_string(&record.params).map_err(other_err)?;
            conn.execute(
                "INSERT INTO audit_log
                     (execution_id, conversation_id, tool, params, approver, status,
                      requested_at, decided_at, completed_at, result_bytes,
                      result_preview, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    record.execution_id,
                    record.conversation_id,
                    record.tool,
                    params_json,
                    record.approver,
                    record.status.to_string(),
                    record.requested_at,
                    record.decided_at,
                    record.completed_at,
                    record.result_bytes,
                    record.result_preview,
                    record.expires_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List records newest first, up to `limit`.
pub async fn list(db: &Database, limit: i64) -> Result<Vec<AuditRecord>, StewardError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT execution_id, conversation_id, tool, params, approver, status,
                        requested_at, decided_at, completed_at, result_bytes,
                        result_preview, expires_at
                 FROM audit_log ORDER BY requested_at DESC LIMIT ?1",
            )?;
            let mut rows = stmt.query(params![limit])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let params_json: String = row.get(3)?;
                let status: String = row.get(5)?;
                records.push(AuditRecord {
                    execution_id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    tool: row.get(2)?,
                    params: serde_json::from_str(&params_json).map_err(other_err)?,
                    approver: row.get(4)?,
                    status: AuditStatus::from_str(&status).map_err(other_err)?,
                    requested_at: row.get(6)?,
                    decided_at: row.get(7)?,
                    completed_at: row.get(8)?,
                    result_bytes: row.get(9)?,
                    result_preview: row.get(10)?,
                    expires_at: row.get(11)?,
                });
            }
            Ok(records)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete records past retention. Returns the number removed.
pub async fn prune_before(db: &Database, cutoff: &str) -> Result<u64, StewardError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM audit_log WHERE expires_at <= ?1",
                params![cutoff],
            )?;
            Ok(affected as u64)
        })
        .await
        .map_err(map_tr_err)
}
