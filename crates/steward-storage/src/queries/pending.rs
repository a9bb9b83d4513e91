// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-execution records and their compare-and-set transitions.
//!
//! The status column only ever moves away from 'pending' through the
//! guarded UPDATE in [`transition`] or the bulk sweep in [`expire_before`],
//! which is what makes approval decisions atomic and terminal states final.

use std::str::FromStr;

use rusqlite::params;
use steward_core::{ApprovalMode, PendingExecution, PendingStatus, StewardError, ToolClass};

use crate::database::{map_tr_err, other_err, Database};

fn row_to_pending(row: &rusqlite::Row<'_>) -> Result<PendingExecution, tokio_rusqlite::Error> {
    let params_json: String = row.get(3).map_err(tokio_rusqlite::Error::from)?;
    let class: String = row.get(4).map_err(tokio_rusqlite::Error::from)?;
    let status: String = row.get(5).map_err(tokio_rusqlite::Error::from)?;
    let approval_mode: String = row.get(6).map_err(tokio_rusqlite::Error::from)?;
    let result_json: Option<String> = row.get(11).map_err(tokio_rusqlite::Error::from)?;

    Ok(PendingExecution {
        id: row.get(0).map_err(tokio_rusqlite::Error::from)?,
        conversation_id: row.get(1).map_err(tokio_rusqlite::Error::from)?,
        tool: row.get(2).map_err(tokio_rusqlite::Error::from)?,
        params: serde_json::from_str(&params_json).map_err(other_err)?,
        class: ToolClass::from_str(&class).map_err(other_err)?,
        status: PendingStatus::from_str(&status).map_err(other_err)?,
        approval_mode: ApprovalMode::from_str(&approval_mode).map_err(other_err)?,
        created_at: row.get(7).map_err(tokio_rusqlite::Error::from)?,
        expires_at: row.get(8).map_err(tokio_rusqlite::Error::from)?,
        decided_at: row.get(9).map_err(tokio_rusqlite::Error::from)?,
        approver: row.get(10).map_err(tokio_rusqlite::Error::from)?,
        result: match result_json {
            Some(json) => Some(serde_json::from_str(&json).map_err(other_err)?),
            None => None,
        },
    })
}

const COLUMNS: &str = "id, conversation_id, tool, params, class, status, approval_mode, \
                       created_at, expires_at, decided_at, approver, result";

/// Insert a new pending record.
pub async fn insert(db: &Database, pending: &PendingExecution) -> Result<(), StewardError> {
    let pending = pending.clone();
    db.connection()
        .call(move |conn| {
            let params_json = serde_json::to_string(&pending.params).map_err(other_err)?;
            let result_json = match &pending.result {
                Some(value) => Some(serde_json::to_string(value).map_err(other_err)?),
                None => None,
            };
            conn.execute(
                "INSERT INTO pending_executions
                     (id, conversation_id, tool, params, class, status, approval_mode,
                      created_at, expires_at, decided_at, approver, result)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    pending.id,
                    pending.conversation_id,
                    pending.tool,
                    params_json,
                    pending.class.to_string(),
                    pending.status.to_string(),
                    pending.approval_mode.to_string(),
                    pending.created_at,
                    pending.expires_at,
                    pending.decided_at,
                    pending.approver,
                    result_json,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a record by id.
pub async fn get(db: &Database, id: &str) -> Result<Option<PendingExecution>, StewardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!("SELECT {COLUMNS} FROM pending_executions WHERE id = ?1");
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_pending(row)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List records currently in state 'pending', oldest first.
pub async fn list_pending(db: &Database) -> Result<Vec<PendingExecution>, StewardError> {
    db.connection()
        .call(|conn| {
            let sql = format!(
                "SELECT {COLUMNS} FROM pending_executions
                 WHERE status = 'pending' ORDER BY created_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let mut pendings = Vec::new();
            while let Some(row) = rows.next()? {
                pendings.push(row_to_pending(row)?);
            }
            Ok(pendings)
        })
        .await
        .map_err(map_tr_err)
}

/// Atomic compare-and-set from 'pending' to a terminal state.
/// Returns false when the record was no longer pending.
pub async fn transition(
    db: &Database,
    id: &str,
    to: PendingStatus,
    approver: Option<&str>,
    decided_at: &str,
    result: Option<&serde_json::Value>,
) -> Result<bool, StewardError> {
    let id = id.to_string();
    let approver = approver.map(str::to_string);
    let decided_at = decided_at.to_string();
    let result = result.cloned();
    db.connection()
        .call(move |conn| {
            let result_json = match &result {
                Some(value) => Some(serde_json::to_string(value).map_err(other_err)?),
                None => None,
            };
            let affected = conn.execute(
                "UPDATE pending_executions
                 SET status = ?1, approver = ?2, decided_at = ?3, result = ?4
                 WHERE id = ?5 AND status = 'pending'",
                params![to.to_string(), approver, decided_at, result_json, id],
            )?;
            Ok(affected > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Store the execution result on an already-decided record.
pub async fn record_result(
    db: &Database,
    id: &str,
    result: &serde_json::Value,
) -> Result<(), StewardError> {
    let id = id.to_string();
    let result = result.clone();
    db.connection()
        .call(move |conn| {
            let result_json = serde_json::to_string(&result).map_err(other_err)?;
            conn.execute(
                "UPDATE pending_executions SET result = ?1 WHERE id = ?2",
                params![result_json, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Move all 'pending' records past their TTL to 'expired' and return them.
pub async fn expire_before(
    db: &Database,
    cutoff: &str,
) -> Result<Vec<PendingExecution>, StewardError> {
    let cutoff = cutoff.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM pending_executions
                     WHERE status = 'pending' AND expires_at <= ?1",
                )?;
                let rows = stmt.query_map(params![cutoff], |row| row.get::<_, String>(0))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(row?);
                }
                ids
            };
            for id in &ids {
                tx.execute(
                    "UPDATE pending_executions
                     SET status = 'expired', decided_at = ?1
                     WHERE id = ?2 AND status = 'pending'",
                    params![cutoff, id],
                )?;
            }
            let mut expired = Vec::new();
            {
                let sql = format!("SELECT {COLUMNS} FROM pending_executions WHERE id = ?1");
                let mut stmt = tx.prepare(&sql)?;
                for id in &ids {
                    let mut rows = stmt.query(params![id])?;
                    if let Some(row) = rows.next()? {
                        expired.push(row_to_pending(row)?);
                    }
                }
            }
            tx.commit()?;
            Ok(expired)
        })
        .await
        .map_err(map_tr_err)
}
