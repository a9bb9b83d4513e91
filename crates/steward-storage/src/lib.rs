// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Steward agent.
//!
//! Two logical tiers in one database: fast-access state (conversation
//! snapshots, pending executions with a one-hour TTL) and the append-only
//! audit log retained for 30 days. All writes serialize through a single
//! background connection.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
