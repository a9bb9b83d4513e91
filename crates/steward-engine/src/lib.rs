// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Steward core: conversation driver, execution engine, and approval
//! controller.
//!
//! A user message enters through [`Agent::chat`], which drives the LLM loop:
//! tool calls are classified and either executed, rejected back to the LLM,
//! or suspended behind a human approval gate. [`Agent::decide`] resolves a
//! gate and re-enters the loop from persisted state; nothing holds an
//! in-memory continuation across the gate.

pub mod agent;
pub mod driver;
pub mod engine;
pub mod prompt;

pub use agent::{Agent, DecisionOutcome, SweepReport};
pub use driver::{ChatOptions, ChatOutcome, ConversationDriver, DriverOptions, ToolResultRecord};
pub use engine::{ExecutionEngine, Outcome};
