// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Steward workspace.
//!
//! Provides a deterministic mock LLM provider and a builder-style harness
//! that assembles a full in-memory agent (temp SQLite, scripted provider,
//! stub or real tool registry) so the driver loop, engine, and gateway can
//! be exercised without external API calls.

pub mod harness;
pub mod mock_provider;

pub use harness::{stub_spec, StubTool, TestHarness, TestHarnessBuilder};
pub use mock_provider::{MockProvider, ScriptedReply};
