// SPDX-FileCopyrightText: 2026 Steward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool handler trait and registry.
//!
//! The [`ToolRegistry`] maps tool names to their static [`ToolSpec`] and a
//! handler conforming to `(params) -> Result`. The execution engine resolves
//! calls here and never needs to know which backend serves a tool.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use steward_core::{StewardError, ToolSpec};

/// Unified interface every executor implements.
///
/// The engine calls `invoke` with the parameter object from the LLM's
/// tool_use block, already validated against the tool's schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool and returns a JSON-serializable payload.
    async fn invoke(&self, params: serde_json::Value) -> Result<serde_json::Value, StewardError>;
}

/// Registry of available tools, indexed by name.
pub struct ToolRegistry {
    entries: HashMap<String, (ToolSpec, Arc<dyn ToolHandler>)>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a tool. The entry is indexed by `spec.name`.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) {
        self.entries.insert(spec.name.clone(), (spec, handler));
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<(&ToolSpec, Arc<dyn ToolHandler>)> {
        self.entries
            .get(name)
            .map(|(spec, handler)| (spec, handler.clone()))
    }

    /// Returns all tool specs, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .entries
            .values()
            .map(|(spec, _)| spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steward_core::ToolClass;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn invoke(
            &self,
            params: serde_json::Value,
        ) -> Result<serde_json::Value, StewardError> {
            Ok(params)
        }
    }

    fn echo_spec() -> ToolSpec {
        ToolSpec {
            name: "echo".into(),
            description: "Echoes the input back".into(),
            input_schema: serde_json::json!({"type": "object", "properties": {}}),
            class: ToolClass::Safe,
            timeout_secs: 60,
        }
    }

    #[tokio::test]
    async fn registers_and_invokes() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_spec(), Arc::new(EchoHandler));

        let (spec, handler) = registry.get("echo").unwrap();
        assert_eq!(spec.class, ToolClass::Safe);

        let out = handler
            .invoke(serde_json::json!({"k": "v"}))
            .await
            .unwrap();
        assert_eq!(out["k"], "v");
    }

    #[test]
    fn unknown_tool_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get("nonexistent").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn specs_are_sorted_by_name() {
        let mut registry = ToolRegistry::new();
        let mut b = echo_spec();
        b.name = "b_tool".into();
        let mut a = echo_spec();
        a.name = "a_tool".into();
        registry.register(b, Arc::new(EchoHandler));
        registry.register(a, Arc::new(EchoHandler));

        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a_tool", "b_tool"]);
        assert_eq!(registry.len(), 2);
    }
}
