//! Tool registry — central index of all registered tools.
//!
//! The [`ToolRegistry`] maps tool names to their [`AgentTool`]
//! implementations. The runtime registers tools (and tool servers) before
//! any session starts, then shares the registry read-only across sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use keel_core::tools::ToolDefinition;

use crate::server::ToolServer;
use crate::traits::AgentTool;

/// Central registry mapping tool names to their implementations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn AgentTool>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Overwrites any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn AgentTool>) {
        debug!(tool_name = tool.name(), "tool registered");
        let _ = self.tools.insert(tool.name().to_owned(), tool);
    }

    /// Register every tool of an in-process server under its
    /// `server__toolname` address.
    pub fn register_server(&mut self, server: &ToolServer) {
        for tool in server.qualified_tools() {
            self.register(tool);
        }
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentTool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Return all tool schemas for the model.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Return all tool names, sorted alphabetically.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// A view containing only the named tools.
    ///
    /// Used to scope a sub-agent (or a session with `allowed_tools`) to a
    /// tool subset. Unknown names are ignored.
    #[must_use]
    pub fn scoped(&self, allowed: &[String]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| allowed.iter().any(|a| a == *name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        Self { tools }
    }

    /// A view excluding the named tools.
    #[must_use]
    pub fn without(&self, disallowed: &[String]) -> Self {
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| !disallowed.iter().any(|d| d == *name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        Self { tools }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.len())
            .finish()
    }
}
