//! In-process tool servers.
//!
//! A [`ToolServer`] is a named bundle of tools registered wholesale into
//! the registry. Bundled tools are addressed as `server__toolname`, so two
//! servers can expose tools with the same short name without colliding.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use keel_core::tools::{ToolDefinition, ToolOutput};

use crate::errors::ToolError;
use crate::traits::{AgentTool, ToolContext};

/// A named bundle of tool collaborators.
pub struct ToolServer {
    name: String,
    version: String,
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolServer {
    /// Create an empty server with a name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            tools: Vec::new(),
        }
    }

    /// Add a tool to the bundle (builder style).
    #[must_use]
    pub fn tool(mut self, tool: Arc<dyn AgentTool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Server name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Server version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The bundled tools, each wrapped under its qualified
    /// `server__toolname` address.
    #[must_use]
    pub fn qualified_tools(&self) -> Vec<Arc<dyn AgentTool>> {
        self.tools
            .iter()
            .map(|tool| {
                Arc::new(QualifiedTool {
                    qualified_name: format!("{}__{}", self.name, tool.name()),
                    inner: Arc::clone(tool),
                }) as Arc<dyn AgentTool>
            })
            .collect()
    }
}

/// Wrapper exposing a bundled tool under its qualified address.
struct QualifiedTool {
    qualified_name: String,
    inner: Arc<dyn AgentTool>,
}

#[async_trait]
impl AgentTool for QualifiedTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    fn network_capable(&self) -> bool {
        self.inner.network_capable()
    }

    fn definition(&self) -> ToolDefinition {
        let mut definition = self.inner.definition();
        definition.name = self.qualified_name.clone();
        definition
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        self.inner.execute(input, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::tools::{ToolParameterSchema, text_output};
    use tokio_util::sync::CancellationToken;

    struct WeatherTool;

    #[async_trait]
    impl AgentTool for WeatherTool {
        fn name(&self) -> &str {
            "get_weather"
        }
        fn read_only(&self) -> bool {
            true
        }
        fn network_capable(&self) -> bool {
            true
        }
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "get_weather".into(),
                description: "Get current weather for a location".into(),
                parameters: ToolParameterSchema::empty_object(),
            }
        }
        async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            let location = input.get("location").and_then(Value::as_str).unwrap_or("?");
            Ok(text_output(format!("Weather in {location}: 22C, sunny")))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            tool_call_id: "tc-1".into(),
            session_id: "s-1".into(),
            working_directory: "/tmp".into(),
            cancellation: CancellationToken::new(),
        }
    }

    #[test]
    fn server_qualifies_tool_names() {
        let server = ToolServer::new("weather-service", "1.0.0").tool(Arc::new(WeatherTool));
        let tools = server.qualified_tools();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "weather-service__get_weather");
        assert_eq!(tools[0].definition().name, "weather-service__get_weather");
    }

    #[test]
    fn qualified_tool_keeps_classification() {
        let server = ToolServer::new("weather-service", "1.0.0").tool(Arc::new(WeatherTool));
        let tools = server.qualified_tools();
        assert!(tools[0].read_only());
        assert!(tools[0].network_capable());
    }

    #[tokio::test]
    async fn qualified_tool_delegates_execution() {
        let server = ToolServer::new("weather-service", "1.0.0").tool(Arc::new(WeatherTool));
        let tools = server.qualified_tools();
        let out = tools[0]
            .execute(serde_json::json!({"location": "Tokyo"}), &ctx())
            .await
            .unwrap();
        assert!(out.content.contains("Tokyo"));
    }

    #[test]
    fn server_metadata() {
        let server = ToolServer::new("math", "2.1.0");
        assert_eq!(server.name(), "math");
        assert_eq!(server.version(), "2.1.0");
        assert!(server.qualified_tools().is_empty());
    }
}
