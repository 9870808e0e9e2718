use crate::error::AgentError;
use crate::prompts::{PromptVariant, FULL_TOOLS};
use crate::types::{ToolCall, ToolInvocation, ToolSchema};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in function calling).
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> Result<String, AgentError>;
}

/// Central registry for all available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Only names from the tool catalogue are accepted;
    /// re-registering a name replaces the previous tool.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if !FULL_TOOLS.contains(&name.as_str()) {
            return Err(AgentError::ToolNotAllowed(name));
        }
        tracing::debug!("Registered tool: {}", name);
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Registered tool names in catalogue order.
    pub fn list_names(&self) -> Vec<&str> {
        FULL_TOOLS
            .iter()
            .copied()
            .filter(|name| self.tools.contains_key(*name))
            .collect()
    }

    /// Schemas of the registered tools a variant allows, in catalogue order.
    pub fn schemas_for(&self, variant: PromptVariant) -> Vec<ToolSchema> {
        variant
            .allowed_tools()
            .iter()
            .filter_map(|name| self.tools.get(*name))
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Run one tool call under `variant`. Failures, unknown tools and tools
    /// outside the variant become an unsuccessful invocation whose result
    /// text describes the error.
    pub async fn execute(&self, variant: PromptVariant, call: &ToolCall) -> ToolInvocation {
        let started = Instant::now();
        let args = parse_arguments(&call.arguments);

        let outcome = match &args {
            Err(e) => Err(AgentError::tool(&call.name, format!("invalid arguments: {e}"))),
            Ok(_) if !variant.allows(&call.name) => Err(AgentError::ToolNotAllowed(call.name.clone())),
            Ok(args) => match self.tools.get(&call.name) {
                Some(tool) => tool.execute(args.clone()).await,
                None => Err(AgentError::ToolNotFound(call.name.clone())),
            },
        };

        let (result, success) = match outcome {
            Ok(content) => (content, true),
            Err(e) => {
                tracing::warn!(tool = %call.name, "Tool call failed: {}", e);
                (format!("Error: {}", e), false)
            }
        };

        ToolInvocation {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: args.unwrap_or(Value::Null),
            result,
            success,
            latency: started.elapsed(),
        }
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Models sometimes send an empty string for argument-less calls.
fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        Ok(Value::Object(Default::default()))
    } else {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubTool;
    use serde_json::json;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for name in FULL_TOOLS {
            registry.register(Arc::new(StubTool::new(name))).unwrap();
        }
        registry
    }

    #[test]
    fn test_register_rejects_unknown_names() {
        let mut registry = ToolRegistry::new();
        let err = registry.register(Arc::new(StubTool::new("rm_rf"))).unwrap_err();
        assert!(matches!(err, AgentError::ToolNotAllowed(name) if name == "rm_rf"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_schemas_follow_variant() {
        let registry = registry();
        assert!(registry.schemas_for(PromptVariant::Light).is_empty());

        let fast: Vec<_> = registry
            .schemas_for(PromptVariant::Fast)
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(fast, PromptVariant::Fast.allowed_tools());
        assert_eq!(registry.schemas_for(PromptVariant::Full).len(), 12);
    }

    #[test]
    fn test_schemas_skip_unregistered_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(StubTool::new("search_flights"))).unwrap();
        let schemas = registry.schemas_for(PromptVariant::Full);
        assert_eq!(schemas.len(), 1);
        assert_eq!(registry.list_names(), vec!["search_flights"]);
    }

    #[tokio::test]
    async fn test_execute_success() {
        let registry = registry();
        let call = ToolCall::new("search_flights", json!({"origin": "CDG"}));
        let inv = registry.execute(PromptVariant::Fast, &call).await;
        assert!(inv.success);
        assert_eq!(inv.tool_call_id, call.id);
        assert_eq!(inv.result, "search_flights ok");
        assert_eq!(inv.arguments["origin"], "CDG");
    }

    #[tokio::test]
    async fn test_execute_rejects_tool_outside_variant() {
        let registry = registry();
        let call = ToolCall::new("generate_travel_map", json!({}));
        let inv = registry.execute(PromptVariant::Fast, &call).await;
        assert!(!inv.success);
        assert!(inv.result.contains("not allowed"), "{}", inv.result);
    }

    #[tokio::test]
    async fn test_execute_failure_becomes_result_text() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool::failing("search_hotels", "no availability")))
            .unwrap();
        let call = ToolCall::new("search_hotels", json!({}));
        let inv = registry.execute(PromptVariant::Full, &call).await;
        assert!(!inv.success);
        assert!(inv.result.contains("no availability"));

        let missing = ToolCall::new("search_flights", json!({}));
        let inv = registry.execute(PromptVariant::Full, &missing).await;
        assert!(!inv.success);
        assert!(inv.result.contains("Tool not found"));
    }

    #[tokio::test]
    async fn test_execute_handles_bad_and_empty_arguments() {
        let registry = registry();
        let bad = ToolCall {
            id: "call_bad".into(),
            name: "search_flights".into(),
            arguments: "{not json".into(),
        };
        let inv = registry.execute(PromptVariant::Full, &bad).await;
        assert!(!inv.success);
        assert!(inv.result.contains("invalid arguments"));

        let empty = ToolCall {
            id: "call_empty".into(),
            name: "search_flights".into(),
            arguments: String::new(),
        };
        assert!(registry.execute(PromptVariant::Full, &empty).await.success);
    }
}
