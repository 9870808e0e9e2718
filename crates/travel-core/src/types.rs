use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A single turn in a conversation. Turns are never mutated once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Name of the tool that produced this turn (tool turns only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool call ID this turn is responding to (tool turns only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_name: None,
            tool_call_id: None,
            tool_calls: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::new(Role::Assistant, content.into())
        }
    }

    /// The turn recording one tool invocation's outcome.
    pub fn tool_result(invocation: &ToolInvocation) -> Self {
        Self {
            tool_name: Some(invocation.tool_name.clone()),
            tool_call_id: Some(invocation.tool_call_id.clone()),
            ..Self::new(Role::Tool, invocation.result.clone())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool call requested by the model. `arguments` is the raw JSON text
/// the model produced; it is parsed at dispatch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments: arguments.to_string(),
        }
    }
}

/// Schema definition for a tool's parameters, sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Record of one executed (or rejected) tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result: String,
    pub success: bool,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_turn_carries_tool_identity() {
        let invocation = ToolInvocation {
            tool_call_id: "call_1".into(),
            tool_name: "search_flights".into(),
            arguments: json!({"origin": "CDG"}),
            result: "3 flights".into(),
            success: true,
            latency: Duration::from_millis(12),
        };
        let turn = Turn::tool_result(&invocation);
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_name.as_deref(), Some("search_flights"));
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(turn.content, "3 flights");
    }

    #[test]
    fn test_turn_serialization_skips_empty_tool_fields() {
        let json = serde_json::to_string(&Turn::user("hello")).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_name"));
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let a = ToolCall::new("get_airport_code", json!({"city_name": "Tokyo"}));
        let b = ToolCall::new("get_airport_code", json!({"city_name": "Tokyo"}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.arguments, b.arguments);
    }
}
