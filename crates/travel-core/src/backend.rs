//! Model backend port and its OpenAI-compatible implementation.

use crate::config::ProviderConfig;
use crate::error::AgentError;
use crate::types::{Role, ToolCall, ToolSchema, Turn};

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, CreateChatCompletionResponse, FunctionCall,
    FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

/// Consecutive transient failures after which an endpoint is skipped while
/// a healthier one remains.
const MAX_CONSECUTIVE_FAILURES: u32 = 2;

/// One request to the model. An empty `tools` list means plain completion.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub messages: Vec<Turn>,
    pub tools: Vec<ToolSchema>,
}

impl ModelRequest {
    pub fn completion(system_prompt: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// What the model answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls { content: String, calls: Vec<ToolCall> },
}

/// Token usage as reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Prompt tokens served from the provider's prompt cache.
    pub cached_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            cached_tokens: 0,
        }
    }

    pub fn cache_hit(&self) -> bool {
        self.cached_tokens > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub reply: ModelReply,
    pub usage: Option<Usage>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: ModelReply::Text(text.into()),
            usage: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            reply: ModelReply::ToolCalls {
                content: String::new(),
                calls,
            },
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Anything that can answer a [`ModelRequest`].
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Pricing key of the provider behind this backend.
    fn provider(&self) -> &str;

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, AgentError>;
}

/// Error classification for failover decisions.
#[derive(Debug, Clone, PartialEq)]
enum RequestError {
    /// Safe to retry with the next endpoint (network, 5xx, rate limit).
    Transient(String),
    /// Stop trying (auth, bad request).
    Permanent(String),
}

struct Endpoint {
    label: String,
    client: Client<OpenAIConfig>,
    model: String,
    consecutive_failures: AtomicU32,
}

/// Chat-completions backend with ordered failover across endpoints.
pub struct OpenAiBackend {
    provider: String,
    endpoints: Vec<Endpoint>,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, AgentError> {
        if config.api_base.trim().is_empty() {
            return Err(AgentError::Config("provider.api_base is empty".into()));
        }

        let mut endpoints = vec![Endpoint::new(
            "primary".into(),
            &config.api_base,
            config.model.clone(),
            config.resolved_api_key(),
        )];
        for (i, fo) in config.failover.iter().enumerate() {
            endpoints.push(Endpoint::new(
                format!("failover-{}", i + 1),
                &fo.api_base,
                fo.model.clone().unwrap_or_else(|| config.model.clone()),
                fo.resolved_api_key(),
            ));
        }

        Ok(Self {
            provider: config.name.clone(),
            endpoints,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Endpoints in the order they will be tried: healthy ones first,
    /// falling back to all of them when none is healthy.
    fn candidates(&self) -> Vec<&Endpoint> {
        let healthy: Vec<&Endpoint> = self
            .endpoints
            .iter()
            .filter(|e| e.consecutive_failures.load(Ordering::Relaxed) < MAX_CONSECUTIVE_FAILURES)
            .collect();
        if healthy.is_empty() {
            self.endpoints.iter().collect()
        } else {
            healthy
        }
    }

    async fn call(
        &self,
        endpoint: &Endpoint,
        messages: &[ChatCompletionRequestMessage],
        tools: &[ChatCompletionTool],
    ) -> Result<ModelResponse, RequestError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&endpoint.model)
            .messages(messages.to_vec())
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);
        if !tools.is_empty() {
            builder.tools(tools.to_vec());
        }
        let request = builder
            .build()
            .map_err(|e| RequestError::Permanent(e.to_string()))?;

        let response = endpoint
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_error)?;

        parse_response(response).map_err(|e| RequestError::Transient(e.to_string()))
    }
}

impl Endpoint {
    fn new(label: String, api_base: &str, model: String, api_key: Option<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key.unwrap_or_else(|| "not-needed".to_string()));
        Self {
            label,
            client: Client::with_config(config),
            model,
            consecutive_failures: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, AgentError> {
        let messages = to_openai_messages(&request.system_prompt, &request.messages)?;
        let tools = to_openai_tools(&request.tools)?;

        let mut errors = Vec::new();
        for endpoint in self.candidates() {
            debug!(endpoint = %endpoint.label, model = %endpoint.model, "Invoking model");
            match self.call(endpoint, &messages, &tools).await {
                Ok(response) => {
                    endpoint.consecutive_failures.store(0, Ordering::Relaxed);
                    return Ok(response);
                }
                Err(RequestError::Transient(msg)) => {
                    warn!("Endpoint {} transient error: {}", endpoint.label, msg);
                    endpoint.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                    errors.push(format!("{}: {}", endpoint.label, msg));
                }
                Err(RequestError::Permanent(msg)) => {
                    warn!("Endpoint {} permanent error: {}", endpoint.label, msg);
                    return Err(AgentError::Provider(format!(
                        "Endpoint {} permanent error: {}",
                        endpoint.label, msg
                    )));
                }
            }
        }

        Err(AgentError::Provider(format!(
            "All endpoints failed: {}",
            errors.join("; ")
        )))
    }
}

fn classify_error(err: OpenAIError) -> RequestError {
    match err {
        OpenAIError::Reqwest(e) => RequestError::Transient(e.to_string()),
        OpenAIError::StreamError(msg) => RequestError::Transient(msg),
        OpenAIError::JSONDeserialize(e) => RequestError::Transient(e.to_string()),
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default().to_lowercase();
            let code = api.code.clone().unwrap_or_default().to_lowercase();
            let transient = ["rate_limit", "server_error", "overloaded", "timeout", "unavailable"]
                .iter()
                .any(|marker| kind.contains(marker) || code.contains(marker));
            if transient {
                RequestError::Transient(api.message)
            } else {
                RequestError::Permanent(api.message)
            }
        }
        other => RequestError::Permanent(other.to_string()),
    }
}

fn parse_response(response: CreateChatCompletionResponse) -> Result<ModelResponse, AgentError> {
    let usage = response.usage.as_ref().map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        cached_tokens: u
            .prompt_tokens_details
            .as_ref()
            .and_then(|d| d.cached_tokens)
            .unwrap_or(0),
    });

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Provider("No choices in response".into()))?;
    let content = choice.message.content.unwrap_or_default();

    let calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let reply = if calls.is_empty() {
        ModelReply::Text(content)
    } else {
        ModelReply::ToolCalls { content, calls }
    };
    Ok(ModelResponse { reply, usage })
}

fn to_openai_tools(schemas: &[ToolSchema]) -> Result<Vec<ChatCompletionTool>, AgentError> {
    schemas
        .iter()
        .map(|s| {
            let func = FunctionObjectArgs::default()
                .name(&s.name)
                .description(&s.description)
                .parameters(s.parameters.clone())
                .build()
                .map_err(|e| AgentError::Schema(format!("function '{}': {}", s.name, e)))?;
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(func)
                .build()
                .map_err(|e| AgentError::Schema(format!("tool '{}': {}", s.name, e)))
        })
        .collect()
}

/// Convert turns to request messages. Tool turns whose originating
/// assistant call is not part of `turns` (cut off by the history window)
/// are dropped, since providers reject orphaned tool results.
fn to_openai_messages(
    system_prompt: &str,
    turns: &[Turn],
) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
    let mut result = Vec::with_capacity(turns.len() + 1);
    let mut announced: HashSet<&str> = HashSet::new();

    if !system_prompt.is_empty() {
        let m = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| AgentError::Provider(e.to_string()))?;
        result.push(ChatCompletionRequestMessage::System(m));
    }

    for turn in turns {
        match turn.role {
            Role::User => {
                let m = ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| AgentError::Provider(e.to_string()))?;
                result.push(ChatCompletionRequestMessage::User(m));
            }
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(turn.content.as_str());
                if let Some(tool_calls) = &turn.tool_calls {
                    let tc_openai: Vec<ChatCompletionMessageToolCall> = tool_calls
                        .iter()
                        .map(|tc| {
                            announced.insert(tc.id.as_str());
                            ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            }
                        })
                        .collect();
                    builder.tool_calls(tc_openai);
                }
                let m = builder
                    .build()
                    .map_err(|e| AgentError::Provider(e.to_string()))?;
                result.push(ChatCompletionRequestMessage::Assistant(m));
            }
            Role::Tool => {
                let call_id = turn.tool_call_id.as_deref().unwrap_or("");
                if !announced.contains(call_id) {
                    debug!(call_id, "Dropping tool turn without its assistant call");
                    continue;
                }
                let m = ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id)
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| AgentError::Provider(e.to_string()))?;
                result.push(ChatCompletionRequestMessage::Tool(m));
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolInvocation;
    use serde_json::json;
    use std::time::Duration;

    fn tool_turn(call: &ToolCall, result: &str) -> Turn {
        Turn::tool_result(&ToolInvocation {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: json!({}),
            result: result.into(),
            success: true,
            latency: Duration::ZERO,
        })
    }

    #[test]
    fn test_messages_start_with_system_prompt() {
        let turns = vec![Turn::user("Bonjour!")];
        let messages = to_openai_messages("Be friendly.", &turns).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_orphaned_tool_turns_are_dropped() {
        let old_call = ToolCall::new("search_flights", json!({}));
        let new_call = ToolCall::new("search_hotels", json!({}));
        // The window starts after the assistant turn that requested `old_call`.
        let turns = vec![
            tool_turn(&old_call, "flights"),
            Turn::user("and hotels?"),
            Turn::assistant_with_tool_calls("", vec![new_call.clone()]),
            tool_turn(&new_call, "hotels"),
        ];

        let messages = to_openai_messages("", &turns).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::Assistant(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_tool_schemas_convert() {
        let schemas = vec![ToolSchema {
            name: "get_airport_code".into(),
            description: "Find an airport".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let tools = to_openai_tools(&schemas).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "get_airport_code");
    }

    #[test]
    fn test_invalid_argument_is_permanent() {
        let err = classify_error(OpenAIError::InvalidArgument("bad".into()));
        assert!(matches!(err, RequestError::Permanent(_)));
        let err = classify_error(OpenAIError::StreamError("reset".into()));
        assert!(matches!(err, RequestError::Transient(_)));
    }

    #[test]
    fn test_backend_from_default_config() {
        let mut config = ProviderConfig::default();
        config.failover.push(crate::config::FailoverEndpoint {
            api_base: "http://localhost:11434/v1".into(),
            model: Some("llama3".into()),
            api_key: None,
            api_key_env: None,
        });
        let backend = OpenAiBackend::from_config(&config).unwrap();
        assert_eq!(backend.provider(), "claude");
        assert_eq!(backend.endpoints.len(), 2);
        assert_eq!(backend.endpoints[1].model, "llama3");
        assert_eq!(backend.candidates().len(), 2);

        backend.endpoints[0]
            .consecutive_failures
            .store(MAX_CONSECUTIVE_FAILURES, Ordering::Relaxed);
        let candidates = backend.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].label, "failover-1");
    }

    #[test]
    fn test_usage_cache_hit() {
        assert!(!Usage::new(100, 10).cache_hit());
        let usage = Usage {
            cached_tokens: 80,
            ..Usage::new(100, 10)
        };
        assert!(usage.cache_hit());
    }
}
