//! Scripted backend and controllable tools for unit tests.

use crate::backend::{ModelBackend, ModelRequest, ModelResponse};
use crate::error::AgentError;
use crate::tool_registry::Tool;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Returns canned responses in order and records every request.
pub struct ScriptedBackend {
    provider: String,
    responses: Mutex<VecDeque<Result<ModelResponse, AgentError>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new(responses: Vec<Result<ModelResponse, AgentError>>) -> Self {
        Self::for_provider("claude", responses)
    }

    pub fn for_provider(provider: &str, responses: Vec<Result<ModelResponse, AgentError>>) -> Self {
        Self {
            provider: provider.to_string(),
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn invoke(&self, request: ModelRequest) -> Result<ModelResponse, AgentError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into())))
    }
}

/// Tool answering `"<name> ok"` after an optional delay, or failing.
pub struct StubTool {
    name: String,
    delay: Duration,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StubTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(name: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(name)
        }
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(name)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "test tool"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value) -> Result<String, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(AgentError::tool(&self.name, message.clone())),
            None => Ok(format!("{} ok", self.name)),
        }
    }
}
