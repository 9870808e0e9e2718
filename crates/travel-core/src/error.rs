use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Intent classification failed: {0}")]
    Classification(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool not allowed in this prompt variant: {0}")]
    ToolNotAllowed(String),

    #[error("Schema build error: {0}")]
    Schema(String),

    #[error("Cancelled by user")]
    Cancelled,
}

impl AgentError {
    /// Shorthand for a tool failure carrying the tool's name.
    pub fn tool(tool_name: &str, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
