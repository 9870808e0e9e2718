pub mod agent;
pub mod agent_loop;
pub mod backend;
pub mod config;
pub mod confirmation;
pub mod cost;
pub mod error;
pub mod intent;
pub mod prompts;
pub mod session;
pub mod telemetry;
pub mod tool_registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent::{ChatReply, TravelAgent};
pub use agent_loop::{AgentLoop, LoopOutcome};
pub use backend::{ModelBackend, ModelReply, ModelRequest, ModelResponse, OpenAiBackend, Usage};
pub use config::AppConfig;
pub use confirmation::{ConfirmationResolver, ExtractedTripParameters};
pub use cost::{CostEstimator, CostMeter, CostTotals};
pub use error::AgentError;
pub use intent::{Intent, IntentClassifier, IntentResolver, KeywordClassifier, ModelClassifier};
pub use prompts::PromptVariant;
pub use session::{ConversationStore, Session};
pub use telemetry::{EventBus, FanoutSink, NoopSink, TelemetryEvent, TelemetryEventType, TelemetrySink, TracingSink};
pub use tool_registry::{Tool, ToolRegistry};
