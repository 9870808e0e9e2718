//! The per-turn pipeline: classify, select a prompt, resolve confirmations,
//! run the loop.

use crate::agent_loop::{AgentLoop, LoopOutcome};
use crate::backend::ModelBackend;
use crate::config::AppConfig;
use crate::confirmation::{ConfirmationResolver, ExtractedTripParameters};
use crate::cost::CostEstimator;
use crate::error::AgentError;
use crate::intent::{Intent, IntentResolver};
use crate::prompts::{self, PromptVariant};
use crate::session::Session;
use crate::telemetry::{TelemetryEventType, TelemetrySink};
use crate::tool_registry::ToolRegistry;
use crate::types::{ToolInvocation, Turn};

use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the caller needs to render one answered turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub intent: Intent,
    /// True when the keyword classifier picked the intent.
    pub intent_fallback: bool,
    pub variant: PromptVariant,
    pub iterations: usize,
    pub tool_invocations: Vec<ToolInvocation>,
    pub exhausted: bool,
    /// Parameters injected for a confirmation turn.
    pub parameters: Option<ExtractedTripParameters>,
    /// Estimated USD for this turn.
    pub turn_cost: f64,
    /// Session total after this turn.
    pub total_cost: f64,
}

/// Travel assistant wired to one backend, tool set and telemetry sink.
pub struct TravelAgent {
    resolver: IntentResolver,
    confirmation: ConfirmationResolver,
    agent_loop: AgentLoop,
    telemetry: Arc<dyn TelemetrySink>,
    provider: String,
    default_fast_mode: bool,
    max_stored_turns: usize,
}

impl TravelAgent {
    pub fn new(
        config: &AppConfig,
        backend: Arc<dyn ModelBackend>,
        tools: Arc<ToolRegistry>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let provider = backend.provider().to_string();
        let resolver = IntentResolver::from_config(&config.intent, backend.clone(), telemetry.clone());
        let agent_loop = AgentLoop::new(
            backend,
            tools,
            telemetry.clone(),
            CostEstimator::from_config(&config.pricing),
            config.agent.clone(),
        );
        Self {
            resolver,
            confirmation: ConfirmationResolver::from_config(&config.confirmation),
            agent_loop,
            telemetry,
            provider,
            default_fast_mode: config.agent.fast_mode,
            max_stored_turns: config.agent.max_stored_turns,
        }
    }

    /// A fresh session using this agent's provider and default mode.
    pub fn new_session(&self, name: impl Into<String>) -> Session {
        Session::new(name, self.provider.as_str(), self.default_fast_mode)
            .with_history_limit(self.max_stored_turns)
    }

    pub fn tools(&self) -> &ToolRegistry {
        self.agent_loop.tools()
    }

    /// Answer one user message.
    pub async fn chat(
        &self,
        session: &mut Session,
        input: &str,
        cancel: &CancellationToken,
    ) -> Result<ChatReply, AgentError> {
        let classification = self.resolver.resolve(input, session.history.turns()).await;
        let intent = classification.intent;
        let variant = prompts::select(intent, session.fast_mode);
        self.telemetry.emit_event(
            TelemetryEventType::PromptSelected,
            json!({
                "intent": intent.as_str(),
                "variant": variant.as_str(),
                "fast_mode": session.fast_mode,
            }),
        );

        let parameters = if intent == Intent::Confirmation {
            // The confirming input is the newest of the scanned turns.
            let mut recent = session
                .history
                .window(self.confirmation.scan_window().saturating_sub(1))
                .to_vec();
            recent.push(Turn::user(input));
            let params = self.confirmation.resolve(&recent);
            self.telemetry.emit_event(
                TelemetryEventType::ConfirmationResolved,
                json!({
                    "destination": params.destination,
                    "dates": params.dates,
                    "budget": params.budget,
                    "interests": params.interests,
                    "missing": params.missing(),
                }),
            );
            Some(params)
        } else {
            None
        };
        let directive = parameters.as_ref().map(|p| p.directive());

        let LoopOutcome {
            response,
            iterations,
            tool_invocations,
            exhausted,
            cost,
        } = self
            .agent_loop
            .run(session, input, intent, variant, directive.as_deref(), cancel)
            .await?;

        Ok(ChatReply {
            text: response,
            intent,
            intent_fallback: classification.fallback,
            variant,
            iterations,
            tool_invocations,
            exhausted,
            parameters,
            turn_cost: cost,
            total_cost: session.total_estimated_cost(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ModelResponse, Usage};
    use crate::prompts::FULL_TOOLS;
    use crate::telemetry::{EventBus, NoopSink};
    use crate::test_support::{ScriptedBackend, StubTool};
    use crate::types::{Role, ToolCall};

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for name in FULL_TOOLS {
            registry.register(Arc::new(StubTool::new(name))).unwrap();
        }
        Arc::new(registry)
    }

    fn agent(backend: Arc<ScriptedBackend>) -> TravelAgent {
        TravelAgent::new(&AppConfig::default(), backend, registry(), Arc::new(NoopSink))
    }

    #[tokio::test]
    async fn test_bonjour_is_answered_lightly() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("small_talk")),
            Ok(ModelResponse::text("Bonjour ! Comment puis-je vous aider ?")),
        ]));
        let agent = agent(backend.clone());
        let mut session = agent.new_session("default");

        let reply = agent
            .chat(&mut session, "Bonjour!", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.intent, Intent::SmallTalk);
        assert_eq!(reply.variant, PromptVariant::Light);
        assert!(reply.tool_invocations.is_empty());
        assert!(!reply.text.is_empty());
        let requests = backend.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].tools.is_empty());
    }

    #[tokio::test]
    async fn test_bonjour_with_broken_classifier_still_light() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("I think this is a greeting")),
            Ok(ModelResponse::text("Bonjour !")),
        ]));
        let agent = agent(backend);
        let mut session = agent.new_session("default");
        let reply = agent
            .chat(&mut session, "Bonjour!", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.intent, Intent::SmallTalk);
        assert!(reply.intent_fallback);
        assert_eq!(reply.variant, PromptVariant::Light);
    }

    #[tokio::test]
    async fn test_fais_le_launches_tools_with_extracted_parameters() {
        let first_batch = vec![
            ToolCall::new("get_airport_code", json!({"city_name": "Tokyo"})),
            ToolCall::new("search_flights", json!({"destination": "Tokyo", "month": "April"})),
            ToolCall::new("search_hotels", json!({"city": "Tokyo"})),
        ];
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("confirmation")),
            Ok(ModelResponse::tool_calls(first_batch)),
            Ok(ModelResponse::text("Voici votre voyage à Tokyo en avril.")),
        ]));
        let agent = agent(backend.clone());
        let mut session = agent.new_session("default");
        session.push_turn(Turn::user("I want to go to Tokyo in April with a budget of 2000€"));
        session.push_turn(Turn::assistant("Shall I search flights and hotels?"));

        let reply = agent
            .chat(&mut session, "fais le", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.intent, Intent::Confirmation);
        assert_eq!(reply.variant, PromptVariant::Full);
        assert!(reply.iterations <= 3);
        let params = reply.parameters.unwrap();
        assert_eq!(params.destination.as_deref(), Some("Tokyo"));
        assert_eq!(params.dates.as_deref(), Some("April"));
        assert_eq!(params.budget, Some(2000));

        let names: Vec<_> = reply.tool_invocations.iter().map(|i| i.tool_name.as_str()).collect();
        assert_eq!(names, vec!["get_airport_code", "search_flights", "search_hotels"]);

        let loop_request = &backend.requests()[1];
        assert!(loop_request.system_prompt.contains("- destination: Tokyo"));
        assert!(loop_request.system_prompt.contains("- budget: 2000"));
        assert_eq!(loop_request.tools.len(), 12);
        // The directive never becomes a turn.
        assert!(session.history.turns().iter().all(|t| !t.content.contains("Known trip parameters")));
    }

    async fn confirm_with_scan_window(scan_window: usize) -> ExtractedTripParameters {
        let mut config = AppConfig::default();
        config.confirmation.scan_window = scan_window;
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("confirmation")),
            Ok(ModelResponse::text("On it.")),
        ]));
        let agent = TravelAgent::new(&config, backend, registry(), Arc::new(NoopSink));
        let mut session = agent.new_session("default");
        session.push_turn(Turn::user("Tokyo in April, 2000€"));
        session.push_turn(Turn::assistant("Shall I search?"));
        session.push_turn(Turn::user("sounds great"));

        agent
            .chat(&mut session, "go", &CancellationToken::new())
            .await
            .unwrap()
            .parameters
            .unwrap()
    }

    #[tokio::test]
    async fn test_scan_window_counts_the_confirming_input() {
        // Three stored turns plus "go" fit exactly in a window of four.
        let params = confirm_with_scan_window(4).await;
        assert_eq!(params.destination.as_deref(), Some("Tokyo"));
        assert_eq!(params.budget, Some(2000));

        let params = confirm_with_scan_window(3).await;
        assert_eq!(params.destination, None);
        assert_eq!(params.budget, None);
    }

    #[tokio::test]
    async fn test_fast_mode_selects_fast_variant() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("planning")),
            Ok(ModelResponse::text("Flights from 450€.")),
        ]));
        let agent = agent(backend.clone());
        let mut session = agent.new_session("default");
        session.set_fast_mode(true);

        let reply = agent
            .chat(&mut session, "cheap flights to Rome", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.variant, PromptVariant::Fast);
        assert_eq!(backend.requests()[1].tools.len(), 5);
    }

    #[tokio::test]
    async fn test_costs_accumulate_across_turns() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("planning")),
            Ok(ModelResponse::text("one").with_usage(Usage::new(10_000, 1_000))),
            Ok(ModelResponse::text("planning")),
            Ok(ModelResponse::text("two").with_usage(Usage::new(10_000, 1_000))),
        ]));
        let agent = agent(backend);
        let mut session = agent.new_session("default");
        let cancel = CancellationToken::new();

        let first = agent.chat(&mut session, "Paris?", &cancel).await.unwrap();
        let second = agent.chat(&mut session, "Rome?", &cancel).await.unwrap();

        let per_turn = 10_000.0 * 3.0 / 1e6 + 1_000.0 * 15.0 / 1e6;
        assert!((first.turn_cost - per_turn).abs() < 1e-12);
        assert!((second.total_cost - 2.0 * per_turn).abs() < 1e-12);
        assert!(second.total_cost >= first.total_cost);
        assert_eq!(session.history.len(), 4);
        assert_eq!(session.history.turns()[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_confirmation_event_is_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_filtered(vec![TelemetryEventType::ConfirmationResolved]);
        let backend = Arc::new(ScriptedBackend::new(vec![
            Ok(ModelResponse::text("confirmation")),
            Ok(ModelResponse::text("Which destination?")),
        ]));
        let agent = TravelAgent::new(&AppConfig::default(), backend, registry(), Arc::new(bus.clone()));
        let mut session = agent.new_session("default");

        agent
            .chat(&mut session, "go", &CancellationToken::new())
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert!(event.attributes["destination"].is_null());
        assert_eq!(event.attributes["missing"][0], "destination");
    }
}
