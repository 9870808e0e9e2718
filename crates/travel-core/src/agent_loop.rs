use crate::backend::{ModelBackend, ModelReply, ModelRequest};
use crate::config::AgentConfig;
use crate::cost::CostEstimator;
use crate::error::AgentError;
use crate::intent::Intent;
use crate::prompts::PromptVariant;
use crate::session::Session;
use crate::telemetry::{metrics, TelemetryEventType, TelemetrySink};
use crate::tool_registry::ToolRegistry;
use crate::types::{ToolCall, ToolInvocation, Turn};

use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const FORCED_ANSWER_INSTRUCTIONS: &str = "You have reached the limit of tool calls for this request. \
Do not call any tool. Answer the user now with the information gathered so far, \
and say briefly what is still missing if anything is.";

/// Where the loop currently is.
#[derive(Debug)]
enum LoopState {
    Start,
    Invoking,
    ToolDispatch { content: String, calls: Vec<ToolCall> },
    /// Budget spent or no usable answer: one last call without tools.
    Exhausted,
    Done(String),
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Final assistant text; never empty.
    pub response: String,
    /// Model invocations made with tools offered.
    pub iterations: usize,
    pub tool_invocations: Vec<ToolInvocation>,
    /// True when the forced final answer was needed.
    pub exhausted: bool,
    /// Estimated USD spent during this run.
    pub cost: f64,
}

/// Per-run labels attached to telemetry.
struct RunLabels {
    intent: Intent,
    variant: PromptVariant,
}

impl RunLabels {
    fn with(&self, extra: Value) -> Value {
        let mut attrs = json!({
            "intent": self.intent.as_str(),
            "variant": self.variant.as_str(),
        });
        if let (Some(base), Value::Object(extra)) = (attrs.as_object_mut(), extra) {
            base.extend(extra);
        }
        attrs
    }
}

/// The bounded tool-calling loop.
pub struct AgentLoop {
    backend: Arc<dyn ModelBackend>,
    tools: Arc<ToolRegistry>,
    telemetry: Arc<dyn TelemetrySink>,
    estimator: CostEstimator,
    config: AgentConfig,
}

impl AgentLoop {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        tools: Arc<ToolRegistry>,
        telemetry: Arc<dyn TelemetrySink>,
        estimator: CostEstimator,
        config: AgentConfig,
    ) -> Self {
        Self {
            backend,
            tools,
            telemetry,
            estimator,
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one user turn to completion.
    ///
    /// Appends the user turn, every tool batch, and the final assistant turn
    /// to the session. A `directive` is appended to the variant's system
    /// prompt for this run only.
    pub async fn run(
        &self,
        session: &mut Session,
        input: &str,
        intent: Intent,
        variant: PromptVariant,
        directive: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<LoopOutcome, AgentError> {
        let started = Instant::now();
        let labels = RunLabels { intent, variant };
        let budget = variant.iteration_budget(&self.config);
        let system_prompt = match directive {
            Some(d) => format!("{}\n\n{}", variant.instructions(), d),
            None => variant.instructions().to_string(),
        };
        let schemas = self.tools.schemas_for(variant);

        let mut iterations = 0;
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut cost = 0.0;
        let mut exhausted = false;
        let mut state = LoopState::Start;

        loop {
            state = match state {
                LoopState::Start => {
                    session.push_turn(Turn::user(input));
                    LoopState::Invoking
                }

                LoopState::Invoking => {
                    if iterations >= budget {
                        warn!("Hit max iterations ({}), forcing a final answer", budget);
                        LoopState::Exhausted
                    } else {
                        iterations += 1;
                        debug!("Agent loop iteration {}", iterations);
                        let request = ModelRequest::completion(
                            system_prompt.clone(),
                            session.history.window(self.config.history_window).to_vec(),
                        )
                        .with_tools(schemas.clone());
                        match self.invoke(session, request, &labels, cancel).await {
                            Ok((reply, usd)) => {
                                cost += usd;
                                match reply {
                                    ModelReply::Text(text) if !text.trim().is_empty() => {
                                        LoopState::Done(text)
                                    }
                                    ModelReply::Text(_) => {
                                        warn!("Model returned an empty answer");
                                        LoopState::Exhausted
                                    }
                                    ModelReply::ToolCalls { content, calls } => {
                                        LoopState::ToolDispatch { content, calls }
                                    }
                                }
                            }
                            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                            Err(e) => {
                                warn!("Model invocation failed: {}", e);
                                self.report_error(&labels, "invoke", &e);
                                LoopState::Exhausted
                            }
                        }
                    }
                }

                LoopState::ToolDispatch { content, calls } => {
                    debug!(count = calls.len(), "Dispatching tool batch");
                    let batch = join_all(calls.iter().map(|c| self.tools.execute(variant, c)));
                    let results = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                        results = batch => results,
                    };
                    if cancel.is_cancelled() {
                        info!("Cancelled during tool batch, discarding results");
                        return Err(AgentError::Cancelled);
                    }

                    session.push_turn(Turn::assistant_with_tool_calls(content, calls));
                    for invocation in &results {
                        let latency_ms = invocation.latency.as_secs_f64() * 1000.0;
                        let attrs = labels.with(json!({
                            "tool": invocation.tool_name,
                            "latency_ms": latency_ms,
                            "success": invocation.success,
                        }));
                        self.telemetry.record_metric(metrics::TOOL_CALLS, 1.0, attrs.clone());
                        self.telemetry
                            .record_metric(metrics::TOOL_LATENCY_MS, latency_ms, attrs.clone());
                        self.telemetry
                            .emit_event(TelemetryEventType::ToolCompleted, attrs);
                        session.push_turn(Turn::tool_result(invocation));
                    }

                    self.telemetry.emit_event(
                        TelemetryEventType::IterationCompleted,
                        labels.with(json!({
                            "iteration": iterations,
                            "tool_calls": results.len(),
                        })),
                    );
                    invocations.extend(results);
                    LoopState::Invoking
                }

                LoopState::Exhausted => {
                    exhausted = true;
                    self.telemetry.emit_event(
                        TelemetryEventType::LoopExhausted,
                        labels.with(json!({ "iterations": iterations, "budget": budget })),
                    );
                    let request = ModelRequest::completion(
                        format!("{system_prompt}\n\n{FORCED_ANSWER_INSTRUCTIONS}"),
                        session.history.window(self.config.history_window).to_vec(),
                    );
                    match self.invoke(session, request, &labels, cancel).await {
                        Ok((ModelReply::Text(text), usd)) if !text.trim().is_empty() => {
                            cost += usd;
                            LoopState::Done(text)
                        }
                        Ok((_, usd)) => {
                            cost += usd;
                            warn!("Forced answer was unusable, using the fallback message");
                            LoopState::Done(self.config.fallback_message.clone())
                        }
                        Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                        Err(e) => {
                            self.report_error(&labels, "forced_answer", &e);
                            return Err(match e {
                                AgentError::Provider(_) => e,
                                other => AgentError::Provider(other.to_string()),
                            });
                        }
                    }
                }

                LoopState::Done(response) => {
                    session.push_turn(Turn::assistant(response.as_str()));
                    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                    self.telemetry
                        .record_metric(metrics::ITERATIONS, iterations as f64, labels.with(json!({})));
                    self.telemetry
                        .record_metric(metrics::LOOP_LATENCY_MS, elapsed_ms, labels.with(json!({})));
                    self.telemetry.emit_event(
                        TelemetryEventType::LoopCompleted,
                        labels.with(json!({
                            "iterations": iterations,
                            "tool_calls": invocations.len(),
                            "latency_ms": elapsed_ms,
                            "exhausted": exhausted,
                            "cost_usd": cost,
                        })),
                    );
                    info!(
                        iterations,
                        tools = invocations.len(),
                        exhausted,
                        "Turn completed in {:.0} ms",
                        elapsed_ms
                    );
                    return Ok(LoopOutcome {
                        response,
                        iterations,
                        tool_invocations: invocations,
                        exhausted,
                        cost,
                    });
                }
            };
        }
    }

    /// One model call: honours cancellation, records latency and cost.
    async fn invoke(
        &self,
        session: &Session,
        request: ModelRequest,
        labels: &RunLabels,
        cancel: &CancellationToken,
    ) -> Result<(ModelReply, f64), AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        let with_tools = !request.tools.is_empty();
        let started = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            response = self.backend.invoke(request) => response?,
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        let attrs = labels.with(json!({ "latency_ms": latency_ms, "tools": with_tools }));
        self.telemetry.record_metric(metrics::LLM_CALLS, 1.0, attrs.clone());
        self.telemetry.record_metric(metrics::LLM_LATENCY_MS, latency_ms, attrs);

        let mut usd = 0.0;
        if let Some(usage) = response.usage {
            let provider = self.backend.provider();
            usd = self.estimator.estimate(
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.cache_hit(),
                provider,
            );
            session
                .cost
                .record(usd, usage.prompt_tokens, usage.completion_tokens, usage.cache_hit());
            let attrs = labels.with(json!({
                "provider": provider,
                "usd": usd,
                "prompt_tokens": usage.prompt_tokens,
                "completion_tokens": usage.completion_tokens,
                "cache_hit": usage.cache_hit(),
                "total_usd": session.cost.total(),
            }));
            self.telemetry.record_metric(metrics::COST_USD, usd, attrs.clone());
            self.telemetry.emit_event(TelemetryEventType::CostRecorded, attrs);
        }
        Ok((response.reply, usd))
    }

    fn report_error(&self, labels: &RunLabels, stage: &str, error: &AgentError) {
        let attrs = labels.with(json!({ "stage": stage, "error": error.to_string() }));
        self.telemetry.record_metric(metrics::ERRORS, 1.0, attrs.clone());
        self.telemetry.emit_event(TelemetryEventType::Error, attrs);
    }
}
