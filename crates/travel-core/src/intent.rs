//! Intent classification: a model-backed classifier with a keyword fallback.

use crate::backend::{ModelBackend, ModelReply, ModelRequest};
use crate::config::IntentConfig;
use crate::error::{AgentError, Result};
use crate::telemetry::{TelemetryEventType, TelemetrySink};
use crate::types::{Role, Turn};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

const CLASSIFIER_INSTRUCTIONS: &str = "You classify the latest message of a conversation with a travel assistant. \
Answer with exactly one label and nothing else:\n\
small_talk: greetings, thanks, farewells, chit-chat with no travel request\n\
confirmation: the user approves a plan already discussed and asks you to proceed (\"do it\", \"go\", \"fais-le\")\n\
planning: anything about trips, destinations, dates, budgets, flights, hotels or activities";

/// What the user is trying to do with one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SmallTalk,
    Confirmation,
    Planning,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmallTalk => "small_talk",
            Self::Confirmation => "confirmation",
            Self::Planning => "planning",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "small_talk" => Ok(Self::SmallTalk),
            "confirmation" => Ok(Self::Confirmation),
            "planning" => Ok(Self::Planning),
            other => Err(AgentError::Classification(format!(
                "not an intent label: {other:?}"
            ))),
        }
    }
}

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Label `utterance` given the turns that precede it.
    async fn classify(&self, utterance: &str, recent: &[Turn]) -> Result<Intent>;
}

/// Deterministic classifier over configurable regex tables.
pub struct KeywordClassifier {
    small_talk: Vec<Regex>,
    confirmation: Vec<Regex>,
    planning: Vec<Regex>,
    small_talk_max_chars: usize,
    confirmation_max_chars: usize,
}

impl KeywordClassifier {
    pub fn from_config(config: &IntentConfig) -> Self {
        Self {
            small_talk: compile(&config.small_talk_patterns),
            confirmation: compile(&config.confirmation_patterns),
            planning: compile(&config.planning_patterns),
            small_talk_max_chars: config.small_talk_max_chars,
            confirmation_max_chars: config.confirmation_max_chars,
        }
    }

    /// Always produces a label.
    ///
    /// Short greetings are small talk. Short approvals are confirmations
    /// unless they also carry planning content ("go to Tokyo"). Everything
    /// else is planning.
    pub fn label(&self, utterance: &str) -> Intent {
        let text = utterance.trim();
        let chars = text.chars().count();
        let plans = any_match(&self.planning, text);

        if chars <= self.small_talk_max_chars && !plans && any_match(&self.small_talk, text) {
            return Intent::SmallTalk;
        }
        if chars <= self.confirmation_max_chars && !plans && any_match(&self.confirmation, text) {
            return Intent::Confirmation;
        }
        Intent::Planning
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::from_config(&IntentConfig::default())
    }
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, utterance: &str, _recent: &[Turn]) -> Result<Intent> {
        Ok(self.label(utterance))
    }
}

/// Asks the model for a single label.
pub struct ModelClassifier {
    backend: Arc<dyn ModelBackend>,
}

impl ModelClassifier {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl IntentClassifier for ModelClassifier {
    async fn classify(&self, utterance: &str, recent: &[Turn]) -> Result<Intent> {
        let mut prompt = String::new();
        let context: Vec<&Turn> = recent
            .iter()
            .filter(|t| t.role != Role::Tool && !t.content.is_empty())
            .collect();
        if !context.is_empty() {
            prompt.push_str("Recent conversation:\n");
            for turn in context {
                let who = if turn.role == Role::User { "user" } else { "assistant" };
                prompt.push_str(&format!("{who}: {}\n", turn.content));
            }
            prompt.push('\n');
        }
        prompt.push_str("Latest message: ");
        prompt.push_str(utterance);

        let request = ModelRequest::completion(CLASSIFIER_INSTRUCTIONS, vec![Turn::user(prompt)]);
        let response = self.backend.invoke(request).await?;
        match response.reply {
            ModelReply::Text(text) => text.trim().to_lowercase().parse(),
            ModelReply::ToolCalls { .. } => Err(AgentError::Classification(
                "classifier answered with tool calls".into(),
            )),
        }
    }
}

/// Outcome of [`IntentResolver::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    /// True when the keyword classifier produced the label.
    pub fallback: bool,
}

/// Runs the primary classifier and falls back to keywords on any failure.
pub struct IntentResolver {
    primary: Option<Arc<dyn IntentClassifier>>,
    fallback: KeywordClassifier,
    context_turns: usize,
    telemetry: Arc<dyn TelemetrySink>,
}

impl IntentResolver {
    pub fn new(
        primary: Option<Arc<dyn IntentClassifier>>,
        fallback: KeywordClassifier,
        context_turns: usize,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            primary,
            fallback,
            context_turns,
            telemetry,
        }
    }

    /// Build from config: the model classifier is used when `use_model` is set.
    pub fn from_config(
        config: &IntentConfig,
        backend: Arc<dyn ModelBackend>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        let primary: Option<Arc<dyn IntentClassifier>> = if config.use_model {
            Some(Arc::new(ModelClassifier::new(backend)))
        } else {
            None
        };
        Self::new(
            primary,
            KeywordClassifier::from_config(config),
            config.context_turns,
            telemetry,
        )
    }

    /// Never fails.
    pub async fn resolve(&self, utterance: &str, history: &[Turn]) -> Classification {
        let start = history.len().saturating_sub(self.context_turns);
        let recent = &history[start..];

        let classification = match &self.primary {
            Some(primary) => match primary.classify(utterance, recent).await {
                Ok(intent) => Classification {
                    intent,
                    fallback: false,
                },
                Err(e) => {
                    warn!("Intent classification failed, using keywords: {}", e);
                    self.keyword(utterance)
                }
            },
            None => self.keyword(utterance),
        };

        debug!(
            intent = classification.intent.as_str(),
            fallback = classification.fallback,
            "Intent classified"
        );
        self.telemetry.emit_event(
            TelemetryEventType::IntentClassified,
            serde_json::json!({
                "intent": classification.intent.as_str(),
                "fallback": classification.fallback,
            }),
        );
        classification
    }

    fn keyword(&self, utterance: &str) -> Classification {
        Classification {
            intent: self.fallback.label(utterance),
            fallback: true,
        }
    }
}

/// Compile patterns, skipping any that are invalid.
pub(crate) fn compile(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Ignoring invalid pattern {:?}: {}", p, e);
                None
            }
        })
        .collect()
}

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}
