use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level application configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub intent: IntentConfig,
    pub confirmation: ConfirmationConfig,
    pub pricing: PricingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from default path (~/.config/travel-agent/config.toml),
    /// falling back to defaults if the file doesn't exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Write current configuration to the default path.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Write current configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("travel-agent")
            .join("config.toml")
    }

    /// Data directory for REPL history and similar state.
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("travel-agent")
    }
}

/// LLM provider configuration. Any OpenAI-compatible chat endpoint works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider name, also the key into `[pricing.providers]`.
    pub name: String,
    /// Base URL for the OpenAI-compatible API.
    pub api_base: String,
    /// Model name.
    pub model: String,
    /// Optional API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Failover endpoints, tried in order if the primary fails transiently.
    pub failover: Vec<FailoverEndpoint>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "claude".into(),
            api_base: "https://api.anthropic.com/v1".into(),
            model: "claude-sonnet-4-20250514".into(),
            api_key: None,
            api_key_env: Some("ANTHROPIC_API_KEY".into()),
            max_tokens: 3072,
            temperature: 0.3,
            failover: Vec::new(),
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key from the config value or the named environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, &self.api_key_env)
    }
}

/// A failover endpoint for provider rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEndpoint {
    pub api_base: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
}

impl FailoverEndpoint {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, &self.api_key_env)
    }
}

fn resolve_key(key: &Option<String>, env: &Option<String>) -> Option<String> {
    key.clone()
        .or_else(|| env.as_ref().and_then(|var| std::env::var(var).ok()))
}

/// Agent loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Restrict planning turns to the essential tool subset.
    pub fast_mode: bool,
    /// Iteration budget for the fast variant.
    pub fast_max_iterations: usize,
    /// Iteration budget for the full and light variants.
    pub full_max_iterations: usize,
    /// Number of trailing turns sent to the model.
    pub history_window: usize,
    /// Turns kept in a session's history; older ones are forgotten. 0 keeps all.
    pub max_stored_turns: usize,
    /// Returned when even the forced final answer comes back empty.
    pub fallback_message: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            fast_mode: false,
            fast_max_iterations: 5,
            full_max_iterations: 8,
            history_window: 24,
            max_stored_turns: 200,
            fallback_message: "Sorry, I couldn't put together an answer this time. \
                               Could you rephrase your request or tell me a bit more about your trip?"
                .into(),
        }
    }
}

/// Intent classification settings and the keyword fallback's pattern tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// Ask the model first; when false only the keyword classifier runs.
    pub use_model: bool,
    /// Number of recent turns given to the model classifier as context.
    pub context_turns: usize,
    pub small_talk_patterns: Vec<String>,
    pub confirmation_patterns: Vec<String>,
    pub planning_patterns: Vec<String>,
    /// Small talk only applies to utterances up to this many characters.
    pub small_talk_max_chars: usize,
    /// Confirmation only applies to utterances up to this many characters.
    pub confirmation_max_chars: usize,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            use_model: true,
            context_turns: 4,
            small_talk_patterns: strings(&[
                r"(?i)\b(bonjour|bonsoir|salut|hello|hi|hey|good (morning|afternoon|evening))\b",
                r"(?i)\b(merci|thanks?|thank you|cheers)\b",
                r"(?i)\b(au revoir|goodbye|bye|see you|à bientôt|a bientot)\b",
                r"(?i)\b(how are you|comment vas-tu|comment allez-vous|ça va|ca va)\b",
            ]),
            confirmation_patterns: strings(&[
                r"(?i)\b(fais[- ]le|faites[- ]le|vas-y|allez-y|lance[sz]?|c'est bon|on y va)\b",
                r"(?i)\b(do it|go|go ahead|go for it|let'?s go|launch|proceed|ok(ay)?|yes|oui)\b",
            ]),
            planning_patterns: strings(&[
                r"(?i)\b(voyage|trip|travel|vacances|vacation|holiday|itinerary|itinéraire|séjour)\b",
                r"(?i)\b(flights?|vols?|hotels?|hôtels?|budget|visit|visiter|go to|aller à|fly)\b",
                r"(?i)\b(january|february|march|april|june|july|august|september|october|november|december)\b",
                r"(?i)\b(janvier|février|mars|avril|mai|juin|juillet|août|septembre|octobre|novembre|décembre)\b",
                r"(?i)\d+\s*(€|\$|eur|euros|usd|dollars)",
            ]),
            small_talk_max_chars: 50,
            confirmation_max_chars: 30,
        }
    }
}

/// Trip-parameter extraction tables used when the user confirms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Number of trailing turns scanned for parameters.
    pub scan_window: usize,
    /// Known destination names, matched case-insensitively.
    pub destinations: Vec<String>,
    /// Destinations that are also ordinary words ("nice"). These only match
    /// when written with a capital letter.
    pub common_word_destinations: Vec<String>,
    /// Fallback destination patterns; capture group 1 is the destination.
    pub destination_patterns: Vec<String>,
    /// Capitalised words that the destination patterns must not return.
    pub non_destinations: Vec<String>,
    /// Date expressions, tried in order. Group 1 is kept when the pattern has
    /// one, the whole match otherwise.
    pub date_patterns: Vec<String>,
    /// Budget expressions; group 1 is the amount, optional group 2 a `k` multiplier.
    pub budget_patterns: Vec<String>,
    /// Interest keywords, matched as whole words.
    pub interest_keywords: Vec<String>,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            scan_window: 10,
            destinations: strings(&[
                "Paris", "Nice", "Lyon", "Marseille", "Tokyo", "Osaka", "Kyoto", "New York",
                "London", "Londres", "Rome", "Barcelona", "Barcelone", "Madrid", "Lisbon",
                "Lisbonne", "Amsterdam", "Berlin", "Rio de Janeiro", "Rio", "Havana",
                "La Havane", "Marrakech", "Cairo", "Le Caire", "Istanbul", "Dubai", "Bangkok",
                "Singapore", "Singapour", "Hong Kong", "Sydney", "Montreal", "Montréal",
                "Mumbai", "Delhi", "Shanghai",
            ]),
            common_word_destinations: strings(&["Nice"]),
            destination_patterns: strings(&[
                r"\b(?:to|in|visit|visiting|à|en|vers|pour|visiter)\s+(\p{Lu}[\p{L}'-]+(?:[ -](?:de |do |del |la )?\p{Lu}[\p{L}'-]+)*)",
            ]),
            non_destinations: strings(&[
                "January", "February", "March", "April", "May", "June", "July", "August",
                "September", "October", "November", "December", "Janvier", "Février", "Mars",
                "Avril", "Mai", "Juin", "Juillet", "Août", "Septembre", "Octobre", "Novembre",
                "Décembre", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
                "Sunday",
            ]),
            date_patterns: strings(&[
                r"\b\d{4}-\d{2}-\d{2}\b",
                r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b",
                r"(?i)\b(?:\d{1,2}(?:er)?\s+)?(?:january|february|march|april|june|july|august|september|october|november|december|janvier|février|fevrier|mars|avril|mai|juin|juillet|août|aout|septembre|octobre|novembre|décembre|decembre)(?:\s+\d{4})?\b",
                r"\b(\d{1,2}\s+May(?:\s+\d{4})?|May\s+(?:\d{1,2}(?:st|nd|rd|th)?(?:,?\s+\d{4})?|\d{4}))\b",
                r"\b(?:in|during|from|until|by|early|mid|late)\s+(May)\b",
                r"(?i)\b(?:next|this)\s+(?:week|weekend|month|summer|winter|spring|autumn|fall)\b",
                r"(?i)\b(?:la semaine prochaine|le mois prochain|cet été|cet hiver|ce printemps|cet automne)\b",
                r"(?i)\b\d{1,2}\s+(?:days?|jours?|nights?|nuits?)\b",
            ]),
            budget_patterns: strings(&[
                r"(?i)(\b\d{1,3}(?:[ ,.]\d{3})+|\b\d+)\s*(k)?\s*(?:€|\$|eur\b|euros?\b|usd\b|dollars?\b)",
                r"(?i)(?:€|\$)\s*(\b\d{1,3}(?:[ ,.]\d{3})+|\b\d+)\s*(k)?",
                r"(?i)budget\D{0,20}?(\b\d{1,3}(?:[ ,.]\d{3})+|\b\d+)\s*(k)?",
            ]),
            interest_keywords: strings(&[
                "museums", "museum", "musées", "art", "food", "gastronomy", "gastronomie",
                "cuisine", "beach", "beaches", "plage", "hiking", "randonnée", "nightlife",
                "culture", "history", "histoire", "shopping", "nature", "temples",
                "architecture",
            ]),
        }
    }
}

/// Per-provider token pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Multiplier applied to the prompt rate on a cache hit.
    pub cache_discount: f64,
    pub providers: HashMap<String, ProviderPricing>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let providers = [
            ("claude", ProviderPricing::per_million(3.00, 15.00)),
            ("gemini", ProviderPricing::per_million(0.075, 0.30)),
            ("local", ProviderPricing::per_million(0.0, 0.0)),
        ]
        .into_iter()
        .map(|(name, pricing)| (name.to_string(), pricing))
        .collect();
        Self {
            cache_discount: 0.1,
            providers,
        }
    }
}

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProviderPricing {
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

impl ProviderPricing {
    pub fn per_million(prompt: f64, completion: f64) -> Self {
        Self {
            prompt_per_million: prompt,
            completion_per_million: completion,
        }
    }

    pub fn is_free(&self) -> bool {
        self.prompt_per_million == 0.0 && self.completion_per_million == 0.0
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Mirror every telemetry event and metric to `tracing`.
    pub log_events: bool,
    /// Capacity of the telemetry broadcast channel.
    pub bus_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_events: true,
            bus_capacity: 1024,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
