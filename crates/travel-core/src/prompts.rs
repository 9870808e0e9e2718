//! Prompt variants and their tool sets.

use crate::config::AgentConfig;
use crate::intent::Intent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tools offered in fast mode.
pub const FAST_TOOLS: &[&str] = &[
    "get_airport_code",
    "search_flights",
    "search_hotels",
    "calculate_total_cost",
    "recommend_best_package",
];

/// Every tool the agent knows about.
pub const FULL_TOOLS: &[&str] = &[
    "get_airport_code",
    "get_destination_context",
    "search_flights",
    "search_hotels",
    "search_vacation_rentals",
    "find_cultural_activities",
    "find_nearby_attractions",
    "recommend_restaurants",
    "create_visit_itinerary",
    "generate_travel_map",
    "calculate_total_cost",
    "recommend_best_package",
];

const LIGHT_INSTRUCTIONS: &str = "You are a warm, concise travel assistant. \
The user is making small talk. Answer briefly and naturally in the user's language, \
without listing options or running searches. If it fits, offer to help plan a trip.";

const FAST_INSTRUCTIONS: &str = "You are an efficient travel planning assistant working in fast mode.\n\
Goal: a solid trip proposal in as few steps as possible.\n\
- Resolve airport codes first, then search flights and hotels in the same step whenever the parameters allow it.\n\
- Call independent tools together in one batch instead of one at a time.\n\
- Finish with calculate_total_cost and recommend_best_package.\n\
- If destination, dates or budget are missing, ask for them instead of guessing.\n\
Answer in the user's language with a short, structured summary: flights, lodging, total cost, recommendation.";

const FULL_INSTRUCTIONS: &str = "You are an expert travel planning assistant.\n\
You help users plan complete trips: transport, lodging, culture, food and daily itineraries.\n\
- Start with get_airport_code and get_destination_context for the destination.\n\
- Search flights, hotels and vacation rentals in parallel once dates are known.\n\
- Enrich the plan with cultural activities, attractions and restaurants matching the user's interests.\n\
- Build a day-by-day itinerary and a map when the stay is longer than a day.\n\
- Always compute the total cost against the user's budget and recommend the best package.\n\
- Call independent tools together in one batch.\n\
- If destination, dates or budget are missing, ask for them instead of guessing.\n\
Answer in the user's language, structured with clear headings and prices.";

/// A fixed system prompt bound to a fixed tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptVariant {
    /// Small talk: no tools.
    Light,
    /// Essential tool subset.
    Fast,
    /// Complete catalogue.
    Full,
}

impl PromptVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Fast => "fast",
            Self::Full => "full",
        }
    }

    pub fn instructions(&self) -> &'static str {
        match self {
            Self::Light => LIGHT_INSTRUCTIONS,
            Self::Fast => FAST_INSTRUCTIONS,
            Self::Full => FULL_INSTRUCTIONS,
        }
    }

    /// Names of the tools the model may call under this variant.
    pub fn allowed_tools(&self) -> &'static [&'static str] {
        match self {
            Self::Light => &[],
            Self::Fast => FAST_TOOLS,
            Self::Full => FULL_TOOLS,
        }
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        self.allowed_tools().contains(&tool_name)
    }

    /// Maximum number of model invocations before the forced final answer.
    pub fn iteration_budget(&self, config: &AgentConfig) -> usize {
        match self {
            Self::Fast => config.fast_max_iterations,
            Self::Light | Self::Full => config.full_max_iterations,
        }
    }
}

impl fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the prompt variant for an intent.
pub fn select(intent: Intent, fast_mode: bool) -> PromptVariant {
    match (intent, fast_mode) {
        (Intent::SmallTalk, _) => PromptVariant::Light,
        (_, true) => PromptVariant::Fast,
        (_, false) => PromptVariant::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_selection_table() {
        let cases = [
            (Intent::SmallTalk, false, PromptVariant::Light),
            (Intent::SmallTalk, true, PromptVariant::Light),
            (Intent::Confirmation, false, PromptVariant::Full),
            (Intent::Confirmation, true, PromptVariant::Fast),
            (Intent::Planning, false, PromptVariant::Full),
            (Intent::Planning, true, PromptVariant::Fast),
        ];
        for (intent, fast, expected) in cases {
            assert_eq!(select(intent, fast), expected, "{intent} fast={fast}");
        }
    }

    #[test]
    fn test_tool_sets() {
        assert!(PromptVariant::Light.allowed_tools().is_empty());
        assert_eq!(PromptVariant::Fast.allowed_tools().len(), 5);
        assert_eq!(PromptVariant::Full.allowed_tools().len(), 12);

        let full: HashSet<_> = FULL_TOOLS.iter().collect();
        assert_eq!(full.len(), FULL_TOOLS.len());
        assert!(FAST_TOOLS.iter().all(|t| full.contains(t)));

        assert!(PromptVariant::Fast.allows("search_flights"));
        assert!(!PromptVariant::Fast.allows("generate_travel_map"));
        assert!(!PromptVariant::Light.allows("get_airport_code"));
    }

    #[test]
    fn test_iteration_budgets() {
        let config = AgentConfig::default();
        assert_eq!(PromptVariant::Fast.iteration_budget(&config), 5);
        assert_eq!(PromptVariant::Full.iteration_budget(&config), 8);
        assert_eq!(PromptVariant::Light.iteration_budget(&config), 8);
    }
}
