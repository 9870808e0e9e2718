//! Trip-parameter extraction for confirmation turns.
//!
//! When the user says "go" the model needs to act at once, so the parameters
//! already mentioned in the conversation are pulled out of recent user turns
//! and rendered into a directive appended to the system prompt.

use crate::config::ConfirmationConfig;
use crate::intent::compile;
use crate::types::{Role, Turn};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Trip parameters found in the conversation. `None` means unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTripParameters {
    pub destination: Option<String>,
    pub dates: Option<String>,
    /// Whole currency units.
    pub budget: Option<u64>,
    pub interests: Option<Vec<String>>,
}

impl ExtractedTripParameters {
    pub fn is_empty(&self) -> bool {
        self.destination.is_none()
            && self.dates.is_none()
            && self.budget.is_none()
            && self.interests.is_none()
    }

    fn is_complete(&self) -> bool {
        self.destination.is_some()
            && self.dates.is_some()
            && self.budget.is_some()
            && self.interests.is_some()
    }

    /// Names of the fields still unknown.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.destination.is_none() {
            missing.push("destination");
        }
        if self.dates.is_none() {
            missing.push("dates");
        }
        if self.budget.is_none() {
            missing.push("budget");
        }
        if self.interests.is_none() {
            missing.push("interests");
        }
        missing
    }

    /// System-prompt text instructing the model to act on these parameters.
    pub fn directive(&self) -> String {
        let mut out = String::from(
            "The user has just confirmed the plan. Launch the relevant tools now, \
             calling independent tools together in a single batch. \
             Do not ask for confirmation again.\n",
        );

        if self.is_empty() {
            out.push_str(
                "No trip parameters were found in the conversation. \
                 Ask the user for the destination, dates and budget instead of guessing.",
            );
            return out;
        }

        out.push_str("Known trip parameters:\n");
        if let Some(destination) = &self.destination {
            out.push_str(&format!("- destination: {destination}\n"));
        }
        if let Some(dates) = &self.dates {
            out.push_str(&format!("- dates: {dates}\n"));
        }
        if let Some(budget) = self.budget {
            out.push_str(&format!("- budget: {budget}\n"));
        }
        if let Some(interests) = &self.interests {
            out.push_str(&format!("- interests: {}\n", interests.join(", ")));
        }

        let missing = self.missing();
        if !missing.is_empty() {
            out.push_str(&format!(
                "Unknown: {}. Run what you can with the known parameters and ask the user \
                 for the missing ones in your answer instead of guessing.",
                missing.join(", ")
            ));
        }
        out
    }
}

/// Scans recent user turns with configurable pattern tables.
pub struct ConfirmationResolver {
    scan_window: usize,
    gazetteer: Option<Regex>,
    canonical: HashMap<String, String>,
    /// Lowercased names that only count when capitalised in the text.
    common_words: HashSet<String>,
    destination_patterns: Vec<Regex>,
    non_destinations: HashSet<String>,
    date_patterns: Vec<Regex>,
    budget_patterns: Vec<Regex>,
    interests: Vec<(String, Regex)>,
}

impl ConfirmationResolver {
    pub fn from_config(config: &ConfirmationConfig) -> Self {
        let mut names: Vec<&String> = config.destinations.iter().collect();
        // Longest first so "Rio de Janeiro" wins over "Rio".
        names.sort_by_key(|n| std::cmp::Reverse(n.chars().count()));
        let gazetteer = if names.is_empty() {
            None
        } else {
            let alternation = names
                .iter()
                .map(|n| regex::escape(n))
                .collect::<Vec<_>>()
                .join("|");
            match Regex::new(&format!(r"(?i)\b(?:{alternation})\b")) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Ignoring destination gazetteer: {}", e);
                    None
                }
            }
        };

        let interests = config
            .interest_keywords
            .iter()
            .filter_map(|kw| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                    .ok()
                    .map(|re| (kw.clone(), re))
            })
            .collect();

        Self {
            scan_window: config.scan_window,
            gazetteer,
            canonical: config
                .destinations
                .iter()
                .map(|n| (n.to_lowercase(), n.clone()))
                .collect(),
            common_words: config
                .common_word_destinations
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            destination_patterns: compile(&config.destination_patterns),
            non_destinations: config
                .non_destinations
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            date_patterns: compile(&config.date_patterns),
            budget_patterns: compile(&config.budget_patterns),
            interests,
        }
    }

    pub fn scan_window(&self) -> usize {
        self.scan_window
    }

    /// Extract parameters from the last `scan_window` turns. The most recent
    /// mention of each field wins. Never fails.
    pub fn resolve(&self, history: &[Turn]) -> ExtractedTripParameters {
        let start = history.len().saturating_sub(self.scan_window);
        let mut params = ExtractedTripParameters::default();

        for turn in history[start..].iter().rev().filter(|t| t.role == Role::User) {
            let text = turn.content.as_str();
            if params.destination.is_none() {
                params.destination = self.destination(text);
            }
            if params.dates.is_none() {
                params.dates = self.dates(text);
            }
            if params.budget.is_none() {
                params.budget = self.budget(text);
            }
            if params.interests.is_none() {
                params.interests = self.interests(text);
            }
            if params.is_complete() {
                break;
            }
        }
        params
    }

    fn destination(&self, text: &str) -> Option<String> {
        if let Some(re) = &self.gazetteer {
            for m in re.find_iter(text) {
                let found = m.as_str().to_lowercase();
                let capitalised = m.as_str().starts_with(char::is_uppercase);
                if !capitalised && self.common_words.contains(&found) {
                    continue;
                }
                return Some(
                    self.canonical
                        .get(&found)
                        .cloned()
                        .unwrap_or_else(|| m.as_str().to_string()),
                );
            }
        }

        for re in &self.destination_patterns {
            for caps in re.captures_iter(text) {
                let Some(group) = caps.get(1) else { continue };
                let candidate = group.as_str().trim();
                let first_word = candidate.split_whitespace().next().unwrap_or(candidate);
                if self.non_destinations.contains(&first_word.to_lowercase()) {
                    continue;
                }
                return Some(candidate.to_string());
            }
        }
        None
    }

    fn dates(&self, text: &str) -> Option<String> {
        self.date_patterns
            .iter()
            .find_map(|re| re.captures(text))
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| m.as_str().trim().to_string())
    }

    fn budget(&self, text: &str) -> Option<u64> {
        for re in &self.budget_patterns {
            let Some(caps) = re.captures(text) else { continue };
            let Some(amount) = caps.get(1) else { continue };
            let digits: String = amount.as_str().chars().filter(char::is_ascii_digit).collect();
            let Ok(mut value) = digits.parse::<u64>() else { continue };
            if caps.get(2).is_some() {
                value = value.saturating_mul(1000);
            }
            return Some(value);
        }
        None
    }

    fn interests(&self, text: &str) -> Option<Vec<String>> {
        let found: Vec<String> = self
            .interests
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(kw, _)| kw.clone())
            .collect();
        (!found.is_empty()).then_some(found)
    }
}

impl Default for ConfirmationResolver {
    fn default() -> Self {
        Self::from_config(&ConfirmationConfig::default())
    }
}
