use crate::cost::CostMeter;
use crate::types::{Role, Turn};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Ordered turn history for one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
    /// Hard cap on stored turns; `None` keeps everything.
    max_turns: Option<usize>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that forgets its oldest turns beyond `max_turns`.
    pub fn with_limit(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: Some(max_turns),
        }
    }

    /// Append a turn at the end of the history, dropping the oldest turns
    /// when the cap is exceeded.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
        let Some(max) = self.max_turns else { return };
        if self.turns.len() <= max {
            return;
        }
        let mut excess = self.turns.len() - max;
        // Never leave tool results at the front without their call.
        while excess < self.turns.len() && self.turns[excess].role == Role::Tool {
            excess += 1;
        }
        self.turns.drain(..excess);
    }

    /// The last `n` turns in chronological order.
    pub fn window(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Drop every turn.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// A single conversation: its history, mode, provider and running cost.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub history: ConversationStore,
    /// Restrict planning turns to the essential tool subset.
    pub fast_mode: bool,
    /// Pricing key of the provider answering this session.
    pub provider: String,
    pub cost: CostMeter,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(name: impl Into<String>, provider: impl Into<String>, fast_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            history: ConversationStore::new(),
            fast_mode,
            provider: provider.into(),
            cost: CostMeter::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Cap the stored history at `max_turns`; 0 keeps everything.
    pub fn with_history_limit(mut self, max_turns: usize) -> Self {
        if max_turns > 0 {
            self.history = ConversationStore::with_limit(max_turns);
        }
        self
    }

    /// Add a turn and update the timestamp.
    pub fn push_turn(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.history.append(turn);
    }

    /// Clear the conversation. Cost, mode and provider are kept.
    pub fn reset(&mut self) {
        self.history.reset();
        self.updated_at = Utc::now();
        tracing::info!(session = %self.id, "Conversation history reset");
    }

    /// Clear the accumulated cost only.
    pub fn reset_cost(&mut self) {
        self.cost.reset();
    }

    pub fn set_fast_mode(&mut self, fast_mode: bool) {
        self.fast_mode = fast_mode;
    }

    pub fn total_estimated_cost(&self) -> f64 {
        self.cost.total()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolCall;

    fn store_with(n: usize) -> ConversationStore {
        let mut store = ConversationStore::new();
        for i in 0..n {
            store.append(Turn::user(format!("message {i}")));
        }
        store
    }

    #[test]
    fn test_window_truncates_from_the_front() {
        let store = store_with(7);
        let window = store.window(3);
        let contents: Vec<_> = window.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["message 4", "message 5", "message 6"]);
    }

    #[test]
    fn test_window_larger_than_history_returns_everything() {
        let store = store_with(4);
        assert_eq!(store.window(4).len(), 4);
        let window = store.window(10);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "message 0");
        assert_eq!(window[3].content, "message 3");
    }

    #[test]
    fn test_window_zero_is_empty() {
        assert!(store_with(3).window(0).is_empty());
        assert!(ConversationStore::new().window(5).is_empty());
    }

    #[test]
    fn test_limit_drops_oldest_turns() {
        let mut store = ConversationStore::with_limit(3);
        for i in 0..5 {
            store.append(Turn::user(format!("message {i}")));
        }
        let contents: Vec<_> = store.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["message 2", "message 3", "message 4"]);
        assert_eq!(store_with(40).len(), 40);
    }

    #[test]
    fn test_limit_never_starts_with_a_tool_result() {
        let tool_turn = |content: &str| Turn {
            role: Role::Tool,
            ..Turn::user(content)
        };
        let mut store = ConversationStore::with_limit(3);
        store.append(Turn::user("Tokyo flights"));
        store.append(Turn::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::new("search_flights", serde_json::json!({})),
                ToolCall::new("search_hotels", serde_json::json!({})),
            ],
        ));
        store.append(tool_turn("3 offers"));
        store.append(tool_turn("5 hotels"));
        assert_eq!(store.len(), 3);
        assert!(store.turns()[0].tool_calls.is_some());

        // Dropping only the call would orphan both results, so they go too.
        store.append(Turn::assistant("Here are your options."));
        assert_eq!(store.len(), 1);
        assert_eq!(store.turns()[0].content, "Here are your options.");
    }

    #[test]
    fn test_session_history_limit() {
        let mut session = Session::new("default", "claude", false).with_history_limit(2);
        for i in 0..4 {
            session.push_turn(Turn::user(format!("message {i}")));
        }
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history.turns()[0].content, "message 2");

        let unlimited = Session::new("default", "claude", false).with_history_limit(0);
        assert!(unlimited.history.turns().is_empty());
    }

    #[test]
    fn test_reset_keeps_cost_mode_and_provider() {
        let mut session = Session::new("default", "claude", true);
        session.push_turn(Turn::user("Tokyo in April"));
        session.cost.record(0.02, 1_000, 200, false);

        session.reset();

        assert!(session.history.is_empty());
        assert!((session.total_estimated_cost() - 0.02).abs() < 1e-12);
        assert!(session.fast_mode);
        assert_eq!(session.provider, "claude");

        session.reset_cost();
        assert_eq!(session.total_estimated_cost(), 0.0);
    }
}
