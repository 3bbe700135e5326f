// ── Analytics assistant: temporal resolution + metric assembly ──────────────
pub mod analytics;
pub mod temporal;

pub use analytics::{
    AnalyticsAssembler, AnalyticsReport, CodeUsage, OrderScope, OrderStore, ProductNameStore,
    ProductSales, SalesTotals, resolve_product_name,
};
pub use temporal::{Intent, Period};

use crate::response::truncate_chars;
use serde::{Deserialize, Serialize};

/// Most recent turns kept when the assistant prompt is built.
pub const HISTORY_KEEP: usize = 12;
/// Per-turn content ceiling, in characters, applied after trimming.
pub const TURN_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior conversation turn, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub role: TurnRole,
    pub content: String,
}

impl AssistantTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Keep the most recent [`HISTORY_KEEP`] turns, each trimmed and truncated to
/// [`TURN_MAX_CHARS`] characters. Empty turns are dropped.
pub fn clamp_history(history: &[AssistantTurn]) -> Vec<AssistantTurn> {
    let skip = history.len().saturating_sub(HISTORY_KEEP);
    history[skip..]
        .iter()
        .filter_map(|turn| {
            let content = truncate_chars(turn.content.trim(), TURN_MAX_CHARS).to_string();
            (!content.is_empty()).then_some(AssistantTurn {
                role: turn.role,
                content,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_twelve_most_recent_turns() {
        let history: Vec<AssistantTurn> = (0..20)
            .map(|i| AssistantTurn::new(TurnRole::User, format!("message {i}")))
            .collect();

        let clamped = clamp_history(&history);
        assert_eq!(clamped.len(), HISTORY_KEEP);
        assert_eq!(clamped.first().unwrap().content, "message 8");
        assert_eq!(clamped.last().unwrap().content, "message 19");
    }

    #[test]
    fn trims_and_truncates_each_turn() {
        let long = format!("  {}  ", "é".repeat(1500));
        let history = vec![AssistantTurn::new(TurnRole::Assistant, long)];

        let clamped = clamp_history(&history);
        assert_eq!(clamped[0].content.chars().count(), TURN_MAX_CHARS);
        assert!(!clamped[0].content.starts_with(' '));
    }

    #[test]
    fn drops_blank_turns() {
        let history = vec![
            AssistantTurn::new(TurnRole::User, "   "),
            AssistantTurn::new(TurnRole::Assistant, "réponse"),
        ];
        let clamped = clamp_history(&history);
        assert_eq!(clamped.len(), 1);
        assert_eq!(clamped[0].content, "réponse");
    }

    #[test]
    fn roles_serialize_snake_case() {
        let turn = AssistantTurn::new(TurnRole::User, "salut");
        let value = serde_json::to_value(&turn).unwrap();
        assert_eq!(value["role"], "user");
    }
}
