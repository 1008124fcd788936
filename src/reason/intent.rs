//! Intent classification and entity extraction.
//!
//! Keyword heuristics only; an optional [`Capability`] backend can override
//! classification, and hosts replace [`EntityExtractor`] for real NLU. The
//! quality bar here is deliberately low: the closed [`Intent`] enum and the
//! extraction seam are the contract, not the heuristics behind them.
//!
//! [`Capability`]: crate::capability::Capability

use serde::{Deserialize, Serialize};

/// What the user is asking the system to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Create,
    Retrieve,
    Update,
    Delete,
    Analyze,
    #[default]
    General,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::Create => "create",
            Intent::Retrieve => "retrieve",
            Intent::Update => "update",
            Intent::Delete => "delete",
            Intent::Analyze => "analyze",
            Intent::General => "general",
        };
        write!(f, "{name}")
    }
}

/// Classify a query by keyword. First matching group wins, checked in order
/// of destructiveness so "delete the old task and add a new one" deletes.
pub fn classify_intent(query: &str) -> Intent {
    let lower = query.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["delete", "remove", "cancel", "clear"]) {
        Intent::Delete
    } else if has(&["update", "change", "modify", "reschedule", "move", "rename"]) {
        Intent::Update
    } else if has(&["create", "add", "new", "schedule", "make", "set up"]) {
        Intent::Create
    } else if has(&["analyze", "summarize", "review", "compare", "how much", "how many"]) {
        Intent::Analyze
    } else if has(&["show", "list", "find", "get", "what", "when", "search"]) {
        Intent::Retrieve
    } else {
        Intent::General
    }
}

/// A named span of interest pulled from the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Category, e.g. "date", "subject".
    pub kind: String,
    pub value: String,
}

impl Entity {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Pluggable entity extraction. May legitimately return nothing.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, query: &str) -> Vec<Entity>;
}

/// Keyword extractor recognizing a handful of temporal words. Placeholder
/// quality; hosts wanting real extraction supply their own implementation.
#[derive(Debug, Default)]
pub struct KeywordEntityExtractor;

impl EntityExtractor for KeywordEntityExtractor {
    fn extract(&self, query: &str) -> Vec<Entity> {
        const TEMPORAL: &[&str] = &[
            "today", "tomorrow", "yesterday", "monday", "tuesday", "wednesday", "thursday",
            "friday", "saturday", "sunday", "next week", "this week",
        ];
        let lower = query.to_lowercase();
        TEMPORAL
            .iter()
            .filter(|w| lower.contains(*w))
            .map(|w| Entity::new("date", *w))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_classification_covers_all_intents() {
        assert_eq!(classify_intent("create a new task for the report"), Intent::Create);
        assert_eq!(classify_intent("show my tasks for today"), Intent::Retrieve);
        assert_eq!(classify_intent("reschedule the standup to 10am"), Intent::Update);
        assert_eq!(classify_intent("delete the old reminder"), Intent::Delete);
        assert_eq!(classify_intent("summarize my week"), Intent::Analyze);
        assert_eq!(classify_intent("hello there"), Intent::General);
    }

    #[test]
    fn destructive_keywords_win_over_creative_ones() {
        assert_eq!(
            classify_intent("delete the old task and add a new one"),
            Intent::Delete
        );
    }

    #[test]
    fn extractor_finds_temporal_words() {
        let entities = KeywordEntityExtractor.extract("schedule a review for tomorrow");
        assert_eq!(entities, vec![Entity::new("date", "tomorrow")]);
    }

    #[test]
    fn extractor_may_return_nothing() {
        assert!(KeywordEntityExtractor.extract("hello").is_empty());
    }
}
