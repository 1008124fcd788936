//! Knowledge retrieval and integration collaborators.
//!
//! The reasoning engine reads knowledge before planning and writes back after
//! reflection through the [`KnowledgeStore`] trait. [`MemoryKnowledgeStore`]
//! is a self-contained implementation with token-overlap scoring, good enough
//! for tests and small embeddings-free deployments. The warmed-workflow cache
//! short-circuits retrieval and planning for inputs seen before.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reason::{ReasoningContext, ReasoningTrace};

/// A single unit of stored knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Retrieval-time relevance to the query, in [0, 1].
    pub relevance: f32,
}

impl KnowledgeItem {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            tags: Vec::new(),
            created_at: Utc::now(),
            relevance: 0.0,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Read/write seam between the reasoning engine and the host's knowledge.
pub trait KnowledgeStore: Send + Sync {
    /// Return up to `limit` items relevant to the query, most relevant first.
    fn retrieve_relevant(
        &self,
        query: &str,
        ctx: &ReasoningContext,
        limit: usize,
    ) -> Vec<KnowledgeItem>;

    /// Record the outcome of a completed request. Write-only: the engine
    /// never reads back what it integrates.
    fn integrate(&self, query: &str, results: &[String], trace: &ReasoningTrace);
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// In-memory [`KnowledgeStore`] scoring by token overlap between the query
/// and each item's content and tags.
#[derive(Debug, Default)]
pub struct MemoryKnowledgeStore {
    items: DashMap<String, KnowledgeItem>,
}

impl MemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item directly, replacing any item with the same id.
    pub fn insert(&self, item: KnowledgeItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Fraction of query tokens found in the candidate token set.
fn overlap_score(query_tokens: &HashSet<String>, candidate: &HashSet<String>) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let hits = query_tokens.iter().filter(|t| candidate.contains(*t)).count();
    hits as f32 / query_tokens.len() as f32
}

impl KnowledgeStore for MemoryKnowledgeStore {
    fn retrieve_relevant(
        &self,
        query: &str,
        _ctx: &ReasoningContext,
        limit: usize,
    ) -> Vec<KnowledgeItem> {
        let query_tokens = tokenize(query);
        let mut scored: Vec<KnowledgeItem> = self
            .items
            .iter()
            .filter_map(|entry| {
                let mut candidate = tokenize(&entry.content);
                for tag in &entry.tags {
                    candidate.extend(tokenize(tag));
                }
                let score = overlap_score(&query_tokens, &candidate);
                if score > 0.0 {
                    let mut item = entry.value().clone();
                    item.relevance = score;
                    Some(item)
                } else {
                    None
                }
            })
            .collect();
        // Stable tiebreak on id keeps retrieval deterministic across runs.
        scored.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(limit);
        debug!(query, returned = scored.len(), "knowledge retrieval");
        scored
    }

    fn integrate(&self, query: &str, results: &[String], _trace: &ReasoningTrace) {
        let id = format!("integrated-{}", self.items.len() + 1);
        let content = format!("Query: {query} | Outcome: {}", results.join(" | "));
        self.insert(KnowledgeItem::new(id, content).with_tag("integrated"));
    }
}

// ---------------------------------------------------------------------------
// Warmed workflows
// ---------------------------------------------------------------------------

/// A pre-computed retrieval-and-planning result for a known input.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmedWorkflow {
    /// Knowledge to substitute for live retrieval.
    pub knowledge: Vec<KnowledgeItem>,
    /// Plan step descriptions; tool bindings are resolved at execution time.
    pub step_skeleton: Vec<String>,
}

/// Cache of warmed workflows keyed by normalized input text.
#[derive(Debug, Default)]
pub struct WarmedWorkflowCache {
    entries: DashMap<String, WarmedWorkflow>,
}

/// Lowercase and collapse interior whitespace so trivially different inputs
/// share a cache key.
pub fn normalize_input(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl WarmedWorkflowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, input: &str, workflow: WarmedWorkflow) {
        self.entries.insert(normalize_input(input), workflow);
    }

    pub fn lookup(&self, input: &str) -> Option<WarmedWorkflow> {
        self.entries
            .get(&normalize_input(input))
            .map(|e| e.value().clone())
    }

    pub fn evict(&self, input: &str) -> bool {
        self.entries.remove(&normalize_input(input)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
