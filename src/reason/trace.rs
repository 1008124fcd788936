//! Request-scoped reasoning context and append-only trace.
//!
//! Both structures are exclusively owned by one request: the engine builds
//! them, threads them through the loop, and hands them back in the outcome.
//! Nothing here is shared across requests.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::{Entity, Intent};

/// When the request happened and how far ahead it may look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    /// Wall-clock time the request was received.
    pub now: DateTime<Utc>,
    /// Optional planning horizon for scheduling queries.
    pub horizon: Option<DateTime<Utc>>,
}

impl TemporalContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now, horizon: None }
    }
}

impl Default for TemporalContext {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}

/// Everything understood about the current request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReasoningContext {
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub temporal: TemporalContext,
    /// Free-form host-supplied preferences (timezone, working hours, ...).
    pub preferences: HashMap<String, String>,
}

/// Which phase of the loop produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningStep {
    Understanding,
    Planning,
    Execution,
    Reflection,
    PlanRevision,
    KnowledgeIntegration,
}

/// One appended observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: ReasoningStep,
    pub detail: String,
    pub at: DateTime<Utc>,
}

/// Append-only log of a single request's reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningTrace {
    pub entries: Vec<TraceEntry>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, when the request finishes.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Append one entry. Entries are never edited or removed.
    pub fn record(&mut self, step: ReasoningStep, detail: impl Into<String>) {
        self.entries.push(TraceEntry {
            step,
            detail: detail.into(),
            at: Utc::now(),
        });
    }

    /// Mark the trace finished. Idempotent: the first seal wins.
    pub fn seal(&mut self) {
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Entries recorded for a given step, in order.
    pub fn entries_for(&self, step: ReasoningStep) -> Vec<&TraceEntry> {
        self.entries.iter().filter(|e| e.step == step).collect()
    }
}

impl Default for ReasoningTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_appends_in_order() {
        let mut trace = ReasoningTrace::new();
        trace.record(ReasoningStep::Understanding, "intent: create");
        trace.record(ReasoningStep::Planning, "2 steps");
        assert_eq!(trace.entries.len(), 2);
        assert_eq!(trace.entries[0].step, ReasoningStep::Understanding);
        assert!(trace.completed_at.is_none());
    }

    #[test]
    fn seal_is_idempotent() {
        let mut trace = ReasoningTrace::new();
        trace.seal();
        let first = trace.completed_at;
        trace.seal();
        assert_eq!(trace.completed_at, first);
    }

    #[test]
    fn entries_filter_by_step() {
        let mut trace = ReasoningTrace::new();
        trace.record(ReasoningStep::Execution, "step 1");
        trace.record(ReasoningStep::Reflection, "rate 1.0");
        trace.record(ReasoningStep::Execution, "step 2");
        assert_eq!(trace.entries_for(ReasoningStep::Execution).len(), 2);
        assert_eq!(trace.entries_for(ReasoningStep::PlanRevision).len(), 0);
    }
}
