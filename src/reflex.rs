//! Reflex triggers: event-driven runtime adaptation of live kernels.
//!
//! The registry binds `(kernel identity, event type)` pairs to replacement
//! clauses. On event delivery it compiles the replacement and produces a new
//! kernel in which only the minimal subgraph relevant to the event is
//! replaced — a narrow event (say, a single user edit) swaps exactly one
//! node, while a broad conflict event may rebuild the wider graph. The
//! caller decides whether and when to swap the live kernel for the adapted
//! one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::dag::{DagNode, build_dag};
use crate::error::ReflexError;
use crate::kernel::{KernelId, KernelObject};
use crate::value::ClauseContext;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An external event delivered by a collaborator. Ephemeral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflexEvent {
    /// Event type, matched against kernel trigger maps.
    pub event_type: String,
    /// String-keyed payload. A `scope=graph` entry marks a broad event.
    pub data: HashMap<String, String>,
}

impl ReflexEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: HashMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Bookkeeping carried across event deliveries for one kernel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReflexState {
    /// When the last trigger fired.
    pub last_triggered: Option<DateTime<Utc>>,
    /// Per-event-type delivery counts.
    pub event_counts: HashMap<String, u64>,
}

/// Outcome of one event delivery.
#[derive(Debug, Clone)]
pub struct ReflexHandleResult {
    pub triggered: bool,
    /// The adapted kernel, when a trigger matched. The original is untouched.
    pub adapted: Option<KernelObject>,
    /// Registry bookkeeping snapshot, when a trigger matched.
    pub state: Option<ReflexState>,
    pub message: String,
}

impl ReflexHandleResult {
    fn not_triggered(event_type: &str) -> Self {
        Self {
            triggered: false,
            adapted: None,
            state: None,
            message: format!("No trigger registered for event type {event_type}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Explicit trigger registry keyed by opaque kernel identity.
///
/// No global mutable singleton: hosts create one registry, register each
/// kernel's triggers, and evict identities they stop tracking.
#[derive(Debug, Default)]
pub struct ReflexRegistry {
    /// (kernel id, event type) → target clause id.
    bindings: DashMap<(KernelId, String), String>,
    /// Kernel id → delivery bookkeeping.
    states: DashMap<KernelId, ReflexState>,
}

impl ReflexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a kernel's trigger map into the registry.
    pub fn register_triggers(&self, ko: &KernelObject) {
        let Some(reflex) = &ko.reflex else {
            return;
        };
        for (event_type, clause_id) in &reflex.trigger_map {
            self.bindings
                .insert((ko.id.clone(), event_type.clone()), clause_id.clone());
        }
        tracing::debug!(
            kernel = %ko.id,
            triggers = reflex.trigger_map.len(),
            "registered reflex triggers"
        );
    }

    /// Look up the target clause id for a kernel/event pair.
    pub fn lookup(&self, kernel: &KernelId, event_type: &str) -> Option<String> {
        self.bindings
            .get(&(kernel.clone(), event_type.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Drop all bindings and bookkeeping for a kernel identity.
    pub fn evict(&self, kernel: &KernelId) {
        self.bindings.retain(|(id, _), _| id != kernel);
        self.states.remove(kernel);
    }

    /// Deliver an event against the currently live kernel.
    ///
    /// Returns a non-triggered result when there is no kernel, no reflex
    /// configuration, or no binding for the event type. On a match, produces
    /// an adapted kernel: a narrow event replaces exactly the target node in
    /// place (or appends it when new); a broad event — `scope=graph` payload
    /// or a conflict event type — recompiles the whole clause set.
    pub fn handle_event(
        &self,
        event: &ReflexEvent,
        _ctx: &ClauseContext,
        current_ko: Option<&KernelObject>,
    ) -> Result<ReflexHandleResult, ReflexError> {
        let Some(ko) = current_ko else {
            return Ok(ReflexHandleResult::not_triggered(&event.event_type));
        };
        let Some(reflex) = &ko.reflex else {
            return Ok(ReflexHandleResult::not_triggered(&event.event_type));
        };

        // Registry bindings win; a kernel's own trigger map is the fallback
        // for hosts that never called register_triggers.
        let target_id = self
            .lookup(&ko.id, &event.event_type)
            .or_else(|| reflex.trigger_map.get(&event.event_type).cloned());
        let Some(target_id) = target_id else {
            return Ok(ReflexHandleResult::not_triggered(&event.event_type));
        };

        let replacement = reflex.clause(&target_id).ok_or_else(|| {
            ReflexError::UnknownTargetClause {
                event_type: event.event_type.clone(),
                clause_id: target_id.clone(),
            }
        })?;

        let adapted = if is_broad(event) {
            // Broad blast radius: rebuild the full graph with the replacement
            // swapped into the clause set.
            let mut clauses: Vec<_> = ko.nodes.iter().map(|n| n.clause.clone()).collect();
            match clauses.iter().position(|c| c.id == replacement.id) {
                Some(pos) => clauses[pos] = replacement.clone(),
                None => clauses.push(replacement.clone()),
            }
            ko.with_nodes(build_dag(&clauses)?)
        } else {
            // Narrow blast radius: swap exactly one node, keeping its position
            // and resolved edges; unrelated nodes are untouched.
            let mut node = DagNode::compile_standalone(replacement)?;
            let mut nodes = ko.nodes.clone();
            match nodes.iter().position(|n| n.clause.id == replacement.id) {
                Some(pos) => {
                    node.predecessors = nodes[pos].predecessors.clone();
                    node.successors = nodes[pos].successors.clone();
                    nodes[pos] = node;
                }
                None => nodes.push(node),
            }
            ko.with_nodes(nodes)
        };

        let mut state = self.states.entry(ko.id.clone()).or_default();
        state.last_triggered = Some(Utc::now());
        *state
            .event_counts
            .entry(event.event_type.clone())
            .or_insert(0) += 1;
        let snapshot = state.clone();
        drop(state);

        tracing::info!(
            kernel = %ko.id,
            event = %event.event_type,
            clause = %target_id,
            broad = is_broad(event),
            "adapted kernel via reflex trigger"
        );

        Ok(ReflexHandleResult {
            triggered: true,
            adapted: Some(adapted),
            state: Some(snapshot),
            message: format!(
                "Adapted kernel {} via trigger {} -> clause {}",
                ko.id, event.event_type, target_id
            ),
        })
    }
}

/// Broad events may touch the wider graph; everything else is narrow.
fn is_broad(event: &ReflexEvent) -> bool {
    event.data.get("scope").map(String::as_str) == Some("graph")
        || event.event_type.contains("conflict")
}
