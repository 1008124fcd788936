//! Kernel objects: immutable, executable bundles of DAG nodes.
//!
//! A kernel object (KO) is the atomic unit of execution, adaptation, and
//! replacement. It is immutable as a value: reflex adaptation produces a new
//! kernel rather than mutating one in place, so concurrent readers are always
//! consistent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clause::ClauseInput;
use crate::dag::DagNode;
use crate::error::CompileError;
use crate::expr::Condition;

/// Opaque kernel identity, used to key the reflex registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelId(String);

impl KernelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for KernelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of workflow the kernel encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    Scheduling,
    Workflow,
    Analysis,
}

/// Who the kernel acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelRole {
    Agent,
    Assistant,
    System,
}

/// Iteration bounds and exit conditions for kernel execution.
///
/// `bounds` of `None` means unbounded; callers should always supply a bound,
/// since an exit-condition-free unbounded kernel relies entirely on
/// quiescence to terminate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoopControl {
    /// Maximum iteration count.
    pub bounds: Option<u32>,
    /// Boolean expressions over context variables; any one becoming true
    /// stops execution successfully.
    pub exit_conditions: Vec<Condition>,
}

impl LoopControl {
    /// Bounded loop control with no exit conditions.
    pub fn bounded(bounds: u32) -> Self {
        Self {
            bounds: Some(bounds),
            exit_conditions: Vec::new(),
        }
    }

    /// Add an exit condition, parsed from the expression grammar. Parse
    /// failures surface here, before any execution begins.
    pub fn with_exit_condition(mut self, expression: &str) -> Result<Self, CompileError> {
        self.exit_conditions.push(Condition::parse(expression)?);
        Ok(self)
    }
}

/// Event-type → replacement-clause bindings for runtime adaptation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReflexTriggers {
    /// Event type → target clause id to splice in on that event.
    pub trigger_map: HashMap<String, String>,
    /// Replacement clauses referenced by the trigger map.
    pub clauses: Vec<ClauseInput>,
}

impl ReflexTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an event type to a replacement clause.
    pub fn on_event(mut self, event_type: impl Into<String>, replacement: ClauseInput) -> Self {
        self.trigger_map.insert(event_type.into(), replacement.id.clone());
        self.clauses.push(replacement);
        self
    }

    /// Look up a replacement clause by id.
    pub fn clause(&self, id: &str) -> Option<&ClauseInput> {
        self.clauses.iter().find(|c| c.id == id)
    }
}

/// An immutable, executable bundle of DAG nodes plus loop/exit/reflex
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelObject {
    /// Identity, derived from the originating clause id.
    pub id: KernelId,
    pub kind: KernelKind,
    pub role: KernelRole,
    /// External variables the kernel expects in its context.
    pub inputs: Vec<String>,
    /// Variables the kernel is expected to produce.
    pub yields: Vec<String>,
    /// Compiled nodes in dependency order.
    pub nodes: Vec<DagNode>,
    /// Supplementary computed-rule text carried for collaborators.
    pub logic: Option<String>,
    pub loop_control: Option<LoopControl>,
    pub reflex: Option<ReflexTriggers>,
}

impl KernelObject {
    /// Produce a new kernel identical to this one except for its node list.
    /// Used by reflex adaptation; never mutates the original.
    pub fn with_nodes(&self, nodes: Vec<DagNode>) -> KernelObject {
        KernelObject {
            nodes,
            ..self.clone()
        }
    }

    /// Ids of all compiled nodes, in dependency order.
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.clause.id.as_str()).collect()
    }
}

/// Package compiled nodes plus configuration into one immutable kernel.
/// Pure transformation: equal input produces structurally equal kernels.
#[allow(clippy::too_many_arguments)]
pub fn collapse_to_kernel(
    nodes: Vec<DagNode>,
    clause_id: impl Into<String>,
    kind: KernelKind,
    role: KernelRole,
    inputs: Vec<String>,
    yields: Vec<String>,
    loop_control: Option<LoopControl>,
    reflex: Option<ReflexTriggers>,
) -> KernelObject {
    KernelObject {
        id: KernelId::new(clause_id),
        kind,
        role,
        inputs,
        yields,
        nodes,
        logic: None,
        loop_control,
        reflex,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::build_dag;

    fn sample_nodes() -> Vec<DagNode> {
        build_dag(&[
            ClauseInput::new("produce", "WHEN always THEN SET x = 1").with_output("x"),
            ClauseInput::new("consume", "WHEN x == 1 THEN SET y = 2")
                .with_input("x")
                .with_output("y"),
        ])
        .unwrap()
    }

    #[test]
    fn collapse_packages_nodes_and_config() {
        let ko = collapse_to_kernel(
            sample_nodes(),
            "wf-1",
            KernelKind::Workflow,
            KernelRole::Agent,
            vec![],
            vec!["y".into()],
            Some(LoopControl::bounded(10)),
            None,
        );
        assert_eq!(ko.id.as_str(), "wf-1");
        assert_eq!(ko.node_ids(), vec!["produce", "consume"]);
        assert_eq!(ko.loop_control.as_ref().unwrap().bounds, Some(10));
    }

    #[test]
    fn equal_input_produces_structurally_equal_kernels() {
        let a = collapse_to_kernel(
            sample_nodes(),
            "wf-1",
            KernelKind::Workflow,
            KernelRole::Agent,
            vec![],
            vec!["y".into()],
            None,
            None,
        );
        let b = collapse_to_kernel(
            sample_nodes(),
            "wf-1",
            KernelKind::Workflow,
            KernelRole::Agent,
            vec![],
            vec!["y".into()],
            None,
            None,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn with_nodes_leaves_original_untouched() {
        let ko = collapse_to_kernel(
            sample_nodes(),
            "wf-1",
            KernelKind::Workflow,
            KernelRole::Agent,
            vec![],
            vec![],
            None,
            None,
        );
        let adapted = ko.with_nodes(Vec::new());
        assert_eq!(ko.nodes.len(), 2);
        assert!(adapted.nodes.is_empty());
        assert_eq!(adapted.id, ko.id);
    }

    #[test]
    fn invalid_exit_condition_fails_at_construction() {
        let err = LoopControl::bounded(3).with_exit_condition("x ===== 5");
        assert!(err.is_err());
    }

    #[test]
    fn reflex_triggers_resolve_clauses() {
        let reflex = ReflexTriggers::new().on_event(
            "user_edit",
            ClauseInput::new("patched", "WHEN always THEN SET x = 2").with_output("x"),
        );
        assert_eq!(reflex.trigger_map.get("user_edit").map(String::as_str), Some("patched"));
        assert!(reflex.clause("patched").is_some());
        assert!(reflex.clause("ghost").is_none());
    }
}
