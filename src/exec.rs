//! Bounded-iteration kernel execution.
//!
//! The executor runs a kernel's nodes in dependency order, pass after pass,
//! until an exit condition holds, the kernel completes, or the iteration
//! bound is exhausted. It never retries internally; retry and backoff are
//! the caller's responsibility, and every failure mode is local to one
//! `execute` call.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::clause::{ClauseAction, FiringMode};
use crate::dag::DagNode;
use crate::error::ExecError;
use crate::expr::Operand;
use crate::kernel::KernelObject;
use crate::value::{ClauseContext, ContextValue};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Typed events appended to the execution log, in firing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// A node's guard held and its action ran.
    NodeCompleted { clause_id: String, iteration: u32 },
    /// A node's action failed; execution continued.
    NodeFailed { clause_id: String, message: String },
    /// An exit condition became true after a full pass.
    ExitConditionMet { condition: String, iteration: u32 },
    /// The iteration bound was reached without completion.
    IterationLimitReached { bounds: u32 },
}

/// Per-execution state: which nodes fired, how many passes ran, and the
/// ordered event log. Created fresh per `execute` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Clause ids that have fired at least once, in first-fire order.
    pub completed_nodes: Vec<String>,
    /// Index of the pass the execution terminated in.
    pub iteration: u32,
    /// Ordered log of typed events.
    pub events: Vec<ExecutionEvent>,
}

/// Outcome of one `execute` call. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub state: ExecutionState,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Action delegation
// ---------------------------------------------------------------------------

/// Caller-supplied seam for `CALL` actions: the executor performs pure
/// context mutation itself and delegates tool invocation here.
pub trait ActionExecutor: Send + Sync {
    fn call_tool(
        &self,
        tool: &str,
        args: &HashMap<String, String>,
        ctx: &ClauseContext,
    ) -> Result<String, ExecError>;
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs kernel objects to completion, exit condition, or iteration-bound
/// failure against a mutable clause context.
#[derive(Default)]
pub struct Executor {
    actions: Option<Box<dyn ActionExecutor>>,
}

impl Executor {
    /// An executor without tool delegation; `CALL` actions fail per node.
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that delegates `CALL` actions to the given collaborator.
    pub fn with_actions(actions: Box<dyn ActionExecutor>) -> Self {
        Self {
            actions: Some(actions),
        }
    }

    /// Execute a kernel against a context the caller exclusively owns.
    ///
    /// Per pass: visit nodes in dependency order, fire each eligible node
    /// whose guard holds, then check exit conditions (these take priority
    /// over completion). Without exit conditions the kernel completes when
    /// all `yields` are present and either every node has fired or the pass
    /// was quiescent. Reaching the iteration bound fails the execution;
    /// a quiescent pass that satisfies nothing is reported as a stall, since
    /// further passes could never change the context. Passes with failed
    /// actions are never treated as quiescent, so a kernel whose `CALL`
    /// nodes keep failing runs until its bound — always set one.
    pub fn execute(&self, ko: &KernelObject, ctx: &mut ClauseContext) -> ExecutionResult {
        let mut state = ExecutionState::default();
        let mut fired: HashMap<String, u32> = HashMap::new();
        let bounds = ko.loop_control.as_ref().and_then(|lc| lc.bounds);
        let exit_conditions = ko
            .loop_control
            .as_ref()
            .map(|lc| lc.exit_conditions.as_slice())
            .unwrap_or(&[]);

        tracing::debug!(kernel = %ko.id, nodes = ko.nodes.len(), ?bounds, "executing kernel");

        loop {
            if let Some(bounds) = bounds {
                if state.iteration >= bounds {
                    state
                        .events
                        .push(ExecutionEvent::IterationLimitReached { bounds });
                    tracing::warn!(kernel = %ko.id, bounds, "iteration bound exhausted");
                    return ExecutionResult {
                        success: false,
                        state,
                        error: Some(format!("Max iterations ({bounds}) exceeded")),
                    };
                }
            }

            let mut fired_this_pass = false;
            let mut failed_this_pass = false;
            for node in &ko.nodes {
                let id = node.clause.id.as_str();
                if node.clause.firing == FiringMode::Once && fired.contains_key(id) {
                    continue;
                }
                if !eligible(node, ctx, &fired) {
                    continue;
                }
                if !node.compiled.guard.eval(ctx) {
                    continue;
                }

                match self.run_action(node, ctx) {
                    Ok(()) => {
                        fired_this_pass = true;
                        *fired.entry(id.to_string()).or_insert(0) += 1;
                        if !state.completed_nodes.iter().any(|c| c == id) {
                            state.completed_nodes.push(id.to_string());
                        }
                        state.events.push(ExecutionEvent::NodeCompleted {
                            clause_id: id.to_string(),
                            iteration: state.iteration,
                        });
                    }
                    Err(message) => {
                        tracing::warn!(kernel = %ko.id, clause = id, %message, "node action failed");
                        failed_this_pass = true;
                        state.events.push(ExecutionEvent::NodeFailed {
                            clause_id: id.to_string(),
                            message,
                        });
                    }
                }
            }

            // Exit conditions take priority over completion.
            if !exit_conditions.is_empty() {
                if let Some(cond) = exit_conditions.iter().find(|c| c.eval(ctx)) {
                    state.events.push(ExecutionEvent::ExitConditionMet {
                        condition: cond.to_string(),
                        iteration: state.iteration,
                    });
                    tracing::debug!(kernel = %ko.id, condition = %cond, "exit condition met");
                    return ExecutionResult {
                        success: true,
                        state,
                        error: None,
                    };
                }
            } else {
                let yields_present = ko.yields.iter().all(|y| ctx.contains(y));
                let all_fired = ko
                    .nodes
                    .iter()
                    .all(|n| fired.contains_key(n.clause.id.as_str()));
                if yields_present && (all_fired || !fired_this_pass) {
                    tracing::debug!(kernel = %ko.id, iteration = state.iteration, "kernel completed");
                    return ExecutionResult {
                        success: true,
                        state,
                        error: None,
                    };
                }
            }

            // A quiescent pass that satisfied nothing can never make progress:
            // the context is unchanged, so every later pass would be identical.
            // A failed action is not quiescence — delegated tool calls are
            // side-effectful and may succeed on a later pass, so such nodes
            // keep re-firing until the iteration bound.
            if !fired_this_pass && !failed_this_pass {
                let iteration = state.iteration;
                return ExecutionResult {
                    success: false,
                    state,
                    error: Some(format!(
                        "execution stalled at iteration {iteration}: no node fired and completion conditions unmet"
                    )),
                };
            }

            state.iteration += 1;
        }
    }

    fn run_action(&self, node: &DagNode, ctx: &mut ClauseContext) -> Result<(), String> {
        match &node.compiled.action {
            ClauseAction::Set { var, value } => {
                let resolved = match value {
                    Operand::Literal(v) => v.clone(),
                    Operand::Var(source) => ctx
                        .get(source)
                        .cloned()
                        .ok_or_else(|| format!("source variable \"{source}\" is unset"))?,
                };
                ctx.set(var.clone(), resolved);
                Ok(())
            }
            ClauseAction::Add { var, delta } => {
                let current = match ctx.get(var) {
                    None => 0.0,
                    Some(ContextValue::Number(n)) => *n,
                    Some(other) => {
                        return Err(format!("cannot ADD to non-numeric value {other}"));
                    }
                };
                ctx.set(var.clone(), current + delta);
                Ok(())
            }
            ClauseAction::CallTool { tool, args } => {
                let actions = self.actions.as_deref().ok_or_else(|| {
                    ExecError::NoActionExecutor { tool: tool.clone() }.to_string()
                })?;
                let result = actions
                    .call_tool(tool, args, ctx)
                    .map_err(|e| e.to_string())?;
                // Tool results land in the node's declared outputs.
                for output in &node.clause.outputs {
                    ctx.set(output.clone(), ContextValue::Text(result.clone()));
                }
                Ok(())
            }
        }
    }
}

/// A node is eligible when its explicit dependency nodes have all fired at
/// least once; without explicit dependencies, when its declared input
/// variables are all present in the context.
fn eligible(node: &DagNode, ctx: &ClauseContext, fired: &HashMap<String, u32>) -> bool {
    if !node.clause.dependencies.is_empty() {
        return node
            .clause
            .dependencies
            .iter()
            .all(|dep| fired.contains_key(dep.as_str()));
    }
    node.clause.inputs.iter().all(|var| ctx.contains(var))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clause::ClauseInput;
    use crate::dag::build_dag;
    use crate::kernel::{KernelKind, KernelRole, LoopControl, collapse_to_kernel};

    fn kernel(clauses: &[ClauseInput], yields: &[&str], lc: Option<LoopControl>) -> KernelObject {
        collapse_to_kernel(
            build_dag(clauses).unwrap(),
            "test-kernel",
            KernelKind::Workflow,
            KernelRole::Agent,
            vec![],
            yields.iter().map(|s| s.to_string()).collect(),
            lc,
            None,
        )
    }

    #[test]
    fn single_true_guard_completes_in_iteration_zero() {
        let ko = kernel(
            &[ClauseInput::new("only", "WHEN always THEN SET done = true").with_output("done")],
            &["done"],
            None,
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(result.state.completed_nodes, vec!["only".to_string()]);
        assert_eq!(result.state.iteration, 0);
    }

    #[test]
    fn data_dependent_nodes_fire_in_order() {
        let ko = kernel(
            &[
                ClauseInput::new("b", "WHEN x == 1 THEN SET y = 2")
                    .with_input("x")
                    .with_output("y"),
                ClauseInput::new("a", "WHEN always THEN SET x = 1").with_output("x"),
            ],
            &["y"],
            None,
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(
            result.state.completed_nodes,
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(ctx.get("y"), Some(&ContextValue::Number(2.0)));
    }

    #[test]
    fn exit_condition_preempts_unfired_nodes() {
        let lc = LoopControl::bounded(5).with_exit_condition("x == 1").unwrap();
        let ko = kernel(
            &[
                ClauseInput::new("fires", "WHEN always THEN SET x = 1").with_output("x"),
                ClauseInput::new("never_fires", "WHEN x == 99 THEN SET z = 1").with_output("z"),
            ],
            &["z"],
            Some(lc),
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(result.state.completed_nodes, vec!["fires".to_string()]);
        assert!(result.state.events.iter().any(|e| matches!(
            e,
            ExecutionEvent::ExitConditionMet { iteration: 0, .. }
        )));
    }

    #[test]
    fn refiring_guard_exhausts_iteration_bound() {
        let lc = LoopControl::bounded(3)
            .with_exit_condition("n == 100")
            .unwrap();
        let ko = kernel(
            &[ClauseInput::new("bump", "WHEN always THEN ADD n 1").with_output("n")],
            &[],
            Some(lc),
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Max iterations (3) exceeded"), "got: {error}");
        assert!(result
            .state
            .events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::IterationLimitReached { bounds: 3 })));
        // The node fired once per pass, never deduplicated.
        assert_eq!(ctx.get("n"), Some(&ContextValue::Number(3.0)));
    }

    #[test]
    fn self_referential_rule_converges_on_exit_condition() {
        let lc = LoopControl::bounded(10)
            .with_exit_condition("counter == 3")
            .unwrap();
        let ko = kernel(
            &[ClauseInput::new("count", "WHEN counter < 3 THEN ADD counter 1")
                .with_input("counter")
                .with_output("counter")],
            &[],
            Some(lc),
        );
        let mut ctx = ClauseContext::new().with("counter", 0.0);
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(ctx.get("counter"), Some(&ContextValue::Number(3.0)));
        assert_eq!(result.state.iteration, 2);
    }

    #[test]
    fn fire_once_node_does_not_refire() {
        let lc = LoopControl::bounded(5)
            .with_exit_condition("n == 99")
            .unwrap();
        let ko = kernel(
            &[ClauseInput::new("once", "WHEN always THEN ADD n 1")
                .with_output("n")
                .with_firing(FiringMode::Once)],
            &[],
            Some(lc),
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        // After the single firing the pass goes quiescent with the exit
        // condition unreachable, which is a stall, not a bound error.
        assert!(!result.success);
        assert!(result.error.unwrap().contains("stalled"));
        assert_eq!(ctx.get("n"), Some(&ContextValue::Number(1.0)));
    }

    #[test]
    fn explicit_dependency_gates_on_firing_not_variables() {
        // "gated" declares an explicit dependency and no inputs; it must wait
        // for "first" to fire even though its own guard is immediately true.
        let ko = kernel(
            &[
                ClauseInput::new("gated", "WHEN always THEN SET b = 1")
                    .with_dependency("first")
                    .with_output("b"),
                ClauseInput::new("first", "WHEN seed == 1 THEN SET a = 1")
                    .with_input("seed")
                    .with_output("a"),
            ],
            &["a", "b"],
            None,
        );
        let mut ctx = ClauseContext::new().with("seed", 1.0);
        let result = Executor::new().execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(
            result.state.completed_nodes,
            vec!["first".to_string(), "gated".to_string()]
        );
    }

    #[test]
    fn call_without_action_executor_fails_the_node() {
        let ko = kernel(
            &[ClauseInput::new("call", "WHEN always THEN CALL fetch(url=\"https://x\")")
                .with_output("result")],
            &["result"],
            Some(LoopControl::bounded(3)),
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::new().execute(&ko, &mut ctx);

        // The node fails every pass. Failure is not quiescence, so the node
        // re-fires each pass until the bound is exhausted.
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Max iterations (3) exceeded"));
        let failures = result
            .state
            .events
            .iter()
            .filter(|e| matches!(e, ExecutionEvent::NodeFailed { .. }))
            .count();
        assert_eq!(failures, 3);
        assert!(result
            .state
            .events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::IterationLimitReached { bounds: 3 })));
    }

    #[test]
    fn failing_node_does_not_mask_a_genuine_stall() {
        struct FlakyThenNothing;
        impl ActionExecutor for FlakyThenNothing {
            fn call_tool(
                &self,
                tool: &str,
                _args: &HashMap<String, String>,
                _ctx: &ClauseContext,
            ) -> Result<String, ExecError> {
                Err(ExecError::ToolDelegation {
                    tool: tool.to_string(),
                    message: "unreachable".into(),
                })
            }
        }

        // Both guards go false once the seed flips the gate, so the pass
        // after the failure is truly quiescent and the stall is detected.
        let ko = kernel(
            &[
                ClauseInput::new("call", "WHEN gate != 1 THEN CALL fetch(url=\"https://x\")")
                    .with_output("result"),
                ClauseInput::new("seed", "WHEN gate != 1 THEN SET gate = 1").with_output("gate"),
            ],
            &["result"],
            Some(LoopControl::bounded(10)),
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::with_actions(Box::new(FlakyThenNothing)).execute(&ko, &mut ctx);

        assert!(!result.success);
        assert!(result.error.unwrap().contains("stalled"));
        assert!(result
            .state
            .events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::NodeFailed { .. })));
    }

    #[test]
    fn delegated_tool_result_lands_in_outputs() {
        struct Echo;
        impl ActionExecutor for Echo {
            fn call_tool(
                &self,
                tool: &str,
                args: &HashMap<String, String>,
                _ctx: &ClauseContext,
            ) -> Result<String, ExecError> {
                Ok(format!("{tool}:{}", args.get("url").cloned().unwrap_or_default()))
            }
        }

        let ko = kernel(
            &[ClauseInput::new("call", "WHEN always THEN CALL fetch(url=\"https://x\")")
                .with_output("result")],
            &["result"],
            None,
        );
        let mut ctx = ClauseContext::new();
        let result = Executor::with_actions(Box::new(Echo)).execute(&ko, &mut ctx);

        assert!(result.success);
        assert_eq!(
            ctx.get("result"),
            Some(&ContextValue::Text("fetch:https://x".into()))
        );
    }
}
