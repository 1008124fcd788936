//! Reflection arithmetic and plan revision.

use serde::{Deserialize, Serialize};

use super::plan::{AgentPlan, AgentPlanStep};

/// Outcome of one reflection pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    pub success_rate: f64,
    pub goals_achieved: bool,
    pub should_terminate: bool,
}

/// Score progress so far against the plan.
///
/// Termination triggers on goals achieved, or on errors reaching the planned
/// step count (every step failed; retrying the same plan cannot help).
pub fn reflect(messages: usize, errors: usize, planned_steps: usize) -> Reflection {
    let success_rate = if planned_steps == 0 {
        0.0
    } else {
        messages.saturating_sub(errors) as f64 / planned_steps as f64
    };
    let goals_achieved = success_rate > 0.8 && errors == 0;
    Reflection {
        success_rate,
        goals_achieved,
        should_terminate: goals_achieved || (planned_steps > 0 && errors >= planned_steps),
    }
}

/// Derive a revised plan from the errors of the last execution.
///
/// Extension point with a deliberately weak contract: returning `None` means
/// no revision is available and the loop stops even though reflection did not
/// ask for termination. The built-in revision retries failed tool steps as
/// plain respond steps, once.
pub fn revise_plan(plan: &AgentPlan, errors: &[String]) -> Option<AgentPlan> {
    if errors.is_empty() || plan.strategy == "revised" {
        return None;
    }
    let steps: Vec<AgentPlanStep> = plan
        .steps
        .iter()
        .filter(|s| s.tool.is_some())
        .map(|s| AgentPlanStep::respond(format!("describe a manual fallback for: {}", s.description)))
        .collect();
    if steps.is_empty() {
        return None;
    }
    Some(AgentPlan {
        steps,
        strategy: "revised".to_string(),
    })
}
