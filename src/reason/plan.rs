//! Plan construction with keyword → tool binding.
//!
//! Plans are lists of steps; a step either binds a tool by name or is a plain
//! "respond" step the engine answers directly. Warmed skeletons carry
//! descriptions only, so [`bind_tool`] also runs at execution time for them
//! (late binding against whatever tools are registered then).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One plan step. `tool` of `None` means the engine responds directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPlanStep {
    pub description: String,
    pub tool: Option<String>,
    pub args: HashMap<String, String>,
    /// True when the tool binding was deferred to execution time.
    pub late_bound: bool,
}

impl AgentPlanStep {
    pub fn respond(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tool: None,
            args: HashMap::new(),
            late_bound: false,
        }
    }

    pub fn with_tool(description: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tool: Some(tool.into()),
            args: HashMap::new(),
            late_bound: false,
        }
    }
}

/// A full plan plus a note on how it was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentPlan {
    pub steps: Vec<AgentPlanStep>,
    /// "keyword", "capability", or "warmed".
    pub strategy: String,
}

impl AgentPlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Pick a registered tool for a step description by keyword, if any fits.
///
/// The binding looks for a tool whose name contains the matched concern, so
/// hosts can register e.g. "task_create" or "my_calendar" and still bind.
pub fn bind_tool(description: &str, available: &[&str]) -> Option<String> {
    let lower = description.to_lowercase();
    let concern: &[&str] = if ["fetch", "http", "api", "url", "download"]
        .iter()
        .any(|w| lower.contains(w))
    {
        &["http", "fetch"]
    } else if ["save", "write", "file", "export"].iter().any(|w| lower.contains(w)) {
        &["file"]
    } else if ["task", "todo"].iter().any(|w| lower.contains(w)) {
        &["task"]
    } else if ["calendar", "event", "schedule", "meeting", "appointment"]
        .iter()
        .any(|w| lower.contains(w))
    {
        &["calendar"]
    } else {
        return None;
    };

    available
        .iter()
        .find(|name| concern.iter().any(|c| name.to_lowercase().contains(c)))
        .map(|name| name.to_string())
}

/// Build a plan from capability-proposed or heuristic step descriptions.
/// Steps that bind no tool become respond steps.
pub fn build_plan(descriptions: Vec<String>, available: &[&str], strategy: &str) -> AgentPlan {
    let steps = descriptions
        .into_iter()
        .map(|description| match bind_tool(&description, available) {
            Some(tool) => AgentPlanStep::with_tool(description, tool),
            None => AgentPlanStep::respond(description),
        })
        .collect();
    AgentPlan {
        steps,
        strategy: strategy.to_string(),
    }
}

/// Heuristic step descriptions for a query when no capability backend or
/// warmed workflow supplies them. Always yields at least one step.
pub fn heuristic_steps(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut steps = Vec::new();
    if ["fetch", "http", "api", "url", "download"].iter().any(|w| lower.contains(w)) {
        steps.push(format!("fetch external data for: {query}"));
    }
    if ["save", "write", "file", "export"].iter().any(|w| lower.contains(w)) {
        steps.push(format!("write results to file for: {query}"));
    }
    if ["task", "todo"].iter().any(|w| lower.contains(w)) {
        steps.push(format!("manage tasks for: {query}"));
    }
    if ["calendar", "event", "schedule", "meeting", "appointment"]
        .iter()
        .any(|w| lower.contains(w))
    {
        steps.push(format!("manage calendar for: {query}"));
    }
    steps.push(format!("respond to: {query}"));
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_registered_tool_names() {
        let available = ["http_fetch", "file_write", "task_create"];
        assert_eq!(
            bind_tool("fetch external data", &available),
            Some("http_fetch".to_string())
        );
        assert_eq!(
            bind_tool("write results to file", &available),
            Some("file_write".to_string())
        );
        assert_eq!(
            bind_tool("manage tasks", &available),
            Some("task_create".to_string())
        );
    }

    #[test]
    fn binding_declines_without_a_matching_tool() {
        assert_eq!(bind_tool("manage calendar", &["http_fetch"]), None);
        assert_eq!(bind_tool("just a chat", &["http_fetch"]), None);
    }

    #[test]
    fn heuristic_plans_always_end_with_a_respond_step() {
        let steps = heuristic_steps("hello");
        assert_eq!(steps.len(), 1);
        assert!(steps[0].starts_with("respond"));

        let steps = heuristic_steps("fetch the API and save to file");
        assert_eq!(steps.len(), 3);
        assert!(steps.last().unwrap().starts_with("respond"));
    }

    #[test]
    fn unbindable_steps_become_respond_steps() {
        let plan = build_plan(
            vec!["manage calendar for: standup".into(), "respond to: standup".into()],
            &["http_fetch"],
            "keyword",
        );
        assert!(plan.steps.iter().all(|s| s.tool.is_none()));
        assert_eq!(plan.strategy, "keyword");
    }
}
