//! The reasoning engine: plan-execute-reflect orchestration.
//!
//! One engine serves many requests, but processes them one at a time: all
//! collaborator state lives behind a `std::sync::Mutex` and each request
//! holds the lock for its whole critical section. Contexts, traces, and
//! outcomes are exclusively owned per request and never shared.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::capability::{Capability, NullCapability};
use crate::error::{ExecError, ReasonError, SinewResult};
use crate::exec::{ActionExecutor, ExecutionResult, Executor};
use crate::kernel::KernelObject;
use crate::knowledge::{
    KnowledgeStore, MemoryKnowledgeStore, WarmedWorkflow, WarmedWorkflowCache,
};
use crate::policy::{ActionPolicy, PolicyDecision, ToolPolicy};
use crate::reflex::{ReflexEvent, ReflexHandleResult, ReflexRegistry};
use crate::tool::ToolRegistry;
use crate::value::ClauseContext;

use super::intent::{EntityExtractor, KeywordEntityExtractor, classify_intent};
use super::plan::{AgentPlan, AgentPlanStep, bind_tool, build_plan, heuristic_steps};
use super::reflect::{reflect, revise_plan};
use super::trace::{ReasoningContext, ReasoningStep, ReasoningTrace, TemporalContext};

/// Loop limits for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReasoningConfig {
    /// Maximum plan-execute-reflect iterations per request.
    pub max_iterations: u32,
    /// Maximum knowledge items retrieved before planning.
    pub max_knowledge_items: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_knowledge_items: 5,
        }
    }
}

/// Everything a finished request hands back.
#[derive(Debug, Clone)]
pub struct ReasoningOutcome {
    pub messages: Vec<String>,
    pub errors: Vec<String>,
    pub trace: ReasoningTrace,
    pub context: ReasoningContext,
    pub goals_achieved: bool,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles an engine from its collaborators. Every field has a working
/// default, so `ReasoningEngine::new()` is usable out of the box.
pub struct ReasoningEngineBuilder {
    tools: ToolRegistry,
    knowledge: Box<dyn KnowledgeStore>,
    policy: ToolPolicy,
    action_policy: Option<Box<dyn ActionPolicy>>,
    capability: Box<dyn Capability>,
    extractor: Box<dyn EntityExtractor>,
    config: ReasoningConfig,
}

impl Default for ReasoningEngineBuilder {
    fn default() -> Self {
        Self {
            tools: ToolRegistry::new(),
            knowledge: Box::new(MemoryKnowledgeStore::new()),
            policy: ToolPolicy::default(),
            action_policy: None,
            capability: Box::new(NullCapability),
            extractor: Box::new(KeywordEntityExtractor),
            config: ReasoningConfig::default(),
        }
    }
}

impl ReasoningEngineBuilder {
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn knowledge(mut self, knowledge: Box<dyn KnowledgeStore>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn policy(mut self, policy: ToolPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn action_policy(mut self, action_policy: Box<dyn ActionPolicy>) -> Self {
        self.action_policy = Some(action_policy);
        self
    }

    pub fn capability(mut self, capability: Box<dyn Capability>) -> Self {
        self.capability = capability;
        self
    }

    pub fn entity_extractor(mut self, extractor: Box<dyn EntityExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(mut self, config: ReasoningConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ReasoningEngine {
        info!(
            tools = self.tools.len(),
            max_iterations = self.config.max_iterations,
            "reasoning engine built"
        );
        ReasoningEngine {
            inner: Mutex::new(EngineInner {
                tools: Arc::new(self.tools),
                knowledge: self.knowledge,
                policy: self.policy,
                action_policy: self.action_policy,
                capability: self.capability,
                extractor: self.extractor,
                warmed: WarmedWorkflowCache::new(),
                reflex: ReflexRegistry::new(),
                config: self.config,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct EngineInner {
    tools: Arc<ToolRegistry>,
    knowledge: Box<dyn KnowledgeStore>,
    policy: ToolPolicy,
    action_policy: Option<Box<dyn ActionPolicy>>,
    capability: Box<dyn Capability>,
    extractor: Box<dyn EntityExtractor>,
    warmed: WarmedWorkflowCache,
    reflex: ReflexRegistry,
    config: ReasoningConfig,
}

/// The embeddable reasoning core.
pub struct ReasoningEngine {
    inner: Mutex<EngineInner>,
}

impl Default for ReasoningEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningEngine {
    /// An engine with default collaborators and no registered tools.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ReasoningEngineBuilder {
        ReasoningEngineBuilder::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineInner>, ReasonError> {
        self.inner.lock().map_err(|_| ReasonError::Poisoned)
    }

    /// Process one request through the full loop: understand, retrieve,
    /// plan, then execute/reflect/revise up to the iteration bound, and
    /// finally integrate the outcome back into the knowledge store.
    pub fn reason(&self, query: &str) -> Result<ReasoningOutcome, ReasonError> {
        self.reason_with_preferences(query, HashMap::new())
    }

    /// Like [`reason`](Self::reason), with host-supplied user preferences
    /// carried on the request context.
    pub fn reason_with_preferences(
        &self,
        query: &str,
        preferences: HashMap<String, String>,
    ) -> Result<ReasoningOutcome, ReasonError> {
        let inner = self.lock()?;
        Ok(inner.run_request(query, preferences))
    }

    /// Execute a compiled kernel within this engine's tool and policy
    /// environment. `CALL` actions route through the registered tools under
    /// the coarse policy.
    pub fn execute_kernel(
        &self,
        ko: &KernelObject,
        ctx: &mut ClauseContext,
    ) -> Result<ExecutionResult, ReasonError> {
        let inner = self.lock()?;
        let executor = Executor::with_actions(Box::new(RegistryActions {
            tools: Arc::clone(&inner.tools),
            policy: inner.policy.clone(),
        }));
        Ok(executor.execute(ko, ctx))
    }

    /// Read a kernel's trigger map into the engine's reflex registry.
    pub fn register_reflex_triggers(&self, ko: &KernelObject) -> Result<(), ReasonError> {
        self.lock()?.reflex.register_triggers(ko);
        Ok(())
    }

    /// Deliver an external event against a live kernel, producing an adapted
    /// kernel when a trigger matches. The caller owns the swap decision.
    /// Without a live kernel the result is a plain non-triggered one, same
    /// as an unregistered event type.
    pub fn handle_reflex_event(
        &self,
        event: &ReflexEvent,
        ctx: &ClauseContext,
        ko: Option<&KernelObject>,
    ) -> SinewResult<ReflexHandleResult> {
        let inner = self.lock()?;
        Ok(inner.reflex.handle_event(event, ctx, ko)?)
    }

    /// Cache a warmed workflow for an input, replacing any existing entry.
    pub fn warm_workflow(&self, input: &str, workflow: WarmedWorkflow) -> Result<(), ReasonError> {
        self.lock()?.warmed.insert(input, workflow);
        Ok(())
    }

    /// Drop the warmed workflow for an input, if present.
    pub fn evict_warmed(&self, input: &str) -> Result<bool, ReasonError> {
        Ok(self.lock()?.warmed.evict(input))
    }
}

impl EngineInner {
    fn run_request(&self, query: &str, preferences: HashMap<String, String>) -> ReasoningOutcome {
        let mut trace = ReasoningTrace::new();
        let mut messages = Vec::new();
        let mut errors = Vec::new();

        // Understand.
        let intent = self
            .capability
            .understand_scheduling_intent(query)
            .unwrap_or_else(|| classify_intent(query));
        let context = ReasoningContext {
            intent,
            entities: self.extractor.extract(query),
            temporal: TemporalContext::default(),
            preferences,
        };
        trace.record(
            ReasoningStep::Understanding,
            format!("intent: {intent}, entities: {}", context.entities.len()),
        );
        debug!(%intent, entities = context.entities.len(), "understood request");

        // Retrieve knowledge, or substitute a warmed workflow.
        let warmed = self.warmed.lookup(query);
        let (knowledge, skeleton) = match &warmed {
            Some(wf) => {
                trace.record(
                    ReasoningStep::Understanding,
                    format!("warmed workflow hit: {} steps", wf.step_skeleton.len()),
                );
                (wf.knowledge.clone(), Some(wf.step_skeleton.clone()))
            }
            None => (
                self.knowledge
                    .retrieve_relevant(query, &context, self.config.max_knowledge_items),
                None,
            ),
        };

        // Plan.
        let available = self.tools.list();
        let mut plan = match skeleton {
            Some(steps) => {
                let mut plan = build_plan(steps, &available, "warmed");
                // Skeletons carry descriptions only; their tool bindings are
                // resolved against whatever is registered right now.
                for step in &mut plan.steps {
                    step.late_bound = true;
                }
                plan
            }
            None => match self.capability.generate_plan(query, &knowledge) {
                Some(steps) => build_plan(steps, &available, "capability"),
                None => build_plan(heuristic_steps(query), &available, "keyword"),
            },
        };
        trace.record(
            ReasoningStep::Planning,
            format!("{} steps via {}", plan.len(), plan.strategy),
        );

        // Execute / reflect / revise. Reflection scores cumulative progress
        // against the current plan, so an error in any iteration blocks goal
        // achievement for the whole request.
        let mut goals_achieved = false;
        for iteration in 0..self.config.max_iterations {
            let (iter_messages, iter_errors) = self.run_plan(&plan, &context, &mut trace);
            messages.extend(iter_messages);
            errors.extend(iter_errors);

            let reflection = reflect(messages.len(), errors.len(), plan.len());
            let summary = self
                .capability
                .reflect(&messages, &errors)
                .unwrap_or_else(|| {
                    format!(
                        "iteration {iteration}: success rate {:.2}, {} errors",
                        reflection.success_rate,
                        errors.len()
                    )
                });
            trace.record(ReasoningStep::Reflection, summary);

            if reflection.should_terminate {
                goals_achieved = reflection.goals_achieved;
                break;
            }
            match revise_plan(&plan, &errors) {
                Some(revised) => {
                    trace.record(
                        ReasoningStep::PlanRevision,
                        format!("revised to {} steps", revised.len()),
                    );
                    plan = revised;
                }
                // No revision available: stop even though reflection did not
                // ask for termination.
                None => break,
            }
        }

        // Integrate, unconditionally.
        self.knowledge.integrate(query, &messages, &trace);
        trace.record(
            ReasoningStep::KnowledgeIntegration,
            format!("{} messages integrated", messages.len()),
        );
        trace.seal();

        info!(
            query,
            messages = messages.len(),
            errors = errors.len(),
            goals_achieved,
            "request complete"
        );
        ReasoningOutcome {
            messages,
            errors,
            trace,
            context,
            goals_achieved,
        }
    }

    /// Run every step of the plan once. Step failures are recovered in
    /// place; nothing here aborts the request.
    fn run_plan(
        &self,
        plan: &AgentPlan,
        context: &ReasoningContext,
        trace: &mut ReasoningTrace,
    ) -> (Vec<String>, Vec<String>) {
        let mut messages = Vec::new();
        let mut errors = Vec::new();

        for step in &plan.steps {
            let tool = match &step.tool {
                Some(name) => Some(name.clone()),
                // A late-bound step may still bind if tools were registered
                // after the skeleton was warmed.
                None if step.late_bound => bind_tool(&step.description, &self.tools.list()),
                None => None,
            };

            match tool {
                Some(name) => {
                    if let Some(gate) = &self.action_policy {
                        if let PolicyDecision::Denied { reason } =
                            gate.evaluate(&name, &step.args, context)
                        {
                            warn!(tool = %name, %reason, "step denied by action policy");
                            messages.push(format!("Skipped \"{}\": {reason}", step.description));
                            trace.record(
                                ReasoningStep::Execution,
                                format!("denied: {} ({reason})", step.description),
                            );
                            continue;
                        }
                    }
                    match self.tools.call(&name, &step.args, &self.policy) {
                        Ok(output) => {
                            messages.push(output);
                            trace.record(
                                ReasoningStep::Execution,
                                format!("tool {name}: {}", step.description),
                            );
                        }
                        Err(e) => {
                            warn!(tool = %name, error = %e, "tool step failed");
                            errors.push(e.to_string());
                            messages.push(format!(
                                "Could not complete \"{}\": {e}",
                                step.description
                            ));
                            trace.record(
                                ReasoningStep::Execution,
                                format!("tool {name} failed: {e}"),
                            );
                        }
                    }
                }
                None => {
                    messages.push(respond(step, context));
                    trace.record(ReasoningStep::Execution, step.description.clone());
                }
            }
        }
        (messages, errors)
    }
}

/// Synthesize a direct response for a tool-free step.
fn respond(step: &AgentPlanStep, context: &ReasoningContext) -> String {
    format!(
        "[{}] {}",
        context.intent,
        step.description.trim_start_matches("respond to: ")
    )
}

/// Bridges kernel `CALL` actions to the engine's tool registry under the
/// coarse policy.
struct RegistryActions {
    tools: Arc<ToolRegistry>,
    policy: ToolPolicy,
}

impl ActionExecutor for RegistryActions {
    fn call_tool(
        &self,
        tool: &str,
        args: &HashMap<String, String>,
        _ctx: &ClauseContext,
    ) -> Result<String, ExecError> {
        self.tools
            .call(tool, args, &self.policy)
            .map_err(|e| ExecError::ToolDelegation {
                tool: tool.to_string(),
                message: e.to_string(),
            })
    }
}
