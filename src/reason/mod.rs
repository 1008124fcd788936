//! Plan-execute-reflect reasoning over the workflow core.
//!
//! The [`ReasoningEngine`] drives one request through understanding,
//! knowledge retrieval, planning, bounded execute/reflect/revise iteration,
//! and knowledge integration, producing an owned [`ReasoningOutcome`] with a
//! full [`ReasoningTrace`]. The kernel executor and reflex registry are
//! reachable from a session through the engine's bridge methods.

mod engine;
mod intent;
mod plan;
mod reflect;
mod trace;

pub use engine::{ReasoningConfig, ReasoningEngine, ReasoningEngineBuilder, ReasoningOutcome};
pub use intent::{Entity, EntityExtractor, Intent, KeywordEntityExtractor, classify_intent};
pub use plan::{AgentPlan, AgentPlanStep, bind_tool, build_plan, heuristic_steps};
pub use reflect::{Reflection, reflect, revise_plan};
pub use trace::{
    ReasoningContext, ReasoningStep, ReasoningTrace, TemporalContext, TraceEntry,
};
