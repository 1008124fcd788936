//! Rich diagnostic error types for the sinew core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so hosts embedding the
//! core know exactly what went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the sinew core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the embedding host.
#[derive(Debug, Error, Diagnostic)]
pub enum SinewError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reflex(#[from] ReflexError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reason(#[from] ReasonError),
}

// ---------------------------------------------------------------------------
// Compile errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing clauses or building the dependency graph.
///
/// These are the only unrecoverable faults in the core: malformed input must
/// fail fast before any execution begins.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    #[error("dependency cycle among clauses: {ids}")]
    #[diagnostic(
        code(sinew::compile::cycle),
        help(
            "Clause dependencies (explicit or implied by input/output variables) \
             form a cycle. Break the cycle by removing a dependency or splitting \
             the shared variable into separate read/write names."
        )
    )]
    Cycle { ids: String },

    #[error("duplicate clause id: \"{id}\"")]
    #[diagnostic(
        code(sinew::compile::duplicate_clause),
        help("Every clause in a compilation unit must have a unique id.")
    )]
    DuplicateClause { id: String },

    #[error("clause \"{id}\" depends on unknown clause \"{dependency}\"")]
    #[diagnostic(
        code(sinew::compile::unknown_dependency),
        help("Explicit dependencies must reference clause ids present in the same clause set.")
    )]
    UnknownDependency { id: String, dependency: String },

    #[error("cannot parse clause: {message}")]
    #[diagnostic(
        code(sinew::compile::parse),
        help("Clauses follow the form `WHEN <condition> THEN <action>`. {message}")
    )]
    Parse { message: String },

    #[error("invalid condition \"{expression}\": {message}")]
    #[diagnostic(
        code(sinew::compile::invalid_condition),
        help(
            "Conditions are `<operand> <op> <operand>` with ops == != < <= > >=, \
             or the constants `always` / `never`. Operands are variable names or \
             literals (number, quoted string, true, false)."
        )
    )]
    InvalidCondition { expression: String, message: String },

    #[error("invalid action \"{expression}\": {message}")]
    #[diagnostic(
        code(sinew::compile::invalid_action),
        help(
            "Actions are `SET <var> = <value>`, `ADD <var> <number>`, or \
             `CALL <tool>(key=value, ...)`."
        )
    )]
    InvalidAction { expression: String, message: String },
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the action-delegation seam of the kernel executor.
///
/// The executor itself never propagates a fault past one `execute` call;
/// bound exhaustion and stalls are reported through `ExecutionResult`, not
/// through this type.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("no action executor configured — cannot delegate tool call \"{tool}\"")]
    #[diagnostic(
        code(sinew::exec::no_action_executor),
        help(
            "The kernel contains a CALL action but the executor was built without \
             an ActionExecutor. Use `Executor::with_actions(...)`."
        )
    )]
    NoActionExecutor { tool: String },

    #[error("tool delegation failed: {tool} — {message}")]
    #[diagnostic(
        code(sinew::exec::tool_delegation),
        help("The caller-supplied action executor reported an error for this tool call.")
    )]
    ToolDelegation { tool: String, message: String },
}

// ---------------------------------------------------------------------------
// Reflex errors
// ---------------------------------------------------------------------------

/// Errors raised while adapting a kernel in response to an external event.
#[derive(Debug, Error, Diagnostic)]
pub enum ReflexError {
    #[error("trigger for event \"{event_type}\" targets unknown clause \"{clause_id}\"")]
    #[diagnostic(
        code(sinew::reflex::unknown_target),
        help(
            "The kernel's trigger map names a clause id that is not in its \
             replacement clause set. Add the replacement clause to `ReflexTriggers`."
        )
    )]
    UnknownTargetClause {
        event_type: String,
        clause_id: String,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),
}

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

/// Errors raised by tool collaborators and the coarse capability gate.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("tool not found: \"{name}\"")]
    #[diagnostic(
        code(sinew::tool::not_found),
        help("Register the tool first or check available tools with `ToolRegistry::list()`.")
    )]
    NotFound { name: String },

    #[error("policy denied tool \"{tool}\": {reason}")]
    #[diagnostic(
        code(sinew::tool::policy_denied),
        help(
            "The ToolPolicy capability gate refused this call. Adjust the policy's \
             I/O toggles or allowlists if the call should be permitted."
        )
    )]
    PolicyDenied { tool: String, reason: String },

    #[error("tool \"{tool}\" missing required argument \"{name}\"")]
    #[diagnostic(
        code(sinew::tool::missing_argument),
        help("Check the tool's documented arguments and supply the missing one.")
    )]
    MissingArgument { tool: String, name: String },

    #[error("network error in tool \"{tool}\": {message}")]
    #[diagnostic(
        code(sinew::tool::network),
        help("The HTTP request failed. Check the URL, connectivity, and timeout.")
    )]
    Network { tool: String, message: String },

    #[error("I/O error in tool \"{tool}\": {message}")]
    #[diagnostic(
        code(sinew::tool::io),
        help("The filesystem operation failed. Check the path and permissions.")
    )]
    Io { tool: String, message: String },

    #[error("invalid tool policy: {message}")]
    #[diagnostic(
        code(sinew::tool::invalid_policy),
        help("The policy document could not be parsed. Check the TOML syntax and field names.")
    )]
    InvalidPolicy { message: String },
}

// ---------------------------------------------------------------------------
// Reasoning errors
// ---------------------------------------------------------------------------

/// Errors specific to the reasoning engine orchestrator.
///
/// Step-level failures (tool errors, policy denials) are recovered inside the
/// loop and never surface here; this type covers faults of the engine itself.
#[derive(Debug, Error, Diagnostic)]
pub enum ReasonError {
    #[error("reasoning engine state poisoned by a panicked request")]
    #[diagnostic(
        code(sinew::reason::poisoned),
        help(
            "A previous request panicked while holding the engine's critical \
             section. Rebuild the engine; its collaborators are unaffected."
        )
    )]
    Poisoned,
}

/// Convenience alias for functions returning sinew results.
pub type SinewResult<T> = std::result::Result<T, SinewError>;
