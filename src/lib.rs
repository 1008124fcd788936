//! # sinew
//!
//! An embeddable adaptive workflow reasoning core: declarative clauses
//! compile into dependency-ordered kernel objects, a bounded executor runs
//! them against an owned context, reflex triggers adapt live kernels on
//! external events, and a plan-execute-reflect engine orchestrates whole
//! requests over pluggable tools, knowledge, and policy.
//!
//! ## Architecture
//!
//! - **Clause compiler** (`clause`, `expr`, `dag`, `kernel`): `WHEN`/`THEN`
//!   clauses → deterministic DAG → immutable kernel objects
//! - **Executor** (`exec`): bounded iteration with exit conditions and
//!   delegated tool calls
//! - **Reflex** (`reflex`): event-keyed runtime adaptation with minimal
//!   blast radius
//! - **Reasoning** (`reason`): understand → retrieve → plan → execute →
//!   reflect → integrate, behind a single-writer engine
//!
//! ## Library usage
//!
//! ```
//! use sinew::clause::ClauseInput;
//! use sinew::dag::build_dag;
//! use sinew::exec::Executor;
//! use sinew::kernel::{collapse_to_kernel, KernelKind, KernelRole};
//! use sinew::value::ClauseContext;
//!
//! let nodes = build_dag(&[
//!     ClauseInput::new("seed", "WHEN always THEN SET x = 1").with_output("x"),
//!     ClauseInput::new("double", "WHEN x == 1 THEN SET y = 2")
//!         .with_input("x")
//!         .with_output("y"),
//! ])
//! .unwrap();
//! let ko = collapse_to_kernel(
//!     nodes,
//!     "demo",
//!     KernelKind::Workflow,
//!     KernelRole::Agent,
//!     vec![],
//!     vec!["y".into()],
//!     None,
//!     None,
//! );
//! let mut ctx = ClauseContext::new();
//! assert!(Executor::new().execute(&ko, &mut ctx).success);
//! ```

pub mod capability;
pub mod clause;
pub mod dag;
pub mod error;
pub mod exec;
pub mod expr;
pub mod kernel;
pub mod knowledge;
pub mod policy;
pub mod reason;
pub mod reflex;
pub mod tool;
pub mod value;
