#![forbid(unsafe_code)]
//! lazytab-planner: expression graph → `CompiledPlan`.
//!
//! Lowering flattens an [`Expr`](lazytab_expr::Expr) into an arena of plan
//! nodes in topological order (children first). Shared subexpressions are
//! lowered once, keyed by node identity. The plan also records which fields
//! each axis group must stream, the streaming strategy of the result, and a blake3
//! fingerprint that is stable across runs for the same expression.

pub mod explain;
pub mod lower;
pub mod plan;

pub use explain::explain;
pub use lower::lower;
pub use plan::{CompiledPlan, PlanNode, PlanOp};
