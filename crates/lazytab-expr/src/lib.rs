#![forbid(unsafe_code)]
//! lazytab-expr: the expression graph.
//!
//! Every composition function validates operand types and scopes on the spot
//! and returns a new immutable node; nothing here reads data. Nodes are
//! reference-counted, so common subexpressions are shared freely across
//! graphs and threads.

pub mod agg;
pub mod build;
pub mod expr;
pub mod format;
pub mod ops;

pub use build::{
    array, coalesce, if_else, interval, lit, lit_json, lit_typed, mapping, missing, or_missing,
    set, structure, tuple, FieldRef, IntoExpr,
};
pub use expr::{ContainerKind, Expr, ExprKind, ExprNode};
pub use ops::{AggOp, BinaryOp, UnaryOp};
