//! Expression nodes.
//!
//! An [`Expr`] is a cheap handle (`Arc`) to an immutable [`ExprNode`]. The
//! node's type, scope and missingness rule are fixed when it is built; the
//! composition functions in [`crate::build`] and [`crate::agg`] are the only
//! way to obtain one, so every node in existence has passed type and scope
//! checking.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lazytab_core::missing::MissingRule;
use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::{Axis, Scope};
use lazytab_core::types::ValueType;
use lazytab_core::value::Datum;

use crate::ops::{AggOp, BinaryOp, UnaryOp};

/// What a [`ExprKind::Construct`] node builds from its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Array,
    Set,
    /// Arguments alternate key, value.
    Mapping,
    Tuple,
    /// Field names, one per argument.
    Struct(Vec<String>),
    /// Arguments are start and end.
    Interval {
        includes_start: bool,
        includes_end: bool,
    },
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Datum),
    Field {
        dataset: DatasetRef,
        name: String,
    },
    Unary {
        op: UnaryOp,
        arg: Expr,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
    },
    /// Widening cast to the node's type.
    Cast {
        arg: Expr,
    },
    If {
        cond: Expr,
        then: Expr,
        otherwise: Expr,
    },
    OrMissing {
        pred: Expr,
        value: Expr,
    },
    Coalesce(Vec<Expr>),
    Aggregate {
        op: AggOp,
        axis: Axis,
        arg: Expr,
    },
    Construct {
        kind: ContainerKind,
        args: Vec<Expr>,
    },
    GetField {
        arg: Expr,
        index: usize,
        name: String,
    },
    GetItem {
        arg: Expr,
        index: usize,
    },
}

#[derive(Debug)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: ValueType,
    pub scope: Scope,
    pub rule: MissingRule,
}

/// Releases uniquely owned descendants from a heap worklist, so dropping a
/// deep chain never recurses once per level.
impl Drop for ExprNode {
    fn drop(&mut self) {
        let mut pending = take_children(&mut self.kind);
        while let Some(e) = pending.pop() {
            if let Some(mut node) = Arc::into_inner(e.0) {
                pending.extend(take_children(&mut node.kind));
            }
        }
    }
}

fn take_children(kind: &mut ExprKind) -> Vec<Expr> {
    if matches!(kind, ExprKind::Literal(_) | ExprKind::Field { .. }) {
        return vec![];
    }
    match std::mem::replace(kind, ExprKind::Literal(None)) {
        ExprKind::Literal(_) | ExprKind::Field { .. } => vec![],
        ExprKind::Unary { arg, .. }
        | ExprKind::Cast { arg }
        | ExprKind::Aggregate { arg, .. }
        | ExprKind::GetField { arg, .. }
        | ExprKind::GetItem { arg, .. } => vec![arg],
        ExprKind::Binary { left, right, .. } => vec![left, right],
        ExprKind::If {
            cond,
            then,
            otherwise,
        } => vec![cond, then, otherwise],
        ExprKind::OrMissing { pred, value } => vec![pred, value],
        ExprKind::Coalesce(args) | ExprKind::Construct { args, .. } => args,
    }
}

#[derive(Clone)]
pub struct Expr(Arc<ExprNode>);

/// Shallow: the operator and type only, so deep graphs print in bounded space.
impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({} : {})", self.label(), self.ty())
    }
}

impl Expr {
    pub(crate) fn from_parts(
        kind: ExprKind,
        ty: ValueType,
        scope: Scope,
        rule: MissingRule,
    ) -> Expr {
        Expr(Arc::new(ExprNode {
            kind,
            ty,
            scope,
            rule,
        }))
    }

    pub fn node(&self) -> &ExprNode {
        &self.0
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    pub fn ty(&self) -> &ValueType {
        &self.0.ty
    }

    pub fn scope(&self) -> &Scope {
        &self.0.scope
    }

    pub fn rule(&self) -> MissingRule {
        self.0.rule
    }

    /// Identity of the underlying node; shared subexpressions have equal addresses.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Operands in evaluation order.
    pub fn children(&self) -> Vec<&Expr> {
        match &self.0.kind {
            ExprKind::Literal(_) | ExprKind::Field { .. } => vec![],
            ExprKind::Unary { arg, .. }
            | ExprKind::Cast { arg }
            | ExprKind::Aggregate { arg, .. }
            | ExprKind::GetField { arg, .. }
            | ExprKind::GetItem { arg, .. } => vec![arg],
            ExprKind::Binary { left, right, .. } => vec![left, right],
            ExprKind::If {
                cond,
                then,
                otherwise,
            } => vec![cond, then, otherwise],
            ExprKind::OrMissing { pred, value } => vec![pred, value],
            ExprKind::Coalesce(args) | ExprKind::Construct { args, .. } => args.iter().collect(),
        }
    }

    /// Number of distinct nodes reachable from here; shared nodes count once.
    pub fn node_count(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if seen.insert(e.addr()) {
                stack.extend(e.children());
            }
        }
        seen.len()
    }

    /// Fields this expression reads, as `(dataset, field)` pairs, deduplicated.
    pub fn referenced_fields(&self) -> Vec<(DatasetRef, String)> {
        let mut out: Vec<(DatasetRef, String)> = vec![];
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if !seen.insert(e.addr()) {
                continue;
            }
            if let ExprKind::Field { dataset, name } = e.kind() {
                if !out.iter().any(|(d, n)| d == dataset && n == name) {
                    out.push((dataset.clone(), name.clone()));
                }
            }
            stack.extend(e.children());
        }
        out
    }

    /// Structural equality: same operators, types and leaves.
    pub fn same_as(&self, other: &Expr) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if a.ptr_eq(b) || !seen.insert((a.addr(), b.addr())) {
                continue;
            }
            if a.ty() != b.ty() || !a.same_head(b) {
                return false;
            }
            let (ca, cb) = (a.children(), b.children());
            if ca.len() != cb.len() {
                return false;
            }
            stack.extend(ca.into_iter().zip(cb));
        }
        true
    }

    /// Operator equality, ignoring operands.
    fn same_head(&self, other: &Expr) -> bool {
        match (self.kind(), other.kind()) {
            (ExprKind::Literal(a), ExprKind::Literal(b)) => a == b,
            (
                ExprKind::Field { dataset, name },
                ExprKind::Field {
                    dataset: d2,
                    name: n2,
                },
            ) => dataset == d2 && name == n2,
            (ExprKind::Unary { op, .. }, ExprKind::Unary { op: o2, .. }) => op == o2,
            (ExprKind::Binary { op, .. }, ExprKind::Binary { op: o2, .. }) => op == o2,
            (ExprKind::Cast { .. }, ExprKind::Cast { .. })
            | (ExprKind::If { .. }, ExprKind::If { .. })
            | (ExprKind::OrMissing { .. }, ExprKind::OrMissing { .. })
            | (ExprKind::Coalesce(_), ExprKind::Coalesce(_)) => true,
            (
                ExprKind::Aggregate { op, axis, .. },
                ExprKind::Aggregate {
                    op: o2, axis: x2, ..
                },
            ) => op == o2 && axis == x2,
            (ExprKind::Construct { kind, .. }, ExprKind::Construct { kind: k2, .. }) => kind == k2,
            (ExprKind::GetField { index, .. }, ExprKind::GetField { index: i2, .. })
            | (ExprKind::GetItem { index, .. }, ExprKind::GetItem { index: i2, .. }) => index == i2,
            _ => false,
        }
    }

    /// Whether this is a literal node, and its value if so.
    pub fn as_literal(&self) -> Option<&Datum> {
        match self.kind() {
            ExprKind::Literal(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{lit, FieldRef};
    use lazytab_core::schema::DatasetSchema;

    #[test]
    fn shared_subexpressions_count_once() {
        let ds = DatasetRef::new(DatasetSchema::table("t").with_field(
            "x",
            ValueType::Int32,
            &["row"],
        ))
        .unwrap();
        let x = ds.field("x").unwrap();
        let sq = x.mul(&x).unwrap();
        let twice = sq.add(&sq).unwrap();
        // field, mul, add
        assert_eq!(twice.node_count(), 3);
        assert_eq!(twice.referenced_fields().len(), 1);
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let a = lit(1).unwrap().add(2).unwrap();
        let b = lit(1).unwrap().add(2).unwrap();
        assert!(!a.ptr_eq(&b));
        assert!(a.same_as(&b));
        assert!(!a.same_as(&lit(1).unwrap().add(3).unwrap()));
    }

    fn chain(depth: usize) -> Expr {
        let mut e = lit(0i64).unwrap();
        for _ in 0..depth {
            e = e.add(1i64).unwrap();
        }
        e
    }

    #[test]
    fn deep_chains_compare_and_drop_without_recursion() {
        let a = chain(100_000);
        let b = chain(100_000);
        assert!(a.same_as(&b));
        assert_eq!(a.node_count(), 200_001);
        assert!(format!("{a:?}").starts_with("Expr(add : int64)"));
        drop(a);
        drop(b);
    }

    #[test]
    fn dropping_a_handle_keeps_shared_children_alive() {
        let x = lit(2).unwrap();
        let sum = x.add(&x).unwrap();
        drop(sum);
        assert_eq!(x.as_literal(), Some(&Some(lazytab_core::value::Value::Int32(2))));
    }
}
