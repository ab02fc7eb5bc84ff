//! Lowering: `Expr` graph → `CompiledPlan`.
//!
//! A post-order walk assigns dense `NodeId`s, so children always precede their
//! parents in the arena. Nodes reached through more than one path are lowered
//! once, keyed by the identity of the expression node.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use lazytab_core::error::Result;
use lazytab_core::hash::hash_serde;
use lazytab_core::id::NodeId;
use lazytab_core::schema::DatasetSchema;
use lazytab_core::scope::AxisSet;
use lazytab_expr::{Expr, ExprKind};

use crate::plan::{CompiledPlan, PlanNode, PlanOp};

#[derive(Default)]
struct Lowering {
    nodes: Vec<PlanNode>,
    memo: HashMap<usize, NodeId>,
    field_groups: BTreeMap<AxisSet, Vec<String>>,
}

impl Lowering {
    /// Post-order walk with an explicit stack; graph depth never reaches the
    /// call stack. Returns the root's id, which is always lowered last.
    fn lower_graph(&mut self, root: &Expr) -> NodeId {
        let mut stack: Vec<(&Expr, bool)> = vec![(root, false)];
        while let Some((e, expanded)) = stack.pop() {
            if self.memo.contains_key(&e.addr()) {
                continue;
            }
            if expanded {
                self.push(e);
                continue;
            }
            stack.push((e, true));
            for c in e.children().into_iter().rev() {
                if !self.memo.contains_key(&c.addr()) {
                    stack.push((c, false));
                }
            }
        }
        NodeId::new(self.nodes.len().saturating_sub(1) as u32)
    }

    fn push(&mut self, e: &Expr) {
        // children were lowered before their parent
        let children: Vec<NodeId> = e
            .children()
            .into_iter()
            .filter_map(|c| self.memo.get(&c.addr()).copied())
            .collect();
        let op = match e.kind() {
            ExprKind::Literal(d) => PlanOp::Literal(d.clone()),
            ExprKind::Field { name, .. } => {
                let group = e.scope().axes().clone();
                let fields = self.field_groups.entry(group.clone()).or_default();
                if !fields.contains(name) {
                    fields.push(name.clone());
                }
                PlanOp::Field {
                    name: name.clone(),
                    group,
                }
            }
            ExprKind::Unary { op, .. } => PlanOp::Unary(*op),
            ExprKind::Binary { op, .. } => PlanOp::Binary(*op),
            ExprKind::Cast { .. } => PlanOp::Cast,
            ExprKind::If { .. } => PlanOp::If,
            ExprKind::OrMissing { .. } => PlanOp::OrMissing,
            ExprKind::Coalesce(_) => PlanOp::Coalesce,
            ExprKind::Aggregate { op, axis, .. } => PlanOp::Aggregate {
                op: *op,
                axis: axis.clone(),
            },
            ExprKind::Construct { kind, .. } => PlanOp::Construct(kind.clone()),
            ExprKind::GetField { index, name, .. } => PlanOp::GetField {
                index: *index,
                name: name.clone(),
            },
            ExprKind::GetItem { index, .. } => PlanOp::GetItem(*index),
        };
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(PlanNode {
            id,
            op,
            children,
            ty: e.ty().clone(),
            axes: e.scope().axes().clone(),
            rule: e.rule(),
        });
        self.memo.insert(e.addr(), id);
    }
}

#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: &'a str,
    schema: Option<&'a DatasetSchema>,
    root: NodeId,
    nodes: &'a [PlanNode],
}

/// Lower `expr` into a plan. Pure: reads no data and never calls a backend.
pub fn lower(expr: &Expr) -> Result<CompiledPlan> {
    let mut lowering = Lowering::default();
    let root = lowering.lower_graph(expr);

    let scope = expr.scope();
    let dataset = scope.dataset().cloned();
    let fingerprint = hash_serde(&FingerprintInput {
        version: lazytab_core::VERSION,
        schema: dataset.as_ref().map(|d| d.schema()),
        root,
        nodes: &lowering.nodes,
    })?;

    let plan = CompiledPlan {
        root,
        nodes: lowering.nodes,
        dataset,
        field_groups: lowering.field_groups,
        strategy: scope.strategy(),
        output_type: expr.ty().clone(),
        fingerprint,
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        nodes = plan.len(),
        fields = plan.field_count(),
        fingerprint = %plan.fingerprint.short(),
        "lowered expression"
    );

    Ok(plan)
}
