//! The compiled plan: a flat, topologically ordered node arena.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lazytab_core::hash::Hash256;
use lazytab_core::id::NodeId;
use lazytab_core::missing::MissingRule;
use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::{Axis, AxisSet, StreamStrategy};
use lazytab_core::types::ValueType;
use lazytab_core::value::Datum;
use lazytab_expr::{AggOp, BinaryOp, ContainerKind, UnaryOp};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlanOp {
    Literal(Datum),
    /// Read a field; `group` is the axis set it is streamed with.
    Field { name: String, group: AxisSet },
    Unary(UnaryOp),
    Binary(BinaryOp),
    Cast,
    If,
    OrMissing,
    Coalesce,
    Aggregate { op: AggOp, axis: Axis },
    Construct(ContainerKind),
    GetField { index: usize, name: String },
    GetItem(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: NodeId,
    pub op: PlanOp,
    /// Always lower ids than `id`.
    pub children: Vec<NodeId>,
    pub ty: ValueType,
    /// Axes the node varies along.
    pub axes: AxisSet,
    pub rule: MissingRule,
}

#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub root: NodeId,
    pub nodes: Vec<PlanNode>,
    /// Dataset every field in the plan belongs to; `None` for pure literals.
    pub dataset: Option<DatasetRef>,
    /// Fields each axis group has to provide, in first-use order.
    pub field_groups: BTreeMap<AxisSet, Vec<String>>,
    /// How the result is streamed; its axes are the plan's driving axes.
    pub strategy: StreamStrategy,
    pub output_type: ValueType,
    pub fingerprint: Hash256,
}

impl CompiledPlan {
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Axes of the result, in the dataset's declaration order.
    pub fn driving(&self) -> &[Axis] {
        self.strategy.axes()
    }

    /// Driving axes as a set.
    pub fn driving_axes(&self) -> AxisSet {
        self.driving().iter().cloned().collect()
    }

    /// Aggregation nodes, innermost first.
    pub fn aggregates(&self) -> impl Iterator<Item = &PlanNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.op, PlanOp::Aggregate { .. }))
    }

    /// Total number of fields read, across every group.
    pub fn field_count(&self) -> usize {
        self.field_groups.values().map(Vec::len).sum()
    }
}
