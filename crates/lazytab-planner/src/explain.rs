//! Human-readable plan listings.

use std::fmt::{self, Write as _};

use lazytab_expr::ContainerKind;

use crate::plan::{CompiledPlan, PlanNode, PlanOp};

fn op_label(node: &PlanNode) -> String {
    match &node.op {
        PlanOp::Literal(Some(v)) => format!("lit {v}"),
        PlanOp::Literal(None) => "lit NA".to_string(),
        PlanOp::Field { name, group } => format!("field {name} @{group}"),
        PlanOp::Unary(op) => op.to_string(),
        PlanOp::Binary(op) => op.to_string(),
        PlanOp::Cast => "cast".to_string(),
        PlanOp::If => "if".to_string(),
        PlanOp::OrMissing => "or_missing".to_string(),
        PlanOp::Coalesce => "coalesce".to_string(),
        PlanOp::Aggregate { op, axis } => format!("{op} over {axis}"),
        PlanOp::Construct(kind) => match kind {
            ContainerKind::Array => "array".to_string(),
            ContainerKind::Set => "set".to_string(),
            ContainerKind::Mapping => "dict".to_string(),
            ContainerKind::Tuple => "tuple".to_string(),
            ContainerKind::Struct(names) => format!("struct {}", names.join(", ")),
            ContainerKind::Interval { .. } => "interval".to_string(),
        },
        PlanOp::GetField { name, .. } => format!("get_field {name}"),
        PlanOp::GetItem(i) => format!("get_item {i}"),
    }
}

/// One line per node, children before parents, followed by the root.
pub fn explain(plan: &CompiledPlan) -> String {
    let mut out = String::new();
    let source = plan
        .dataset
        .as_ref()
        .map_or_else(|| "<literal>".to_string(), |d| d.name().to_string());
    let _ = writeln!(out, "plan {} over {source}", plan.fingerprint.short());
    let _ = writeln!(out, "strategy: {:?}", plan.strategy);
    let _ = writeln!(out, "output:   {}", plan.output_type);
    if !plan.field_groups.is_empty() {
        let _ = writeln!(out, "fields:");
        for (group, names) in &plan.field_groups {
            let _ = writeln!(out, "  {group}: {}", names.join(", "));
        }
    }
    let _ = writeln!(out, "nodes:");
    for n in &plan.nodes {
        let args: Vec<String> = n.children.iter().map(|c| c.to_string()).collect();
        let call = if args.is_empty() {
            op_label(n)
        } else {
            format!("{}({})", op_label(n), args.join(", "))
        };
        let _ = writeln!(out, "  {} = {call} : {} {}", n.id, n.ty, n.axes);
    }
    let _ = write!(out, "root: {}", plan.root);
    out
}

impl fmt::Display for CompiledPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&explain(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower;
    use lazytab_core::schema::{DatasetRef, DatasetSchema};
    use lazytab_core::scope::Axis;
    use lazytab_core::types::ValueType;
    use lazytab_expr::FieldRef;

    #[test]
    fn lists_nodes_in_order() {
        let t = DatasetRef::new(DatasetSchema::table("t").with_field(
            "x",
            ValueType::Int64,
            &["row"],
        ))
        .unwrap();
        let e = t.field("x").unwrap().mul(2).unwrap().sum(&Axis::row()).unwrap();
        let text = explain(&lower(&e).unwrap());
        assert!(text.contains("over t\n"));
        assert!(text.contains("  {row}: x\n"));
        assert!(text.contains("  %0 = field x @{row} : int64 {row}\n"));
        assert!(text.contains("  %2 = mul(%0, %1) : int64 {row}\n"));
        assert!(text.contains("  %3 = sum over row(%2) : int64 {}\n"));
        assert!(text.ends_with("root: %3"));
    }
}
