//! Text renderings of expressions. Neither rendering reads any data.

use std::fmt::{self, Write as _};

use crate::expr::{ContainerKind, Expr, ExprKind};

const MISSING: &str = "NA";

impl Expr {
    /// Operator label used by both renderings.
    pub fn label(&self) -> String {
        match self.kind() {
            ExprKind::Literal(Some(v)) => v.to_string(),
            ExprKind::Literal(None) => MISSING.to_string(),
            ExprKind::Field { dataset, name } => format!("{dataset}.{name}"),
            ExprKind::Unary { op, .. } => op.name().to_string(),
            ExprKind::Binary { op, .. } => op.name().to_string(),
            ExprKind::Cast { .. } => format!("cast<{}>", self.ty()),
            ExprKind::If { .. } => "if".to_string(),
            ExprKind::OrMissing { .. } => "or_missing".to_string(),
            ExprKind::Coalesce(_) => "coalesce".to_string(),
            ExprKind::Aggregate { op, axis, .. } => format!("{op}[{axis}]"),
            ExprKind::Construct { kind, .. } => match kind {
                ContainerKind::Array => "array".to_string(),
                ContainerKind::Set => "set".to_string(),
                ContainerKind::Mapping => "dict".to_string(),
                ContainerKind::Tuple => "tuple".to_string(),
                ContainerKind::Struct(names) => format!("struct{{{}}}", names.join(", ")),
                ContainerKind::Interval {
                    includes_start,
                    includes_end,
                } => format!(
                    "interval{}{}",
                    if *includes_start { "[" } else { "(" },
                    if *includes_end { "]" } else { ")" }
                ),
            },
            ExprKind::GetField { name, .. } => format!("get_field.{name}"),
            ExprKind::GetItem { index, .. } => format!("get_item.{index}"),
        }
    }

    /// Type, scope and operator tree, one node per line.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "type:  {}", self.ty());
        let _ = writeln!(out, "scope: {}", self.scope());
        let _ = writeln!(out, "nodes: {}", self.node_count());
        self.describe_into(&mut out, 0);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize) {
        let mut stack = vec![(self, depth)];
        while let Some((e, depth)) = stack.pop() {
            let _ = writeln!(
                out,
                "{:indent$}{} : {} {}",
                "",
                e.label(),
                e.ty(),
                e.scope().axes(),
                indent = depth * 2
            );
            stack.extend(e.children().into_iter().rev().map(|c| (c, depth + 1)));
        }
    }
}

enum Piece<'a> {
    Node(&'a Expr),
    Text(&'static str),
}

/// S-expression form, e.g. `(add t.x 1)`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            let e = match piece {
                Piece::Text(t) => {
                    f.write_str(t)?;
                    continue;
                }
                Piece::Node(e) => e,
            };
            let children = e.children();
            if children.is_empty() {
                f.write_str(&e.label())?;
                continue;
            }
            write!(f, "({}", e.label())?;
            stack.push(Piece::Text(")"));
            for c in children.into_iter().rev() {
                stack.push(Piece::Node(c));
                stack.push(Piece::Text(" "));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::build::{if_else, lit, missing, FieldRef};
    use lazytab_core::schema::{DatasetRef, DatasetSchema};
    use lazytab_core::scope::Axis;
    use lazytab_core::types::ValueType;

    #[test]
    fn renders_sexpr() {
        let t = DatasetRef::new(DatasetSchema::table("t").with_field(
            "x",
            ValueType::Int64,
            &["row"],
        ))
        .unwrap();
        let x = t.field("x").unwrap();
        let e = if_else(x.gt(0), x.sum(&Axis::row()), missing(ValueType::Int64)).unwrap();
        assert_eq!(e.to_string(), "(if (gt t.x 0) (sum[row] t.x) NA)");
        assert_eq!(lit("a").unwrap().to_string(), "\"a\"");
    }

    #[test]
    fn describe_lists_every_node() {
        let e = lit(1).unwrap().add(2.5).unwrap();
        let text = e.describe();
        assert!(text.starts_with("type:  float64\n"));
        assert!(text.contains("nodes: 3"));
        assert!(text.contains("add : float64 {}"));
    }
}
