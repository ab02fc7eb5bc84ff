//! Composition functions.
//!
//! Each function checks operand types and scopes immediately and returns a
//! fresh node, or the first construction error. Operands whose type differs
//! from what the operator requires are widened by an implicit cast; literal
//! operands are widened in place instead.

use serde_json::Value as Json;

use lazytab_core::error::{Error, Result};
use lazytab_core::literal::{datum_from_json, type_of, type_of_json};
use lazytab_core::missing::MissingRule;
use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::Scope;
use lazytab_core::types::{is_compatible, unify, unify_all, ValueType};
use lazytab_core::value::{coerce_datum, Datum, Value};

use crate::expr::{ContainerKind, Expr, ExprKind};
use crate::ops::{BinaryOp, UnaryOp};

/// Anything usable as an operand: expressions, host scalars, or the result of
/// another composition call (so calls chain without intermediate `?`).
pub trait IntoExpr {
    fn into_expr(self) -> Result<Expr>;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Result<Expr> {
        Ok(self)
    }
}

impl IntoExpr for &Expr {
    fn into_expr(self) -> Result<Expr> {
        Ok(self.clone())
    }
}

impl IntoExpr for Result<Expr> {
    fn into_expr(self) -> Result<Expr> {
        self
    }
}

macro_rules! scalar_into_expr {
    ($($t:ty),*) => {
        $(
            impl IntoExpr for $t {
                fn into_expr(self) -> Result<Expr> {
                    lit(self)
                }
            }
        )*
    };
}

scalar_into_expr!(bool, i32, i64, f32, f64, &str, String, Value);

/// Field references off a dataset handle.
pub trait FieldRef {
    fn field(&self, name: &str) -> Result<Expr>;
}

impl FieldRef for DatasetRef {
    fn field(&self, name: &str) -> Result<Expr> {
        let decl = self.field_decl(name)?;
        let scope = Scope::of_field(self, &decl.axes)?;
        Ok(Expr::from_parts(
            ExprKind::Field {
                dataset: self.clone(),
                name: decl.name.clone(),
            },
            decl.ty.clone(),
            scope,
            MissingRule::Strict,
        ))
    }
}

/// A literal with an inferred type.
pub fn lit(value: impl Into<Value>) -> Result<Expr> {
    let value = value.into();
    let ty = type_of(&value)?;
    lit_typed(Some(value), ty)
}

/// A literal of an explicit type; the value is widened to it if needed.
pub fn lit_typed(value: Datum, ty: ValueType) -> Result<Expr> {
    let value = coerce_datum(value, &ty)?;
    Ok(Expr::from_parts(
        ExprKind::Literal(value),
        ty,
        Scope::free(),
        MissingRule::Strict,
    ))
}

/// The Missing literal of type `ty`.
pub fn missing(ty: ValueType) -> Result<Expr> {
    lit_typed(None, ty)
}

/// A literal read from a JSON document, with its type inferred from the document.
pub fn lit_json(json: &Json) -> Result<Expr> {
    let ty = type_of_json(json)?;
    let value = datum_from_json(json, &ty)?;
    lit_typed(value, ty)
}

/// Widen `e` to `ty`, folding the cast into literals.
fn widen(e: Expr, ty: &ValueType, context: &str) -> Result<Expr> {
    if e.ty() == ty {
        return Ok(e);
    }
    if !is_compatible(e.ty(), ty) {
        return Err(Error::type_mismatch(context, ty, e.ty()));
    }
    if let Some(d) = e.as_literal() {
        return lit_typed(d.clone(), ty.clone());
    }
    let scope = e.scope().clone();
    Ok(Expr::from_parts(
        ExprKind::Cast { arg: e },
        ty.clone(),
        scope,
        MissingRule::Strict,
    ))
}

fn require_bool(e: &Expr, context: &str) -> Result<()> {
    if *e.ty() == ValueType::Boolean {
        Ok(())
    } else {
        Err(Error::type_mismatch(context, ValueType::Boolean, e.ty()))
    }
}

fn collect_operands<I>(operands: I) -> Result<Vec<Expr>>
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    operands.into_iter().map(IntoExpr::into_expr).collect()
}

/// Unify the operands' types and widen each to the result.
fn unify_operands(args: Vec<Expr>, context: &str) -> Result<(ValueType, Vec<Expr>)> {
    let ty = unify_all(args.iter().map(Expr::ty)).ok_or_else(|| {
        let shown: Vec<String> = args.iter().map(|a| a.ty().to_string()).collect();
        Error::type_mismatch(
            context,
            "operands of a common type",
            format!("({})", shown.join(", ")),
        )
    })?;
    let args = args
        .into_iter()
        .map(|a| widen(a, &ty, context))
        .collect::<Result<Vec<_>>>()?;
    Ok((ty, args))
}

fn combined_scope(args: &[Expr]) -> Result<Scope> {
    Scope::combine_all(args.iter().map(Expr::scope))
}

impl Expr {
    fn unary(&self, op: UnaryOp) -> Result<Expr> {
        let ty = op.result_type(self.ty())?;
        Ok(Expr::from_parts(
            ExprKind::Unary {
                op,
                arg: self.clone(),
            },
            ty,
            self.scope().clone(),
            op.rule(),
        ))
    }

    fn binary(&self, op: BinaryOp, rhs: impl IntoExpr) -> Result<Expr> {
        let rhs = rhs.into_expr()?;
        let sig = op.signature(self.ty(), rhs.ty())?;
        let scope = self.scope().combine(rhs.scope())?;
        let left = widen(self.clone(), &sig.left, op.name())?;
        let right = widen(rhs, &sig.right, op.name())?;
        Ok(Expr::from_parts(
            ExprKind::Binary { op, left, right },
            sig.result,
            scope,
            op.rule(),
        ))
    }

    pub fn neg(&self) -> Result<Expr> {
        self.unary(UnaryOp::Neg)
    }

    pub fn not(&self) -> Result<Expr> {
        self.unary(UnaryOp::Not)
    }

    pub fn abs(&self) -> Result<Expr> {
        self.unary(UnaryOp::Abs)
    }

    /// Length of a string, array, set or dict.
    pub fn len(&self) -> Result<Expr> {
        self.unary(UnaryOp::Len)
    }

    pub fn upper(&self) -> Result<Expr> {
        self.unary(UnaryOp::Upper)
    }

    pub fn lower(&self) -> Result<Expr> {
        self.unary(UnaryOp::Lower)
    }

    pub fn is_nan(&self) -> Result<Expr> {
        self.unary(UnaryOp::IsNan)
    }

    pub fn is_defined(&self) -> Result<Expr> {
        self.unary(UnaryOp::IsDefined)
    }

    pub fn is_missing(&self) -> Result<Expr> {
        self.unary(UnaryOp::IsMissing)
    }

    pub fn add(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Add, rhs)
    }

    pub fn sub(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Sub, rhs)
    }

    pub fn mul(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Mul, rhs)
    }

    /// Float division; integer operands produce `float64`.
    pub fn div(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Div, rhs)
    }

    pub fn rem(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Rem, rhs)
    }

    pub fn equal(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Eq, rhs)
    }

    pub fn not_equal(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Ne, rhs)
    }

    pub fn lt(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Lt, rhs)
    }

    pub fn le(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Le, rhs)
    }

    pub fn gt(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Gt, rhs)
    }

    pub fn ge(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Ge, rhs)
    }

    /// Kleene conjunction: `false` wins over Missing.
    pub fn and(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::And, rhs)
    }

    /// Kleene disjunction: `true` wins over Missing.
    pub fn or(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Or, rhs)
    }

    pub fn concat(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Concat, rhs)
    }

    pub fn starts_with(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::StartsWith, rhs)
    }

    /// Membership: array or set element, dict key, interval point, or substring.
    pub fn contains(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Contains, rhs)
    }

    /// Array element by position; out of range is Missing.
    pub fn index(&self, rhs: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Index, rhs)
    }

    /// Dict lookup; an absent key is Missing.
    pub fn get(&self, key: impl IntoExpr) -> Result<Expr> {
        self.binary(BinaryOp::Get, key)
    }

    /// Explicit widening cast. Narrowing casts are rejected.
    pub fn cast(&self, to: ValueType) -> Result<Expr> {
        widen(self.clone(), &to, "cast")
    }

    pub fn get_field(&self, name: &str) -> Result<Expr> {
        let (index, ty) = self.ty().field(name).ok_or_else(|| {
            Error::type_mismatch("get_field", format!("a struct with field '{name}'"), self.ty())
        })?;
        Ok(Expr::from_parts(
            ExprKind::GetField {
                arg: self.clone(),
                index,
                name: name.to_string(),
            },
            ty.clone(),
            self.scope().clone(),
            MissingRule::Strict,
        ))
    }

    pub fn get_item(&self, index: usize) -> Result<Expr> {
        let ty = match self.ty() {
            ValueType::Tuple(elems) => elems.get(index).cloned(),
            _ => None,
        }
        .ok_or_else(|| {
            Error::type_mismatch(
                "get_item",
                format!("a tuple with at least {} elements", index + 1),
                self.ty(),
            )
        })?;
        Ok(Expr::from_parts(
            ExprKind::GetItem {
                arg: self.clone(),
                index,
            },
            ty,
            self.scope().clone(),
            MissingRule::Strict,
        ))
    }
}

/// `then` when `cond` is true, `otherwise` when false, Missing when `cond` is
/// Missing. Only the selected branch is evaluated.
pub fn if_else(cond: impl IntoExpr, then: impl IntoExpr, otherwise: impl IntoExpr) -> Result<Expr> {
    let cond = cond.into_expr()?;
    require_bool(&cond, "if_else condition")?;
    let then = then.into_expr()?;
    let otherwise = otherwise.into_expr()?;
    let ty = unify(then.ty(), otherwise.ty())
        .ok_or_else(|| Error::type_mismatch("if_else branches", then.ty(), otherwise.ty()))?;
    let scope = Scope::combine_all([cond.scope(), then.scope(), otherwise.scope()])?;
    let then = widen(then, &ty, "if_else")?;
    let otherwise = widen(otherwise, &ty, "if_else")?;
    Ok(Expr::from_parts(
        ExprKind::If {
            cond,
            then,
            otherwise,
        },
        ty,
        scope,
        MissingRule::Conditional,
    ))
}

/// `value` where `pred` is true, Missing elsewhere.
pub fn or_missing(pred: impl IntoExpr, value: impl IntoExpr) -> Result<Expr> {
    let pred = pred.into_expr()?;
    require_bool(&pred, "or_missing predicate")?;
    let value = value.into_expr()?;
    let scope = pred.scope().combine(value.scope())?;
    let ty = value.ty().clone();
    Ok(Expr::from_parts(
        ExprKind::OrMissing { pred, value },
        ty,
        scope,
        MissingRule::OrMissing,
    ))
}

/// First present operand, Missing if every operand is Missing.
pub fn coalesce<I>(operands: I) -> Result<Expr>
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    let args = collect_operands(operands)?;
    if args.is_empty() {
        return Err(Error::TypeInference(
            "coalesce needs at least one operand".into(),
        ));
    }
    let (ty, args) = unify_operands(args, "coalesce")?;
    let scope = combined_scope(&args)?;
    Ok(Expr::from_parts(
        ExprKind::Coalesce(args),
        ty,
        scope,
        MissingRule::Coalesce,
    ))
}

fn construct(kind: ContainerKind, args: Vec<Expr>, ty: ValueType, rule: MissingRule) -> Result<Expr> {
    let scope = combined_scope(&args)?;
    Ok(Expr::from_parts(
        ExprKind::Construct { kind, args },
        ty,
        scope,
        rule,
    ))
}

fn element_operands(args: Vec<Expr>, what: &str) -> Result<(ValueType, Vec<Expr>)> {
    if args.is_empty() {
        return Err(Error::TypeInference(format!(
            "empty {what} has no element type; use lit_typed"
        )));
    }
    unify_operands(args, what)
}

/// An array of the operands, which must share a type after widening.
pub fn array<I>(elems: I) -> Result<Expr>
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    let (elem, args) = element_operands(collect_operands(elems)?, "array")?;
    construct(
        ContainerKind::Array,
        args,
        ValueType::array(elem),
        MissingRule::NeverMissing,
    )
}

pub fn set<I>(elems: I) -> Result<Expr>
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    let (elem, args) = element_operands(collect_operands(elems)?, "set")?;
    construct(
        ContainerKind::Set,
        args,
        ValueType::set(elem),
        MissingRule::NeverMissing,
    )
}

/// A dict from `(key, value)` pairs. On duplicate keys the first entry wins.
pub fn mapping<I, K, V>(entries: I) -> Result<Expr>
where
    I: IntoIterator<Item = (K, V)>,
    K: IntoExpr,
    V: IntoExpr,
{
    let mut keys = vec![];
    let mut values = vec![];
    for (k, v) in entries {
        keys.push(k.into_expr()?);
        values.push(v.into_expr()?);
    }
    let (key_ty, keys) = element_operands(keys, "dict keys")?;
    let (value_ty, values) = element_operands(values, "dict values")?;
    let args = keys
        .into_iter()
        .zip(values)
        .flat_map(|(k, v)| [k, v])
        .collect();
    construct(
        ContainerKind::Mapping,
        args,
        ValueType::mapping(key_ty, value_ty),
        MissingRule::NeverMissing,
    )
}

pub fn tuple<I>(elems: I) -> Result<Expr>
where
    I: IntoIterator,
    I::Item: IntoExpr,
{
    let args = collect_operands(elems)?;
    let ty = ValueType::tuple(args.iter().map(|a| a.ty().clone()).collect());
    construct(ContainerKind::Tuple, args, ty, MissingRule::NeverMissing)
}

/// A struct with fields in the given order. Field names must be unique.
pub fn structure<I, S, E>(fields: I) -> Result<Expr>
where
    I: IntoIterator<Item = (S, E)>,
    S: Into<String>,
    E: IntoExpr,
{
    let mut names = vec![];
    let mut args = vec![];
    for (name, e) in fields {
        names.push(name.into());
        args.push(e.into_expr()?);
    }
    let ty = ValueType::structure(
        names
            .iter()
            .cloned()
            .zip(args.iter().map(|a| a.ty().clone())),
    )?;
    construct(
        ContainerKind::Struct(names),
        args,
        ty,
        MissingRule::NeverMissing,
    )
}

/// An interval between two points of a common orderable type. Missing if
/// either endpoint is Missing.
pub fn interval(
    start: impl IntoExpr,
    end: impl IntoExpr,
    includes_start: bool,
    includes_end: bool,
) -> Result<Expr> {
    let (point, args) = unify_operands(vec![start.into_expr()?, end.into_expr()?], "interval")?;
    let ty = ValueType::interval(point)?;
    construct(
        ContainerKind::Interval {
            includes_start,
            includes_end,
        },
        args,
        ty,
        MissingRule::Strict,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::schema::DatasetSchema;
    use serde_json::json;

    fn table() -> DatasetRef {
        DatasetRef::new(
            DatasetSchema::table("t")
                .with_field("x", ValueType::Int32, &["row"])
                .with_field("f", ValueType::Float64, &["row"])
                .with_field("s", ValueType::Str, &["row"])
                .global("g", ValueType::Int64),
        )
        .unwrap()
    }

    #[test]
    fn mixed_widths_insert_cast() {
        let t = table();
        let e = t.field("x").unwrap().add(t.field("f").unwrap()).unwrap();
        assert_eq!(e.ty(), &ValueType::Float64);
        match e.kind() {
            ExprKind::Binary { left, .. } => {
                assert!(matches!(left.kind(), ExprKind::Cast { .. }));
                assert_eq!(left.ty(), &ValueType::Float64);
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn literal_operands_widen_in_place() {
        let t = table();
        let e = t.field("f").unwrap().mul(2).unwrap();
        match e.kind() {
            ExprKind::Binary { right, .. } => {
                assert_eq!(right.as_literal(), Some(&Some(Value::Float64(2.0))));
            }
            other => panic!("unexpected node {other:?}"),
        }
    }

    #[test]
    fn type_errors_name_both_sides() {
        let t = table();
        let err = t.field("s").unwrap().add(1).unwrap_err();
        match err {
            Error::Type { context, actual, .. } => {
                assert_eq!(context, "add");
                assert!(actual.contains("str"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn narrowing_cast_rejected() {
        let t = table();
        assert!(t.field("x").unwrap().cast(ValueType::Float32).is_ok());
        assert!(t.field("f").unwrap().cast(ValueType::Int32).is_err());
    }

    #[test]
    fn if_else_unifies_branches() {
        let t = table();
        let x = t.field("x").unwrap();
        let e = if_else(x.gt(0), &x, 0.5).unwrap();
        assert_eq!(e.ty(), &ValueType::Float64);
        assert_eq!(e.rule(), MissingRule::Conditional);
        assert!(if_else(&x, 1, 2).is_err());
    }

    #[test]
    fn containers_type_check() {
        assert_eq!(
            array([1, 2, 3]).unwrap().ty(),
            &ValueType::array(ValueType::Int32)
        );
        assert!(array(Vec::<Expr>::new()).is_err());
        let m = mapping([("a", 1), ("b", 2)]).unwrap();
        assert_eq!(m.ty(), &ValueType::mapping(ValueType::Str, ValueType::Int32));
        let s = structure([("a", lit(1)), ("b", lit("x"))]).unwrap();
        assert_eq!(s.get_field("b").unwrap().ty(), &ValueType::Str);
        assert!(s.get_field("c").is_err());
        assert!(structure([("a", 1), ("a", 2)]).is_err());
        let tup = tuple([lit(1), lit(true)]).unwrap();
        assert_eq!(tup.get_item(1).unwrap().ty(), &ValueType::Boolean);
        assert!(tup.get_item(2).is_err());
        assert!(interval(1, 2.5, true, false).is_ok());
        assert!(interval(true, false, true, true).is_err());
    }

    #[test]
    fn json_literals_infer_types() {
        let e = lit_json(&json!({"a": 1, "b": [1.5, null]})).unwrap();
        assert_eq!(
            e.ty(),
            &ValueType::structure([
                ("a", ValueType::Int32),
                ("b", ValueType::array(ValueType::Float64)),
            ])
            .unwrap()
        );
        assert!(lit_json(&json!(null)).is_err());
        assert!(lit_json(&json!([])).is_err());
    }

    #[test]
    fn cross_dataset_rejected() {
        let a = table();
        let b = table();
        let err = a.field("x").unwrap().add(b.field("x").unwrap()).unwrap_err();
        assert!(matches!(err, Error::IncompatibleScope(_)));
        // a global of another dataset is still another dataset
        assert!(a.field("x").unwrap().add(b.field("g").unwrap()).is_err());
        assert!(a.field("x").unwrap().add(a.field("g").unwrap()).is_ok());
    }
}
