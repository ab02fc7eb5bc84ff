//! Per-operator value kernels.
//!
//! Kernels only ever see present operands of the types the plan node's
//! signature promised; Missing handling happens before they are called, via
//! `lazytab_core::missing`. A kernel may still produce Missing (an index out
//! of range, an absent dict key, integer remainder by zero).

use std::cmp::Ordering;

use lazytab_core::missing;
use lazytab_core::types::ValueType;
use lazytab_core::value::{cmp_values, Datum, Interval, Value};
use lazytab_expr::{AggOp, BinaryOp, ContainerKind, UnaryOp};
use lazytab_planner::PlanOp;

use crate::error::ExecError;

type KResult = Result<Datum, ExecError>;

fn unexpected(op: &str, v: &Value) -> ExecError {
    ExecError::Kernel(format!("{op} applied to {}", v.kind_name()))
}

fn unexpected2(op: &str, a: &Value, b: &Value) -> ExecError {
    ExecError::Kernel(format!(
        "{op} applied to ({}, {})",
        a.kind_name(),
        b.kind_name()
    ))
}

pub fn unary(op: UnaryOp, v: &Value) -> KResult {
    use Value::*;
    let out = match (op, v) {
        (UnaryOp::Neg, Int32(x)) => Int32(x.wrapping_neg()),
        (UnaryOp::Neg, Int64(x)) => Int64(x.wrapping_neg()),
        (UnaryOp::Neg, Float32(x)) => Float32(-x),
        (UnaryOp::Neg, Float64(x)) => Float64(-x),
        (UnaryOp::Abs, Int32(x)) => Int32(x.wrapping_abs()),
        (UnaryOp::Abs, Int64(x)) => Int64(x.wrapping_abs()),
        (UnaryOp::Abs, Float32(x)) => Float32(x.abs()),
        (UnaryOp::Abs, Float64(x)) => Float64(x.abs()),
        (UnaryOp::Not, Boolean(b)) => Boolean(!b),
        (UnaryOp::Len, Str(s)) => Int32(len_i32(s.chars().count())),
        (UnaryOp::Len, Array(e) | Set(e)) => Int32(len_i32(e.len())),
        (UnaryOp::Len, Mapping(e)) => Int32(len_i32(e.len())),
        (UnaryOp::Upper, Str(s)) => Str(s.to_uppercase()),
        (UnaryOp::Lower, Str(s)) => Str(s.to_lowercase()),
        (UnaryOp::IsNan, Float32(x)) => Boolean(x.is_nan()),
        (UnaryOp::IsNan, Float64(x)) => Boolean(x.is_nan()),
        _ => return Err(unexpected(op.name(), v)),
    };
    Ok(Some(out))
}

/// Kernel of a strict plan node. `vals` are the node's operands, all present,
/// in child order; `ty` is the node's result type.
pub fn strict(op: &PlanOp, ty: &ValueType, vals: &[&Value]) -> KResult {
    match (op, vals) {
        (PlanOp::Unary(op), [v]) => unary(*op, v),
        (PlanOp::Binary(op), [a, b]) => binary(*op, a, b),
        (PlanOp::Cast, [v]) => cast(v, ty),
        (PlanOp::GetField { index, .. }, [v]) => get_field(v, *index),
        (PlanOp::GetItem(index), [v]) => get_item(v, *index),
        (PlanOp::Construct(kind), _) => {
            construct(kind, vals.iter().map(|v| Some((*v).clone())).collect())
        }
        _ => Err(ExecError::Kernel(format!(
            "no strict kernel for {op:?} with {} operands",
            vals.len()
        ))),
    }
}

fn len_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// IEEE comparison for floats, total order for everything else.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Float32(x), Value::Float32(y)) => x.partial_cmp(y),
        (Value::Float64(x), Value::Float64(y)) => x.partial_cmp(y),
        _ => Some(cmp_values(a, b)),
    }
}

fn arith(op: BinaryOp, a: &Value, b: &Value) -> KResult {
    use Value::*;
    let out = match (op, a, b) {
        (BinaryOp::Add, Int32(x), Int32(y)) => Int32(x.wrapping_add(*y)),
        (BinaryOp::Add, Int64(x), Int64(y)) => Int64(x.wrapping_add(*y)),
        (BinaryOp::Add, Float32(x), Float32(y)) => Float32(x + y),
        (BinaryOp::Add, Float64(x), Float64(y)) => Float64(x + y),
        (BinaryOp::Sub, Int32(x), Int32(y)) => Int32(x.wrapping_sub(*y)),
        (BinaryOp::Sub, Int64(x), Int64(y)) => Int64(x.wrapping_sub(*y)),
        (BinaryOp::Sub, Float32(x), Float32(y)) => Float32(x - y),
        (BinaryOp::Sub, Float64(x), Float64(y)) => Float64(x - y),
        (BinaryOp::Mul, Int32(x), Int32(y)) => Int32(x.wrapping_mul(*y)),
        (BinaryOp::Mul, Int64(x), Int64(y)) => Int64(x.wrapping_mul(*y)),
        (BinaryOp::Mul, Float32(x), Float32(y)) => Float32(x * y),
        (BinaryOp::Mul, Float64(x), Float64(y)) => Float64(x * y),
        (BinaryOp::Div, Float32(x), Float32(y)) => Float32(x / y),
        (BinaryOp::Div, Float64(x), Float64(y)) => Float64(x / y),
        (BinaryOp::Rem, Int32(x), Int32(y)) => return Ok(x.checked_rem(*y).map(Int32)),
        (BinaryOp::Rem, Int64(x), Int64(y)) => return Ok(x.checked_rem(*y).map(Int64)),
        (BinaryOp::Rem, Float32(x), Float32(y)) => Float32(x % y),
        (BinaryOp::Rem, Float64(x), Float64(y)) => Float64(x % y),
        _ => return Err(unexpected2(op.name(), a, b)),
    };
    Ok(Some(out))
}

fn contains(container: &Value, item: &Value) -> Result<bool, ExecError> {
    let eq = |d: &Datum| d.as_ref().is_some_and(|v| cmp_values(v, item) == Ordering::Equal);
    match container {
        Value::Array(elems) | Value::Set(elems) => Ok(elems.iter().any(eq)),
        Value::Mapping(entries) => Ok(entries.iter().any(|(k, _)| eq(k))),
        Value::Interval(iv) => Ok(iv.contains(item)),
        Value::Str(s) => match item {
            Value::Str(sub) => Ok(s.contains(sub.as_str())),
            _ => Err(unexpected2("contains", container, item)),
        },
        _ => Err(unexpected2("contains", container, item)),
    }
}

/// Binary kernels for every operator except `and`/`or`, which are
/// three-valued and handled by the caller.
pub fn binary(op: BinaryOp, a: &Value, b: &Value) -> KResult {
    use Value::*;
    if op.is_arithmetic() {
        return arith(op, a, b);
    }
    let out = match op {
        BinaryOp::Eq => Boolean(compare(a, b) == Some(Ordering::Equal)),
        BinaryOp::Ne => Boolean(compare(a, b) != Some(Ordering::Equal)),
        BinaryOp::Lt => Boolean(compare(a, b) == Some(Ordering::Less)),
        BinaryOp::Le => Boolean(matches!(
            compare(a, b),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Boolean(compare(a, b) == Some(Ordering::Greater)),
        BinaryOp::Ge => Boolean(matches!(
            compare(a, b),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Concat => match (a, b) {
            (Str(x), Str(y)) => Str(format!("{x}{y}")),
            (Array(x), Array(y)) => Array(x.iter().chain(y).cloned().collect()),
            _ => return Err(unexpected2(op.name(), a, b)),
        },
        BinaryOp::StartsWith => match (a, b) {
            (Str(x), Str(y)) => Boolean(x.starts_with(y.as_str())),
            _ => return Err(unexpected2(op.name(), a, b)),
        },
        BinaryOp::Contains => Boolean(contains(a, b)?),
        BinaryOp::Index => {
            let (Array(elems), Some(i)) = (a, b.as_i64()) else {
                return Err(unexpected2(op.name(), a, b));
            };
            // Negative positions count from the end.
            let len = elems.len() as i64;
            let pos = if i < 0 { len + i } else { i };
            if pos < 0 || pos >= len {
                return Ok(None);
            }
            return Ok(elems[pos as usize].clone());
        }
        BinaryOp::Get => {
            let Mapping(entries) = a else {
                return Err(unexpected2(op.name(), a, b));
            };
            return Ok(entries
                .iter()
                .find(|(k, _)| {
                    k.as_ref()
                        .is_some_and(|k| cmp_values(k, b) == Ordering::Equal)
                })
                .and_then(|(_, v)| v.clone()));
        }
        BinaryOp::And | BinaryOp::Or => {
            return Err(ExecError::Kernel(format!(
                "{} is three-valued and has no strict kernel",
                op.name()
            )))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            return arith(op, a, b)
        }
    };
    Ok(Some(out))
}

pub fn cast(v: &Value, to: &ValueType) -> KResult {
    Ok(Some(v.clone().coerce(to)?))
}

/// Build a container from already evaluated arguments. Elements keep their
/// own Missing state; only intervals need both endpoints present.
pub fn construct(kind: &ContainerKind, args: Vec<Datum>) -> KResult {
    let out = match kind {
        ContainerKind::Array => Value::Array(args),
        ContainerKind::Set => Value::set(args),
        ContainerKind::Tuple => Value::Tuple(args),
        ContainerKind::Mapping => {
            let mut it = args.into_iter();
            let mut entries = vec![];
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                entries.push((k, v));
            }
            Value::mapping(entries)
        }
        ContainerKind::Struct(names) => Value::Struct(names.iter().cloned().zip(args).collect()),
        ContainerKind::Interval {
            includes_start,
            includes_end,
        } => {
            let mut it = args.into_iter();
            let (Some(Some(start)), Some(Some(end))) = (it.next(), it.next()) else {
                return Ok(None);
            };
            Value::from(Interval {
                start,
                end,
                includes_start: *includes_start,
                includes_end: *includes_end,
            })
        }
    };
    Ok(Some(out))
}

pub fn get_field(v: &Value, index: usize) -> KResult {
    match v {
        Value::Struct(fields) => Ok(fields.get(index).and_then(|(_, d)| d.clone())),
        _ => Err(unexpected("get_field", v)),
    }
}

pub fn get_item(v: &Value, index: usize) -> KResult {
    match v {
        Value::Tuple(elems) => Ok(elems.get(index).cloned().flatten()),
        _ => Err(unexpected("get_item", v)),
    }
}

/// Running state of one aggregation.
#[derive(Debug)]
pub struct Accumulator {
    op: AggOp,
    int_sum: i64,
    float_sum: f64,
    present: u64,
    total: u64,
    trues: u64,
    best: Option<Value>,
    items: Vec<Datum>,
}

impl Accumulator {
    pub fn new(op: AggOp) -> Self {
        Self {
            op,
            int_sum: 0,
            float_sum: 0.0,
            present: 0,
            total: 0,
            trues: 0,
            best: None,
            items: vec![],
        }
    }

    /// Feed one element. Only present elements reach the fold; the total
    /// count sees every element.
    pub fn push(&mut self, d: &Datum) -> Result<(), ExecError> {
        self.total += 1;
        for v in missing::present([d]) {
            self.fold(v)?;
        }
        Ok(())
    }

    fn fold(&mut self, v: &Value) -> Result<(), ExecError> {
        self.present += 1;
        match self.op {
            AggOp::Sum | AggOp::Mean => match v {
                Value::Int32(x) => {
                    self.int_sum = self.int_sum.wrapping_add(i64::from(*x));
                    self.float_sum += f64::from(*x);
                }
                Value::Int64(x) => {
                    self.int_sum = self.int_sum.wrapping_add(*x);
                    self.float_sum += *x as f64;
                }
                Value::Float32(x) => self.float_sum += f64::from(*x),
                Value::Float64(x) => self.float_sum += x,
                other => return Err(unexpected(self.op.name(), other)),
            },
            AggOp::Min | AggOp::Max => {
                let replace = match &self.best {
                    None => true,
                    Some(b) => {
                        let ord = cmp_values(v, b);
                        if self.op == AggOp::Min {
                            ord == Ordering::Less
                        } else {
                            ord == Ordering::Greater
                        }
                    }
                };
                if replace {
                    self.best = Some(v.clone());
                }
            }
            AggOp::Any | AggOp::All | AggOp::Fraction => match v {
                Value::Boolean(true) => self.trues += 1,
                Value::Boolean(false) => {}
                other => return Err(unexpected(self.op.name(), other)),
            },
            AggOp::Collect | AggOp::CollectAsSet => self.items.push(Some(v.clone())),
            AggOp::Count | AggOp::CountAll => {}
        }
        Ok(())
    }

    /// Final value; `result` is the aggregation node's type.
    pub fn finish(self, result: &ValueType) -> Datum {
        let count = |n: u64| Some(Value::Int64(i64::try_from(n).unwrap_or(i64::MAX)));
        match self.op {
            AggOp::Sum => match result {
                ValueType::Int64 => Some(Value::Int64(self.int_sum)),
                _ => Some(Value::Float64(self.float_sum)),
            },
            AggOp::Count => count(self.present),
            AggOp::CountAll => count(self.total),
            AggOp::Min | AggOp::Max => self.best,
            AggOp::Mean => {
                (self.present > 0).then(|| Value::Float64(self.float_sum / self.present as f64))
            }
            AggOp::Collect => Some(Value::Array(self.items)),
            AggOp::CollectAsSet => Some(Value::set(self.items)),
            AggOp::Any => Some(Value::Boolean(self.trues > 0)),
            AggOp::All => Some(Value::Boolean(self.trues == self.present)),
            AggOp::Fraction => {
                (self.present > 0).then(|| Value::Float64(self.trues as f64 / self.present as f64))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold(op: AggOp, ty: &ValueType, items: Vec<Datum>) -> Datum {
        let mut acc = Accumulator::new(op);
        for d in &items {
            acc.push(d).unwrap();
        }
        acc.finish(ty)
    }

    #[test]
    fn sum_skips_missing() {
        let with = vec![Some(Value::Int32(1)), Some(Value::Int32(2)), None];
        let without = vec![Some(Value::Int32(1)), Some(Value::Int32(2))];
        assert_eq!(fold(AggOp::Sum, &ValueType::Int64, with.clone()), Some(Value::Int64(3)));
        assert_eq!(
            fold(AggOp::Sum, &ValueType::Int64, with.clone()),
            fold(AggOp::Sum, &ValueType::Int64, without)
        );
        assert_eq!(fold(AggOp::Count, &ValueType::Int64, with.clone()), Some(Value::Int64(2)));
        assert_eq!(fold(AggOp::CountAll, &ValueType::Int64, with), Some(Value::Int64(3)));
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(fold(AggOp::Sum, &ValueType::Int64, vec![]), Some(Value::Int64(0)));
        assert_eq!(fold(AggOp::Mean, &ValueType::Float64, vec![None]), None);
        assert_eq!(fold(AggOp::Max, &ValueType::Int32, vec![]), None);
        assert_eq!(fold(AggOp::All, &ValueType::Boolean, vec![]), Some(Value::Boolean(true)));
        assert_eq!(fold(AggOp::Any, &ValueType::Boolean, vec![]), Some(Value::Boolean(false)));
        assert_eq!(fold(AggOp::Fraction, &ValueType::Float64, vec![]), None);
    }

    #[test]
    fn index_and_lookup_out_of_range_are_missing() {
        let arr = Value::from(vec![1, 2, 3]);
        assert_eq!(
            binary(BinaryOp::Index, &arr, &Value::Int64(-1)).unwrap(),
            Some(Value::Int32(3))
        );
        assert_eq!(binary(BinaryOp::Index, &arr, &Value::Int64(3)).unwrap(), None);
        let m = Value::mapping(vec![(Some(Value::from("a")), Some(Value::Int32(1)))]);
        assert_eq!(binary(BinaryOp::Get, &m, &Value::from("b")).unwrap(), None);
        assert_eq!(
            binary(BinaryOp::Rem, &Value::Int32(7), &Value::Int32(0)).unwrap(),
            None
        );
    }

    #[test]
    fn strict_dispatch_matches_operand_shapes() {
        let two = Value::Int32(2);
        let three = Value::Int32(3);
        assert_eq!(
            strict(&PlanOp::Binary(BinaryOp::Mul), &ValueType::Int32, &[&two, &three]).unwrap(),
            Some(Value::Int32(6))
        );
        assert_eq!(
            strict(&PlanOp::Cast, &ValueType::Float64, &[&two]).unwrap(),
            Some(Value::Float64(2.0))
        );
        assert!(strict(&PlanOp::Unary(UnaryOp::Neg), &ValueType::Int32, &[&two, &three]).is_err());
    }

    #[test]
    fn float_comparisons_follow_ieee() {
        let nan = Value::Float64(f64::NAN);
        assert_eq!(
            binary(BinaryOp::Eq, &nan, &nan).unwrap(),
            Some(Value::Boolean(false))
        );
        assert_eq!(
            binary(BinaryOp::Lt, &Value::Float64(1.0), &Value::Float64(2.0)).unwrap(),
            Some(Value::Boolean(true))
        );
    }
}
