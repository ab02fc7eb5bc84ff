//! Operator set and its per-type dispatch table.
//!
//! Each operator is a closed enum variant. Its operand requirements, result
//! type and missingness rule are resolved here, once, at construction time.

use std::fmt;

use serde::{Deserialize, Serialize};

use lazytab_core::error::{Error, Result};
use lazytab_core::missing::MissingRule;
use lazytab_core::types::{is_compatible, unify, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Len,
    Upper,
    Lower,
    IsNan,
    IsDefined,
    IsMissing,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::Abs => "abs",
            UnaryOp::Len => "len",
            UnaryOp::Upper => "upper",
            UnaryOp::Lower => "lower",
            UnaryOp::IsNan => "is_nan",
            UnaryOp::IsDefined => "is_defined",
            UnaryOp::IsMissing => "is_missing",
        }
    }

    pub fn rule(self) -> MissingRule {
        match self {
            UnaryOp::IsDefined | UnaryOp::IsMissing => MissingRule::NeverMissing,
            _ => MissingRule::Strict,
        }
    }

    pub fn result_type(self, arg: &ValueType) -> Result<ValueType> {
        let ok = match self {
            UnaryOp::Neg | UnaryOp::Abs if arg.is_numeric() => Some(arg.clone()),
            UnaryOp::Not if *arg == ValueType::Boolean => Some(ValueType::Boolean),
            UnaryOp::Len
                if matches!(
                    arg,
                    ValueType::Str | ValueType::Array(_) | ValueType::Set(_) | ValueType::Mapping(..)
                ) =>
            {
                Some(ValueType::Int32)
            }
            UnaryOp::Upper | UnaryOp::Lower if *arg == ValueType::Str => Some(ValueType::Str),
            UnaryOp::IsNan if arg.is_floating() => Some(ValueType::Boolean),
            UnaryOp::IsDefined | UnaryOp::IsMissing => Some(ValueType::Boolean),
            _ => None,
        };
        ok.ok_or_else(|| Error::type_mismatch(self.name(), self.expected(), arg))
    }

    fn expected(self) -> &'static str {
        match self {
            UnaryOp::Neg | UnaryOp::Abs => "a numeric type",
            UnaryOp::Not => "bool",
            UnaryOp::Len => "str, array, set or dict",
            UnaryOp::Upper | UnaryOp::Lower => "str",
            UnaryOp::IsNan => "float32 or float64",
            UnaryOp::IsDefined | UnaryOp::IsMissing => "any type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Concat,
    StartsWith,
    Contains,
    Index,
    Get,
}

/// Resolved operand and result types of a binary application. Operands whose
/// type differs from the required one get an implicit widening cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinarySignature {
    pub left: ValueType,
    pub right: ValueType,
    pub result: ValueType,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Concat => "concat",
            BinaryOp::StartsWith => "starts_with",
            BinaryOp::Contains => "contains",
            BinaryOp::Index => "index",
            BinaryOp::Get => "get",
        }
    }

    pub fn rule(self) -> MissingRule {
        match self {
            BinaryOp::And | BinaryOp::Or => MissingRule::Lenient,
            _ => MissingRule::Strict,
        }
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn signature(self, l: &ValueType, r: &ValueType) -> Result<BinarySignature> {
        let mismatch = |expected: String| {
            Error::type_mismatch(self.name(), expected, format!("({l}, {r})"))
        };
        let same = |t: ValueType, result: ValueType| BinarySignature {
            left: t.clone(),
            right: t,
            result,
        };
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Rem => {
                match unify(l, r).filter(ValueType::is_numeric) {
                    Some(t) => Ok(same(t.clone(), t)),
                    None => Err(mismatch("two numeric operands".into())),
                }
            }
            BinaryOp::Div => match unify(l, r).filter(ValueType::is_numeric) {
                // Integer division yields float64; float32 stays float32.
                Some(t) if t.is_integral() => Ok(same(ValueType::Float64, ValueType::Float64)),
                Some(t) => Ok(same(t.clone(), t)),
                None => Err(mismatch("two numeric operands".into())),
            },
            BinaryOp::Eq | BinaryOp::Ne => match unify(l, r) {
                Some(t) => Ok(same(t, ValueType::Boolean)),
                None => Err(mismatch("two operands of a common type".into())),
            },
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                match unify(l, r).filter(ValueType::is_orderable) {
                    Some(t) => Ok(same(t, ValueType::Boolean)),
                    None => Err(mismatch("two orderable operands of a common type".into())),
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                if *l == ValueType::Boolean && *r == ValueType::Boolean {
                    Ok(same(ValueType::Boolean, ValueType::Boolean))
                } else {
                    Err(mismatch("(bool, bool)".into()))
                }
            }
            BinaryOp::Concat => match (l, r) {
                (ValueType::Str, ValueType::Str) => Ok(same(ValueType::Str, ValueType::Str)),
                (ValueType::Array(_), ValueType::Array(_)) if l == r => {
                    Ok(same(l.clone(), l.clone()))
                }
                _ => Err(mismatch("(str, str) or two arrays of the same type".into())),
            },
            BinaryOp::StartsWith => match (l, r) {
                (ValueType::Str, ValueType::Str) => Ok(same(ValueType::Str, ValueType::Boolean)),
                _ => Err(mismatch("(str, str)".into())),
            },
            BinaryOp::Contains => {
                let target = match l {
                    ValueType::Array(e) | ValueType::Set(e) | ValueType::Interval(e) => {
                        Some((**e).clone())
                    }
                    ValueType::Mapping(k, _) => Some((**k).clone()),
                    ValueType::Str => Some(ValueType::Str),
                    _ => None,
                };
                match target {
                    Some(t) if is_compatible(r, &t) => Ok(BinarySignature {
                        left: l.clone(),
                        right: t,
                        result: ValueType::Boolean,
                    }),
                    _ => Err(mismatch(
                        "a container and a value of its element type".into(),
                    )),
                }
            }
            BinaryOp::Index => match l {
                ValueType::Array(e) if r.is_integral() => Ok(BinarySignature {
                    left: l.clone(),
                    right: ValueType::Int64,
                    result: (**e).clone(),
                }),
                _ => Err(mismatch("(array<T>, integer)".into())),
            },
            BinaryOp::Get => match l {
                ValueType::Mapping(k, v) if is_compatible(r, k) => Ok(BinarySignature {
                    left: l.clone(),
                    right: (**k).clone(),
                    result: (**v).clone(),
                }),
                _ => Err(mismatch("(dict<K, V>, K)".into())),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggOp {
    Sum,
    /// Number of present elements.
    Count,
    /// Number of elements, Missing ones included.
    CountAll,
    Min,
    Max,
    Mean,
    Collect,
    CollectAsSet,
    Any,
    All,
    /// Share of present elements that are `true`.
    Fraction,
}

impl AggOp {
    pub fn name(self) -> &'static str {
        match self {
            AggOp::Sum => "sum",
            AggOp::Count => "count",
            AggOp::CountAll => "count_all",
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Mean => "mean",
            AggOp::Collect => "collect",
            AggOp::CollectAsSet => "collect_as_set",
            AggOp::Any => "any",
            AggOp::All => "all",
            AggOp::Fraction => "fraction",
        }
    }

    pub fn rule(self) -> MissingRule {
        match self {
            AggOp::CountAll => MissingRule::NeverMissing,
            _ => MissingRule::Aggregate,
        }
    }

    pub fn result_type(self, arg: &ValueType) -> Result<ValueType> {
        let ok = match self {
            AggOp::Sum if arg.is_integral() => Some(ValueType::Int64),
            AggOp::Sum if arg.is_floating() => Some(ValueType::Float64),
            AggOp::Count | AggOp::CountAll => Some(ValueType::Int64),
            AggOp::Min | AggOp::Max if arg.is_orderable() => Some(arg.clone()),
            AggOp::Mean if arg.is_numeric() => Some(ValueType::Float64),
            AggOp::Collect => Some(ValueType::array(arg.clone())),
            AggOp::CollectAsSet => Some(ValueType::set(arg.clone())),
            AggOp::Any | AggOp::All if *arg == ValueType::Boolean => Some(ValueType::Boolean),
            AggOp::Fraction if *arg == ValueType::Boolean => Some(ValueType::Float64),
            _ => None,
        };
        ok.ok_or_else(|| {
            let expected = match self {
                AggOp::Sum | AggOp::Mean => "a numeric type",
                AggOp::Min | AggOp::Max => "an orderable type",
                AggOp::Any | AggOp::All | AggOp::Fraction => "bool",
                _ => "any type",
            };
            Error::type_mismatch(self.name(), expected, arg)
        })
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
