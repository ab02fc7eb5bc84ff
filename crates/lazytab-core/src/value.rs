//! Runtime values.
//!
//! Every runtime value is a [`Datum`]: `None` is the Missing state, `Some(v)`
//! a present value. Container elements are `Datum`s too, so a missing array
//! (`None`) and an empty one (`Some(Value::Array(vec![]))`) stay distinct.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ValueType;

/// A possibly-missing value.
pub type Datum = Option<Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Str(String),
    Array(Vec<Datum>),
    /// Kept sorted and deduplicated by [`Value::set`].
    Set(Vec<Datum>),
    /// Kept sorted by key with unique keys by [`Value::mapping`].
    Mapping(Vec<(Datum, Datum)>),
    Tuple(Vec<Datum>),
    Struct(Vec<(String, Datum)>),
    Interval(Box<Interval>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub start: Value,
    pub end: Value,
    pub includes_start: bool,
    pub includes_end: bool,
}

impl Interval {
    pub fn contains(&self, point: &Value) -> bool {
        let lo = cmp_values(&self.start, point);
        let hi = cmp_values(point, &self.end);
        let above = lo == Ordering::Less || (self.includes_start && lo == Ordering::Equal);
        let below = hi == Ordering::Less || (self.includes_end && hi == Ordering::Equal);
        above && below
    }
}

impl Value {
    /// Canonical set: sorted, duplicates removed.
    pub fn set(mut elems: Vec<Datum>) -> Value {
        elems.sort_by(cmp_datum);
        elems.dedup_by(|a, b| cmp_datum(a, b) == Ordering::Equal);
        Value::Set(elems)
    }

    /// Canonical mapping: sorted by key; the first entry wins on duplicate keys.
    pub fn mapping(mut entries: Vec<(Datum, Datum)>) -> Value {
        entries.sort_by(|(a, _), (b, _)| cmp_datum(a, b));
        entries.dedup_by(|a, b| cmp_datum(&a.0, &b.0) == Ordering::Equal);
        Value::Mapping(entries)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short variant name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float32(_) => "float32",
            Value::Float64(_) => "float64",
            Value::Str(_) => "str",
            Value::Array(_) => "array",
            Value::Set(_) => "set",
            Value::Mapping(_) => "dict",
            Value::Tuple(_) => "tuple",
            Value::Struct(_) => "struct",
            Value::Interval(_) => "interval",
        }
    }

    /// Convert this value to `ty`, widening numbers where the lattice allows.
    ///
    /// Fails with a type error if the value's shape does not fit `ty`.
    pub fn coerce(self, ty: &ValueType) -> Result<Value> {
        let mismatch = |v: &Value| Error::type_mismatch("literal", ty, v.kind_name());
        match (self, ty) {
            (Value::Boolean(b), ValueType::Boolean) => Ok(Value::Boolean(b)),
            (Value::Str(s), ValueType::Str) => Ok(Value::Str(s)),
            (v, t) if t.is_numeric() => widen_number(v, t),
            (Value::Array(elems), ValueType::Array(e)) => {
                Ok(Value::Array(coerce_all(elems, e)?))
            }
            (Value::Set(elems), ValueType::Set(e)) => Ok(Value::set(coerce_all(elems, e)?)),
            (Value::Mapping(entries), ValueType::Mapping(k, v)) => {
                let entries = entries
                    .into_iter()
                    .map(|(key, val)| Ok((coerce_datum(key, k)?, coerce_datum(val, v)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::mapping(entries))
            }
            (Value::Tuple(elems), ValueType::Tuple(types)) if elems.len() == types.len() => {
                let elems = elems
                    .into_iter()
                    .zip(types)
                    .map(|(d, t)| coerce_datum(d, t))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Tuple(elems))
            }
            (Value::Struct(fields), ValueType::Struct(decl))
                if fields.len() == decl.len()
                    && fields.iter().zip(decl).all(|((n, _), f)| *n == f.name) =>
            {
                let fields = fields
                    .into_iter()
                    .zip(decl)
                    .map(|((n, d), f)| Ok((n, coerce_datum(d, &f.ty)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Struct(fields))
            }
            (Value::Interval(iv), ValueType::Interval(p)) => {
                let Interval {
                    start,
                    end,
                    includes_start,
                    includes_end,
                } = *iv;
                Ok(Value::Interval(Box::new(Interval {
                    start: start.coerce(p)?,
                    end: end.coerce(p)?,
                    includes_start,
                    includes_end,
                })))
            }
            (v, _) => Err(mismatch(&v)),
        }
    }
}

pub fn coerce_datum(d: Datum, ty: &ValueType) -> Result<Datum> {
    d.map(|v| v.coerce(ty)).transpose()
}

fn coerce_all(elems: Vec<Datum>, ty: &ValueType) -> Result<Vec<Datum>> {
    elems.into_iter().map(|d| coerce_datum(d, ty)).collect()
}

fn widen_number(v: Value, to: &ValueType) -> Result<Value> {
    let out = match (&v, to) {
        (Value::Int32(x), ValueType::Int32) => Value::Int32(*x),
        (Value::Int32(x), ValueType::Int64) => Value::Int64(i64::from(*x)),
        (Value::Int32(x), ValueType::Float32) => Value::Float32(*x as f32),
        (Value::Int32(x), ValueType::Float64) => Value::Float64(f64::from(*x)),
        (Value::Int64(x), ValueType::Int64) => Value::Int64(*x),
        (Value::Int64(x), ValueType::Float64) => Value::Float64(*x as f64),
        (Value::Float32(x), ValueType::Float32) => Value::Float32(*x),
        (Value::Float32(x), ValueType::Float64) => Value::Float64(f64::from(*x)),
        (Value::Float64(x), ValueType::Float64) => Value::Float64(*x),
        _ => {
            return Err(Error::type_mismatch("numeric widening", to, v.kind_name()));
        }
    };
    Ok(out)
}

/// Total order over values: numbers by value (NaN last), then by variant.
pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    use Value::*;
    match (a, b) {
        (Boolean(x), Boolean(y)) => x.cmp(y),
        (Int32(x), Int32(y)) => x.cmp(y),
        (Int64(x), Int64(y)) => x.cmp(y),
        (Float32(x), Float32(y)) => x.total_cmp(y),
        (Float64(x), Float64(y)) => x.total_cmp(y),
        (Str(x), Str(y)) => x.cmp(y),
        (Array(x), Array(y)) | (Tuple(x), Tuple(y)) => cmp_seq(x, y),
        (Set(x), Set(y)) => {
            let mut x = x.clone();
            let mut y = y.clone();
            x.sort_by(cmp_datum);
            y.sort_by(cmp_datum);
            cmp_seq(&x, &y)
        }
        (Mapping(x), Mapping(y)) => {
            let mut x = x.clone();
            let mut y = y.clone();
            x.sort_by(|p, q| cmp_datum(&p.0, &q.0));
            y.sort_by(|p, q| cmp_datum(&p.0, &q.0));
            for ((xk, xv), (yk, yv)) in x.iter().zip(y.iter()) {
                match cmp_datum(xk, yk).then_with(|| cmp_datum(xv, yv)) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Struct(x), Struct(y)) => {
            for ((xn, xv), (yn, yv)) in x.iter().zip(y.iter()) {
                match xn.cmp(yn).then_with(|| cmp_datum(xv, yv)) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Interval(x), Interval(y)) => cmp_values(&x.start, &y.start)
            .then_with(|| y.includes_start.cmp(&x.includes_start))
            .then_with(|| cmp_values(&x.end, &y.end))
            .then_with(|| x.includes_end.cmp(&y.includes_end)),
        _ => variant_order(a).cmp(&variant_order(b)),
    }
}

/// Order over datums; Missing sorts after every present value.
pub fn cmp_datum(a: &Datum, b: &Datum) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => cmp_values(x, y),
    }
}

fn cmp_seq(a: &[Datum], b: &[Datum]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match cmp_datum(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

fn variant_order(v: &Value) -> u8 {
    match v {
        Value::Boolean(_) => 0,
        Value::Int32(_) => 1,
        Value::Int64(_) => 2,
        Value::Float32(_) => 3,
        Value::Float64(_) => 4,
        Value::Str(_) => 5,
        Value::Array(_) => 6,
        Value::Set(_) => 7,
        Value::Mapping(_) => 8,
        Value::Tuple(_) => 9,
        Value::Struct(_) => 10,
        Value::Interval(_) => 11,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        cmp_values(self, other) == Ordering::Equal
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(|x| Some(x.into())).collect())
    }
}

impl From<Interval> for Value {
    fn from(v: Interval) -> Self {
        Value::Interval(Box::new(v))
    }
}

/// Render a datum for humans; `missing` stands in for absent values.
pub fn render_datum(d: &Datum, missing: &str) -> String {
    match d {
        None => missing.to_string(),
        Some(Value::Str(s)) => s.clone(),
        Some(v) => v.to_string(),
    }
}

fn write_datum(f: &mut fmt::Formatter<'_>, d: &Datum) -> fmt::Result {
    match d {
        None => write!(f, "NA"),
        Some(Value::Str(s)) => write!(f, "{s:?}"),
        Some(v) => write!(f, "{v}"),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, open: &str, elems: &[Datum], close: &str) -> fmt::Result {
    write!(f, "{open}")?;
    for (i, d) in elems.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_datum(f, d)?;
    }
    write!(f, "{close}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(elems) => write_list(f, "[", elems, "]"),
            Value::Set(elems) => write_list(f, "{", elems, "}"),
            Value::Tuple(elems) => write_list(f, "(", elems, ")"),
            Value::Mapping(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_datum(f, k)?;
                    write!(f, ": ")?;
                    write_datum(f, v)?;
                }
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (n, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{n}: ")?;
                    write_datum(f, v)?;
                }
                write!(f, "}}")
            }
            Value::Interval(iv) => write!(
                f,
                "{}{}-{}{}",
                if iv.includes_start { '[' } else { '(' },
                iv.start,
                iv.end,
                if iv.includes_end { ']' } else { ')' },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_equality_ignores_order() {
        let a = Value::Set(vec![Some(Value::Int32(2)), Some(Value::Int32(1))]);
        let b = Value::set(vec![Some(Value::Int32(1)), Some(Value::Int32(2)), None]);
        assert_ne!(a, b);
        let c = Value::set(vec![Some(Value::Int32(1)), Some(Value::Int32(2))]);
        assert_eq!(a, c);
    }

    #[test]
    fn coerce_widens_nested_numbers() {
        let v = Value::from(vec![1i32, 2, 3]);
        let out = v.coerce(&ValueType::array(ValueType::Float64)).unwrap();
        assert_eq!(out, Value::from(vec![1.0f64, 2.0, 3.0]));
        assert!(Value::Float64(1.5).coerce(&ValueType::Int64).is_err());
    }

    #[test]
    fn interval_bounds() {
        let iv = Interval {
            start: Value::Int32(1),
            end: Value::Int32(5),
            includes_start: true,
            includes_end: false,
        };
        assert!(iv.contains(&Value::Int32(1)));
        assert!(!iv.contains(&Value::Int32(5)));
        assert_eq!(Value::from(iv).to_string(), "[1-5)");
    }
}
