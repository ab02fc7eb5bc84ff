//! Value types: the closed set of shapes an expression can produce.
//!
//! Types are plain data, compared structurally. There is no registry; this
//! module is the only authority the expression layer consults.
//!
//! Numeric widening only follows these edges:
//!
//! ```text
//! int32 -> int64 ----------> float64
//! int32 -> float32 --------> float64
//! ```
//!
//! `float32` cannot hold every `int64`, so there is no edge between them and
//! the two unify to `float64`. Nothing else widens implicitly: containers
//! unify only when identical, and strings never convert to numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Str,
    Array(Box<ValueType>),
    Set(Box<ValueType>),
    Mapping(Box<ValueType>, Box<ValueType>),
    Tuple(Vec<ValueType>),
    Struct(Vec<StructField>),
    Interval(Box<ValueType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: ValueType,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl ValueType {
    pub fn array(elem: ValueType) -> Self {
        ValueType::Array(Box::new(elem))
    }

    pub fn set(elem: ValueType) -> Self {
        ValueType::Set(Box::new(elem))
    }

    pub fn mapping(key: ValueType, value: ValueType) -> Self {
        ValueType::Mapping(Box::new(key), Box::new(value))
    }

    pub fn tuple(elems: Vec<ValueType>) -> Self {
        ValueType::Tuple(elems)
    }

    /// Build a struct type, rejecting duplicate field names.
    pub fn structure<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ValueType)>,
        S: Into<String>,
    {
        let fields: Vec<StructField> = fields
            .into_iter()
            .map(|(name, ty)| StructField::new(name, ty))
            .collect();
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].iter().any(|g| g.name == f.name) {
                return Err(Error::Schema(format!(
                    "duplicate struct field '{}'",
                    f.name
                )));
            }
        }
        Ok(ValueType::Struct(fields))
    }

    /// Build an interval type; points must be primitive and orderable.
    pub fn interval(point: ValueType) -> Result<Self> {
        if !point.is_primitive() || point == ValueType::Boolean {
            return Err(Error::type_mismatch(
                "interval",
                "an orderable primitive point type",
                &point,
            ));
        }
        Ok(ValueType::Interval(Box::new(point)))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Boolean
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::Float32
                | ValueType::Float64
                | ValueType::Str
        )
    }

    pub fn is_numeric(&self) -> bool {
        numeric_rank(self).is_some()
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, ValueType::Int32 | ValueType::Int64)
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, ValueType::Float32 | ValueType::Float64)
    }

    /// Types with a total order usable by comparisons, min/max and intervals.
    pub fn is_orderable(&self) -> bool {
        self.is_numeric() || matches!(self, ValueType::Str | ValueType::Boolean)
    }

    /// Element type of an array or set.
    pub fn element_type(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(e) | ValueType::Set(e) => Some(e),
            _ => None,
        }
    }

    /// Position and type of a struct field.
    pub fn field(&self, name: &str) -> Option<(usize, &ValueType)> {
        match self {
            ValueType::Struct(fields) => fields
                .iter()
                .enumerate()
                .find(|(_, f)| f.name == name)
                .map(|(i, f)| (i, &f.ty)),
            _ => None,
        }
    }
}

/// Position in the widening order, `None` for non-numeric types.
fn numeric_rank(t: &ValueType) -> Option<u8> {
    match t {
        ValueType::Int32 => Some(0),
        ValueType::Int64 => Some(1),
        ValueType::Float32 => Some(2),
        ValueType::Float64 => Some(3),
        _ => None,
    }
}

/// The one pair of numeric types whose ranks are ordered but where the
/// narrower does not widen into the wider.
fn lossy(from: &ValueType, to: &ValueType) -> bool {
    matches!((from, to), (ValueType::Int64, ValueType::Float32))
}

/// Structural equality. Tuple and struct members compare in order.
pub fn equals(a: &ValueType, b: &ValueType) -> bool {
    a == b
}

/// Whether a value of type `from` may be used, after implicit widening, where
/// `to` is expected.
pub fn is_compatible(from: &ValueType, to: &ValueType) -> bool {
    if from == to {
        return true;
    }
    match (numeric_rank(from), numeric_rank(to)) {
        (Some(f), Some(t)) => f <= t && !lossy(from, to),
        _ => false,
    }
}

/// The narrowest type both operands widen to, if any.
pub fn unify(a: &ValueType, b: &ValueType) -> Option<ValueType> {
    if a == b {
        return Some(a.clone());
    }
    match (numeric_rank(a), numeric_rank(b)) {
        (Some(_), Some(_)) if lossy(a, b) || lossy(b, a) => Some(ValueType::Float64),
        (Some(x), Some(y)) => Some(if x >= y { a.clone() } else { b.clone() }),
        _ => None,
    }
}

/// Unify a whole list; `None` if the list is empty or any pair fails.
pub fn unify_all<'a, I>(types: I) -> Option<ValueType>
where
    I: IntoIterator<Item = &'a ValueType>,
{
    let mut iter = types.into_iter();
    let first = iter.next()?.clone();
    iter.try_fold(first, |acc, t| unify(&acc, t))
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "bool"),
            ValueType::Int32 => write!(f, "int32"),
            ValueType::Int64 => write!(f, "int64"),
            ValueType::Float32 => write!(f, "float32"),
            ValueType::Float64 => write!(f, "float64"),
            ValueType::Str => write!(f, "str"),
            ValueType::Array(e) => write!(f, "array<{e}>"),
            ValueType::Set(e) => write!(f, "set<{e}>"),
            ValueType::Mapping(k, v) => write!(f, "dict<{k}, {v}>"),
            ValueType::Tuple(elems) => {
                write!(f, "tuple(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            ValueType::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            ValueType::Interval(p) => write!(f, "interval<{p}>"),
        }
    }
}

/// Parses the notation produced by `Display`, e.g. `dict<str, array<int32>>`.
impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = TypeParser { src: s, pos: 0 };
        let ty = p.parse()?;
        p.skip_ws();
        if p.pos != s.len() {
            return Err(p.error("trailing input"));
        }
        Ok(ty)
    }
}

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl TypeParser<'_> {
    fn error(&self, what: &str) -> Error {
        Error::Schema(format!(
            "cannot parse type '{}' at offset {}: {what}",
            self.src, self.pos
        ))
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn ident(&mut self) -> Result<&str> {
        self.skip_ws();
        let src = self.src;
        let rest = &src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn parse(&mut self) -> Result<ValueType> {
        let name = self.ident()?.to_string();
        match name.as_str() {
            "bool" | "boolean" => Ok(ValueType::Boolean),
            "int32" => Ok(ValueType::Int32),
            "int64" => Ok(ValueType::Int64),
            "float32" => Ok(ValueType::Float32),
            "float64" => Ok(ValueType::Float64),
            "str" | "string" => Ok(ValueType::Str),
            "array" | "set" | "interval" => {
                self.expect('<')?;
                let elem = self.parse()?;
                self.expect('>')?;
                match name.as_str() {
                    "array" => Ok(ValueType::array(elem)),
                    "set" => Ok(ValueType::set(elem)),
                    _ => ValueType::interval(elem),
                }
            }
            "dict" => {
                self.expect('<')?;
                let key = self.parse()?;
                self.expect(',')?;
                let value = self.parse()?;
                self.expect('>')?;
                Ok(ValueType::mapping(key, value))
            }
            "tuple" => {
                self.expect('(')?;
                let mut elems = vec![];
                if !self.eat(')') {
                    loop {
                        elems.push(self.parse()?);
                        if self.eat(')') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }
                Ok(ValueType::tuple(elems))
            }
            "struct" => {
                self.expect('{')?;
                let mut fields = vec![];
                if !self.eat('}') {
                    loop {
                        let field = self.ident()?.to_string();
                        self.expect(':')?;
                        fields.push((field, self.parse()?));
                        if self.eat('}') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }
                ValueType::structure(fields)
            }
            other => Err(self.error(&format!("unknown type '{other}'"))),
        }
    }
}
