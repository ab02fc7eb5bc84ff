//! Type inference for literals, and reading JSON documents as datums.
//!
//! Two literal sources are supported: runtime [`Value`]s built in Rust, and
//! dynamic JSON documents (`serde_json::Value`), which is how untyped host
//! data usually reaches the engine.

use serde_json::{Number, Value as Json};

use crate::error::{Error, Result};
use crate::types::{unify, unify_all, ValueType};
use crate::value::{Datum, Interval, Value};

/// Infer the type of a present value.
///
/// Container element types must unify (numeric elements widen). Elements that
/// carry no type information (Missing, or empty nested containers) are
/// skipped; a container left with nothing to infer from is an error.
pub fn type_of(literal: &Value) -> Result<ValueType> {
    infer(literal)?.ok_or_else(|| {
        Error::TypeInference(format!(
            "{} has no present elements to infer a type from",
            literal.kind_name()
        ))
    })
}

fn infer(literal: &Value) -> Result<Option<ValueType>> {
    let ty = match literal {
        Value::Boolean(_) => ValueType::Boolean,
        Value::Int32(_) => ValueType::Int32,
        Value::Int64(_) => ValueType::Int64,
        Value::Float32(_) => ValueType::Float32,
        Value::Float64(_) => ValueType::Float64,
        Value::Str(_) => ValueType::Str,
        Value::Array(elems) => return Ok(element_type(elems, "array")?.map(ValueType::array)),
        Value::Set(elems) => return Ok(element_type(elems, "set")?.map(ValueType::set)),
        Value::Mapping(entries) => {
            let keys: Vec<Datum> = entries.iter().map(|(k, _)| k.clone()).collect();
            let vals: Vec<Datum> = entries.iter().map(|(_, v)| v.clone()).collect();
            return Ok(element_type(&keys, "dict key")?
                .zip(element_type(&vals, "dict value")?)
                .map(|(k, v)| ValueType::mapping(k, v)));
        }
        Value::Tuple(elems) => ValueType::Tuple(
            elems
                .iter()
                .enumerate()
                .map(|(i, d)| present_type(d, &format!("tuple element {i}")))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Struct(fields) => {
            let typed = fields
                .iter()
                .map(|(n, d)| Ok((n.clone(), present_type(d, &format!("struct field '{n}'"))?)))
                .collect::<Result<Vec<_>>>()?;
            ValueType::structure(typed)?
        }
        Value::Interval(iv) => {
            let point = unify(&type_of(&iv.start)?, &type_of(&iv.end)?).ok_or_else(|| {
                Error::TypeInference("interval endpoints have different types".into())
            })?;
            ValueType::interval(point)?
        }
    };
    Ok(Some(ty))
}

fn present_type(d: &Datum, what: &str) -> Result<ValueType> {
    match d {
        Some(v) => type_of(v),
        None => Err(Error::TypeInference(format!(
            "{what} is missing; use a typed literal"
        ))),
    }
}

/// Unified type of the informative elements; `None` when there are none.
fn element_type(elems: &[Datum], what: &str) -> Result<Option<ValueType>> {
    let types = elems
        .iter()
        .flatten()
        .filter_map(|v| infer(v).transpose())
        .collect::<Result<Vec<_>>>()?;
    unify_types(&types, what)
}

fn unify_types(types: &[ValueType], what: &str) -> Result<Option<ValueType>> {
    if types.is_empty() {
        return Ok(None);
    }
    unify_all(types).map(Some).ok_or_else(|| {
        let shown: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        Error::TypeInference(format!("heterogeneous {what} elements: {}", shown.join(", ")))
    })
}

/// Infer the type of a JSON literal.
///
/// Integers map to `int32` when they fit and `int64` otherwise; other
/// numbers map to `float64`. Objects become structs with fields in key order.
/// Inside arrays, `null` and empty arrays are skipped for inference.
pub fn type_of_json(literal: &Json) -> Result<ValueType> {
    infer_json(literal)?.ok_or_else(|| match literal {
        Json::Null => Error::TypeInference("null has no type; use a typed missing literal".into()),
        _ => Error::TypeInference("array has no present elements to infer a type from".into()),
    })
}

fn infer_json(literal: &Json) -> Result<Option<ValueType>> {
    let ty = match literal {
        Json::Null => return Ok(None),
        Json::Bool(_) => ValueType::Boolean,
        Json::Number(n) => number_type(n)?,
        Json::String(_) => ValueType::Str,
        Json::Array(elems) => {
            let types = elems
                .iter()
                .filter_map(|e| infer_json(e).transpose())
                .collect::<Result<Vec<_>>>()?;
            return Ok(unify_types(&types, "array")?.map(ValueType::array));
        }
        Json::Object(map) => {
            let fields = map
                .iter()
                .map(|(k, v)| Ok((k.clone(), type_of_json(v)?)))
                .collect::<Result<Vec<_>>>()?;
            ValueType::structure(fields)?
        }
    };
    Ok(Some(ty))
}

fn number_type(n: &Number) -> Result<ValueType> {
    if let Some(i) = n.as_i64() {
        if i32::try_from(i).is_ok() {
            Ok(ValueType::Int32)
        } else {
            Ok(ValueType::Int64)
        }
    } else if n.is_f64() {
        Ok(ValueType::Float64)
    } else {
        Err(Error::TypeInference(format!("number {n} has no mapped type")))
    }
}

/// Read a JSON document as a datum of type `ty`.
///
/// `null` reads as Missing at any depth. Intervals are objects with `start`,
/// `end` and optional `includes_start` / `includes_end` flags.
pub fn datum_from_json(json: &Json, ty: &ValueType) -> Result<Datum> {
    if json.is_null() {
        return Ok(None);
    }
    let mismatch = || Error::type_mismatch("json literal", ty, json);
    let value = match ty {
        ValueType::Boolean => Value::Boolean(json.as_bool().ok_or_else(mismatch)?),
        ValueType::Int32 => {
            let i = json.as_i64().ok_or_else(mismatch)?;
            Value::Int32(i32::try_from(i).map_err(|_| mismatch())?)
        }
        ValueType::Int64 => Value::Int64(json.as_i64().ok_or_else(mismatch)?),
        ValueType::Float32 => Value::Float32(json.as_f64().ok_or_else(mismatch)? as f32),
        ValueType::Float64 => Value::Float64(json.as_f64().ok_or_else(mismatch)?),
        ValueType::Str => Value::Str(json.as_str().ok_or_else(mismatch)?.to_string()),
        ValueType::Array(e) => Value::Array(json_elems(json, e)?),
        ValueType::Set(e) => Value::set(json_elems(json, e)?),
        ValueType::Mapping(k, v) => {
            let entries = match json {
                // String-keyed dicts may be written as plain objects.
                Json::Object(map) => map
                    .iter()
                    .map(|(key, val)| {
                        Ok((
                            datum_from_json(&Json::String(key.clone()), k)?,
                            datum_from_json(val, v)?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?,
                Json::Array(pairs) => pairs
                    .iter()
                    .map(|pair| match pair.as_array().map(Vec::as_slice) {
                        Some([key, val]) => Ok((datum_from_json(key, k)?, datum_from_json(val, v)?)),
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>>>()?,
                _ => return Err(mismatch()),
            };
            Value::mapping(entries)
        }
        ValueType::Tuple(types) => {
            let elems = json.as_array().ok_or_else(mismatch)?;
            if elems.len() != types.len() {
                return Err(mismatch());
            }
            Value::Tuple(
                elems
                    .iter()
                    .zip(types)
                    .map(|(e, t)| datum_from_json(e, t))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        ValueType::Struct(fields) => {
            let obj = json.as_object().ok_or_else(mismatch)?;
            Value::Struct(
                fields
                    .iter()
                    .map(|f| {
                        let d = match obj.get(&f.name) {
                            Some(v) => datum_from_json(v, &f.ty)?,
                            None => None,
                        };
                        Ok((f.name.clone(), d))
                    })
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        ValueType::Interval(p) => {
            let obj = json.as_object().ok_or_else(mismatch)?;
            let point = |key: &str| -> Result<Value> {
                let raw = obj.get(key).ok_or_else(mismatch)?;
                datum_from_json(raw, p)?.ok_or_else(mismatch)
            };
            let flag = |key: &str, default: bool| obj.get(key).and_then(Json::as_bool).unwrap_or(default);
            Value::from(Interval {
                start: point("start")?,
                end: point("end")?,
                includes_start: flag("includes_start", true),
                includes_end: flag("includes_end", false),
            })
        }
    };
    Ok(Some(value))
}

fn json_elems(json: &Json, elem: &ValueType) -> Result<Vec<Datum>> {
    json.as_array()
        .ok_or_else(|| Error::type_mismatch("json literal", ValueType::array(elem.clone()), json))?
        .iter()
        .map(|e| datum_from_json(e, elem))
        .collect()
}
