//! Missing-value propagation rules.
//!
//! Each operator declares one [`MissingRule`]; evaluators route operand
//! handling through the functions below instead of re-deriving the rule per
//! operator. All functions are pure. Missing is a data state: none of these
//! functions ever turn a Missing operand into an error.

use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::value::{Datum, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingRule {
    /// Any Missing operand makes the result Missing.
    Strict,
    /// Missing predicate makes the result Missing; otherwise the chosen branch.
    Conditional,
    /// Missing elements are skipped by the aggregator.
    Aggregate,
    /// Result is never Missing (`is_defined`, `is_missing`, total counts).
    NeverMissing,
    /// `value` if the predicate is definitely true, else Missing.
    OrMissing,
    /// First present operand.
    Coalesce,
    /// Three-valued boolean logic: a decisive operand wins over Missing.
    Lenient,
}

/// Which operand a conditional node yields once its predicate is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Then,
    Otherwise,
    Missing,
}

/// N-ary strict application; `f` sees every operand present.
pub fn strict_n<E, F>(args: &[Datum], f: F) -> Result<Datum, E>
where
    F: FnOnce(&[&Value]) -> Result<Datum, E>,
{
    let present: Option<Vec<&Value>> = args.iter().map(Option::as_ref).collect();
    match present {
        Some(vals) => f(&vals),
        None => Ok(None),
    }
}

/// `if`: true picks `then`, false picks `otherwise`, Missing stays Missing.
pub fn conditional(pred: &Datum) -> Branch {
    match truth(pred) {
        Some(true) => Branch::Then,
        Some(false) => Branch::Otherwise,
        None => Branch::Missing,
    }
}

/// `or_missing`: the value only where the predicate is definitely true.
pub fn or_missing(pred: &Datum) -> Branch {
    match truth(pred) {
        Some(true) => Branch::Then,
        _ => Branch::Missing,
    }
}

pub fn is_defined(d: &Datum) -> bool {
    d.is_some()
}

pub fn is_missing(d: &Datum) -> bool {
    d.is_none()
}

/// One operand of a coalesce, in order. A present operand settles the result;
/// when every operand continues, the result is Missing.
pub fn coalesce_step(operand: Datum) -> ControlFlow<Datum> {
    match operand {
        Some(v) => ControlFlow::Break(Some(v)),
        None => ControlFlow::Continue(()),
    }
}

/// Left operand of `and`: `false` settles the result.
pub fn kleene_and_step(a: &Datum) -> ControlFlow<Datum> {
    match truth(a) {
        Some(false) => ControlFlow::Break(Some(Value::Boolean(false))),
        _ => ControlFlow::Continue(()),
    }
}

/// Left operand of `or`: `true` settles the result.
pub fn kleene_or_step(a: &Datum) -> ControlFlow<Datum> {
    match truth(a) {
        Some(true) => ControlFlow::Break(Some(Value::Boolean(true))),
        _ => ControlFlow::Continue(()),
    }
}

/// `false` dominates Missing; `true and Missing` is Missing.
pub fn kleene_and(a: &Datum, b: &Datum) -> Datum {
    match (truth(a), truth(b)) {
        (Some(false), _) | (_, Some(false)) => Some(Value::Boolean(false)),
        (Some(true), Some(true)) => Some(Value::Boolean(true)),
        _ => None,
    }
}

/// `true` dominates Missing; `false or Missing` is Missing.
pub fn kleene_or(a: &Datum, b: &Datum) -> Datum {
    match (truth(a), truth(b)) {
        (Some(true), _) | (_, Some(true)) => Some(Value::Boolean(true)),
        (Some(false), Some(false)) => Some(Value::Boolean(false)),
        _ => None,
    }
}

fn truth(d: &Datum) -> Option<bool> {
    d.as_ref().and_then(Value::as_bool)
}

/// The elements an aggregator actually folds over.
pub fn present<'a, I>(elems: I) -> impl Iterator<Item = &'a Value>
where
    I: IntoIterator<Item = &'a Datum>,
{
    elems.into_iter().flatten()
}
