//! Missing-value propagation through every operator family.

use std::sync::Arc;

use proptest::prelude::*;

use lazytab_core::schema::{DatasetRef, DatasetSchema};
use lazytab_core::scope::Axis;
use lazytab_core::types::ValueType;
use lazytab_core::value::{Datum, Value};
use lazytab_exec::{Evaluator, LocalBackend};
use lazytab_expr::{
    coalesce, lit, lit_typed, mapping, missing, or_missing, structure, tuple, Expr, FieldRef,
};
use lazytab_io::{MemoryDataset, MemoryProvider};

fn pair_table(a: &[Option<i32>], b: &[Option<i32>]) -> (DatasetRef, Evaluator<LocalBackend>) {
    let ds = DatasetRef::new(
        DatasetSchema::table("pairs")
            .with_field("a", ValueType::Int32, &["row"])
            .with_field("b", ValueType::Int64, &["row"])
            .with_field("s", ValueType::Str, &["row"])
            .with_field("t", ValueType::Str, &["row"]),
    )
    .unwrap();
    let to_datum = |v: &Option<i32>| v.map(Value::Int32);
    let to_text = |v: &Option<i32>| v.map(|v| Value::from(v.to_string()));
    let provider = MemoryProvider::new();
    provider
        .register(
            &ds,
            MemoryDataset::new()
                .with_extent("row", a.len())
                .with_column("a", a.iter().map(to_datum).collect())
                .with_column("b", b.iter().map(to_datum).collect())
                .with_column("s", a.iter().map(to_text).collect())
                .with_column("t", b.iter().map(to_text).collect()),
        )
        .unwrap();
    let ev = Evaluator::new(LocalBackend::new(Arc::new(provider)));
    (ds, ev)
}

type Build = fn(&Expr, &Expr) -> lazytab_core::error::Result<Expr>;

fn strict_binaries() -> Vec<(&'static str, Build)> {
    let ops: [(&'static str, Build); 11] = [
        ("add", |l: &Expr, r: &Expr| l.add(r)),
        ("sub", |l: &Expr, r: &Expr| l.sub(r)),
        ("mul", |l: &Expr, r: &Expr| l.mul(r)),
        ("div", |l: &Expr, r: &Expr| l.div(r)),
        ("eq", |l: &Expr, r: &Expr| l.equal(r)),
        ("ne", |l: &Expr, r: &Expr| l.not_equal(r)),
        ("lt", |l: &Expr, r: &Expr| l.lt(r)),
        ("le", |l: &Expr, r: &Expr| l.le(r)),
        ("gt", |l: &Expr, r: &Expr| l.gt(r)),
        ("ge", |l: &Expr, r: &Expr| l.ge(r)),
        ("index", |l: &Expr, r: &Expr| {
            lazytab_expr::array([l, l])?.index(r.rem(2)?)
        }),
    ];
    ops.into()
}

/// Fields of the pair table; `s` and `t` are `a` and `b` as text.
struct Operands {
    a: Expr,
    b: Expr,
    s: Expr,
    t: Expr,
}

impl Operands {
    fn of(ds: &DatasetRef) -> Self {
        Self {
            a: ds.field("a").unwrap(),
            b: ds.field("b").unwrap(),
            s: ds.field("s").unwrap(),
            t: ds.field("t").unwrap(),
        }
    }
}

type Derive = fn(&Operands) -> lazytab_core::error::Result<Expr>;

/// Present exactly where both `a` and `b` are.
fn strict_on_both() -> Vec<(&'static str, Derive)> {
    let ops: [(&'static str, Derive); 4] = [
        ("concat", |o: &Operands| o.s.concat(&o.t)),
        ("starts_with", |o: &Operands| o.s.starts_with(&o.t)),
        ("contains", |o: &Operands| o.s.contains(&o.t)),
        ("get", |o: &Operands| mapping([(&o.t, &o.a)])?.get(&o.t)),
    ];
    ops.into()
}

/// Present exactly where `a` is.
fn strict_on_a() -> Vec<(&'static str, Derive)> {
    let ops: [(&'static str, Derive); 8] = [
        ("not", |o: &Operands| o.a.gt(0)?.not()),
        ("len", |o: &Operands| o.s.len()),
        ("upper", |o: &Operands| o.s.upper()),
        ("lower", |o: &Operands| o.s.lower()),
        ("is_nan", |o: &Operands| o.a.cast(ValueType::Float64)?.is_nan()),
        ("cast", |o: &Operands| o.a.cast(ValueType::Float64)),
        ("get_field", |o: &Operands| structure([("x", &o.a)])?.get_field("x")),
        ("get_item", |o: &Operands| tuple([&o.a])?.get_item(0)),
    ];
    ops.into()
}

fn column() -> impl Strategy<Value = Vec<(Option<i32>, Option<i32>)>> {
    prop::collection::vec(
        (
            prop::option::weighted(0.7, -1000i32..1000),
            prop::option::weighted(0.7, -1000i32..1000),
        ),
        1..24,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn strict_operators_propagate_missing_in_either_position(rows in column()) {
        let (a, b): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let (ds, ev) = pair_table(&a, &b);
        let fa = ds.field("a").unwrap();
        let fb = ds.field("b").unwrap();
        for (name, build) in strict_binaries() {
            for (l, r, swapped) in [(&fa, &fb, false), (&fb, &fa, true)] {
                let out = ev.collect_all(&build(l, r).unwrap()).unwrap();
                for (i, d) in out.iter().enumerate() {
                    let any_missing = a[i].is_none() || b[i].is_none();
                    if any_missing {
                        prop_assert!(d.is_none(), "{name} swapped={swapped} row {i}");
                    } else {
                        prop_assert!(d.is_some(), "{name} swapped={swapped} row {i}");
                    }
                }
            }
        }
    }

    #[test]
    fn text_container_and_lookup_operators_are_strict(rows in column()) {
        let (a, b): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let (ds, ev) = pair_table(&a, &b);
        let o = Operands::of(&ds);
        for (name, derive) in strict_on_both() {
            let out = ev.collect_all(&derive(&o).unwrap()).unwrap();
            for (i, d) in out.iter().enumerate() {
                prop_assert_eq!(d.is_some(), a[i].is_some() && b[i].is_some(), "{} row {}", name, i);
            }
        }
        for (name, derive) in strict_on_a() {
            let out = ev.collect_all(&derive(&o).unwrap()).unwrap();
            for (i, d) in out.iter().enumerate() {
                prop_assert_eq!(d.is_some(), a[i].is_some(), "{} row {}", name, i);
            }
        }
    }

    #[test]
    fn remainder_is_missing_wherever_an_operand_is(rows in column()) {
        let (a, b): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let (ds, ev) = pair_table(&a, &b);
        let o = Operands::of(&ds);
        // a zero divisor is Missing too, so only one direction holds
        for (l, r) in [(&o.a, &o.b), (&o.b, &o.a)] {
            let out = ev.collect_all(&l.rem(r).unwrap()).unwrap();
            for (i, d) in out.iter().enumerate() {
                if a[i].is_none() || b[i].is_none() {
                    prop_assert!(d.is_none(), "rem row {}", i);
                }
            }
        }
    }

    #[test]
    fn unary_operators_are_strict_and_presence_tests_never_missing(rows in column()) {
        let (a, b): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let (ds, ev) = pair_table(&a, &b);
        let fa = ds.field("a").unwrap();

        let neg = ev.collect_all(&fa.neg().unwrap()).unwrap();
        let abs = ev.collect_all(&fa.abs().unwrap()).unwrap();
        let defined = ev.collect_all(&fa.is_defined().unwrap()).unwrap();
        let absent = ev.collect_all(&fa.is_missing().unwrap()).unwrap();
        for i in 0..a.len() {
            prop_assert_eq!(neg[i].is_none(), a[i].is_none());
            prop_assert_eq!(abs[i].is_none(), a[i].is_none());
            prop_assert_eq!(&defined[i], &Some(Value::Boolean(a[i].is_some())));
            prop_assert_eq!(&absent[i], &Some(Value::Boolean(a[i].is_none())));
        }
    }

    #[test]
    fn aggregation_ignores_missing_elements(rows in column()) {
        let (a, b): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
        let (ds, ev) = pair_table(&a, &b);
        let fa = ds.field("a").unwrap();
        let present: Vec<i64> = a.iter().flatten().map(|v| i64::from(*v)).collect();

        let sum = ev.force_value(&fa.sum(&Axis::row()).unwrap()).unwrap();
        prop_assert_eq!(sum, Some(Value::Int64(present.iter().sum())));
        let count = ev.force_value(&fa.count(&Axis::row()).unwrap()).unwrap();
        prop_assert_eq!(count, Some(Value::Int64(present.len() as i64)));
        let max = ev.force_value(&fa.max(&Axis::row()).unwrap()).unwrap();
        prop_assert_eq!(max, present.iter().max().map(|m| Value::Int32(*m as i32)));
        let collected = ev.force_value(&fa.collect(&Axis::row()).unwrap()).unwrap();
        let expected: Vec<Datum> = a.iter().flatten().map(|v| Some(Value::Int32(*v))).collect();
        prop_assert_eq!(collected, Some(Value::Array(expected)));
    }
}

fn force(e: lazytab_core::error::Result<Expr>) -> Datum {
    let ev = Evaluator::new(LocalBackend::new(Arc::new(MemoryProvider::new())));
    ev.force_value(&e.unwrap()).unwrap()
}

fn boolean(d: Option<bool>) -> Expr {
    match d {
        Some(b) => lit(b).unwrap(),
        None => missing(ValueType::Boolean).unwrap(),
    }
}

#[test]
fn or_missing_truth_table() {
    let value = || lit(5);
    assert_eq!(force(or_missing(boolean(Some(true)), value())), Some(Value::Int32(5)));
    assert_eq!(force(or_missing(boolean(Some(false)), value())), None);
    assert_eq!(force(or_missing(boolean(None), value())), None);
    assert_eq!(
        force(or_missing(boolean(Some(true)), missing(ValueType::Int32))),
        None
    );
}

#[test]
fn three_valued_and_or() {
    let t = Some(true);
    let f = Some(false);
    let cases = [
        (t, t, t, t),
        (t, f, f, t),
        (f, f, f, f),
        (t, None, None, t),
        (f, None, f, None),
        (None, None, None, None),
    ];
    let b = |v: Option<bool>| v.map(Value::Boolean);
    for (l, r, and, or) in cases {
        assert_eq!(force(boolean(l).and(boolean(r))), b(and), "{l:?} and {r:?}");
        assert_eq!(force(boolean(r).and(boolean(l))), b(and), "{r:?} and {l:?}");
        assert_eq!(force(boolean(l).or(boolean(r))), b(or), "{l:?} or {r:?}");
        assert_eq!(force(boolean(r).or(boolean(l))), b(or), "{r:?} or {l:?}");
    }
}

#[test]
fn coalesce_takes_first_present() {
    assert_eq!(
        force(coalesce([missing(ValueType::Int64), lit(3), lit(4i64)])),
        Some(Value::Int64(3))
    );
    assert_eq!(
        force(coalesce([missing(ValueType::Int32), missing(ValueType::Int32)])),
        None
    );
}

#[test]
fn containers_keep_missing_elements_but_interval_is_strict() {
    let arr = force(lazytab_expr::array([lit(1), missing(ValueType::Int32)]));
    assert_eq!(arr, Some(Value::Array(vec![Some(Value::Int32(1)), None])));
    let iv = force(lazytab_expr::interval(lit(1), missing(ValueType::Int32), true, false));
    assert_eq!(iv, None);
    let empty = force(lit_typed(
        Some(Value::Array(vec![])),
        ValueType::array(ValueType::Str),
    ));
    assert_eq!(empty, Some(Value::Array(vec![])));
}
