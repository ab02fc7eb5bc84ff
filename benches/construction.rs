use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use lazytab_core::schema::{DatasetRef, DatasetSchema};
use lazytab_core::scope::Axis;
use lazytab_core::types::ValueType;
use lazytab_core::value::Value;
use lazytab_exec::{Evaluator, LocalBackend};
use lazytab_expr::{if_else, lit, Expr, FieldRef};
use lazytab_io::{MemoryDataset, MemoryProvider};
use lazytab_planner::lower;

fn dataset() -> DatasetRef {
    DatasetRef::new(
        DatasetSchema::table("bench")
            .with_field("x", ValueType::Int32, &["row"])
            .with_field("y", ValueType::Float64, &["row"])
            .global("k", ValueType::Int64),
    )
    .unwrap()
}

/// A chain of `depth` arithmetic steps over two fields and a global.
fn build(ds: &DatasetRef, depth: usize) -> Expr {
    let x = ds.field("x").unwrap();
    let y = ds.field("y").unwrap();
    let k = ds.field("k").unwrap();
    let mut e = x.add(&k).unwrap();
    for i in 0..depth {
        let step = if_else(e.gt(i as i64), e.mul(&y), e.sub(1)).unwrap();
        e = step.add(&x).unwrap();
    }
    e
}

fn bench_construction(c: &mut Criterion) {
    let ds = dataset();
    c.bench_function("build_depth_64", |b| b.iter(|| build(&ds, 64)));

    let e = build(&ds, 64);
    c.bench_function("lower_depth_64", |b| b.iter(|| lower(&e).unwrap()));
}

fn bench_evaluation(c: &mut Criterion) {
    let ds = dataset();
    let n = 4096;
    let provider = MemoryProvider::new();
    provider
        .register(
            &ds,
            MemoryDataset::new()
                .with_extent("row", n)
                .with_column("x", (0..n).map(|i| Some(Value::Int32(i as i32))).collect())
                .with_column(
                    "y",
                    (0..n).map(|i| Some(Value::Float64(i as f64 / 8.0))).collect(),
                )
                .with_global("k", Some(Value::Int64(3))),
        )
        .unwrap();
    let ev = Evaluator::new(LocalBackend::new(Arc::new(provider)));
    let e = build(&ds, 8);
    let total = e.sum(&Axis::row()).unwrap().add(lit(1.0)).unwrap();
    c.bench_function("collect_all_4096", |b| b.iter(|| ev.collect_all(&e).unwrap()));
    c.bench_function("force_sum_4096", |b| b.iter(|| ev.force_value(&total).unwrap()));
}

criterion_group!(expressions, bench_construction, bench_evaluation);
criterion_main!(expressions);
