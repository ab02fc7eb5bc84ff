//! The umbrella prelude covers a full build-and-evaluate round.

use std::sync::Arc;

use lazytab::prelude::*;

#[test]
fn prelude_is_enough_for_a_session() {
    let ds = DatasetRef::new(
        DatasetSchema::table("temps")
            .with_field("celsius", ValueType::Float64, &["row"])
            .global("station", ValueType::Str),
    )
    .unwrap();
    let provider = MemoryProvider::new();
    provider
        .register(
            &ds,
            MemoryDataset::new()
                .with_extent("row", 3)
                .with_column(
                    "celsius",
                    vec![Some(Value::Float64(10.0)), None, Some(Value::Float64(20.0))],
                )
                .with_global("station", Some(Value::from("north"))),
        )
        .unwrap();
    let ev = Evaluator::new(LocalBackend::new(Arc::new(provider)));

    let scaled = ds
        .field("celsius")
        .unwrap()
        .mul(lit(2.0))
        .unwrap()
        .add(30.0)
        .unwrap();
    assert_eq!(
        ev.collect_all(&scaled).unwrap(),
        vec![Some(Value::Float64(50.0)), None, Some(Value::Float64(70.0))]
    );
    let warm = or_missing(scaled.gt(60.0), &scaled).unwrap();
    assert_eq!(
        ev.force_value(&warm.count(&Axis::row()).unwrap()).unwrap(),
        Some(Value::Int64(1))
    );
}
