//! In-memory dataset provider.
//!
//! Each field is stored as one flat column laid out row-major over the
//! field's axes in declaration order, which is exactly the order the
//! provider contract streams records in.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use lazytab_core::id::DatasetId;
use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::{Axis, AxisSet};
use lazytab_core::value::{coerce_datum, Datum};

use crate::error::{ProviderError, Result};
use crate::provider::{DatasetProvider, Record, RecordStream};

/// Contents of one dataset: axis extents plus one column per field.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    extents: BTreeMap<Axis, usize>,
    columns: HashMap<String, Arc<Vec<Datum>>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extent(mut self, axis: &str, len: usize) -> Self {
        self.extents.insert(Axis::new(axis), len);
        self
    }

    /// Values of a field, row-major over its axes.
    pub fn with_column(mut self, name: &str, values: Vec<Datum>) -> Self {
        self.columns.insert(name.to_string(), Arc::new(values));
        self
    }

    pub fn with_global(self, name: &str, value: Datum) -> Self {
        self.with_column(name, vec![value])
    }

    pub fn extent(&self, axis: &Axis) -> Option<usize> {
        self.extents.get(axis).copied()
    }

    fn group_len(&self, dataset: &DatasetRef, group: &AxisSet) -> Result<usize> {
        group.iter().try_fold(1usize, |acc, a| {
            let n = self.extent(a).ok_or_else(|| ProviderError::UnknownAxis {
                dataset: dataset.name().to_string(),
                axis: a.to_string(),
            })?;
            Ok(acc * n)
        })
    }

    /// Check extents and column lengths against the schema and widen values
    /// to the declared field types.
    pub fn validate(mut self, dataset: &DatasetRef) -> Result<Self> {
        for axis in &dataset.schema().axes {
            if self.extent(axis).is_none() {
                return Err(ProviderError::UnknownAxis {
                    dataset: dataset.name().to_string(),
                    axis: axis.to_string(),
                });
            }
        }
        for decl in &dataset.schema().fields {
            let Some(column) = self.columns.get(&decl.name) else {
                return Err(ProviderError::UnknownField {
                    dataset: dataset.name().to_string(),
                    field: decl.name.clone(),
                });
            };
            let expected = self.group_len(dataset, &decl.axes)?;
            if column.len() != expected {
                return Err(ProviderError::Shape {
                    field: decl.name.clone(),
                    expected,
                    actual: column.len(),
                });
            }
            let widened = column
                .iter()
                .cloned()
                .map(|d| coerce_datum(d, &decl.ty))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            self.columns.insert(decl.name.clone(), Arc::new(widened));
        }
        Ok(self)
    }
}

/// Thread-safe registry of in-memory datasets, keyed by dataset id.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    datasets: Arc<RwLock<HashMap<DatasetId, Arc<MemoryDataset>>>>,
    streams_opened: Arc<AtomicU64>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `data` against `dataset`'s schema and register it, replacing
    /// any earlier contents.
    pub fn register(&self, dataset: &DatasetRef, data: MemoryDataset) -> Result<()> {
        let data = data.validate(dataset)?;
        let mut map = self
            .datasets
            .write()
            .map_err(|_| ProviderError::Poisoned)?;
        map.insert(dataset.id(), Arc::new(data));
        Ok(())
    }

    pub fn contains(&self, dataset: &DatasetRef) -> bool {
        self.datasets
            .read()
            .map(|m| m.contains_key(&dataset.id()))
            .unwrap_or(false)
    }

    /// Number of `stream` calls served so far.
    pub fn streams_opened(&self) -> u64 {
        self.streams_opened.load(Ordering::Relaxed)
    }

    fn get(&self, dataset: &DatasetRef) -> Result<Arc<MemoryDataset>> {
        let map = self.datasets.read().map_err(|_| ProviderError::Poisoned)?;
        map.get(&dataset.id())
            .cloned()
            .ok_or_else(|| ProviderError::UnknownDataset(dataset.name().to_string()))
    }
}

impl DatasetProvider for MemoryProvider {
    fn extent(&self, dataset: &DatasetRef, axis: &Axis) -> Result<usize> {
        self.get(dataset)?
            .extent(axis)
            .ok_or_else(|| ProviderError::UnknownAxis {
                dataset: dataset.name().to_string(),
                axis: axis.to_string(),
            })
    }

    fn stream(
        &self,
        dataset: &DatasetRef,
        group: &AxisSet,
        fields: &[String],
    ) -> Result<RecordStream> {
        let data = self.get(dataset)?;
        let mut columns = Vec::with_capacity(fields.len());
        for name in fields {
            let decl = dataset.field_decl(name)?;
            if &decl.axes != group {
                return Err(ProviderError::WrongGroup {
                    field: name.clone(),
                    declared: decl.axes.to_string(),
                    requested: group.to_string(),
                });
            }
            let column = data
                .columns
                .get(name)
                .cloned()
                .ok_or_else(|| ProviderError::UnknownField {
                    dataset: dataset.name().to_string(),
                    field: name.clone(),
                })?;
            columns.push(column);
        }
        let len = data.group_len(dataset, group)?;
        self.streams_opened.fetch_add(1, Ordering::Relaxed);
        let records = (0..len).map(move |i| -> Result<Record> {
            Ok(columns
                .iter()
                .map(|c| c.get(i).cloned().flatten())
                .collect())
        });
        Ok(Box::new(records))
    }

    fn group_len(&self, dataset: &DatasetRef, group: &AxisSet) -> Result<usize> {
        self.get(dataset)?.group_len(dataset, group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::schema::DatasetSchema;
    use lazytab_core::types::ValueType;
    use lazytab_core::value::Value;

    fn matrix() -> DatasetRef {
        DatasetRef::new(
            DatasetSchema::matrix("m")
                .with_field("e", ValueType::Int64, &["row", "column"])
                .with_field("r", ValueType::Str, &["row"])
                .global("g", ValueType::Float64),
        )
        .unwrap()
    }

    fn ints(v: &[i32]) -> Vec<Datum> {
        v.iter().map(|x| Some(Value::Int32(*x))).collect()
    }

    #[test]
    fn streams_row_major_and_widens() {
        let ds = matrix();
        let p = MemoryProvider::new();
        p.register(
            &ds,
            MemoryDataset::new()
                .with_extent("row", 2)
                .with_extent("column", 3)
                .with_column("e", ints(&[1, 2, 3, 4, 5, 6]))
                .with_column("r", vec![Some(Value::from("a")), None])
                .with_global("g", Some(Value::Float64(0.5))),
        )
        .unwrap();

        let entry = ds.schema().declared_axes();
        let recs: Vec<Record> = p
            .stream(&ds, &entry, &["e".to_string()])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(recs.len(), 6);
        assert_eq!(recs[1], vec![Some(Value::Int64(2))]);

        let global: Vec<Record> = p
            .stream(&ds, &AxisSet::empty(), &["g".to_string()])
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(global.len(), 1);
        assert_eq!(p.streams_opened(), 2);
    }

    #[test]
    fn rejects_bad_shapes_and_groups() {
        let ds = matrix();
        let p = MemoryProvider::new();
        let short = MemoryDataset::new()
            .with_extent("row", 2)
            .with_extent("column", 3)
            .with_column("e", ints(&[1, 2]))
            .with_column("r", vec![None, None])
            .with_global("g", None);
        assert!(matches!(
            p.register(&ds, short),
            Err(ProviderError::Shape { .. })
        ));

        let ok = MemoryDataset::new()
            .with_extent("row", 1)
            .with_extent("column", 1)
            .with_column("e", ints(&[1]))
            .with_column("r", vec![None])
            .with_global("g", None);
        p.register(&ds, ok).unwrap();
        let err = p
            .stream(&ds, &AxisSet::single(Axis::row()), &["e".to_string()])
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::WrongGroup { .. }));
    }
}
