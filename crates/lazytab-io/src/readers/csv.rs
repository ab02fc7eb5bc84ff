//! CSV ingest for one-axis tables.
//!
//! Every header names a field; each record is one position along the table's
//! axis. Empty cells and the missing token read as Missing. Container-typed
//! cells hold JSON (`[1, 2]`, `{"a": 1}`).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use lazytab_core::literal::datum_from_json;
use lazytab_core::schema::{DatasetRef, FieldDecl};
use lazytab_core::scope::{Axis, AxisSet};
use lazytab_core::types::ValueType;
use lazytab_core::value::{Datum, Value};

use crate::error::{ProviderError, Result};
use crate::memory::MemoryDataset;

pub struct CsvReader<R: Read> {
    inner: csv::Reader<R>,
    missing_token: String,
}

impl CsvReader<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let f = File::open(path)?;
        Ok(Self::from_reader(f))
    }
}

impl<R: Read> CsvReader<R> {
    /// Reader over CSV with a header row.
    pub fn from_reader(reader: R) -> Self {
        Self {
            inner: csv::ReaderBuilder::new()
                .has_headers(true)
                .from_reader(reader),
            missing_token: "NA".to_string(),
        }
    }

    pub fn with_missing_token(mut self, token: impl Into<String>) -> Self {
        self.missing_token = token.into();
        self
    }

    /// Read every record as one position along `axis`. Only fields of the
    /// `{axis}` group are read; other groups (globals included) are left for
    /// the caller to add.
    pub fn read_table(mut self, dataset: &DatasetRef, axis: &Axis) -> Result<MemoryDataset> {
        let axis = dataset.axis(axis.name())?;
        let group = AxisSet::single(axis.clone());
        let headers = self.inner.headers()?.clone();

        let mut targets: Vec<(&FieldDecl, usize)> = vec![];
        for decl in dataset.schema().fields.iter().filter(|f| f.axes == group) {
            let col = headers
                .iter()
                .position(|h| h.trim() == decl.name)
                .ok_or_else(|| ProviderError::UnknownField {
                    dataset: dataset.name().to_string(),
                    field: decl.name.clone(),
                })?;
            targets.push((decl, col));
        }

        let mut columns: Vec<Vec<Datum>> = vec![vec![]; targets.len()];
        let mut len = 0usize;
        for (record_no, record) in self.inner.records().enumerate() {
            let record = record?;
            for ((decl, col), out) in targets.iter().zip(columns.iter_mut()) {
                let raw = record.get(*col).unwrap_or("");
                let d = parse_cell(raw, &decl.ty, &self.missing_token).map_err(|reason| {
                    ProviderError::Parse {
                        column: decl.name.clone(),
                        record: record_no,
                        reason,
                    }
                })?;
                out.push(d);
            }
            len += 1;
        }

        let mut data = MemoryDataset::new().with_extent(axis.name(), len);
        for ((decl, _), values) in targets.into_iter().zip(columns) {
            data = data.with_column(&decl.name, values);
        }
        Ok(data)
    }
}

fn parse_cell(raw: &str, ty: &ValueType, missing_token: &str) -> std::result::Result<Datum, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == missing_token {
        return Ok(None);
    }
    let bad = |e: &dyn std::fmt::Display| format!("'{trimmed}' is not a valid {ty}: {e}");
    let value = match ty {
        ValueType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Boolean(true),
            "false" | "0" => Value::Boolean(false),
            _ => return Err(format!("'{trimmed}' is not a valid bool")),
        },
        ValueType::Int32 => Value::Int32(trimmed.parse().map_err(|e| bad(&e))?),
        ValueType::Int64 => Value::Int64(trimmed.parse().map_err(|e| bad(&e))?),
        ValueType::Float32 => Value::Float32(trimmed.parse().map_err(|e| bad(&e))?),
        ValueType::Float64 => Value::Float64(trimmed.parse().map_err(|e| bad(&e))?),
        ValueType::Str => Value::Str(raw.to_string()),
        _ => {
            let json: serde_json::Value = serde_json::from_str(trimmed).map_err(|e| bad(&e))?;
            return datum_from_json(&json, ty).map_err(|e| bad(&e));
        }
    };
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::schema::DatasetSchema;

    #[test]
    fn reads_typed_columns_with_missing() {
        let ds = DatasetRef::new(
            DatasetSchema::table("people")
                .with_field("name", ValueType::Str, &["row"])
                .with_field("age", ValueType::Int32, &["row"])
                .with_field("tags", ValueType::array(ValueType::Str), &["row"])
                .global("source", ValueType::Str),
        )
        .unwrap();
        let src = "name,age,tags\nann,31,\"[\"\"x\"\"]\"\nbob,NA,\ncy,,\"[]\"\n";
        let data = CsvReader::from_reader(src.as_bytes())
            .read_table(&ds, &Axis::row())
            .unwrap()
            .with_global("source", Some(Value::from("inline")));
        assert_eq!(data.extent(&Axis::row()), Some(3));

        let provider = crate::memory::MemoryProvider::new();
        provider.register(&ds, data).unwrap();
    }

    #[test]
    fn reports_bad_cells() {
        let ds = DatasetRef::new(DatasetSchema::table("t").with_field(
            "n",
            ValueType::Int64,
            &["row"],
        ))
        .unwrap();
        let err = CsvReader::from_reader("n\n1\nx\n".as_bytes())
            .read_table(&ds, &Axis::row())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Parse { record: 1, .. }));
    }
}
