//! Dataset schemas and dataset references.
//!
//! A dataset declares an ordered list of axes and a set of typed fields, each
//! tagged with the axes it varies along. Fields sharing an axis set form an
//! *axis group*: the global group (`{}`), one group per axis, and the entry
//! group spanning every axis.
//!
//! The core only holds a reference plus the schema; contents stay with the
//! dataset provider.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::DatasetId;
use crate::scope::{Axis, AxisSet};
use crate::types::ValueType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub ty: ValueType,
    pub axes: AxisSet,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: ValueType, axes: AxisSet) -> Self {
        Self {
            name: name.into(),
            ty,
            axes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub name: String,
    pub axes: Vec<Axis>,
    pub fields: Vec<FieldDecl>,
}

impl DatasetSchema {
    pub fn new(name: impl Into<String>, axes: Vec<Axis>) -> Self {
        Self {
            name: name.into(),
            axes,
            fields: vec![],
        }
    }

    /// A one-axis table (`row`).
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(name, vec![Axis::row()])
    }

    /// A two-axis matrix (`row`, `column`).
    pub fn matrix(name: impl Into<String>) -> Self {
        Self::new(name, vec![Axis::row(), Axis::column()])
    }

    /// Builder: add a field varying along `axes` (names of declared axes).
    pub fn with_field(mut self, name: impl Into<String>, ty: ValueType, axes: &[&str]) -> Self {
        let axes = axes.iter().map(|a| Axis::new(*a)).collect();
        self.fields.push(FieldDecl::new(name, ty, axes));
        self
    }

    pub fn global(self, name: impl Into<String>, ty: ValueType) -> Self {
        self.with_field(name, ty, &[])
    }

    pub fn declared_axes(&self) -> AxisSet {
        self.axes.iter().cloned().collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Fields partitioned by axis group, in declaration order within a group.
    pub fn groups(&self) -> BTreeMap<AxisSet, Vec<&FieldDecl>> {
        let mut out: BTreeMap<AxisSet, Vec<&FieldDecl>> = BTreeMap::new();
        for f in &self.fields {
            out.entry(f.axes.clone()).or_default().push(f);
        }
        out
    }

    /// Axes of `group` in declaration order (the group's iteration order).
    pub fn ordered_axes(&self, group: &AxisSet) -> Vec<Axis> {
        self.axes
            .iter()
            .filter(|a| group.contains(a))
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        for (i, a) in self.axes.iter().enumerate() {
            if self.axes[..i].contains(a) {
                return Err(Error::Schema(format!(
                    "dataset '{}' declares axis '{a}' twice",
                    self.name
                )));
            }
        }
        let declared = self.declared_axes();
        for (i, f) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|g| g.name == f.name) {
                return Err(Error::Schema(format!(
                    "dataset '{}' declares field '{}' twice",
                    self.name, f.name
                )));
            }
            if !f.axes.is_subset(&declared) {
                return Err(Error::Schema(format!(
                    "field '{}' varies along {} but dataset '{}' declares only {}",
                    f.name, f.axes, self.name, declared
                )));
            }
        }
        Ok(())
    }
}

struct DatasetInner {
    id: DatasetId,
    schema: DatasetSchema,
}

/// Shared, read-only handle to a dataset's identity and schema.
///
/// Two handles are equal iff they came from the same [`DatasetRef::new`] call.
#[derive(Clone)]
pub struct DatasetRef(Arc<DatasetInner>);

impl DatasetRef {
    pub fn new(schema: DatasetSchema) -> Result<Self> {
        schema.validate()?;
        Ok(Self(Arc::new(DatasetInner {
            id: DatasetId::fresh(),
            schema,
        })))
    }

    pub fn id(&self) -> DatasetId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.schema.name
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.0.schema
    }

    pub fn declares(&self, axis: &Axis) -> bool {
        self.0.schema.axes.contains(axis)
    }

    /// Look up a declared axis by name.
    pub fn axis(&self, name: &str) -> Result<Axis> {
        let axis = Axis::new(name);
        if self.declares(&axis) {
            Ok(axis)
        } else {
            Err(Error::Schema(format!(
                "dataset '{}' has no axis '{name}'",
                self.name()
            )))
        }
    }

    pub fn field_decl(&self, name: &str) -> Result<&FieldDecl> {
        self.0.schema.field(name).ok_or_else(|| {
            Error::Schema(format!(
                "dataset '{}' has no field '{name}'",
                self.name()
            ))
        })
    }
}

impl PartialEq for DatasetRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for DatasetRef {}

impl std::hash::Hash for DatasetRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRef")
            .field("name", &self.name())
            .field("id", &self.id())
            .finish()
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
