//! YAML dataset declarations.
//!
//! ```yaml
//! name: genotypes
//! axes: [row, column]
//! fields:
//!   - { name: locus,  type: str,                axes: [row] }
//!   - { name: dp,     type: int32,              axes: [row, column] }
//!   - { name: cohort, type: "struct{n: int64}" }
//! ```
//!
//! `axes` on a field defaults to empty, i.e. a global field. Types use the
//! notation `ValueType` displays as.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lazytab_core::schema::{DatasetSchema, FieldDecl};
use lazytab_core::scope::Axis;
use lazytab_core::types::ValueType;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDecl {
    pub name: String,
    pub axes: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub axes: Vec<String>,
}

impl DatasetDecl {
    pub fn to_schema(&self) -> Result<DatasetSchema> {
        let mut schema =
            DatasetSchema::new(&self.name, self.axes.iter().map(Axis::new).collect());
        for f in &self.fields {
            let ty: ValueType = f.data_type.parse()?;
            schema.fields.push(FieldDecl::new(
                &f.name,
                ty,
                f.axes.iter().map(Axis::new).collect(),
            ));
        }
        schema.validate()?;
        Ok(schema)
    }
}

impl From<&DatasetSchema> for DatasetDecl {
    fn from(schema: &DatasetSchema) -> Self {
        Self {
            name: schema.name.clone(),
            axes: schema.axes.iter().map(|a| a.name().to_string()).collect(),
            fields: schema
                .fields
                .iter()
                .map(|f| FieldDef {
                    name: f.name.clone(),
                    data_type: f.ty.to_string(),
                    axes: f.axes.iter().map(|a| a.name().to_string()).collect(),
                })
                .collect(),
        }
    }
}

pub fn parse_schema_yaml(src: &str) -> Result<DatasetSchema> {
    let decl: DatasetDecl = serde_yaml::from_str(src)?;
    decl.to_schema()
}

pub fn load_schema(path: impl AsRef<Path>) -> Result<DatasetSchema> {
    let src = std::fs::read_to_string(path)?;
    parse_schema_yaml(&src)
}
