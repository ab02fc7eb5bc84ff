//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{BoxError, Error, Result};
pub use crate::hash::Hash256;
pub use crate::id::{DatasetId, NodeId};
pub use crate::literal::{type_of, type_of_json};
pub use crate::missing::MissingRule;
pub use crate::schema::{DatasetRef, DatasetSchema, FieldDecl};
pub use crate::scope::{Axis, AxisSet, Scope, StreamStrategy};
pub use crate::types::{StructField, ValueType};
pub use crate::value::{Datum, Interval, Value};
