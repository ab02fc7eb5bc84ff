#![forbid(unsafe_code)]
//! lazytab-io: where dataset contents come from.
//!
//! The engine only sees the [`DatasetProvider`] contract: axis extents, and
//! record streams for one axis group at a time in row-major order over the
//! group's axes. This crate ships an in-memory provider that honours the
//! contract, a CSV reader that fills it, and YAML dataset declarations.

pub mod decl;
pub mod error;
pub mod memory;
pub mod provider;
pub mod readers;

pub use decl::{load_schema, parse_schema_yaml, DatasetDecl};
pub use error::{ProviderError, Result};
pub use memory::{MemoryDataset, MemoryProvider};
pub use provider::{DatasetProvider, Record, RecordStream};
