#![forbid(unsafe_code)]
//! lazytab-core: the type system, missing-value rules, and index scopes that
//! every expression in lazytab is checked against.
//!
//! Nothing in this crate touches data. Expression construction (`lazytab-expr`)
//! consults these modules to derive types and scopes; execution crates consult
//! `missing` to propagate absent values.

pub mod config;
pub mod error;
pub mod hash;
pub mod id;
pub mod literal;
pub mod missing;
pub mod prelude;
pub mod schema;
pub mod scope;
pub mod types;
pub mod value;

/// Engine version string recorded in plan fingerprints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
