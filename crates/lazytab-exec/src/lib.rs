#![forbid(unsafe_code)]
//! lazytab-exec: terminal operations and the backends that run them.
//!
//! The [`Evaluator`] is the only way to turn an expression into values. It
//! checks the expression can be realized, lowers it, and delegates to an
//! [`ExecutionBackend`]. [`LocalBackend`] evaluates plans in-process over any
//! `DatasetProvider`.

pub mod backend;
pub mod display;
pub mod error;
pub mod evaluator;
pub mod kernels;
pub mod local;
pub mod metrics;

pub use backend::{ExecutionBackend, MaterializeMode, Materialized, ValueStream};
pub use error::ExecError;
pub use evaluator::Evaluator;
pub use local::LocalBackend;
pub use metrics::{BackendMetrics, MetricsSnapshot};
