//! The execution contract between the evaluator and whatever runs plans.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lazytab_core::error::BoxError;
use lazytab_core::value::Datum;
use lazytab_planner::CompiledPlan;

/// What the caller wants back from a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterializeMode {
    /// Exactly one value; only valid for axis-free plans.
    SingleValue,
    /// At most `n` values, in stream order.
    Sample(usize),
    /// Every value, in stream order.
    FullStream,
}

/// Values in row-major order over the plan's driving axes.
pub type ValueStream = Box<dyn Iterator<Item = Result<Datum, BoxError>> + Send>;

pub enum Materialized {
    Value(Datum),
    Stream(ValueStream),
}

impl fmt::Debug for Materialized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Materialized::Value(d) => f.debug_tuple("Value").field(d).finish(),
            Materialized::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Runs compiled plans. Errors are opaque to the evaluator and surface to the
/// caller unchanged.
pub trait ExecutionBackend: Send + Sync {
    fn execute(
        &self,
        plan: Arc<CompiledPlan>,
        mode: MaterializeMode,
    ) -> Result<Materialized, BoxError>;
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for Arc<B> {
    fn execute(
        &self,
        plan: Arc<CompiledPlan>,
        mode: MaterializeMode,
    ) -> Result<Materialized, BoxError> {
        (**self).execute(plan, mode)
    }
}

impl<B: ExecutionBackend + ?Sized> ExecutionBackend for &B {
    fn execute(
        &self,
        plan: Arc<CompiledPlan>,
        mode: MaterializeMode,
    ) -> Result<Materialized, BoxError> {
        (**self).execute(plan, mode)
    }
}
