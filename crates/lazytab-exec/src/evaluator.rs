//! Terminal operations: the only place expression graphs meet a backend.
//!
//! Every operation checks that the expression's scope can be realized in the
//! requested shape before anything is compiled, then lowers the graph and
//! hands the plan to the backend. Backend errors come back as
//! [`Error::Backend`] with the original error as source.

use std::sync::Arc;

use lazytab_core::config::EngineConfig;
use lazytab_core::error::{Error, Result};
use lazytab_core::scope::{Axis, AxisSet};
use lazytab_core::value::Datum;
use lazytab_expr::Expr;
use lazytab_planner::{explain, lower, CompiledPlan};

use crate::backend::{ExecutionBackend, MaterializeMode, Materialized, ValueStream};
use crate::display::render_table;

pub struct Evaluator<B> {
    backend: B,
    config: EngineConfig,
}

impl<B: ExecutionBackend> Evaluator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Configuration from `LAZYTAB_*` environment variables over the defaults.
    pub fn from_env(backend: B) -> Result<Self> {
        Self::with_config(backend, EngineConfig::from_env())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Lower `expr` without executing it.
    pub fn compile(&self, expr: &Expr) -> Result<Arc<CompiledPlan>> {
        Ok(Arc::new(lower(expr)?))
    }

    /// The single value of an axis-free expression.
    pub fn force_value(&self, expr: &Expr) -> Result<Datum> {
        expr.scope().require_within(&AxisSet::empty(), "force_value")?;
        let plan = self.compile(expr)?;
        trace_terminal("force_value", &plan);
        match self
            .backend
            .execute(plan, MaterializeMode::SingleValue)
            .map_err(Error::Backend)?
        {
            Materialized::Value(d) => Ok(d),
            Materialized::Stream(mut s) => s
                .next()
                .transpose()
                .map_err(Error::Backend)?
                .ok_or_else(|| Error::Backend("backend produced no value".into())),
        }
    }

    /// The first `n` values (default `default_sample_size`) of a single-axis
    /// expression, produced lazily in iteration order.
    pub fn sample(&self, expr: &Expr, n: Option<usize>) -> Result<ValueStream> {
        self.single_axis(expr, "sample")?;
        let n = n.unwrap_or(self.config.default_sample_size);
        let plan = self.compile(expr)?;
        trace_terminal("sample", &plan);
        let stream = self.stream(plan, MaterializeMode::Sample(n))?;
        Ok(Box::new(stream.take(n)))
    }

    /// Every value of a single-axis expression.
    pub fn collect_all(&self, expr: &Expr) -> Result<Vec<Datum>> {
        self.single_axis(expr, "collect_all")?;
        let plan = self.compile(expr)?;
        trace_terminal("collect_all", &plan);
        let stream = self.stream(plan, MaterializeMode::FullStream)?;
        stream.collect::<std::result::Result<Vec<_>, _>>().map_err(Error::Backend)
    }

    /// Render a sample as a table.
    pub fn display(&self, expr: &Expr, n: Option<usize>) -> Result<String> {
        let axis = self.single_axis(expr, "display")?;
        let values = self
            .sample(expr, n)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::Backend)?;
        Ok(render_table(&axis, &expr.to_string(), &values, &self.config))
    }

    /// Plan listing for `expr`; reads no data.
    pub fn explain(&self, expr: &Expr) -> Result<String> {
        Ok(explain(&*self.compile(expr)?))
    }

    fn single_axis(&self, expr: &Expr, op: &str) -> Result<Axis> {
        let scope = expr.scope();
        let axis = scope.axes().iter().next().cloned().ok_or_else(|| {
            Error::UnrealizableExpression(format!(
                "{op} needs an expression indexed by exactly one axis, found {scope}"
            ))
        })?;
        scope.require_within(&AxisSet::single(axis.clone()), op)?;
        Ok(axis)
    }

    fn stream(&self, plan: Arc<CompiledPlan>, mode: MaterializeMode) -> Result<ValueStream> {
        match self.backend.execute(plan, mode).map_err(Error::Backend)? {
            Materialized::Stream(s) => Ok(s),
            Materialized::Value(d) => Ok(Box::new(std::iter::once(Ok(d)))),
        }
    }
}

#[cfg(feature = "tracing")]
fn trace_terminal(op: &str, plan: &CompiledPlan) {
    tracing::debug!(op, plan = %plan.fingerprint.short(), nodes = plan.len(), "terminal operation");
}

#[cfg(not(feature = "tracing"))]
fn trace_terminal(_op: &str, _plan: &CompiledPlan) {}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::error::BoxError;
    use lazytab_core::value::Value;
    use lazytab_expr::lit;

    struct Failing;

    impl ExecutionBackend for Failing {
        fn execute(
            &self,
            _plan: Arc<CompiledPlan>,
            _mode: MaterializeMode,
        ) -> std::result::Result<Materialized, BoxError> {
            Err("storage offline".into())
        }
    }

    struct Constant;

    impl ExecutionBackend for Constant {
        fn execute(
            &self,
            _plan: Arc<CompiledPlan>,
            _mode: MaterializeMode,
        ) -> std::result::Result<Materialized, BoxError> {
            Ok(Materialized::Value(Some(Value::Int32(7))))
        }
    }

    #[test]
    fn backend_errors_pass_through() {
        let ev = Evaluator::new(Failing);
        let err = ev.force_value(&lit(1).unwrap()).unwrap_err();
        match err {
            Error::Backend(inner) => assert_eq!(inner.to_string(), "storage offline"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn literal_forces_and_explains_without_data() {
        let ev = Evaluator::new(Constant);
        assert_eq!(ev.force_value(&lit(1).unwrap()).unwrap(), Some(Value::Int32(7)));
        assert!(ev.explain(&lit(1).unwrap()).unwrap().contains("root"));
        assert!(matches!(
            ev.sample(&lit(1).unwrap(), None).err(),
            Some(Error::UnrealizableExpression(_))
        ));
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = EngineConfig {
            default_sample_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            Evaluator::with_config(Constant, cfg),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn from_env_reads_the_sample_size() {
        std::env::set_var("LAZYTAB_SAMPLE_SIZE", "3");
        let ev = Evaluator::from_env(Constant);
        std::env::remove_var("LAZYTAB_SAMPLE_SIZE");
        assert_eq!(ev.unwrap().config().default_sample_size, 3);
    }
}
