//! Reference backend: evaluates plans in-process over a [`DatasetProvider`].
//!
//! A [`Runner`] evaluates the plan arena for one position of the driving axes
//! at a time, with an explicit work stack so plan depth never reaches the
//! call stack. Each node is dispatched on its [`MissingRule`]: conditional
//! nodes evaluate only the branch they pick, `and`/`or` and coalesce stop at
//! the first operand that settles the result.
//!
//! Axis groups are fetched from the provider the first time a field of the
//! group is read and kept for the rest of the run. Aggregation results are
//! cached per position of the axes they still vary along; entries keyed by a
//! prefix of the driving axes are dropped once the stream moves past them.
//! Streams are lazy: a `Sample(n)` run evaluates `n` rows.

use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::Arc;

use lazytab_core::config::EngineConfig;
use lazytab_core::error::BoxError;
use lazytab_core::id::NodeId;
use lazytab_core::missing::{self, Branch, MissingRule};
use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::{Axis, AxisSet, StreamStrategy};
use lazytab_core::value::{Datum, Value};
use lazytab_expr::{BinaryOp, UnaryOp};
use lazytab_io::{DatasetProvider, Record};
use lazytab_planner::{CompiledPlan, PlanNode, PlanOp};

use crate::backend::{ExecutionBackend, MaterializeMode, Materialized};
use crate::error::ExecError;
use crate::kernels::{self, Accumulator};
use crate::metrics::{emit_span, BackendMetrics};

type Binding = BTreeMap<Axis, usize>;

pub struct LocalBackend {
    provider: Arc<dyn DatasetProvider>,
    config: EngineConfig,
    metrics: Arc<BackendMetrics>,
}

impl LocalBackend {
    pub fn new(provider: Arc<dyn DatasetProvider>) -> Self {
        Self {
            provider,
            config: EngineConfig::default(),
            metrics: Arc::new(BackendMetrics::default()),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &BackendMetrics {
        &self.metrics
    }

    pub fn provider(&self) -> &Arc<dyn DatasetProvider> {
        &self.provider
    }
}

impl ExecutionBackend for LocalBackend {
    fn execute(
        &self,
        plan: Arc<CompiledPlan>,
        mode: MaterializeMode,
    ) -> Result<Materialized, BoxError> {
        self.metrics.record_execute();
        emit_span(
            "execute",
            &[
                ("plan", plan.fingerprint.short()),
                ("mode", format!("{mode:?}")),
                ("nodes", plan.len().to_string()),
            ],
        );

        let mut runner = Runner::new(plan, Arc::clone(&self.provider), Arc::clone(&self.metrics));
        match mode {
            MaterializeMode::SingleValue => {
                if runner.plan.strategy != StreamStrategy::Broadcast {
                    let axes = runner.plan.driving_axes().to_string();
                    return Err(ExecError::NotScalar(axes).into());
                }
                let root = runner.plan.root;
                let value = runner.eval(root, Binding::new())?;
                self.metrics.record_value();
                Ok(Materialized::Value(value))
            }
            MaterializeMode::Sample(n) => Ok(Materialized::Stream(Box::new(runner.rows()?.take(n)))),
            MaterializeMode::FullStream => {
                let rows = runner.rows()?;
                if let Some(cap) = self.config.max_collect_rows {
                    if rows.total > cap {
                        return Err(ExecError::TooManyRows {
                            rows: rows.total,
                            cap,
                        }
                        .into());
                    }
                }
                Ok(Materialized::Stream(Box::new(rows)))
            }
        }
    }
}

/// One axis group as fetched from the provider.
struct GroupTable {
    fields: Vec<String>,
    rows: Vec<Record>,
}

/// Evaluation state of one `execute` call.
struct Runner {
    plan: Arc<CompiledPlan>,
    provider: Arc<dyn DatasetProvider>,
    metrics: Arc<BackendMetrics>,
    extents: HashMap<Axis, usize>,
    tables: HashMap<AxisSet, GroupTable>,
    aggregates: HashMap<(NodeId, Vec<usize>), Datum>,
    /// Aggregates varying along exactly the first `p` driving axes, by `p`.
    evictable: HashMap<NodeId, usize>,
}

/// Pending work of [`Runner::eval`]. Results travel on a separate value stack.
enum Task {
    Eval(NodeId),
    /// Pop the node's operands and apply it.
    Apply(NodeId),
    /// Predicate is on the value stack; evaluate the chosen branch.
    Select(NodeId),
    /// Left operand of `and`/`or` is on the value stack.
    Logic(NodeId),
    /// Operand `next - 1` of a coalesce is on the value stack.
    Coalesce { id: NodeId, next: usize },
    Fold(Box<Fold>),
}

/// An aggregation in progress over one axis.
struct Fold {
    node: NodeId,
    key: (NodeId, Vec<usize>),
    axis: Axis,
    /// Binding of `axis` outside the fold.
    saved: Option<usize>,
    next: usize,
    len: usize,
    acc: Accumulator,
}

impl Runner {
    fn new(
        plan: Arc<CompiledPlan>,
        provider: Arc<dyn DatasetProvider>,
        metrics: Arc<BackendMetrics>,
    ) -> Self {
        let driving = plan.driving();
        let evictable = plan
            .aggregates()
            .filter_map(|node| {
                (1..=driving.len())
                    .find(|p| node.axes == driving[..*p].iter().cloned().collect::<AxisSet>())
                    .map(|p| (node.id, p))
            })
            .collect();
        Self {
            plan,
            provider,
            metrics,
            extents: HashMap::new(),
            tables: HashMap::new(),
            aggregates: HashMap::new(),
            evictable,
        }
    }

    /// Drop cached aggregates that depend on driving axis `digit` or a faster one.
    fn evict_from(&mut self, digit: usize) {
        let evictable = &self.evictable;
        self.aggregates
            .retain(|(id, _), _| evictable.get(id).map_or(true, |p| *p <= digit));
    }

    fn dataset(&self, wanted: &str) -> Result<DatasetRef, ExecError> {
        self.plan
            .dataset
            .clone()
            .ok_or_else(|| ExecError::NoDataset(wanted.to_string()))
    }

    fn extent(&mut self, axis: &Axis) -> Result<usize, ExecError> {
        if let Some(n) = self.extents.get(axis) {
            return Ok(*n);
        }
        let ds = self.dataset(axis.name())?;
        let n = self.provider.extent(&ds, axis)?;
        self.extents.insert(axis.clone(), n);
        Ok(n)
    }

    fn load(&mut self, group: &AxisSet, wanted: &str) -> Result<(), ExecError> {
        if self.tables.contains_key(group) {
            return Ok(());
        }
        let ds = self.dataset(wanted)?;
        let fields = self
            .plan
            .field_groups
            .get(group)
            .cloned()
            .unwrap_or_else(|| vec![wanted.to_string()]);
        let rows = self
            .provider
            .stream(&ds, group, &fields)?
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "tracing")]
        tracing::trace!(group = %group, fields = fields.len(), rows = rows.len(), "loaded axis group");

        self.tables.insert(group.clone(), GroupTable { fields, rows });
        Ok(())
    }

    fn read_field(
        &mut self,
        name: &str,
        group: &AxisSet,
        binding: &Binding,
    ) -> Result<Datum, ExecError> {
        let ds = self.dataset(name)?;
        let mut pos = 0usize;
        for axis in ds.schema().ordered_axes(group) {
            let n = self.extent(&axis)?;
            let i = *binding
                .get(&axis)
                .ok_or_else(|| ExecError::Unbound(axis.to_string()))?;
            pos = pos * n + i;
        }
        self.load(group, name)?;
        let table = self
            .tables
            .get(group)
            .ok_or_else(|| ExecError::Truncated {
                group: group.to_string(),
                len: 0,
                wanted: pos,
            })?;
        let col = table
            .fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| ExecError::Kernel(format!("field '{name}' was not streamed with {group}")))?;
        let record = table.rows.get(pos).ok_or_else(|| ExecError::Truncated {
            group: group.to_string(),
            len: table.rows.len(),
            wanted: pos,
        })?;
        Ok(record.get(col).cloned().flatten())
    }

    fn eval(&mut self, root: NodeId, mut binding: Binding) -> Result<Datum, ExecError> {
        let plan = Arc::clone(&self.plan);
        let mut tasks = vec![Task::Eval(root)];
        let mut values: Vec<Datum> = Vec::new();

        while let Some(task) = tasks.pop() {
            match task {
                Task::Eval(id) => {
                    let node = plan.node(id);
                    match (&node.op, node.rule) {
                        (PlanOp::Literal(d), _) => values.push(d.clone()),
                        (PlanOp::Field { name, group }, _) => {
                            values.push(self.read_field(name, group, &binding)?)
                        }
                        (PlanOp::Aggregate { op, axis }, _) => {
                            let key = (id, positions(node, &binding)?);
                            if let Some(d) = self.aggregates.get(&key) {
                                values.push(d.clone());
                                continue;
                            }
                            let len = self.extent(axis)?;
                            tasks.push(Task::Fold(Box::new(Fold {
                                node: id,
                                key,
                                axis: axis.clone(),
                                saved: binding.get(axis).copied(),
                                next: 0,
                                len,
                                acc: Accumulator::new(*op),
                            })));
                        }
                        (_, MissingRule::Conditional | MissingRule::OrMissing) => {
                            tasks.push(Task::Select(id));
                            tasks.push(Task::Eval(child(node, 0)?));
                        }
                        (_, MissingRule::Lenient) => {
                            tasks.push(Task::Logic(id));
                            tasks.push(Task::Eval(child(node, 0)?));
                        }
                        (_, MissingRule::Coalesce) => match node.children.first() {
                            Some(first) => {
                                tasks.push(Task::Coalesce { id, next: 1 });
                                tasks.push(Task::Eval(*first));
                            }
                            None => values.push(None),
                        },
                        _ => {
                            tasks.push(Task::Apply(id));
                            tasks.extend(node.children.iter().rev().map(|c| Task::Eval(*c)));
                        }
                    }
                }
                Task::Select(id) => {
                    let node = plan.node(id);
                    let pred = pop(&mut values, node)?;
                    let branch = match node.rule {
                        MissingRule::Conditional => missing::conditional(&pred),
                        _ => missing::or_missing(&pred),
                    };
                    match branch {
                        Branch::Then => tasks.push(Task::Eval(child(node, 1)?)),
                        Branch::Otherwise => tasks.push(Task::Eval(child(node, 2)?)),
                        Branch::Missing => values.push(None),
                    }
                }
                Task::Logic(id) => {
                    let node = plan.node(id);
                    let left = pop(&mut values, node)?;
                    let step = match node.op {
                        PlanOp::Binary(BinaryOp::And) => missing::kleene_and_step(&left),
                        _ => missing::kleene_or_step(&left),
                    };
                    match step {
                        ControlFlow::Break(d) => values.push(d),
                        ControlFlow::Continue(()) => {
                            values.push(left);
                            tasks.push(Task::Apply(id));
                            tasks.push(Task::Eval(child(node, 1)?));
                        }
                    }
                }
                Task::Coalesce { id, next } => {
                    let node = plan.node(id);
                    let operand = pop(&mut values, node)?;
                    match missing::coalesce_step(operand) {
                        ControlFlow::Break(d) => values.push(d),
                        ControlFlow::Continue(()) => match node.children.get(next) {
                            Some(c) => {
                                tasks.push(Task::Coalesce { id, next: next + 1 });
                                tasks.push(Task::Eval(*c));
                            }
                            None => values.push(None),
                        },
                    }
                }
                Task::Apply(id) => {
                    let node = plan.node(id);
                    let split = values
                        .len()
                        .checked_sub(node.children.len())
                        .ok_or_else(|| malformed(node))?;
                    let args = values.split_off(split);
                    values.push(apply(node, args)?);
                }
                Task::Fold(mut fold) => {
                    if fold.next > 0 {
                        let d = values.pop().ok_or_else(|| malformed(plan.node(fold.node)))?;
                        fold.acc.push(&d)?;
                    }
                    let node = plan.node(fold.node);
                    if fold.next < fold.len {
                        binding.insert(fold.axis.clone(), fold.next);
                        fold.next += 1;
                        let body = child(node, 0)?;
                        tasks.push(Task::Fold(fold));
                        tasks.push(Task::Eval(body));
                        continue;
                    }
                    match fold.saved {
                        Some(i) => binding.insert(fold.axis.clone(), i),
                        None => binding.remove(&fold.axis),
                    };
                    let Fold { key, acc, .. } = *fold;
                    let out = acc.finish(&node.ty);
                    self.metrics.record_aggregate();
                    self.aggregates.insert(key, out.clone());
                    values.push(out);
                }
            }
        }
        values.pop().ok_or_else(|| malformed(plan.node(root)))
    }

    /// Lazy row iterator over the driving axes.
    fn rows(mut self) -> Result<Rows, ExecError> {
        let driving = self.plan.strategy.axes().to_vec();
        let extents = driving
            .iter()
            .map(|a| self.extent(a))
            .collect::<Result<Vec<_>, _>>()?;
        let total = extents.iter().product();
        let next = (total > 0).then(|| vec![0; driving.len()]);
        Ok(Rows {
            runner: self,
            driving,
            extents,
            next,
            total,
        })
    }
}

fn child(node: &PlanNode, i: usize) -> Result<NodeId, ExecError> {
    node.children.get(i).copied().ok_or_else(|| malformed(node))
}

fn pop(values: &mut Vec<Datum>, node: &PlanNode) -> Result<Datum, ExecError> {
    values.pop().ok_or_else(|| malformed(node))
}

fn malformed(node: &PlanNode) -> ExecError {
    ExecError::Kernel(format!("malformed plan node {} ({:?})", node.id, node.op))
}

/// Cache key of an aggregation: the binding of every axis it varies along.
fn positions(node: &PlanNode, binding: &Binding) -> Result<Vec<usize>, ExecError> {
    node.axes
        .iter()
        .map(|a| {
            binding
                .get(a)
                .copied()
                .ok_or_else(|| ExecError::Unbound(a.to_string()))
        })
        .collect()
}

/// Apply a node to its evaluated operands according to its missing rule.
fn apply(node: &PlanNode, args: Vec<Datum>) -> Result<Datum, ExecError> {
    match node.rule {
        MissingRule::Strict => {
            missing::strict_n(&args, |vals| kernels::strict(&node.op, &node.ty, vals))
        }
        MissingRule::NeverMissing => {
            if let PlanOp::Construct(kind) = &node.op {
                return kernels::construct(kind, args);
            }
            match (&node.op, args.as_slice()) {
                (PlanOp::Unary(UnaryOp::IsDefined), [a]) => {
                    Ok(Some(Value::Boolean(missing::is_defined(a))))
                }
                (PlanOp::Unary(UnaryOp::IsMissing), [a]) => {
                    Ok(Some(Value::Boolean(missing::is_missing(a))))
                }
                _ => Err(malformed(node)),
            }
        }
        MissingRule::Lenient => match (&node.op, args.as_slice()) {
            (PlanOp::Binary(BinaryOp::And), [a, b]) => Ok(missing::kleene_and(a, b)),
            (PlanOp::Binary(BinaryOp::Or), [a, b]) => Ok(missing::kleene_or(a, b)),
            _ => Err(malformed(node)),
        },
        _ => Err(malformed(node)),
    }
}

/// Odometer over the driving axes; the last declared axis moves fastest.
struct Rows {
    runner: Runner,
    driving: Vec<Axis>,
    extents: Vec<usize>,
    next: Option<Vec<usize>>,
    total: usize,
}

impl Rows {
    fn advance(&mut self, mut pos: Vec<usize>) -> Option<Vec<usize>> {
        for i in (0..pos.len()).rev() {
            pos[i] += 1;
            if pos[i] < self.extents[i] {
                self.runner.evict_from(i);
                return Some(pos);
            }
            pos[i] = 0;
        }
        self.runner.evict_from(0);
        None
    }
}

impl Iterator for Rows {
    type Item = Result<Datum, BoxError>;

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.next.take()?;
        let binding: Binding = self.driving.iter().cloned().zip(pos.iter().copied()).collect();
        let root = self.runner.plan.root;
        match self.runner.eval(root, binding) {
            Ok(d) => {
                self.next = self.advance(pos);
                self.runner.metrics.record_value();
                Some(Ok(d))
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazytab_core::schema::DatasetSchema;
    use lazytab_core::types::ValueType;
    use lazytab_expr::{coalesce, if_else, lit, FieldRef};
    use lazytab_io::{MemoryDataset, MemoryProvider};
    use lazytab_planner::lower;

    fn setup() -> (DatasetRef, LocalBackend, MemoryProvider) {
        let ds = DatasetRef::new(
            DatasetSchema::matrix("m")
                .with_field("e", ValueType::Int32, &["row", "column"])
                .with_field("r", ValueType::Int32, &["row"])
                .global("g", ValueType::Int32),
        )
        .unwrap();
        let provider = MemoryProvider::new();
        provider
            .register(
                &ds,
                MemoryDataset::new()
                    .with_extent("row", 2)
                    .with_extent("column", 3)
                    .with_column(
                        "e",
                        vec![
                            Some(Value::Int32(1)),
                            Some(Value::Int32(2)),
                            None,
                            Some(Value::Int32(4)),
                            Some(Value::Int32(5)),
                            Some(Value::Int32(6)),
                        ],
                    )
                    .with_column("r", vec![Some(Value::Int32(10)), Some(Value::Int32(20))])
                    .with_global("g", Some(Value::Int32(100))),
            )
            .unwrap();
        let backend = LocalBackend::new(Arc::new(provider.clone()));
        (ds, backend, provider)
    }

    fn stream(backend: &LocalBackend, plan: CompiledPlan, mode: MaterializeMode) -> Vec<Datum> {
        match backend.execute(Arc::new(plan), mode).unwrap() {
            Materialized::Stream(s) => s.collect::<Result<_, _>>().unwrap(),
            Materialized::Value(d) => vec![d],
        }
    }

    #[test]
    fn cross_scan_is_row_major() {
        let (ds, backend, _) = setup();
        let e = ds.field("e").unwrap().add(ds.field("r").unwrap()).unwrap();
        let out = stream(&backend, lower(&e).unwrap(), MaterializeMode::FullStream);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0], Some(Value::Int32(11)));
        assert_eq!(out[2], None);
        assert_eq!(out[3], Some(Value::Int32(24)));
    }

    #[test]
    fn nested_aggregates_are_cached_per_position() {
        let (ds, backend, provider) = setup();
        let row_sums = ds.field("e").unwrap().sum(&Axis::column()).unwrap();
        let plan = lower(&row_sums).unwrap();
        let out = stream(&backend, plan, MaterializeMode::FullStream);
        assert_eq!(out, vec![Some(Value::Int64(3)), Some(Value::Int64(15))]);

        let total = row_sums.sum(&Axis::row()).unwrap().add(ds.field("g").unwrap()).unwrap();
        let before = provider.streams_opened();
        let out = stream(&backend, lower(&total).unwrap(), MaterializeMode::SingleValue);
        assert_eq!(out, vec![Some(Value::Int64(118))]);
        // one stream for `e`, one for the global group
        assert_eq!(provider.streams_opened() - before, 2);
    }

    #[test]
    fn sample_stops_early_and_cap_applies_to_full_streams() {
        let (ds, backend, _) = setup();
        let e = ds.field("r").unwrap();
        let out = stream(&backend, lower(&e).unwrap(), MaterializeMode::Sample(1));
        assert_eq!(out, vec![Some(Value::Int32(10))]);
        assert_eq!(backend.metrics().snapshot().values_emitted, 1);

        let capped = LocalBackend::new(Arc::clone(backend.provider())).with_config(EngineConfig {
            max_collect_rows: Some(1),
            ..EngineConfig::default()
        });
        let err = capped
            .execute(Arc::new(lower(&e).unwrap()), MaterializeMode::FullStream)
            .err()
            .unwrap();
        assert!(err.to_string().contains("cap of 1"));
    }

    #[test]
    fn single_value_rejects_indexed_plans() {
        let (ds, backend, _) = setup();
        let plan = lower(&ds.field("r").unwrap()).unwrap();
        assert!(backend
            .execute(Arc::new(plan), MaterializeMode::SingleValue)
            .is_err());
    }

    #[test]
    fn long_chains_evaluate_without_recursion() {
        let (_, backend, _) = setup();
        let mut e = lit(0i64).unwrap();
        for _ in 0..100_000 {
            e = e.add(1i64).unwrap();
        }
        let out = stream(&backend, lower(&e).unwrap(), MaterializeMode::SingleValue);
        assert_eq!(out, vec![Some(Value::Int64(100_000))]);
    }

    #[test]
    fn row_aggregates_leave_the_cache_as_the_stream_moves_on() {
        let (ds, _, provider) = setup();
        let e = ds.field("e").unwrap();
        let centered = e.sub(e.sum(&Axis::column()).unwrap()).unwrap();
        let plan = Arc::new(lower(&centered).unwrap());
        let runner = Runner::new(plan, Arc::new(provider), Arc::new(BackendMetrics::default()));
        let mut rows = runner.rows().unwrap();
        let mut out = Vec::new();
        while let Some(d) = rows.next() {
            out.push(d.unwrap());
            assert!(rows.runner.aggregates.len() <= 1);
        }
        assert_eq!(
            out,
            vec![
                Some(Value::Int64(-2)),
                Some(Value::Int64(-1)),
                None,
                Some(Value::Int64(-11)),
                Some(Value::Int64(-10)),
                Some(Value::Int64(-9)),
            ]
        );
        assert!(rows.runner.aggregates.is_empty());
    }

    #[test]
    fn branches_and_operands_follow_their_missing_rule() {
        let (ds, backend, _) = setup();
        let e = ds.field("e").unwrap();
        let picked = if_else(e.is_defined(), e.clone(), lit(-1i32).unwrap()).unwrap();
        let out = stream(&backend, lower(&picked).unwrap(), MaterializeMode::FullStream);
        assert_eq!(out[2], Some(Value::Int32(-1)));
        assert_eq!(out[3], Some(Value::Int32(4)));

        let first = coalesce(&[e.clone(), ds.field("r").unwrap()]).unwrap();
        let out = stream(&backend, lower(&first).unwrap(), MaterializeMode::FullStream);
        assert_eq!(out[1], Some(Value::Int32(2)));
        assert_eq!(out[2], Some(Value::Int32(10)));

        // false settles `and` even when the right operand is missing
        let settled = e.gt(100).unwrap().and(e.gt(0).unwrap()).unwrap();
        let out = stream(&backend, lower(&settled).unwrap(), MaterializeMode::FullStream);
        assert_eq!(out[2], None);
        assert_eq!(out[0], Some(Value::Boolean(false)));
    }
}
