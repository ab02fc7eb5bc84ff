//! Index scopes: which dataset an expression is tied to and which of its axes
//! the expression varies along.
//!
//! Scopes are derived structurally during construction, so illegal
//! combinations are rejected before any data is touched, and the streaming
//! strategy for a terminal operation is known ahead of execution.
//!
//! Combination rules:
//! - same dataset: union of the axis sets;
//! - one side tied to no dataset (a pure literal computation): absorbed;
//! - two different datasets: [`Error::IncompatibleScope`], even when one side
//!   is axis-free. An axis-free expression over a dataset (a global field, an
//!   aggregation) still reads that dataset when evaluated.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::DatasetRef;

/// A named dimension of variation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Axis(String);

impl Axis {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn row() -> Self {
        Self::new("row")
    }

    pub fn column() -> Self {
        Self::new("column")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unordered set of axes; iterates alphabetically.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AxisSet(BTreeSet<Axis>);

impl AxisSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(axis: Axis) -> Self {
        Self(BTreeSet::from([axis]))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, axis: &Axis) -> bool {
        self.0.contains(axis)
    }

    pub fn is_subset(&self, other: &AxisSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn union(&self, other: &AxisSet) -> AxisSet {
        Self(self.0.union(&other.0).cloned().collect())
    }

    pub fn without(&self, axis: &Axis) -> AxisSet {
        let mut out = self.0.clone();
        out.remove(axis);
        Self(out)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Axis> {
        self.0.iter()
    }

    /// The only axis, if there is exactly one.
    pub fn sole(&self) -> Option<&Axis> {
        if self.0.len() == 1 {
            self.0.iter().next()
        } else {
            None
        }
    }
}

impl FromIterator<Axis> for AxisSet {
    fn from_iter<T: IntoIterator<Item = Axis>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for AxisSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, "}}")
    }
}

/// How a terminal operation has to stream data for a given scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamStrategy {
    /// A single value; aggregations inside may still scan their dataset.
    Broadcast,
    /// One value per position along the axis.
    Scan(Axis),
    /// One value per position in the product of the axes (declaration order).
    CrossScan(Vec<Axis>),
}

impl StreamStrategy {
    /// Axes iterated to produce the stream, slowest first.
    pub fn axes(&self) -> &[Axis] {
        match self {
            StreamStrategy::Broadcast => &[],
            StreamStrategy::Scan(a) => std::slice::from_ref(a),
            StreamStrategy::CrossScan(axes) => axes,
        }
    }
}

/// `(dataset, axes)` an expression depends on.
///
/// Invariant: a scope without a dataset has no axes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    dataset: Option<DatasetRef>,
    axes: AxisSet,
}

impl Default for Scope {
    fn default() -> Self {
        Self::free()
    }
}

impl Scope {
    /// Scope of a pure literal computation.
    pub fn free() -> Self {
        Self {
            dataset: None,
            axes: AxisSet::empty(),
        }
    }

    /// Scope of a field varying along `axes` of `dataset`.
    pub fn of_field(dataset: &DatasetRef, axes: &AxisSet) -> Result<Self> {
        if let Some(undeclared) = axes.iter().find(|a| !dataset.declares(a)) {
            return Err(Error::IncompatibleScope(format!(
                "axis '{undeclared}' is not declared by dataset '{}'",
                dataset.name()
            )));
        }
        Ok(Self {
            dataset: Some(dataset.clone()),
            axes: axes.clone(),
        })
    }

    pub fn dataset(&self) -> Option<&DatasetRef> {
        self.dataset.as_ref()
    }

    pub fn axes(&self) -> &AxisSet {
        &self.axes
    }

    pub fn is_free(&self) -> bool {
        self.dataset.is_none()
    }

    pub fn combine(&self, other: &Scope) -> Result<Scope> {
        match (&self.dataset, &other.dataset) {
            (None, _) => Ok(other.clone()),
            (_, None) => Ok(self.clone()),
            (Some(a), Some(b)) if a == b => Ok(Scope {
                dataset: Some(a.clone()),
                axes: self.axes.union(&other.axes),
            }),
            (Some(a), Some(b)) => Err(Error::IncompatibleScope(format!(
                "cannot combine an expression over '{a}' {} with one over '{b}' {}",
                self.axes, other.axes
            ))),
        }
    }

    pub fn combine_all<'a, I>(scopes: I) -> Result<Scope>
    where
        I: IntoIterator<Item = &'a Scope>,
    {
        scopes
            .into_iter()
            .try_fold(Scope::free(), |acc, s| acc.combine(s))
    }

    /// Only axis-free expressions can be forced to a single value.
    pub fn can_force_value(&self) -> bool {
        self.axes.is_empty()
    }

    /// Scope after aggregating along `axis`.
    pub fn reduce(&self, axis: &Axis) -> Result<Scope> {
        let Some(dataset) = &self.dataset else {
            return Err(Error::IncompatibleScope(format!(
                "cannot aggregate along '{axis}': expression is not tied to any dataset"
            )));
        };
        if !dataset.declares(axis) {
            return Err(Error::IncompatibleScope(format!(
                "cannot aggregate along '{axis}': dataset '{}' declares no such axis",
                dataset.name()
            )));
        }
        Ok(Scope {
            dataset: Some(dataset.clone()),
            axes: self.axes.without(axis),
        })
    }

    /// Reject scopes that vary along axes outside `allowed`; `context` names
    /// the terminal operation that cannot realize them.
    pub fn require_within(&self, allowed: &AxisSet, context: &str) -> Result<()> {
        if self.axes.is_subset(allowed) {
            Ok(())
        } else {
            Err(Error::UnrealizableExpression(format!(
                "{context} accepts expressions indexed by at most {allowed}, found {}",
                self.axes
            )))
        }
    }

    pub fn strategy(&self) -> StreamStrategy {
        match (self.axes.len(), &self.dataset) {
            (0, _) | (_, None) => StreamStrategy::Broadcast,
            (1, _) => match self.axes.sole() {
                Some(a) => StreamStrategy::Scan(a.clone()),
                None => StreamStrategy::Broadcast,
            },
            (_, Some(ds)) => StreamStrategy::CrossScan(ds.schema().ordered_axes(&self.axes)),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dataset {
            Some(ds) => write!(f, "{ds}{}", self.axes),
            None => write!(f, "{{}}"),
        }
    }
}
