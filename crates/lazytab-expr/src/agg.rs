//! Aggregation along a named axis.
//!
//! Aggregating removes the axis from the operand's scope; the result varies
//! along whatever axes remain. Missing elements are skipped by every
//! aggregator except [`Expr::count_all`].
//!
//! Results over an empty (or all-Missing) input: `sum` and the counts are 0,
//! `any` is false, `all` is true, `collect` is empty, and `min`, `max`,
//! `mean` and `fraction` are Missing.

use lazytab_core::error::Result;
use lazytab_core::scope::Axis;

use crate::expr::{Expr, ExprKind};
use crate::ops::AggOp;

impl Expr {
    pub fn aggregate(&self, op: AggOp, axis: &Axis) -> Result<Expr> {
        let ty = op.result_type(self.ty())?;
        let scope = self.scope().reduce(axis)?;
        Ok(Expr::from_parts(
            ExprKind::Aggregate {
                op,
                axis: axis.clone(),
                arg: self.clone(),
            },
            ty,
            scope,
            op.rule(),
        ))
    }

    pub fn sum(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Sum, axis)
    }

    /// Number of present elements.
    pub fn count(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Count, axis)
    }

    /// Number of elements, Missing included.
    pub fn count_all(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::CountAll, axis)
    }

    pub fn min(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Min, axis)
    }

    pub fn max(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Max, axis)
    }

    pub fn mean(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Mean, axis)
    }

    /// Present elements in iteration order.
    pub fn collect(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Collect, axis)
    }

    pub fn collect_as_set(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::CollectAsSet, axis)
    }

    pub fn any(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Any, axis)
    }

    pub fn all(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::All, axis)
    }

    /// Share of present elements that are true.
    pub fn fraction(&self, axis: &Axis) -> Result<Expr> {
        self.aggregate(AggOp::Fraction, axis)
    }
}

#[cfg(test)]
mod tests {
    use crate::build::{lit, FieldRef};
    use lazytab_core::error::Error;
    use lazytab_core::schema::{DatasetRef, DatasetSchema};
    use lazytab_core::scope::{Axis, AxisSet};
    use lazytab_core::types::ValueType;

    fn matrix() -> DatasetRef {
        DatasetRef::new(
            DatasetSchema::matrix("m")
                .with_field("e", ValueType::Float32, &["row", "column"])
                .with_field("flag", ValueType::Boolean, &["row"]),
        )
        .unwrap()
    }

    #[test]
    fn reduces_one_axis_at_a_time() {
        let m = matrix();
        let per_col = m.field("e").unwrap().sum(&Axis::row()).unwrap();
        assert_eq!(per_col.scope().axes(), &AxisSet::single(Axis::column()));
        assert_eq!(per_col.ty(), &ValueType::Float64);
        let total = per_col.mean(&Axis::column()).unwrap();
        assert!(total.scope().can_force_value());
    }

    #[test]
    fn type_and_axis_checks() {
        let m = matrix();
        let flag = m.field("flag").unwrap();
        assert!(flag.sum(&Axis::row()).is_err());
        assert_eq!(
            flag.fraction(&Axis::row()).unwrap().ty(),
            &ValueType::Float64
        );
        assert!(matches!(
            flag.any(&Axis::new("sample")),
            Err(Error::IncompatibleScope(_))
        ));
        assert!(matches!(
            lit(1).unwrap().count(&Axis::row()),
            Err(Error::IncompatibleScope(_))
        ));
    }

    #[test]
    fn collect_wraps_element_type() {
        let m = matrix();
        let c = m.field("e").unwrap().collect(&Axis::column()).unwrap();
        assert_eq!(c.ty(), &ValueType::array(ValueType::Float32));
        assert_eq!(c.scope().axes(), &AxisSet::single(Axis::row()));
    }
}
