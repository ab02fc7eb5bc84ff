//! The storage-side contract the engine streams data through.

use lazytab_core::schema::DatasetRef;
use lazytab_core::scope::{Axis, AxisSet};
use lazytab_core::value::Datum;

use crate::error::Result;

/// Values of the requested fields at one position of an axis group.
pub type Record = Vec<Datum>;

/// A finite, lazily produced sequence of records.
pub type RecordStream = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// Supplies dataset contents by axis group.
///
/// Implementations must:
/// - report the extent of every declared axis;
/// - stream the records of an axis group in row-major order over the group's
///   axes in declaration order (the last declared axis varies fastest), one
///   record per position, with values in the order `fields` were requested;
/// - stream the global group (`{}`) as exactly one record.
pub trait DatasetProvider: Send + Sync {
    fn extent(&self, dataset: &DatasetRef, axis: &Axis) -> Result<usize>;

    fn stream(
        &self,
        dataset: &DatasetRef,
        group: &AxisSet,
        fields: &[String],
    ) -> Result<RecordStream>;

    /// Number of records `stream` yields for `group`.
    fn group_len(&self, dataset: &DatasetRef, group: &AxisSet) -> Result<usize> {
        group
            .iter()
            .try_fold(1usize, |acc, a| Ok(acc * self.extent(dataset, a)?))
    }
}
