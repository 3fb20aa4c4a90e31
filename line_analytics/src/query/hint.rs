//! Which partitions a detection read may name in `PARTITION (...)`.
//!
//! A hint only narrows the scan. MySQL rejects a `PARTITION` clause naming a
//! partition the table does not have, so a hint built from calendar months
//! alone is only safe when every month in the range has its own partition.
//! [`PartitionHint::covering`] works from the catalog instead: it keeps each
//! existing partition whose `VALUES LESS THAN` range overlaps the filter's
//! months, including `pmax` when the range runs past the last explicit month.

use chrono::NaiveDateTime;

use crate::partition::{PartitionInfo, PartitionMonth, partition_names_for_range};

/// Scan restriction rendered after the fact-table reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartitionHint {
    /// Let the optimizer prune; no `PARTITION` clause.
    #[default]
    Whole,
    /// Read only these partitions.
    Only(Vec<String>),
}

impl PartitionHint {
    /// `p<YYYYMM>` for every month touched by `[start, end]`.
    ///
    /// Assumes each of those months has been created as its own partition.
    pub fn for_range(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::from_names(partition_names_for_range(start, end))
    }

    /// The partitions of `existing` that can hold rows in `[start, end]`.
    ///
    /// `existing` must be in ordinal order, as the catalog lists it. Partition
    /// `i` holds month keys in `[boundary(i - 1), boundary(i))`; the first
    /// partition also holds everything older, which is where rows of retired
    /// months would land. Falls back to [`PartitionHint::Whole`] when the table
    /// is not partitioned or a boundary does not parse.
    pub fn covering(existing: &[PartitionInfo], start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let first = PartitionMonth::of(start.date()).key();
        let last = PartitionMonth::of(end.date()).key();

        let mut lower = i32::MIN;
        let mut names = Vec::new();
        for part in existing {
            let upper = match part.boundary() {
                Some(boundary) => boundary,
                None if part.is_max_value() => i32::MAX,
                None => return Self::Whole,
            };
            if lower <= last && upper > first {
                names.push(part.name.clone());
            }
            lower = upper;
        }
        Self::from_names(names)
    }

    fn from_names(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self::Whole
        } else {
            Self::Only(names)
        }
    }

    /// Partition names, empty for [`PartitionHint::Whole`].
    pub fn names(&self) -> &[String] {
        match self {
            Self::Whole => &[],
            Self::Only(names) => names,
        }
    }
}
