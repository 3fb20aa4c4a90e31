//! Monthly partition keys.
//!
//! - A partition covers one calendar month, keyed `year*100 + month`.
//! - Its name is `p<year><2-digit month>` (`p202401`).
//! - Its `VALUES LESS THAN` boundary is the key of the *next* month.
//! - Month arithmetic goes through a linear index `year*12 + (month-1)` so
//!   December → January needs no special casing.
//!
//! Everything here is pure; nothing touches the database.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

use crate::error::{AnalyticsError, Result};

/// Name of the open-ended catch-all partition.
pub const CATCH_ALL: &str = "pmax";

/// One calendar month, the unit of partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionMonth {
    year: i32,
    month: u32,
}

impl PartitionMonth {
    /// `month` must be in `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(AnalyticsError::InvalidMonth(month));
        }
        Ok(Self { year, month })
    }

    /// Month containing `date`.
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Month with key `year*100 + month`, if the key is well formed.
    pub fn from_key(key: i32) -> Option<Self> {
        let month = u32::try_from(key.rem_euclid(100)).ok()?;
        Self::new(key.div_euclid(100), month).ok()
    }

    /// Calendar year.
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Calendar month, `1..=12`.
    pub const fn month(self) -> u32 {
        self.month
    }

    /// `year*100 + month`, the value the partition expression produces.
    pub const fn key(self) -> i32 {
        self.year * 100 + self.month as i32
    }

    /// The following month.
    pub fn next(self) -> Self {
        self.plus(1)
    }

    /// `n` months later.
    pub fn plus(self, n: u32) -> Self {
        let idx = self.index() + i64::from(n);
        Self::from_index(idx)
    }

    /// `p<year><MM>`.
    pub fn partition_name(self) -> String {
        format!("p{}{:02}", self.year, self.month)
    }

    /// `VALUES LESS THAN` value: key of the next month.
    pub fn boundary(self) -> i32 {
        self.next().key()
    }

    /// First day of the month.
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    fn index(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month - 1)
    }

    fn from_index(idx: i64) -> Self {
        let year = idx.div_euclid(12) as i32;
        let month = idx.rem_euclid(12) as u32 + 1;
        Self { year, month }
    }
}

/// `p<year><MM>` for the given month; `month` must be in `1..=12`.
pub fn partition_name(year: i32, month: u32) -> Result<String> {
    Ok(PartitionMonth::new(year, month)?.partition_name())
}

/// True for names produced by [`PartitionMonth::partition_name`].
pub fn is_monthly_partition_name(name: &str) -> bool {
    parse_partition_name(name).is_some()
}

/// Inverse of [`PartitionMonth::partition_name`].
pub fn parse_partition_name(name: &str) -> Option<PartitionMonth> {
    let digits = name.strip_prefix('p')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let key: i32 = digits.parse().ok()?;
    PartitionMonth::from_key(key)
}

/// Every partition name whose month intersects `[start, end]`, in order.
///
/// Walks month by month from `start`'s month to `end`'s month inclusive. An
/// inverted range yields nothing.
pub fn partition_names_for_range(start: NaiveDateTime, end: NaiveDateTime) -> Vec<String> {
    months_in_range(start.date(), end.date())
        .map(PartitionMonth::partition_name)
        .collect()
}

/// Months touched by `[start, end]`, inclusive on both ends.
pub fn months_in_range(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = PartitionMonth> {
    let first = PartitionMonth::of(start);
    let last = PartitionMonth::of(end);
    let count = (last.index() - first.index() + 1).max(0);
    (0..count).map(move |n| PartitionMonth::from_index(first.index() + n))
}

/// Retention cutoff key: `today - months_to_keep*30 days`, as `year*100+month`.
///
/// Partitions whose boundary is strictly below this value are eligible for
/// dropping. The 30-day month is an approximation; see DESIGN.md.
pub fn retention_cutoff(today: NaiveDate, months_to_keep: u32) -> i32 {
    let cutoff = today
        .checked_sub_days(Days::new(u64::from(months_to_keep) * 30))
        .unwrap_or(NaiveDate::MIN);
    PartitionMonth::of(cutoff).key()
}
