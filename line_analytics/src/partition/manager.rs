//! Partition lifecycle for per-line fact tables: create, extend, retire.
//!
//! ## Invariants
//! Every managed table is `PARTITION BY RANGE (YEAR(ts)*100 + MONTH(ts))`
//! with one partition per calendar month followed by exactly one `pmax`
//! catch-all. New months are only ever carved out of `pmax`, and only the
//! month immediately after the last explicit partition may be added, so the
//! explicit partitions stay contiguous and each name matches the month it
//! holds (the query layer's partition hints depend on that).
//!
//! ## Failure policy
//! - `CREATE` / `REORGANIZE` failures are logged and returned as
//!   [`AnalyticsError::Backend`] with the table in the context.
//! - Retention drops are independent: a failed drop is logged and skipped
//!   and the rest still run.
//!
//! ## Concurrency
//! Callers must serialize structural changes to the same table; two
//! concurrent reorganizations of one `pmax` are not safe.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    error::{AnalyticsError, Result},
    partition::{
        catalog::{PartitionCatalog, PartitionInfo},
        fact_table::{FactTable, FactTableName, drop_partition_ddl, reorganize_ddl},
        naming::{CATCH_ALL, PartitionMonth, partition_names_for_range, retention_cutoff},
    },
    spec::LineId,
};

/// Default number of monthly partitions created up front.
pub const DEFAULT_MONTHS_AHEAD: u32 = 12;
/// Default retention, in (30-day) months.
pub const DEFAULT_MONTHS_TO_KEEP: u32 = 12;

/// Stateless manager; everything it knows comes from the catalog it is handed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartitionManager;

fn ddl_failure(context: String) -> impl FnOnce(diesel::result::Error) -> AnalyticsError {
    move |source| {
        error!(error = %source, "{context}");
        AnalyticsError::Backend { context, source }
    }
}

/// Highest `VALUES LESS THAN` among explicit monthly partitions.
fn highest_boundary(partitions: &[PartitionInfo]) -> Option<i32> {
    partitions
        .iter()
        .filter(|p| !p.is_catch_all())
        .filter_map(PartitionInfo::boundary)
        .max()
}

impl PartitionManager {
    /// Create a new manager.
    pub fn new() -> Self {
        Self
    }

    /// Creates `fact`'s table for `line_id` with `months_ahead` monthly
    /// partitions starting at `start_date`'s month (default: this month) plus
    /// `pmax`.
    ///
    /// Returns `Ok(false)` without touching anything if the table exists.
    #[instrument(skip_all, fields(kind = %fact, line_id = %line_id, months_ahead = months_ahead))]
    pub async fn create_table_with_partitions<C>(
        &self,
        db: &mut C,
        fact: FactTable,
        line_id: LineId,
        start_date: Option<NaiveDate>,
        months_ahead: u32,
    ) -> Result<bool>
    where
        C: PartitionCatalog + ?Sized,
    {
        let table = fact.table_name(line_id);

        let exists = db
            .table_exists(table.as_str())
            .await
            .map_err(AnalyticsError::backend(format!("check whether {table} exists")))?;
        if exists {
            info!(%table, "table already exists, nothing to create");
            return Ok(false);
        }

        let first = PartitionMonth::of(start_date.unwrap_or_else(|| Utc::now().date_naive()));
        let months: Vec<PartitionMonth> = (0..months_ahead).map(|n| first.plus(n)).collect();
        let ddl = fact.create_table_ddl(&table, &months);
        debug!(%ddl, "creating partitioned table");

        db.execute_ddl(&ddl)
            .await
            .map_err(ddl_failure(format!("failed to create partitioned table {table}")))?;

        info!(
            %table,
            first = %first.partition_name(),
            partitions = months.len(),
            "created partitioned table"
        );
        Ok(true)
    }

    /// Splits `pmax` into `p<year><month>` and a new `pmax`.
    ///
    /// - `month` outside `1..=12` → [`AnalyticsError::InvalidMonth`].
    /// - Partition already present → `Ok(false)`, nothing changes.
    /// - A month that is not directly after the last explicit partition →
    ///   [`AnalyticsError::PartitionOrder`].
    ///
    /// The last rule is stricter than a bare `REORGANIZE PARTITION`, which
    /// would split `pmax` at any later month. Such a split leaves a partition
    /// named for one month that also holds every skipped month, so names stop
    /// matching contents. Add several months in order with
    /// [`PartitionManager::ensure_partitions_ahead`].
    #[instrument(skip(self, db, table), fields(table = %table))]
    pub async fn add_future_partition<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
        year: i32,
        month: u32,
    ) -> Result<bool>
    where
        C: PartitionCatalog + ?Sized,
    {
        let month = PartitionMonth::new(year, month)?;
        let name = month.partition_name();
        let existing = self.get_existing_partitions(db, table).await?;

        if existing.iter().any(|p| p.name == name) {
            debug!(partition = %name, "partition already exists");
            return Ok(false);
        }

        let order_error = |reason: String| AnalyticsError::PartitionOrder {
            table: table.to_string(),
            partition: name.clone(),
            reason,
        };

        if !existing.iter().any(PartitionInfo::is_catch_all) {
            return Err(order_error(format!(
                "table has no {CATCH_ALL} partition to reorganize"
            )));
        }
        if let Some(high) = highest_boundary(&existing) {
            if month.key() < high {
                return Err(order_error(format!(
                    "months before {high} are already covered"
                )));
            }
            if month.key() > high {
                let expected = PartitionMonth::from_key(high)
                    .map(PartitionMonth::partition_name)
                    .unwrap_or_else(|| high.to_string());
                return Err(order_error(format!(
                    "would leave a gap; the next partition must be {expected}"
                )));
            }
        }

        let ddl = reorganize_ddl(table, month);
        debug!(%ddl, "reorganizing catch-all partition");
        db.execute_ddl(&ddl).await.map_err(ddl_failure(format!(
            "failed to reorganize {CATCH_ALL} of {table} into {name}"
        )))?;

        info!(partition = %name, boundary = month.boundary(), "added partition");
        Ok(true)
    }

    /// Adds partitions until the one `months_ahead` months after today exists.
    ///
    /// Returns how many partitions were added.
    pub async fn ensure_partitions_ahead<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
        months_ahead: u32,
    ) -> Result<usize>
    where
        C: PartitionCatalog + ?Sized,
    {
        self.ensure_partitions_ahead_at(db, table, months_ahead, Utc::now().date_naive())
            .await
    }

    /// [`PartitionManager::ensure_partitions_ahead`] with an explicit "today".
    #[instrument(skip(self, db, table), fields(table = %table))]
    pub async fn ensure_partitions_ahead_at<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
        months_ahead: u32,
        today: NaiveDate,
    ) -> Result<usize>
    where
        C: PartitionCatalog + ?Sized,
    {
        let target = PartitionMonth::of(today).plus(months_ahead);
        let existing = self.get_existing_partitions(db, table).await?;
        let mut next = highest_boundary(&existing)
            .and_then(PartitionMonth::from_key)
            .unwrap_or_else(|| PartitionMonth::of(today));

        let mut added = 0;
        while next <= target {
            if self
                .add_future_partition(db, table, next.year(), next.month())
                .await?
            {
                added += 1;
            }
            next = next.next();
        }
        info!(added, through = %target.partition_name(), "partitions ensured");
        Ok(added)
    }

    /// Drops monthly partitions older than `months_to_keep` (30-day) months.
    ///
    /// Returns the number of partitions dropped.
    pub async fn drop_old_partitions<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
        months_to_keep: u32,
    ) -> Result<usize>
    where
        C: PartitionCatalog + ?Sized,
    {
        self.drop_old_partitions_at(db, table, months_to_keep, Utc::now().date_naive())
            .await
    }

    /// [`PartitionManager::drop_old_partitions`] with an explicit "today".
    ///
    /// Drops every explicit partition whose boundary is strictly below
    /// [`retention_cutoff`]. `pmax` is never dropped. Partitions whose
    /// description is not an integer are skipped.
    #[instrument(skip(self, db, table), fields(table = %table))]
    pub async fn drop_old_partitions_at<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
        months_to_keep: u32,
        today: NaiveDate,
    ) -> Result<usize>
    where
        C: PartitionCatalog + ?Sized,
    {
        let cutoff = retention_cutoff(today, months_to_keep);

        let mut candidates: Vec<(i32, PartitionMonth)> = Vec::new();
        for p in self.get_existing_partitions(db, table).await? {
            if p.is_catch_all() {
                continue;
            }
            let Some(boundary) = p.boundary() else {
                warn!(partition = %p.name, description = ?p.description, "skipping partition with non-numeric boundary");
                continue;
            };
            let Some(month) = p.month() else {
                warn!(partition = %p.name, "skipping partition with unexpected name");
                continue;
            };
            candidates.push((boundary, month));
        }
        candidates.sort_by_key(|(boundary, _)| *boundary);

        let mut dropped = 0;
        for (boundary, month) in candidates.into_iter().filter(|(b, _)| *b < cutoff) {
            let ddl = drop_partition_ddl(table, month);
            match db.execute_ddl(&ddl).await {
                Ok(()) => {
                    dropped += 1;
                    info!(partition = %month.partition_name(), boundary, cutoff, "dropped partition");
                }
                Err(e) => {
                    warn!(partition = %month.partition_name(), error = %e, "failed to drop partition, continuing");
                }
            }
        }
        Ok(dropped)
    }

    /// Catalog view of `table`'s partitions.
    pub async fn get_existing_partitions<C>(
        &self,
        db: &mut C,
        table: &FactTableName,
    ) -> Result<Vec<PartitionInfo>>
    where
        C: PartitionCatalog + ?Sized,
    {
        db.list_partitions(table.as_str())
            .await
            .map_err(AnalyticsError::backend(format!("list partitions of {table}")))
    }

    /// Partition names covering `[start, end]`; pure, no database access.
    pub fn get_partition_names_for_range(start: NaiveDateTime, end: NaiveDateTime) -> Vec<String> {
        partition_names_for_range(start, end)
    }
}
