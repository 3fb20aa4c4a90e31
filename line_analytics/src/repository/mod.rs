//! Detection reads: build, execute, shape.
//!
//! [`DetectionRepository`] borrows a [`QueryRunner`] (normally the caller's
//! connection) for the duration of one logical operation. It never retries and
//! never swallows errors; driver failures come back as
//! [`AnalyticsError::Backend`] with the table in the context.
//!
//! With hinting on, each operation first reads the table's partition list and
//! restricts the scan to the partitions that can hold the range
//! ([`PartitionHint::covering`]), so a hinted read returns the same rows as an
//! unhinted one.

pub mod runner;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::{
    error::{AnalyticsError, Result},
    interval::AggregationInterval,
    partition::FactTable,
    query::{PartitionHint, QueryBuilder, Statement},
    spec::{LineId, QueryFilterSpec, validate_page},
};

pub use runner::{AggregateRecord, CountRow, DetectionRecord, QueryRunner};

/// One page of results plus the counts needed to render pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Rows matching the filter across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    /// `ceil(total / page_size)`; 0 when nothing matched.
    pub pages: u64,
    /// Requested page size.
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Same envelope around different rows.
    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Page<U> {
        Page {
            data: f(self.data),
            total: self.total,
            page: self.page,
            pages: self.pages,
            page_size: self.page_size,
        }
    }
}

/// Number of pages for `total` rows.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

/// Executes detection queries for one line table at a time.
pub struct DetectionRepository<'r, R: QueryRunner + ?Sized> {
    runner: &'r mut R,
    use_partition_hint: bool,
}

impl<'r, R: QueryRunner + ?Sized> DetectionRepository<'r, R> {
    /// Repository that renders partition hints.
    pub fn new(runner: &'r mut R) -> Self {
        Self {
            runner,
            use_partition_hint: true,
        }
    }

    /// Turns partition hints on or off.
    ///
    /// Off saves the partition-list lookup per operation and leaves pruning to
    /// the optimizer.
    pub fn with_partition_hint(mut self, use_partition_hint: bool) -> Self {
        self.use_partition_hint = use_partition_hint;
        self
    }

    /// Whether statements carry `PARTITION (...)`.
    pub fn uses_partition_hint(&self) -> bool {
        self.use_partition_hint
    }

    fn context(line_id: LineId, what: &str) -> String {
        format!("{what} on {}", FactTable::Detections.table_name(line_id))
    }

    /// Hint for a read of `line_id` over `[start, end]`.
    async fn hint(
        &mut self,
        line_id: LineId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<PartitionHint> {
        if !self.use_partition_hint {
            return Ok(PartitionHint::Whole);
        }
        let table = FactTable::Detections.table_name(line_id);
        let existing = self
            .runner
            .fetch_partitions(table.as_str())
            .await
            .map_err(AnalyticsError::backend(Self::context(line_id, "list partitions")))?;
        let hint = PartitionHint::covering(&existing, start, end);
        debug!(partitions = ?hint.names(), "partition hint");
        Ok(hint)
    }

    async fn spec_hint(&mut self, spec: &QueryFilterSpec) -> Result<PartitionHint> {
        self.hint(spec.line_id(), spec.start_date(), spec.end_date()).await
    }

    async fn count(&mut self, line_id: LineId, stmt: &Statement) -> Result<u64> {
        debug!(sql = stmt.sql(), "count");
        let total = self
            .runner
            .fetch_count(stmt)
            .await
            .map_err(AnalyticsError::backend(Self::context(line_id, "count detections")))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    /// All detections matching `spec`, ordered by `detected_at`.
    #[instrument(skip_all, fields(line_id = %spec.line_id()))]
    pub async fn get_detections(&mut self, spec: &QueryFilterSpec) -> Result<Vec<DetectionRecord>> {
        let hint = self.spec_hint(spec).await?;
        let stmt = QueryBuilder::build_select_query(spec, &hint);
        debug!(sql = stmt.sql(), "select detections");
        self.runner
            .fetch_detections(&stmt)
            .await
            .map_err(AnalyticsError::backend(Self::context(spec.line_id(), "select detections")))
    }

    /// One page of detections plus the total count.
    ///
    /// Runs the count first and skips the select when nothing matches.
    #[instrument(skip(self, spec), fields(line_id = %spec.line_id()))]
    pub async fn get_detections_paginated(
        &mut self,
        spec: &QueryFilterSpec,
        page: u32,
        page_size: u32,
    ) -> Result<Page<DetectionRecord>> {
        validate_page(page, page_size)?;

        let hint = self.spec_hint(spec).await?;
        let count_stmt = QueryBuilder::build_count_query(spec, &hint);
        let total = self.count(spec.line_id(), &count_stmt).await?;

        let data = if total == 0 {
            Vec::new()
        } else {
            let offset = i64::from(page - 1) * i64::from(page_size);
            let stmt = QueryBuilder::with_pagination(
                QueryBuilder::build_select_query(spec, &hint),
                i64::from(page_size),
                offset,
            );
            debug!(sql = stmt.sql(), "select detection page");
            self.runner.fetch_detections(&stmt).await.map_err(AnalyticsError::backend(
                Self::context(spec.line_id(), "select detection page"),
            ))?
        };

        Ok(Page {
            data,
            total,
            page,
            pages: page_count(total, page_size),
            page_size,
        })
    }

    /// Counts per time bucket, area and product.
    #[instrument(skip_all, fields(line_id = %spec.line_id(), interval = %interval))]
    pub async fn get_aggregated_detections(
        &mut self,
        spec: &QueryFilterSpec,
        interval: AggregationInterval,
    ) -> Result<Vec<AggregateRecord>> {
        let hint = self.spec_hint(spec).await?;
        let stmt = QueryBuilder::build_aggregate_query(spec, interval, &hint);
        debug!(sql = stmt.sql(), "aggregate detections");
        self.runner
            .fetch_buckets(&stmt)
            .await
            .map_err(AnalyticsError::backend(Self::context(spec.line_id(), "aggregate detections")))
    }

    /// Detections on `area_id` within `[start, end]`.
    #[instrument(skip(self, line_id), fields(line_id = %line_id))]
    pub async fn count_detections_by_area(
        &mut self,
        line_id: LineId,
        area_id: i32,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<u64> {
        if end <= start {
            return Err(AnalyticsError::InvalidFilter(format!(
                "end {end} must be after start {start}"
            )));
        }
        let hint = self.hint(line_id, start, end).await?;
        let stmt = QueryBuilder::build_area_count_query(line_id, area_id, start, end, &hint)?;
        self.count(line_id, &stmt).await
    }
}
