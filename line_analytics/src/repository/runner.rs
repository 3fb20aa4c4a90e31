//! Row shapes returned by detection reads and the trait that executes them.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::{
    QueryableByName,
    sql_types::{BigInt, Integer, Timestamp},
};
use serde::Serialize;

use crate::{partition::PartitionInfo, query::Statement};

/// One raw detection.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize)]
pub struct DetectionRecord {
    /// Row id.
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    /// When the item was seen.
    #[diesel(sql_type = Timestamp)]
    pub detected_at: NaiveDateTime,
    /// Area that saw it.
    #[diesel(sql_type = Integer)]
    pub area_id: i32,
    /// Product it was classified as.
    #[diesel(sql_type = Integer)]
    pub product_id: i32,
}

/// Detection count for one `(bucket, area, product)`.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName, Serialize)]
pub struct AggregateRecord {
    /// Bucket start.
    #[diesel(sql_type = Timestamp)]
    pub bucket: NaiveDateTime,
    /// Rows in the bucket.
    #[diesel(sql_type = BigInt)]
    pub detection_count: i64,
    /// Area id.
    #[diesel(sql_type = Integer)]
    pub area_id: i32,
    /// Product id.
    #[diesel(sql_type = Integer)]
    pub product_id: i32,
}

/// Single `total` column of a count query.
#[derive(Debug, Clone, Copy, QueryableByName)]
pub struct CountRow {
    /// `COUNT(*)`.
    #[diesel(sql_type = BigInt)]
    pub total: i64,
}

/// Executes built statements.
///
/// Implemented for the async MySQL connection in [`crate::db::mysql`].
#[async_trait]
pub trait QueryRunner: Send {
    /// Runs a `SELECT COUNT(*) AS total ...` statement.
    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, diesel::result::Error>;

    /// Runs a raw detection select.
    async fn fetch_detections(
        &mut self,
        stmt: &Statement,
    ) -> Result<Vec<DetectionRecord>, diesel::result::Error>;

    /// Runs an aggregate select.
    async fn fetch_buckets(
        &mut self,
        stmt: &Statement,
    ) -> Result<Vec<AggregateRecord>, diesel::result::Error>;

    /// Partitions of `table` in ordinal order, used to resolve partition hints.
    async fn fetch_partitions(
        &mut self,
        table: &str,
    ) -> Result<Vec<PartitionInfo>, diesel::result::Error>;
}
