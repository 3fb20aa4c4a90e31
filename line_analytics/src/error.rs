//! Error type shared by the partition, query, cache and service layers.
//!
//! Validation variants are raised before anything touches the database.
//! "Already exists" outcomes are not errors; the operations that can hit them
//! return `Ok(false)` instead.

use thiserror::Error;

/// Errors surfaced by this crate.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A line id that cannot be formatted into a table name.
    #[error("line id must be a positive integer, got {0}")]
    InvalidLineId(i64),

    /// Month outside `1..=12`.
    #[error("month must be in 1..=12, got {0}")]
    InvalidMonth(u32),

    /// Interval string not in the supported set.
    #[error("unknown aggregation interval: {0:?}")]
    InvalidInterval(String),

    /// A filter that fails range or id checks.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Page or page size out of range.
    #[error("invalid page request: {0}")]
    InvalidPage(String),

    /// A string that is not a managed fact-table name.
    #[error("not a fact table name: {0:?}")]
    InvalidTableName(String),

    /// A new partition would break contiguity of the range.
    #[error("cannot add partition {partition} to {table}: {reason}")]
    PartitionOrder {
        /// Fact table being reorganized.
        table: String,
        /// Partition that was requested.
        partition: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A lookup that has no answer, e.g. a line without areas.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of thing that was looked up.
        entity: &'static str,
        /// The key that missed.
        key: String,
    },

    /// No cache slot exists for the tenant.
    #[error("no metadata cache for tenant {0}")]
    UnknownTenant(String),

    /// Opening a database connection failed.
    #[error("database connection failed")]
    Connection(#[from] diesel::ConnectionError),

    /// A statement failed on the database side.
    #[error("{context}")]
    Backend {
        /// What was being done, including the table involved.
        context: String,
        /// Driver error.
        #[source]
        source: diesel::result::Error,
    },
}

/// Crate result alias.
pub type Result<T, E = AnalyticsError> = std::result::Result<T, E>;

impl AnalyticsError {
    /// Returns a `map_err` adapter that wraps a driver error with `context`.
    pub fn backend(context: impl Into<String>) -> impl FnOnce(diesel::result::Error) -> Self {
        let context = context.into();
        move |source| AnalyticsError::Backend { context, source }
    }

    /// True for errors caused by bad caller input rather than the database.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AnalyticsError::InvalidLineId(_)
                | AnalyticsError::InvalidMonth(_)
                | AnalyticsError::InvalidInterval(_)
                | AnalyticsError::InvalidFilter(_)
                | AnalyticsError::InvalidPage(_)
                | AnalyticsError::InvalidTableName(_)
                | AnalyticsError::PartitionOrder { .. }
        )
    }

    /// True for `NotFound` and `UnknownTenant`.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AnalyticsError::NotFound { .. } | AnalyticsError::UnknownTenant(_)
        )
    }
}
