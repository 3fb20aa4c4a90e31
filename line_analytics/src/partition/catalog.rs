//! Database surface the partition manager needs.
//!
//! The MySQL implementation lives in [`crate::db::mysql`]; tests use an
//! in-memory catalog.

use async_trait::async_trait;
use serde::Serialize;

use crate::partition::naming::{CATCH_ALL, PartitionMonth, parse_partition_name};

/// One row of the partition catalog for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionInfo {
    /// Partition name, e.g. `p202401` or `pmax`.
    pub name: String,
    /// Raw `VALUES LESS THAN` description; `MAXVALUE` for the catch-all.
    pub description: Option<String>,
    /// Storage engine's row estimate.
    pub row_estimate: i64,
}

impl PartitionInfo {
    /// True for the `pmax` partition.
    pub fn is_catch_all(&self) -> bool {
        self.name == CATCH_ALL
    }

    /// True when the description is `MAXVALUE`, whatever the name.
    pub fn is_max_value(&self) -> bool {
        self.description
            .as_deref()
            .is_some_and(|d| d.trim().eq_ignore_ascii_case("MAXVALUE"))
    }

    /// Numeric boundary, when the description parses as an integer.
    pub fn boundary(&self) -> Option<i32> {
        self.description.as_deref()?.trim().parse().ok()
    }

    /// Month this partition covers, when its name is a monthly partition name.
    pub fn month(&self) -> Option<PartitionMonth> {
        parse_partition_name(&self.name)
    }
}

/// Catalog reads and DDL execution for partitioned tables.
#[async_trait]
pub trait PartitionCatalog: Send {
    /// Whether `table` exists in the current schema.
    async fn table_exists(&mut self, table: &str) -> Result<bool, diesel::result::Error>;

    /// Runs one DDL statement. A failed statement must leave the table as it
    /// was (MySQL 8 DDL is atomic).
    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), diesel::result::Error>;

    /// Partitions of `table` in ordinal order; empty if the table does not exist.
    async fn list_partitions(
        &mut self,
        table: &str,
    ) -> Result<Vec<PartitionInfo>, diesel::result::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, desc: Option<&str>) -> PartitionInfo {
        PartitionInfo {
            name: name.into(),
            description: desc.map(str::to_string),
            row_estimate: 0,
        }
    }

    #[test]
    fn boundary_parsing() {
        assert_eq!(info("p202401", Some("202402")).boundary(), Some(202402));
        assert_eq!(info("pmax", Some("MAXVALUE")).boundary(), None);
        assert_eq!(info("p202401", None).boundary(), None);
        assert!(info("pmax", Some("MAXVALUE")).is_catch_all());
        assert!(info("pmax", Some("MAXVALUE")).is_max_value());
        assert!(!info("p202401", Some("202402")).is_max_value());
        assert_eq!(
            info("p202401", Some("202402")).month(),
            PartitionMonth::new(2024, 1).ok()
        );
    }
}
