//! Monthly range partitioning of per-line fact tables.

pub mod catalog;
pub mod fact_table;
pub mod manager;
pub mod naming;

pub use catalog::{PartitionCatalog, PartitionInfo};
pub use fact_table::{FactTable, FactTableName};
pub use manager::{DEFAULT_MONTHS_AHEAD, DEFAULT_MONTHS_TO_KEEP, PartitionManager};
pub use naming::{PartitionMonth, partition_name, partition_names_for_range};
