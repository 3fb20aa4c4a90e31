//! Per-line fact tables and their DDL.
//!
//! Each production line gets its own detection table and downtime table. The
//! table name embeds the line id, which is why only a validated [`LineId`]
//! can produce a [`FactTableName`].

use std::fmt;

use crate::{
    error::{AnalyticsError, Result},
    partition::naming::{CATCH_ALL, PartitionMonth},
    spec::LineId,
};

/// Kind of per-line fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactTable {
    /// `detection_line_<id>`: one row per detected item.
    Detections,
    /// `downtime_events_<id>`: one row per stoppage.
    Downtime,
}

impl FactTable {
    /// Both kinds, in creation order.
    pub const ALL: [FactTable; 2] = [FactTable::Detections, FactTable::Downtime];

    /// Table-name prefix; the line id follows it.
    pub const fn prefix(self) -> &'static str {
        match self {
            FactTable::Detections => "detection_line_",
            FactTable::Downtime => "downtime_events_",
        }
    }

    /// Timestamp column the range partitioning is keyed on.
    pub const fn partition_column(self) -> &'static str {
        match self {
            FactTable::Detections => "detected_at",
            FactTable::Downtime => "start_time",
        }
    }

    /// Table for `line_id`.
    pub fn table_name(self, line_id: LineId) -> FactTableName {
        FactTableName {
            kind: self,
            line_id,
            name: format!("{}{}", self.prefix(), line_id),
        }
    }

    fn columns(self) -> &'static str {
        match self {
            FactTable::Detections => {
                "    id BIGINT NOT NULL AUTO_INCREMENT,
    detected_at DATETIME NOT NULL,
    area_id INT NOT NULL,
    product_id INT NOT NULL,
    PRIMARY KEY (id, detected_at),
    INDEX idx_detected_at (detected_at),
    INDEX idx_area_time (area_id, detected_at),
    INDEX idx_product_time (product_id, detected_at)"
            }
            FactTable::Downtime => {
                "    id BIGINT NOT NULL AUTO_INCREMENT,
    start_time DATETIME NOT NULL,
    end_time DATETIME NULL,
    duration_seconds INT NULL,
    reason_code VARCHAR(64) NULL,
    reason TEXT NULL,
    PRIMARY KEY (id, start_time),
    INDEX idx_start_time (start_time),
    INDEX idx_end_time (end_time)"
            }
        }
    }

    /// `CREATE TABLE` with one partition per month in `months` plus `pmax`.
    ///
    /// `months` must be consecutive and ascending.
    pub fn create_table_ddl(self, table: &FactTableName, months: &[PartitionMonth]) -> String {
        let col = self.partition_column();
        let mut parts: Vec<String> = months.iter().map(|m| partition_clause(*m)).collect();
        parts.push(catch_all_clause());
        format!(
            "CREATE TABLE {table} (\n{columns}\n) ENGINE=InnoDB\nPARTITION BY RANGE (YEAR({col}) * 100 + MONTH({col})) (\n    {parts}\n)",
            columns = self.columns(),
            parts = parts.join(",\n    "),
        )
    }
}

impl fmt::Display for FactTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactTable::Detections => f.write_str("detections"),
            FactTable::Downtime => f.write_str("downtime"),
        }
    }
}

/// `PARTITION pYYYYMM VALUES LESS THAN (<boundary>)`.
pub fn partition_clause(month: PartitionMonth) -> String {
    format!(
        "PARTITION {} VALUES LESS THAN ({})",
        month.partition_name(),
        month.boundary()
    )
}

fn catch_all_clause() -> String {
    format!("PARTITION {CATCH_ALL} VALUES LESS THAN MAXVALUE")
}

/// `ALTER TABLE .. REORGANIZE PARTITION pmax INTO (<month>, pmax)`.
pub fn reorganize_ddl(table: &FactTableName, month: PartitionMonth) -> String {
    format!(
        "ALTER TABLE {table} REORGANIZE PARTITION {CATCH_ALL} INTO ({}, {})",
        partition_clause(month),
        catch_all_clause()
    )
}

/// `ALTER TABLE .. DROP PARTITION <month>`.
pub fn drop_partition_ddl(table: &FactTableName, month: PartitionMonth) -> String {
    format!(
        "ALTER TABLE {table} DROP PARTITION {}",
        month.partition_name()
    )
}

/// A fact-table name known to be `<prefix><positive line id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FactTableName {
    kind: FactTable,
    line_id: LineId,
    name: String,
}

impl FactTableName {
    /// Parses `detection_line_<id>` / `downtime_events_<id>`.
    pub fn parse(raw: &str) -> Result<Self> {
        FactTable::ALL
            .into_iter()
            .find_map(|kind| {
                let digits = raw.strip_prefix(kind.prefix())?;
                if digits.is_empty()
                    || digits.starts_with('0')
                    || !digits.bytes().all(|b| b.is_ascii_digit())
                {
                    return None;
                }
                let id = LineId::new(digits.parse().ok()?).ok()?;
                Some(kind.table_name(id))
            })
            .ok_or_else(|| AnalyticsError::InvalidTableName(raw.to_string()))
    }

    /// Which kind of table this is.
    pub fn kind(&self) -> FactTable {
        self.kind
    }

    /// Line the table belongs to.
    pub fn line_id(&self) -> LineId {
        self.line_id
    }

    /// The table name.
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FactTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
