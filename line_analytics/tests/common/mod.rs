#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::result::{DatabaseErrorKind, Error};
use line_analytics::{
    interval::AggregationInterval,
    metadata::{AreaRow, Filter, MetadataCache, Product, ProductionLine, ReferenceDataSource, Shift},
    partition::{PartitionCatalog, PartitionInfo, PartitionMonth},
    query::{BindValue, Statement},
    repository::{AggregateRecord, DetectionRecord, QueryRunner},
    spec::QueryFilterSpec,
};

pub fn boom() -> Error {
    Error::DatabaseError(DatabaseErrorKind::Unknown, Box::new("boom".to_string()))
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    day(y, m, d).and_hms_opt(h, 0, 0).unwrap()
}

pub fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Filter on `line` over `[start, end]`, validated against a fixed "now".
pub fn filter(line: i64, start: NaiveDateTime, end: NaiveDateTime) -> QueryFilterSpec {
    QueryFilterSpec::new_at(
        line,
        start,
        end,
        AggregationInterval::OneHour,
        dt(2030, 1, 1, 0),
    )
    .unwrap()
}

// ----------------------- partition catalog -----------------------

/// In-memory `information_schema` that understands the DDL the manager emits.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    pub tables: BTreeMap<String, Vec<PartitionInfo>>,
    pub ddl_log: Vec<String>,
    /// DDL containing this text fails without applying.
    pub fail_on: Option<String>,
}

fn parse_partitions(tokens: &[&str]) -> Vec<PartitionInfo> {
    let mut out = Vec::new();
    for i in 0..tokens.len() {
        if tokens[i] == "PARTITION" && tokens.get(i + 2) == Some(&"VALUES") {
            out.push(PartitionInfo {
                name: tokens[i + 1].to_string(),
                description: tokens.get(i + 5).map(|s| s.to_string()),
                row_estimate: 0,
            });
        }
    }
    out
}

impl FakeCatalog {
    pub fn names(&self, table: &str) -> Vec<String> {
        self.tables
            .get(table)
            .map(|ps| ps.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Simulates someone dropping the table behind the manager's back.
    pub fn drop_table(&mut self, table: &str) {
        self.tables.remove(table);
    }

    /// Installs a table with explicit `(name, description)` partitions.
    pub fn insert_table(&mut self, table: &str, partitions: &[(&str, &str)]) {
        self.tables.insert(
            table.to_string(),
            partitions
                .iter()
                .map(|(name, desc)| PartitionInfo {
                    name: name.to_string(),
                    description: Some(desc.to_string()),
                    row_estimate: 0,
                })
                .collect(),
        );
    }

    fn apply(&mut self, ddl: &str) -> Result<(), Error> {
        let flat = ddl.replace(['(', ')', ','], " ");
        let tokens: Vec<&str> = flat.split_whitespace().collect();
        let table = tokens.get(2).map(|s| s.to_string()).ok_or_else(boom)?;

        match (tokens.first().copied(), tokens.get(3).copied()) {
            (Some("CREATE"), _) => {
                if self.tables.contains_key(&table) {
                    return Err(boom());
                }
                self.tables.insert(table, parse_partitions(&tokens));
            }
            (Some("ALTER"), Some("REORGANIZE")) => {
                let parts = self.tables.get_mut(&table).ok_or_else(boom)?;
                let before = parts.len();
                parts.retain(|p| p.name != "pmax");
                if parts.len() == before {
                    return Err(boom());
                }
                parts.extend(parse_partitions(&tokens));
            }
            (Some("ALTER"), Some("DROP")) => {
                let name = tokens.get(5).ok_or_else(boom)?;
                let parts = self.tables.get_mut(&table).ok_or_else(boom)?;
                let before = parts.len();
                parts.retain(|p| p.name != *name);
                if parts.len() == before {
                    return Err(boom());
                }
            }
            _ => return Err(boom()),
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionCatalog for FakeCatalog {
    async fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        Ok(self.tables.contains_key(table))
    }

    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), Error> {
        self.ddl_log.push(ddl.to_string());
        if self.fail_on.as_deref().is_some_and(|f| ddl.contains(f)) {
            return Err(boom());
        }
        self.apply(ddl)
    }

    async fn list_partitions(&mut self, table: &str) -> Result<Vec<PartitionInfo>, Error> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }
}

// ----------------------- query runner -----------------------

/// Serves canned rows and records every statement it is asked to run.
#[derive(Debug, Default)]
pub struct FakeRunner {
    pub detections: Vec<DetectionRecord>,
    pub buckets: Vec<AggregateRecord>,
    /// Answer for filter counts.
    pub total: i64,
    /// Answers for `area_id = ?` counts.
    pub area_totals: HashMap<i32, i64>,
    /// Partition list served for any table; empty means unpartitioned.
    pub partitions: Vec<PartitionInfo>,
    pub partition_lookups: usize,
    pub statements: Vec<Statement>,
    pub fail: bool,
}

impl FakeRunner {
    fn record(&mut self, stmt: &Statement) -> Result<(), Error> {
        self.statements.push(stmt.clone());
        if self.fail { Err(boom()) } else { Ok(()) }
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql()).collect()
    }
}

#[async_trait]
impl QueryRunner for FakeRunner {
    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, Error> {
        self.record(stmt)?;
        if stmt.sql().contains("area_id = ?") {
            let area = match stmt.binds().last() {
                Some(BindValue::Int(id)) => *id,
                _ => return Err(boom()),
            };
            return Ok(self.area_totals.get(&area).copied().unwrap_or(0));
        }
        Ok(self.total)
    }

    async fn fetch_detections(&mut self, stmt: &Statement) -> Result<Vec<DetectionRecord>, Error> {
        self.record(stmt)?;
        if stmt.sql().ends_with("LIMIT ? OFFSET ?") {
            let binds = stmt.binds();
            if let [.., BindValue::BigInt(limit), BindValue::BigInt(offset)] = binds.as_slice() {
                return Ok(self
                    .detections
                    .iter()
                    .skip(*offset as usize)
                    .take(*limit as usize)
                    .cloned()
                    .collect());
            }
        }
        Ok(self.detections.clone())
    }

    async fn fetch_buckets(&mut self, stmt: &Statement) -> Result<Vec<AggregateRecord>, Error> {
        self.record(stmt)?;
        Ok(self.buckets.clone())
    }

    async fn fetch_partitions(&mut self, _table: &str) -> Result<Vec<PartitionInfo>, Error> {
        self.partition_lookups += 1;
        if self.fail {
            return Err(boom());
        }
        Ok(self.partitions.clone())
    }
}

/// `count` monthly partitions from `year`-`month`, then `pmax`.
pub fn monthly_partitions(year: i32, month: u32, count: u32) -> Vec<PartitionInfo> {
    let first = PartitionMonth::new(year, month).unwrap();
    let mut parts: Vec<PartitionInfo> = (0..count)
        .map(|i| {
            let m = first.plus(i);
            PartitionInfo {
                name: m.partition_name(),
                description: Some(m.boundary().to_string()),
                row_estimate: 0,
            }
        })
        .collect();
    parts.push(PartitionInfo {
        name: "pmax".into(),
        description: Some("MAXVALUE".into()),
        row_estimate: 0,
    });
    parts
}

pub fn detection(id: i64, at: NaiveDateTime, area_id: i32, product_id: i32) -> DetectionRecord {
    DetectionRecord {
        id,
        detected_at: at,
        area_id,
        product_id,
    }
}

// ----------------------- reference data -----------------------

/// Reference rows served from memory; `loads` counts completed loads across clones.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    pub lines: Vec<ProductionLine>,
    pub areas: Vec<AreaRow>,
    pub products: Vec<Product>,
    pub filters: Vec<Filter>,
    pub shifts: Vec<Shift>,
    pub loads: Arc<AtomicUsize>,
    pub fail: bool,
    /// Invalidated once, in the middle of the next load.
    pub invalidate_during_load: Option<Arc<MetadataCache>>,
}

impl FakeSource {
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferenceDataSource for FakeSource {
    async fn load_lines(&mut self) -> Result<Vec<ProductionLine>, Error> {
        if self.fail {
            return Err(boom());
        }
        Ok(self.lines.clone())
    }

    async fn load_areas(&mut self) -> Result<Vec<AreaRow>, Error> {
        if let Some(cache) = self.invalidate_during_load.take() {
            cache.invalidate();
        }
        Ok(self.areas.clone())
    }

    async fn load_products(&mut self) -> Result<Vec<Product>, Error> {
        Ok(self.products.clone())
    }

    async fn load_filters(&mut self) -> Result<Vec<Filter>, Error> {
        Ok(self.filters.clone())
    }

    async fn load_shifts(&mut self) -> Result<Vec<Shift>, Error> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.shifts.clone())
    }
}

pub fn area(id: i32, line_id: i32, name: &str, area_type: &str, order: i32) -> AreaRow {
    AreaRow {
        id,
        line_id,
        name: name.into(),
        area_type: area_type.into(),
        area_order: order,
    }
}

pub fn product(id: i32, name: &str, weight: Option<f64>) -> Product {
    Product {
        id,
        name: name.into(),
        code: format!("P{id}"),
        weight,
        color: Some("blue".into()),
        production_rate: None,
        batch_size: None,
    }
}

/// Line 1 with input/process/output areas, two products and a night shift.
pub fn sample_source() -> FakeSource {
    FakeSource {
        lines: vec![ProductionLine {
            id: 1,
            name: "Line 1".into(),
            code: "L1".into(),
            is_active: true,
            availability_target: Some(90.0),
            performance_target: Some(85.0),
            downtime_threshold_seconds: Some(120),
        }],
        areas: vec![
            area(10, 1, "Infeed", "input", 1),
            area(11, 1, "Oven", "process", 2),
            area(12, 1, "Packing", "output", 3),
        ],
        products: vec![
            product(100, "Widget", Some(5.5)),
            product(101, "Gadget", Some(3.2)),
        ],
        filters: vec![Filter {
            id: 1,
            line_id: 1,
            name: "Widgets only".into(),
            description: None,
            is_active: true,
        }],
        shifts: vec![Shift {
            id: 3,
            name: "Night".into(),
            start_time: hm(22, 0),
            end_time: hm(6, 0),
            days_of_week: None,
            is_active: true,
        }],
        ..FakeSource::default()
    }
}
