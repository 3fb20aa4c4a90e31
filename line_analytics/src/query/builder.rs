//! Filter spec → parameterized, partition-pruned SQL.
//!
//! Only two things are ever formatted into SQL text: the fact-table name
//! (derived from a validated [`LineId`]) and generated partition names. Every
//! value is a `?` placeholder with a matching entry in the statement's
//! parameter map.

use chrono::NaiveDateTime;
use indexmap::IndexMap;

use crate::{
    error::{AnalyticsError, Result},
    interval::AggregationInterval,
    partition::FactTable,
    query::{
        hint::PartitionHint,
        statement::{SqlValue, Statement, placeholders},
    },
    spec::{LineId, QueryFilterSpec},
};

const TIME_COLUMN: &str = "detected_at";
const DETECTION_COLUMNS: &str = "id, detected_at, area_id, product_id";

/// Stateless SQL builder for detection reads.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryBuilder;

/// `WHERE` fragments with their parameters, kept in placeholder order.
#[derive(Debug, Default)]
struct Predicate {
    clauses: Vec<String>,
    params: IndexMap<&'static str, SqlValue>,
}

impl Predicate {
    fn time_range(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let mut p = Predicate::default();
        p.clauses.push(format!("{TIME_COLUMN} BETWEEN ? AND ?"));
        p.params.insert("start_date", SqlValue::Timestamp(start));
        p.params.insert("end_date", SqlValue::Timestamp(end));
        p
    }

    fn from_spec(spec: &QueryFilterSpec) -> Self {
        let mut p = Predicate::time_range(spec.start_date(), spec.end_date());
        p.id_set("area_id", "area_ids", spec.area_ids());
        p.id_set("product_id", "product_ids", spec.product_ids());
        if let Some(window) = spec.shift_window() {
            let joiner = if window.crosses_midnight() { "OR" } else { "AND" };
            p.clauses.push(format!(
                "(TIME({TIME_COLUMN}) >= ? {joiner} TIME({TIME_COLUMN}) < ?)"
            ));
            p.params.insert("shift_start", SqlValue::Time(window.start));
            p.params.insert("shift_end", SqlValue::Time(window.end));
        }
        p
    }

    fn id_set(&mut self, column: &str, name: &'static str, ids: &[i32]) {
        if ids.is_empty() {
            return;
        }
        self.clauses
            .push(format!("{column} IN ({})", placeholders(ids.len())));
        self.params.insert(name, SqlValue::IntList(ids.to_vec()));
    }

    fn render(&self) -> String {
        self.clauses.join(" AND ")
    }
}

/// `detection_line_<id>`, followed by `PARTITION (...)` for a restricting hint.
fn table_ref(line_id: LineId, hint: &PartitionHint) -> String {
    let table = FactTable::Detections.table_name(line_id);
    match hint.names() {
        [] => table.to_string(),
        names => format!("{table} PARTITION ({})", names.join(", ")),
    }
}

impl QueryBuilder {
    /// Raw detections in the filter, oldest first.
    pub fn build_select_query(spec: &QueryFilterSpec, hint: &PartitionHint) -> Statement {
        let from = table_ref(spec.line_id(), hint);
        let pred = Predicate::from_spec(spec);
        let sql = format!(
            "SELECT {DETECTION_COLUMNS} FROM {from} WHERE {} ORDER BY {TIME_COLUMN} ASC",
            pred.render()
        );
        Statement::new(sql, pred.params)
    }

    /// `COUNT(*) AS total` over the same predicate as the select.
    pub fn build_count_query(spec: &QueryFilterSpec, hint: &PartitionHint) -> Statement {
        let from = table_ref(spec.line_id(), hint);
        let pred = Predicate::from_spec(spec);
        let sql = format!("SELECT COUNT(*) AS total FROM {from} WHERE {}", pred.render());
        Statement::new(sql, pred.params)
    }

    /// Detection counts per `(bucket, area_id, product_id)`, ordered by bucket.
    pub fn build_aggregate_query(
        spec: &QueryFilterSpec,
        interval: AggregationInterval,
        hint: &PartitionHint,
    ) -> Statement {
        let from = table_ref(spec.line_id(), hint);
        let pred = Predicate::from_spec(spec);
        let sql = format!(
            "SELECT {bucket} AS bucket, area_id, product_id, COUNT(*) AS detection_count \
             FROM {from} WHERE {where_} \
             GROUP BY bucket, area_id, product_id \
             ORDER BY bucket ASC, area_id ASC, product_id ASC",
            bucket = interval.bucket_expr(TIME_COLUMN),
            where_ = pred.render(),
        );
        Statement::new(sql, pred.params)
    }

    /// Detections on one area of a line within `[start, end]`.
    pub fn build_area_count_query(
        line_id: LineId,
        area_id: i32,
        start: NaiveDateTime,
        end: NaiveDateTime,
        hint: &PartitionHint,
    ) -> Result<Statement> {
        if end <= start {
            return Err(AnalyticsError::InvalidFilter(format!(
                "end {end} must be after start {start}"
            )));
        }
        let from = table_ref(line_id, hint);
        let mut pred = Predicate::time_range(start, end);
        pred.clauses.push("area_id = ?".into());
        pred.params.insert("area_id", SqlValue::Int(area_id));
        let sql = format!("SELECT COUNT(*) AS total FROM {from} WHERE {}", pred.render());
        Ok(Statement::new(sql, pred.params))
    }

    /// `statement` restricted to `limit` rows starting at `offset`.
    pub fn with_pagination(statement: Statement, limit: i64, offset: i64) -> Statement {
        statement.paginate(limit, offset)
    }
}
