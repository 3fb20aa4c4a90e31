//! Parameterized SQL statements.
//!
//! A [`Statement`] is SQL text with `?` placeholders plus an ordered map of
//! named parameters. Names exist for tests and logs; binding is purely
//! positional, in map order, with list values expanded element by element.

use chrono::{NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

/// A named parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// `INT`.
    Int(i32),
    /// `BIGINT`.
    BigInt(i64),
    /// `DATETIME`.
    Timestamp(NaiveDateTime),
    /// `TIME`.
    Time(NaiveTime),
    /// One `INT` placeholder per element, as used by `IN (...)`.
    IntList(Vec<i32>),
}

impl SqlValue {
    /// Placeholders this value occupies.
    pub fn placeholder_count(&self) -> usize {
        match self {
            SqlValue::IntList(v) => v.len(),
            _ => 1,
        }
    }
}

/// A single positional bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindValue {
    /// `INT`.
    Int(i32),
    /// `BIGINT`.
    BigInt(i64),
    /// `DATETIME`.
    Timestamp(NaiveDateTime),
    /// `TIME`.
    Time(NaiveTime),
}

/// SQL text plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: IndexMap<&'static str, SqlValue>,
}

impl Statement {
    pub(crate) fn new(sql: String, params: IndexMap<&'static str, SqlValue>) -> Self {
        Self { sql, params }
    }

    /// SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Named parameters in placeholder order.
    pub fn params(&self) -> &IndexMap<&'static str, SqlValue> {
        &self.params
    }

    /// Positional binds, one per `?`.
    pub fn binds(&self) -> Vec<BindValue> {
        let mut out = Vec::with_capacity(self.params.values().map(SqlValue::placeholder_count).sum());
        for value in self.params.values() {
            match value {
                SqlValue::Int(v) => out.push(BindValue::Int(*v)),
                SqlValue::BigInt(v) => out.push(BindValue::BigInt(*v)),
                SqlValue::Timestamp(v) => out.push(BindValue::Timestamp(*v)),
                SqlValue::Time(v) => out.push(BindValue::Time(*v)),
                SqlValue::IntList(items) => out.extend(items.iter().copied().map(BindValue::Int)),
            }
        }
        out
    }

    /// Appends `LIMIT ? OFFSET ?` with both values bound.
    pub fn paginate(mut self, limit: i64, offset: i64) -> Self {
        self.sql.push_str(" LIMIT ? OFFSET ?");
        self.params.insert("limit", SqlValue::BigInt(limit));
        self.params.insert("offset", SqlValue::BigInt(offset));
        self
    }
}

/// `?, ?, ?` for `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
