//! Reference-data rows held by the metadata cache.
//!
//! These mirror the tables in [`crate::schema`]:
//! - [`crate::schema::production_lines`]: lines and their OEE targets
//! - [`crate::schema::areas`]: detection points along a line, in flow order
//! - [`crate::schema::products`]: product catalogue used for enrichment
//! - [`crate::schema::filters`]: saved, line-scoped filter presets
//! - [`crate::schema::shifts`]: shift time-of-day windows
//!
//! All structs are `Selectable` against MySQL. [`AreaRow`] is the raw row;
//! [`Area`] is what the cache stores once the type string has been parsed.

use std::{fmt, str::FromStr};

use chrono::NaiveTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::{schema::*, spec::ShiftWindow};

/// A row in [`crate::schema::production_lines`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = production_lines, check_for_backend(diesel::mysql::Mysql))]
pub struct ProductionLine {
    /// Line id; also the suffix of its fact tables.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Short code.
    pub code: String,
    /// Inactive lines are not loaded into the cache.
    pub is_active: bool,
    /// Availability target, percent.
    pub availability_target: Option<f64>,
    /// Performance target, percent.
    pub performance_target: Option<f64>,
    /// Stoppages shorter than this are not counted as downtime.
    pub downtime_threshold_seconds: Option<i32>,
}

/// Role of an area in the line's flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaType {
    /// Where items enter the line.
    Input,
    /// Intermediate station.
    Process,
    /// Where finished items leave.
    Output,
    /// Reject bin.
    Discard,
}

impl AreaType {
    /// Lowercase name as stored in `areas.area_type`.
    pub const fn as_str(self) -> &'static str {
        match self {
            AreaType::Input => "input",
            AreaType::Process => "process",
            AreaType::Output => "output",
            AreaType::Discard => "discard",
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "input" => Ok(AreaType::Input),
            "process" => Ok(AreaType::Process),
            "output" => Ok(AreaType::Output),
            "discard" => Ok(AreaType::Discard),
            other => Err(other.to_string()),
        }
    }
}

/// A raw row in [`crate::schema::areas`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable)]
#[diesel(table_name = areas, check_for_backend(diesel::mysql::Mysql))]
pub struct AreaRow {
    /// Area id.
    pub id: i32,
    /// Owning line.
    pub line_id: i32,
    /// Display name.
    pub name: String,
    /// `input`, `process`, `output` or `discard`.
    pub area_type: String,
    /// Position along the line.
    pub area_order: i32,
}

/// An area with its type parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Area {
    /// Area id.
    pub id: i32,
    /// Owning line.
    pub line_id: i32,
    /// Display name.
    pub name: String,
    /// Role in the flow.
    pub area_type: AreaType,
    /// Position along the line.
    pub area_order: i32,
}

impl TryFrom<AreaRow> for Area {
    type Error = String;

    fn try_from(row: AreaRow) -> Result<Self, Self::Error> {
        Ok(Area {
            id: row.id,
            line_id: row.line_id,
            name: row.name,
            area_type: row.area_type.parse()?,
            area_order: row.area_order,
        })
    }
}

/// A row in [`crate::schema::products`].
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize)]
#[diesel(table_name = products, check_for_backend(diesel::mysql::Mysql))]
pub struct Product {
    /// Product id.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Short code.
    pub code: String,
    /// Unit weight, used for total-weight figures.
    pub weight: Option<f64>,
    /// Display color.
    pub color: Option<String>,
    /// Standard production rate, items per hour.
    pub production_rate: Option<f64>,
    /// Items per batch.
    pub batch_size: Option<i32>,
}

/// A row in [`crate::schema::filters`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = filters, check_for_backend(diesel::mysql::Mysql))]
pub struct Filter {
    /// Filter id.
    pub id: i32,
    /// Line the preset applies to.
    pub line_id: i32,
    /// Display name.
    pub name: String,
    /// Free text.
    pub description: Option<String>,
    /// Only active presets are cached.
    pub is_active: bool,
}

/// A row in [`crate::schema::shifts`].
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Serialize)]
#[diesel(table_name = shifts, check_for_backend(diesel::mysql::Mysql))]
pub struct Shift {
    /// Shift id.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Start, time of day.
    pub start_time: NaiveTime,
    /// End, time of day; at or before `start_time` for night shifts.
    pub end_time: NaiveTime,
    /// Day-of-week mask as stored, e.g. `1111100`.
    pub days_of_week: Option<String>,
    /// Only active shifts are cached.
    pub is_active: bool,
}

impl Shift {
    /// Time-of-day window used to filter detections.
    pub fn window(&self) -> ShiftWindow {
        ShiftWindow {
            start: self.start_time,
            end: self.end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_type_parsing_is_case_insensitive() {
        assert_eq!("Input".parse::<AreaType>(), Ok(AreaType::Input));
        assert_eq!(" output ".parse::<AreaType>(), Ok(AreaType::Output));
        assert!("conveyor".parse::<AreaType>().is_err());
    }

    #[test]
    fn area_row_converts_or_reports_bad_type() {
        let row = AreaRow {
            id: 1,
            line_id: 2,
            name: "Infeed".into(),
            area_type: "input".into(),
            area_order: 1,
        };
        assert_eq!(Area::try_from(row.clone()).unwrap().area_type, AreaType::Input);

        let bad = AreaRow {
            area_type: "belt".into(),
            ..row
        };
        assert_eq!(Area::try_from(bad), Err("belt".to_string()));
    }
}
