//! Aggregation intervals for time-bucketed detection counts.
//!
//! An [`AggregationInterval`] names one of the fixed bucket widths the query
//! layer knows how to truncate timestamps to. The textual forms (`"1min"`,
//! `"15min"`, `"1hour"`, `"1day"`, `"1week"`, `"1month"`) are what filter
//! specifications carry over the wire.
//!
//! ```
//! use line_analytics::interval::AggregationInterval;
//!
//! let iv: AggregationInterval = "1hour".parse().unwrap();
//! assert_eq!(iv, AggregationInterval::OneHour);
//! assert_eq!(iv.to_string(), "1hour");
//! assert!("2hours".parse::<AggregationInterval>().is_err());
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Bucket width for aggregate queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggregationInterval {
    /// Truncate to the minute.
    OneMinute,
    /// Truncate to the quarter hour.
    FifteenMinutes,
    /// Truncate to the hour.
    OneHour,
    /// Truncate to midnight.
    OneDay,
    /// Truncate to Monday midnight.
    OneWeek,
    /// Truncate to the first of the month.
    OneMonth,
}

impl AggregationInterval {
    /// Every supported interval, narrowest first.
    pub const ALL: [AggregationInterval; 6] = [
        AggregationInterval::OneMinute,
        AggregationInterval::FifteenMinutes,
        AggregationInterval::OneHour,
        AggregationInterval::OneDay,
        AggregationInterval::OneWeek,
        AggregationInterval::OneMonth,
    ];

    /// Wire form of the interval.
    pub const fn as_str(self) -> &'static str {
        match self {
            AggregationInterval::OneMinute => "1min",
            AggregationInterval::FifteenMinutes => "15min",
            AggregationInterval::OneHour => "1hour",
            AggregationInterval::OneDay => "1day",
            AggregationInterval::OneWeek => "1week",
            AggregationInterval::OneMonth => "1month",
        }
    }

    /// MySQL expression truncating `column` to the start of its bucket.
    ///
    /// The result is cast back to `DATETIME` so buckets decode as timestamps.
    /// `column` is always a fixed column name chosen by the query builder.
    pub fn bucket_expr(self, column: &str) -> String {
        let truncated = match self {
            AggregationInterval::OneMinute => {
                format!("DATE_FORMAT({column}, '%Y-%m-%d %H:%i:00')")
            }
            AggregationInterval::FifteenMinutes => format!(
                "DATE_FORMAT(DATE_SUB({column}, INTERVAL MOD(MINUTE({column}), 15) MINUTE), '%Y-%m-%d %H:%i:00')"
            ),
            AggregationInterval::OneHour => format!("DATE_FORMAT({column}, '%Y-%m-%d %H:00:00')"),
            AggregationInterval::OneDay => format!("DATE_FORMAT({column}, '%Y-%m-%d 00:00:00')"),
            AggregationInterval::OneWeek => format!(
                "DATE_FORMAT(DATE_SUB({column}, INTERVAL WEEKDAY({column}) DAY), '%Y-%m-%d 00:00:00')"
            ),
            AggregationInterval::OneMonth => format!("DATE_FORMAT({column}, '%Y-%m-01 00:00:00')"),
        };
        format!("CAST({truncated} AS DATETIME)")
    }
}

impl fmt::Display for AggregationInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationInterval {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregationInterval::ALL
            .into_iter()
            .find(|iv| iv.as_str() == s.trim())
            .ok_or_else(|| AnalyticsError::InvalidInterval(s.to_string()))
    }
}

impl TryFrom<String> for AggregationInterval {
    type Error = AnalyticsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AggregationInterval> for String {
    fn from(value: AggregationInterval) -> Self {
        value.as_str().to_string()
    }
}
