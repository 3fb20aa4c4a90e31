//! Validated description of *which detections to read*.
//!
//! A [`QueryFilterSpec`] is the only input the query layer accepts. Once built
//! it is immutable: the line id is known to be positive, the time range is
//! ordered and not in the future, and id sets are positive, sorted and
//! de-duplicated.

use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AnalyticsError, Result},
    interval::AggregationInterval,
};

/// Largest page size a paginated read may request.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A production line id that is safe to format into a table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LineId(i32);

impl LineId {
    /// Accepts only integers in `1..=i32::MAX`.
    pub fn new(raw: i64) -> Result<Self> {
        match i32::try_from(raw) {
            Ok(id) if id > 0 => Ok(LineId(id)),
            _ => Err(AnalyticsError::InvalidLineId(raw)),
        }
    }

    /// The numeric id.
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for LineId {
    type Error = AnalyticsError;

    fn try_from(value: i64) -> Result<Self> {
        LineId::new(value)
    }
}

impl<'de> Deserialize<'de> for LineId {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = i64::deserialize(d)?;
        LineId::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Time-of-day window of a shift. `end <= start` means the shift crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    /// Inclusive start time of day.
    pub start: NaiveTime,
    /// Exclusive end time of day.
    pub end: NaiveTime,
}

impl ShiftWindow {
    /// True when the window wraps past midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.end <= self.start
    }
}

/// Validated filter for detection reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FilterRequest")]
pub struct QueryFilterSpec {
    line_id: LineId,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
    interval: AggregationInterval,
    product_ids: Vec<i32>,
    area_ids: Vec<i32>,
    shift_id: Option<i32>,
    #[serde(skip)]
    shift_window: Option<ShiftWindow>,
}

impl QueryFilterSpec {
    /// Builds a spec, checking the range against the current UTC time.
    pub fn new(
        line_id: i64,
        start_date: NaiveDateTime,
        end_date: NaiveDateTime,
        interval: AggregationInterval,
    ) -> Result<Self> {
        Self::new_at(line_id, start_date, end_date, interval, Utc::now().naive_utc())
    }

    /// Same as [`QueryFilterSpec::new`] with an explicit "now".
    pub fn new_at(
        line_id: i64,
        start_date: NaiveDateTime,
        end_date: NaiveDateTime,
        interval: AggregationInterval,
        now: NaiveDateTime,
    ) -> Result<Self> {
        let line_id = LineId::new(line_id)?;
        if end_date <= start_date {
            return Err(AnalyticsError::InvalidFilter(format!(
                "end_date {end_date} must be after start_date {start_date}"
            )));
        }
        if start_date > now || end_date > now {
            return Err(AnalyticsError::InvalidFilter(
                "dates cannot be in the future".into(),
            ));
        }
        Ok(Self {
            line_id,
            start_date,
            end_date,
            interval,
            product_ids: Vec::new(),
            area_ids: Vec::new(),
            shift_id: None,
            shift_window: None,
        })
    }

    /// Restricts the read to these products.
    pub fn with_product_ids(mut self, ids: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.product_ids = positive_set("product_ids", ids)?;
        Ok(self)
    }

    /// Restricts the read to these areas.
    pub fn with_area_ids(mut self, ids: impl IntoIterator<Item = i32>) -> Result<Self> {
        self.area_ids = positive_set("area_ids", ids)?;
        Ok(self)
    }

    /// Restricts the read to one shift.
    pub fn with_shift_id(mut self, shift_id: i32) -> Result<Self> {
        if shift_id <= 0 {
            return Err(AnalyticsError::InvalidFilter(format!(
                "shift_id must be positive, got {shift_id}"
            )));
        }
        self.shift_id = Some(shift_id);
        Ok(self)
    }

    /// Attaches the resolved time-of-day window for `shift_id`.
    pub fn with_shift_window(mut self, window: ShiftWindow) -> Self {
        self.shift_window = Some(window);
        self
    }

    /// Line whose fact table is read.
    pub fn line_id(&self) -> LineId {
        self.line_id
    }

    /// Inclusive range start.
    pub fn start_date(&self) -> NaiveDateTime {
        self.start_date
    }

    /// Inclusive range end.
    pub fn end_date(&self) -> NaiveDateTime {
        self.end_date
    }

    /// Requested bucket width.
    pub fn interval(&self) -> AggregationInterval {
        self.interval
    }

    /// Sorted, de-duplicated product ids; empty means "all".
    pub fn product_ids(&self) -> &[i32] {
        &self.product_ids
    }

    /// Sorted, de-duplicated area ids; empty means "all".
    pub fn area_ids(&self) -> &[i32] {
        &self.area_ids
    }

    /// Requested shift, if any.
    pub fn shift_id(&self) -> Option<i32> {
        self.shift_id
    }

    /// Resolved shift window, if the service attached one.
    pub fn shift_window(&self) -> Option<ShiftWindow> {
        self.shift_window
    }
}

fn positive_set(field: &str, ids: impl IntoIterator<Item = i32>) -> Result<Vec<i32>> {
    let mut out: Vec<i32> = ids.into_iter().collect();
    if let Some(bad) = out.iter().find(|id| **id <= 0) {
        return Err(AnalyticsError::InvalidFilter(format!(
            "{field} must be positive, got {bad}"
        )));
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// Unvalidated wire shape of a filter; converted with `TryFrom`.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    /// Line id.
    pub line_id: i64,
    /// Range start.
    pub start_date: NaiveDateTime,
    /// Range end.
    pub end_date: NaiveDateTime,
    /// Bucket width; defaults to 15 minutes when omitted.
    #[serde(default = "default_interval")]
    pub interval: AggregationInterval,
    /// Optional product restriction.
    #[serde(default)]
    pub product_ids: Option<Vec<i32>>,
    /// Optional area restriction.
    #[serde(default)]
    pub area_ids: Option<Vec<i32>>,
    /// Optional shift restriction.
    #[serde(default)]
    pub shift_id: Option<i32>,
}

fn default_interval() -> AggregationInterval {
    AggregationInterval::FifteenMinutes
}

impl TryFrom<FilterRequest> for QueryFilterSpec {
    type Error = AnalyticsError;

    fn try_from(req: FilterRequest) -> Result<Self> {
        let mut spec = QueryFilterSpec::new(req.line_id, req.start_date, req.end_date, req.interval)?;
        if let Some(ids) = req.product_ids {
            spec = spec.with_product_ids(ids)?;
        }
        if let Some(ids) = req.area_ids {
            spec = spec.with_area_ids(ids)?;
        }
        if let Some(shift) = req.shift_id {
            spec = spec.with_shift_id(shift)?;
        }
        Ok(spec)
    }
}

/// A filter plus one page of results to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginatedFilterSpec {
    filter: QueryFilterSpec,
    page: u32,
    page_size: u32,
}

impl PaginatedFilterSpec {
    /// `page` is 1-based; `page_size` must be in `1..=MAX_PAGE_SIZE`.
    pub fn new(filter: QueryFilterSpec, page: u32, page_size: u32) -> Result<Self> {
        Self::with_max_page_size(filter, page, page_size, MAX_PAGE_SIZE)
    }

    /// Like [`PaginatedFilterSpec::new`] with a tighter page-size cap.
    /// Caps above [`MAX_PAGE_SIZE`] are clamped to it.
    pub fn with_max_page_size(
        filter: QueryFilterSpec,
        page: u32,
        page_size: u32,
        max_page_size: u32,
    ) -> Result<Self> {
        validate_page_with(page, page_size, max_page_size.min(MAX_PAGE_SIZE))?;
        Ok(Self {
            filter,
            page,
            page_size,
        })
    }

    /// The underlying filter.
    pub fn filter(&self) -> &QueryFilterSpec {
        &self.filter
    }

    /// 1-based page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Rows per page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }
}

pub(crate) fn validate_page(page: u32, page_size: u32) -> Result<()> {
    validate_page_with(page, page_size, MAX_PAGE_SIZE)
}

fn validate_page_with(page: u32, page_size: u32, max: u32) -> Result<()> {
    if page == 0 {
        return Err(AnalyticsError::InvalidPage("page starts at 1".into()));
    }
    if page_size == 0 || page_size > max {
        return Err(AnalyticsError::InvalidPage(format!(
            "page_size must be in 1..={max}, got {page_size}"
        )));
    }
    Ok(())
}
