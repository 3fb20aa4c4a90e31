//! Detections joined against cached reference data.
//!
//! The repository returns bare ids; this layer resolves them against one
//! metadata snapshot per call, so every row of a response sees the same
//! version of the reference data. Ids the snapshot does not know get
//! `Area_<id>` / `Product_<id>` labels instead of failing the request.

use std::{collections::BTreeSet, sync::Arc};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    error::{AnalyticsError, Result},
    interval::AggregationInterval,
    metadata::{Area, AreaType, MetadataCache, MetadataSnapshot},
    repository::{AggregateRecord, DetectionRecord, DetectionRepository, Page, QueryRunner},
    spec::{LineId, PaginatedFilterSpec, QueryFilterSpec},
};

/// Column order of [`EnrichedTable`], present even when there are no rows.
pub const ENRICHED_COLUMNS: [&str; 11] = [
    "id",
    "detected_at",
    "area_id",
    "area_name",
    "area_type",
    "area_order",
    "product_id",
    "product_name",
    "product_code",
    "product_weight",
    "product_color",
];

/// A detection with area and product details attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedDetection {
    /// Detection row id.
    pub id: i64,
    /// When the item was seen.
    pub detected_at: NaiveDateTime,
    /// Area that saw it.
    pub area_id: i32,
    /// Area name or `Area_<id>`.
    pub area_name: String,
    /// `None` for unknown areas.
    pub area_type: Option<AreaType>,
    /// Position in the line's flow.
    pub area_order: Option<i32>,
    /// Product it was classified as.
    pub product_id: i32,
    /// Product name or `Product_<id>`.
    pub product_name: String,
    /// Product code; `None` for unknown products.
    pub product_code: Option<String>,
    /// Unit weight when known.
    pub product_weight: Option<f64>,
    /// Display color.
    pub product_color: Option<String>,
}

/// Enriched rows with a fixed column set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedTable {
    /// Always [`ENRICHED_COLUMNS`].
    pub columns: &'static [&'static str],
    /// Rows in `detected_at` order.
    pub rows: Vec<EnrichedDetection>,
}

impl EnrichedTable {
    /// Table with the full column set and no rows.
    pub fn empty() -> Self {
        Self {
            columns: &ENRICHED_COLUMNS,
            rows: Vec::new(),
        }
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// An aggregate bucket with names attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedBucket {
    /// Bucket start.
    pub bucket: NaiveDateTime,
    /// Rows in the bucket.
    pub detection_count: i64,
    /// Area id.
    pub area_id: i32,
    /// Area name or `Area_<id>`.
    pub area_name: String,
    /// Product id.
    pub product_id: i32,
    /// Product name or `Product_<id>`.
    pub product_name: String,
}

/// Items in versus items out over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowBalance {
    /// Line the counts are for.
    pub line_id: LineId,
    /// Area counted as the line's entry point.
    pub input_area_id: i32,
    /// Area counted as the line's exit point.
    pub output_area_id: i32,
    /// Detections on the input area.
    pub input_count: u64,
    /// Detections on the output area.
    pub output_count: u64,
    /// `input_count - output_count`; positive means items are still on the line or were lost.
    pub difference: i64,
}

/// Sum of known product weights; rows without a weight count as zero.
pub fn calculate_total_weight(rows: &[EnrichedDetection]) -> f64 {
    rows.iter().filter_map(|r| r.product_weight).sum()
}

fn area_label(id: i32) -> String {
    format!("Area_{id}")
}

fn product_label(id: i32) -> String {
    format!("Product_{id}")
}

/// Ids that fell back to a label during one enrichment pass.
#[derive(Default)]
struct Misses {
    areas: BTreeSet<i32>,
    products: BTreeSet<i32>,
}

impl Misses {
    fn report(&self, tenant: &str) {
        if !self.areas.is_empty() || !self.products.is_empty() {
            warn!(
                tenant,
                areas = ?self.areas,
                products = ?self.products,
                "ids missing from metadata snapshot, using fallback labels"
            );
        }
    }
}

fn enrich_row(snap: &MetadataSnapshot, row: DetectionRecord, misses: &mut Misses) -> EnrichedDetection {
    let area = snap.area(row.area_id);
    let product = snap.product(row.product_id);
    if area.is_none() {
        misses.areas.insert(row.area_id);
    }
    if product.is_none() {
        misses.products.insert(row.product_id);
    }
    EnrichedDetection {
        id: row.id,
        detected_at: row.detected_at,
        area_id: row.area_id,
        area_name: area.map_or_else(|| area_label(row.area_id), |a| a.name.clone()),
        area_type: area.map(|a| a.area_type),
        area_order: area.map(|a| a.area_order),
        product_id: row.product_id,
        product_name: product.map_or_else(|| product_label(row.product_id), |p| p.name.clone()),
        product_code: product.map(|p| p.code.clone()),
        product_weight: product.and_then(|p| p.weight),
        product_color: product.and_then(|p| p.color.clone()),
    }
}

/// Enriched and aggregated detection reads for one tenant.
#[derive(Debug, Clone)]
pub struct DetectionService {
    cache: Arc<MetadataCache>,
    use_partition_hint: bool,
}

impl DetectionService {
    /// Service over `cache`, with partition hints on.
    pub fn new(cache: Arc<MetadataCache>) -> Self {
        Self {
            cache,
            use_partition_hint: true,
        }
    }

    /// See [`DetectionRepository::with_partition_hint`].
    pub fn with_partition_hint(mut self, use_partition_hint: bool) -> Self {
        self.use_partition_hint = use_partition_hint;
        self
    }

    /// The cache rows are resolved against.
    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    fn repository<'r, R: QueryRunner + ?Sized>(&self, runner: &'r mut R) -> DetectionRepository<'r, R> {
        DetectionRepository::new(runner).with_partition_hint(self.use_partition_hint)
    }

    /// Attaches the time window of the shift `spec` names.
    ///
    /// A shift id missing from the snapshot is `NotFound`; the read never runs
    /// without the shift predicate.
    fn resolve_shift(&self, snap: &MetadataSnapshot, spec: &QueryFilterSpec) -> Result<QueryFilterSpec> {
        match spec.shift_id() {
            Some(id) if spec.shift_window().is_none() => {
                let shift = snap.shift(id).ok_or_else(|| {
                    warn!(shift_id = id, "shift not in metadata snapshot");
                    AnalyticsError::NotFound {
                        entity: "shift",
                        key: id.to_string(),
                    }
                })?;
                Ok(spec.clone().with_shift_window(shift.window()))
            }
            _ => Ok(spec.clone()),
        }
    }

    /// Enriches already-fetched rows against the current snapshot.
    pub fn enrich(&self, rows: Vec<DetectionRecord>) -> EnrichedTable {
        let snap = self.cache.snapshot();
        let mut misses = Misses::default();
        let rows = rows
            .into_iter()
            .map(|r| enrich_row(&snap, r, &mut misses))
            .collect();
        misses.report(self.cache.tenant().as_str());
        EnrichedTable {
            columns: &ENRICHED_COLUMNS,
            rows,
        }
    }

    /// Raw detections with area and product details.
    ///
    /// Fails with `NotFound` when the filter names a shift the cache does not know.
    #[instrument(skip_all, fields(tenant = %self.cache.tenant(), line_id = %spec.line_id()))]
    pub async fn get_enriched_detections<R>(
        &self,
        runner: &mut R,
        spec: &QueryFilterSpec,
    ) -> Result<EnrichedTable>
    where
        R: QueryRunner + ?Sized,
    {
        let spec = self.resolve_shift(&self.cache.snapshot(), spec)?;
        let rows = self.repository(runner).get_detections(&spec).await?;
        if rows.is_empty() {
            return Ok(EnrichedTable::empty());
        }
        Ok(self.enrich(rows))
    }

    /// One enriched page in the repository's pagination envelope.
    #[instrument(skip_all, fields(tenant = %self.cache.tenant(), line_id = %spec.filter().line_id()))]
    pub async fn get_enriched_detections_paginated<R>(
        &self,
        runner: &mut R,
        spec: &PaginatedFilterSpec,
    ) -> Result<Page<EnrichedDetection>>
    where
        R: QueryRunner + ?Sized,
    {
        let filter = self.resolve_shift(&self.cache.snapshot(), spec.filter())?;
        let page = self
            .repository(runner)
            .get_detections_paginated(&filter, spec.page(), spec.page_size())
            .await?;
        Ok(page.map(|rows| self.enrich(rows).rows))
    }

    /// Bucketed counts with area and product names.
    #[instrument(skip_all, fields(tenant = %self.cache.tenant(), line_id = %spec.line_id(), interval = %interval))]
    pub async fn get_aggregated_detections<R>(
        &self,
        runner: &mut R,
        spec: &QueryFilterSpec,
        interval: AggregationInterval,
    ) -> Result<Vec<EnrichedBucket>>
    where
        R: QueryRunner + ?Sized,
    {
        let snap = self.cache.snapshot();
        let spec = self.resolve_shift(&snap, spec)?;
        let buckets = self
            .repository(runner)
            .get_aggregated_detections(&spec, interval)
            .await?;

        let mut misses = Misses::default();
        let out = buckets
            .into_iter()
            .map(|b: AggregateRecord| {
                let area_name = match snap.area(b.area_id) {
                    Some(a) => a.name.clone(),
                    None => {
                        misses.areas.insert(b.area_id);
                        area_label(b.area_id)
                    }
                };
                let product_name = match snap.product(b.product_id) {
                    Some(p) => p.name.clone(),
                    None => {
                        misses.products.insert(b.product_id);
                        product_label(b.product_id)
                    }
                };
                EnrichedBucket {
                    bucket: b.bucket,
                    detection_count: b.detection_count,
                    area_id: b.area_id,
                    area_name,
                    product_id: b.product_id,
                    product_name,
                }
            })
            .collect();
        misses.report(self.cache.tenant().as_str());
        Ok(out)
    }

    /// Entry area of a line: the `input` area, else the first by order.
    pub fn get_input_area(&self, line_id: LineId) -> Result<Area> {
        self.cache
            .input_area(line_id.get())
            .ok_or_else(|| no_areas(line_id))
    }

    /// Exit area of a line: the `output` area, else the last by order.
    pub fn get_output_area(&self, line_id: LineId) -> Result<Area> {
        self.cache
            .output_area(line_id.get())
            .ok_or_else(|| no_areas(line_id))
    }

    /// Detections on the input area versus the output area over `[start, end]`.
    #[instrument(skip(self, runner), fields(tenant = %self.cache.tenant()))]
    pub async fn get_flow_balance<R>(
        &self,
        runner: &mut R,
        line_id: LineId,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<FlowBalance>
    where
        R: QueryRunner + ?Sized,
    {
        let input = self.get_input_area(line_id)?;
        let output = self.get_output_area(line_id)?;

        let mut repo = self.repository(runner);
        let input_count = repo
            .count_detections_by_area(line_id, input.id, start, end)
            .await?;
        let output_count = repo
            .count_detections_by_area(line_id, output.id, start, end)
            .await?;

        Ok(FlowBalance {
            line_id,
            input_area_id: input.id,
            output_area_id: output.id,
            input_count,
            output_count,
            difference: i64::try_from(input_count).unwrap_or(i64::MAX)
                - i64::try_from(output_count).unwrap_or(i64::MAX),
        })
    }
}

fn no_areas(line_id: LineId) -> AnalyticsError {
    AnalyticsError::NotFound {
        entity: "areas for line",
        key: line_id.to_string(),
    }
}
