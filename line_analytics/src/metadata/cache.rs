//! Per-tenant, read-mostly cache of reference data.
//!
//! Readers load an `Arc<MetadataSnapshot>` with one atomic operation and no
//! locking. A load runs the five reference queries under the tenant's async
//! mutex, builds a fresh snapshot and swaps it in, so readers see either the
//! old maps or the new ones, never a mix.
//!
//! Lifecycle:
//! - Starts empty (version 0); every lookup misses until the first load.
//! - Goes stale when the TTL elapses or [`MetadataCache::invalidate`] is
//!   called. Stale data stays readable until the next load publishes.
//! - A failed load leaves the previous snapshot in place and the cache stale.
//!
//! Freshness carries the invalidation epoch seen when its load started, so an
//! invalidate that lands while a load is in flight still leaves the cache
//! stale afterwards.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::{
    error::{AnalyticsError, Result},
    metadata::{
        models::{Area, AreaRow, AreaType, Filter, Product, ProductionLine, Shift},
        source::ReferenceDataSource,
    },
};

/// Default snapshot lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Tenant key selecting a cache slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wraps a tenant identifier.
    pub fn new(id: impl Into<String>) -> Self {
        TenantId(id.into())
    }

    /// The identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        TenantId::new(s)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        TenantId(s)
    }
}

/// One published, immutable set of reference maps.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    tenant: TenantId,
    version: u64,
    loaded_at: Option<DateTime<Utc>>,
    lines: HashMap<i32, ProductionLine>,
    areas: HashMap<i32, Area>,
    products: HashMap<i32, Product>,
    filters: HashMap<i32, Filter>,
    shifts: HashMap<i32, Shift>,
    /// Area ids per line, sorted by `area_order`.
    line_areas: HashMap<i32, Vec<i32>>,
}

impl MetadataSnapshot {
    /// Snapshot with no data, version 0.
    pub fn empty(tenant: TenantId) -> Self {
        Self {
            tenant,
            version: 0,
            loaded_at: None,
            lines: HashMap::new(),
            areas: HashMap::new(),
            products: HashMap::new(),
            filters: HashMap::new(),
            shifts: HashMap::new(),
            line_areas: HashMap::new(),
        }
    }

    fn build(
        tenant: TenantId,
        version: u64,
        lines: Vec<ProductionLine>,
        area_rows: Vec<AreaRow>,
        products: Vec<Product>,
        filters: Vec<Filter>,
        shifts: Vec<Shift>,
    ) -> Self {
        let mut areas = HashMap::with_capacity(area_rows.len());
        for row in area_rows {
            let id = row.id;
            match Area::try_from(row) {
                Ok(area) => {
                    areas.insert(id, area);
                }
                Err(bad) => warn!(tenant = %tenant, area_id = id, area_type = %bad, "skipping area with unknown type"),
            }
        }

        let mut line_areas: HashMap<i32, Vec<i32>> = HashMap::new();
        for area in areas.values() {
            line_areas.entry(area.line_id).or_default().push(area.id);
        }
        for ids in line_areas.values_mut() {
            ids.sort_by_key(|id| areas.get(id).map(|a| (a.area_order, a.id)));
        }

        Self {
            tenant,
            version,
            loaded_at: Some(Utc::now()),
            lines: lines.into_iter().map(|l| (l.id, l)).collect(),
            areas,
            products: products.into_iter().map(|p| (p.id, p)).collect(),
            filters: filters.into_iter().map(|f| (f.id, f)).collect(),
            shifts: shifts.into_iter().map(|s| (s.id, s)).collect(),
            line_areas,
        }
    }

    /// Tenant the data belongs to.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// 0 before the first load, then +1 per published load.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// When this snapshot was built.
    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }

    /// Production line by id.
    pub fn line(&self, id: i32) -> Option<&ProductionLine> {
        self.lines.get(&id)
    }

    /// Area by id.
    pub fn area(&self, id: i32) -> Option<&Area> {
        self.areas.get(&id)
    }

    /// Product by id.
    pub fn product(&self, id: i32) -> Option<&Product> {
        self.products.get(&id)
    }

    /// Filter preset by id.
    pub fn filter(&self, id: i32) -> Option<&Filter> {
        self.filters.get(&id)
    }

    /// Shift by id.
    pub fn shift(&self, id: i32) -> Option<&Shift> {
        self.shifts.get(&id)
    }

    /// Areas of `line_id` in flow order.
    pub fn areas_by_line(&self, line_id: i32) -> impl Iterator<Item = &Area> {
        self.line_areas
            .get(&line_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.areas.get(id))
    }

    /// First `input` area, else the area with the lowest order.
    pub fn input_area(&self, line_id: i32) -> Option<&Area> {
        self.areas_by_line(line_id)
            .find(|a| a.area_type == AreaType::Input)
            .or_else(|| self.areas_by_line(line_id).next())
    }

    /// Last `output` area, else the area with the highest order.
    pub fn output_area(&self, line_id: i32) -> Option<&Area> {
        self.areas_by_line(line_id)
            .filter(|a| a.area_type == AreaType::Output)
            .last()
            .or_else(|| self.areas_by_line(line_id).last())
    }

    /// `process` areas in flow order.
    pub fn process_areas(&self, line_id: i32) -> Vec<&Area> {
        self.areas_by_line(line_id)
            .filter(|a| a.area_type == AreaType::Process)
            .collect()
    }

    fn sorted<T: Clone>(map: &HashMap<i32, T>) -> Vec<T> {
        let mut ids: Vec<&i32> = map.keys().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| map.get(id).cloned()).collect()
    }
}

#[derive(Debug)]
struct Freshness {
    loaded_at: Instant,
    epoch: u64,
}

/// Counts and timestamps for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Tenant.
    pub tenant: TenantId,
    /// Snapshot version.
    pub version: u64,
    /// When the current snapshot was built.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Whether the next read should trigger a reload.
    pub stale: bool,
    /// Cached lines.
    pub lines: usize,
    /// Cached areas.
    pub areas: usize,
    /// Cached products.
    pub products: usize,
    /// Cached filters.
    pub filters: usize,
    /// Cached shifts.
    pub shifts: usize,
}

/// Reference-data cache for one tenant.
#[derive(Debug)]
pub struct MetadataCache {
    tenant: TenantId,
    ttl: Duration,
    current: ArcSwap<MetadataSnapshot>,
    freshness: ArcSwapOption<Freshness>,
    epoch: AtomicU64,
    load_lock: Mutex<()>,
}

impl MetadataCache {
    /// Empty cache; nothing is loaded until [`MetadataCache::load`].
    pub fn new(tenant: TenantId, ttl: Duration) -> Self {
        Self {
            current: ArcSwap::from_pointee(MetadataSnapshot::empty(tenant.clone())),
            tenant,
            ttl,
            freshness: ArcSwapOption::empty(),
            epoch: AtomicU64::new(0),
            load_lock: Mutex::new(()),
        }
    }

    /// Tenant this cache serves.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Snapshot lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reloads all five maps and publishes them as one snapshot.
    pub async fn load<S>(&self, source: &mut S) -> Result<Arc<MetadataSnapshot>>
    where
        S: ReferenceDataSource + ?Sized,
    {
        let _guard = self.load_lock.lock().await;
        self.load_locked(source).await
    }

    /// Loads only if [`MetadataCache::needs_refresh`]; returns whether it did.
    ///
    /// Staleness is re-checked after taking the lock, so concurrent callers
    /// cause a single load.
    pub async fn refresh_if_needed<S>(&self, source: &mut S) -> Result<bool>
    where
        S: ReferenceDataSource + ?Sized,
    {
        if !self.needs_refresh() {
            return Ok(false);
        }
        let _guard = self.load_lock.lock().await;
        if !self.needs_refresh() {
            return Ok(false);
        }
        self.load_locked(source).await?;
        Ok(true)
    }

    #[instrument(skip_all, fields(tenant = %self.tenant))]
    async fn load_locked<S>(&self, source: &mut S) -> Result<Arc<MetadataSnapshot>>
    where
        S: ReferenceDataSource + ?Sized,
    {
        let epoch = self.epoch.load(Ordering::Acquire);

        let lines = source
            .load_lines()
            .await
            .map_err(AnalyticsError::backend("load production_lines"))?;
        let areas = source
            .load_areas()
            .await
            .map_err(AnalyticsError::backend("load areas"))?;
        let products = source
            .load_products()
            .await
            .map_err(AnalyticsError::backend("load products"))?;
        let filters = source
            .load_filters()
            .await
            .map_err(AnalyticsError::backend("load filters"))?;
        let shifts = source
            .load_shifts()
            .await
            .map_err(AnalyticsError::backend("load shifts"))?;

        let version = self.current.load().version + 1;
        let snapshot = Arc::new(MetadataSnapshot::build(
            self.tenant.clone(),
            version,
            lines,
            areas,
            products,
            filters,
            shifts,
        ));
        self.current.store(Arc::clone(&snapshot));
        self.freshness.store(Some(Arc::new(Freshness {
            loaded_at: Instant::now(),
            epoch,
        })));

        info!(
            version,
            lines = snapshot.lines.len(),
            areas = snapshot.areas.len(),
            products = snapshot.products.len(),
            filters = snapshot.filters.len(),
            shifts = snapshot.shifts.len(),
            "metadata loaded"
        );
        Ok(snapshot)
    }

    /// Never loaded, invalidated, or older than the TTL.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Instant::now())
    }

    /// [`MetadataCache::needs_refresh`] as of `now`.
    pub fn needs_refresh_at(&self, now: Instant) -> bool {
        match self.freshness.load().as_deref() {
            None => true,
            Some(f) => {
                f.epoch != self.epoch.load(Ordering::Acquire)
                    || now.saturating_duration_since(f.loaded_at) > self.ttl
            }
        }
    }

    /// Marks the cache stale. Data stays readable until the next load.
    pub fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.freshness.store(None);
        info!(tenant = %self.tenant, "metadata invalidated");
    }

    /// Current snapshot; hold it to read several maps consistently.
    pub fn snapshot(&self) -> Arc<MetadataSnapshot> {
        self.current.load_full()
    }

    /// Line by id.
    pub fn line(&self, id: i32) -> Option<ProductionLine> {
        self.current.load().line(id).cloned()
    }

    /// All cached lines, by id.
    pub fn lines(&self) -> Vec<ProductionLine> {
        MetadataSnapshot::sorted(&self.current.load().lines)
    }

    /// Area by id.
    pub fn area(&self, id: i32) -> Option<Area> {
        self.current.load().area(id).cloned()
    }

    /// All cached areas, by id.
    pub fn areas(&self) -> Vec<Area> {
        MetadataSnapshot::sorted(&self.current.load().areas)
    }

    /// Product by id.
    pub fn product(&self, id: i32) -> Option<Product> {
        self.current.load().product(id).cloned()
    }

    /// All cached products, by id.
    pub fn products(&self) -> Vec<Product> {
        MetadataSnapshot::sorted(&self.current.load().products)
    }

    /// Filter preset by id.
    pub fn filter(&self, id: i32) -> Option<Filter> {
        self.current.load().filter(id).cloned()
    }

    /// All cached filter presets, by id.
    pub fn filters(&self) -> Vec<Filter> {
        MetadataSnapshot::sorted(&self.current.load().filters)
    }

    /// Shift by id.
    pub fn shift(&self, id: i32) -> Option<Shift> {
        self.current.load().shift(id).cloned()
    }

    /// All cached shifts, by id.
    pub fn shifts(&self) -> Vec<Shift> {
        MetadataSnapshot::sorted(&self.current.load().shifts)
    }

    /// Areas of a line in flow order.
    pub fn areas_by_line(&self, line_id: i32) -> Vec<Area> {
        self.current.load().areas_by_line(line_id).cloned().collect()
    }

    /// See [`MetadataSnapshot::input_area`].
    pub fn input_area(&self, line_id: i32) -> Option<Area> {
        self.current.load().input_area(line_id).cloned()
    }

    /// See [`MetadataSnapshot::output_area`].
    pub fn output_area(&self, line_id: i32) -> Option<Area> {
        self.current.load().output_area(line_id).cloned()
    }

    /// `process` areas of a line in flow order.
    pub fn process_areas(&self, line_id: i32) -> Vec<Area> {
        self.current
            .load()
            .process_areas(line_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Sizes, version and staleness.
    pub fn stats(&self) -> CacheStats {
        let snap = self.current.load();
        CacheStats {
            tenant: self.tenant.clone(),
            version: snap.version,
            loaded_at: snap.loaded_at,
            stale: self.needs_refresh(),
            lines: snap.lines.len(),
            areas: snap.areas.len(),
            products: snap.products.len(),
            filters: snap.filters.len(),
            shifts: snap.shifts.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(id: i32, line_id: i32, ty: &str, order: i32) -> AreaRow {
        AreaRow {
            id,
            line_id,
            name: format!("A{id}"),
            area_type: ty.into(),
            area_order: order,
        }
    }

    fn snapshot(areas: Vec<AreaRow>) -> MetadataSnapshot {
        MetadataSnapshot::build(TenantId::from("t"), 1, vec![], areas, vec![], vec![], vec![])
    }

    #[test]
    fn areas_by_line_follow_area_order() {
        let snap = snapshot(vec![
            area(3, 1, "output", 3),
            area(1, 1, "input", 1),
            area(2, 1, "process", 2),
            area(9, 2, "input", 1),
        ]);
        let ids: Vec<i32> = snap.areas_by_line(1).map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snap.input_area(1).map(|a| a.id), Some(1));
        assert_eq!(snap.output_area(1).map(|a| a.id), Some(3));
        assert_eq!(snap.process_areas(1).len(), 1);
        assert!(snap.areas_by_line(7).next().is_none());
    }

    #[test]
    fn input_and_output_fall_back_to_order() {
        let snap = snapshot(vec![area(5, 1, "process", 20), area(4, 1, "process", 10)]);
        assert_eq!(snap.input_area(1).map(|a| a.id), Some(4));
        assert_eq!(snap.output_area(1).map(|a| a.id), Some(5));
    }

    #[test]
    fn unknown_area_types_are_skipped() {
        let snap = snapshot(vec![area(1, 1, "input", 1), area(2, 1, "belt", 2)]);
        assert!(snap.area(2).is_none());
        assert_eq!(snap.areas_by_line(1).count(), 1);
    }

    #[test]
    fn fresh_cache_is_empty_and_stale() {
        let cache = MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL);
        assert!(cache.needs_refresh());
        assert!(cache.area(1).is_none());
        let stats = cache.stats();
        assert_eq!(stats.version, 0);
        assert!(stats.stale);
        assert_eq!(stats.loaded_at, None);
    }
}
