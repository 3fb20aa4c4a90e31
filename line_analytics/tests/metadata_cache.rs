use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use line_analytics::{
    AnalyticsError,
    metadata::{AreaType, DEFAULT_TTL, MetadataCache, MetadataRegistry, TenantId},
};

mod common;
use common::{area, sample_source};

#[tokio::test]
async fn load_publishes_all_maps() {
    let mut source = sample_source();
    let cache = MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL);

    let snap = cache.load(&mut source).await.unwrap();

    assert_eq!(snap.version(), 1);
    assert!(!cache.needs_refresh());
    assert_eq!(cache.line(1).map(|l| l.name), Some("Line 1".to_string()));
    assert_eq!(cache.area(10).map(|a| a.area_type), Some(AreaType::Input));
    assert_eq!(cache.product(101).and_then(|p| p.weight), Some(3.2));
    assert_eq!(cache.filter(1).map(|f| f.line_id), Some(1));
    assert_eq!(cache.shift(3).map(|s| s.window().crosses_midnight()), Some(true));
    assert!(cache.product(999).is_none());

    assert_eq!(cache.products().len(), 2);
    assert_eq!(
        cache.areas_by_line(1).iter().map(|a| a.id).collect::<Vec<_>>(),
        vec![10, 11, 12]
    );
    assert_eq!(cache.input_area(1).map(|a| a.id), Some(10));
    assert_eq!(cache.output_area(1).map(|a| a.id), Some(12));
    assert_eq!(cache.process_areas(1).len(), 1);

    let stats = cache.stats();
    assert_eq!((stats.lines, stats.areas, stats.products, stats.filters, stats.shifts), (1, 3, 2, 1, 1));
    assert!(!stats.stale);
    assert!(stats.loaded_at.is_some());
}

#[tokio::test]
async fn invalidate_marks_stale_but_keeps_data_readable() {
    let mut source = sample_source();
    let cache = MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL);
    cache.load(&mut source).await.unwrap();

    cache.invalidate();

    assert!(cache.needs_refresh());
    assert_eq!(cache.area(11).map(|a| a.name), Some("Oven".to_string()));
    assert_eq!(cache.snapshot().version(), 1);

    assert!(cache.refresh_if_needed(&mut source).await.unwrap());
    assert_eq!(cache.snapshot().version(), 2);
    assert!(!cache.refresh_if_needed(&mut source).await.unwrap());
    assert_eq!(source.load_count(), 2);
}

#[tokio::test]
async fn invalidation_during_a_load_leaves_the_cache_stale() {
    let cache = Arc::new(MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL));
    let mut source = sample_source();
    source.invalidate_during_load = Some(Arc::clone(&cache));

    // The hook fires between load_lines and load_shifts.
    let snap = cache.load(&mut source).await.unwrap();
    assert_eq!(snap.version(), 1);
    assert!(cache.area(10).is_some());
    assert!(cache.needs_refresh());
    assert!(cache.stats().stale);

    assert!(cache.refresh_if_needed(&mut source).await.unwrap());
    assert_eq!(cache.snapshot().version(), 2);
    assert!(!cache.needs_refresh());
    assert_eq!(source.load_count(), 2);
}

#[tokio::test]
async fn ttl_expiry_requires_refresh() {
    let mut source = sample_source();
    let cache = MetadataCache::new(TenantId::from("acme"), Duration::from_secs(300));
    cache.load(&mut source).await.unwrap();

    assert!(!cache.needs_refresh_at(Instant::now() + Duration::from_secs(299)));
    assert!(cache.needs_refresh_at(Instant::now() + Duration::from_secs(301)));
}

#[tokio::test]
async fn reload_replaces_the_snapshot_atomically() {
    let mut source = sample_source();
    let cache = MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL);
    let before = cache.load(&mut source).await.unwrap();

    source.areas.push(area(13, 1, "Reject", "discard", 4));
    source.areas.retain(|a| a.id != 11);
    cache.load(&mut source).await.unwrap();

    // The old snapshot is untouched; the cache serves the new one.
    assert!(before.area(11).is_some());
    assert!(before.area(13).is_none());
    assert!(cache.area(11).is_none());
    assert_eq!(cache.area(13).map(|a| a.area_type), Some(AreaType::Discard));
}

#[tokio::test]
async fn failed_load_keeps_previous_snapshot() {
    let mut source = sample_source();
    let cache = MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL);
    cache.load(&mut source).await.unwrap();
    cache.invalidate();

    source.fail = true;
    let err = cache.refresh_if_needed(&mut source).await.unwrap_err();
    assert!(matches!(err, AnalyticsError::Backend { .. }));
    assert!(cache.needs_refresh());
    assert_eq!(cache.snapshot().version(), 1);
    assert!(cache.area(10).is_some());
}

#[tokio::test]
async fn concurrent_refreshes_load_once() {
    let source = sample_source();
    let cache = Arc::new(MetadataCache::new(TenantId::from("acme"), DEFAULT_TTL));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let mut source = source.clone();
            tokio::spawn(async move { cache.refresh_if_needed(&mut source).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    assert_eq!(source.load_count(), 1);
    assert_eq!(cache.snapshot().version(), 1);
}

#[tokio::test]
async fn registry_creates_loads_and_isolates_tenants() {
    let registry = MetadataRegistry::new(DEFAULT_TTL);
    let acme = TenantId::from("acme");
    let globex = TenantId::from("globex");

    assert!(matches!(registry.get(&acme), Err(AnalyticsError::UnknownTenant(_))));

    let mut acme_source = sample_source();
    let mut globex_source = sample_source();
    globex_source.products.clear();

    let a = registry.get_or_create(&acme, &mut acme_source).await.unwrap();
    let g = registry.get_or_create(&globex, &mut globex_source).await.unwrap();
    assert_eq!(a.products().len(), 2);
    assert!(g.products().is_empty());
    assert_eq!(registry.len(), 2);

    // Second access reuses the fresh cache without loading.
    let again = registry.get_or_create(&acme, &mut acme_source).await.unwrap();
    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(acme_source.load_count(), 1);

    assert!(registry.invalidate_tenant(&acme));
    assert!(a.needs_refresh());
    assert!(!g.needs_refresh());
    registry.get_or_create(&acme, &mut acme_source).await.unwrap();
    assert_eq!(acme_source.load_count(), 2);

    assert!(!registry.invalidate_tenant(&TenantId::from("initech")));
    assert!(registry.remove(&globex));
    assert!(registry.get(&globex).is_err());
    assert_eq!(
        registry.stats().iter().map(|s| s.tenant.as_str()).collect::<Vec<_>>(),
        vec!["acme"]
    );
}
