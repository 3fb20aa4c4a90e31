//! Tenant → cache map.
//!
//! The registry is an explicit value handed to whoever needs it; there is no
//! process-global instance. Each tenant slot is an `Arc<MetadataCache>` with
//! its own load lock, so tenants never wait on each other.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    error::{AnalyticsError, Result},
    metadata::{
        cache::{CacheStats, DEFAULT_TTL, MetadataCache, TenantId},
        source::ReferenceDataSource,
    },
};

/// Per-tenant metadata caches.
#[derive(Debug)]
pub struct MetadataRegistry {
    caches: DashMap<TenantId, Arc<MetadataCache>>,
    ttl: Duration,
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl MetadataRegistry {
    /// Empty registry; new caches get `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            caches: DashMap::new(),
            ttl,
        }
    }

    /// Cache for `tenant`, created and loaded on first use and reloaded when
    /// stale.
    pub async fn get_or_create<S>(
        &self,
        tenant: &TenantId,
        source: &mut S,
    ) -> Result<Arc<MetadataCache>>
    where
        S: ReferenceDataSource + ?Sized,
    {
        // Clone out of the map so no shard guard is held across the load.
        let cache = self
            .caches
            .entry(tenant.clone())
            .or_insert_with(|| {
                debug!(%tenant, "creating metadata cache");
                Arc::new(MetadataCache::new(tenant.clone(), self.ttl))
            })
            .clone();
        cache.refresh_if_needed(source).await?;
        Ok(cache)
    }

    /// Existing cache for `tenant`, as is.
    pub fn get(&self, tenant: &TenantId) -> Result<Arc<MetadataCache>> {
        self.caches
            .get(tenant)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| AnalyticsError::UnknownTenant(tenant.to_string()))
    }

    /// Marks `tenant`'s cache stale; returns false if there is none.
    pub fn invalidate_tenant(&self, tenant: &TenantId) -> bool {
        match self.caches.get(tenant) {
            Some(cache) => {
                cache.invalidate();
                true
            }
            None => false,
        }
    }

    /// Drops `tenant`'s slot. Holders of the `Arc` keep a working cache.
    pub fn remove(&self, tenant: &TenantId) -> bool {
        let removed = self.caches.remove(tenant).is_some();
        if removed {
            info!(%tenant, "metadata cache removed");
        }
        removed
    }

    /// Number of tenant slots.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// True when no tenant has a slot.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Stats for every tenant, sorted by tenant.
    pub fn stats(&self) -> Vec<CacheStats> {
        let mut out: Vec<CacheStats> = self.caches.iter().map(|e| e.value().stats()).collect();
        out.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        out
    }
}
