//! Reference data (lines, areas, products, filters, shifts) cached per tenant.
//!
//! Detection rows carry only ids; the service resolves them against a
//! [`MetadataSnapshot`] instead of joining in SQL.

pub mod cache;
pub mod models;
pub mod registry;
pub mod source;

pub use cache::{CacheStats, DEFAULT_TTL, MetadataCache, MetadataSnapshot, TenantId};
pub use models::{Area, AreaRow, AreaType, Filter, Product, ProductionLine, Shift};
pub use registry::MetadataRegistry;
pub use source::ReferenceDataSource;
