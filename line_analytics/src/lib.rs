//! Partitioned time-series access for factory production data.
//!
//! Per-line fact tables (`detection_line_<id>`, `downtime_events_<id>`) are
//! range-partitioned by month. This crate:
//! - manages those partitions ([`partition::PartitionManager`]),
//! - turns validated filters into partition-pruned, parameterized SQL
//!   ([`query::QueryBuilder`]) and runs it ([`repository::DetectionRepository`]),
//! - caches reference data per tenant ([`metadata::MetadataRegistry`]),
//! - joins detections against that cache ([`service::DetectionService`]).
//!
//! Database access goes through three async traits
//! ([`partition::PartitionCatalog`], [`repository::QueryRunner`],
//! [`metadata::ReferenceDataSource`]); [`db::mysql`] implements them for an
//! async MySQL connection.

#![deny(missing_docs)]

pub mod config;
pub mod db;
pub mod error;
pub mod interval;
pub mod metadata;
pub mod partition;
pub mod query;
pub mod repository;
#[allow(missing_docs)]
pub mod schema;
pub mod service;
pub mod spec;

pub use error::{AnalyticsError, Result};
