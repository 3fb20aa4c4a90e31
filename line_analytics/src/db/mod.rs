//! MySQL plumbing.
//!
//! - [`connection::connect_mysql`] opens an async connection with a UTC session.
//! - [`mysql`] implements [`crate::partition::PartitionCatalog`],
//!   [`crate::repository::QueryRunner`] and
//!   [`crate::metadata::ReferenceDataSource`] for `AsyncMysqlConnection`.
//!
//! The core never pools; callers own connections and pass one per logical
//! operation.

pub mod connection;
pub mod mysql;
