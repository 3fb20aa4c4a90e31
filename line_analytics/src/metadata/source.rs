//! Where the cache gets its rows from.

use async_trait::async_trait;

use crate::metadata::models::{AreaRow, Filter, Product, ProductionLine, Shift};

/// Reads the five reference tables.
///
/// The MySQL implementation is in [`crate::db::mysql`]. Each method is one
/// query; the cache calls all five per load.
#[async_trait]
pub trait ReferenceDataSource: Send {
    /// Active production lines.
    async fn load_lines(&mut self) -> Result<Vec<ProductionLine>, diesel::result::Error>;
    /// All areas, any line.
    async fn load_areas(&mut self) -> Result<Vec<AreaRow>, diesel::result::Error>;
    /// All products.
    async fn load_products(&mut self) -> Result<Vec<Product>, diesel::result::Error>;
    /// Active filter presets.
    async fn load_filters(&mut self) -> Result<Vec<Filter>, diesel::result::Error>;
    /// Active shifts.
    async fn load_shifts(&mut self) -> Result<Vec<Shift>, diesel::result::Error>;
}
