//! SQL construction for detection reads.

pub mod builder;
pub mod hint;
pub mod statement;

pub use builder::QueryBuilder;
pub use hint::PartitionHint;
pub use statement::{BindValue, SqlValue, Statement};
