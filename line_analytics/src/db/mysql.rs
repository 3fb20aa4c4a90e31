//! The crate's database seams, implemented for [`AsyncMysqlConnection`].

use async_trait::async_trait;
use diesel::{
    ExpressionMethods, QueryDsl, QueryableByName, SelectableHelper,
    mysql::Mysql,
    query_builder::{BoxedSqlQuery, SqlQuery},
    result::Error,
    sql_types::{BigInt, Integer, Nullable, Text, Time, Timestamp},
};
use diesel_async::{AsyncMysqlConnection, RunQueryDsl, SimpleAsyncConnection};

use crate::{
    metadata::{
        models::{AreaRow, Filter, Product, ProductionLine, Shift},
        source::ReferenceDataSource,
    },
    partition::catalog::{PartitionCatalog, PartitionInfo},
    query::{BindValue, Statement},
    repository::runner::{AggregateRecord, CountRow, DetectionRecord, QueryRunner},
    schema::{areas, filters, production_lines, products, shifts},
};

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) AS total FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?";

const LIST_PARTITIONS_SQL: &str = "SELECT PARTITION_NAME AS partition_name, \
     PARTITION_DESCRIPTION AS description, \
     CAST(COALESCE(TABLE_ROWS, 0) AS SIGNED) AS table_rows \
     FROM information_schema.PARTITIONS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND PARTITION_NAME IS NOT NULL \
     ORDER BY PARTITION_ORDINAL_POSITION";

#[derive(QueryableByName)]
struct PartitionRow {
    #[diesel(sql_type = Text)]
    partition_name: String,
    #[diesel(sql_type = Nullable<Text>)]
    description: Option<String>,
    #[diesel(sql_type = BigInt)]
    table_rows: i64,
}

impl From<PartitionRow> for PartitionInfo {
    fn from(row: PartitionRow) -> Self {
        PartitionInfo {
            name: row.partition_name,
            description: row.description,
            row_estimate: row.table_rows,
        }
    }
}

#[async_trait]
impl PartitionCatalog for AsyncMysqlConnection {
    async fn table_exists(&mut self, table: &str) -> Result<bool, Error> {
        let row: CountRow = diesel::sql_query(TABLE_EXISTS_SQL)
            .bind::<Text, _>(table)
            .get_result(self)
            .await?;
        Ok(row.total > 0)
    }

    async fn execute_ddl(&mut self, ddl: &str) -> Result<(), Error> {
        self.batch_execute(ddl).await
    }

    async fn list_partitions(&mut self, table: &str) -> Result<Vec<PartitionInfo>, Error> {
        let rows: Vec<PartitionRow> = diesel::sql_query(LIST_PARTITIONS_SQL)
            .bind::<Text, _>(table)
            .load(self)
            .await?;
        Ok(rows.into_iter().map(PartitionInfo::from).collect())
    }
}

/// `stmt` as a boxed raw query with every bind attached in placeholder order.
fn bound(stmt: &Statement) -> BoxedSqlQuery<'static, Mysql, SqlQuery> {
    let mut query = diesel::sql_query(stmt.sql().to_owned()).into_boxed::<Mysql>();
    for value in stmt.binds() {
        query = match value {
            BindValue::Int(v) => query.bind::<Integer, _>(v),
            BindValue::BigInt(v) => query.bind::<BigInt, _>(v),
            BindValue::Timestamp(v) => query.bind::<Timestamp, _>(v),
            BindValue::Time(v) => query.bind::<Time, _>(v),
        };
    }
    query
}

#[async_trait]
impl QueryRunner for AsyncMysqlConnection {
    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, Error> {
        let row: CountRow = bound(stmt).get_result(self).await?;
        Ok(row.total)
    }

    async fn fetch_detections(&mut self, stmt: &Statement) -> Result<Vec<DetectionRecord>, Error> {
        bound(stmt).load(self).await
    }

    async fn fetch_buckets(&mut self, stmt: &Statement) -> Result<Vec<AggregateRecord>, Error> {
        bound(stmt).load(self).await
    }

    async fn fetch_partitions(&mut self, table: &str) -> Result<Vec<PartitionInfo>, Error> {
        PartitionCatalog::list_partitions(self, table).await
    }
}

#[async_trait]
impl ReferenceDataSource for AsyncMysqlConnection {
    async fn load_lines(&mut self) -> Result<Vec<ProductionLine>, Error> {
        production_lines::table
            .filter(production_lines::is_active.eq(true))
            .order(production_lines::id.asc())
            .select(ProductionLine::as_select())
            .load(self)
            .await
    }

    async fn load_areas(&mut self) -> Result<Vec<AreaRow>, Error> {
        areas::table
            .order((areas::line_id.asc(), areas::area_order.asc()))
            .select(AreaRow::as_select())
            .load(self)
            .await
    }

    async fn load_products(&mut self) -> Result<Vec<Product>, Error> {
        products::table
            .order(products::id.asc())
            .select(Product::as_select())
            .load(self)
            .await
    }

    async fn load_filters(&mut self) -> Result<Vec<Filter>, Error> {
        filters::table
            .filter(filters::is_active.eq(true))
            .order(filters::id.asc())
            .select(Filter::as_select())
            .load(self)
            .await
    }

    async fn load_shifts(&mut self) -> Result<Vec<Shift>, Error> {
        shifts::table
            .filter(shifts::is_active.eq(true))
            .order(shifts::start_time.asc())
            .select(Shift::as_select())
            .load(self)
            .await
    }
}
