//! Runs against a real MySQL 8 when `MYSQL_TEST_URL` is set; skips otherwise.
//!
//! The test creates and drops its own `detection_line_990001` table.

use chrono::{Duration, Timelike, Utc};
use diesel_async::SimpleAsyncConnection;
use line_analytics::{
    db::connection::connect_mysql,
    interval::AggregationInterval,
    partition::{FactTable, PartitionManager},
    repository::DetectionRepository,
    spec::{LineId, QueryFilterSpec},
};
use shared_utils::env::optional_env_var;

#[tokio::test]
async fn partitions_and_reads_against_mysql() {
    let Some(url) = optional_env_var("MYSQL_TEST_URL") else {
        eprintln!("MYSQL_TEST_URL not set, skipping");
        return;
    };
    let mut conn = connect_mysql(&url).await.expect("connect");

    let line = LineId::new(990_001).unwrap();
    let table = FactTable::Detections.table_name(line);
    conn.batch_execute(&format!("DROP TABLE IF EXISTS {table}"))
        .await
        .unwrap();

    let mgr = PartitionManager::new();
    let now = Utc::now().naive_utc().with_nanosecond(0).unwrap();
    let today = now.date();

    assert!(
        mgr.create_table_with_partitions(&mut conn, FactTable::Detections, line, Some(today), 3)
            .await
            .unwrap()
    );
    assert!(
        !mgr.create_table_with_partitions(&mut conn, FactTable::Detections, line, Some(today), 3)
            .await
            .unwrap()
    );
    assert_eq!(mgr.get_existing_partitions(&mut conn, &table).await.unwrap().len(), 4);

    let added = mgr.ensure_partitions_ahead(&mut conn, &table, 4).await.unwrap();
    assert_eq!(added, 2);
    let parts = mgr.get_existing_partitions(&mut conn, &table).await.unwrap();
    assert_eq!(parts.len(), 6);
    assert_eq!(parts.last().map(|p| p.name.as_str()), Some("pmax"));

    let midnight = today.and_hms_opt(0, 0, 0).unwrap();
    let end = now.max(midnight + Duration::seconds(1));
    conn.batch_execute(&format!(
        "INSERT INTO {table} (detected_at, area_id, product_id) VALUES \
         ('{m}', 10, 100), ('{m}', 10, 100), ('{m}', 12, 101)",
        m = midnight.format("%Y-%m-%d %H:%M:%S")
    ))
    .await
    .unwrap();

    let spec = QueryFilterSpec::new(line.get().into(), midnight, end, AggregationInterval::OneDay)
        .unwrap()
        .with_area_ids([10])
        .unwrap();
    let mut repo = DetectionRepository::new(&mut conn);

    let rows = repo.get_detections(&spec).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.area_id == 10 && r.detected_at == midnight));

    let page = repo.get_detections_paginated(&spec, 2, 1).await.unwrap();
    assert_eq!((page.total, page.pages, page.data.len()), (2, 2, 1));

    let buckets = repo
        .get_aggregated_detections(&spec, AggregationInterval::OneDay)
        .await
        .unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].bucket, midnight);
    assert_eq!(buckets[0].detection_count, 2);

    let on_output = repo
        .count_detections_by_area(line, 12, midnight, end)
        .await
        .unwrap();
    assert_eq!(on_output, 1);

    conn.batch_execute(&format!("DROP TABLE {table}")).await.unwrap();
}
