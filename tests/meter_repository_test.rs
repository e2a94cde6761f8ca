// Tests for MeterRepository identity resolution

mod common;

use meter_reconciliation_service::db::{MeterRepository, MeterStatus, MeterType};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_resolve_creates_meter_once() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["910001"]).await;
    let facility_id = common::create_facility(pool, "Resolve once").await;
    let repo = MeterRepository::new(pool.clone());

    let first = repo
        .resolve_or_create_meter("910001", "Gas Hauptzähler [910001]", facility_id, Some(MeterType::Gas))
        .await
        .unwrap();
    let second = repo
        .resolve_or_create_meter("910001", "Gas Hauptzähler [910001]", facility_id, Some(MeterType::Gas))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.meter_id, second.meter_id);
    assert_eq!(repo.count(Some(facility_id)).await.unwrap(), 1);

    let meter = repo.find_by_id(first.meter_id).await.unwrap().unwrap();
    assert_eq!(meter.serial_number, "910001");
    assert_eq!(meter.meter_type, MeterType::Gas);
    assert_eq!(meter.location, "Gas Hauptzähler");
    assert_eq!(meter.status, MeterStatus::Active);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_first_write_wins() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["910002"]).await;
    let facility_id = common::create_facility(pool, "First write wins").await;
    let repo = MeterRepository::new(pool.clone());

    let created = repo
        .resolve_or_create_meter("910002", "Kessel Nord [910002]", facility_id, Some(MeterType::Heating))
        .await
        .unwrap();
    let again = repo
        .resolve_or_create_meter("910002", "Renamed elsewhere 910002", facility_id, Some(MeterType::Water))
        .await
        .unwrap();

    assert_eq!(created.meter_id, again.meter_id);
    let meter = repo.find_by_serial("910002").await.unwrap().unwrap();
    assert_eq!(meter.location, "Kessel Nord");
    assert_eq!(meter.meter_type, MeterType::Heating);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_missing_type_defaults_to_electric() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["910003"]).await;
    let facility_id = common::create_facility(pool, "Default type").await;
    let repo = MeterRepository::new(pool.clone());

    let resolved = repo
        .resolve_or_create_meter("910003", "Unterverteilung 910003", facility_id, None)
        .await
        .unwrap();

    let meter = repo.find_by_id(resolved.meter_id).await.unwrap().unwrap();
    assert_eq!(meter.meter_type, MeterType::Electric);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_find_paginated_and_active_by_facility() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["910011", "910012", "910013"]).await;
    let facility_id = common::create_facility(pool, "Pagination").await;
    for serial in ["910011", "910012", "910013"] {
        common::create_meter(pool, facility_id, serial).await;
    }
    sqlx::query("UPDATE meters SET status = 'broken' WHERE serial_number = '910013'")
        .execute(pool)
        .await
        .unwrap();
    let repo = MeterRepository::new(pool.clone());

    let page = repo.find_paginated(Some(facility_id), 0, 2).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].serial_number, "910011");

    let rest = repo.find_paginated(Some(facility_id), 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);

    let active = repo.find_active_by_facility(facility_id).await.unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|m| m.status == MeterStatus::Active));

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_find_by_id_missing() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    let repo = MeterRepository::new(pool.clone());

    assert!(repo.find_by_id(-1).await.unwrap().is_none());
}
