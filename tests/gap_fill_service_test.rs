// Weekend gap filling against stored readings

mod common;

use chrono::NaiveDate;
use meter_reconciliation_service::db::ReadingRepository;
use meter_reconciliation_service::gaps::WEEKEND_READING_NOTE;
use meter_reconciliation_service::services::{GapFillError, GapFillService};
use serial_test::serial;

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn seed_friday_monday(repo: &ReadingRepository, meter_id: i64) {
    // Friday 2025-01-03 and Monday 2025-01-06
    repo.upsert_reading(meter_id, ymd(2025, 1, 3), 100.0, None)
        .await
        .unwrap();
    repo.upsert_reading(meter_id, ymd(2025, 1, 6), 130.0, None)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
async fn test_preview_does_not_write() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["940001"]).await;
    let facility_id = common::create_facility(pool, "Gap preview").await;
    let meter_id = common::create_meter(pool, facility_id, "940001").await;
    let repo = ReadingRepository::new(pool.clone());
    seed_friday_monday(&repo, meter_id).await;

    let report = GapFillService::new(pool.clone())
        .preview_weekend_gaps(meter_id)
        .await
        .unwrap();

    assert_eq!(report.readings_scanned, 2);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.points_planned, 2);
    assert_eq!(report.gaps[0].weekend_points[0].value, 110.0);
    assert_eq!(report.gaps[0].weekend_points[1].value, 120.0);
    assert_eq!(repo.count_for_meter(meter_id).await.unwrap(), 2);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_fill_twice_creates_no_duplicates() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["940002"]).await;
    let facility_id = common::create_facility(pool, "Gap fill twice").await;
    let meter_id = common::create_meter(pool, facility_id, "940002").await;
    let repo = ReadingRepository::new(pool.clone());
    seed_friday_monday(&repo, meter_id).await;
    let service = GapFillService::new(pool.clone());

    let first = service.fill_weekend_gaps(meter_id).await.unwrap();
    assert_eq!(first.gaps_found, 1);
    assert_eq!(first.inserted, 2);

    let saturday = repo
        .find_one(meter_id, ymd(2025, 1, 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saturday.value, 110.0);
    assert_eq!(saturday.notes.as_deref(), Some(WEEKEND_READING_NOTE));

    // The filled series has no multi-day gaps left
    let second = service.fill_weekend_gaps(meter_id).await.unwrap();
    assert_eq!(second.gaps_found, 0);
    assert_eq!(second.inserted, 0);
    assert_eq!(repo.count_for_meter(meter_id).await.unwrap(), 4);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_fill_keeps_existing_reading() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;
    common::cleanup_serials(pool, &["940003"]).await;
    let facility_id = common::create_facility(pool, "Gap fill existing").await;
    let meter_id = common::create_meter(pool, facility_id, "940003").await;
    let repo = ReadingRepository::new(pool.clone());
    // Thursday, Saturday (manual), Tuesday
    repo.upsert_reading(meter_id, ymd(2025, 1, 2), 100.0, None)
        .await
        .unwrap();
    repo.upsert_reading(meter_id, ymd(2025, 1, 4), 111.0, Some("Manual"))
        .await
        .unwrap();
    repo.upsert_reading(meter_id, ymd(2025, 1, 7), 140.0, None)
        .await
        .unwrap();

    let summary = GapFillService::new(pool.clone())
        .fill_weekend_gaps(meter_id)
        .await
        .unwrap();

    // Thu->Sat spans only Friday; Sat->Tue spans Sunday and Monday
    assert_eq!(summary.inserted, 1);
    let saturday = repo
        .find_one(meter_id, ymd(2025, 1, 4))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saturday.value, 111.0);
    assert_eq!(saturday.notes.as_deref(), Some("Manual"));
    let sunday = repo
        .find_one(meter_id, ymd(2025, 1, 5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sunday.value, 120.67);

    common::cleanup_facility(pool, facility_id).await;
}

#[tokio::test]
#[serial]
async fn test_unknown_meter() {
    let Some(pool) = common::test_pool().await else {
        return;
    };
    let pool = &pool;

    let result = GapFillService::new(pool.clone())
        .preview_weekend_gaps(-1)
        .await;

    assert!(matches!(result, Err(GapFillError::MeterNotFound(-1))));
}
