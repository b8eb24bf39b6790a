use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};

use crampwave_lib::{
    analytics::{history_for_range, summarize, trend_series, TimeRange},
    channel::MemoryTransport,
    control::Clock,
    db::Database,
    models::{Profile, SessionRecord},
    AuthContext, ControllerConfig, SessionController, SessionError,
};

fn day1() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn day2() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn day3() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap()
}

async fn record_session(db: &Database, owner: &str, clock: Clock, intensity: u8) -> SessionRecord {
    let (transport, _endpoint) = MemoryTransport::pair();
    let controller = SessionController::new(
        db.clone(),
        AuthContext::signed_in(owner),
        Arc::new(transport),
        ControllerConfig {
            reconnect_delay: Duration::from_millis(50),
            tick_interval: Duration::from_secs(3600),
            clock,
            ..ControllerConfig::default()
        },
    );
    controller.start_session().await.unwrap();
    let record = controller.save(15, intensity, None).await.unwrap();
    controller.shutdown().await.unwrap();
    record
}

async fn seeded() -> (Database, SessionController, Vec<SessionRecord>) {
    let db = Database::in_memory().unwrap();
    // Written out of order on purpose.
    let r2 = record_session(&db, "owner-a", day2, 6).await;
    let r1 = record_session(&db, "owner-a", day1, 8).await;
    let r3 = record_session(&db, "owner-a", day3, 4).await;
    record_session(&db, "owner-b", day2, 2).await;

    let (transport, _endpoint) = MemoryTransport::pair();
    let reader = SessionController::new(
        db.clone(),
        AuthContext::default(),
        Arc::new(transport),
        ControllerConfig::default(),
    );
    (db, reader, vec![r1, r2, r3])
}

#[tokio::test]
async fn history_is_newest_first_and_scoped_to_owner() {
    let (_db, reader, records) = seeded().await;

    let history = reader
        .query_history("owner-a", day1(), day3())
        .await
        .unwrap();
    let ids: Vec<_> = history.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            records[2].id.as_str(),
            records[1].id.as_str(),
            records[0].id.as_str()
        ]
    );
    assert!(history.iter().all(|r| r.owner_id == "owner-a"));

    reader.shutdown().await.unwrap();
}

#[tokio::test]
async fn history_bounds_are_inclusive() {
    let (_db, reader, records) = seeded().await;

    let history = reader
        .query_history("owner-a", day2(), day2())
        .await
        .unwrap();
    assert_eq!(history, vec![records[1].clone()]);

    let none = reader
        .query_history("owner-a", day3() + chrono::Duration::seconds(1), day3() + chrono::Duration::days(1))
        .await
        .unwrap();
    assert!(none.is_empty());

    let err = reader
        .query_history("owner-a", day3(), day1())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Validation(_)), "{err:?}");

    reader.shutdown().await.unwrap();
}

#[tokio::test]
async fn analytics_ranges_filter_and_chart_oldest_first() {
    let (db, reader, records) = seeded().await;
    let now = day3() + chrono::Duration::days(6);

    let week = history_for_range(&db, "owner-a", TimeRange::Week, now)
        .await
        .unwrap();
    assert_eq!(week.len(), 2);
    assert_eq!(week[0].id, records[2].id);

    let all = history_for_range(&db, "owner-a", TimeRange::All, now)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let trend = trend_series(&all);
    let intensities: Vec<u8> = trend.iter().map(|p| p.intensity).collect();
    assert_eq!(intensities, vec![8, 6, 4]);

    let summary = summarize(&all);
    assert_eq!(summary.session_count, 3);
    assert!((summary.average_intensity - 6.0).abs() < 1e-9);

    reader.shutdown().await.unwrap();
}

#[tokio::test]
async fn account_listing_matches_full_history() {
    let (db, reader, _records) = seeded().await;
    let listed = db.list_sessions_for_owner("owner-a").await.unwrap();
    let queried = history_for_range(&db, "owner-a", TimeRange::All, day3())
        .await
        .unwrap();
    assert_eq!(listed, queried);
    reader.shutdown().await.unwrap();
}

#[tokio::test]
async fn profile_round_trips_with_prediction() {
    let db = Database::in_memory().unwrap();
    let profile = Profile {
        cycle_length_days: Some(28),
        last_period_start_date: chrono::NaiveDate::from_ymd_opt(2026, 10, 1),
        pain_level: Some(7),
        ..Profile::new("owner-a", "Asha")
    };
    profile.validate().unwrap();
    db.upsert_profile(&profile).await.unwrap();

    let stored = db.get_profile("owner-a").await.unwrap().unwrap();
    assert_eq!(stored, profile);
    assert_eq!(
        stored.predicted_next_cycle(),
        chrono::NaiveDate::from_ymd_opt(2026, 10, 29)
    );

    let updated = Profile {
        cycle_length_days: Some(30),
        ..stored
    };
    db.upsert_profile(&updated).await.unwrap();
    assert_eq!(
        db.get_profile("owner-a")
            .await
            .unwrap()
            .unwrap()
            .predicted_next_cycle(),
        chrono::NaiveDate::from_ymd_opt(2026, 10, 31)
    );
    assert!(db.get_profile("owner-b").await.unwrap().is_none());
}
