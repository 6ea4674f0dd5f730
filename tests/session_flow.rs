use std::{path::PathBuf, time::Duration};

use chrono::Utc;
use focus_sprint::{
    completed_session_stats, Database, SessionConfig, SessionEvent, SessionService, SessionStatus,
    StatsRange,
};
use tokio::time::timeout;

fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("focus-sprint-test-{}.sqlite3", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn lifecycle_round_trip_is_persisted_and_counted() {
    let db = Database::new(temp_db_path()).unwrap();
    let service = SessionService::new(db.clone(), SessionConfig::default());

    let created = service
        .create_session("  Deep Work  ", Some(1500))
        .await
        .unwrap();
    assert_eq!(created.title, "Deep Work");
    assert_eq!(created.status, SessionStatus::Created);
    assert_eq!(created.planned_duration_sec, 1500);
    assert!(created.started_at.is_none());

    let running = service.start().await.unwrap();
    assert_eq!(running.status, SessionStatus::Running);
    assert!(running.started_at.is_some());
    assert!(running.last_resumed_at.is_some());

    let paused = service.pause().await.unwrap();
    assert_eq!(paused.status, SessionStatus::Paused);
    assert!(paused.last_resumed_at.is_none());

    let resumed = service.start().await.unwrap();
    assert_eq!(resumed.status, SessionStatus::Running);
    assert_eq!(resumed.started_at, running.started_at);

    let finished = service.complete().await.unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
    let completed_at = finished.completed_at.expect("completed_at must be set");

    assert!(service.active_session().await.is_none());

    let stored = db.get_session(&finished.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    assert_eq!(stored.completed_at, Some(completed_at));
    assert!(stored.last_resumed_at.is_none());

    let summary = completed_session_stats(&db, StatsRange::Year, completed_at, Some("UTC"))
        .await
        .unwrap();
    assert_eq!(summary.total, 1);
    let sum: u64 = summary.buckets.iter().map(|b| b.value).sum();
    assert_eq!(sum, 1);
}

#[tokio::test]
async fn only_one_session_may_be_active() {
    let db = Database::new(temp_db_path()).unwrap();
    let service = SessionService::new(db, SessionConfig::default());

    service.create_session("first", None).await.unwrap();
    assert!(service.create_session("second", None).await.is_err());

    service.cancel().await.unwrap();
    service.create_session("second", None).await.unwrap();
}

#[tokio::test]
async fn canceled_sessions_are_not_counted_in_stats() {
    let db = Database::new(temp_db_path()).unwrap();
    let service = SessionService::new(db.clone(), SessionConfig::default());

    service.create_session("kept", None).await.unwrap();
    service.start().await.unwrap();
    let finished = service.complete().await.unwrap();

    service.create_session("dropped", None).await.unwrap();
    service.start().await.unwrap();
    let canceled = service.cancel().await.unwrap();
    assert_eq!(canceled.status, SessionStatus::Canceled);
    assert!(canceled.completed_at.is_none());

    let anchor = finished.completed_at.unwrap();
    let summary = completed_session_stats(&db, StatsRange::Year, anchor, Some("UTC"))
        .await
        .unwrap();
    assert_eq!(summary.total, 1);
}

#[tokio::test]
async fn countdown_auto_completes_exactly_once() {
    let db = Database::new(temp_db_path()).unwrap();
    let config = SessionConfig {
        default_duration_sec: 1,
        tick_interval: Duration::from_millis(50),
    };
    let service = SessionService::new(db.clone(), config);
    let mut events = service.subscribe();

    let created = service.create_session("quick", Some(1)).await.unwrap();
    service.start().await.unwrap();

    let finished = loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("expected a completion event before the timeout")
            .unwrap();
        if let SessionEvent::Completed(session) = event {
            break session;
        }
    };
    assert_eq!(finished.id, created.id);
    assert_eq!(finished.status, SessionStatus::Completed);
    assert!(finished.completed_at.is_some());

    // No second completion arrives.
    let follow_up = timeout(Duration::from_millis(500), events.recv()).await;
    assert!(follow_up.is_err());

    assert!(service.active_session().await.is_none());
    let stored = db.get_session(&created.id).await.unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
}

#[tokio::test]
async fn active_session_is_recovered_on_startup() {
    let path = temp_db_path();
    let db = Database::new(path.clone()).unwrap();

    let first = SessionService::new(db.clone(), SessionConfig::default());
    let created = first.create_session("survivor", None).await.unwrap();
    first.start().await.unwrap();

    let second = SessionService::new(db, SessionConfig::default());
    let recovered = second.load_active().await.unwrap().expect("session should survive");
    assert_eq!(recovered.id, created.id);
    assert_eq!(recovered.status, SessionStatus::Running);
    assert!(second.remaining_seconds(Utc::now()).await.is_some());
}

#[tokio::test]
async fn unknown_timezone_is_an_error() {
    let db = Database::new(temp_db_path()).unwrap();
    let result =
        completed_session_stats(&db, StatsRange::Day, Utc::now(), Some("Not/AZone")).await;
    assert!(result.is_err());
}
