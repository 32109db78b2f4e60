//! Singleton daemon-state round-trips.

use clipnote_db::models::status::DaemonStatus;
use clipnote_db::repositories::DaemonStateRepo;
use sqlx::SqlitePool;
use tempfile::TempDir;

async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = clipnote_db::connect(&dir.path().join("queue.db"))
        .await
        .unwrap();
    (pool, dir)
}

#[tokio::test]
async fn fresh_store_is_seeded_stopped() {
    let (pool, _dir) = test_pool().await;
    let state = DaemonStateRepo::get(&pool).await.unwrap();
    assert_eq!(state.status(), DaemonStatus::Stopped);
    assert!(state.pid.is_none());
    assert!(state.started_at.is_none());
    assert_eq!(state.worker_count, 2);
}

#[tokio::test]
async fn register_running_then_stopped() {
    let (pool, _dir) = test_pool().await;

    DaemonStateRepo::set(&pool, Some(31337), DaemonStatus::Running, 4)
        .await
        .unwrap();
    let state = DaemonStateRepo::get(&pool).await.unwrap();
    assert_eq!(state.status(), DaemonStatus::Running);
    assert_eq!(state.pid, Some(31337));
    assert_eq!(state.worker_count, 4);
    assert!(state.started_at.is_some());

    DaemonStateRepo::set(&pool, None, DaemonStatus::Stopped, 4)
        .await
        .unwrap();
    let state = DaemonStateRepo::get(&pool).await.unwrap();
    assert_eq!(state.status(), DaemonStatus::Stopped);
    assert!(state.pid.is_none());
    assert!(state.started_at.is_none());
}

#[tokio::test]
async fn reopening_the_store_preserves_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("queue.db");

    {
        let pool = clipnote_db::connect(&path).await.unwrap();
        DaemonStateRepo::set(&pool, Some(99), DaemonStatus::Running, 3)
            .await
            .unwrap();
        pool.close().await;
    }

    let pool = clipnote_db::connect(&path).await.unwrap();
    let state = DaemonStateRepo::get(&pool).await.unwrap();
    assert_eq!(state.pid, Some(99));
    assert_eq!(state.status(), DaemonStatus::Running);
    assert_eq!(state.worker_count, 3);
}
