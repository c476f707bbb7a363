//! Runs against a live PostgreSQL. `DATABASE_URL=... cargo test -- --ignored`

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use exobooking_core::{
    Canceller, InventoryStore, RejectionReason, ReservationEngine, SlotKey, ValidatedBooking,
};
use exobooking_store::app_config::DatabaseConfig;
use exobooking_store::{DbClient, PgInventoryStore};
use futures::future::join_all;

async fn store_with(max_connections: u32) -> PgInventoryStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = DbClient::new(
        &DatabaseConfig {
            url,
            max_connections,
        },
        Duration::from_secs(5),
    )
    .await
    .expect("connect");
    db.migrate().await.expect("migrate");
    PgInventoryStore::new(db.pool)
}

async fn store() -> PgInventoryStore {
    store_with(20).await
}

/// Fresh item id per test run so reruns never collide.
fn fresh_item() -> i64 {
    (uuid::Uuid::new_v4().as_u128() % 1_000_000_000) as i64 + 1_000
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 20).unwrap()
}

fn booking(item_id: i64) -> ValidatedBooking {
    ValidatedBooking {
        key: SlotKey::new(item_id, date()),
        customer_name: "Cliente Teste".to_string(),
        customer_email: "teste@exobooking.com".to_string(),
        quantity: 1,
    }
}

#[tokio::test]
#[ignore]
async fn concurrent_bookings_never_overbook() {
    let engine = ReservationEngine::new(Arc::new(store().await), Duration::from_secs(5));
    let item = fresh_item();
    engine.set_capacity(item, date(), 3).await.unwrap();

    let tasks = (0..5).map(|_| {
        let engine = engine.clone();
        tokio::spawn(async move { engine.book(booking(item)).await })
    });
    let results: Vec<_> = join_all(tasks).await.into_iter().map(|j| j.unwrap()).collect();

    let mut remaining: Vec<i32> = results
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|ok| ok.remaining_capacity))
        .collect();
    remaining.sort_unstable();
    assert_eq!(remaining, vec![0, 1, 2]);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(RejectionReason::InsufficientCapacity { available: 0 })))
            .count(),
        2
    );
}

#[tokio::test]
#[ignore]
async fn lock_timeout_maps_to_timeout() {
    let store = Arc::new(store().await);
    let engine = ReservationEngine::new(store.clone(), Duration::from_millis(100));
    let item = fresh_item();
    engine.set_capacity(item, date(), 3).await.unwrap();

    let held = store
        .begin(SlotKey::new(item, date()), Duration::from_secs(1))
        .await
        .unwrap();
    let err = engine.book(booking(item)).await.unwrap_err();
    assert!(matches!(err, RejectionReason::Timeout));
    drop(held);

    let slots = store.list_item_slots(item).await.unwrap();
    assert_eq!(slots[0].slot.available_capacity, 3);
}

#[tokio::test]
#[ignore]
async fn advisory_lock_timeout_across_pools() {
    // Separate pools stand in for separate processes: only the database lock is shared.
    let holder = Arc::new(store().await);
    let contender = ReservationEngine::new(Arc::new(store().await), Duration::from_millis(150));
    let item = fresh_item();
    contender.set_capacity(item, date(), 3).await.unwrap();

    let held = holder
        .begin(SlotKey::new(item, date()), Duration::from_secs(1))
        .await
        .unwrap();
    let started = Instant::now();
    let err = contender.book(booking(item)).await.unwrap_err();
    assert!(matches!(err, RejectionReason::Timeout));
    assert!(started.elapsed() < Duration::from_millis(600));
    drop(held);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn hot_key_waiters_do_not_starve_other_keys() {
    let max_connections = 3;
    let store = Arc::new(store_with(max_connections).await);
    let engine = ReservationEngine::new(store.clone(), Duration::from_secs(3));
    let hot = fresh_item();
    let cold = fresh_item();
    engine.set_capacity(hot, date(), 20).await.unwrap();
    engine.set_capacity(cold, date(), 1).await.unwrap();

    let held = store
        .begin(SlotKey::new(hot, date()), Duration::from_secs(1))
        .await
        .unwrap();

    let waiters: Vec<_> = (0..max_connections * 3)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.book(booking(hot)).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    engine.book(booking(cold)).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    drop(held);
    for joined in join_all(waiters).await {
        joined.unwrap().unwrap();
    }
    let slots = store.list_item_slots(hot).await.unwrap();
    assert_eq!(slots[0].slot.available_capacity, 20 - (max_connections as i32) * 3);
}

#[tokio::test]
#[ignore]
async fn cancellation_round_trip() {
    let store = Arc::new(store().await);
    let engine = ReservationEngine::new(store.clone(), Duration::from_secs(2));
    let item = fresh_item();
    engine.set_capacity(item, date(), 2).await.unwrap();

    let booked = engine.book(booking(item)).await.unwrap();
    assert_eq!(booked.remaining_capacity, 1);

    let cancelled = engine
        .cancel(booked.booking_id, Canceller::Operator)
        .await
        .unwrap();
    assert_eq!(cancelled.available_capacity, 2);

    let err = engine
        .cancel(booked.booking_id, Canceller::Operator)
        .await
        .unwrap_err();
    assert!(matches!(err, RejectionReason::AlreadyCancelled));

    let err = engine.set_capacity(item, date(), -1).await.unwrap_err();
    assert!(matches!(err, RejectionReason::InvalidInput(_)));
}
