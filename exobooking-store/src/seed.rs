use chrono::NaiveDate;
use tracing::info;

use exobooking_core::request::parse_date;
use exobooking_core::{EngineResult, ReservationEngine, SlotKey};

pub const DEMO_ITEM_ID: i64 = 1;
pub const DEMO_DATE: &str = "2026-03-20";
pub const DEMO_CAPACITY: i32 = 3;

pub fn demo_date() -> EngineResult<NaiveDate> {
    parse_date(DEMO_DATE)
}

/// Provisions the demo slot unless one already exists for its key. Never overwrites.
pub async fn seed_test_data(engine: &ReservationEngine) -> EngineResult<bool> {
    let key = SlotKey::new(DEMO_ITEM_ID, demo_date()?);
    let mut tx = engine.store().begin(key, engine.hold_timeout()).await?;

    if tx.slot().is_some() {
        return Ok(false);
    }

    tx.create_slot(DEMO_CAPACITY).await?;
    tx.commit().await?;

    info!(slot = %key, capacity = DEMO_CAPACITY, "seeded demo inventory");
    Ok(true)
}
