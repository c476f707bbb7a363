use std::sync::Arc;

use tracing::error;

use crate::error::{EngineResult, RejectionReason, StoreError};
use crate::model::{BookingView, InventoryView, ItemId};
use crate::repository::InventoryStore;

/// Read-only projections over the inventory and the ledger. Never takes a hold.
/// Ordering comes from the store contract.
#[derive(Clone)]
pub struct InventoryQuery {
    store: Arc<dyn InventoryStore>,
}

impl InventoryQuery {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Every slot, by date then item.
    pub async fn list_inventory(&self) -> EngineResult<Vec<InventoryView>> {
        self.store.list_slots().await.map_err(read_failure)
    }

    pub async fn list_item_inventory(&self, item_id: ItemId) -> EngineResult<Vec<InventoryView>> {
        self.store
            .list_item_slots(item_id)
            .await
            .map_err(read_failure)
    }

    /// Ledger, newest first.
    pub async fn list_bookings(&self) -> EngineResult<Vec<BookingView>> {
        self.store.list_bookings().await.map_err(read_failure)
    }
}

fn read_failure(err: StoreError) -> RejectionReason {
    error!(error = %err, "inventory query failed");
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReservationEngine;
    use crate::memory::MemoryStore;
    use chrono::NaiveDate;
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn inventory_is_ordered_by_date_and_named() {
        let store: Arc<dyn InventoryStore> = Arc::new(MemoryStore::new());
        let engine = ReservationEngine::new(store.clone(), Duration::from_secs(1));
        let query = InventoryQuery::new(store);

        engine.set_capacity(2, day(22), 4).await.unwrap();
        engine.set_capacity(1, day(20), 3).await.unwrap();
        engine.set_capacity(2, day(20), 6).await.unwrap();
        engine.register_item(1, "Passeio de Barco").await.unwrap();

        let listed = query.list_inventory().await.unwrap();
        let keys: Vec<(ItemId, NaiveDate)> =
            listed.iter().map(|v| (v.slot.item_id, v.slot.date)).collect();
        assert_eq!(keys, vec![(1, day(20)), (2, day(20)), (2, day(22))]);
        assert_eq!(listed[0].item_name.as_deref(), Some("Passeio de Barco"));
        assert_eq!(listed[1].item_name, None);

        let item_two = query.list_item_inventory(2).await.unwrap();
        assert_eq!(item_two.len(), 2);
        assert!(item_two[0].slot.date < item_two[1].slot.date);
    }
}
