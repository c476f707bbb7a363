use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::StoreError;
use crate::hold::{HoldTable, KeyHold};
use crate::model::{
    BookingRecord, BookingStatus, BookingView, InventorySlot, InventoryView, Item, ItemId,
    NewBooking, SlotKey,
};
use crate::repository::{InventoryStore, SlotTransaction};

#[derive(Debug, Clone, Default)]
struct SlotState {
    slot: Option<InventorySlot>,
    bookings: Vec<BookingRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    holds: HoldTable,
    /// Committed state. Written only by a unit of work that owns the key's hold.
    slots: DashMap<SlotKey, SlotState>,
    booking_keys: DashMap<Uuid, SlotKey>,
    items: DashMap<ItemId, String>,
}

/// In-process inventory store.
///
/// Holds are per-key async mutexes kept in a sharded map, so units of work on different
/// keys never contend. Only keys with a committed slot keep state. Nothing survives a
/// restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn committed(&self) -> Vec<SlotState> {
        self.inner
            .slots
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn item_name(&self, item_id: ItemId) -> Option<String> {
        self.inner.items.get(&item_id).map(|name| name.value().clone())
    }

    fn view(&self, slot: InventorySlot) -> InventoryView {
        let item_name = self.item_name(slot.item_id);
        InventoryView { slot, item_name }
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn begin(
        &self,
        key: SlotKey,
        wait: Duration,
    ) -> Result<Box<dyn SlotTransaction>, StoreError> {
        let hold = self.inner.holds.acquire(key, wait).await?;

        let working = self
            .inner
            .slots
            .get(&key)
            .map(|state| state.value().clone())
            .unwrap_or_default();

        Ok(Box::new(MemoryTransaction {
            inner: self.inner.clone(),
            working,
            appended: Vec::new(),
            hold,
        }))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, StoreError> {
        let Some(key) = self.inner.booking_keys.get(&id).map(|k| *k.value()) else {
            return Ok(None);
        };
        Ok(self
            .inner
            .slots
            .get(&key)
            .and_then(|state| state.bookings.iter().find(|b| b.id == id).cloned()))
    }

    async fn list_slots(&self) -> Result<Vec<InventoryView>, StoreError> {
        let mut views: Vec<InventoryView> = self
            .committed()
            .into_iter()
            .filter_map(|state| state.slot)
            .map(|slot| self.view(slot))
            .collect();
        views.sort_by_key(|v| (v.slot.date, v.slot.item_id));
        Ok(views)
    }

    async fn list_item_slots(&self, item_id: ItemId) -> Result<Vec<InventoryView>, StoreError> {
        let mut views: Vec<InventoryView> = self
            .committed()
            .into_iter()
            .filter_map(|state| state.slot)
            .filter(|slot| slot.item_id == item_id)
            .map(|slot| self.view(slot))
            .collect();
        views.sort_by_key(|v| v.slot.date);
        Ok(views)
    }

    async fn list_bookings(&self) -> Result<Vec<BookingView>, StoreError> {
        let mut views: Vec<BookingView> = self
            .committed()
            .into_iter()
            .flat_map(|state| state.bookings)
            .map(|booking| BookingView {
                item_name: self.item_name(booking.item_id),
                booking,
            })
            .collect();
        views.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(views)
    }

    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.inner.items.insert(item.id, item.name.clone());
        Ok(())
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    working: SlotState,
    appended: Vec<Uuid>,
    hold: KeyHold,
}

impl MemoryTransaction {
    fn slot_mut(&mut self) -> Result<&mut InventorySlot, StoreError> {
        let key = self.hold.key();
        self.working
            .slot
            .as_mut()
            .ok_or_else(|| StoreError::Constraint(format!("no inventory slot for {}", key)))
    }
}

#[async_trait]
impl SlotTransaction for MemoryTransaction {
    fn key(&self) -> SlotKey {
        self.hold.key()
    }

    fn slot(&self) -> Option<&InventorySlot> {
        self.working.slot.as_ref()
    }

    async fn create_slot(&mut self, total_capacity: i32) -> Result<InventorySlot, StoreError> {
        if self.working.slot.is_some() {
            return Err(StoreError::Constraint(format!(
                "inventory slot {} already exists",
                self.hold.key()
            )));
        }
        if total_capacity < 0 {
            return Err(StoreError::Constraint("total capacity must be >= 0".to_string()));
        }

        let key = self.hold.key();
        let slot = InventorySlot {
            id: Uuid::new_v4(),
            item_id: key.item_id,
            date: key.date,
            total_capacity,
            available_capacity: total_capacity,
            created_at: Utc::now(),
        };
        self.working.slot = Some(slot.clone());
        Ok(slot)
    }

    async fn write_capacity(
        &mut self,
        total_capacity: i32,
        available_capacity: i32,
    ) -> Result<InventorySlot, StoreError> {
        if available_capacity < 0 || available_capacity > total_capacity {
            return Err(StoreError::Constraint(format!(
                "available {} outside 0..={}",
                available_capacity, total_capacity
            )));
        }

        let slot = self.slot_mut()?;
        slot.total_capacity = total_capacity;
        slot.available_capacity = available_capacity;
        Ok(slot.clone())
    }

    async fn append_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, StoreError> {
        self.slot_mut()?;

        let key = self.hold.key();
        let record = BookingRecord {
            id: Uuid::new_v4(),
            item_id: key.item_id,
            date: key.date,
            customer_name: booking.customer_name,
            customer_email: booking.customer_email,
            quantity: booking.quantity,
            status: BookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        self.working.bookings.push(record.clone());
        self.appended.push(record.id);
        Ok(record)
    }

    async fn booking(&mut self, id: Uuid) -> Result<Option<BookingRecord>, StoreError> {
        Ok(self.working.bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let booking = self
            .working
            .bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| StoreError::Constraint(format!("booking {} not in slot", id)))?;
        booking.status = status;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            inner,
            working,
            appended,
            hold,
        } = *self;
        let key = hold.key();

        if working.slot.is_some() {
            inner.slots.insert(key, working);
        }
        for id in appended {
            inner.booking_keys.insert(id, key);
        }

        drop(hold);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(item_id: ItemId) -> SlotKey {
        SlotKey::new(item_id, NaiveDate::from_ymd_opt(2026, 3, 20).unwrap())
    }

    const WAIT: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn dropped_transaction_discards_changes() {
        let store = MemoryStore::new();

        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        tx.create_slot(3).await.unwrap();
        drop(tx);

        assert!(store.list_slots().await.unwrap().is_empty());

        let tx = store.begin(key(1), WAIT).await.unwrap();
        assert!(tx.slot().is_none());
    }

    #[tokio::test]
    async fn readers_do_not_see_uncommitted_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        tx.create_slot(3).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        tx.write_capacity(3, 1).await.unwrap();

        let listed = store.list_slots().await.unwrap();
        assert_eq!(listed[0].slot.available_capacity, 3);

        tx.commit().await.unwrap();
        let listed = store.list_slots().await.unwrap();
        assert_eq!(listed[0].slot.available_capacity, 1);
    }

    #[tokio::test]
    async fn second_begin_on_same_key_times_out_while_held() {
        let store = MemoryStore::new();
        let _held = store.begin(key(1), WAIT).await.unwrap();

        let err = store.begin(key(1), Duration::from_millis(20)).await.err().unwrap();
        assert!(matches!(err, StoreError::LockTimeout(20)));

        // Another key is unaffected.
        assert!(store.begin(key(2), Duration::from_millis(20)).await.is_ok());
    }

    #[tokio::test]
    async fn write_capacity_enforces_bounds() {
        let store = MemoryStore::new();
        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        assert!(tx.write_capacity(3, 3).await.is_err());
        tx.create_slot(3).await.unwrap();
        assert!(matches!(tx.write_capacity(3, 4).await, Err(StoreError::Constraint(_))));
        assert!(matches!(tx.write_capacity(3, -1).await, Err(StoreError::Constraint(_))));
        assert!(tx.create_slot(5).await.is_err());
    }

    #[tokio::test]
    async fn committed_bookings_are_indexed_and_listed_newest_first() {
        let store = MemoryStore::new();
        store
            .upsert_item(&Item { id: 1, name: "Trilha da Pedra".to_string() })
            .await
            .unwrap();

        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        tx.create_slot(5).await.unwrap();
        let first = tx
            .append_booking(NewBooking {
                customer_name: "Ana".to_string(),
                customer_email: "ana@example.com".to_string(),
                quantity: 1,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        tokio::time::sleep(Duration::from_millis(2)).await;

        let mut tx = store.begin(key(1), WAIT).await.unwrap();
        let second = tx
            .append_booking(NewBooking {
                customer_name: "Bia".to_string(),
                customer_email: "bia@example.com".to_string(),
                quantity: 2,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.find_booking(first.id).await.unwrap(), Some(first.clone()));

        let listed = store.list_bookings().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].booking.id, second.id);
        assert_eq!(listed[1].booking.id, first.id);
        assert_eq!(listed[0].item_name.as_deref(), Some("Trilha da Pedra"));
    }

    #[tokio::test]
    async fn unprovisioned_keys_leave_nothing_behind() {
        use crate::engine::ReservationEngine;
        use crate::error::RejectionReason;
        use crate::request::ValidatedBooking;

        let store = MemoryStore::new();
        let engine = ReservationEngine::new(Arc::new(store.clone()), WAIT);
        engine.set_capacity(1, key(1).date, 3).await.unwrap();

        for item_id in 2..2_002 {
            let err = engine
                .book(ValidatedBooking {
                    key: key(item_id),
                    customer_name: "Ana".to_string(),
                    customer_email: "ana@example.com".to_string(),
                    quantity: 1,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, RejectionReason::NotFound));
        }
        assert!(store.find_booking(Uuid::new_v4()).await.unwrap().is_none());

        assert_eq!(store.inner.slots.len(), 1);
        assert!(store.inner.holds.is_empty());
        assert_eq!(store.list_slots().await.unwrap().len(), 1);
    }
}
