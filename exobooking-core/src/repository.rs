use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    BookingRecord, BookingStatus, BookingView, InventorySlot, InventoryView, Item, ItemId,
    NewBooking, SlotKey,
};

/// Durable inventory and booking ledger.
///
/// All mutation goes through [`InventoryStore::begin`], which hands out a unit of work
/// holding the exclusive hold for one [`SlotKey`]. Reads outside a unit of work observe
/// committed state only and never wait on a hold.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Opens a unit of work on `key`, waiting at most `wait` for the exclusive hold.
    ///
    /// The returned transaction already reflects the latest committed state of the slot.
    /// Dropping it without calling [`SlotTransaction::commit`] discards every change.
    async fn begin(
        &self,
        key: SlotKey,
        wait: Duration,
    ) -> Result<Box<dyn SlotTransaction>, StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, StoreError>;

    /// Committed slots ordered by date, then item id.
    async fn list_slots(&self) -> Result<Vec<InventoryView>, StoreError>;

    /// Committed slots of one item ordered by date.
    async fn list_item_slots(&self, item_id: ItemId) -> Result<Vec<InventoryView>, StoreError>;

    /// The whole ledger, newest first.
    async fn list_bookings(&self) -> Result<Vec<BookingView>, StoreError>;

    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError>;
}

/// A unit of work scoped to one slot key.
#[async_trait]
pub trait SlotTransaction: Send {
    fn key(&self) -> SlotKey;

    /// Slot state as seen inside this unit of work, including uncommitted writes.
    fn slot(&self) -> Option<&InventorySlot>;

    async fn create_slot(&mut self, total_capacity: i32) -> Result<InventorySlot, StoreError>;

    async fn write_capacity(
        &mut self,
        total_capacity: i32,
        available_capacity: i32,
    ) -> Result<InventorySlot, StoreError>;

    async fn append_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, StoreError>;

    /// Ledger entry for `id` if it belongs to this slot.
    async fn booking(&mut self, id: Uuid) -> Result<Option<BookingRecord>, StoreError>;

    async fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
