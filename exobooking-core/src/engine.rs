use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{EngineResult, RejectionReason, StoreError};
use crate::model::{
    BookingResult, BookingStatus, CancellationResult, InventorySlot, Item, ItemId, NewBooking,
    SlotKey,
};
use crate::repository::{InventoryStore, SlotTransaction};
use crate::request::ValidatedBooking;

pub const DEFAULT_HOLD_TIMEOUT: Duration = Duration::from_secs(5);

/// Who is asking for a cancellation.
#[derive(Debug, Clone)]
pub enum Canceller {
    /// Must present the email the booking was made with.
    Customer { email: String },
    Operator,
}

/// Accepts or rejects bookings against per-date inventory.
///
/// Every mutation runs inside a unit of work that holds the exclusive hold for exactly
/// one `(item_id, date)` key, so same-key operations are serialized and everything else
/// runs in parallel.
#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn InventoryStore>,
    hold_timeout: Duration,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn InventoryStore>, hold_timeout: Duration) -> Self {
        Self { store, hold_timeout }
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    async fn begin(&self, key: SlotKey) -> EngineResult<Box<dyn SlotTransaction>> {
        self.store
            .begin(key, self.hold_timeout)
            .await
            .map_err(|e| storage_rejection(key, "begin", e))
    }

    pub async fn book(&self, request: ValidatedBooking) -> EngineResult<BookingResult> {
        let ValidatedBooking {
            key,
            customer_name,
            customer_email,
            quantity,
        } = request;

        let mut tx = self.begin(key).await?;

        let slot = tx.slot().cloned().ok_or(RejectionReason::NotFound)?;

        if slot.available_capacity < quantity {
            warn!(
                slot = %key,
                requested = quantity,
                available = slot.available_capacity,
                "booking rejected: insufficient capacity"
            );
            return Err(RejectionReason::InsufficientCapacity {
                available: slot.available_capacity,
            });
        }

        let remaining = slot.available_capacity - quantity;
        tx.write_capacity(slot.total_capacity, remaining)
            .await
            .map_err(|e| storage_rejection(key, "decrement", e))?;

        let record = tx
            .append_booking(NewBooking {
                customer_name,
                customer_email,
                quantity,
            })
            .await
            .map_err(|e| storage_rejection(key, "append booking", e))?;

        tx.commit()
            .await
            .map_err(|e| storage_rejection(key, "commit", e))?;

        info!(slot = %key, booking_id = %record.id, quantity, remaining, "booking confirmed");

        Ok(BookingResult {
            booking_id: record.id,
            remaining_capacity: remaining,
        })
    }

    /// Creates the slot or moves its total, shifting available capacity by the same delta.
    pub async fn set_capacity(
        &self,
        item_id: ItemId,
        date: NaiveDate,
        total_capacity: i32,
    ) -> EngineResult<InventorySlot> {
        if total_capacity < 0 {
            return Err(RejectionReason::InvalidInput(
                "total capacity must be zero or more".to_string(),
            ));
        }

        let key = SlotKey::new(item_id, date);
        let mut tx = self.begin(key).await?;

        let slot = match tx.slot().cloned() {
            None => tx
                .create_slot(total_capacity)
                .await
                .map_err(|e| storage_rejection(key, "create slot", e))?,
            Some(current) => {
                let committed = current.committed();
                if total_capacity < committed {
                    warn!(slot = %key, total_capacity, committed, "capacity change rejected");
                    return Err(RejectionReason::CapacityBelowCommitted { committed });
                }
                tx.write_capacity(total_capacity, total_capacity - committed)
                    .await
                    .map_err(|e| storage_rejection(key, "resize slot", e))?
            }
        };

        tx.commit()
            .await
            .map_err(|e| storage_rejection(key, "commit", e))?;

        info!(
            slot = %key,
            total = slot.total_capacity,
            available = slot.available_capacity,
            "capacity set"
        );
        Ok(slot)
    }

    /// Registers or renames an item. Items carry no capacity, so no hold is taken.
    pub async fn register_item(&self, item_id: ItemId, name: &str) -> EngineResult<Item> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RejectionReason::InvalidInput("item name is required".to_string()));
        }
        let item = Item {
            id: item_id,
            name: name.to_string(),
        };

        self.store.upsert_item(&item).await.map_err(|e| {
            error!(item_id, error = %e, "item upsert failed");
            RejectionReason::from(e)
        })?;

        info!(item_id, name = %item.name, "item registered");
        Ok(item)
    }

    /// Flips a confirmed booking to cancelled and gives its units back to the slot.
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        canceller: Canceller,
    ) -> EngineResult<CancellationResult> {
        let located = self
            .store
            .find_booking(booking_id)
            .await
            .map_err(|e| {
                error!(%booking_id, error = %e, "booking lookup failed");
                RejectionReason::from(e)
            })?
            .ok_or(RejectionReason::NotFound)?;

        if let Canceller::Customer { email } = &canceller {
            if !located.customer_email.eq_ignore_ascii_case(email.trim()) {
                return Err(RejectionReason::NotFound);
            }
        }

        let key = located.key();
        let mut tx = self.begin(key).await?;

        let booking = tx
            .booking(booking_id)
            .await
            .map_err(|e| storage_rejection(key, "read booking", e))?
            .ok_or(RejectionReason::NotFound)?;

        if booking.status == BookingStatus::Cancelled {
            return Err(RejectionReason::AlreadyCancelled);
        }

        let slot = tx.slot().cloned().ok_or_else(|| {
            error!(slot = %key, %booking_id, "booking references a missing slot");
            RejectionReason::StorageFailure("booking references a missing slot".to_string())
        })?;

        let available = slot.available_capacity + booking.quantity;
        if available > slot.total_capacity {
            error!(slot = %key, %booking_id, "ledger and inventory disagree");
            return Err(RejectionReason::StorageFailure(
                "ledger and inventory disagree".to_string(),
            ));
        }

        tx.set_booking_status(booking_id, BookingStatus::Cancelled)
            .await
            .map_err(|e| storage_rejection(key, "cancel booking", e))?;
        tx.write_capacity(slot.total_capacity, available)
            .await
            .map_err(|e| storage_rejection(key, "restore capacity", e))?;
        tx.commit()
            .await
            .map_err(|e| storage_rejection(key, "commit", e))?;

        info!(slot = %key, %booking_id, available, "booking cancelled");

        Ok(CancellationResult {
            booking_id,
            available_capacity: available,
        })
    }
}

fn storage_rejection(key: SlotKey, step: &str, err: StoreError) -> RejectionReason {
    match &err {
        StoreError::LockTimeout(ms) => {
            warn!(slot = %key, waited_ms = ms, "exclusive hold not acquired");
        }
        other => {
            error!(slot = %key, step, error = %other, "unit of work aborted");
        }
    }
    err.into()
}
