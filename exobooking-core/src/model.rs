use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a bookable item (a "passeio").
pub type ItemId = i64;

/// Composite key of one inventory slot. Every exclusive hold is scoped to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub item_id: ItemId,
    pub date: NaiveDate,
}

impl SlotKey {
    pub fn new(item_id: ItemId, date: NaiveDate) -> Self {
        Self { item_id, date }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.item_id, self.date)
    }
}

/// Capacity of one item on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub id: Uuid,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub total_capacity: i32,
    pub available_capacity: i32,
    pub created_at: DateTime<Utc>,
}

impl InventorySlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.item_id, self.date)
    }

    /// Units held by confirmed bookings.
    pub fn committed(&self) -> i32 {
        self.total_capacity - self.available_capacity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status: {}", other)),
        }
    }
}

/// One entry of the booking ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: Uuid,
    pub item_id: ItemId,
    pub date: NaiveDate,
    pub customer_name: String,
    pub customer_email: String,
    pub quantity: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.item_id, self.date)
    }
}

/// A ledger entry about to be appended inside a unit of work.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_name: String,
    pub customer_email: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
}

/// Inventory slot joined with the item's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryView {
    #[serde(flatten)]
    pub slot: InventorySlot,
    pub item_name: Option<String>,
}

/// Ledger entry joined with the item's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: BookingRecord,
    pub item_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingResult {
    pub booking_id: Uuid,
    pub remaining_capacity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationResult {
    pub booking_id: Uuid,
    pub available_capacity: i32,
}
