pub mod engine;
pub mod error;
pub mod hold;
pub mod memory;
pub mod model;
pub mod query;
pub mod repository;
pub mod request;

pub use engine::{Canceller, ReservationEngine, DEFAULT_HOLD_TIMEOUT};
pub use error::{EngineResult, RejectionReason, StoreError};
pub use hold::{HoldTable, KeyHold};
pub use memory::MemoryStore;
pub use model::{
    BookingRecord, BookingResult, BookingStatus, BookingView, CancellationResult, InventorySlot,
    InventoryView, Item, ItemId, NewBooking, SlotKey,
};
pub use query::InventoryQuery;
pub use repository::{InventoryStore, SlotTransaction};
pub use request::{BookingRequest, ValidatedBooking};
