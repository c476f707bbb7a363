use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use exobooking_core::{
    BookingRecord, BookingStatus, BookingView, HoldTable, InventorySlot, InventoryStore,
    InventoryView, Item, ItemId, KeyHold, NewBooking, SlotKey, SlotTransaction, StoreError,
};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// PostgreSQL-backed inventory store.
///
/// A unit of work is one database transaction. The exclusive hold is a transaction-scoped
/// advisory lock on the slot key (so it also covers slots that do not exist yet) plus a
/// `FOR UPDATE` row lock on the slot itself. Both are released on commit or rollback.
///
/// Same-key callers in this process queue on an in-process gate before taking a pooled
/// connection, so a hot key holds at most one connection and other keys keep getting
/// theirs. `database.max_connections` bounds how many distinct keys can be in flight.
/// Every wait (gate, pool, advisory lock, row lock) draws from the one `wait` budget.
pub struct PgInventoryStore {
    pool: PgPool,
    gates: HoldTable,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            gates: HoldTable::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    item_id: i64,
    date: NaiveDate,
    total_capacity: i32,
    available_capacity: i32,
    created_at: DateTime<Utc>,
}

impl From<SlotRow> for InventorySlot {
    fn from(row: SlotRow) -> Self {
        InventorySlot {
            id: row.id,
            item_id: row.item_id,
            date: row.date,
            total_capacity: row.total_capacity,
            available_capacity: row.available_capacity,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SlotViewRow {
    #[sqlx(flatten)]
    slot: SlotRow,
    item_name: Option<String>,
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    item_id: i64,
    booking_date: NaiveDate,
    customer_name: String,
    customer_email: String,
    quantity: i32,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for BookingRecord {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<BookingStatus>()
            .map_err(StoreError::Constraint)?;
        Ok(BookingRecord {
            id: row.id,
            item_id: row.item_id,
            date: row.booking_date,
            customer_name: row.customer_name,
            customer_email: row.customer_email,
            quantity: row.quantity,
            status,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingViewRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    item_name: Option<String>,
}

const SLOT_COLUMNS: &str =
    "s.id, s.item_id, s.date, s.total_capacity, s.available_capacity, s.created_at";

const BOOKING_COLUMNS: &str = "b.id, b.item_id, b.booking_date, b.customer_name, \
     b.customer_email, b.quantity, b.status, b.created_at";

fn db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation()
            || db_err.is_check_violation()
            || db_err.is_foreign_key_violation()
        {
            return StoreError::Constraint(db_err.message().to_string());
        }
    }
    StoreError::backend(err)
}

fn lock_error(err: sqlx::Error, waited_ms: u64) -> StoreError {
    match &err {
        sqlx::Error::PoolTimedOut => StoreError::LockTimeout(waited_ms),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) => {
            StoreError::LockTimeout(waited_ms)
        }
        _ => db_error(err),
    }
}

/// What is left of the wait budget, or `LockTimeout` once it is spent.
fn remaining(deadline: Instant, waited_ms: u64) -> Result<Duration, StoreError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(StoreError::LockTimeout(waited_ms));
    }
    Ok(left)
}

async fn set_lock_timeout(
    tx: &mut Transaction<'static, Postgres>,
    budget: Duration,
) -> Result<(), StoreError> {
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", budget.as_millis().max(1)))
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn begin(
        &self,
        key: SlotKey,
        wait: Duration,
    ) -> Result<Box<dyn SlotTransaction>, StoreError> {
        let waited_ms = (wait.as_millis() as u64).max(1);
        let deadline = Instant::now() + wait;

        let gate = self.gates.acquire(key, wait).await?;

        let mut tx = tokio::time::timeout(remaining(deadline, waited_ms)?, self.pool.begin())
            .await
            .map_err(|_| StoreError::LockTimeout(waited_ms))?
            .map_err(|e| lock_error(e, waited_ms))?;

        set_lock_timeout(&mut tx, remaining(deadline, waited_ms)?).await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("inventory:{}", key))
            .execute(&mut *tx)
            .await
            .map_err(|e| lock_error(e, waited_ms))?;

        set_lock_timeout(&mut tx, remaining(deadline, waited_ms)?).await?;
        let slot = sqlx::query_as::<_, SlotRow>(&format!(
            "SELECT {} FROM inventory_slots s WHERE s.item_id = $1 AND s.date = $2 FOR UPDATE",
            SLOT_COLUMNS
        ))
        .bind(key.item_id)
        .bind(key.date)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| lock_error(e, waited_ms))?;

        Ok(Box::new(PgSlotTransaction {
            key,
            tx,
            slot: slot.map(InventorySlot::from),
            _gate: gate,
        }))
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<BookingRecord>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings b WHERE b.id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(BookingRecord::try_from).transpose()
    }

    async fn list_slots(&self) -> Result<Vec<InventoryView>, StoreError> {
        let rows = sqlx::query_as::<_, SlotViewRow>(&format!(
            "SELECT {}, i.name AS item_name FROM inventory_slots s \
             LEFT JOIN items i ON i.id = s.item_id \
             ORDER BY s.date ASC, s.item_id ASC",
            SLOT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(slot_view).collect())
    }

    async fn list_item_slots(&self, item_id: ItemId) -> Result<Vec<InventoryView>, StoreError> {
        let rows = sqlx::query_as::<_, SlotViewRow>(&format!(
            "SELECT {}, i.name AS item_name FROM inventory_slots s \
             LEFT JOIN items i ON i.id = s.item_id \
             WHERE s.item_id = $1 \
             ORDER BY s.date ASC",
            SLOT_COLUMNS
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(slot_view).collect())
    }

    async fn list_bookings(&self) -> Result<Vec<BookingView>, StoreError> {
        let rows = sqlx::query_as::<_, BookingViewRow>(&format!(
            "SELECT {}, i.name AS item_name FROM bookings b \
             LEFT JOIN items i ON i.id = b.item_id \
             ORDER BY b.created_at DESC",
            BOOKING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(BookingView {
                    booking: BookingRecord::try_from(row.booking)?,
                    item_name: row.item_name,
                })
            })
            .collect()
    }

    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (id, name) VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

fn slot_view(row: SlotViewRow) -> InventoryView {
    InventoryView {
        slot: row.slot.into(),
        item_name: row.item_name,
    }
}

struct PgSlotTransaction {
    key: SlotKey,
    tx: Transaction<'static, Postgres>,
    slot: Option<InventorySlot>,
    _gate: KeyHold,
}

impl PgSlotTransaction {
    fn slot_id(&self) -> Result<Uuid, StoreError> {
        self.slot
            .as_ref()
            .map(|s| s.id)
            .ok_or_else(|| StoreError::Constraint(format!("no inventory slot for {}", self.key)))
    }
}

#[async_trait]
impl SlotTransaction for PgSlotTransaction {
    fn key(&self) -> SlotKey {
        self.key
    }

    fn slot(&self) -> Option<&InventorySlot> {
        self.slot.as_ref()
    }

    async fn create_slot(&mut self, total_capacity: i32) -> Result<InventorySlot, StoreError> {
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            INSERT INTO inventory_slots (id, item_id, date, total_capacity, available_capacity)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id, item_id, date, total_capacity, available_capacity, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.key.item_id)
        .bind(self.key.date)
        .bind(total_capacity)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let slot = InventorySlot::from(row);
        self.slot = Some(slot.clone());
        Ok(slot)
    }

    async fn write_capacity(
        &mut self,
        total_capacity: i32,
        available_capacity: i32,
    ) -> Result<InventorySlot, StoreError> {
        let id = self.slot_id()?;
        let row = sqlx::query_as::<_, SlotRow>(
            r#"
            UPDATE inventory_slots
            SET total_capacity = $1, available_capacity = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING id, item_id, date, total_capacity, available_capacity, created_at
            "#,
        )
        .bind(total_capacity)
        .bind(available_capacity)
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        let slot = InventorySlot::from(row);
        self.slot = Some(slot.clone());
        Ok(slot)
    }

    async fn append_booking(&mut self, booking: NewBooking) -> Result<BookingRecord, StoreError> {
        self.slot_id()?;
        let row = sqlx::query_as::<_, BookingRow>(
            r#"
            INSERT INTO bookings (id, item_id, booking_date, customer_name, customer_email, quantity, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, item_id, booking_date, customer_name, customer_email, quantity, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.key.item_id)
        .bind(self.key.date)
        .bind(&booking.customer_name)
        .bind(&booking.customer_email)
        .bind(booking.quantity)
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        BookingRecord::try_from(row)
    }

    async fn booking(&mut self, id: Uuid) -> Result<Option<BookingRecord>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings b \
             WHERE b.id = $1 AND b.item_id = $2 AND b.booking_date = $3 \
             FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(self.key.item_id)
        .bind(self.key.date)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error)?;

        row.map(BookingRecord::try_from).transpose()
    }

    async fn set_booking_status(
        &mut self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $1, updated_at = NOW() \
             WHERE id = $2 AND item_id = $3 AND booking_date = $4",
        )
        .bind(status.as_str())
        .bind(id)
        .bind(self.key.item_id)
        .bind(self.key.date)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Constraint(format!("booking {} not in slot", id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_error)
    }
}
