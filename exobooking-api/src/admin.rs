use axum::{
    extract::{rejection::JsonRejection, Path, State},
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use exobooking_core::{request::parse_date, BookingView, Canceller, Item, ItemId};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::bookings::{cancelled, CancelResponse};
use crate::error::AppError;
use crate::inventory::InventoryResponse;
use crate::middleware::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SetCapacityRequest {
    #[serde(alias = "passeio_id")]
    pub item_id: ItemId,
    pub date: String,
    pub total_slots: i32,
}

#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub item_id: ItemId,
    pub item_name: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub booking_date: NaiveDate,
    pub quantity: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<BookingView> for LedgerEntryResponse {
    fn from(view: BookingView) -> Self {
        let b = view.booking;
        Self {
            id: b.id,
            item_id: b.item_id,
            item_name: view.item_name,
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            booking_date: b.date,
            quantity: b.quantity,
            status: b.status.to_string(),
            created_at: b.created_at,
        }
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/inventory", put(set_capacity))
        .route("/v1/admin/items/{item_id}", put(upsert_item))
        .route("/v1/admin/bookings", get(list_bookings))
        .route("/v1/admin/bookings/{booking_id}/cancel", post(cancel_booking))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

// ============================================================================
// Inventory Provisioning
// ============================================================================

/// PUT /v1/admin/inventory
async fn set_capacity(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    payload: Result<Json<SetCapacityRequest>, JsonRejection>,
) -> Result<Json<InventoryResponse>, AppError> {
    let Json(req) = payload?;
    let date = parse_date(&req.date)?;

    let slot = state
        .engine
        .set_capacity(req.item_id, date, req.total_slots)
        .await?;

    info!(operator = %claims.sub, item_id = req.item_id, %date, total = req.total_slots, "capacity updated");

    let item_name = state
        .query
        .list_item_inventory(slot.item_id)
        .await?
        .into_iter()
        .find(|v| v.slot.id == slot.id)
        .and_then(|v| v.item_name);

    Ok(Json(InventoryResponse::from(exobooking_core::InventoryView {
        slot,
        item_name,
    })))
}

/// PUT /v1/admin/items/{item_id}
async fn upsert_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
    payload: Result<Json<ItemRequest>, JsonRejection>,
) -> Result<Json<Item>, AppError> {
    let Json(req) = payload?;
    let item = state.engine.register_item(item_id, &req.name).await?;
    Ok(Json(item))
}

// ============================================================================
// Ledger
// ============================================================================

/// GET /v1/admin/bookings
async fn list_bookings(
    State(state): State<AppState>,
) -> Result<Json<Vec<LedgerEntryResponse>>, AppError> {
    let bookings = state.query.list_bookings().await?;
    Ok(Json(bookings.into_iter().map(LedgerEntryResponse::from).collect()))
}

/// POST /v1/admin/bookings/{booking_id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let result = state.engine.cancel(booking_id, Canceller::Operator).await?;
    info!(operator = %claims.sub, %booking_id, "booking cancelled by operator");
    Ok(Json(cancelled(result)))
}
