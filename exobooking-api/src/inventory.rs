use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use exobooking_core::{InventoryView, ItemId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryResponse {
    pub id: Uuid,
    pub item_id: ItemId,
    pub item_name: Option<String>,
    pub date: NaiveDate,
    pub total_slots: i32,
    pub available_slots: i32,
}

impl From<InventoryView> for InventoryResponse {
    fn from(view: InventoryView) -> Self {
        Self {
            id: view.slot.id,
            item_id: view.slot.item_id,
            item_name: view.item_name,
            date: view.slot.date,
            total_slots: view.slot.total_capacity,
            available_slots: view.slot.available_capacity,
        }
    }
}

/// One row of an item's availability table.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemSlotResponse {
    #[serde(flatten)]
    pub slot: InventoryResponse,
    pub reserved_slots: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/inventory", get(list_inventory))
        .route("/v1/items/{item_id}/inventory", get(list_item_inventory))
}

/// GET /v1/inventory
async fn list_inventory(
    State(state): State<AppState>,
) -> Result<Json<Vec<InventoryResponse>>, AppError> {
    let slots = state.query.list_inventory().await?;
    Ok(Json(slots.into_iter().map(InventoryResponse::from).collect()))
}

/// GET /v1/items/{item_id}/inventory
async fn list_item_inventory(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<Vec<ItemSlotResponse>>, AppError> {
    let slots = state.query.list_item_inventory(item_id).await?;
    Ok(Json(
        slots
            .into_iter()
            .map(|view| ItemSlotResponse {
                reserved_slots: view.slot.committed(),
                slot: view.into(),
            })
            .collect(),
    ))
}
