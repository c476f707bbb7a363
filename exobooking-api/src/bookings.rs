use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use exobooking_core::{BookingRequest, Canceller};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct BookingResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub message: String,
    pub remaining: i32,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub customer_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub message: String,
    pub available: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking))
        .route("/v1/bookings/{booking_id}/cancel", post(cancel_booking))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<BookingRequest>, JsonRejection>,
) -> Result<Json<BookingResponse>, AppError> {
    let Json(req) = payload?;
    let booking = req.validate()?;

    let result = state.engine.book(booking).await?;

    Ok(Json(BookingResponse {
        success: true,
        booking_id: result.booking_id,
        message: "Booking confirmed.".to_string(),
        remaining: result.remaining_capacity,
    }))
}

/// POST /v1/bookings/{booking_id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<CancelResponse>, AppError> {
    let Json(req) = payload?;

    let result = state
        .engine
        .cancel(
            booking_id,
            Canceller::Customer {
                email: req.customer_email,
            },
        )
        .await?;

    Ok(Json(cancelled(result)))
}

pub(crate) fn cancelled(result: exobooking_core::CancellationResult) -> CancelResponse {
    CancelResponse {
        success: true,
        booking_id: result.booking_id,
        message: "Booking cancelled.".to_string(),
        available: result.available_capacity,
    }
}
