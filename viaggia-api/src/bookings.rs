use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use viaggia_core::{Booking, CreateBookingRequest};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/reference/{code}", get(get_booking_by_reference))
}

/// POST /bookings
async fn create_booking(
    State(state): State<AppState>,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let Json(req) = payload?;

    let booking = state.store.ledger().create(req)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    id: Result<Path<u32>, PathRejection>,
) -> Result<Json<Booking>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.store.ledger().get(id)?))
}

/// GET /bookings/reference/{code}
async fn get_booking_by_reference(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.store.ledger().get_by_reference(&code)?))
}
