use axum::{extract::State, routing::get, Json, Router};
use viaggia_core::Airport;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/airports", get(list_airports))
}

/// GET /airports
async fn list_airports(State(state): State<AppState>) -> Json<Vec<Airport>> {
    Json(state.store.directory().list().to_vec())
}
