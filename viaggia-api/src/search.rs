use axum::{
    extract::{rejection::{PathRejection, QueryRejection}, Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, warn};
use viaggia_core::{CoreError, Flight, SearchParams, SearchQuery};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flights/search", get(search_flights))
        .route("/flights/{id}", get(get_flight))
}

/// GET /flights/search?departureAirportId=&departureDate=&returnDate=&maxPrice=
async fn search_flights(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let Query(query) = query?;
    let params = SearchParams::try_from(query)?;
    let engine = state.store.engine();

    let flights = match engine.search(&params).await {
        Ok(flights) => flights,
        Err(CoreError::ProviderError(e)) if state.search.fallback_on_provider_error => {
            // Documented degradation: serve the seeded catalog instead
            warn!("Provider search failed ({}), answering from local catalog", e);
            engine.search_local(&params)?
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        "Search from airport {} on {}: {} flights",
        params.departure_airport_id,
        params.departure_date,
        flights.len()
    );
    Ok(Json(flights))
}

/// GET /flights/{id}
async fn get_flight(
    State(state): State<AppState>,
    id: Result<Path<u32>, PathRejection>,
) -> Result<Json<Flight>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.store.catalog().get(id)?))
}
