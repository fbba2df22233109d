use axum::{
    extract::State,
    http::{Method, Uri},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod airports;
pub mod bookings;
pub mod error;
pub mod search;
pub mod state;

use crate::error::AppError;
pub use state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    airports: usize,
    flights: usize,
    bookings: usize,
    provider: Option<String>,
}

/// Routes are served at the root and again under `/api`, which is where the web client calls them.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let routes = Router::new()
        .merge(airports::routes())
        .merge(search::routes())
        .merge(bookings::routes())
        .route("/health", get(health));

    Router::new()
        .merge(routes.clone())
        .nest("/api", routes)
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFoundError(format!("no route for {}", uri.path()))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = &state.store;
    Json(HealthResponse {
        status: "ok",
        airports: store.directory().len(),
        flights: store.catalog().len(),
        bookings: store.ledger().len(),
        provider: store.engine().provider_name().map(String::from),
    })
}
