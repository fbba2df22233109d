use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tower::ServiceExt;
use viaggia_api::{app, AppState};
use viaggia_core::iata::{ProviderAirport, ProviderOffer, ProviderQuery};
use viaggia_core::{
    Airport, AirportDirectory, BookingLedger, FlightCatalog, FlightDataProvider, NewFlight, ProviderError,
    SearchEngine,
};
use viaggia_store::app_config::SearchConfig;
use viaggia_store::Store;

struct DownProvider;

#[async_trait]
impl FlightDataProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn search(&self, _query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
        Err(ProviderError::Http("connection refused".to_string()))
    }

    async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
        Err(ProviderError::Http("connection refused".to_string()))
    }
}

/// Roma FCO (1) and Milano MXP (2), one FCO→MXP flight on 2025-06-01 08:00 at 100 EUR.
fn scenario_app(provider: Option<Arc<dyn FlightDataProvider>>, fallback: bool) -> Router {
    let directory = Arc::new(
        AirportDirectory::new(vec![
            Airport { id: 1, code: "FCO".into(), name: "Aeroporto Leonardo da Vinci".into(), city: "Roma".into() },
            Airport { id: 2, code: "MXP".into(), name: "Aeroporto di Milano-Malpensa".into(), city: "Milano".into() },
        ])
        .unwrap(),
    );
    let catalog = Arc::new(FlightCatalog::new(directory.clone()));
    let departure_time = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    catalog
        .insert(NewFlight {
            departure_airport_id: 1,
            arrival_airport_id: 2,
            departure_time,
            arrival_time: departure_time + Duration::hours(2),
            price: Decimal::new(100, 0),
            airline: "ITA Airways".into(),
            flight_number: "AZ1234".into(),
        })
        .unwrap();

    let mut engine = SearchEngine::new(directory.clone(), catalog.clone());
    if let Some(provider) = provider {
        engine = engine.with_provider(provider);
    }
    let ledger = BookingLedger::new().with_flight_check(catalog.clone());
    let store = Store::from_parts(directory, catalog, engine, ledger);

    let search = SearchConfig {
        fallback_on_provider_error: fallback,
        ..SearchConfig::default()
    };
    app(AppState::new(store, search))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

#[tokio::test]
async fn test_list_airports() {
    let app = scenario_app(None, true);
    let (status, body) = get(&app, "/airports").await;

    assert_eq!(status, StatusCode::OK);
    let airports = body.as_array().unwrap();
    assert_eq!(airports.len(), 2);
    assert_eq!(airports[0]["code"], "FCO");
    assert_eq!(airports[1]["city"], "Milano");
}

#[tokio::test]
async fn test_search_scenario() {
    let app = scenario_app(None, true);

    let (status, body) = get(&app, "/flights/search?departureAirportId=1&departureDate=2025-06-01").await;
    assert_eq!(status, StatusCode::OK);
    let flights = body.as_array().unwrap();
    assert_eq!(flights.len(), 1);
    assert_eq!(flights[0]["id"], 1);
    assert_eq!(flights[0]["departureAirportId"], 1);
    assert_eq!(flights[0]["flightNumber"], "AZ1234");

    let (status, body) = get(&app, "/flights/search?departureAirportId=1&departureDate=2025-06-01&maxPrice=50").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    // Blank optional parameters are ignored, as the web client sends them.
    let (status, body) =
        get(&app, "/flights/search?departureAirportId=1&departureDate=2025-06-01&returnDate=&maxPrice=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_search_rejects_bad_parameters() {
    let app = scenario_app(None, true);

    for uri in [
        "/flights/search?departureAirportId=999&departureDate=2025-06-01",
        "/flights/search?departureAirportId=1",
        "/flights/search?departureAirportId=abc&departureDate=2025-06-01",
        "/flights/search?departureAirportId=1&departureDate=2025-06-05&returnDate=2025-06-01",
        "/flights/search?departureAirportId=1&departureDate=2025-06-01&maxPrice=-10",
    ] {
        let (status, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "Validation failed", "{}", uri);
        assert!(body["details"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn test_routes_are_also_served_under_api_prefix() {
    let app = scenario_app(None, true);

    let (status, _) = get(&app, "/api/airports").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(&app, "/api/flights/search?departureAirportId=1&startDate=2025-06-01&endDate=2025-06-02").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_flight() {
    let app = scenario_app(None, true);

    let (status, body) = get(&app, "/flights/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["arrivalAirportId"], 2);
    assert_eq!(body["price"].as_f64(), Some(100.0));

    let (status, body) = get(&app, "/flights/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let (status, _) = get(&app, "/flights/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_and_fetch_booking() {
    let app = scenario_app(None, true);

    let (status, created) = post_json(
        &app,
        "/bookings",
        r#"{"flightId":1,"passengerName":"Mario Rossi","passengerEmail":"mario@example.com"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["id"], 1);
    assert_eq!(created["passengerEmail"], "mario@example.com");
    let reference = created["bookingReference"].as_str().unwrap().to_string();
    assert_eq!(reference.len(), 8);

    let (status, by_id) = get(&app, "/bookings/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id, created);

    let (status, by_reference) = get(&app, &format!("/api/bookings/reference/{}", reference)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_reference, created);

    let (status, _) = get(&app, "/bookings/2").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_booking_validation() {
    let app = scenario_app(None, true);

    for payload in [
        r#"{"flightId":1,"passengerName":"Mario Rossi","passengerEmail":"not-an-email"}"#,
        r#"{"flightId":1,"passengerName":"","passengerEmail":"mario@example.com"}"#,
        r#"{"flightId":999,"passengerName":"Mario Rossi","passengerEmail":"mario@example.com"}"#,
        r#"{"flightId":1,"passengerName":"Mario Rossi"}"#,
        r#"{"flightId":"#,
    ] {
        let (status, body) = post_json(&app, "/bookings", payload).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", payload);
        assert_eq!(body["error"], "Validation failed", "{}", payload);
    }

    let (_, health) = get(&app, "/health").await;
    assert_eq!(health["bookings"], 0);
}

#[tokio::test]
async fn test_booking_references_are_unique() {
    let app = scenario_app(None, true);
    let mut references = HashSet::new();

    for i in 0..50 {
        let payload = format!(
            r#"{{"flightId":1,"passengerName":"Passenger {}","passengerEmail":"p{}@example.com"}}"#,
            i, i
        );
        let (status, body) = post_json(&app, "/bookings", &payload).await;
        assert_eq!(status, StatusCode::CREATED);
        references.insert(body["bookingReference"].as_str().unwrap().to_string());
    }

    assert_eq!(references.len(), 50);
}

#[tokio::test]
async fn test_provider_failure_falls_back_to_catalog() {
    let app = scenario_app(Some(Arc::new(DownProvider)), true);

    let (status, body) = get(&app, "/flights/search?departureAirportId=1&departureDate=2025-06-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_provider_failure_without_fallback_is_bad_gateway() {
    let app = scenario_app(Some(Arc::new(DownProvider)), false);

    let (status, body) = get(&app, "/flights/search?departureAirportId=1&departureDate=2025-06-01").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Flight data provider unavailable");
    assert!(body.get("details").is_none());

    // Validation still wins over provider trouble.
    let (status, _) = get(&app, "/flights/search?departureAirportId=999&departureDate=2025-06-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let app = scenario_app(Some(Arc::new(DownProvider)), true);
    let (status, body) = get(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["airports"], 2);
    assert_eq!(body["flights"], 1);
    assert_eq!(body["provider"], "down");
}

#[tokio::test]
async fn test_unknown_route_and_method_return_json_errors() {
    let app = scenario_app(None, true);

    let (status, body) = get(&app, "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
    assert_eq!(body["details"], "no route for /nope");

    let request = Request::builder().method("DELETE").uri("/airports").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({ "error": "Method not allowed" }));

    let request = Request::builder().method("DELETE").uri("/api/airports").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");
}
