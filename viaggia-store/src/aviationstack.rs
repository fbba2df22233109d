use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use viaggia_core::airport::default_airports;
use viaggia_core::iata::{OfferEndpoint, ProviderAirport, ProviderOffer, ProviderQuery};
use viaggia_core::{FlightDataProvider, ProviderError};

use crate::app_config::ProviderConfig;

/// AviationStack caps a page at 100 records; only the first page is read.
const PAGE_LIMIT: &str = "100";
const MIN_FARE: u64 = 50;
const FARE_SPREAD: u64 = 201;

// ============================================================================
// AviationStack /v1/flights response
// ============================================================================

#[derive(Debug, Deserialize)]
struct FlightsResponse {
    #[serde(default)]
    data: Option<Vec<AsFlight>>,
    #[serde(default)]
    error: Option<AsError>,
}

#[derive(Debug, Deserialize)]
struct AsError {
    #[serde(default)]
    code: Option<serde_json::Value>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct AsFlight {
    departure: AsEndpoint,
    arrival: AsEndpoint,
    airline: AsAirline,
    flight: AsFlightNumber,
}

#[derive(Debug, Deserialize)]
struct AsEndpoint {
    iata: Option<String>,
    scheduled: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsAirline {
    name: Option<String>,
    iata: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsFlightNumber {
    number: Option<String>,
    iata: Option<String>,
}

impl AsFlight {
    fn into_offer(self) -> Option<ProviderOffer> {
        let departure = endpoint(self.departure)?;
        let arrival = endpoint(self.arrival)?;

        let carrier_code = self.airline.iata.filter(|c| !c.is_empty())?;
        let flight_number = self
            .flight
            .iata
            .or(self.flight.number)
            .filter(|n| !n.is_empty())?;

        let mut offer = ProviderOffer {
            departure,
            arrival,
            carrier_code,
            carrier_name: self.airline.name,
            flight_number,
            price: Decimal::ZERO,
        };
        offer.price = synthetic_fare(&offer.designator());
        Some(offer)
    }
}

fn endpoint(raw: AsEndpoint) -> Option<OfferEndpoint> {
    let code = raw.iata?;
    let time = DateTime::parse_from_rfc3339(raw.scheduled.as_deref()?).ok()?;
    Some(OfferEndpoint {
        code,
        time: time.with_timezone(&Utc),
    })
}

/// AviationStack carries no fares. A stable fare in [50, 250] EUR is derived
/// from the flight designator so repeated searches agree.
pub fn synthetic_fare(designator: &str) -> Decimal {
    // FNV-1a
    let hash = designator.bytes().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ u64::from(b)).wrapping_mul(0x100000001b3)
    });
    Decimal::from(MIN_FARE + hash % FARE_SPREAD)
}

fn parse_response(body: FlightsResponse) -> Result<Vec<ProviderOffer>, ProviderError> {
    if let Some(err) = body.error {
        let code = match err.code {
            Some(serde_json::Value::String(code)) => code,
            Some(other) => other.to_string(),
            None => String::new(),
        };
        return Err(ProviderError::InvalidResponse(format!("{} {}", code, err.message).trim().to_string()));
    }

    let records = body.data.unwrap_or_default();
    let total = records.len();
    let offers: Vec<ProviderOffer> = records.into_iter().filter_map(AsFlight::into_offer).collect();
    if offers.len() < total {
        warn!("Dropped {} AviationStack records without codes or schedule", total - offers.len());
    }
    Ok(offers)
}

/// Live provider for the AviationStack flights API.
pub struct AviationStackProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

impl AviationStackProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("provider.api_key is required for aviationstack".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_ms: config.timeout_ms,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout_ms)
        } else if e.is_decode() {
            ProviderError::InvalidResponse(e.to_string())
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl FlightDataProvider for AviationStackProvider {
    fn name(&self) -> &str {
        "aviationstack"
    }

    /// The API filters on a single `flight_date`, so only the first day of the
    /// window is fetched; the result is then trimmed to the full query window.
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
        let flight_date = query.date.format("%Y-%m-%d").to_string();
        let mut params = vec![
            ("access_key", self.api_key.clone()),
            ("dep_iata", query.origin_code.clone()),
            ("flight_date", flight_date),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(destination) = &query.destination_code {
            params.push(("arr_iata", destination.clone()));
        }

        info!("AviationStack search from {} on {}", query.origin_code, query.date);

        let response = self
            .client
            .get(format!("{}/flights", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(format!("AviationStack answered {}", status)));
        }

        let body: FlightsResponse = response.json().await.map_err(|e| self.map_error(e))?;
        let offers = parse_response(body)?;

        Ok(offers.into_iter().filter(|o| o.matches(query)).collect())
    }

    /// The reference-data endpoints are rate limited on the free tier, so the
    /// built-in airport list is served instead.
    async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
        Ok(default_airports()
            .into_iter()
            .map(|a| ProviderAirport { code: a.code, name: a.name, city: a.city })
            .collect())
    }
}
