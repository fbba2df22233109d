use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::airport::{Airport, AirportDirectory};
use crate::flight::{Flight, FlightCatalog};
use crate::iata::ProviderQuery;
use crate::provider::FlightDataProvider;
use crate::{CoreError, CoreResult};

/// Upper bound on the number of flights a single search returns.
pub const DEFAULT_MAX_RESULTS: usize = 200;

/// Search parameters exactly as they arrive in the query string.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub departure_airport_id: Option<String>,
    #[serde(alias = "startDate")]
    pub departure_date: Option<String>,
    #[serde(alias = "endDate")]
    pub return_date: Option<String>,
    pub max_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub departure_airport_id: u32,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub max_price: Option<Decimal>,
}

impl SearchParams {
    pub fn new(departure_airport_id: u32, departure_date: NaiveDate) -> Self {
        Self {
            departure_airport_id,
            departure_date,
            return_date: None,
            max_price: None,
        }
    }

    pub fn with_return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn with_max_price(mut self, max_price: Decimal) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if let Some(return_date) = self.return_date {
            if return_date < self.departure_date {
                return Err(CoreError::ValidationError(
                    "returnDate must not be earlier than departureDate".to_string(),
                ));
            }
        }
        if let Some(max_price) = self.max_price {
            if max_price.is_sign_negative() && !max_price.is_zero() {
                return Err(CoreError::ValidationError("maxPrice must not be negative".to_string()));
            }
        }
        Ok(())
    }

    /// Inclusive lower bound: midnight UTC of the departure date.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.departure_date.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Exclusive upper bound: midnight UTC after the return date, if any.
    pub fn window_end(&self) -> Option<DateTime<Utc>> {
        self.return_date
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        let matches_airport = flight.departure_airport_id == self.departure_airport_id;
        let matches_date = flight.departure_time >= self.window_start()
            && self.window_end().map_or(true, |end| flight.departure_time < end);
        let matches_price = self.max_price.map_or(true, |max| flight.price <= max);
        matches_airport && matches_date && matches_price
    }

    fn provider_query(&self, origin: &Airport) -> ProviderQuery {
        ProviderQuery {
            origin_code: origin.code.clone(),
            destination_code: None,
            date: self.departure_date,
            return_date: self.return_date,
        }
    }
}

impl TryFrom<SearchQuery> for SearchParams {
    type Error = CoreError;

    fn try_from(query: SearchQuery) -> CoreResult<Self> {
        let departure_airport_id = required(query.departure_airport_id, "departureAirportId")?;
        let departure_airport_id = departure_airport_id.parse::<u32>().map_err(|_| {
            CoreError::ValidationError(format!(
                "departureAirportId must be a non-negative integer, got '{}'",
                departure_airport_id
            ))
        })?;

        let departure_date = parse_date(&required(query.departure_date, "departureDate")?, "departureDate")?;

        let return_date = optional(query.return_date)
            .map(|raw| parse_date(&raw, "returnDate"))
            .transpose()?;

        let max_price = optional(query.max_price)
            .map(|raw| {
                Decimal::from_str(&raw)
                    .map_err(|_| CoreError::ValidationError(format!("maxPrice must be a number, got '{}'", raw)))
            })
            .transpose()?;

        let params = SearchParams {
            departure_airport_id,
            departure_date,
            return_date,
            max_price,
        };
        params.validate()?;
        Ok(params)
    }
}

/// Missing and blank values are both treated as absent.
fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> CoreResult<String> {
    optional(value).ok_or_else(|| CoreError::ValidationError(format!("{} is required", field)))
}

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM[:SS]`.
/// Timestamps are reduced to their UTC calendar date.
pub fn parse_date(raw: &str, field: &str) -> CoreResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc).date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts.date());
        }
    }
    Err(CoreError::ValidationError(format!("{} is not a valid date: '{}'", field, raw)))
}

/// Filters the flight catalog. When a provider is attached, its offers for the
/// requested window are pulled into the catalog before filtering.
pub struct SearchEngine {
    directory: Arc<AirportDirectory>,
    catalog: Arc<FlightCatalog>,
    provider: Option<Arc<dyn FlightDataProvider>>,
    max_results: usize,
}

impl SearchEngine {
    pub fn new(directory: Arc<AirportDirectory>, catalog: Arc<FlightCatalog>) -> Self {
        Self {
            directory,
            catalog,
            provider: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn FlightDataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Provider failures are returned to the caller, never masked as an empty result.
    pub async fn search(&self, params: &SearchParams) -> CoreResult<Vec<Flight>> {
        let origin = self.resolve_origin(params)?;

        if let Some(provider) = &self.provider {
            let query = params.provider_query(origin);
            let offers = provider.search(&query).await?;
            debug!("Provider {} returned {} offers from {}", provider.name(), offers.len(), origin.code);
            self.catalog.ingest(&offers);
        }

        Ok(self.filter(params))
    }

    /// Answers from the catalog alone. Used as the fallback when the provider is down.
    pub fn search_local(&self, params: &SearchParams) -> CoreResult<Vec<Flight>> {
        self.resolve_origin(params)?;
        Ok(self.filter(params))
    }

    fn resolve_origin(&self, params: &SearchParams) -> CoreResult<&Airport> {
        params.validate()?;
        self.directory.get_by_id(params.departure_airport_id).map_err(|_| {
            CoreError::ValidationError(format!(
                "departureAirportId {} does not match any known airport",
                params.departure_airport_id
            ))
        })
    }

    fn filter(&self, params: &SearchParams) -> Vec<Flight> {
        let mut flights = self.catalog.filter(|f| params.matches(f));
        flights.sort_by(|a, b| a.departure_time.cmp(&b.departure_time).then(a.id.cmp(&b.id)));

        if flights.len() > self.max_results {
            debug!("Truncating {} matches to {}", flights.len(), self.max_results);
            flights.truncate(self.max_results);
        }
        flights
    }
}
