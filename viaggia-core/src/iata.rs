use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Uppercases and checks a three-letter IATA airport code.
pub fn normalize_code(code: &str) -> CoreResult<String> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(CoreError::ValidationError(format!("Invalid IATA airport code: '{}'", code)))
    }
}

/// Marketing name for the carriers the mock schedule and AviationStack commonly return.
pub fn airline_name(carrier_code: &str) -> Option<&'static str> {
    match carrier_code.trim().to_ascii_uppercase().as_str() {
        "AZ" => Some("ITA Airways"),
        "FR" => Some("Ryanair"),
        "U2" => Some("EasyJet"),
        "W6" => Some("Wizz Air"),
        "VY" => Some("Vueling"),
        "V7" => Some("Volotea"),
        _ => None,
    }
}

// ============================================================================
// Flight data provider wire contract
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderQuery {
    pub origin_code: String,
    pub destination_code: Option<String>,
    pub date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEndpoint {
    pub code: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOffer {
    pub departure: OfferEndpoint,
    pub arrival: OfferEndpoint,
    pub carrier_code: String,
    pub carrier_name: Option<String>,
    pub flight_number: String,
    pub price: Decimal,
}

impl ProviderOffer {
    /// Flight number with the carrier prefix, e.g. `FR5678`.
    pub fn designator(&self) -> String {
        let carrier = self.carrier_code.trim().to_ascii_uppercase();
        let number = self.flight_number.trim().to_ascii_uppercase();
        if number.starts_with(&carrier) {
            number
        } else {
            format!("{}{}", carrier, number)
        }
    }

    pub fn airline(&self) -> String {
        self.carrier_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| airline_name(&self.carrier_code).map(String::from))
            .unwrap_or_else(|| self.carrier_code.clone())
    }

    /// Whether the offer departs from `query.origin_code` inside the query's date window.
    pub fn matches(&self, query: &ProviderQuery) -> bool {
        if !self.departure.code.eq_ignore_ascii_case(&query.origin_code) {
            return false;
        }
        if let Some(destination) = &query.destination_code {
            if !self.arrival.code.eq_ignore_ascii_case(destination) {
                return false;
            }
        }
        let day = self.departure.time.date_naive();
        day >= query.date && query.return_date.map_or(true, |until| day <= until)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAirport {
    pub code: String,
    pub name: String,
    pub city: String,
}
