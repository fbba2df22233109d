use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use viaggia_core::airport::default_airports;
use viaggia_core::iata::{OfferEndpoint, ProviderAirport, ProviderOffer, ProviderQuery};
use viaggia_core::{FlightDataProvider, ProviderError};

use crate::app_config::CatalogConfig;

const CARRIERS: [(&str, &str); 4] = [
    ("AZ", "ITA Airways"),
    ("FR", "Ryanair"),
    ("U2", "EasyJet"),
    ("W6", "Wizz Air"),
];
const FLIGHT_DURATION_MINUTES: i64 = 120;

/// In-process provider backed by a schedule generated from a fixed seed.
/// The same seed and start date always yield the same offers.
pub struct MockFlightProvider {
    airports: Vec<ProviderAirport>,
    schedule: Vec<ProviderOffer>,
}

impl MockFlightProvider {
    pub fn new(airports: Vec<ProviderAirport>, schedule: Vec<ProviderOffer>) -> Self {
        Self { airports, schedule }
    }

    /// `config.flight_count` flights between the built-in airports, departing
    /// within `config.horizon_days` of `start`, fares 50 to 249 EUR.
    pub fn generate(config: &CatalogConfig, start: NaiveDate) -> Self {
        let airports: Vec<ProviderAirport> = default_airports()
            .into_iter()
            .map(|a| ProviderAirport { code: a.code, name: a.name, city: a.city })
            .collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let origin_of_window = start.and_time(NaiveTime::MIN).and_utc();
        let window_minutes = i64::from(config.horizon_days.max(1)) * 24 * 60;

        let mut schedule = Vec::with_capacity(config.flight_count);
        for _ in 0..config.flight_count {
            let departure = rng.gen_range(0..airports.len());
            let mut arrival = rng.gen_range(0..airports.len());
            while arrival == departure {
                arrival = rng.gen_range(0..airports.len());
            }

            // Five-minute slots read like real timetables
            let offset = rng.gen_range(0..window_minutes) / 5 * 5;
            let departure_time = origin_of_window + Duration::minutes(offset);
            let (carrier_code, carrier_name) = CARRIERS[rng.gen_range(0..CARRIERS.len())];

            schedule.push(ProviderOffer {
                departure: OfferEndpoint {
                    code: airports[departure].code.clone(),
                    time: departure_time,
                },
                arrival: OfferEndpoint {
                    code: airports[arrival].code.clone(),
                    time: departure_time + Duration::minutes(FLIGHT_DURATION_MINUTES),
                },
                carrier_code: carrier_code.to_string(),
                carrier_name: Some(carrier_name.to_string()),
                flight_number: rng.gen_range(100..1000).to_string(),
                price: Decimal::from(rng.gen_range(50i64..250)),
            });
        }

        Self::new(airports, schedule)
    }

    pub fn schedule(&self) -> &[ProviderOffer] {
        &self.schedule
    }
}

#[async_trait]
impl FlightDataProvider for MockFlightProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
        Ok(self
            .schedule
            .iter()
            .filter(|offer| offer.matches(query))
            .cloned()
            .collect())
    }

    async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
        Ok(self.airports.clone())
    }
}
