use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::airport::AirportDirectory;
use crate::iata::ProviderOffer;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: u32,
    pub departure_airport_id: u32,
    pub arrival_airport_id: u32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Decimal,
    pub airline: String,
    pub flight_number: String,
}

/// A flight before the catalog has assigned it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlight {
    pub departure_airport_id: u32,
    pub arrival_airport_id: u32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: Decimal,
    pub airline: String,
    pub flight_number: String,
}

impl NewFlight {
    /// Maps provider airport codes back to directory ids.
    pub fn from_offer(offer: &ProviderOffer, directory: &AirportDirectory) -> CoreResult<Self> {
        let departure = directory.get_by_code(&offer.departure.code)?;
        let arrival = directory.get_by_code(&offer.arrival.code)?;

        Ok(Self {
            departure_airport_id: departure.id,
            arrival_airport_id: arrival.id,
            departure_time: offer.departure.time,
            arrival_time: offer.arrival.time,
            price: offer.price,
            airline: offer.airline(),
            flight_number: offer.designator(),
        })
    }

    fn validate(&self, directory: &AirportDirectory) -> CoreResult<()> {
        for id in [self.departure_airport_id, self.arrival_airport_id] {
            if !directory.contains(id) {
                return Err(CoreError::ValidationError(format!(
                    "Flight {} references unknown airport {}",
                    self.flight_number, id
                )));
            }
        }
        if self.departure_airport_id == self.arrival_airport_id {
            return Err(CoreError::ValidationError(format!(
                "Flight {} departs from and arrives at the same airport",
                self.flight_number
            )));
        }
        if self.arrival_time <= self.departure_time {
            return Err(CoreError::ValidationError(format!(
                "Flight {} arrives before it departs",
                self.flight_number
            )));
        }
        if self.price.is_sign_negative() {
            return Err(CoreError::ValidationError(format!(
                "Flight {} has a negative price",
                self.flight_number
            )));
        }
        Ok(())
    }

    fn key(&self) -> (String, DateTime<Utc>) {
        (self.flight_number.clone(), self.departure_time)
    }
}

#[derive(Default)]
struct CatalogInner {
    flights: BTreeMap<u32, Flight>,
    by_key: HashMap<(String, DateTime<Utc>), u32>,
    next_id: u32,
}

/// Flight offers known to this process.
///
/// Flights are only ever added. A flight with the same number and departure
/// time as an existing entry is not added twice; the existing entry is returned.
pub struct FlightCatalog {
    directory: Arc<AirportDirectory>,
    inner: RwLock<CatalogInner>,
}

impl FlightCatalog {
    pub fn new(directory: Arc<AirportDirectory>) -> Self {
        Self {
            directory,
            inner: RwLock::new(CatalogInner { next_id: 1, ..Default::default() }),
        }
    }

    pub fn directory(&self) -> &AirportDirectory {
        &self.directory
    }

    pub fn insert(&self, flight: NewFlight) -> CoreResult<Flight> {
        flight.validate(&self.directory)?;

        let mut inner = self.inner.write();
        let key = flight.key();
        if let Some(existing) = inner.by_key.get(&key).and_then(|id| inner.flights.get(id)) {
            return Ok(existing.clone());
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let flight = Flight {
            id,
            departure_airport_id: flight.departure_airport_id,
            arrival_airport_id: flight.arrival_airport_id,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            price: flight.price,
            airline: flight.airline,
            flight_number: flight.flight_number,
        };
        inner.by_key.insert(key, id);
        inner.flights.insert(id, flight.clone());

        Ok(flight)
    }

    /// Adds provider offers to the catalog and returns the matching catalog entries.
    /// Offers that cannot be mapped onto the directory are logged and skipped.
    pub fn ingest(&self, offers: &[ProviderOffer]) -> Vec<Flight> {
        let mut flights = Vec::with_capacity(offers.len());

        for offer in offers {
            let result = NewFlight::from_offer(offer, &self.directory).and_then(|f| self.insert(f));
            match result {
                Ok(flight) => flights.push(flight),
                Err(e) => warn!("Skipping provider offer {}: {}", offer.designator(), e),
            }
        }

        debug!("Ingested {} of {} provider offers", flights.len(), offers.len());
        flights
    }

    pub fn get(&self, id: u32) -> CoreResult<Flight> {
        self.inner
            .read()
            .flights
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Flight {}", id)))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.inner.read().flights.contains_key(&id)
    }

    /// All flights ordered by id.
    pub fn list(&self) -> Vec<Flight> {
        self.inner.read().flights.values().cloned().collect()
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<Flight>
    where
        P: Fn(&Flight) -> bool,
    {
        self.inner
            .read()
            .flights
            .values()
            .filter(|f| predicate(f))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
