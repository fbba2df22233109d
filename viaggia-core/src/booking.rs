use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use viaggia_shared::pii::{redact_email, Masked};

use crate::flight::FlightCatalog;
use crate::{CoreError, CoreResult};

pub const REFERENCE_LENGTH: usize = 8;
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_REFERENCE_ATTEMPTS: usize = 16;
const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: u32,
    pub flight_id: u32,
    pub passenger_name: String,
    pub passenger_email: Masked<String>,
    pub booking_reference: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub flight_id: u32,
    pub passenger_name: String,
    pub passenger_email: String,
}

impl CreateBookingRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let name = self.passenger_name.trim();
        if name.is_empty() {
            return Err(CoreError::ValidationError("passengerName is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(CoreError::ValidationError(format!(
                "passengerName must be at most {} characters",
                MAX_NAME_LENGTH
            )));
        }
        if !is_valid_email(self.passenger_email.trim()) {
            return Err(CoreError::ValidationError("passengerEmail is not a valid email address".to_string()));
        }
        Ok(())
    }
}

/// `local@domain.tld` where local is `[A-Za-z0-9._%+-]+`, domain is
/// `[A-Za-z0-9.-]+` and the TLD has at least two letters.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.chars().all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let host_ok = !host.is_empty()
        && host.chars().all(|c| c.is_ascii_alphanumeric() || ".-".contains(c));
    let tld_ok = tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic());

    local_ok && host_ok && tld_ok
}

/// Random 8-character code over `[A-Z0-9]`.
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERENCE_LENGTH)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect()
}

type ReferenceGenerator = Box<dyn Fn() -> String + Send + Sync>;

struct LedgerInner {
    next_id: u32,
    bookings: BTreeMap<u32, Booking>,
    by_reference: HashMap<String, u32>,
}

/// Append-only booking store. Id assignment, reference issuance and insertion
/// happen under one lock, so concurrent callers never share an id or a reference.
pub struct BookingLedger {
    inner: Mutex<LedgerInner>,
    flights: Option<Arc<FlightCatalog>>,
    generator: ReferenceGenerator,
}

impl BookingLedger {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LedgerInner {
                next_id: 1,
                bookings: BTreeMap::new(),
                by_reference: HashMap::new(),
            }),
            flights: None,
            generator: Box::new(generate_reference),
        }
    }

    /// Refuse bookings for flights the catalog does not know.
    pub fn with_flight_check(mut self, flights: Arc<FlightCatalog>) -> Self {
        self.flights = Some(flights);
        self
    }

    pub fn with_reference_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generator = Box::new(generator);
        self
    }

    pub fn create_booking(
        &self,
        flight_id: u32,
        passenger_name: &str,
        passenger_email: &str,
    ) -> CoreResult<Booking> {
        let request = CreateBookingRequest {
            flight_id,
            passenger_name: passenger_name.trim().to_string(),
            passenger_email: passenger_email.trim().to_string(),
        };
        self.create(request)
    }

    pub fn create(&self, request: CreateBookingRequest) -> CoreResult<Booking> {
        request.validate()?;

        if let Some(flights) = &self.flights {
            if !flights.contains(request.flight_id) {
                return Err(CoreError::ValidationError(format!(
                    "flightId {} does not match any known flight",
                    request.flight_id
                )));
            }
        }

        let mut inner = self.inner.lock();
        let reference = self.unique_reference(&inner.by_reference)?;

        let id = inner.next_id;
        inner.next_id += 1;

        let booking = Booking {
            id,
            flight_id: request.flight_id,
            passenger_name: request.passenger_name.trim().to_string(),
            passenger_email: Masked(request.passenger_email.trim().to_string()),
            booking_reference: reference.clone(),
            created_at: Utc::now(),
        };
        inner.by_reference.insert(reference, id);
        inner.bookings.insert(id, booking.clone());

        info!(
            "Booking {} created: reference {}, flight {}, passenger {}",
            booking.id,
            booking.booking_reference,
            booking.flight_id,
            redact_email(booking.passenger_email.expose())
        );
        Ok(booking)
    }

    fn unique_reference(&self, taken: &HashMap<String, u32>) -> CoreResult<String> {
        for attempt in 1..=MAX_REFERENCE_ATTEMPTS {
            let candidate = (self.generator)();
            if !taken.contains_key(&candidate) {
                return Ok(candidate);
            }
            warn!("Booking reference collision on attempt {}, regenerating", attempt);
        }
        Err(CoreError::InternalError(format!(
            "Could not issue a unique booking reference after {} attempts",
            MAX_REFERENCE_ATTEMPTS
        )))
    }

    pub fn get(&self, id: u32) -> CoreResult<Booking> {
        self.inner
            .lock()
            .bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", id)))
    }

    pub fn get_by_reference(&self, reference: &str) -> CoreResult<Booking> {
        let key = reference.trim().to_ascii_uppercase();
        let inner = self.inner.lock();
        inner
            .by_reference
            .get(&key)
            .and_then(|id| inner.bookings.get(id))
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("Booking reference {}", key)))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BookingLedger {
    fn default() -> Self {
        Self::new()
    }
}
