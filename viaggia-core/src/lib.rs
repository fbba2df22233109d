pub mod airport;
pub mod booking;
pub mod flight;
pub mod iata;
pub mod provider;
pub mod search;

pub use airport::{Airport, AirportDirectory};
pub use booking::{Booking, BookingLedger, CreateBookingRequest};
pub use flight::{Flight, FlightCatalog, NewFlight};
pub use provider::{FlightDataProvider, ProviderError};
pub use search::{SearchEngine, SearchParams, SearchQuery};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Flight data provider failed: {0}")]
    ProviderError(#[from] ProviderError),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
