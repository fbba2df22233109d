use async_trait::async_trait;

use crate::iata::{ProviderAirport, ProviderOffer, ProviderQuery};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Request timed out after {0}ms")]
    Timeout(u64),
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("Provider misconfigured: {0}")]
    Configuration(String),
    #[error("Circuit breaker open for {0}")]
    CircuitOpen(String),
}

/// Source of flight offers and airport reference data.
///
/// Implementations are interchangeable (mock, live HTTP) and chosen at startup.
#[async_trait]
pub trait FlightDataProvider: Send + Sync {
    /// Short identifier used in logs and health output.
    fn name(&self) -> &str;

    /// Offers departing from `query.origin_code` within the query's date window.
    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError>;

    async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError>;
}
