use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use viaggia_core::airport::default_airports;
use viaggia_core::{AirportDirectory, BookingLedger, FlightCatalog, FlightDataProvider, SearchEngine};

use crate::app_config::{Config, ProviderConfig, ProviderKind};
use crate::aviationstack::AviationStackProvider;
use crate::mock_provider::MockFlightProvider;
use crate::resiliency::GuardedProvider;

/// Owns every piece of in-memory state the service needs. Built once at startup,
/// shared read-only afterwards (the catalog and ledger synchronize internally).
pub struct Store {
    directory: Arc<AirportDirectory>,
    catalog: Arc<FlightCatalog>,
    ledger: BookingLedger,
    engine: SearchEngine,
}

impl Store {
    pub fn from_parts(
        directory: Arc<AirportDirectory>,
        catalog: Arc<FlightCatalog>,
        engine: SearchEngine,
        ledger: BookingLedger,
    ) -> Self {
        Self { directory, catalog, ledger, engine }
    }

    /// Provider trouble never fails startup: airports fall back to the built-in
    /// list and the catalog is always seeded from the mock schedule.
    pub async fn bootstrap(config: &Config) -> Self {
        let seed = Arc::new(MockFlightProvider::generate(&config.catalog, Utc::now().date_naive()));
        let provider = select_provider(&config.provider, seed.clone());
        let provider: Arc<dyn FlightDataProvider> = Arc::new(GuardedProvider::new(
            provider,
            config.provider.failure_threshold,
            Duration::from_secs(config.provider.reset_timeout_secs),
        ));

        let directory = Arc::new(load_directory(&*provider).await);
        let catalog = Arc::new(FlightCatalog::new(directory.clone()));
        let seeded = catalog.ingest(seed.schedule());
        info!(
            "Catalog seeded with {} flights across {} airports (provider: {})",
            seeded.len(),
            directory.len(),
            provider.name()
        );

        let mut ledger = BookingLedger::new();
        if config.booking.require_known_flight {
            ledger = ledger.with_flight_check(catalog.clone());
        }

        let engine = SearchEngine::new(directory.clone(), catalog.clone())
            .with_provider(provider)
            .with_max_results(config.search.max_results);

        Self::from_parts(directory, catalog, engine, ledger)
    }

    pub fn directory(&self) -> &AirportDirectory {
        &self.directory
    }

    pub fn catalog(&self) -> &FlightCatalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }
}

fn select_provider(config: &ProviderConfig, mock: Arc<MockFlightProvider>) -> Arc<dyn FlightDataProvider> {
    let mock: Arc<dyn FlightDataProvider> = mock;
    match config.kind {
        ProviderKind::Mock => mock,
        ProviderKind::Aviationstack => match AviationStackProvider::new(config) {
            Ok(provider) => Arc::new(provider),
            Err(e) => {
                warn!("AviationStack unavailable ({}), using mock provider", e);
                mock
            }
        },
    }
}

async fn load_directory(provider: &dyn FlightDataProvider) -> AirportDirectory {
    match provider.list_airports().await {
        Ok(airports) => {
            let directory = AirportDirectory::from_provider(airports);
            if !directory.is_empty() {
                return directory;
            }
            warn!("Provider {} returned no usable airports, using built-in list", provider.name());
        }
        Err(e) => warn!("Provider {} airport lookup failed ({}), using built-in list", provider.name(), e),
    }

    // The built-in list is static and valid.
    AirportDirectory::new(default_airports()).unwrap_or_default()
}
