use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use viaggia_core::iata::{ProviderAirport, ProviderOffer, ProviderQuery};
use viaggia_core::{FlightDataProvider, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: usize,
    opened_at: Option<Instant>,
    /// Start of the single call admitted while half-open.
    probe_started: Option<Instant>,
}

/// Counts consecutive provider failures. Once open, calls are refused until
/// `reset_timeout` has passed, then exactly one probe is admitted.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    threshold: usize,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, reset_timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            threshold: threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                probe_started: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Decides whether a call may reach the provider.
    pub fn admit(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = inner.opened_at.map_or(true, |at| at.elapsed() >= self.reset_timeout);
                if !cooled {
                    return false;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_started = Some(Instant::now());
                tracing::info!(breaker = %self.name, "circuit half-open, admitting one probe");
                true
            }
            CircuitState::HalfOpen => {
                // A probe whose caller went away never reports back; let another one through.
                let stale = inner.probe_started.map_or(true, |at| at.elapsed() >= self.reset_timeout);
                if stale {
                    inner.probe_started = Some(Instant::now());
                }
                stale
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            tracing::info!(breaker = %self.name, "circuit closed, provider recovered");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
        inner.probe_started = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        inner.probe_started = None;
        if inner.state == CircuitState::HalfOpen || inner.failures >= self.threshold {
            if inner.state != CircuitState::Open {
                tracing::warn!(breaker = %self.name, failures = inner.failures, "circuit opened");
            }
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

/// Wraps a provider so that repeated failures stop reaching it for a while.
/// While open, calls fail immediately with [`ProviderError::CircuitOpen`].
pub struct GuardedProvider {
    inner: Arc<dyn FlightDataProvider>,
    breaker: CircuitBreaker,
}

impl GuardedProvider {
    pub fn new(inner: Arc<dyn FlightDataProvider>, threshold: usize, reset_timeout: Duration) -> Self {
        let breaker = CircuitBreaker::new(inner.name(), threshold, reset_timeout);
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn guarded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if !self.breaker.admit() {
            return Err(ProviderError::CircuitOpen(self.breaker.name().to_string()));
        }

        match call.await {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl FlightDataProvider for GuardedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
        self.guarded(self.inner.search(query)).await
    }

    async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
        self.guarded(self.inner.list_airports()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyProvider {
        calls: AtomicUsize,
        healthy: AtomicBool,
    }

    #[async_trait]
    impl FlightDataProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn search(&self, _query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok(Vec::new())
            } else {
                Err(ProviderError::Http("connection refused".to_string()))
            }
        }

        async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
            Ok(Vec::new())
        }
    }

    /// Fails every call, slowly enough for other callers to pile up behind it.
    struct SlowFailingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FlightDataProvider for SlowFailingProvider {
        fn name(&self) -> &str {
            "slow"
        }

        async fn search(&self, _query: &ProviderQuery) -> Result<Vec<ProviderOffer>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Err(ProviderError::Timeout(100))
        }

        async fn list_airports(&self) -> Result<Vec<ProviderAirport>, ProviderError> {
            Ok(Vec::new())
        }
    }

    fn query() -> ProviderQuery {
        ProviderQuery {
            origin_code: "FCO".to_string(),
            destination_code: None,
            date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            return_date: None,
        }
    }

    #[tokio::test]
    async fn test_breaker_opens_then_recovers() {
        let inner = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), healthy: AtomicBool::new(false) });
        let guarded = GuardedProvider::new(inner.clone(), 2, Duration::from_millis(50));

        assert!(matches!(guarded.search(&query()).await, Err(ProviderError::Http(_))));
        assert!(matches!(guarded.search(&query()).await, Err(ProviderError::Http(_))));
        assert_eq!(guarded.breaker().current(), CircuitState::Open);

        // Open: the inner provider is not called
        assert!(matches!(guarded.search(&query()).await, Err(ProviderError::CircuitOpen(_))));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        inner.healthy.store(true, Ordering::SeqCst);

        assert!(guarded.search(&query()).await.is_ok());
        assert_eq!(guarded.breaker().current(), CircuitState::Closed);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let inner = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), healthy: AtomicBool::new(false) });
        let guarded = GuardedProvider::new(inner.clone(), 1, Duration::from_millis(20));

        assert!(guarded.search(&query()).await.is_err());
        assert_eq!(guarded.breaker().current(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(matches!(guarded.search(&query()).await, Err(ProviderError::Http(_))));
        assert_eq!(guarded.breaker().current(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let inner = Arc::new(FlakyProvider { calls: AtomicUsize::new(0), healthy: AtomicBool::new(false) });
        let guarded = GuardedProvider::new(inner.clone(), 2, Duration::from_secs(30));

        assert!(guarded.search(&query()).await.is_err());
        inner.healthy.store(true, Ordering::SeqCst);
        assert!(guarded.search(&query()).await.is_ok());
        inner.healthy.store(false, Ordering::SeqCst);
        assert!(guarded.search(&query()).await.is_err());

        assert_eq!(guarded.breaker().current(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_admits_a_single_call() {
        let inner = Arc::new(SlowFailingProvider { calls: AtomicUsize::new(0) });
        let guarded = GuardedProvider::new(inner.clone(), 1, Duration::from_millis(20));
        let q = query();

        assert!(guarded.search(&q).await.is_err());
        assert_eq!(guarded.breaker().current(), CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let results = tokio::join!(
            guarded.search(&q),
            guarded.search(&q),
            guarded.search(&q),
            guarded.search(&q),
            guarded.search(&q),
        );
        let results = [results.0, results.1, results.2, results.3, results.4];

        let refused = results.iter().filter(|r| matches!(r, Err(ProviderError::CircuitOpen(_)))).count();
        let timed_out = results.iter().filter(|r| matches!(r, Err(ProviderError::Timeout(_)))).count();
        assert_eq!(timed_out, 1);
        assert_eq!(refused, 4);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(guarded.breaker().current(), CircuitState::Open);
    }

    #[test]
    fn test_stale_probe_is_replaced() {
        let breaker = CircuitBreaker::new("stale", 1, Duration::from_millis(10));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(20));

        assert!(breaker.admit());
        assert!(!breaker.admit());

        // The admitted caller never reported back.
        std::thread::sleep(Duration::from_millis(20));
        assert!(breaker.admit());
        assert_eq!(breaker.current(), CircuitState::HalfOpen);
    }
}
