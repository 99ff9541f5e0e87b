use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// Circuit Breaker for outbound forwarding
// ============================================================================
//
// The forwarding path never waits for a peer, so outcomes arrive out of band
// (delivery reports). The breaker is therefore split into three calls:
// admit() before handing a message off, then on_success()/on_failure() when
// the outcome is known.
//
// States:
// - Closed: messages pass through
// - Open: broker looks unreachable, messages rejected immediately
// - HalfOpen: timeout elapsed, messages pass until the next outcome decides
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing again
    pub open_timeout: Duration,
    /// Successes in half-open needed to close
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Circuit breaker is open")]
pub struct CircuitOpen;

struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Mutex<BreakerState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            })),
            config,
        }
    }

    /// Check whether a message may be handed off right now
    pub async fn admit(&self) -> Result<(), CircuitOpen> {
        let mut inner = self.inner.lock().await;

        if inner.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
        if elapsed >= self.config.open_timeout {
            tracing::info!("Circuit breaker transitioning to HalfOpen");
            inner.state = CircuitState::HalfOpen;
            inner.half_open_successes = 0;
            Ok(())
        } else {
            Err(CircuitOpen)
        }
    }

    pub async fn on_success(&self) {
        let mut inner = self.inner.lock().await;

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.half_open_successes,
                        "Circuit breaker closing"
                    );
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                }
            }
            // late delivery report from before the circuit opened
            CircuitState::Open => {}
        }
    }

    pub async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.config.failure_threshold => {
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    "Circuit breaker opening"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::HalfOpen => {
                tracing::warn!("Failure during half-open, reopening circuit");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
            }
            _ => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        tracing::info!("Circuit breaker manually reset");
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.opened_at = None;
    }
}
