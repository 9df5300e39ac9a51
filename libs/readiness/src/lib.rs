//! Readiness polling primitives.
//!
//! This library provides the timed-retry combinator used to gate
//! deployment progress on dependency services becoming ready:
//!
//! - **Probe**: an async check returning ready/not-ready.
//! - **Budget**: a per-service time allowance, decremented by the polling
//!   interval each iteration.
//!
//! # Invariants
//!
//! - Polling always terminates: for budget `T` and interval `I`, at most
//!   `ceil(T/I)` probe attempts are made before giving up.
//! - The timing policy is isolated here so callers can be tested against
//!   a virtual clock (`tokio::time::pause`).

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// Errors constructing a polling policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// Polling interval must be positive.
    #[error("polling interval must be positive")]
    ZeroInterval,

    /// Timeout budget must be positive.
    #[error("timeout budget must be positive")]
    ZeroBudget,
}

/// Timing policy for readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    interval: Duration,
    budget: Duration,
}

impl PollPolicy {
    /// Create a policy. Both the interval and the budget must be positive.
    pub fn new(interval: Duration, budget: Duration) -> Result<Self, PolicyError> {
        if interval.is_zero() {
            return Err(PolicyError::ZeroInterval);
        }
        if budget.is_zero() {
            return Err(PolicyError::ZeroBudget);
        }
        Ok(Self { interval, budget })
    }

    /// The fixed polling interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The total time budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Upper bound on probe attempts: `ceil(budget / interval)`.
    pub fn max_attempts(&self) -> u32 {
        let budget = self.budget.as_millis();
        let interval = self.interval.as_millis();
        budget.div_ceil(interval).max(1) as u32
    }
}

/// Result of a bounded polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The probe succeeded within the budget.
    Ready { attempts: u32, elapsed: Duration },

    /// The budget was exhausted without a successful probe.
    TimedOut { attempts: u32, elapsed: Duration },
}

impl PollOutcome {
    /// Returns true if the probe succeeded.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Number of probe attempts performed.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    /// Wall time spent polling.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::Ready { elapsed, .. } | Self::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

/// Poll `probe` at the policy's interval until it succeeds or the budget
/// is exhausted.
///
/// The probe runs first on every iteration, then the remaining budget is
/// decremented by the interval. Time-bounded, not retry-count-bounded;
/// never blocks past the budget plus one probe invocation.
pub async fn wait_ready<F, Fut>(mut probe: F, policy: PollPolicy) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let mut remaining = policy.budget();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if probe().await {
            let elapsed = start.elapsed();
            debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "probe ready");
            return PollOutcome::Ready { attempts, elapsed };
        }

        remaining = remaining.saturating_sub(policy.interval());
        if remaining.is_zero() {
            let elapsed = start.elapsed();
            debug!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "probe budget exhausted"
            );
            return PollOutcome::TimedOut { attempts, elapsed };
        }

        tokio::time::sleep(policy.interval()).await;
    }
}

/// TCP connect probe with a per-attempt timeout.
///
/// Ready means a connection could be opened; the connection is dropped
/// immediately.
pub async fn check_tcp(addr: SocketAddr, attempt_timeout: Duration) -> bool {
    match timeout(attempt_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => {
            debug!(%addr, "tcp probe succeeded");
            true
        }
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "tcp probe failed: connection error");
            false
        }
        Err(_) => {
            debug!(%addr, "tcp probe failed: timeout");
            false
        }
    }
}
