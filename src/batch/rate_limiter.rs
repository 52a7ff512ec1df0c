//! Adaptive spacing between remote calls.
//!
//! The delay grows with the observed call rate since the run started:
//! above 10 calls/sec the base delay doubles, above 5 calls/sec it is
//! multiplied by 1.5. Each caller then waits until at least that delay has
//! passed since the previous call.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Observed-rate thresholds (calls per second) and their multipliers.
const HIGH_RATE: f64 = 10.0;
const HIGH_RATE_FACTOR: f64 = 2.0;
const MODERATE_RATE: f64 = 5.0;
const MODERATE_RATE_FACTOR: f64 = 1.5;

#[derive(Debug)]
struct LimiterState {
    started: Instant,
    last_call: Option<Instant>,
    calls: u64,
}

/// Rate limiter shared by every chunk task of one run.
///
/// All bookkeeping happens under one lock, which is held while waiting so
/// that two callers can never be spaced closer than the delay.
#[derive(Debug)]
pub struct RateLimiter {
    base_delay: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            state: Mutex::new(LimiterState {
                started: Instant::now(),
                last_call: None,
                calls: 0,
            }),
        }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Delay to apply at the given observed rate.
    pub fn delay_for_rate(&self, calls_per_sec: f64) -> Duration {
        if calls_per_sec > HIGH_RATE {
            self.base_delay.mul_f64(HIGH_RATE_FACTOR)
        } else if calls_per_sec > MODERATE_RATE {
            self.base_delay.mul_f64(MODERATE_RATE_FACTOR)
        } else {
            self.base_delay
        }
    }

    /// Wait for this caller's slot and record the call.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.started).as_secs_f64();
        let rate = if elapsed > 0.0 {
            state.calls as f64 / elapsed
        } else {
            0.0
        };
        let delay = self.delay_for_rate(rate);

        if let Some(last) = state.last_call {
            let ready_at = last + delay;
            if ready_at > now {
                trace!(rate, delay_ms = delay.as_millis() as u64, "Rate limiting remote call");
                sleep_until(ready_at).await;
            }
        }

        state.last_call = Some(Instant::now());
        state.calls += 1;
    }

    /// Calls recorded so far.
    pub async fn calls(&self) -> u64 {
        self.state.lock().await.calls
    }
}
