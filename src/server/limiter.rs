//! Admission control for connection dispatch.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Paces how fast workers may begin handling dequeued connections.
///
/// Holds only its own clock state; there is no per-connection bookkeeping.
/// Workers call [`Limiter::take`] after dequeuing a connection and before
/// touching any of its bytes.
pub enum Limiter {
    /// `take()` never blocks.
    Unlimited,
    /// Dispatches are spaced `interval` apart (leaky-bucket pacing).
    Paced {
        interval: Duration,
        next_slot: Mutex<Instant>,
    },
}

impl Limiter {
    /// A limiter dispatching at most `per_second` connections per second;
    /// 0 means unlimited.
    pub fn from_rate(per_second: u32) -> Self {
        if per_second == 0 {
            Limiter::Unlimited
        } else {
            Limiter::Paced {
                interval: Duration::from_secs(1) / per_second,
                next_slot: Mutex::new(Instant::now()),
            }
        }
    }

    /// Acquires an admission token, sleeping until the caller's slot.
    pub async fn take(&self) {
        match self {
            Limiter::Unlimited => {}
            Limiter::Paced { interval, next_slot } => {
                let slot = {
                    let mut next = next_slot.lock().await;
                    let now = Instant::now();
                    let slot = if *next > now { *next } else { now };
                    *next = slot + *interval;
                    slot
                };
                tokio::time::sleep_until(slot).await;
            }
        }
    }
}
