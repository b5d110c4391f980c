use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::constants;

/// Jittered exponential backoff: `2^attempt * base + U(0, max_jitter)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(constants::BACKOFF_BASE_MS),
            max_jitter: Duration::from_millis(constants::BACKOFF_MAX_JITTER_MS),
        }
    }
}

impl Backoff {
    /// Delay before the retry that follows failure number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let nanos = u64::try_from(self.max_jitter.as_nanos()).unwrap_or(u64::MAX);
        let jitter = if nanos == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
        };
        self.delay_with_jitter(attempt, jitter)
    }

    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        // Capped so a misconfigured attempt limit cannot overflow.
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).saturating_add(jitter)
    }
}

/// Suspends the calling task between attempts.
#[async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, delay: Duration);
}

pub struct TokioPause;

#[async_trait]
impl Pause for TokioPause {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
