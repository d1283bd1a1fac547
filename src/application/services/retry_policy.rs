use std::time::Duration;

use rand::Rng;

/// Bounded retry with exponential backoff and jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
            backoff_max: backoff_max.max(backoff_base),
        }
    }

    /// Delay before attempt number `retry_count + 1` becomes visible:
    /// `base * 2^(retry_count - 1)`, capped, with +/-10% jitter.
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }

        let exponent = retry_count.saturating_sub(1).min(20);
        let delay = self
            .backoff_base
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.backoff_max);

        let jitter = rand::thread_rng().gen_range(0.9..=1.1);
        delay.mul_f64(jitter).clamp(self.backoff_base, self.backoff_max)
    }
}
