//! Caller-side retry and backoff for dialing / 调用方的拨号重试与退避
//!
//! The dialers in this workspace never retry on their own. A caller that
//! wants retries wraps its dial in a [`RetryPolicy`]: every attempt goes back
//! through the composed dialer, so an adaptive strategy naturally hands the
//! next attempt to whichever candidate is now ranked first.
//!
//! ## Features / 特性
//! - **Exponential Backoff**: `base * 2^(attempt-1)`, capped at `max_delay`
//! - **Jitter**: ±`jitter_factor` of the delay, to avoid synchronized retries
//! - **Selective**: configuration and cancellation errors are never retried
//!
//! ## Configuration / 配置
//! - `PD_RETRY_MAX`: Max retry attempts (default: 0/disabled)
//! - `PD_RETRY_BASE_MS`: Base delay in ms (default: 100)
//! - `PD_RETRY_MAX_MS`: Max delay in ms (default: 2000)
//! - `PD_RETRY_JITTER`: Jitter factor, clamped to 0.0..=1.0 (default: 0.2)

use crate::context::DialContext;
use crate::dial::dial_safely;
use crate::dialer::{DialError, Dialer, IoStream, Network};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry policy configuration / 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = disabled)
    pub max_retries: u32,
    /// Base delay for backoff calculation
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
    /// Jitter factor (0.0 - 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            jitter_factor: 0.2,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl RetryPolicy {
    /// Load the policy from `PD_RETRY_*` environment variables.
    ///
    /// Returns the disabled default when `PD_RETRY_MAX` is unset or 0.
    pub fn from_env() -> Self {
        let max_retries = env_parse::<u32>("PD_RETRY_MAX").unwrap_or(0);
        if max_retries == 0 {
            debug!("Retry policy disabled (PD_RETRY_MAX not set or 0)");
            return Self::default();
        }

        let base_delay_ms = env_parse::<u64>("PD_RETRY_BASE_MS").unwrap_or(100);
        let max_delay_ms = env_parse::<u64>("PD_RETRY_MAX_MS").unwrap_or(2000);
        let jitter_factor = env_parse::<f64>("PD_RETRY_JITTER")
            .unwrap_or(0.2)
            .clamp(0.0, 1.0);

        debug!(
            "Retry policy enabled: max_retries={}, base_delay_ms={}, max_delay_ms={}, jitter_factor={}",
            max_retries, base_delay_ms, max_delay_ms, jitter_factor
        );

        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter_factor,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential_factor = 2u64.saturating_pow(attempt - 1);
        let delay_ms = (self.base_delay.as_millis() as u64)
            .saturating_mul(exponential_factor)
            .min(self.max_delay.as_millis() as u64);

        let jitter_range = (delay_ms as f64 * self.jitter_factor) as u64;
        if jitter_range == 0 {
            return Duration::from_millis(delay_ms);
        }

        let mut rng = rand::thread_rng();
        let jitter = rng.gen_range(0..=jitter_range);
        let final_delay_ms = if rng.gen_bool(0.5) {
            delay_ms.saturating_add(jitter)
        } else {
            delay_ms.saturating_sub(jitter)
        };
        Duration::from_millis(final_delay_ms)
    }

    /// Dial through `dialer`, retrying retriable failures with backoff.
    ///
    /// The context bounds the whole sequence, backoff sleeps included.
    pub async fn dial<D>(
        &self,
        ctx: &DialContext,
        dialer: &Arc<D>,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError>
    where
        D: Dialer + ?Sized + 'static,
    {
        let mut attempt = 0u32;
        loop {
            let err = match dial_safely(ctx, dialer, network, addr).await {
                Ok(conn) => {
                    if attempt > 0 {
                        debug!(addr, retries = attempt, "dial succeeded after retries");
                    }
                    return Ok(conn);
                }
                Err(e) => e,
            };

            if attempt >= self.max_retries || !is_retriable(&err) {
                if attempt > 0 {
                    warn!(addr, retries = attempt, error = %err, "dial failed after retries");
                }
                return Err(err);
            }

            attempt += 1;
            let delay = self.calculate_delay(attempt);
            debug!(addr, attempt, ?delay, error = %err, "retrying dial");
            ctx.run(async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }
    }
}

/// Only failures of the path itself are worth another attempt.
pub fn is_retriable(err: &DialError) -> bool {
    !(err.is_config() || err.is_cancellation())
}
