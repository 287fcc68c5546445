//! Balancer configuration / 负载均衡配置
//!
//! `BalanceConfig` is the serde-facing description of one composed dialer:
//! which strategy to use and, for `failover`, its tuning knobs.
//!
//! ```json
//! { "strategy": "failover", "failover": { "max_score": 64, "max_streak": 9 } }
//! ```
//!
//! ## Environment / 环境变量
//! - `PD_FAILOVER_MAX_SCORE`: score ceiling (default: 64)
//! - `PD_FAILOVER_MAX_STREAK`: streak bound (default: 9)

use crate::error::BalanceError;
use crate::failover::FailoverDialer;
use crate::registry::{StrategyRegistry, FAILOVER};
use pd_transport::SharedDialer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_MAX_SCORE: u32 = 64;
pub const DEFAULT_MAX_STREAK: u32 = 9;

/// Largest streak whose Fibonacci step still fits comfortably in an `i64`.
const STREAK_LIMIT: u32 = 90;

fn default_max_score() -> u32 {
    DEFAULT_MAX_SCORE
}

fn default_max_streak() -> u32 {
    DEFAULT_MAX_STREAK
}

fn default_strategy() -> String {
    FAILOVER.to_string()
}

/// Failover scoring parameters / 故障转移评分参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Score ceiling. Candidates start at `max_score / 2`.
    #[serde(default = "default_max_score")]
    pub max_score: u32,
    /// Bound on consecutive successes or failures counted towards a step.
    #[serde(default = "default_max_streak")]
    pub max_streak: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_score: DEFAULT_MAX_SCORE,
            max_streak: DEFAULT_MAX_STREAK,
        }
    }
}

impl FailoverConfig {
    /// Load from `PD_FAILOVER_*`, falling back to defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        let max_score = std::env::var("PD_FAILOVER_MAX_SCORE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SCORE);
        let max_streak = std::env::var("PD_FAILOVER_MAX_STREAK")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_STREAK);

        debug!(max_score, max_streak, "failover config loaded from env");
        Self {
            max_score,
            max_streak,
        }
    }

    pub fn validate(&self) -> Result<(), BalanceError> {
        if self.max_score < 2 {
            return Err(BalanceError::InvalidConfig(format!(
                "max_score must be at least 2, got {}",
                self.max_score
            )));
        }
        if self.max_streak == 0 || self.max_streak > STREAK_LIMIT {
            return Err(BalanceError::InvalidConfig(format!(
                "max_streak must be within 1..={STREAK_LIMIT}, got {}",
                self.max_streak
            )));
        }
        Ok(())
    }

    pub fn mid_score(&self) -> u32 {
        self.max_score / 2
    }
}

/// One composed dialer, as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default)]
    pub failover: FailoverConfig,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            failover: FailoverConfig::default(),
        }
    }
}

impl BalanceConfig {
    /// Build the configured strategy over `dialers`.
    ///
    /// `failover` is built directly so the tuning above applies; every other
    /// name is resolved through `registry`.
    pub fn build(
        &self,
        registry: &StrategyRegistry,
        dialers: Vec<SharedDialer>,
    ) -> Result<SharedDialer, BalanceError> {
        self.failover.validate()?;
        if self.strategy == FAILOVER {
            let dialer = FailoverDialer::with_config(dialers, &self.failover)?;
            return Ok(Arc::new(dialer));
        }
        registry.build(&self.strategy, dialers)
    }
}
