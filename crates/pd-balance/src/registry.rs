//! Strategy registry / 策略注册表
//!
//! Maps a strategy name to a constructor `(ordered dialers) -> dialer`.
//! The registry is a plain value owned by whoever composes the dialers;
//! there is no process global, so tests build isolated registries.

use crate::error::BalanceError;
use parking_lot::RwLock;
use pd_transport::SharedDialer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const RANDOM: &str = "random";
pub const ROUND_ROBIN: &str = "roundrobin";
pub const FAILOVER: &str = "failover";

/// Constructor for a composed dialer. Must reject an empty list.
pub type Strategy =
    Arc<dyn Fn(Vec<SharedDialer>) -> Result<SharedDialer, BalanceError> + Send + Sync>;

#[derive(Default)]
pub struct StrategyRegistry {
    strategies: RwLock<HashMap<String, Strategy>>,
}

impl StrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `random`, `roundrobin` and `failover`.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_strategy(RANDOM, crate::random::strategy());
        registry.register_strategy(ROUND_ROBIN, crate::round_robin::strategy());
        registry.register_strategy(FAILOVER, crate::failover::strategy());
        registry
    }

    /// Register a constructor closure, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<SharedDialer>) -> Result<SharedDialer, BalanceError> + Send + Sync + 'static,
    {
        self.register_strategy(name, Arc::new(f));
    }

    /// Register a strategy, replacing any previous one under the same name.
    pub fn register_strategy(&self, name: impl Into<String>, strategy: Strategy) {
        let name = name.into();
        let replaced = self
            .strategies
            .write()
            .insert(name.clone(), strategy)
            .is_some();
        debug!(strategy = %name, replaced, "strategy registered");
    }

    pub fn lookup(&self, name: &str) -> Option<Strategy> {
        self.strategies.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look `name` up and compose `dialers` with it.
    pub fn build(
        &self,
        name: &str,
        dialers: Vec<SharedDialer>,
    ) -> Result<SharedDialer, BalanceError> {
        // Clone out so the constructor runs without the lock held.
        let strategy = self
            .lookup(name)
            .ok_or_else(|| BalanceError::UnknownStrategy(name.to_string()))?;
        strategy(dialers)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}
