//! # pd-balance: Dialer composition strategies / 拨号器组合策略
//!
//! Composes an ordered list of [`pd_transport::Dialer`]s into one dialer
//! according to a named strategy:
//!
//! - `random`: uniform random pick per dial / 随机
//! - `roundrobin`: strict cyclic order, lock-free cursor / 轮询
//! - `failover`: adaptive scoring that prefers what recently worked, with
//!   feedback taken from the returned connections / 自适应故障转移
//!
//! Strategies are looked up by name in a [`StrategyRegistry`], which callers
//! may extend with their own.
//!
//! ## Features
//! - `metrics`: per-candidate score gauges and feedback/rebalance counters
//!
//! ## Example
//! ```rust,no_run
//! use pd_balance::{BalanceConfig, StrategyRegistry};
//! use pd_transport::{dial_safely, DialContext, DirectDialer, Network, SharedDialer};
//! use std::sync::Arc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = StrategyRegistry::with_builtins();
//!     let upstreams: Vec<SharedDialer> =
//!         vec![Arc::new(DirectDialer::new()), Arc::new(DirectDialer::new())];
//!     let dialer = BalanceConfig::default().build(&registry, upstreams)?;
//!     let _conn = dial_safely(&DialContext::background(), &dialer, Network::Tcp, "example.com:80").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod failover;
pub mod random;
pub mod registry;
pub mod round_robin;

pub use config::{BalanceConfig, FailoverConfig};
pub use error::BalanceError;
pub use failover::{
    CandidateStats, FailoverDialer, FailoverSnapshot, FeedbackHandle, ObservedConn,
    SelectorFeedback,
};
pub use random::RandomDialer;
pub use registry::{Strategy, StrategyRegistry, FAILOVER, RANDOM, ROUND_ROBIN};
pub use round_robin::RoundRobinDialer;
