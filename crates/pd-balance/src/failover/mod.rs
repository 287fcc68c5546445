//! # Adaptive failover / 自适应故障转移
//!
//! Every candidate carries a score in `[0, max_score]`, starting at the
//! midpoint. Each dial goes to the best-scored candidate (ties go to the
//! one listed first). Outcomes move the score by a Fibonacci step that grows
//! with the current success or failure streak, so a candidate that keeps
//! failing is abandoned quickly and one that keeps working gains a lead
//! quickly.
//!
//! Positive feedback is deferred to the connection: a handshake alone
//! proves little, so a success is only recorded once the connection yields
//! data (see [`ObservedConn`]). A failed dial is recorded immediately.
//!
//! When every candidate drifts strictly below, or strictly above, the
//! midpoint, all scores are shifted so their mean returns to the midpoint.
//! Scores therefore never saturate as a group and a recovering candidate
//! can always win again.
//!
//! ## Concurrency / 并发
//! Selection and feedback share one mutex. The lock is never held across
//! a dial.

mod candidate;
mod feedback;
mod heap;
mod observe;
mod state;

pub use candidate::fibonacci;
pub use feedback::{FeedbackHandle, SelectorFeedback};
pub use observe::ObservedConn;
pub use state::{CandidateStats, FailoverSnapshot};

use crate::config::FailoverConfig;
use crate::error::BalanceError;
use crate::registry::{Strategy, FAILOVER};
use async_trait::async_trait;
use parking_lot::Mutex;
use pd_transport::{
    dial_safely, ContextDialer, DialContext, DialError, Dialer, IoStream, Network, SharedDialer,
};
use state::FailoverState;
use std::sync::Arc;
use tracing::debug;

/// Failover dialer / 故障转移拨号器
///
/// Prefers whichever candidate has recently worked best. The returned
/// connections report back to the group for as long as they live.
#[derive(Clone)]
pub struct FailoverDialer {
    state: Arc<Mutex<FailoverState>>,
}

impl FailoverDialer {
    /// Build with default tuning. Fails on an empty list.
    pub fn new(dialers: Vec<SharedDialer>) -> Result<Self, BalanceError> {
        Self::with_config(dialers, &FailoverConfig::default())
    }

    pub fn with_config(
        dialers: Vec<SharedDialer>,
        cfg: &FailoverConfig,
    ) -> Result<Self, BalanceError> {
        cfg.validate()?;
        if dialers.is_empty() {
            return Err(BalanceError::NoDialers { strategy: FAILOVER });
        }
        debug!(
            candidates = dialers.len(),
            max_score = cfg.max_score,
            max_streak = cfg.max_streak,
            "failover group created"
        );
        Ok(Self {
            state: Arc::new(Mutex::new(FailoverState::new(dialers, cfg))),
        })
    }

    /// Index of the candidate the next dial would use.
    pub fn current(&self) -> usize {
        self.state.lock().select().0
    }

    pub fn snapshot(&self) -> FailoverSnapshot {
        self.state.lock().snapshot()
    }

    /// Feed an outcome observed outside this dialer, e.g. by an
    /// application-level health check. Unknown indices are ignored.
    pub fn record_outcome(&self, candidate: usize, success: bool) {
        self.state.lock().fix(candidate, success);
    }

    fn feedback(&self, candidate: usize) -> FeedbackHandle {
        let inner: Arc<Mutex<dyn SelectorFeedback + Send + Sync>> = self.state.clone();
        FeedbackHandle::new(inner, candidate)
    }

    fn select(&self) -> (usize, SharedDialer) {
        let guard = self.state.lock();
        let (idx, dialer) = guard.select();
        debug!(candidate = idx, score = guard.score(idx), "failover selected");
        (idx, dialer)
    }

    fn settle(
        &self,
        idx: usize,
        network: Network,
        addr: &str,
        res: Result<IoStream, DialError>,
    ) -> Result<IoStream, DialError> {
        match res {
            Ok(conn) => Ok(Box::new(ObservedConn::new(conn, self.feedback(idx)))),
            Err(e) => {
                debug!(candidate = idx, %network, addr, error = %e, "failover candidate dial failed");
                self.state.lock().fix(idx, false);
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for FailoverDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverDialer")
            .field("state", &self.snapshot())
            .finish()
    }
}

impl Dialer for FailoverDialer {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        let (idx, dialer) = self.select();
        let res = dialer.dial(network, addr);
        self.settle(idx, network, addr, res)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for FailoverDialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        let (idx, dialer) = self.select();
        let res = dial_safely(ctx, &dialer, network, addr).await;
        self.settle(idx, network, addr, res)
    }
}

/// Registry entry for `failover` with the given tuning.
pub fn strategy_with(cfg: FailoverConfig) -> Strategy {
    Arc::new(move |dialers: Vec<SharedDialer>| -> Result<SharedDialer, BalanceError> {
        let d = FailoverDialer::with_config(dialers, &cfg)?;
        Ok(Arc::new(d) as SharedDialer)
    })
}

/// Registry entry for `failover` with default tuning.
pub fn strategy() -> Strategy {
    strategy_with(FailoverConfig::default())
}
