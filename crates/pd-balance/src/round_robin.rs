use crate::error::BalanceError;
use crate::registry::{Strategy, ROUND_ROBIN};
use async_trait::async_trait;
use pd_transport::{
    dial_safely, ContextDialer, DialContext, DialError, Dialer, IoStream, Network, SharedDialer,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Round-robin dialer / 轮询拨号器
///
/// Visits candidates in input order, wrapping around. The cursor is
/// advanced lock-free, so concurrent dials never wait on each other.
pub struct RoundRobinDialer {
    dialers: Vec<SharedDialer>,
    cursor: AtomicUsize,
}

impl RoundRobinDialer {
    pub fn new(dialers: Vec<SharedDialer>) -> Result<Self, BalanceError> {
        if dialers.is_empty() {
            return Err(BalanceError::NoDialers {
                strategy: ROUND_ROBIN,
            });
        }
        Ok(Self {
            dialers,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.dialers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialers.is_empty()
    }

    /// Advance the cursor and return the index it pointed at before.
    fn next_index(&self) -> usize {
        let len = self.dialers.len();
        let mut current = self.cursor.load(Ordering::Relaxed);
        loop {
            let next = (current + 1) % len;
            match self
                .cursor
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }

    fn pick(&self) -> &SharedDialer {
        let idx = self.next_index();
        trace!(candidate = idx, "round-robin selected");
        &self.dialers[idx]
    }
}

impl Dialer for RoundRobinDialer {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        self.pick().dial(network, addr)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for RoundRobinDialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        dial_safely(ctx, self.pick(), network, addr).await
    }
}

pub fn strategy() -> Strategy {
    Arc::new(|dialers: Vec<SharedDialer>| -> Result<SharedDialer, BalanceError> {
        Ok(Arc::new(RoundRobinDialer::new(dialers)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_transport::mem::PipeDialer;
    use std::collections::HashMap;

    fn rr(n: usize) -> RoundRobinDialer {
        let dialers = (0..n)
            .map(|_| {
                let (d, _) = PipeDialer::new_pair();
                Arc::new(d) as SharedDialer
            })
            .collect();
        RoundRobinDialer::new(dialers).unwrap()
    }

    #[test]
    fn sequential_order_is_cyclic() {
        let r = rr(3);
        let got: Vec<usize> = (0..7).map(|_| r.next_index()).collect();
        assert_eq!(got, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn concurrent_advances_are_not_lost() {
        let r = Arc::new(rr(5));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = r.clone();
                std::thread::spawn(move || (0..250).map(|_| r.next_index()).collect::<Vec<_>>())
            })
            .collect();
        let mut counts = HashMap::new();
        for h in handles {
            for idx in h.join().unwrap() {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        // 1000 advances over 5 slots: every slot exactly 200 times
        for idx in 0..5 {
            assert_eq!(counts.get(&idx), Some(&200), "{counts:?}");
        }
    }
}
