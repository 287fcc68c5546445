use crate::error::BalanceError;
use crate::registry::{Strategy, RANDOM};
use async_trait::async_trait;
use pd_transport::{
    dial_safely, ContextDialer, DialContext, DialError, Dialer, IoStream, Network, SharedDialer,
};
use rand::Rng;
use std::sync::Arc;
use tracing::trace;

/// Random dialer / 随机拨号器
///
/// Each dial goes to a candidate picked uniformly at random.
pub struct RandomDialer {
    dialers: Vec<SharedDialer>,
}

impl RandomDialer {
    pub fn new(dialers: Vec<SharedDialer>) -> Result<Self, BalanceError> {
        if dialers.is_empty() {
            return Err(BalanceError::NoDialers { strategy: RANDOM });
        }
        Ok(Self { dialers })
    }

    pub fn len(&self) -> usize {
        self.dialers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dialers.is_empty()
    }

    fn pick(&self) -> (usize, &SharedDialer) {
        let idx = rand::thread_rng().gen_range(0..self.dialers.len());
        trace!(candidate = idx, "random selected");
        (idx, &self.dialers[idx])
    }
}

impl Dialer for RandomDialer {
    fn dial(&self, network: Network, addr: &str) -> Result<IoStream, DialError> {
        let (_, d) = self.pick();
        d.dial(network, addr)
    }

    fn as_context_dialer(&self) -> Option<&dyn ContextDialer> {
        Some(self)
    }
}

#[async_trait]
impl ContextDialer for RandomDialer {
    async fn dial_context(
        &self,
        ctx: &DialContext,
        network: Network,
        addr: &str,
    ) -> Result<IoStream, DialError> {
        let (_, d) = self.pick();
        dial_safely(ctx, d, network, addr).await
    }
}

pub fn strategy() -> Strategy {
    Arc::new(|dialers: Vec<SharedDialer>| -> Result<SharedDialer, BalanceError> {
        Ok(Arc::new(RandomDialer::new(dialers)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_transport::mem::PipeDialer;

    #[test]
    fn picks_stay_in_range_and_cover_all() {
        let dialers: Vec<SharedDialer> = (0..4)
            .map(|_| {
                let (d, _) = PipeDialer::new_pair();
                Arc::new(d) as SharedDialer
            })
            .collect();
        let r = RandomDialer::new(dialers).unwrap();
        let mut seen = [0usize; 4];
        for _ in 0..1_000 {
            let (idx, _) = r.pick();
            seen[idx] += 1;
        }
        assert!(seen.iter().all(|&n| n > 0), "{seen:?}");
    }

    #[test]
    fn empty_list_is_rejected() {
        assert!(matches!(
            RandomDialer::new(Vec::new()),
            Err(BalanceError::NoDialers { strategy: "random" })
        ));
    }
}
