use super::candidate::Candidate;
use super::feedback::SelectorFeedback;
use super::heap::CandidateHeap;
use crate::config::FailoverConfig;
use pd_transport::SharedDialer;
use tracing::{trace, warn};

/// Point-in-time view of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateStats {
    /// Position in the list the group was built from.
    pub index: usize,
    pub score: i64,
    pub streak: i32,
}

/// Point-in-time view of a whole failover group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverSnapshot {
    /// Index of the candidate the next dial will use.
    pub current: usize,
    /// In input order.
    pub candidates: Vec<CandidateStats>,
    pub below_mid: usize,
    pub above_mid: usize,
    pub max_score: i64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Below,
    Mid,
    Above,
}

/// Scores, streaks and ordering of a failover group. Always used under
/// the group's mutex.
pub(crate) struct FailoverState {
    heap: CandidateHeap,
    below_mid: usize,
    above_mid: usize,
    max_score: i64,
    max_streak: i32,
}

impl FailoverState {
    /// Callers validate `cfg` and reject an empty `dialers` first.
    pub fn new(dialers: Vec<SharedDialer>, cfg: &FailoverConfig) -> Self {
        let mid = i64::from(cfg.mid_score());
        let arena = dialers
            .into_iter()
            .enumerate()
            .map(|(seq, d)| Candidate::new(d, seq, mid))
            .collect();
        Self {
            heap: CandidateHeap::new(arena),
            below_mid: 0,
            above_mid: 0,
            max_score: i64::from(cfg.max_score),
            max_streak: cfg.max_streak.min(i32::MAX as u32) as i32,
        }
    }

    fn mid(&self) -> i64 {
        self.max_score / 2
    }

    fn bucket(&self, score: i64) -> Bucket {
        match score.cmp(&self.mid()) {
            std::cmp::Ordering::Less => Bucket::Below,
            std::cmp::Ordering::Equal => Bucket::Mid,
            std::cmp::Ordering::Greater => Bucket::Above,
        }
    }

    /// Top of the order: index and dialer of the best candidate.
    pub fn select(&self) -> (usize, SharedDialer) {
        let idx = self.heap.top();
        (idx, self.heap.get(idx).dialer.clone())
    }

    pub fn score(&self, idx: usize) -> i64 {
        self.heap.get(idx).score
    }

    /// Apply one outcome to candidate `idx`.
    pub fn fix(&mut self, idx: usize, success: bool) {
        if idx >= self.heap.len() {
            return;
        }
        let (max_score, max_streak) = (self.max_score, self.max_streak);
        let old = self.heap.get(idx).score;
        let cand = self.heap.get_mut(idx);
        if success {
            cand.succeed(max_score, max_streak);
        } else {
            cand.fail(max_streak);
        }
        let new = cand.score;
        trace!(
            candidate = idx,
            success,
            old,
            new,
            streak = cand.streak,
            "failover feedback"
        );
        #[cfg(feature = "metrics")]
        metrics::counter!(
            "failover_feedback_total",
            "result" => if success { "success" } else { "failure" }
        )
        .increment(1);

        if new == old {
            return;
        }
        self.score_changed(idx, old, new);
        self.heap.fix(idx);

        if self.needs_rebalance() {
            self.rebalance();
        }
    }

    fn score_changed(&mut self, idx: usize, old: i64, new: i64) {
        match self.bucket(old) {
            Bucket::Below => self.below_mid -= 1,
            Bucket::Above => self.above_mid -= 1,
            Bucket::Mid => {}
        }
        match self.bucket(new) {
            Bucket::Below => self.below_mid += 1,
            Bucket::Above => self.above_mid += 1,
            Bucket::Mid => {}
        }
        #[cfg(feature = "metrics")]
        metrics::gauge!("failover_score", "candidate" => idx.to_string()).set(new as f64);
        #[cfg(not(feature = "metrics"))]
        let _ = idx;
    }

    fn needs_rebalance(&self) -> bool {
        let n = self.heap.len();
        self.below_mid == n || self.above_mid == n
    }

    /// Shift every score by the distance between the mean and the midpoint.
    ///
    /// Afterwards the mean sits at the midpoint, so not all candidates can
    /// remain strictly on one side of it.
    fn rebalance(&mut self) {
        let n = self.heap.len() as i64;
        let total: i64 = self.heap.iter().map(|c| c.score).sum();
        let offset = self.mid() - total.div_euclid(n);
        warn!(
            candidates = n,
            below_mid = self.below_mid,
            above_mid = self.above_mid,
            offset,
            "failover scores drifted to one side, rebalancing"
        );
        #[cfg(feature = "metrics")]
        metrics::counter!("failover_rebalance_total").increment(1);

        for idx in 0..self.heap.len() {
            let old = self.heap.get(idx).score;
            let new = (old + offset).clamp(0, self.max_score);
            if new == old {
                continue;
            }
            self.heap.get_mut(idx).score = new;
            self.score_changed(idx, old, new);
            self.heap.fix(idx);
        }
    }

    pub fn snapshot(&self) -> FailoverSnapshot {
        FailoverSnapshot {
            current: self.heap.top(),
            candidates: self
                .heap
                .iter()
                .map(|c| CandidateStats {
                    index: c.seq,
                    score: c.score,
                    streak: c.streak,
                })
                .collect(),
            below_mid: self.below_mid,
            above_mid: self.above_mid,
            max_score: self.max_score,
        }
    }
}

impl SelectorFeedback for FailoverState {
    fn record_success(&mut self, candidate: usize) {
        self.fix(candidate, true);
    }

    fn record_failure(&mut self, candidate: usize) {
        self.fix(candidate, false);
    }
}
