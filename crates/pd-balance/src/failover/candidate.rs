use pd_transport::SharedDialer;
use std::cmp::Ordering;

/// One scored dialer inside a failover group.
pub(crate) struct Candidate {
    pub dialer: SharedDialer,
    /// Input position; fixed for life, used only to break score ties.
    pub seq: usize,
    /// Always within `[0, max_score]`.
    pub score: i64,
    /// Consecutive successes (> 0) or failures (< 0), bounded by `max_streak`.
    pub streak: i32,
    /// Back-pointer into the heap order, maintained by `CandidateHeap`.
    pub heap_pos: usize,
}

impl Candidate {
    pub fn new(dialer: SharedDialer, seq: usize, score: i64) -> Self {
        Self {
            dialer,
            seq,
            score,
            streak: 0,
            heap_pos: seq,
        }
    }

    /// Total order over candidates. `Less` means `self` ranks first.
    ///
    /// Higher score first; equal scores fall back to ascending `seq`, so no
    /// two distinct candidates ever compare equal.
    pub fn rank(&self, other: &Candidate) -> Ordering {
        match self.score - other.score {
            0 => self.seq.cmp(&other.seq),
            d if d > 0 => Ordering::Less,
            _ => Ordering::Greater,
        }
    }

    pub fn outranks(&self, other: &Candidate) -> bool {
        self.rank(other) == Ordering::Less
    }

    pub fn succeed(&mut self, max_score: i64, max_streak: i32) {
        if self.score == max_score {
            return;
        }
        if self.streak < 0 {
            self.streak = 0;
        }
        if self.streak < max_streak {
            self.streak += 1;
        }
        self.score = self
            .score
            .saturating_add(fibonacci(self.streak))
            .min(max_score);
    }

    pub fn fail(&mut self, max_streak: i32) {
        if self.score == 0 {
            return;
        }
        if self.streak > 0 {
            self.streak = 0;
        }
        if self.streak > -max_streak {
            self.streak -= 1;
        }
        self.score = self.score.saturating_sub(fibonacci(-self.streak)).max(0);
    }
}

/// The n-th Fibonacci number (1, 1, 2, 3, 5, ...); 0 for `n <= 0`.
pub fn fibonacci(n: i32) -> i64 {
    let (mut a, mut b) = (0i64, 1i64);
    for _ in 0..n.max(0) {
        (a, b) = (b, a.saturating_add(b));
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use pd_transport::mem::PipeDialer;
    use std::sync::Arc;

    fn candidate(seq: usize, score: i64) -> Candidate {
        let (d, _) = PipeDialer::new_pair();
        Candidate::new(Arc::new(d), seq, score)
    }

    #[test]
    fn fibonacci_sequence() {
        let got: Vec<i64> = (-2..=10).map(fibonacci).collect();
        assert_eq!(got, vec![0, 0, 0, 1, 1, 2, 3, 5, 8, 13, 21, 34, 55]);
    }

    #[test]
    fn success_streak_accelerates_then_saturates() {
        let mut c = candidate(0, 0);
        let mut deltas = Vec::new();
        for _ in 0..6 {
            let before = c.score;
            c.succeed(1_000, 4);
            deltas.push(c.score - before);
        }
        // streak capped at 4 => fib(4) = 3 per step once saturated
        assert_eq!(deltas, vec![1, 1, 2, 3, 3, 3]);
        assert_eq!(c.streak, 4);
    }

    #[test]
    fn failure_resets_positive_streak() {
        let mut c = candidate(0, 32);
        c.succeed(64, 9);
        c.succeed(64, 9);
        assert_eq!((c.score, c.streak), (34, 2));
        c.fail(9);
        assert_eq!((c.score, c.streak), (33, -1));
        c.fail(9);
        assert_eq!((c.score, c.streak), (32, -2));
        c.fail(9);
        assert_eq!((c.score, c.streak), (30, -3));
    }

    #[test]
    fn score_is_clamped_and_limits_are_no_ops() {
        let mut c = candidate(0, 63);
        c.streak = 5;
        c.succeed(64, 9);
        assert_eq!((c.score, c.streak), (64, 6));
        c.succeed(64, 9);
        assert_eq!((c.score, c.streak), (64, 6), "no-op at max");

        let mut c = candidate(0, 1);
        c.streak = -5;
        c.fail(9);
        assert_eq!((c.score, c.streak), (0, -6));
        c.fail(9);
        assert_eq!((c.score, c.streak), (0, -6), "no-op at zero");
    }

    #[test]
    fn rank_breaks_ties_by_sequence() {
        let a = candidate(0, 10);
        let b = candidate(1, 10);
        let c = candidate(2, 11);
        assert!(a.outranks(&b));
        assert!(!b.outranks(&a));
        assert!(c.outranks(&a) && c.outranks(&b));
        assert_eq!(a.rank(&a), Ordering::Equal);
    }
}
