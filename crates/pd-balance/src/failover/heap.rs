use super::candidate::Candidate;

/// Max-heap of candidates with O(log n) reordering after a score change.
///
/// Candidates live in an arena addressed by their input position; the heap
/// holds arena indices and every candidate records where it currently sits
/// (`heap_pos`), so a single changed entry can be sifted in place.
pub(crate) struct CandidateHeap {
    arena: Vec<Candidate>,
    order: Vec<usize>,
}

impl CandidateHeap {
    pub fn new(arena: Vec<Candidate>) -> Self {
        let order = (0..arena.len()).collect();
        let mut heap = Self { arena, order };
        for pos in 0..heap.order.len() {
            heap.arena[heap.order[pos]].heap_pos = pos;
        }
        for pos in (0..heap.order.len() / 2).rev() {
            heap.sift_down(pos);
        }
        heap
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Arena index of the best-ranked candidate.
    ///
    /// Callers never build an empty heap.
    pub fn top(&self) -> usize {
        self.order[0]
    }

    pub fn get(&self, idx: usize) -> &Candidate {
        &self.arena[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Candidate {
        &mut self.arena[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.arena.iter()
    }

    /// Restore heap order after the candidate at arena index `idx` changed.
    pub fn fix(&mut self, idx: usize) {
        let pos = self.arena[idx].heap_pos;
        if !self.sift_down(pos) {
            self.sift_up(pos);
        }
    }

    fn outranks(&self, a: usize, b: usize) -> bool {
        self.arena[self.order[a]].outranks(&self.arena[self.order[b]])
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.order.swap(a, b);
        self.arena[self.order[a]].heap_pos = a;
        self.arena[self.order[b]].heap_pos = b;
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.outranks(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    /// Returns whether the entry moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let n = self.order.len();
        let mut pos = start;
        loop {
            let left = 2 * pos + 1;
            if left >= n {
                break;
            }
            let mut best = left;
            let right = left + 1;
            if right < n && self.outranks(right, left) {
                best = right;
            }
            if !self.outranks(best, pos) {
                break;
            }
            self.swap(pos, best);
            pos = best;
        }
        pos > start
    }

    #[cfg(test)]
    fn assert_valid(&self) {
        for (pos, &idx) in self.order.iter().enumerate() {
            assert_eq!(self.arena[idx].heap_pos, pos, "back-pointer of {idx}");
            if pos > 0 {
                let parent = (pos - 1) / 2;
                assert!(
                    self.outranks(parent, pos),
                    "parent at {parent} must outrank child at {pos}"
                );
            }
        }
    }
}
