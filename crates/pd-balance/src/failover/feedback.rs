use parking_lot::Mutex;
use std::sync::Arc;

/// Sink for connection outcomes, keyed by candidate index.
pub trait SelectorFeedback {
    fn record_success(&mut self, candidate: usize);
    fn record_failure(&mut self, candidate: usize);
}

/// Cloneable handle that reports outcomes of one candidate to its group.
///
/// Holding a handle keeps the group's state alive, so a connection may
/// outlive the dialer that produced it.
#[derive(Clone)]
pub struct FeedbackHandle {
    inner: Arc<Mutex<dyn SelectorFeedback + Send + Sync>>,
    candidate: usize,
}

impl FeedbackHandle {
    pub fn new(inner: Arc<Mutex<dyn SelectorFeedback + Send + Sync>>, candidate: usize) -> Self {
        Self { inner, candidate }
    }

    pub fn candidate(&self) -> usize {
        self.candidate
    }

    pub fn success(&self) {
        self.inner.lock().record_success(self.candidate);
    }

    pub fn failure(&self) {
        self.inner.lock().record_failure(self.candidate);
    }
}

impl std::fmt::Debug for FeedbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackHandle")
            .field("candidate", &self.candidate)
            .finish_non_exhaustive()
    }
}
