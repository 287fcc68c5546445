//! Dial context: an optional deadline plus an optional cancellation signal.
//!
//! 拨号上下文：可选的截止时间与可选的取消信号。
//!
//! A `DialContext` only bounds how long a caller is willing to *wait* for a
//! connection. It never governs the lifetime of the connection handed back.

use crate::dialer::DialError;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct DialContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl DialContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach a deadline. An earlier deadline already present wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing <= deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Attach a deadline `timeout` from now. A timeout too large to
    /// represent as an instant leaves the context without a new deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self,
        }
    }

    /// Attach a cancellation signal. Cancelling `token` (or any parent of it)
    /// ends every wait on this context.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// Non-blocking check: the error this context has already settled on, if any.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn err(&self) -> Option<DialError> {
        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Some(DialError::Canceled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(DialError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolve once the context is done, yielding the reason.
    ///
    /// A background context never resolves.
    pub async fn done(&self) -> DialError {
        if let Some(e) = self.err() {
            return e;
        }
        match (&self.cancel, self.deadline) {
            (Some(token), Some(deadline)) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => DialError::Canceled,
                    _ = sleep_until(deadline) => DialError::DeadlineExceeded,
                }
            }
            (Some(token), None) => {
                token.cancelled().await;
                DialError::Canceled
            }
            (None, Some(deadline)) => {
                sleep_until(deadline).await;
                DialError::DeadlineExceeded
            }
            (None, None) => std::future::pending().await,
        }
    }

    /// Race `fut` against this context. When the context finishes first,
    /// `fut` is dropped and the context error is returned.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DialError>
    where
        F: Future<Output = Result<T, DialError>>,
    {
        if let Some(e) = self.err() {
            return Err(e);
        }
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            out = fut => out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn earliest_deadline_wins() {
        let now = Instant::now();
        let ctx = DialContext::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(5));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_fires() {
        let ctx = DialContext::background().with_timeout(Duration::from_millis(50));
        assert!(ctx.err().is_none());
        assert!(matches!(ctx.done().await, DialError::DeadlineExceeded));
        assert!(matches!(ctx.err(), Some(DialError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn huge_timeout_means_no_deadline() {
        let ctx = DialContext::background().with_timeout(Duration::MAX);
        assert!(ctx.err().is_none());
        assert!(ctx.deadline().is_none());

        let now = Instant::now();
        let ctx = DialContext::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_timeout(Duration::MAX);
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn cancellation_beats_deadline() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = DialContext::background()
            .with_timeout(Duration::ZERO)
            .with_cancellation(token);
        assert!(matches!(ctx.err(), Some(DialError::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn run_drops_slow_future() {
        let token = CancellationToken::new();
        let ctx = DialContext::background().with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let out: Result<(), DialError> = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;
        assert!(matches!(out, Err(DialError::Canceled)));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn background_run_passes_through() {
        let ctx = DialContext::background();
        let out = ctx.run(async { Ok::<_, DialError>(7) }).await.unwrap();
        assert_eq!(out, 7);
    }
}
