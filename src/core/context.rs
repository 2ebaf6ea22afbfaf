//! Cancellation scope for engine invocations.
//!
//! A [`Context`] couples a [`CancellationToken`] with an optional deadline so a
//! caller can tell apart "I gave up" from "time ran out". Clones share the same
//! token, so cancelling any clone cancels them all.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelKind {
    Cancelled,
    DeadlineExceeded,
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("context canceled"),
            Self::DeadlineExceeded => f.write_str("context deadline exceeded"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A scope that only ends when explicitly cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing token, e.g. one cancelled from a signal handler.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Bound the scope by `timeout` from now. An earlier deadline is kept.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// A scope cancelled together with this one, but which can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Non-blocking check. Explicit cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<CancelKind> {
        if self.token.is_cancelled() {
            return Some(CancelKind::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelKind::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the scope ends.
    pub async fn done(&self) -> CancelKind {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelKind::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelKind::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelKind::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_context_is_live() {
        let ctx = Context::new();
        assert_eq!(ctx.err(), None);
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();
        clone.cancel();
        assert_eq!(ctx.err(), Some(CancelKind::Cancelled));
    }

    #[test]
    fn test_child_does_not_cancel_parent() {
        let parent = Context::new();
        let child = parent.child();
        child.cancel();
        assert_eq!(parent.err(), None);
        assert_eq!(child.err(), Some(CancelKind::Cancelled));

        let child = parent.child();
        parent.cancel();
        assert_eq!(child.err(), Some(CancelKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_deadline_exceeded() {
        let ctx = Context::new().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.err(), None);
        assert_eq!(ctx.done().await, CancelKind::DeadlineExceeded);
        assert_eq!(ctx.err(), Some(CancelKind::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_deadline_is_kept() {
        let ctx = Context::new()
            .with_timeout(Duration::from_secs(1))
            .with_timeout(Duration::from_secs(60));
        let started = Instant::now();
        ctx.done().await;
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_done_resolves_on_cancel() {
        let ctx = Context::new().with_timeout(Duration::from_secs(3600));
        let canceller = ctx.clone();
        tokio::spawn(async move { canceller.cancel() });
        assert_eq!(ctx.done().await, CancelKind::Cancelled);
    }

    #[test]
    fn test_done_is_pending_until_cancelled() {
        let ctx = Context::new();
        let mut done = tokio_test::task::spawn(ctx.done());
        tokio_test::assert_pending!(done.poll());
        ctx.cancel();
        assert!(done.is_woken());
        assert_eq!(
            tokio_test::assert_ready!(done.poll()),
            CancelKind::Cancelled
        );
    }
}
