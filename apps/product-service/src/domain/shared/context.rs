//! Per-request execution context.
//!
//! Every store call carries a [`RequestContext`]: an optional deadline and a
//! cancellation token. Work is refused once the context is done, and
//! in-flight work is raced against both signals.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::{CancelReason, CancelledError};

/// Deadline and cancellation signal for a single request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::background()
    }
}

impl RequestContext {
    /// Context with no deadline and a fresh token.
    #[must_use]
    pub fn background() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Context bound to an existing token (typically a child of the shutdown token).
    #[must_use]
    pub const fn with_token(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token,
        }
    }

    /// Set a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Why the context is done, or `None` while it is still live.
    #[must_use]
    pub fn done_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Fail fast if the context is already done.
    pub fn check(&self, operation: &str) -> Result<(), CancelledError> {
        self.done_reason()
            .map_or(Ok(()), |reason| Err(CancelledError::new(operation, reason)))
    }

    /// Run `work` unless the context is done, aborting it if the context
    /// finishes first.
    ///
    /// A store write that is aborted mid-flight may or may not have been
    /// applied; callers must not assume either outcome.
    pub async fn run<T, E, F>(&self, operation: &str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<CancelledError>,
    {
        self.check(operation)?;

        let guarded = async {
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    Err(CancelledError::new(operation, CancelReason::Cancelled).into())
                }
                result = work => result,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, guarded)
                .await
                .unwrap_or_else(|_| {
                    Err(CancelledError::new(operation, CancelReason::DeadlineExceeded).into())
                }),
            None => guarded.await,
        }
    }

    /// Sleep for `duration`, waking early with an error if the context finishes.
    pub async fn sleep(&self, operation: &str, duration: Duration) -> Result<(), CancelledError> {
        self.run(operation, async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn live_context_runs_work() {
        let ctx = RequestContext::background();
        let result: Result<u32, CancelledError> = ctx.run("op", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn cancelled_context_refuses_work() {
        let ctx = RequestContext::background();
        ctx.cancel();

        let mut touched = false;
        let result: Result<(), CancelledError> = ctx
            .run("op", async {
                touched = true;
                Ok(())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.reason, CancelReason::Cancelled);
        assert!(!touched);
    }

    #[tokio::test]
    async fn expired_deadline_refuses_work() {
        let ctx = RequestContext::background().with_deadline(Instant::now());
        let result: Result<(), CancelledError> = ctx.run("op", async { Ok(()) }).await;
        assert_eq!(result.unwrap_err().reason, CancelReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn deadline_interrupts_slow_work() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(20));
        let result: Result<(), CancelledError> = ctx
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert_eq!(result.unwrap_err().reason, CancelReason::DeadlineExceeded);
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_work() {
        let ctx = RequestContext::background();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Result<(), CancelledError> = ctx
            .run("pending", std::future::pending::<Result<(), CancelledError>>())
            .await;
        assert_eq!(result.unwrap_err().reason, CancelReason::Cancelled);
    }

    #[test]
    fn child_token_follows_parent() {
        let parent = CancellationToken::new();
        let ctx = RequestContext::with_token(parent.child_token());
        assert!(ctx.done_reason().is_none());
        parent.cancel();
        assert_eq!(ctx.done_reason(), Some(CancelReason::Cancelled));
    }
}
