//! Bounded retry for transport calls
//!
//! Wraps a single asynchronous network operation with retry-on-predicate and
//! a fixed delay between attempts. Failures the predicate does not match
//! propagate immediately; exhausting the attempt budget propagates the last
//! failure.

use std::future::Future;
use std::time::Duration;

use beacon_common::{Error, Result};
use tokio::time::sleep;
use tracing::warn;

const TRANSPORT_MAX_ATTEMPTS: u32 = 5;
const TRANSPORT_DELAY: Duration = Duration::from_secs(2);

const ITEM_FINISH_MAX_ATTEMPTS: u32 = 10;
const ITEM_FINISH_DELAY: Duration = Duration::from_secs(10);

fn transport_only(error: &Error) -> bool {
    error.is_transport()
}

fn transport_or_finish_not_allowed(error: &Error) -> bool {
    error.is_transport() || error.is_finish_not_allowed()
}

/// Retry policy: which failures to retry, how many total attempts, and the
/// fixed delay between them
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    retry_on: fn(&Error) -> bool,
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(retry_on: fn(&Error) -> bool, max_attempts: u32, delay: Duration) -> Self {
        Self {
            retry_on,
            max_attempts,
            delay,
        }
    }

    /// Policy for create/finish-launch and create-item calls: retries
    /// connection-level failures only
    pub fn transport() -> Self {
        Self::new(transport_only, TRANSPORT_MAX_ATTEMPTS, TRANSPORT_DELAY)
    }

    /// Policy for finish-item calls: additionally retries the server's
    /// "finish not allowed" rejection, which clears once previously reported
    /// children are durably persisted
    pub fn item_finish() -> Self {
        Self::new(
            transport_or_finish_not_allowed,
            ITEM_FINISH_MAX_ATTEMPTS,
            ITEM_FINISH_DELAY,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds, fails terminally, or the attempt budget is
    /// spent. Each invocation of `op` must issue the same request body.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < self.max_attempts && (self.retry_on)(&error) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "attempt failed, retrying after delay"
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::RejectionKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn finish_not_allowed() -> Error {
        Error::Rejected {
            kind: RejectionKind::FinishNotAllowed,
            message: "pending children".into(),
        }
    }

    /// Runs `op` through `policy` with an injected number of leading
    /// failures, returning (outcome, attempts made).
    async fn run_with_failures(
        policy: RetryPolicy,
        failures: u32,
        error: impl Fn() -> Error,
    ) -> (Result<&'static str>, u32) {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let outcome = policy
            .run(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                let error = if n <= failures { Some(error()) } else { None };
                async move {
                    match error {
                        Some(e) => Err(e),
                        None => Ok("ok"),
                    }
                }
            })
            .await;
        (outcome, attempts.load(Ordering::SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_retries_then_succeeds() {
        let (outcome, attempts) = run_with_failures(RetryPolicy::transport(), 3, || {
            Error::Transport("connection refused".into())
        })
        .await;
        assert_eq!(outcome.unwrap(), "ok");
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_budget_is_five_attempts() {
        let (outcome, attempts) = run_with_failures(RetryPolicy::transport(), 99, || {
            Error::Transport("connection refused".into())
        })
        .await;
        assert!(matches!(outcome, Err(Error::Transport(_))));
        assert_eq!(attempts, 5);
    }

    #[tokio::test]
    async fn test_non_matching_failure_propagates_immediately() {
        let (outcome, attempts) = run_with_failures(RetryPolicy::transport(), 99, || {
            Error::Rejected {
                kind: RejectionKind::AccessDenied,
                message: "bad token".into(),
            }
        })
        .await;
        assert!(matches!(outcome, Err(Error::Rejected { .. })));
        assert_eq!(attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_finish_succeeds_on_tenth_attempt() {
        let (outcome, attempts) =
            run_with_failures(RetryPolicy::item_finish(), 9, finish_not_allowed).await;
        assert_eq!(outcome.unwrap(), "ok");
        assert_eq!(attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_finish_surfaces_rejection_after_budget() {
        let (outcome, attempts) =
            run_with_failures(RetryPolicy::item_finish(), 11, finish_not_allowed).await;
        assert!(matches!(
            outcome,
            Err(Error::Rejected {
                kind: RejectionKind::FinishNotAllowed,
                ..
            })
        ));
        assert_eq!(attempts, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_finish_also_retries_transport_failures() {
        let (outcome, attempts) = run_with_failures(RetryPolicy::item_finish(), 2, || {
            Error::Transport("broken pipe".into())
        })
        .await;
        assert_eq!(outcome.unwrap(), "ok");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_custom_policy_single_attempt() {
        let policy = RetryPolicy::new(|_| false, 1, Duration::ZERO);
        let (outcome, attempts) =
            run_with_failures(policy, 1, || Error::Transport("nope".into())).await;
        assert!(outcome.is_err());
        assert_eq!(attempts, 1);
    }
}
