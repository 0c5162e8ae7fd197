//! Per-request cancellation and deadline.
//!
//! A [`RequestContext`] travels with one create or topology request and is
//! threaded into every backend call. When the caller cancels or the deadline
//! passes, the in-flight call is dropped and the request fails with
//! [`SchedulerError::Cancelled`] or [`SchedulerError::DeadlineExceeded`].
//! Whatever the backend already placed stays placed.

use std::future::Future;
use std::time::Duration;

use strata_backend::BackendResult;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{SchedulerError, SchedulerResult};

/// Caller side of a cancellable [`RequestContext`].
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context plus the handle that cancels it.
    pub fn cancellable() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), Self::background().with_cancellation(rx))
    }

    /// Cancel when `signal` flips to `true` (e.g. a shutdown channel).
    pub fn with_cancellation(mut self, signal: watch::Receiver<bool>) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Tighten the deadline to `deadline` if it is earlier than the current one.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one backend call under this context.
    ///
    /// The outer result reports cancellation or deadline expiry; the inner
    /// one is the backend's own answer.
    pub async fn run<T, F>(&self, call: F) -> SchedulerResult<BackendResult<T>>
    where
        F: Future<Output = BackendResult<T>>,
    {
        if self.is_cancelled() {
            return Err(SchedulerError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SchedulerError::DeadlineExceeded);
        }

        let mut signal = self.cancel.clone();
        let cancelled = async move {
            if let Some(rx) = signal.as_mut() {
                let sender_gone = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if !sender_gone {
                    return;
                }
            }
            std::future::pending::<()>().await
        };

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = call => Ok(result),
            _ = cancelled => Err(SchedulerError::Cancelled),
            _ = expired => Err(SchedulerError::DeadlineExceeded),
        }
    }
}

#[cfg(test)]
mod tests {
    use strata_backend::BackendError;

    use super::*;

    #[tokio::test]
    async fn background_passes_result_through() {
        let ctx = RequestContext::background();
        let out = ctx.run(async { Ok::<_, BackendError>(7) }).await.unwrap();
        assert_eq!(out, Ok(7));

        let out = ctx
            .run(async { Err::<u32, _>(BackendError::Transport("down".into())) })
            .await
            .unwrap();
        assert!(out.is_err());
    }

    #[tokio::test]
    async fn cancelled_context_skips_call() {
        let (handle, ctx) = RequestContext::cancellable();
        handle.cancel();
        assert!(ctx.is_cancelled());

        let mut polled = false;
        let result = ctx
            .run(async {
                polled = true;
                Ok::<_, BackendError>(())
            })
            .await;
        assert!(matches!(result, Err(SchedulerError::Cancelled)));
        assert!(!polled);
    }

    #[tokio::test]
    async fn cancellation_interrupts_in_flight_call() {
        let (handle, ctx) = RequestContext::cancellable();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, BackendError>(())
        };

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });

        let result = ctx.run(slow).await;
        assert!(matches!(result, Err(SchedulerError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_interrupts_in_flight_call() {
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(10));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, BackendError>(())
        };
        let result = ctx.run(slow).await;
        assert!(matches!(result, Err(SchedulerError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn dropped_cancel_handle_never_cancels() {
        let (handle, ctx) = RequestContext::cancellable();
        drop(handle);
        let out = ctx
            .run(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, BackendError>(1)
            })
            .await
            .unwrap();
        assert_eq!(out, Ok(1));
    }

    #[test]
    fn deadline_only_tightens() {
        let now = Instant::now();
        let ctx = RequestContext::background()
            .with_deadline(now + Duration::from_secs(5))
            .with_deadline(now + Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(now + Duration::from_secs(5)));
    }
}
