//! OpContext - Cancellation and Deadline for Storage Calls
//!
//! Every `Storage` operation receives an `OpContext`. Backends check it at
//! cooperative checkpoints (`checkpoint`) and race awaited I/O against it
//! (`run`). Work already handed to the database is not killed: a dropped
//! sqlx transaction rolls back on its own.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::storage::{StorageError, StorageResult};

/// Cancellation signal plus optional deadline for one logical operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by an externally owned token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Same cancellation source, with a deadline `timeout` from now.
    ///
    /// An earlier existing deadline is kept.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Same cancellation source, with an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Child context: cancelled with its parent, cancellable on its own.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context (and its children).
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fail fast if the context has ended.
    pub fn checkpoint(&self) -> StorageResult<()> {
        if self.token.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StorageError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it completes or the context ends, whichever is first.
    pub async fn run<T, F>(&self, fut: F) -> StorageResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        self.checkpoint()?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(StorageError::Cancelled),
            () = deadline => Err(StorageError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ErrorKind;

    #[tokio::test]
    async fn test_background_runs_to_completion() {
        let cx = OpContext::background();

        let value = cx.run(async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert!(cx.checkpoint().is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_checkpoint() {
        let cx = OpContext::background();
        cx.cancel();

        let err = cx.checkpoint().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let err = cx.run(async { Ok(()) }).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_work() {
        let token = CancellationToken::new();
        let cx = OpContext::with_token(token.clone());

        let handle = tokio::spawn(async move {
            cx.run(async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await
        });
        tokio::task::yield_now().await;
        token.cancel();

        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let cx = OpContext::background().with_timeout(Duration::from_millis(50));

        let err = cx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(cx.checkpoint().unwrap_err().kind(), ErrorKind::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_child_follows_parent() {
        let parent = OpContext::background();
        let child = parent.child();

        child.cancel();
        assert!(parent.checkpoint().is_ok());

        let other = parent.child();
        parent.cancel();
        assert_eq!(other.checkpoint().unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn test_earlier_deadline_wins() {
        let now = Instant::now();
        let cx = OpContext::background()
            .with_deadline(now + Duration::from_secs(1))
            .with_deadline(now + Duration::from_secs(60));

        assert_eq!(cx.deadline(), Some(now + Duration::from_secs(1)));
    }
}
