//! Notifier Errors

/// Errors returned by `Notifier` operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// The caller's token fired before the operation finished.
    #[error("notification cancelled")]
    Cancelled,
}

/// Result alias for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
