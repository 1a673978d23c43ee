//! Storage Errors
//!
//! TigerStyle: "not found" and "bad page" are expected outcomes with their
//! own variants; backend failures keep the message of the operation that
//! failed; a failed rollback carries both errors.

use std::fmt;

use uuid::Uuid;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Post, comment, or parent comment absent
    NotFound,
    /// Non-positive page or page size, or content outside its limits
    InvalidArgument,
    /// The operation context was cancelled
    Cancelled,
    /// The operation context's deadline passed
    DeadlineExceeded,
    /// I/O, connection, or transaction failure
    Backend,
    /// A failed write whose rollback also failed
    Rollback,
}

impl ErrorKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidArgument => "invalid_argument",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::Backend => "backend",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors returned by every `Storage` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Lookup key absent.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What was looked up ("post", "comment", "parent comment")
        entity: &'static str,
        /// The missing identifier
        id: Uuid,
    },

    /// Caller supplied an out-of-range argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation context cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Could not reach the backend.
    #[error("connection error: {0}")]
    Connection(String),

    /// A read query failed.
    #[error("read error: {0}")]
    Read(String),

    /// A write statement or commit failed.
    #[error("write error: {0}")]
    Write(String),

    /// Row decoding or schema problems.
    #[error("internal error: {0}")]
    Internal(String),

    /// A write failed and rolling it back failed too.
    #[error("rollback failed: {rollback} (after: {original})")]
    Rollback {
        /// The error that triggered the rollback
        original: Box<StorageError>,
        /// Why the rollback itself failed
        rollback: String,
    },
}

impl StorageError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Connection(_) | Self::Read(_) | Self::Write(_) | Self::Internal(_) => {
                ErrorKind::Backend
            }
            Self::Rollback { .. } => ErrorKind::Rollback,
        }
    }

    /// True for the expected "no such key" outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Missing post.
    #[must_use]
    pub fn post_not_found(id: Uuid) -> Self {
        Self::NotFound { entity: "post", id }
    }

    /// Missing comment.
    #[must_use]
    pub fn comment_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "comment",
            id,
        }
    }

    /// Missing parent for a reply.
    #[must_use]
    pub fn parent_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: "parent comment",
            id,
        }
    }

    /// Invalid argument with message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Connection error with message.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Read error with message.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Write error with message.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write(message.into())
    }

    /// Internal error with message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap `self` with the failure of the rollback it triggered.
    #[must_use]
    pub fn with_rollback_failure(self, rollback: impl Into<String>) -> Self {
        Self::Rollback {
            original: Box::new(self),
            rollback: rollback.into(),
        }
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Tests
// =============================================================================
