//! Notify - Per-Post Live Update Fan-out
//!
//! TigerStyle: Process-local pub/sub, subscription lifetime bound to a
//! cancellation token.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TopicNotifier<M>                        │
//! │  RwLock<HashMap<post id, HashMap<subscriber, entry>>>        │
//! └─────────────────────────────────────────────────────────────┘
//!      subscribe ──► write lock, insert, spawn cleanup watcher
//!      publish   ──► read lock, snapshot senders, unlock, send
//!      watcher   ──► token fired ─► write lock, remove once
//! ```

mod error;
mod topic;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use error::{NotifyError, NotifyResult};
pub use topic::{Subscription, TopicNotifier};

/// Publish/subscribe keyed by post id.
#[async_trait]
pub trait Notifier<M: Send + 'static>: Send + Sync {
    /// Register a stream on `topic` that lives until `token` is cancelled
    /// or the returned `Subscription` is dropped.
    async fn subscribe(
        &self,
        token: &CancellationToken,
        topic: Uuid,
    ) -> NotifyResult<Subscription<M>>;

    /// Deliver `message` to every live subscriber of `topic`.
    ///
    /// No subscribers is `Ok`. Returns `NotifyError::Cancelled` if `token`
    /// fires while a subscriber is still full; earlier deliveries stand.
    async fn publish(&self, token: &CancellationToken, topic: Uuid, message: M)
        -> NotifyResult<()>;
}
