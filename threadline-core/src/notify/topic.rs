//! TopicNotifier - In-Process Notifier
//!
//! Each subscription owns a bounded mpsc channel. Removing the registry
//! entry drops the last long-lived sender, so the receiver ends.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Span;
use uuid::Uuid;

use super::error::{NotifyError, NotifyResult};
use super::Notifier;
use crate::constants::SUBSCRIPTION_BUFFER_COUNT;

struct Entry<M> {
    sender: mpsc::Sender<M>,
    token: CancellationToken,
}

type Registry<M> = HashMap<Uuid, HashMap<u64, Entry<M>>>;

/// Receive side of one subscription.
///
/// Yields messages until the subscription is cancelled, then ends. Dropping
/// it cancels the subscription.
pub struct Subscription<M> {
    id: u64,
    topic: Uuid,
    receiver: mpsc::Receiver<M>,
    _guard: DropGuard,
}

impl<M> Subscription<M> {
    /// Next message, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<M> {
        self.receiver.recv().await
    }

    /// Topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> Uuid {
        self.topic
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl<M> Stream for Subscription<M> {
    type Item = M;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<M>> {
        self.receiver.poll_recv(cx)
    }
}

/// Process-local `Notifier`.
pub struct TopicNotifier<M> {
    registry: Arc<RwLock<Registry<M>>>,
    next_id: AtomicU64,
    span: Span,
}

impl<M> fmt::Debug for TopicNotifier<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicNotifier")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl<M> Default for TopicNotifier<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TopicNotifier<M> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            span: tracing::info_span!("notifier"),
        }
    }

    /// Emit events under `span` instead of the default component span.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Live subscriptions on `topic`.
    pub async fn subscriber_count(&self, topic: Uuid) -> usize {
        self.registry.read().await.get(&topic).map_or(0, HashMap::len)
    }
}

impl<M: Send + Sync + 'static> TopicNotifier<M> {
    /// Remove the entry once `token` fires.
    fn spawn_watcher(&self, token: CancellationToken, topic: Uuid, id: u64) {
        let registry = Arc::clone(&self.registry);
        let span = self.span.clone();

        tokio::spawn(async move {
            token.cancelled().await;

            let mut guard = registry.write().await;
            if let Some(subscribers) = guard.get_mut(&topic) {
                subscribers.remove(&id);
                if subscribers.is_empty() {
                    guard.remove(&topic);
                }
            }
            tracing::debug!(parent: &span, topic = %topic, subscriber = id, "Subscription removed");
        });
    }
}

#[async_trait]
impl<M> Notifier<M> for TopicNotifier<M>
where
    M: Clone + Send + Sync + 'static,
{
    async fn subscribe(
        &self,
        token: &CancellationToken,
        topic: Uuid,
    ) -> NotifyResult<Subscription<M>> {
        if token.is_cancelled() {
            return Err(NotifyError::Cancelled);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let own = token.child_token();
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER_COUNT);

        self.registry.write().await.entry(topic).or_default().insert(
            id,
            Entry {
                sender,
                token: own.clone(),
            },
        );
        self.spawn_watcher(own.clone(), topic, id);

        tracing::debug!(parent: &self.span, topic = %topic, subscriber = id, "Subscribed");
        Ok(Subscription {
            id,
            topic,
            receiver,
            _guard: own.drop_guard(),
        })
    }

    async fn publish(
        &self,
        token: &CancellationToken,
        topic: Uuid,
        message: M,
    ) -> NotifyResult<()> {
        let targets: Vec<(mpsc::Sender<M>, CancellationToken)> = {
            let guard = self.registry.read().await;
            guard.get(&topic).map_or_else(Vec::new, |subscribers| {
                subscribers
                    .values()
                    .map(|entry| (entry.sender.clone(), entry.token.clone()))
                    .collect()
            })
        };

        if targets.is_empty() {
            tracing::trace!(parent: &self.span, topic = %topic, "No subscribers");
            return Ok(());
        }

        let total = targets.len();
        let mut delivered = 0usize;
        for (sender, subscriber) in targets {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::warn!(
                        parent: &self.span,
                        topic = %topic,
                        delivered,
                        total,
                        "Publish cancelled"
                    );
                    return Err(NotifyError::Cancelled);
                }
                () = subscriber.cancelled() => {}
                sent = sender.send(message.clone()) => {
                    if sent.is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        tracing::debug!(parent: &self.span, topic = %topic, delivered, total, "Published");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
