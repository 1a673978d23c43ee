//! Notifier behavior across tasks.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use threadline_core::{Notifier, TopicNotifier};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_subscribe_publish_cancel() {
    let notifier = TopicNotifier::<String>::new();
    let token = CancellationToken::new();
    let topic = Uuid::new_v4();

    let mut sub = notifier.subscribe(&token, topic).await.unwrap();
    notifier.publish(&token.child_token(), topic, "M".to_string()).await.unwrap();
    assert_eq!(timeout(WAIT, sub.next()).await.unwrap(), Some("M".to_string()));

    token.cancel();
    assert_eq!(timeout(WAIT, sub.next()).await.unwrap(), None);

    let later = notifier
        .publish(&CancellationToken::new(), topic, "after".to_string())
        .await;
    assert!(later.is_ok());
    assert_eq!(sub.next().await, None);
}

#[tokio::test]
async fn test_fan_out_to_every_subscriber() {
    let notifier = Arc::new(TopicNotifier::<u64>::new());
    let token = CancellationToken::new();
    let topic = Uuid::new_v4();

    // Readers run concurrently; a one-slot buffer blocks the publisher
    // until each of them has taken the previous message.
    let mut readers = Vec::new();
    for _ in 0..4 {
        let sub = notifier.subscribe(&token, topic).await.unwrap();
        readers.push(tokio::spawn(async move {
            sub.take(3).collect::<Vec<u64>>().await
        }));
    }
    assert_eq!(notifier.subscriber_count(topic).await, 4);

    for n in 0..3 {
        timeout(WAIT, notifier.publish(&CancellationToken::new(), topic, n))
            .await
            .unwrap()
            .unwrap();
    }

    for reader in readers {
        let got = timeout(WAIT, reader).await.unwrap().unwrap();
        assert_eq!(got, vec![0, 1, 2]);
    }
}

#[tokio::test]
async fn test_cancelled_subscriber_does_not_block_publish() {
    let notifier = TopicNotifier::<u64>::new();
    let topic = Uuid::new_v4();

    let live_token = CancellationToken::new();
    let mut live = notifier.subscribe(&live_token, topic).await.unwrap();

    let gone_token = CancellationToken::new();
    let gone = notifier.subscribe(&gone_token, topic).await.unwrap();
    gone_token.cancel();
    drop(gone);

    for n in 0..3 {
        timeout(WAIT, notifier.publish(&CancellationToken::new(), topic, n))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(timeout(WAIT, live.recv()).await.unwrap(), Some(n));
    }
}

#[tokio::test]
async fn test_many_topics_concurrently() {
    let notifier = Arc::new(TopicNotifier::<String>::new());
    let token = CancellationToken::new();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let notifier = Arc::clone(&notifier);
        let token = token.clone();
        tasks.push(tokio::spawn(async move {
            let topic = Uuid::new_v4();
            let mut sub = notifier.subscribe(&token, topic).await.unwrap();
            notifier.publish(&token, topic, format!("msg {i}")).await.unwrap();
            timeout(WAIT, sub.recv()).await.unwrap()
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), Some(format!("msg {i}")));
    }

    token.cancel();
}
