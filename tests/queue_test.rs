mod common;

use common::pending_ping;
use ping_lifecycle::PendingPing;
use ping_lifecycle::queue::{PendingPingQueue, QueueConfig, RetryDisposition};
use ping_lifecycle::storage::{FileStore, MemoryStore, StorageDirectory};
use tempfile::TempDir;
use uuid::Uuid;

fn ids(pings: &[PendingPing]) -> Vec<Uuid> {
    pings.iter().map(PendingPing::id).collect()
}

#[tokio::test]
async fn test_rehydrated_order_matches_insertion_order_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let queue = PendingPingQueue::open(store, QueueConfig::default())
        .await
        .unwrap();

    let pings: Vec<_> = (0..10)
        .map(|i| pending_ping(if i % 2 == 0 { "metrics" } else { "events" }))
        .collect();
    for ping in &pings {
        queue.enqueue(ping.clone()).await.unwrap();
    }
    drop(queue);

    // Simulated restart: a fresh store handle over the same directory
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let reopened = PendingPingQueue::open(store, QueueConfig::default())
        .await
        .unwrap();

    let restored = reopened.peek_batch(100).await.unwrap();
    assert_eq!(ids(&restored), ids(&pings));
    assert_eq!(reopened.rehydration_report().restored, 10);
    assert_eq!(restored[3].payload(), pings[3].payload());
    assert_eq!(restored[3].metadata(), pings[3].metadata());
}

#[tokio::test]
async fn test_rehydrated_order_matches_insertion_order_in_memory() {
    let store = MemoryStore::new();
    let queue = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();

    let pings: Vec<_> = (0..25).map(|_| pending_ping("metrics")).collect();
    for ping in &pings {
        queue.enqueue(ping.clone()).await.unwrap();
    }
    drop(queue);

    let reopened = PendingPingQueue::open(store, QueueConfig::default())
        .await
        .unwrap();
    assert_eq!(ids(&reopened.peek_batch(25).await.unwrap()), ids(&pings));
}

#[tokio::test]
async fn test_peek_batch_respects_limit() {
    let queue = PendingPingQueue::open(MemoryStore::new(), QueueConfig::default())
        .await
        .unwrap();
    let pings: Vec<_> = (0..5).map(|_| pending_ping("metrics")).collect();
    for ping in &pings {
        queue.enqueue(ping.clone()).await.unwrap();
    }

    let batch = queue.peek_batch(2).await.unwrap();
    assert_eq!(ids(&batch), ids(&pings[..2]));
    // Peeking does not consume
    assert_eq!(queue.len().await, 5);
}

#[tokio::test]
async fn test_acked_ping_is_never_returned_again() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let queue = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();

    let pings: Vec<_> = (0..3).map(|_| pending_ping("metrics")).collect();
    for ping in &pings {
        queue.enqueue(ping.clone()).await.unwrap();
    }

    let acked = pings[1].id();
    queue.ack_success(acked).await.unwrap();

    let batch = queue.peek_batch(10).await.unwrap();
    assert!(!ids(&batch).contains(&acked));
    assert_eq!(batch.len(), 2);
    assert_eq!(store.list_keys().await.unwrap().len(), 2);
    drop(queue);

    let reopened = PendingPingQueue::open(store, QueueConfig::default())
        .await
        .unwrap();
    assert!(!reopened.contains(acked).await);
    assert_eq!(
        ids(&reopened.peek_batch(10).await.unwrap()),
        vec![pings[0].id(), pings[2].id()]
    );
}

#[tokio::test]
async fn test_unrecoverable_failure_deletes() {
    let store = MemoryStore::new();
    let queue = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();
    let ping = pending_ping("metrics");
    queue.enqueue(ping.clone()).await.unwrap();

    queue.ack_unrecoverable_failure(ping.id()).await.unwrap();

    assert!(queue.is_empty().await);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_recoverable_failure_increments_once_and_keeps_position() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let queue = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();

    let pings: Vec<_> = (0..3).map(|_| pending_ping("metrics")).collect();
    for ping in &pings {
        queue.enqueue(ping.clone()).await.unwrap();
    }

    let disposition = queue.ack_recoverable_failure(pings[1].id()).await.unwrap();
    assert_eq!(disposition, RetryDisposition::Retained { attempt_count: 1 });

    let batch = queue.peek_batch(10).await.unwrap();
    assert_eq!(ids(&batch), ids(&pings));
    assert_eq!(batch[0].attempt_count(), 0);
    assert_eq!(batch[1].attempt_count(), 1);
    assert_eq!(batch[2].attempt_count(), 0);
    assert_eq!(batch[1].payload(), pings[1].payload());
    drop(queue);

    // The rewritten record survives a restart with the same count and position
    let reopened = PendingPingQueue::open(store, QueueConfig::default())
        .await
        .unwrap();
    let batch = reopened.peek_batch(10).await.unwrap();
    assert_eq!(ids(&batch), ids(&pings));
    assert_eq!(batch[1].attempt_count(), 1);
}

#[tokio::test]
async fn test_attempt_ceiling_deletes_ping() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let config = QueueConfig {
        max_attempts: 3,
        ..QueueConfig::default()
    };
    let queue = PendingPingQueue::open(store.clone(), config).await.unwrap();
    let ping = pending_ping("metrics");
    queue.enqueue(ping.clone()).await.unwrap();

    for expected in 1..3 {
        assert_eq!(
            queue.ack_recoverable_failure(ping.id()).await.unwrap(),
            RetryDisposition::Retained {
                attempt_count: expected
            }
        );
    }

    assert_eq!(
        queue.ack_recoverable_failure(ping.id()).await.unwrap(),
        RetryDisposition::Dropped { attempt_count: 3 }
    );
    assert!(!queue.contains(ping.id()).await);
    assert!(store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreadable_record_is_discarded_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileStore::open(temp_dir.path()).await.unwrap();
    let queue = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();
    let good = pending_ping("metrics");
    queue.enqueue(good.clone()).await.unwrap();
    drop(queue);

    store
        .put(&Uuid::new_v4().to_string(), vec![0xff, 0x00, 0x13])
        .await
        .unwrap();

    let reopened = PendingPingQueue::open(store.clone(), QueueConfig::default())
        .await
        .unwrap();
    assert_eq!(ids(&reopened.peek_batch(10).await.unwrap()), vec![good.id()]);
    assert_eq!(reopened.rehydration_report().discarded_corrupt, 1);
    assert_eq!(store.list_keys().await.unwrap().len(), 1);
}
