//! # Channel Test Suite
//!
//! Identity, FIFO delivery, close semantics, competing receivers and
//! backpressure of shared channels.

use crate::channel::{AnyChannel, Channel, ElementType, SendError};
use std::time::Duration;
use tokio::time::timeout;

#[test]
fn test_clones_share_identity() {
  let a = Channel::<i32>::new(0);
  let b = a.clone();
  let c = Channel::<i32>::new(0);
  assert_eq!(a.id(), b.id());
  assert_ne!(a.id(), c.id());
  assert!(a.raw().same_channel(b.raw()));
  assert!(!a.raw().same_channel(c.raw()));
}

#[test]
fn test_typed_view_checks_element() {
  let raw = AnyChannel::new(ElementType::of::<String>(), 1);
  assert!(raw.typed::<String>().is_some());
  assert!(raw.typed::<i32>().is_none());
  assert_eq!(raw.element(), ElementType::of::<String>());
  assert_eq!(raw.capacity(), 1);
}

#[tokio::test]
async fn test_fifo_then_close() {
  let ch = Channel::<i32>::new(3);
  for n in 1..=3 {
    ch.send(n).await.unwrap();
  }
  ch.close();
  assert!(ch.is_closed());
  assert_eq!(ch.recv().await, Some(1));
  assert_eq!(ch.recv().await, Some(2));
  assert_eq!(ch.recv().await, Some(3));
  assert_eq!(ch.recv().await, None);
}

#[tokio::test]
async fn test_send_after_close_returns_value() {
  let ch = Channel::<&'static str>::new(1);
  ch.close();
  match ch.send("late").await {
    Err(SendError(value)) => assert_eq!(value, "late"),
    Ok(()) => panic!("send on a closed channel succeeded"),
  }
}

#[tokio::test]
async fn test_rendezvous_blocks_until_received() {
  let ch = Channel::<i32>::new(0);
  let sender = ch.clone();
  let writer = tokio::spawn(async move { sender.send(1).await.is_ok() });

  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(!writer.is_finished(), "unbuffered send completed without a receiver");

  assert_eq!(ch.recv().await, Some(1));
  let sent = timeout(Duration::from_secs(1), writer)
    .await
    .expect("send must complete once the value is taken")
    .unwrap();
  assert!(sent);
}

#[tokio::test]
async fn test_buffered_send_does_not_wait() {
  let ch = Channel::<i32>::new(2);
  timeout(Duration::from_millis(100), async {
    ch.send(1).await.unwrap();
    ch.send(2).await.unwrap();
  })
  .await
  .expect("buffered sends must not wait for a receiver");
  assert!(timeout(Duration::from_millis(50), ch.send(3)).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_competing_receivers_split_values() {
  let ch = Channel::<u32>::new(0);
  let mut readers = Vec::new();
  for _ in 0..3 {
    let rx = ch.clone();
    readers.push(tokio::spawn(async move {
      let mut got = Vec::new();
      while let Some(n) = rx.recv().await {
        got.push(n);
      }
      got
    }));
  }

  for n in 0..30 {
    ch.send(n).await.unwrap();
  }
  ch.close();

  let mut all = Vec::new();
  for reader in readers {
    all.extend(timeout(Duration::from_secs(5), reader).await.unwrap().unwrap());
  }
  all.sort_unstable();
  assert_eq!(all, (0..30).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_close_is_observed_by_all_receivers() {
  let ch = Channel::<i32>::new(0);
  let a = ch.clone();
  let b = ch.clone();
  let ra = tokio::spawn(async move { a.recv().await });
  let rb = tokio::spawn(async move { b.recv().await });
  tokio::task::yield_now().await;
  ch.close();
  assert_eq!(timeout(Duration::from_secs(1), ra).await.unwrap().unwrap(), None);
  assert_eq!(timeout(Duration::from_secs(1), rb).await.unwrap().unwrap(), None);
}

#[test]
fn test_poll_readiness_follows_capacity() {
  let rendezvous = Channel::<i32>::new(0);
  let mut send = tokio_test::task::spawn(rendezvous.send(1));
  tokio_test::assert_pending!(send.poll());

  let buffered = Channel::<i32>::new(1);
  let mut send = tokio_test::task::spawn(buffered.send(1));
  assert!(tokio_test::assert_ready!(send.poll()).is_ok());
  let mut recv = tokio_test::task::spawn(buffered.recv());
  assert_eq!(tokio_test::assert_ready!(recv.poll()), Some(1));
}
