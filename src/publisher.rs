//! Progress publisher — per-download snapshot streams
//!
//! A subscription yields the latest known [`BatchJob`] snapshot immediately,
//! then one snapshot per store mutation. Intermediate snapshots may coalesce
//! under load (the watch channel keeps only the latest), but a subscriber
//! never observes state older than what it has already seen, and the stream
//! ends exactly once: after emitting the first terminal snapshot. Every
//! subscriber gets an independent stream, so concurrent subscribers to the
//! same download are fine.

use crate::error::Result;
use crate::store::JobStore;
use crate::types::{BatchJob, DownloadId};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::watch;

/// Builds subscriber streams over job store state
#[derive(Clone)]
pub struct ProgressPublisher {
    store: Arc<dyn JobStore>,
}

enum SubscriptionState {
    /// Emit the current snapshot first
    Initial(watch::Receiver<BatchJob>),
    /// Wait for the next change
    Waiting(watch::Receiver<BatchJob>),
    /// Terminal snapshot emitted; stream is over
    Done,
}

impl ProgressPublisher {
    /// Create a publisher over the given store
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Subscribe to a download's snapshot stream
    ///
    /// Fails with a not-found error for unknown identifiers instead of
    /// yielding an empty stream. The stream also ends if the batch is
    /// deleted mid-flight (the store drops the channel sender).
    pub async fn subscribe(&self, id: &DownloadId) -> Result<BoxStream<'static, BatchJob>> {
        let rx = self.store.subscribe(id).await?;
        Ok(snapshot_stream(rx))
    }
}

/// Turn a watch receiver into a terminating snapshot stream
fn snapshot_stream(rx: watch::Receiver<BatchJob>) -> BoxStream<'static, BatchJob> {
    futures::stream::unfold(SubscriptionState::Initial(rx), |state| async move {
        match state {
            SubscriptionState::Initial(mut rx) => {
                let snapshot = rx.borrow_and_update().clone();
                let next = if snapshot.is_terminal() {
                    SubscriptionState::Done
                } else {
                    SubscriptionState::Waiting(rx)
                };
                Some((snapshot, next))
            }
            SubscriptionState::Waiting(mut rx) => {
                if rx.changed().await.is_err() {
                    // Sender gone: the batch was evicted
                    return None;
                }
                let snapshot = rx.borrow_and_update().clone();
                let next = if snapshot.is_terminal() {
                    SubscriptionState::Done
                } else {
                    SubscriptionState::Waiting(rx)
                };
                Some((snapshot, next))
            }
            SubscriptionState::Done => None,
        }
    })
    .boxed()
}
