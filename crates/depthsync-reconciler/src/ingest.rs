//! Ordered ingest channel.
//!
//! With many producer threads racing for the reconciler lock, an older
//! update can lose the race long enough to open a gap. Routing slots through
//! a single channel keeps them in arrival order and leaves one task as the
//! only caller of [`Reconciler::insert_slot`].

use std::sync::Arc;

use depthsync_book::SlotPool;
use depthsync_types::{DepthsyncError, Result, Slot};
use tokio::sync::mpsc;

use crate::reconciler::Reconciler;

/// Producer side of an ingest channel.
#[derive(Debug, Clone)]
pub struct IngestSender {
    tx: mpsc::Sender<Slot>,
    pool: Arc<SlotPool>,
}

impl IngestSender {
    /// Queue a slot, waiting for capacity.
    ///
    /// # Errors
    /// [`DepthsyncError::IngestClosed`] once the ingest task has stopped; the
    /// slot goes back to the pool.
    pub async fn send(&self, slot: Slot) -> Result<()> {
        self.tx.send(slot).await.map_err(|mpsc::error::SendError(slot)| {
            self.pool.release(slot);
            DepthsyncError::IngestClosed
        })
    }

    /// Queue a slot from a thread outside the runtime, blocking for
    /// capacity.
    pub fn blocking_send(&self, slot: Slot) -> Result<()> {
        self.tx
            .blocking_send(slot)
            .map_err(|mpsc::error::SendError(slot)| {
                self.pool.release(slot);
                DepthsyncError::IngestClosed
            })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Reconciler {
    /// Start a task that inserts queued slots in arrival order.
    ///
    /// `on_update` receives the receive time of the last applied slot each
    /// time an insert changes the book. The task stops on
    /// [`shutdown`](Reconciler::shutdown) or when every sender is dropped.
    pub fn spawn_ingest<F>(&self, capacity: usize, on_update: F) -> IngestSender
    where
        F: Fn(i64) + Send + 'static,
    {
        let shared = self.shared();
        let (tx, mut rx) = mpsc::channel::<Slot>(capacity.max(1));
        let mut shutdown = shared.shutdown.subscribe();
        let reconciler = self.clone();

        shared.runtime.spawn(async move {
            if !*shutdown.borrow_and_update() {
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        received = rx.recv() => {
                            let Some(slot) = received else { break };
                            if reconciler.insert_slot(slot) {
                                on_update(reconciler.last_received_ts_ns());
                            }
                        }
                    }
                }
            }

            rx.close();
            while let Ok(slot) = rx.try_recv() {
                reconciler.release_slot(slot);
            }
            tracing::debug!(book = reconciler.name(), "ingest stopped");
        });

        IngestSender {
            tx,
            pool: Arc::clone(&shared.pool),
        }
    }
}
