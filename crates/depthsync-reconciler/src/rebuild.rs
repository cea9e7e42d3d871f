//! Background snapshot rebuild.
//!
//! Runs on its own task so the insert that detected the timeout returns
//! immediately. The fetcher is synchronous and runs on the blocking pool;
//! the reconciler lock is taken only to apply the result.

use std::sync::Arc;
use std::time::Duration;

use depthsync_types::{DepthsyncError, Result, Slot};

use crate::reconciler::Shared;

/// Fetch a snapshot with retries and resynchronize the book from it.
pub(crate) async fn run(shared: Arc<Shared>) -> Result<()> {
    let name = shared.config.name.as_str();
    let max_attempts = shared.config.rebuild_max_attempts;
    let retry_delay = Duration::from_millis(shared.config.rebuild_retry_delay_ms);
    let request_response = !shared.policy.fetch_mode().is_inline();
    let mut shutdown = shared.shutdown.subscribe();

    for attempt in 1..=max_attempts {
        if *shutdown.borrow_and_update() {
            return cancelled(&shared, request_response);
        }

        match fetch(&shared).await {
            Ok(Some(snapshot)) => {
                let now_ms = shared.clock.now_ms();
                let mut core = shared.core.lock();
                core.finish_rebuild(
                    snapshot,
                    shared.policy.as_ref(),
                    shared.config.uncross_book,
                    now_ms,
                );
                shared.publish(&core);
                return Ok(());
            }
            Ok(None) if request_response => {
                shared
                    .core
                    .lock()
                    .abandon_rebuild(true, shared.clock.now_ms());
                tracing::warn!(book = name, attempt, "fetcher returned no snapshot");
                return Ok(());
            }
            Ok(None) => {
                shared.core.lock().await_inline_snapshot();
                tracing::info!(book = name, attempt, "snapshot requested on the stream");
                return Ok(());
            }
            Err(err) => {
                tracing::warn!(
                    book = name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "snapshot fetch failed"
                );
                if attempt < max_attempts {
                    tokio::select! {
                        () = tokio::time::sleep(retry_delay) => {}
                        _ = shutdown.changed() => return cancelled(&shared, request_response),
                    }
                }
            }
        }
    }

    let err = DepthsyncError::RebuildExhausted {
        attempts: max_attempts,
    };
    tracing::error!(book = name, attempts = max_attempts, "rebuild exhausted");
    shared.policy.on_fatal(&err.to_string());
    shared
        .core
        .lock()
        .abandon_rebuild(request_response, shared.clock.now_ms());
    Err(err)
}

async fn fetch(shared: &Shared) -> Result<Option<Slot>> {
    let policy = Arc::clone(&shared.policy);
    tokio::task::spawn_blocking(move || policy.fetch_snapshot())
        .await
        .map_err(|err| DepthsyncError::SnapshotFetch {
            reason: err.to_string(),
        })?
}

fn cancelled(shared: &Shared, request_response: bool) -> Result<()> {
    shared
        .core
        .lock()
        .abandon_rebuild(request_response, shared.clock.now_ms());
    tracing::info!(book = %shared.config.name, "rebuild cancelled by shutdown");
    Err(DepthsyncError::RebuildCancelled)
}
