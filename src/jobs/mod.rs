//! The two batch jobs.
//!
//! Both take every collaborator as an argument (streaming client, lookup
//! clients, store) and hold the run lock for their whole duration, so two
//! jobs never write the same tables at once.

pub mod lyrics;
pub mod top;

use std::future::Future;

use crate::error::{SyncError, SyncResult};
use crate::store::Store;

pub use lyrics::{run_lyrics_sync, LyricsOptions, LyricsReport};
pub use top::{run_top_sync, TopOptions, TopReport};

/// Run `job` while holding the run lock; the lock is released whatever the
/// job's outcome.
pub async fn with_run_lock<S, F, T>(store: &S, job: F) -> SyncResult<T>
where
    S: Store + ?Sized,
    F: Future<Output = SyncResult<T>>,
{
    if !store.try_lock_run().await? {
        return Err(SyncError::AlreadyRunning);
    }

    let result = job.await;

    if let Err(e) = store.unlock_run().await {
        tracing::warn!(error = %e, "failed to release run lock");
    }
    result
}
