//! Fetch progress reporting

use std::sync::atomic::{AtomicUsize, Ordering};

use log::info;

use crate::source::AssetKey;

/// Observer notified around every underlying source call
///
/// All methods default to no-ops; observers never affect fetch results.
pub trait FetchObserver: Send + Sync {
    /// A batch started `started` new source calls
    fn on_batch(&self, _started: usize) {}

    /// A source call acquired its slot and is about to run
    fn on_start(&self, _key: &AssetKey) {}

    /// A source call finished
    fn on_finish(&self, _key: &AssetKey, _found: bool) {}
}

/// Default observer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl FetchObserver for NoopObserver {}

/// Logs `done/total` as downloads complete
#[derive(Debug, Default)]
pub struct LogProgress {
    total: AtomicUsize,
    done: AtomicUsize,
    missing: AtomicUsize,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// (done, total, missing)
    pub fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.done.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
            self.missing.load(Ordering::Relaxed),
        )
    }
}

impl FetchObserver for LogProgress {
    fn on_batch(&self, started: usize) {
        let total = self.total.fetch_add(started, Ordering::Relaxed) + started;
        info!("Fetching emojis: {} queued ({} total)", started, total);
    }

    fn on_finish(&self, key: &AssetKey, found: bool) {
        if !found {
            self.missing.fetch_add(1, Ordering::Relaxed);
        }
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.load(Ordering::Relaxed);
        info!(
            "Fetching emojis: {}/{} {}{}",
            done,
            total,
            key,
            if found { "" } else { " (not found)" }
        );
    }
}
