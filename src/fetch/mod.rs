//! Fetch/cache manager
//!
//! Resolves a batch of asset keys through an [`AssetSource`]:
//! - memory tier checked first (successful results only)
//! - at most one source call per key at a time (single-flight); concurrent
//!   requesters share the result of that call
//! - a semaphore caps simultaneous source calls; excess calls queue
//!
//! State is owned by one manager instance and shared through `Arc` by every
//! render that uses it.

pub mod progress;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt, Shared, WeakShared};
use log::{debug, info, trace};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::constants::DEFAULT_MAX_CONCURRENT;
use crate::source::{Asset, AssetKey, AssetSource, EmojiStyle};
use crate::text::EmojiTable;

pub use progress::{FetchObserver, LogProgress, NoopObserver};

/// Keys per chunk when warming a whole style
const PREFETCH_CHUNK: usize = 256;

/// Result of one batch: every requested key, `None` = not found
pub type FetchResults = HashMap<AssetKey, Option<Asset>>;

type SharedFetch = Shared<BoxFuture<'static, Option<Asset>>>;

/// Manager settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Ceiling on simultaneous source calls (0 is treated as 1)
    pub max_concurrent: usize,
    /// Keep successful results in memory for the manager's lifetime
    pub memory_cache: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            memory_cache: true,
        }
    }
}

/// One in-flight source call
///
/// Held weakly so that when every waiter is dropped the call is cancelled.
struct InFlight {
    generation: u64,
    future: WeakShared<BoxFuture<'static, Option<Asset>>>,
}

#[derive(Default)]
struct State {
    memory: HashMap<AssetKey, Asset>,
    in_flight: HashMap<AssetKey, InFlight>,
    next_generation: u64,
}

impl State {
    fn finish(&mut self, key: &AssetKey, generation: u64) {
        if self
            .in_flight
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            self.in_flight.remove(key);
        }
    }
}

struct Inner {
    source: Arc<dyn AssetSource>,
    observer: Arc<dyn FetchObserver>,
    semaphore: Semaphore,
    settings: FetchSettings,
    state: Mutex<State>,
    source_calls: AtomicUsize,
}

impl Inner {
    async fn load(&self, key: &AssetKey) -> Option<Asset> {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                debug!("manager shut down, skipping {}", key);
                return None;
            }
        };

        self.observer.on_start(key);
        self.source_calls.fetch_add(1, Ordering::Relaxed);
        let asset = self.source.fetch(key).await.map(Asset::from);
        self.observer.on_finish(key, asset.is_some());
        trace!("{} -> {}", key, if asset.is_some() { "found" } else { "not found" });
        asset
    }
}

/// Removes the in-flight entry if the call is dropped before finishing
struct InFlightGuard {
    inner: Arc<Inner>,
    key: AssetKey,
    generation: u64,
    armed: bool,
}

impl InFlightGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!("fetch of {} cancelled", self.key);
            self.inner.state.lock().finish(&self.key, self.generation);
        }
    }
}

/// Concurrent, de-duplicating asset fetcher with a memory tier
pub struct FetchManager {
    inner: Arc<Inner>,
}

impl FetchManager {
    pub fn new(source: Arc<dyn AssetSource>, settings: FetchSettings) -> Self {
        Self::with_observer(source, settings, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        source: Arc<dyn AssetSource>,
        settings: FetchSettings,
        observer: Arc<dyn FetchObserver>,
    ) -> Self {
        let settings = FetchSettings {
            max_concurrent: settings.max_concurrent.max(1),
            ..settings
        };
        info!(
            "FetchManager: max_concurrent={}, memory_cache={}",
            settings.max_concurrent, settings.memory_cache
        );
        Self {
            inner: Arc::new(Inner {
                source,
                observer,
                semaphore: Semaphore::new(settings.max_concurrent),
                settings,
                state: Mutex::new(State::default()),
                source_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn settings(&self) -> FetchSettings {
        self.inner.settings
    }

    /// Resolve every distinct key
    ///
    /// The result has an entry for each requested key. Failed keys map to
    /// `None`; a failure never affects other keys.
    pub async fn fetch_all<I>(&self, keys: I) -> FetchResults
    where
        I: IntoIterator<Item = AssetKey>,
    {
        self.fetch_batch(keys, self.inner.settings.memory_cache).await
    }

    /// Resolve one key
    pub async fn fetch_one(&self, key: AssetKey) -> Option<Asset> {
        let mut results = self.fetch_all([key.clone()]).await;
        results.remove(&key).flatten()
    }

    /// Warm the source's persistent cache with every known emoji of `style`
    ///
    /// Results are not kept in memory. Returns the number of assets found.
    pub async fn prefetch_style(&self, style: EmojiStyle) -> usize {
        let keys: Vec<AssetKey> = EmojiTable::get()
            .iter()
            .map(|emoji| AssetKey::unicode(style, emoji))
            .collect();
        info!("Prefetching {} emojis for style {}", keys.len(), style);

        let mut found = 0;
        for chunk in keys.chunks(PREFETCH_CHUNK) {
            let results = self.fetch_batch(chunk.iter().cloned(), false).await;
            found += results.values().filter(|asset| asset.is_some()).count();
        }
        info!("Prefetch done: {}/{} found", found, keys.len());
        found
    }

    async fn fetch_batch<I>(&self, keys: I, remember: bool) -> FetchResults
    where
        I: IntoIterator<Item = AssetKey>,
    {
        let keys: HashSet<AssetKey> = keys.into_iter().collect();
        let mut results = FetchResults::with_capacity(keys.len());
        let mut pending: Vec<(AssetKey, SharedFetch)> = Vec::new();
        let mut started = 0usize;

        {
            let mut state = self.inner.state.lock();
            for key in keys {
                if self.inner.settings.memory_cache {
                    if let Some(asset) = state.memory.get(&key) {
                        results.insert(key, Some(asset.clone()));
                        continue;
                    }
                }

                let joined = state
                    .in_flight
                    .get(&key)
                    .and_then(|entry| entry.future.upgrade());
                let future = match joined {
                    Some(future) => {
                        trace!("joining in-flight fetch of {}", key);
                        future
                    }
                    None => {
                        started += 1;
                        self.start(&mut state, key.clone(), remember)
                    }
                };
                pending.push((key, future));
            }
        }

        if started > 0 {
            self.inner.observer.on_batch(started);
        }
        debug!(
            "fetch batch: {} cached, {} pending ({} new)",
            results.len(),
            pending.len(),
            started
        );

        let resolved = join_all(
            pending
                .into_iter()
                .map(|(key, future)| async move { (key, future.await) }),
        )
        .await;

        // A joined call may have been started without `remember`
        if remember {
            let mut state = self.inner.state.lock();
            for (key, asset) in &resolved {
                if let Some(asset) = asset {
                    state.memory.entry(key.clone()).or_insert_with(|| asset.clone());
                }
            }
        }
        results.extend(resolved);
        results
    }

    /// Create and register a new single-flight call (state lock held)
    fn start(&self, state: &mut State, key: AssetKey, remember: bool) -> SharedFetch {
        let generation = state.next_generation;
        state.next_generation += 1;

        let mut guard = InFlightGuard {
            inner: self.inner.clone(),
            key: key.clone(),
            generation,
            armed: true,
        };

        let future = async move {
            let asset = guard.inner.load(&guard.key).await;

            let mut state = guard.inner.state.lock();
            if remember {
                if let Some(asset) = &asset {
                    state.memory.insert(guard.key.clone(), asset.clone());
                }
            }
            state.finish(&guard.key, generation);
            drop(state);
            guard.disarm();

            asset
        }
        .boxed()
        .shared();

        if let Some(weak) = future.downgrade() {
            state.in_flight.insert(key, InFlight { generation, future: weak });
        }
        future
    }

    /// Number of assets in the memory tier
    pub fn cached_len(&self) -> usize {
        self.inner.state.lock().memory.len()
    }

    /// Number of source calls currently registered as in flight
    pub fn in_flight_len(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Total source calls made by this manager
    pub fn source_calls(&self) -> usize {
        self.inner.source_calls.load(Ordering::Relaxed)
    }

    /// Drop every asset from the memory tier
    pub fn clear_memory(&self) {
        self.inner.state.lock().memory.clear();
    }

    /// Stop accepting new source calls and release the source's resources
    ///
    /// Queued calls resolve to not-found. Safe to call more than once, and
    /// before any fetch was issued.
    pub fn shutdown(&self) {
        if !self.inner.semaphore.is_closed() {
            info!("FetchManager: shutting down");
            self.inner.semaphore.close();
            self.inner.source.shutdown();
        }
    }
}

impl std::fmt::Debug for FetchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchManager")
            .field("settings", &self.inner.settings)
            .field("cached", &self.cached_len())
            .field("source_calls", &self.source_calls())
            .finish()
    }
}
