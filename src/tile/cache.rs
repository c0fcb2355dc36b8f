//! Single-flight metatile cache.
//!
//! Coalesces requests for tiles of the same metatile into one render pass.
//! Every cache key is in exactly one state:
//!
//! ```text
//!            first request               render ok
//!   Absent ───────────────▶ Pending ───────────────▶ Resolved
//!      ▲                       │                        │
//!      └──── render failed ────┘◀──── LRU eviction ─────┘
//! ```
//!
//! - **Absent**: the first request becomes the leader. It installs a pending
//!   entry, starts the render on its own task and is reported as `MISS`.
//! - **Pending**: later requests join the waiter list and are reported as
//!   `HIT`. Waiters are notified in the order they joined.
//! - **Resolved**: requests are answered immediately as `HIT`.
//!
//! The render runs on a spawned task so that it completes, and populates the
//! cache, even if every caller stops waiting for it. A failed render removes
//! the pending entry, so the next request retries.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::coord::TileCoord;
use super::format::TileFormat;
use super::headers::{CacheStatus, Tile};
use super::planner::MetatileKey;
use crate::error::RenderError;

/// Default number of resolved metatiles kept in memory.
pub const DEFAULT_METATILE_CACHE_CAPACITY: usize = 128;

/// All tiles of one rendered metatile.
pub type MetatileTiles = HashMap<TileCoord, Tile>;

type RenderResult = Result<Arc<MetatileTiles>, RenderError>;

/// Cache key: a metatile rendered to a specific format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub metatile: MetatileKey,
    pub format: TileFormat,
}

impl CacheKey {
    pub fn new(metatile: MetatileKey, format: TileFormat) -> Self {
        Self { metatile, format }
    }
}

/// The result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CacheOutcome {
    pub tiles: Arc<MetatileTiles>,
    /// `MISS` only for the request that triggered the render pass
    pub status: CacheStatus,
}

struct CacheState {
    pending: HashMap<CacheKey, Vec<oneshot::Sender<RenderResult>>>,
    resolved: LruCache<CacheKey, Arc<MetatileTiles>>,
}

enum Lookup {
    Resolved(Arc<MetatileTiles>),
    Joined(oneshot::Receiver<RenderResult>),
    Leader(oneshot::Receiver<RenderResult>),
}

/// Metatile cache with single-flight rendering.
///
/// Cloning yields another reference to the same cache.
#[derive(Clone)]
pub struct MetatileCache {
    state: Arc<Mutex<CacheState>>,
}

impl MetatileCache {
    /// Create a cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_METATILE_CACHE_CAPACITY)
    }

    /// Create a cache keeping at most `capacity` resolved metatiles.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                pending: HashMap::new(),
                resolved: LruCache::new(capacity),
            })),
        }
    }

    /// Return the tiles for `key`, rendering them at most once.
    ///
    /// `render` is only invoked when no resolved or pending entry exists for
    /// the key. Its failure is delivered to every caller waiting on the pass.
    pub async fn get_or_render<F, Fut>(
        &self,
        key: CacheKey,
        render: F,
    ) -> Result<CacheOutcome, RenderError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MetatileTiles, RenderError>> + Send + 'static,
    {
        let (receiver, status) = match self.lookup(key) {
            Lookup::Resolved(tiles) => {
                trace!(?key, "Metatile cache hit");
                return Ok(CacheOutcome {
                    tiles,
                    status: CacheStatus::Hit,
                });
            }
            Lookup::Joined(receiver) => {
                trace!(?key, "Joined in-flight metatile render");
                (receiver, CacheStatus::Hit)
            }
            Lookup::Leader(receiver) => {
                debug!(?key, "Metatile cache miss, rendering");
                self.spawn_render(key, render());
                (receiver, CacheStatus::Miss)
            }
        };

        let tiles = receiver
            .await
            .map_err(|_| RenderError::Render("metatile render was aborted".to_string()))??;

        Ok(CacheOutcome { tiles, status })
    }

    fn lookup(&self, key: CacheKey) -> Lookup {
        let mut state = self.state.lock();

        if let Some(tiles) = state.resolved.get(&key) {
            return Lookup::Resolved(Arc::clone(tiles));
        }

        let (sender, receiver) = oneshot::channel();
        match state.pending.entry(key) {
            Entry::Occupied(mut waiters) => {
                waiters.get_mut().push(sender);
                Lookup::Joined(receiver)
            }
            Entry::Vacant(slot) => {
                slot.insert(vec![sender]);
                Lookup::Leader(receiver)
            }
        }
    }

    fn spawn_render<Fut>(&self, key: CacheKey, render: Fut)
    where
        Fut: Future<Output = Result<MetatileTiles, RenderError>> + Send + 'static,
    {
        let completion = Completion {
            state: Arc::clone(&self.state),
            key: Some(key),
        };

        tokio::spawn(async move {
            let result = render.await.map(Arc::new);
            completion.resolve(result);
        });
    }

    /// Drop the resolved entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.state.lock().resolved.pop(key).is_some()
    }

    /// Drop every resolved entry. In-flight renders are unaffected.
    pub fn clear(&self) {
        self.state.lock().resolved.clear();
    }

    /// Number of resolved metatiles.
    pub fn len(&self) -> usize {
        self.state.lock().resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of metatiles currently being rendered.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Callers waiting on the in-flight render of `key`, leader included.
    pub fn waiters(&self, key: &CacheKey) -> usize {
        self.state.lock().pending.get(key).map_or(0, Vec::len)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().resolved.contains(key)
    }
}

impl Default for MetatileCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Completes a pending entry exactly once.
///
/// If the render task goes away without resolving (panic, runtime shutdown),
/// the pending entry is removed and waiters observe a closed channel.
struct Completion {
    state: Arc<Mutex<CacheState>>,
    key: Option<CacheKey>,
}

impl Completion {
    fn resolve(mut self, result: RenderResult) {
        let Some(key) = self.key.take() else {
            return;
        };

        let waiters = {
            let mut state = self.state.lock();
            let waiters = state.pending.remove(&key).unwrap_or_default();
            if let Ok(tiles) = &result {
                state.resolved.put(key, Arc::clone(tiles));
            }
            waiters
        };

        for waiter in waiters {
            // The waiter may have stopped listening; the cache is populated anyway
            let _ = waiter.send(result.clone());
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.state.lock().pending.remove(&key);
        }
    }
}
