//! Per-style renderer registry.
//!
//! Each distinct style gets its own raster and vector [`TileRenderer`], each
//! with an independent pool and cache. Renderers are created on first use
//! and kept in an LRU bounded by `registrySize`. Pushing past the bound
//! evicts the least recently used renderer and closes its pool on a spawned
//! task, so its handles are destroyed without blocking the caller.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::RendererConfig;
use crate::engine::Engine;
use crate::error::RenderError;
use crate::tile::{RendererKind, TileRenderer};

type RendererKey = (Arc<str>, RendererKind);

struct RegistryState<E: Engine> {
    closed: bool,
    renderers: LruCache<RendererKey, TileRenderer<E>>,
}

/// Lazily built renderers, keyed by style markup and renderer kind.
pub struct RendererRegistry<E: Engine> {
    engine: Arc<E>,
    /// Template for every renderer; its style is replaced per entry
    config: RendererConfig,
    state: Mutex<RegistryState<E>>,
}

impl<E: Engine> RendererRegistry<E> {
    /// Create a registry holding at most `config.registry_size` renderers.
    ///
    /// A size of 0 is treated as 1.
    pub fn new(engine: Arc<E>, config: RendererConfig) -> Self {
        let capacity = NonZeroUsize::new(config.registry_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            engine,
            config,
            state: Mutex::new(RegistryState {
                closed: false,
                renderers: LruCache::new(capacity),
            }),
        }
    }

    /// Get the renderer for a style, creating it on first use.
    ///
    /// Creating a renderer when the registry is full closes the least
    /// recently used one. Requests still holding that renderer fail with
    /// [`RenderError::PoolDraining`] once its pool starts draining.
    ///
    /// # Errors
    ///
    /// - [`RenderError::PoolDraining`] once the registry is closed
    /// - `No style provided` for a blank style
    pub fn renderer(&self, style: &str, kind: RendererKind) -> Result<TileRenderer<E>, RenderError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RenderError::PoolDraining);
        }

        let key: RendererKey = (Arc::from(style), kind);
        if let Some(renderer) = state.renderers.get(&key) {
            return Ok(renderer.clone());
        }

        let config = self.config.clone().with_style(style);
        let renderer = TileRenderer::new(kind, Arc::clone(&self.engine), &config)?;

        if let Some((evicted_key, evicted)) = state.renderers.push(key, renderer.clone()) {
            debug!("Evicting {} renderer", evicted_key.1);
            close_evicted(evicted);
        }

        debug!(
            "Registered {} renderer ({} of {})",
            kind,
            state.renderers.len(),
            state.renderers.cap()
        );
        Ok(renderer)
    }

    /// Number of renderers currently held.
    pub fn len(&self) -> usize {
        self.state.lock().renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of renderers held at once.
    pub fn capacity(&self) -> usize {
        self.state.lock().renderers.cap().get()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Refuse new renderers and close every existing one.
    ///
    /// Safe to call repeatedly; every call resolves once all pools are closed.
    pub async fn close(&self) {
        let renderers: Vec<TileRenderer<E>> = {
            let mut state = self.state.lock();
            state.closed = true;
            state
                .renderers
                .iter()
                .map(|(_, renderer)| renderer.clone())
                .collect()
        };

        for renderer in &renderers {
            renderer.close().await;
        }

        info!("Closed {} renderer(s)", renderers.len());
    }
}

/// Close an evicted renderer's pool in the background.
fn close_evicted<E: Engine>(renderer: TileRenderer<E>) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move { renderer.close().await });
        }
        Err(_) => {
            warn!(
                "No runtime to close evicted {} renderer; its handles stay open",
                renderer.kind()
            );
        }
    }
}
