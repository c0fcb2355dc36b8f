//! Bounded pool of engine handles with FIFO hand-off and draining shutdown.
//!
//! # Slots
//!
//! The pool accounts for *slots*: a slot is either an idle handle or a lease.
//! A lease may still be creating its handle. `idle + leased` never exceeds
//! `max_size`.
//!
//! When a lease ends, its slot goes to the oldest live waiter if there is one,
//! either as the handle itself or, if handle creation failed, as permission to
//! create a new one. Otherwise the handle becomes idle.
//!
//! # Lifecycle
//!
//! ```text
//! Active ──close()──▶ Draining ──(no leases)──▶ Closed
//! ```
//!
//! Draining rejects every new acquire with [`RenderError::PoolDraining`], even
//! when idle handles exist. Acquires that were already queued are still served
//! from released handles; `close()` waits for them too.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use crate::engine::{Engine, StyleSource};
use crate::error::RenderError;

/// Lifecycle state of a [`HandlePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Draining,
    Closed,
}

/// What a queued acquirer receives.
enum Grant<H> {
    /// An existing handle
    Handle(H),
    /// A free slot: the receiver creates the handle itself
    Create,
}

struct PoolState<H> {
    lifecycle: Lifecycle,
    idle: Vec<H>,
    /// Slots currently held by callers, including ones still creating a handle
    leased: usize,
    waiters: VecDeque<oneshot::Sender<Grant<H>>>,
    tearing_down: bool,
}

struct Shared<E: Engine> {
    engine: Arc<E>,
    style: StyleSource,
    max_size: usize,
    state: Mutex<PoolState<E::Handle>>,
    /// Signalled whenever the last lease of a draining pool ends, and on close
    drained: Notify,
}

impl<E: Engine> Shared<E> {
    /// Return a slot to the pool.
    fn give_back(&self, grant: Grant<E::Handle>) {
        let drained = {
            let mut state = self.state.lock();
            let mut grant = grant;

            loop {
                let Some(waiter) = state.waiters.pop_front() else {
                    match grant {
                        Grant::Handle(handle) => state.idle.push(handle),
                        Grant::Create => {}
                    }
                    state.leased -= 1;
                    break;
                };
                // A closed receiver means the waiter gave up; try the next one
                match waiter.send(grant) {
                    Ok(()) => break,
                    Err(returned) => grant = returned,
                }
            }

            state.lifecycle == Lifecycle::Draining && state.leased == 0
        };

        if drained {
            self.drained.notify_waiters();
        }
    }
}

/// A bounded pool of engine handles built from one style.
///
/// Handles are created lazily, up to `max_size`. Cloning the pool yields
/// another reference to the same pool.
pub struct HandlePool<E: Engine> {
    shared: Arc<Shared<E>>,
}

impl<E: Engine> Clone for HandlePool<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Engine> HandlePool<E> {
    /// Create a pool. A `max_size` of 0 is treated as 1.
    pub fn new(engine: Arc<E>, style: StyleSource, max_size: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine,
                style,
                max_size: max_size.max(1),
                state: Mutex::new(PoolState {
                    lifecycle: Lifecycle::Active,
                    idle: Vec::new(),
                    leased: 0,
                    waiters: VecDeque::new(),
                    tearing_down: false,
                }),
                drained: Notify::new(),
            }),
        }
    }

    /// Lease a handle.
    ///
    /// Returns an idle handle if one exists, creates one if the pool is under
    /// capacity, and otherwise waits in FIFO order for a release.
    ///
    /// # Errors
    ///
    /// - [`RenderError::PoolDraining`] once `close()` has been called
    /// - whatever the engine returns when handle creation fails
    pub async fn acquire(&self) -> Result<PooledHandle<E>, RenderError> {
        let grant = match self.admit()? {
            Admission::Granted(grant) => grant,
            Admission::Queued(receiver) => {
                let waiter = QueuedAcquire {
                    shared: Arc::clone(&self.shared),
                    receiver: Some(receiver),
                };
                waiter.wait().await?
            }
        };

        let mut lease = PooledHandle {
            shared: Arc::clone(&self.shared),
            handle: None,
        };

        match grant {
            Grant::Handle(handle) => lease.handle = Some(handle),
            Grant::Create => {
                // If creation fails, dropping the empty lease frees the slot
                let handle = self
                    .shared
                    .engine
                    .create_handle(&self.shared.style)
                    .await
                    .map_err(|e| {
                        warn!("Failed to create renderer handle: {}", e);
                        e
                    })?;
                debug!("Created renderer handle ({} max)", self.shared.max_size);
                lease.handle = Some(handle);
            }
        }

        Ok(lease)
    }

    fn admit(&self) -> Result<Admission<E::Handle>, RenderError> {
        let mut state = self.shared.state.lock();

        if state.lifecycle != Lifecycle::Active {
            return Err(RenderError::PoolDraining);
        }

        if let Some(handle) = state.idle.pop() {
            state.leased += 1;
            return Ok(Admission::Granted(Grant::Handle(handle)));
        }

        if state.idle.len() + state.leased < self.shared.max_size {
            state.leased += 1;
            return Ok(Admission::Granted(Grant::Create));
        }

        let (sender, receiver) = oneshot::channel();
        state.waiters.push_back(sender);
        Ok(Admission::Queued(receiver))
    }

    /// Drain and close the pool.
    ///
    /// New acquires fail from the first call on. Resolves once every lease
    /// has ended and every handle has been destroyed. Safe to call repeatedly
    /// and concurrently; every call resolves after the pool is closed.
    pub async fn close(&self) {
        loop {
            let notified = self.shared.drained.notified();

            let idle = {
                let mut state = self.shared.state.lock();
                let lifecycle = state.lifecycle;
                match lifecycle {
                    Lifecycle::Closed => return,
                    Lifecycle::Active => {
                        debug!(
                            "Draining renderer pool ({} leased, {} queued)",
                            state.leased,
                            state.waiters.len()
                        );
                        state.lifecycle = Lifecycle::Draining;
                    }
                    Lifecycle::Draining => {}
                }

                if state.leased == 0 && !state.tearing_down {
                    state.tearing_down = true;
                    Some(std::mem::take(&mut state.idle))
                } else {
                    None
                }
            };

            if let Some(idle) = idle {
                let count = idle.len();
                for handle in idle {
                    self.shared.engine.destroy_handle(handle).await;
                }

                self.shared.state.lock().lifecycle = Lifecycle::Closed;
                self.shared.drained.notify_waiters();
                info!("Renderer pool closed, destroyed {} handle(s)", count);
                return;
            }

            notified.await;
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    /// Whether the pool still accepts acquires.
    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Number of handles that exist or are being created.
    pub fn size(&self) -> usize {
        let state = self.shared.state.lock();
        state.idle.len() + state.leased
    }

    pub fn idle(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    pub fn leased(&self) -> usize {
        self.shared.state.lock().leased
    }

    /// Number of acquires waiting for a handle.
    pub fn pending(&self) -> usize {
        let state = self.shared.state.lock();
        state.waiters.iter().filter(|w| !w.is_closed()).count()
    }

    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    pub fn style(&self) -> &StyleSource {
        &self.shared.style
    }
}

enum Admission<H> {
    Granted(Grant<H>),
    Queued(oneshot::Receiver<Grant<H>>),
}

/// A queued acquire. Dropping it before it completes gives back any grant it
/// was already sent.
struct QueuedAcquire<E: Engine> {
    shared: Arc<Shared<E>>,
    receiver: Option<oneshot::Receiver<Grant<E::Handle>>>,
}

impl<E: Engine> QueuedAcquire<E> {
    async fn wait(mut self) -> Result<Grant<E::Handle>, RenderError> {
        let result = match self.receiver.as_mut() {
            Some(receiver) => receiver.await,
            None => return Err(RenderError::PoolDraining),
        };
        self.receiver = None;
        result.map_err(|_| RenderError::PoolDraining)
    }
}

impl<E: Engine> Drop for QueuedAcquire<E> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if let Ok(grant) = receiver.try_recv() {
                self.shared.give_back(grant);
            }
        }
    }
}

/// An exclusively leased handle. Dropping it releases the handle to the pool.
pub struct PooledHandle<E: Engine> {
    shared: Arc<Shared<E>>,
    /// `None` only while the handle is being created
    handle: Option<E::Handle>,
}

impl<E: Engine> std::fmt::Debug for PooledHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle").finish_non_exhaustive()
    }
}

impl<E: Engine> Deref for PooledHandle<E> {
    type Target = E::Handle;

    fn deref(&self) -> &E::Handle {
        self.handle
            .as_ref()
            .expect("pooled handle is present once acquired")
    }
}

impl<E: Engine> DerefMut for PooledHandle<E> {
    fn deref_mut(&mut self) -> &mut E::Handle {
        self.handle
            .as_mut()
            .expect("pooled handle is present once acquired")
    }
}

impl<E: Engine> Drop for PooledHandle<E> {
    fn drop(&mut self) {
        let grant = match self.handle.take() {
            Some(handle) => Grant::Handle(handle),
            None => Grant::Create,
        };
        self.shared.give_back(grant);
    }
}
