//! Renderer handle pool.
//!
//! Engine handles are expensive to build and cannot be shared between
//! concurrent renders. The pool bounds how many exist, leases each one to a
//! single caller at a time, and shuts down without destroying a handle that
//! is still in use.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use metatile_renderer::engine::{DebugEngine, StyleSource};
//! use metatile_renderer::pool::{HandlePool, Lifecycle};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = HandlePool::new(Arc::new(DebugEngine::new()), StyleSource::new("{}"), 2);
//!
//!     let handle = pool.acquire().await.unwrap();
//!     assert_eq!(handle.renders(), 0);
//!     drop(handle); // back to the pool
//!
//!     pool.close().await;
//!     assert_eq!(pool.lifecycle(), Lifecycle::Closed);
//!     assert!(pool.acquire().await.is_err());
//! }
//! ```

mod handle_pool;

pub use handle_pool::{HandlePool, Lifecycle, PooledHandle};
