//! Full-page response cache.
//!
//! Rendered pages are kept for a fixed time-to-live, keyed by route and
//! viewer. Nothing invalidates an entry on write: it either expires or is
//! dropped wholesale with [`PageStore::invalidate_all`].

mod config;
mod keys;
mod lock;
mod middleware;
mod store;

pub use config::PageCacheConfig;
pub use keys::PageKey;
pub use middleware::{PageCacheState, page_cache_layer};
pub use store::{CachedResponse, PageStore};
