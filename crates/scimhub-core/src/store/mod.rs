//! Durable storage for feeds and subscribers.
//!
//! The router keeps feeds and subscribers in an in-memory cache and treats a
//! [`Store`] as the source of truth for identities it does not hold yet. Every
//! router operation refreshes the cache before reading it and persists or
//! deletes after mutating it, which keeps several routers sharing one store
//! eventually consistent. Refresh is a best-effort merge, not a lock.
//!
//! A feed is stored as a small header (base offset, pull cursors, push
//! targets) plus its events keyed by absolute offset, so an append writes one
//! event and a cursor move rewrites only the header.
//!
//! Within one router, an entity is inserted into the cache before it is first
//! persisted and deleted from the store before it leaves the cache. Refresh
//! therefore re-reads a record while holding the cache entry it fills, and
//! skips it if the record is gone.

mod config;
mod memory;
mod sled_store;

pub use config::StoreConfig;
pub use memory::MemoryStore;
pub use sled_store::SledStore;

use std::sync::Arc;

use crate::cache::{FeedCache, SubscriberCache};
use crate::error::Error;
use crate::event::Event;
use crate::feed::Feed;
use crate::subscription::Subscriber;

/// Cache-coherence boundary between the router and durable state.
pub trait Store: Send + Sync {
    /// Insert feeds known to the store but missing from `cache`.
    /// Feeds already cached are left untouched.
    fn refresh_feeds(&self, cache: &FeedCache) -> Result<(), Error>;

    /// Insert subscribers known to the store but missing from `cache`.
    fn refresh_subscribers(&self, cache: &SubscriberCache) -> Result<(), Error>;

    /// Durably upsert a feed header: base offset, pull cursors and push targets.
    fn persist_feed(&self, feed: &Feed) -> Result<(), Error>;

    /// Durably store the event at `offset` of a feed's log.
    fn append_event(&self, feed_uri: &str, offset: u64, event: &Arc<Event>) -> Result<(), Error>;

    /// Drop a feed's stored events below `base`.
    fn truncate_events(&self, feed_uri: &str, base: u64) -> Result<(), Error>;

    /// Durably upsert a subscriber and its subscriptions.
    fn persist_subscriber(&self, subscriber: &Subscriber) -> Result<(), Error>;

    /// Durably delete a feed header and its events.
    fn delete_feed(&self, uri: &str) -> Result<(), Error>;

    /// Durably delete a subscriber and its subscriptions.
    fn delete_subscriber(&self, identifier: &str) -> Result<(), Error>;
}
