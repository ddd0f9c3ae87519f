//! sled-backed store.

use std::sync::Arc;

use sled::{Batch, Db, Tree};

use super::{Store, StoreConfig};
use crate::cache::{FeedCache, SubscriberCache};
use crate::error::Error;
use crate::event::Event;
use crate::feed::{Feed, FeedRecord};
use crate::subscription::Subscriber;

/// Tree name for feed headers, keyed by feed URI.
const FEED_TREE: &str = "feeds";

/// Tree name for feed events, keyed by feed URI and offset.
const EVENT_TREE: &str = "events";

/// Tree name for subscriber records, keyed by subscriber identifier.
const SUBSCRIBER_TREE: &str = "subscribers";

/// Store persisting JSON-encoded records in sled.
///
/// A feed header carries the base offset, the pull cursors and the push
/// targets. Each retained event is its own entry in the events tree, under
/// the feed URI, a zero byte and the big-endian offset, so a feed's events
/// sort by offset and share a scan prefix.
pub struct SledStore {
    db: Db,
    feeds: Tree,
    events: Tree,
    subscribers: Tree,
}

impl SledStore {
    /// Open or create a store with the given configuration.
    pub fn open(config: StoreConfig) -> Result<Self, Error> {
        let db = config.to_sled_config().open()?;
        Self::with_db(db)
    }

    /// Use an already opened sled database.
    pub fn with_db(db: Db) -> Result<Self, Error> {
        let feeds = db.open_tree(FEED_TREE)?;
        let events = db.open_tree(EVENT_TREE)?;
        let subscribers = db.open_tree(SUBSCRIBER_TREE)?;

        Ok(Self {
            db,
            feeds,
            events,
            subscribers,
        })
    }

    /// Check if the store was recovered from a previous crash.
    pub fn was_recovered(&self) -> bool {
        self.db.was_recovered()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), Error> {
        self.db.flush()?;
        Ok(())
    }

    /// Number of stored feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Number of stored events of a feed.
    pub fn event_count(&self, uri: &str) -> usize {
        self.events.scan_prefix(Self::event_prefix(uri)).count()
    }

    /// Number of stored subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn event_prefix(uri: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(uri.len() + 1);
        key.extend_from_slice(uri.as_bytes());
        key.push(0);
        key
    }

    fn event_key(uri: &str, offset: u64) -> Vec<u8> {
        let mut key = Self::event_prefix(uri);
        key.extend_from_slice(&offset.to_be_bytes());
        key
    }

    fn decode_offset(key: &[u8]) -> Result<u64, Error> {
        let tail = key
            .len()
            .checked_sub(8)
            .and_then(|start| <[u8; 8]>::try_from(&key[start..]).ok())
            .ok_or_else(|| Error::Serialization("invalid event key".to_string()))?;
        Ok(u64::from_be_bytes(tail))
    }

    fn decode_key(key: &[u8]) -> Result<String, Error> {
        String::from_utf8(key.to_vec())
            .map_err(|e| Error::Serialization(format!("invalid record key: {}", e)))
    }

    fn keys(tree: &Tree) -> Result<Vec<String>, Error> {
        let mut keys = Vec::new();
        for key in tree.iter().keys() {
            keys.push(Self::decode_key(&key?)?);
        }
        Ok(keys)
    }

    fn load_feed(&self, uri: &str) -> Result<Option<Feed>, Error> {
        let record: FeedRecord = match self.feeds.get(uri.as_bytes())? {
            Some(value) => serde_json::from_slice(&value)?,
            None => return Ok(None),
        };

        let mut events = Vec::new();
        for item in self.events.scan_prefix(Self::event_prefix(uri)) {
            let (key, value) = item?;
            let event: Event = serde_json::from_slice(&value)?;
            events.push((Self::decode_offset(&key)?, Arc::new(event)));
        }
        Ok(Some(Feed::from_parts(record, events)))
    }

    fn load_subscriber(&self, identifier: &str) -> Result<Option<Subscriber>, Error> {
        match self.subscribers.get(identifier.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn load_missing_feed(&self, cache: &FeedCache, uri: &str) -> Result<bool, Error> {
        let loaded = cache.try_insert_missing(uri, || self.load_feed(uri))?;
        if loaded {
            tracing::trace!(feed = %uri, "feed loaded from store");
        }
        Ok(loaded)
    }

    fn load_missing_subscriber(
        &self,
        cache: &SubscriberCache,
        identifier: &str,
    ) -> Result<bool, Error> {
        let loaded = cache.try_insert_missing(identifier, || self.load_subscriber(identifier))?;
        if loaded {
            tracing::trace!(subscriber = %identifier, "subscriber loaded from store");
        }
        Ok(loaded)
    }

    fn remove_events(&self, range: impl Iterator<Item = sled::Result<sled::IVec>>) -> Result<(), Error> {
        let mut batch = Batch::default();
        for key in range {
            batch.remove(key?);
        }
        self.events.apply_batch(batch)?;
        Ok(())
    }
}

impl Store for SledStore {
    fn refresh_feeds(&self, cache: &FeedCache) -> Result<(), Error> {
        for uri in Self::keys(&self.feeds)? {
            if !cache.contains_key(&uri) {
                self.load_missing_feed(cache, &uri)?;
            }
        }
        Ok(())
    }

    fn refresh_subscribers(&self, cache: &SubscriberCache) -> Result<(), Error> {
        for identifier in Self::keys(&self.subscribers)? {
            if !cache.contains_key(&identifier) {
                self.load_missing_subscriber(cache, &identifier)?;
            }
        }
        Ok(())
    }

    fn persist_feed(&self, feed: &Feed) -> Result<(), Error> {
        let value = serde_json::to_vec(&feed.to_record())?;
        self.feeds.insert(feed.uri().as_bytes(), value)?;
        Ok(())
    }

    fn append_event(&self, feed_uri: &str, offset: u64, event: &Arc<Event>) -> Result<(), Error> {
        let value = serde_json::to_vec(event.as_ref())?;
        self.events.insert(Self::event_key(feed_uri, offset), value)?;
        Ok(())
    }

    fn truncate_events(&self, feed_uri: &str, base: u64) -> Result<(), Error> {
        let range = Self::event_key(feed_uri, 0)..Self::event_key(feed_uri, base);
        self.remove_events(self.events.range(range).keys())
    }

    fn persist_subscriber(&self, subscriber: &Subscriber) -> Result<(), Error> {
        let value = serde_json::to_vec(subscriber)?;
        self.subscribers
            .insert(subscriber.identifier().as_bytes(), value)?;
        Ok(())
    }

    fn delete_feed(&self, uri: &str) -> Result<(), Error> {
        self.feeds.remove(uri.as_bytes())?;
        self.remove_events(self.events.scan_prefix(Self::event_prefix(uri)).keys())
    }

    fn delete_subscriber(&self, identifier: &str) -> Result<(), Error> {
        self.subscribers.remove(identifier.as_bytes())?;
        Ok(())
    }
}
