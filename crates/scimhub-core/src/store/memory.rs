//! Process-local store.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use super::Store;
use crate::cache::{FeedCache, SubscriberCache};
use crate::error::Error;
use crate::event::Event;
use crate::feed::{Feed, FeedRecord};
use crate::subscription::Subscriber;

/// Store keeping records in memory.
///
/// Nothing survives the process, but routers sharing one `MemoryStore` see
/// each other's feeds and subscribers through refresh. Events are held as
/// shared `Arc`s, so feeds loaded from here share the events they have in common.
#[derive(Default)]
pub struct MemoryStore {
    feeds: DashMap<String, FeedRecord>,
    events: DashMap<String, BTreeMap<u64, Arc<Event>>>,
    subscribers: DashMap<String, Subscriber>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Number of stored subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The stored header of a feed.
    pub fn feed_record(&self, uri: &str) -> Option<FeedRecord> {
        self.feeds.get(uri).map(|r| r.value().clone())
    }

    /// Number of stored events of a feed.
    pub fn event_count(&self, uri: &str) -> usize {
        self.events.get(uri).map(|log| log.len()).unwrap_or(0)
    }

    /// The stored record of a subscriber.
    pub fn subscriber_record(&self, identifier: &str) -> Option<Subscriber> {
        self.subscribers.get(identifier).map(|r| r.value().clone())
    }

    fn load_feed(&self, uri: &str) -> Option<Feed> {
        let record = self.feed_record(uri)?;
        let events: Vec<(u64, Arc<Event>)> = self
            .events
            .get(uri)
            .map(|log| log.iter().map(|(offset, e)| (*offset, e.clone())).collect())
            .unwrap_or_default();
        Some(Feed::from_parts(record, events))
    }

    fn load_missing_feed(&self, cache: &FeedCache, uri: &str) -> bool {
        let loaded = cache
            .try_insert_missing(uri, || Ok::<_, Error>(self.load_feed(uri)))
            .unwrap_or(false);
        if loaded {
            tracing::trace!(feed = %uri, "feed loaded from store");
        }
        loaded
    }

    fn load_missing_subscriber(&self, cache: &SubscriberCache, identifier: &str) -> bool {
        let loaded = cache
            .try_insert_missing(identifier, || {
                Ok::<_, Error>(self.subscriber_record(identifier))
            })
            .unwrap_or(false);
        if loaded {
            tracing::trace!(subscriber = %identifier, "subscriber loaded from store");
        }
        loaded
    }
}

impl Store for MemoryStore {
    fn refresh_feeds(&self, cache: &FeedCache) -> Result<(), Error> {
        let uris: Vec<String> = self.feeds.iter().map(|r| r.key().clone()).collect();
        for uri in uris {
            if !cache.contains_key(&uri) {
                self.load_missing_feed(cache, &uri);
            }
        }
        Ok(())
    }

    fn refresh_subscribers(&self, cache: &SubscriberCache) -> Result<(), Error> {
        let identifiers: Vec<String> = self.subscribers.iter().map(|r| r.key().clone()).collect();
        for identifier in identifiers {
            if !cache.contains_key(&identifier) {
                self.load_missing_subscriber(cache, &identifier);
            }
        }
        Ok(())
    }

    fn persist_feed(&self, feed: &Feed) -> Result<(), Error> {
        self.feeds.insert(feed.uri().to_string(), feed.to_record());
        Ok(())
    }

    fn append_event(&self, feed_uri: &str, offset: u64, event: &Arc<Event>) -> Result<(), Error> {
        self.events
            .entry(feed_uri.to_string())
            .or_default()
            .insert(offset, event.clone());
        Ok(())
    }

    fn truncate_events(&self, feed_uri: &str, base: u64) -> Result<(), Error> {
        if let Some(mut log) = self.events.get_mut(feed_uri) {
            let kept = log.split_off(&base);
            *log = kept;
        }
        Ok(())
    }

    fn persist_subscriber(&self, subscriber: &Subscriber) -> Result<(), Error> {
        self.subscribers
            .insert(subscriber.identifier().to_string(), subscriber.clone());
        Ok(())
    }

    fn delete_feed(&self, uri: &str) -> Result<(), Error> {
        self.feeds.remove(uri);
        self.events.remove(uri);
        Ok(())
    }

    fn delete_subscriber(&self, identifier: &str) -> Result<(), Error> {
        self.subscribers.remove(identifier);
        Ok(())
    }
}
