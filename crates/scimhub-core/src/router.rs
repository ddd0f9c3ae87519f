//! The router: classifies events into feeds and tracks delivery.
//!
//! Locking follows one order everywhere: a subscriber is locked before any
//! feed, and at most one subscriber is locked at a time. Ingestion only locks
//! feeds, one after another, never several at once. Push dispatch happens
//! after every lock is released.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, trace, warn};

use crate::cache::{FeedCache, SubscriberCache};
use crate::error::{require, Error};
use crate::event::Event;
use crate::feed::Feed;
use crate::push::{PushHandle, PushStats};
use crate::retention::{CompactionResult, RetentionPolicy};
use crate::store::Store;
use crate::subscription::{Subscriber, Subscription, SubscriptionMode};

/// Routes events from publishers to subscribers through feeds.
pub struct Router {
    feeds: FeedCache,
    subscribers: SubscriberCache,
    store: Arc<dyn Store>,
    push: PushHandle,
}

impl Router {
    /// Create a router over a store, dispatching pushes through `push`.
    pub fn new(store: Arc<dyn Store>, push: PushHandle) -> Self {
        Self {
            feeds: FeedCache::new(),
            subscribers: SubscriberCache::new(),
            store,
            push,
        }
    }

    /// Load every feed and subscriber known to the store into the cache.
    pub fn load(&self) -> Result<(), Error> {
        self.store.refresh_feeds(&self.feeds)?;
        self.store.refresh_subscribers(&self.subscribers)?;
        info!(
            feeds = self.feeds.len(),
            subscribers = self.subscribers.len(),
            "router state loaded"
        );
        Ok(())
    }

    /// Classify an event into its feeds and return the push targets to notify.
    ///
    /// Unknown feeds are created. The event is appended to every feed it
    /// names; pull subscribers pick it up on their next poll. The push
    /// transport is handed the targets exactly once, without waiting.
    ///
    /// Feeds are written one at a time, each event stored before it joins
    /// the feed's log. If the store fails part way, feeds already written
    /// keep the event, their push targets are still dispatched, and the
    /// error is returned; later feeds never see the event.
    pub fn ingest(&self, event: Event) -> Result<BTreeSet<String>, Error> {
        event.validate()?;
        let event = Arc::new(event);
        let feed_uris = event.feed_uris();

        if !feed_uris.is_empty() {
            self.store.refresh_feeds(&self.feeds)?;
        }

        let mut targets = BTreeSet::new();
        let mut routed = 0;
        let mut failure = None;
        for uri in &feed_uris {
            match self.append_to_feed(uri, &event) {
                Ok(feed_targets) => {
                    targets.extend(feed_targets);
                    routed += 1;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            warn!(
                routed,
                feeds = feed_uris.len(),
                error = %e,
                "event ingest interrupted"
            );
            if routed > 0 {
                self.push.dispatch(targets.into_iter().collect(), event.clone());
            }
            return Err(e);
        }

        trace!(
            feeds = feed_uris.len(),
            targets = targets.len(),
            event_type = ?event.event_type(),
            "event routed"
        );

        self.push.dispatch(targets.iter().cloned().collect(), event.clone());
        Ok(targets)
    }

    /// Store an event at the end of one feed, then append it in memory.
    fn append_to_feed(&self, uri: &str, event: &Arc<Event>) -> Result<Vec<String>, Error> {
        let (mut feed, created) = self.feeds.lock_or_insert_with(uri, || Feed::new(uri));
        if created {
            self.store.persist_feed(&feed)?;
            debug!(feed = %uri, "feed created");
        }
        self.store.append_event(uri, feed.end(), event)?;
        Ok(feed.append(event.clone()))
    }

    /// Parse an event document and ingest it.
    pub fn ingest_json(&self, json: &str) -> Result<BTreeSet<String>, Error> {
        self.ingest(Event::from_json(json)?)
    }

    /// Bind a subscriber to a feed, creating either on first reference.
    ///
    /// A pull subscription starts reading at the current end of the feed,
    /// unless the subscriber already has a cursor on it. Duplicate
    /// subscriptions are kept.
    pub fn subscribe(
        &self,
        subscriber_id: &str,
        feed_uri: &str,
        mode: SubscriptionMode,
        target: &str,
    ) -> Result<(), Error> {
        require(subscriber_id, "subscriber identifier")?;
        require(feed_uri, "feed URI")?;
        require(target, "subscription target")?;

        self.store.refresh_subscribers(&self.subscribers)?;
        self.store.refresh_feeds(&self.feeds)?;

        let subscription = Subscription::new(feed_uri, mode, target);

        let (mut subscriber, subscriber_created) = self
            .subscribers
            .lock_or_insert_with(subscriber_id, || Subscriber::new(subscriber_id));
        let (mut feed, feed_created) = self
            .feeds
            .lock_or_insert_with(feed_uri, || Feed::new(feed_uri));

        subscriber.add_subscription(subscription.clone());
        feed.add_subscriber(subscriber_id, &subscription);

        self.store.persist_subscriber(&subscriber)?;
        self.store.persist_feed(&feed)?;

        debug!(
            subscriber = subscriber_id,
            feed = feed_uri,
            mode = ?mode,
            subscriber_created,
            feed_created,
            "subscription created"
        );

        Ok(())
    }

    /// Remove a subscriber's subscriptions to one feed.
    ///
    /// Returns false if the subscriber is unknown or not subscribed to the
    /// feed. Removes the subscriber when it has no subscriptions left and the
    /// feed when it has no subscribers left.
    pub fn unsubscribe(&self, subscriber_id: &str, feed_uri: &str) -> Result<bool, Error> {
        require(subscriber_id, "subscriber identifier")?;
        require(feed_uri, "feed URI")?;

        self.store.refresh_subscribers(&self.subscribers)?;
        self.store.refresh_feeds(&self.feeds)?;

        let mut subscriber = match self.subscribers.lock(subscriber_id) {
            Some(subscriber) => subscriber,
            None => return Ok(false),
        };
        if !subscriber.remove_subscriptions(feed_uri) {
            return Ok(false);
        }

        self.detach(subscriber_id, feed_uri)?;

        if subscriber.is_empty() {
            self.store.delete_subscriber(subscriber_id)?;
            self.subscribers.remove(subscriber_id);
            debug!(subscriber = subscriber_id, "subscriber removed");
        } else {
            self.store.persist_subscriber(&subscriber)?;
        }

        debug!(subscriber = subscriber_id, feed = feed_uri, "subscription removed");
        Ok(true)
    }

    /// Remove a subscriber and all of its subscriptions.
    ///
    /// Returns false if the subscriber is unknown. Feeds left without
    /// subscribers are removed.
    pub fn unsubscribe_all(&self, subscriber_id: &str) -> Result<bool, Error> {
        require(subscriber_id, "subscriber identifier")?;

        self.store.refresh_subscribers(&self.subscribers)?;
        self.store.refresh_feeds(&self.feeds)?;

        let subscriber = match self.subscribers.lock(subscriber_id) {
            Some(subscriber) => subscriber,
            None => return Ok(false),
        };

        for feed_uri in subscriber.feeds() {
            self.detach(subscriber_id, &feed_uri)?;
        }

        self.store.delete_subscriber(subscriber_id)?;
        self.subscribers.remove(subscriber_id);

        debug!(
            subscriber = subscriber_id,
            subscriptions = subscriber.subscriptions().len(),
            "subscriber removed"
        );
        Ok(true)
    }

    /// Remove a subscriber from a feed, removing the feed if it is left empty.
    ///
    /// The caller holds the subscriber's lock.
    fn detach(&self, subscriber_id: &str, feed_uri: &str) -> Result<(), Error> {
        let mut feed = match self.feeds.lock(feed_uri) {
            Some(feed) => feed,
            None => {
                warn!(subscriber = subscriber_id, feed = feed_uri, "subscribed feed missing");
                return Ok(());
            }
        };

        feed.remove_subscriber(subscriber_id);

        if feed.has_subscribers() {
            self.store.persist_feed(&feed)?;
        } else {
            self.store.delete_feed(feed_uri)?;
            self.feeds.remove(feed_uri);
            debug!(feed = feed_uri, dropped_events = feed.len(), "feed removed");
        }
        Ok(())
    }

    /// Return every unread event across the subscriber's pull subscriptions.
    ///
    /// Each feed's cursor advances past what is returned. Events reached
    /// through several feeds are returned once. A subscriber without pull
    /// subscriptions gets an empty result.
    pub fn poll_subscriber(&self, subscriber_id: &str) -> Result<Vec<Arc<Event>>, Error> {
        require(subscriber_id, "subscriber identifier")?;

        self.store.refresh_subscribers(&self.subscribers)?;
        self.store.refresh_feeds(&self.feeds)?;

        let subscriber = self
            .subscribers
            .lock(subscriber_id)
            .ok_or_else(|| Error::UnknownSubscriber(subscriber_id.to_string()))?;

        let mut batches = Vec::new();
        for feed_uri in subscriber.pull_feeds() {
            let mut feed = match self.feeds.lock(&feed_uri) {
                Some(feed) => feed,
                None => {
                    warn!(subscriber = subscriber_id, feed = %feed_uri, "subscribed feed missing");
                    continue;
                }
            };

            let polled = feed.poll(subscriber_id);
            if polled.is_empty() {
                continue;
            }
            self.store.persist_feed(&feed)?;
            drop(feed);
            batches.push(polled);
        }
        drop(subscriber);

        let events = merge_polled(batches);
        trace!(subscriber = subscriber_id, events = events.len(), "subscriber polled");
        Ok(events)
    }

    /// Drop events from feed logs according to `policy`.
    #[instrument(skip(self))]
    pub fn compact(&self, policy: &RetentionPolicy) -> CompactionResult {
        let start = Instant::now();
        let mut result = CompactionResult::default();
        if policy.is_noop() {
            return result;
        }

        if let Err(e) = self.store.refresh_feeds(&self.feeds) {
            warn!(error = %e, "feed refresh failed, compacting cached feeds only");
        }

        for uri in self.feed_uris() {
            let mut feed = match self.feeds.lock(&uri) {
                Some(feed) => feed,
                None => continue,
            };
            result.feeds_visited += 1;

            let compaction = feed.compact(policy);
            if compaction.events_dropped == 0 {
                continue;
            }
            result.events_dropped += compaction.events_dropped;
            result.cursors_advanced += compaction.cursors_advanced;

            let persisted = self
                .store
                .persist_feed(&feed)
                .and_then(|()| self.store.truncate_events(&uri, feed.base()));
            if let Err(e) = persisted {
                result.errors += 1;
                warn!(feed = %uri, error = %e, "failed to persist compacted feed");
            }
        }

        result.duration = start.elapsed();
        if result.did_cleanup() {
            info!(
                feeds = result.feeds_visited,
                events_dropped = result.events_dropped,
                cursors_advanced = result.cursors_advanced,
                duration_ms = result.duration.as_millis() as u64,
                "feed logs compacted"
            );
        }
        result
    }

    /// Identifiers of every known subscriber.
    pub fn subscriber_identifiers(&self) -> Result<Vec<String>, Error> {
        self.store.refresh_subscribers(&self.subscribers)?;
        Ok(self.subscribers.keys())
    }

    /// Snapshot of a subscriber and its subscriptions.
    pub fn subscriber(&self, subscriber_id: &str) -> Result<Option<Subscriber>, Error> {
        self.store.refresh_subscribers(&self.subscribers)?;
        Ok(self
            .subscribers
            .lock(subscriber_id)
            .map(|subscriber| (*subscriber).clone()))
    }

    /// URIs of every cached feed.
    pub fn feed_uris(&self) -> Vec<String> {
        self.feeds.keys()
    }

    /// Number of retained events in a cached feed.
    pub fn feed_len(&self, feed_uri: &str) -> Option<usize> {
        self.feeds.lock(feed_uri).map(|feed| feed.len())
    }

    /// Whether a feed is cached.
    pub fn has_feed(&self, feed_uri: &str) -> bool {
        self.feeds.contains_key(feed_uri)
    }

    /// Whether a subscriber is cached.
    pub fn has_subscriber(&self, subscriber_id: &str) -> bool {
        self.subscribers.contains_key(subscriber_id)
    }

    /// Number of cached feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Number of cached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Push queue counters.
    pub fn push_stats(&self) -> &Arc<PushStats> {
        self.push.stats()
    }
}

/// Concatenate per-feed poll results, keeping the first copy of an event
/// reached through several feeds.
///
/// Events shared by feeds are usually the same allocation; events a store
/// loaded separately for each feed are matched by content. Equal content
/// within a single feed is kept.
fn merge_polled(batches: Vec<Vec<Arc<Event>>>) -> Vec<Arc<Event>> {
    if batches.len() <= 1 {
        return batches.into_iter().next().unwrap_or_default();
    }

    let mut seen_ptrs: HashSet<*const Event> = HashSet::new();
    let mut seen_content: HashMap<String, usize> = HashMap::new();
    let mut events = Vec::with_capacity(batches.iter().map(Vec::len).sum());

    for (batch, polled) in batches.into_iter().enumerate() {
        for event in polled {
            if !seen_ptrs.insert(Arc::as_ptr(&event)) {
                continue;
            }
            if let Ok(content) = serde_json::to_string(event.as_ref()) {
                let first = *seen_content.entry(content).or_insert(batch);
                if first != batch {
                    continue;
                }
            }
            events.push(event);
        }
    }
    events
}

/// Shared router handle.
pub type SharedRouter = Arc<Router>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::push::{PushJob, PushReceiver};
    use crate::store::MemoryStore;

    const FEED1: &str = "https://perun.cesnet.cz/scim-notification/storage-fi.ics.muni.cz/mailman";
    const FEED2: &str = "https://perun.cesnet.cz/scim-notification/storage-fss.ics.muni.cz/openvpn";

    fn router() -> (Router, PushReceiver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let (push, rx) = PushHandle::channel(64);
        (Router::new(store.clone(), push), rx, store)
    }

    fn event(feeds: &[&str], n: u64) -> Event {
        let mut event = Event::new(EventType::Update).with_values(serde_json::json!({ "n": n }));
        for feed in feeds {
            event = event.with_feed(*feed);
        }
        event
    }

    fn drain(rx: &mut PushReceiver) -> Vec<PushJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    #[test]
    fn test_ingest_without_subscribers_dispatches_empty_set() {
        let (router, mut rx, store) = router();

        let targets = router.ingest(event(&[FEED1], 1)).unwrap();
        assert!(targets.is_empty());
        assert!(router.has_feed(FEED1));
        assert_eq!(router.feed_len(FEED1), Some(1));
        assert!(store.feed_record(FEED1).is_some());
        assert_eq!(store.event_count(FEED1), 1);

        let jobs = drain(&mut rx);
        assert_eq!(jobs.len(), 1);
        assert!(jobs[0].targets.is_empty());
    }

    #[test]
    fn test_ingest_without_feeds_is_noop() {
        let (router, mut rx, _store) = router();

        let targets = router.ingest(Event::new(EventType::Delete)).unwrap();
        assert!(targets.is_empty());
        assert_eq!(router.feed_count(), 0);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_push_targets_only_for_matching_feed() {
        let (router, mut rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Push, "https://a/cb").unwrap();
        router.subscribe("b", FEED2, SubscriptionMode::Push, "https://b/cb").unwrap();
        router.subscribe("c", FEED1, SubscriptionMode::Pull, FEED1).unwrap();

        let targets = router.ingest(event(&[FEED1], 1)).unwrap();
        assert_eq!(targets, BTreeSet::from(["https://a/cb".to_string()]));

        let targets = router.ingest(event(&[FEED1, FEED2], 2)).unwrap();
        assert_eq!(
            targets,
            BTreeSet::from(["https://a/cb".to_string(), "https://b/cb".to_string()])
        );

        let jobs = drain(&mut rx);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].targets.len(), 2);
    }

    #[test]
    fn test_subscribe_requires_arguments() {
        let (router, _rx, _store) = router();

        assert!(matches!(
            router.subscribe("", FEED1, SubscriptionMode::Pull, FEED1),
            Err(Error::InvalidInput(_))
        ));
        assert!(router.subscribe("a", "", SubscriptionMode::Pull, FEED1).is_err());
        assert!(router.subscribe("a", FEED1, SubscriptionMode::Pull, " ").is_err());
        assert_eq!(router.subscriber_count(), 0);
        assert_eq!(router.feed_count(), 0);
    }

    #[test]
    fn test_poll_unknown_subscriber_fails() {
        let (router, _rx, _store) = router();
        assert!(matches!(
            router.poll_subscriber("nobody"),
            Err(Error::UnknownSubscriber(_))
        ));
    }

    #[test]
    fn test_poll_twice() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        let e1 = event(&[FEED1], 1);
        router.ingest(e1.clone()).unwrap();

        let polled = router.poll_subscriber("a").unwrap();
        assert_eq!(polled.len(), 1);
        assert_eq!(*polled[0], e1);
        assert!(router.poll_subscriber("a").unwrap().is_empty());
    }

    #[test]
    fn test_poll_push_only_subscriber_is_empty() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Push, "https://a/cb").unwrap();
        router.ingest(event(&[FEED1], 1)).unwrap();

        assert!(router.poll_subscriber("a").unwrap().is_empty());
        assert!(router.poll_subscriber("a").unwrap().is_empty());
    }

    #[test]
    fn test_poll_collapses_event_shared_by_feeds() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("a", FEED2, SubscriptionMode::Pull, FEED2).unwrap();

        router.ingest(event(&[FEED1, FEED2], 1)).unwrap();
        router.ingest(event(&[FEED2], 2)).unwrap();

        assert_eq!(router.poll_subscriber("a").unwrap().len(), 2);
    }

    #[test]
    fn test_late_pull_subscriber_sees_only_new_events() {
        let (router, _rx, _store) = router();
        router.ingest(event(&[FEED1], 1)).unwrap();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();

        assert!(router.poll_subscriber("a").unwrap().is_empty());
        router.ingest(event(&[FEED1], 2)).unwrap();
        assert_eq!(router.poll_subscriber("a").unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_cascades() {
        let (router, _rx, store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();

        assert!(router.unsubscribe("a", FEED1).unwrap());
        assert!(!router.has_subscriber("a"));
        assert!(!router.has_feed(FEED1));
        assert_eq!(store.feed_count(), 0);
        assert_eq!(store.subscriber_count(), 0);
        assert!(matches!(
            router.poll_subscriber("a"),
            Err(Error::UnknownSubscriber(_))
        ));
    }

    #[test]
    fn test_unsubscribe_keeps_shared_feed() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("a", FEED2, SubscriptionMode::Pull, FEED2).unwrap();
        router.subscribe("b", FEED1, SubscriptionMode::Pull, FEED1).unwrap();

        assert!(router.unsubscribe("a", FEED1).unwrap());
        assert!(router.has_subscriber("a"));
        assert!(router.has_feed(FEED1));
        assert!(router.has_feed(FEED2));
    }

    #[test]
    fn test_unsubscribe_unknown_is_false() {
        let (router, _rx, _store) = router();
        assert!(!router.unsubscribe("a", FEED1).unwrap());

        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        assert!(!router.unsubscribe("a", FEED2).unwrap());
        assert!(router.unsubscribe("", FEED1).is_err());
    }

    #[test]
    fn test_resubscribe_resets_cursor() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("b", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.ingest(event(&[FEED1], 1)).unwrap();

        router.unsubscribe("a", FEED1).unwrap();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();

        assert!(router.poll_subscriber("a").unwrap().is_empty());
        assert_eq!(router.poll_subscriber("b").unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_all() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("a", FEED2, SubscriptionMode::Push, "https://a/cb").unwrap();
        router.subscribe("b", FEED2, SubscriptionMode::Pull, FEED2).unwrap();

        assert!(router.unsubscribe_all("a").unwrap());
        assert!(!router.has_subscriber("a"));
        assert!(!router.has_feed(FEED1));
        assert!(router.has_feed(FEED2));

        let targets = router.ingest(event(&[FEED2], 1)).unwrap();
        assert!(targets.is_empty());
        assert!(!router.unsubscribe_all("a").unwrap());
    }

    #[test]
    fn test_compact_keeps_unread_events() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("b", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.ingest(event(&[FEED1], 1)).unwrap();
        router.ingest(event(&[FEED1], 2)).unwrap();
        router.poll_subscriber("a").unwrap();

        let result = router.compact(&RetentionPolicy::default());
        assert_eq!(result.events_dropped, 0);

        router.poll_subscriber("b").unwrap();
        let result = router.compact(&RetentionPolicy::default());
        assert_eq!(result.events_dropped, 2);
        assert_eq!(router.feed_len(FEED1), Some(0));

        router.ingest(event(&[FEED1], 3)).unwrap();
        assert_eq!(router.poll_subscriber("a").unwrap().len(), 1);
    }

    #[test]
    fn test_poll_merges_large_backlog_across_feeds() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        router.subscribe("a", FEED2, SubscriptionMode::Pull, FEED2).unwrap();

        for n in 0..10_000 {
            router.ingest(event(&[FEED1, FEED2], n)).unwrap();
            router.ingest(event(&[FEED2], 10_000 + n)).unwrap();
        }

        let start = Instant::now();
        let polled = router.poll_subscriber("a").unwrap();
        assert_eq!(polled.len(), 20_000);
        assert!(start.elapsed().as_secs() < 5);
        assert_eq!(polled[0].values()["n"], 0);
        assert_eq!(polled[10_000].values()["n"], 10_000);
    }

    #[test]
    fn test_merge_polled_matches_content_across_feeds_only() {
        let shared = Arc::new(event(&[FEED1, FEED2], 1));
        let copy = Arc::new(event(&[FEED1, FEED2], 1));
        let other = Arc::new(event(&[FEED2], 2));

        let merged = merge_polled(vec![
            vec![shared.clone(), shared.clone()],
            vec![copy, other.clone(), shared.clone()],
        ]);
        assert_eq!(merged.len(), 2);
        assert!(Arc::ptr_eq(&merged[0], &shared));
        assert!(Arc::ptr_eq(&merged[1], &other));

        let repeated = Arc::new(event(&[FEED1], 3));
        let again = Arc::new(event(&[FEED1], 3));
        let merged = merge_polled(vec![vec![repeated, again]]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_absent_cursor_reads_from_base_after_max_events_compaction() {
        let (router, _rx, store) = router();
        router.subscribe("b", FEED1, SubscriptionMode::Pull, FEED1).unwrap();
        for n in 0..5 {
            router.ingest(event(&[FEED1], n)).unwrap();
        }

        let policy = RetentionPolicy::with_max_events(2).drop_consumed(false);
        let result = router.compact(&policy);
        assert_eq!(result.events_dropped, 3);
        assert_eq!(store.event_count(FEED1), 2);
        assert_eq!(store.feed_record(FEED1).unwrap().base, 3);

        // A subscriber written by another router has no cursor on the feed yet.
        let mut subscriber = Subscriber::new("a");
        subscriber.add_subscription(Subscription::new(FEED1, SubscriptionMode::Pull, FEED1));
        store.persist_subscriber(&subscriber).unwrap();

        let values = |events: Vec<Arc<Event>>| -> Vec<serde_json::Value> {
            events.iter().map(|e| e.values()["n"].clone()).collect()
        };
        assert_eq!(values(router.poll_subscriber("a").unwrap()), vec![3, 4]);
        assert_eq!(values(router.poll_subscriber("b").unwrap()), vec![3, 4]);
        assert!(router.poll_subscriber("a").unwrap().is_empty());
    }

    #[test]
    fn test_subscriber_snapshot() {
        let (router, _rx, _store) = router();
        router.subscribe("a", FEED1, SubscriptionMode::Push, "https://a/cb").unwrap();

        let subscriber = router.subscriber("a").unwrap().unwrap();
        assert_eq!(subscriber.subscriptions().len(), 1);
        assert_eq!(subscriber.subscriptions()[0].target, "https://a/cb");
        assert!(router.subscriber("b").unwrap().is_none());
        assert_eq!(router.subscriber_identifiers().unwrap(), vec!["a".to_string()]);
    }
}
