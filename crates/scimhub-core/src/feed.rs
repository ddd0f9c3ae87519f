//! Feeds: named topics with an append-only event log and pull cursors.
//!
//! A feed knows its subscribers only by identifier. Push subscribers are kept
//! together with their callback targets so an append can compute the push set
//! without touching any subscriber. Pull subscribers are exactly the keys of
//! the cursor map.
//!
//! Cursors are absolute offsets into the log. Compaction drops a prefix of the
//! log and raises `base`, so for every pull subscriber
//! `base <= cursor <= base + log.len()` holds.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::retention::RetentionPolicy;
use crate::subscription::{Subscription, SubscriptionMode};

/// A named topic.
#[derive(Debug, Clone)]
pub struct Feed {
    uri: String,
    /// Push subscriber -> callback targets bound to this feed.
    push_targets: BTreeMap<String, Vec<String>>,
    /// Pull subscriber -> absolute offset of the next unread event.
    cursors: BTreeMap<String, u64>,
    /// Absolute offset of `log[0]`.
    base: u64,
    log: VecDeque<Arc<Event>>,
}

/// Outcome of compacting one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedCompaction {
    pub events_dropped: u64,
    pub cursors_advanced: u64,
}

impl Feed {
    /// Create an empty feed.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            push_targets: BTreeMap::new(),
            cursors: BTreeMap::new(),
            base: 0,
            log: VecDeque::new(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Absolute offset of the first retained event.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Absolute offset one past the last event.
    pub fn end(&self) -> u64 {
        self.base + self.log.len() as u64
    }

    /// Register a subscription's owner on this feed.
    ///
    /// A new pull subscriber starts reading at the current end of the log.
    /// An existing cursor for the same subscriber is left untouched.
    pub fn add_subscriber(&mut self, subscriber_id: &str, subscription: &Subscription) {
        match subscription.mode {
            SubscriptionMode::Push => {
                self.push_targets
                    .entry(subscriber_id.to_string())
                    .or_default()
                    .push(subscription.target.clone());
            }
            SubscriptionMode::Pull => {
                let end = self.end();
                self.cursors.entry(subscriber_id.to_string()).or_insert(end);
            }
        }
    }

    /// Remove a subscriber together with its targets and cursor.
    ///
    /// Returns false if it was not subscribed.
    pub fn remove_subscriber(&mut self, subscriber_id: &str) -> bool {
        let pushed = self.push_targets.remove(subscriber_id).is_some();
        let pulled = self.cursors.remove(subscriber_id).is_some();
        pushed || pulled
    }

    pub fn has_subscribers(&self) -> bool {
        !self.push_targets.is_empty() || !self.cursors.is_empty()
    }

    /// The pull cursor of a subscriber, if it has one.
    pub fn cursor(&self, subscriber_id: &str) -> Option<u64> {
        self.cursors.get(subscriber_id).copied()
    }

    /// Append an event and return the push targets to notify.
    ///
    /// Pull subscribers are not touched: the event is simply past their cursor.
    pub fn append(&mut self, event: Arc<Event>) -> Vec<String> {
        self.log.push_back(event);
        self.push_targets.values().flatten().cloned().collect()
    }

    /// Return the events the subscriber has not read yet and mark them read.
    ///
    /// A subscriber without a cursor reads from the start of the retained log.
    pub fn poll(&mut self, subscriber_id: &str) -> Vec<Arc<Event>> {
        let end = self.end();
        let cursor = self
            .cursors
            .entry(subscriber_id.to_string())
            .or_insert(self.base);
        let start = (*cursor).max(self.base);
        *cursor = end;

        let skip = (start - self.base) as usize;
        self.log.range(skip..).cloned().collect()
    }

    /// Drop events according to the retention policy.
    pub fn compact(&mut self, policy: &RetentionPolicy) -> FeedCompaction {
        let end = self.end();
        let mut new_base = self.base;

        if policy.drop_consumed {
            let consumed = self.cursors.values().copied().min().unwrap_or(end);
            new_base = new_base.max(consumed);
        }
        if let Some(max) = policy.max_events {
            new_base = new_base.max(end.saturating_sub(max as u64));
        }
        if new_base <= self.base {
            return FeedCompaction::default();
        }

        let events_dropped = new_base - self.base;
        self.log.drain(..events_dropped as usize);
        self.base = new_base;

        let mut cursors_advanced = 0;
        for cursor in self.cursors.values_mut() {
            if *cursor < new_base {
                *cursor = new_base;
                cursors_advanced += 1;
            }
        }

        FeedCompaction {
            events_dropped,
            cursors_advanced,
        }
    }

    /// Snapshot the feed header for persistence.
    ///
    /// Events are not part of the record; stores keep them keyed by offset.
    pub fn to_record(&self) -> FeedRecord {
        FeedRecord {
            uri: self.uri.clone(),
            base: self.base,
            cursors: self.cursors.clone(),
            push_targets: self.push_targets.clone(),
        }
    }

    /// Rebuild a feed from its persisted header and `(offset, event)` pairs.
    ///
    /// Pairs must be in offset order. Events below the record's base are
    /// leftovers of an interrupted truncation and are skipped.
    pub fn from_parts(
        record: FeedRecord,
        events: impl IntoIterator<Item = (u64, Arc<Event>)>,
    ) -> Self {
        let base = record.base;
        Self {
            uri: record.uri,
            push_targets: record.push_targets,
            cursors: record.cursors,
            base,
            log: events
                .into_iter()
                .filter(|(offset, _)| *offset >= base)
                .map(|(_, event)| event)
                .collect(),
        }
    }
}

/// Persisted header of a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedRecord {
    pub uri: String,
    pub base: u64,
    /// Last-seen position per pull subscriber.
    pub cursors: BTreeMap<String, u64>,
    pub push_targets: BTreeMap<String, Vec<String>>,
}
