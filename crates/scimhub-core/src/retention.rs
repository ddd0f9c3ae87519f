//! Event log retention and compaction results.

use std::time::Duration;

/// Controls which events a compaction pass may drop from feed logs.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Drop events every pull subscriber of the feed has already consumed.
    pub drop_consumed: bool,

    /// Keep at most N events per feed. None means unlimited.
    /// Pull subscribers lagging behind the cap lose the dropped events.
    pub max_events: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            drop_consumed: true,
            max_events: None,
        }
    }
}

impl RetentionPolicy {
    /// Keep every event forever.
    pub fn keep_all() -> Self {
        Self {
            drop_consumed: false,
            max_events: None,
        }
    }

    /// Drop consumed events and cap each log at `max` events.
    pub fn with_max_events(max: usize) -> Self {
        Self {
            max_events: Some(max),
            ..Default::default()
        }
    }

    /// Set whether consumed events are dropped.
    pub fn drop_consumed(mut self, drop: bool) -> Self {
        self.drop_consumed = drop;
        self
    }

    /// Whether this policy can ever drop anything.
    pub fn is_noop(&self) -> bool {
        !self.drop_consumed && self.max_events.is_none()
    }
}

/// Result of a compaction run.
#[derive(Debug, Clone, Default)]
pub struct CompactionResult {
    /// Number of feeds examined.
    pub feeds_visited: u64,

    /// Number of events removed across all feeds.
    pub events_dropped: u64,

    /// Number of pull cursors moved forward by the event cap.
    pub cursors_advanced: u64,

    /// Duration of the compaction run.
    pub duration: Duration,

    /// Number of feeds whose new state could not be persisted.
    pub errors: u64,
}

impl CompactionResult {
    /// Check if any cleanup was performed.
    pub fn did_cleanup(&self) -> bool {
        self.events_dropped > 0
    }
}
