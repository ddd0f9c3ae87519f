//! Subscriptions and the subscribers that own them.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Wire name of pull delivery.
pub const POLL_MODE_URN: &str = "urn:ietf:params:scimnotify:api:messages:2.0:poll";

/// Wire name of push delivery.
pub const WEB_CALLBACK_MODE_URN: &str = "urn:ietf:params:scimnotify:api:messages:2.0:webCallback";

/// How a subscriber receives the events of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    /// Subscriber retrieves events by polling.
    Pull,
    /// Events are pushed to the subscription target.
    Push,
}

impl SubscriptionMode {
    /// Resolve a mode from its URN.
    pub fn from_urn(urn: &str) -> Result<Self, Error> {
        match urn {
            POLL_MODE_URN => Ok(SubscriptionMode::Pull),
            WEB_CALLBACK_MODE_URN => Ok(SubscriptionMode::Push),
            other => Err(Error::InvalidInput(format!(
                "unknown subscription mode: {}",
                other
            ))),
        }
    }

    /// The URN naming this mode.
    pub fn urn(&self) -> &'static str {
        match self {
            SubscriptionMode::Pull => POLL_MODE_URN,
            SubscriptionMode::Push => WEB_CALLBACK_MODE_URN,
        }
    }
}

/// A subscriber's binding to one feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Feed the subscription is bound to.
    pub feed_uri: String,
    /// Delivery mode.
    pub mode: SubscriptionMode,
    /// Callback address for push, echo reference for pull.
    pub target: String,
}

impl Subscription {
    /// Create a new subscription.
    pub fn new(feed_uri: impl Into<String>, mode: SubscriptionMode, target: impl Into<String>) -> Self {
        Self {
            feed_uri: feed_uri.into(),
            mode,
            target: target.into(),
        }
    }

    pub fn is_pull(&self) -> bool {
        self.mode == SubscriptionMode::Pull
    }
}

/// An identity owning a set of subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    identifier: String,
    subscriptions: Vec<Subscription>,
}

impl Subscriber {
    /// Create a subscriber without subscriptions.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            subscriptions: Vec::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Add a subscription. Duplicates are kept.
    pub fn add_subscription(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Remove every subscription bound to `feed_uri`.
    ///
    /// Returns false if there was none.
    pub fn remove_subscriptions(&mut self, feed_uri: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.feed_uri != feed_uri);
        self.subscriptions.len() != before
    }

    /// Distinct feeds this subscriber pulls from, in subscription order.
    pub fn pull_feeds(&self) -> Vec<String> {
        let mut feeds: Vec<String> = Vec::new();
        for subscription in self.subscriptions.iter().filter(|s| s.is_pull()) {
            if !feeds.contains(&subscription.feed_uri) {
                feeds.push(subscription.feed_uri.clone());
            }
        }
        feeds
    }

    /// Distinct feeds this subscriber is bound to, in subscription order.
    pub fn feeds(&self) -> Vec<String> {
        let mut feeds: Vec<String> = Vec::new();
        for subscription in &self.subscriptions {
            if !feeds.contains(&subscription.feed_uri) {
                feeds.push(subscription.feed_uri.clone());
            }
        }
        feeds
    }

    /// Whether the subscriber holds no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
