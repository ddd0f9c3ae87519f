//! JSON request and response types for the HTTP gateway.

use serde::{Deserialize, Serialize};
use scimhub_core::{PushStats, Subscriber, Subscription};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Number of cached feeds.
    pub feeds: usize,
    /// Number of cached subscribers.
    pub subscribers: usize,
    /// Push queue counters.
    pub push: PushStatsJson,
}

/// Push queue counters as reported by `/health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushStatsJson {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl From<&PushStats> for PushStatsJson {
    fn from(stats: &PushStats) -> Self {
        Self {
            enqueued: stats.enqueued(),
            dropped: stats.dropped(),
            delivered: stats.delivered(),
            failed: stats.failed(),
        }
    }
}

/// Subscription creation request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    /// Feed to subscribe to.
    pub feed_uri: String,
    /// Mode URN.
    pub mode: String,
    /// Callback URL for push. Pull subscriptions default to the feed URI.
    #[serde(default)]
    pub event_uri: Option<String>,
}

/// Subscription creation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    /// Generated subscriber identifier.
    pub id: String,
    /// Subscriber resource URL.
    pub location: String,
}

/// Subscriber resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriberJson {
    pub id: String,
    pub subscriptions: Vec<SubscriptionJson>,
}

/// One subscription of a subscriber, with its mode as a URN.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionJson {
    pub feed_uri: String,
    pub mode: String,
    pub event_uri: String,
}

impl From<&Subscription> for SubscriptionJson {
    fn from(subscription: &Subscription) -> Self {
        Self {
            feed_uri: subscription.feed_uri.clone(),
            mode: subscription.mode.urn().to_string(),
            event_uri: subscription.target.clone(),
        }
    }
}

impl From<Subscriber> for SubscriberJson {
    fn from(subscriber: Subscriber) -> Self {
        Self {
            id: subscriber.identifier().to_string(),
            subscriptions: subscriber
                .subscriptions()
                .iter()
                .map(SubscriptionJson::from)
                .collect(),
        }
    }
}

/// Query string of a subscriber delete.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeQuery {
    /// Remove only the subscriptions to this feed.
    pub feed_uri: Option<String>,
}
