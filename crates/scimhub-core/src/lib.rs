//! scimhub core - feed routing and delivery tracking for SCIM event notifications.
//!
//! Publishers post events naming one or more feeds. The [`Router`] appends each
//! event to those feeds, computes the push callbacks to notify and hands them
//! to the push dispatcher. Pull subscribers read everything past their
//! per-feed cursor on their next poll.

pub mod cache;
pub mod error;
pub mod event;
pub mod feed;
pub mod push;
pub mod retention;
pub mod router;
pub mod store;
pub mod subscription;

pub use cache::{EntityCache, FeedCache, SubscriberCache};
pub use error::Error;
pub use event::{Event, EventType, EVENT_SCHEMA};
pub use feed::{Feed, FeedRecord};
pub use push::{
    DispatchConfig, PushDispatcher, PushHandle, PushJob, PushReceiver, PushStats, PushTransport,
    RecordingTransport,
};
pub use retention::{CompactionResult, RetentionPolicy};
pub use router::{Router, SharedRouter};
pub use store::{MemoryStore, SledStore, Store, StoreConfig};
pub use subscription::{
    Subscriber, Subscription, SubscriptionMode, POLL_MODE_URN, WEB_CALLBACK_MODE_URN,
};
