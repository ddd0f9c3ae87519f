//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use scimhub_core::{DispatchConfig, RetentionPolicy, StoreConfig};

/// SCIM notification hub HTTP gateway command line arguments.
#[derive(Debug, Parser)]
#[command(name = "scimhub-gateway")]
#[command(about = "HTTP gateway for the SCIM event notification hub")]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    pub listen: String,

    /// Directory holding the feed and subscriber store.
    #[arg(short, long, default_value = "./scimhub-data")]
    pub data: PathBuf,

    /// Keep all state in memory instead of on disk.
    #[arg(long)]
    pub in_memory: bool,

    /// Public base URL used to build subscription `Location` headers.
    #[arg(long, default_value = "http://localhost:8080")]
    pub base_url: String,

    /// Timeout (ms) for a single webhook delivery.
    #[arg(long, default_value_t = 10_000)]
    pub push_timeout_ms: u64,

    /// Push jobs buffered before new ones are dropped.
    #[arg(long, default_value_t = scimhub_core::push::DEFAULT_PUSH_QUEUE_CAPACITY)]
    pub push_queue_capacity: usize,

    /// Seconds between feed log compaction passes. 0 disables compaction.
    #[arg(long, default_value_t = 60)]
    pub compaction_interval_secs: u64,

    /// Maximum events retained per feed, unread or not.
    #[arg(long)]
    pub max_feed_events: Option<usize>,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Store directory, or `None` for an in-memory store.
    pub data_path: Option<PathBuf>,
    /// Public base URL, without a trailing slash.
    pub base_url: String,
    /// Timeout for a single webhook delivery.
    pub push_timeout: Duration,
    /// Push queue capacity.
    pub push_queue_capacity: usize,
    /// Interval between compaction passes, `None` when disabled.
    pub compaction_interval: Option<Duration>,
    /// Per-feed cap on retained events.
    pub max_feed_events: Option<usize>,
}

impl GatewayConfig {
    /// Store configuration, if the gateway persists to disk.
    pub fn store_config(&self) -> Option<StoreConfig> {
        self.data_path.as_ref().map(|path| StoreConfig::new(path.clone()))
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::default().with_queue_capacity(self.push_queue_capacity)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        match self.max_feed_events {
            Some(max) => RetentionPolicy::with_max_events(max),
            None => RetentionPolicy::default(),
        }
    }

    /// The `Location` of a subscriber resource.
    pub fn subscription_location(&self, id: &str) -> String {
        format!("{}/Subscriptions/{}", self.base_url, id)
    }
}

impl From<&Args> for GatewayConfig {
    fn from(args: &Args) -> Self {
        let compaction_interval = match args.compaction_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Self {
            listen_addr: args.listen.clone(),
            data_path: if args.in_memory {
                None
            } else {
                Some(args.data.clone())
            },
            base_url: args.base_url.trim_end_matches('/').to_string(),
            push_timeout: Duration::from_millis(args.push_timeout_ms),
            push_queue_capacity: args.push_queue_capacity,
            compaction_interval,
            max_feed_events: args.max_feed_events,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            data_path: None,
            base_url: "http://localhost:8080".to_string(),
            push_timeout: Duration::from_secs(10),
            push_queue_capacity: scimhub_core::push::DEFAULT_PUSH_QUEUE_CAPACITY,
            compaction_interval: Some(Duration::from_secs(60)),
            max_feed_events: None,
        }
    }
}
