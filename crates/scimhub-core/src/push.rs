//! Fire-and-forget push delivery.
//!
//! The router hands each ingested event and its push targets to a
//! [`PushHandle`]. The handle enqueues a [`PushJob`] on a bounded channel and
//! returns immediately; a [`PushDispatcher`] worker task drains the channel and
//! calls the [`PushTransport`]. There is no acknowledgement channel back to the
//! router. A full queue drops the job, transport errors are logged, and nothing
//! is retried here.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::event::Event;

/// Default capacity of the push queue.
pub const DEFAULT_PUSH_QUEUE_CAPACITY: usize = 1024;

/// Delivers an event to a set of callback targets.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Deliver `event` to every target.
    async fn send(&self, targets: &[String], event: &Event) -> Result<(), Error>;
}

/// One unit of push work.
#[derive(Debug, Clone)]
pub struct PushJob {
    pub targets: Vec<String>,
    pub event: Arc<Event>,
}

/// Push dispatch configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Jobs buffered before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_PUSH_QUEUE_CAPACITY,
        }
    }
}

impl DispatchConfig {
    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Push counters shared by the handle and the dispatcher.
#[derive(Debug, Default)]
pub struct PushStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl PushStats {
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Receiver side of the push queue.
pub type PushReceiver = mpsc::Receiver<PushJob>;

/// Cloneable sender side of the push queue.
#[derive(Clone)]
pub struct PushHandle {
    tx: mpsc::Sender<PushJob>,
    stats: Arc<PushStats>,
}

impl PushHandle {
    /// Create a handle and the receiver it feeds, without starting a worker.
    pub fn channel(capacity: usize) -> (Self, PushReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            tx,
            stats: Arc::new(PushStats::default()),
        };
        (handle, rx)
    }

    /// Enqueue a push job without waiting.
    ///
    /// Returns false if the job was dropped because the queue is full or closed.
    pub fn dispatch(&self, targets: Vec<String>, event: Arc<Event>) -> bool {
        let target_count = targets.len();
        match self.tx.try_send(PushJob { targets, event }) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(targets = target_count, "push queue full, dropping notification");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(targets = target_count, "push dispatcher stopped, dropping notification");
                false
            }
        }
    }

    pub fn stats(&self) -> &Arc<PushStats> {
        &self.stats
    }
}

/// Worker draining the push queue into a transport.
pub struct PushDispatcher {
    rx: PushReceiver,
    transport: Arc<dyn PushTransport>,
    stats: Arc<PushStats>,
}

impl PushDispatcher {
    /// Create a dispatcher for the receiver of `handle`.
    pub fn new(rx: PushReceiver, transport: Arc<dyn PushTransport>, handle: &PushHandle) -> Self {
        Self {
            rx,
            transport,
            stats: handle.stats.clone(),
        }
    }

    /// Spawn a dispatcher task and return the handle feeding it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(transport: Arc<dyn PushTransport>, config: DispatchConfig) -> PushHandle {
        let (handle, rx) = PushHandle::channel(config.queue_capacity);
        let dispatcher = PushDispatcher::new(rx, transport, &handle);

        tokio::spawn(async move {
            dispatcher.run().await;
        });

        handle
    }

    /// Process jobs until every handle is dropped.
    pub async fn run(mut self) {
        info!("push dispatcher started");

        while let Some(job) = self.rx.recv().await {
            self.deliver(&job).await;
        }

        info!("push dispatcher stopped (channel closed)");
    }

    async fn deliver(&self, job: &PushJob) {
        debug!(targets = job.targets.len(), "delivering push notification");

        match self.transport.send(&job.targets, &job.event).await {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, targets = ?job.targets, "push delivery failed");
            }
        }
    }
}

/// Transport that records every send instead of delivering it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(Vec<String>, Event)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded `(targets, event)` pair, in send order.
    pub fn sent(&self) -> Vec<(Vec<String>, Event)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send(&self, targets: &[String], event: &Event) -> Result<(), Error> {
        self.sent.lock().push((targets.to_vec(), event.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    struct FailingTransport;

    #[async_trait]
    impl PushTransport for FailingTransport {
        async fn send(&self, _targets: &[String], _event: &Event) -> Result<(), Error> {
            Err(Error::Transport("connection refused".to_string()))
        }
    }

    fn event() -> Arc<Event> {
        Arc::new(Event::new(EventType::Create).with_feed("f1"))
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_jobs() {
        let transport = Arc::new(RecordingTransport::new());
        let (handle, rx) = PushHandle::channel(10);
        let dispatcher = PushDispatcher::new(rx, transport.clone(), &handle);

        assert!(handle.dispatch(vec!["https://a/cb".to_string()], event()));
        assert!(handle.dispatch(Vec::new(), event()));
        let stats = handle.stats().clone();
        drop(handle);

        dispatcher.run().await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, vec!["https://a/cb".to_string()]);
        assert!(sent[1].0.is_empty());
        assert_eq!(stats.delivered(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (handle, _rx) = PushHandle::channel(1);

        assert!(handle.dispatch(Vec::new(), event()));
        assert!(!handle.dispatch(Vec::new(), event()));
        assert_eq!(handle.stats().enqueued(), 1);
        assert_eq!(handle.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_closed_queue_drops() {
        let (handle, rx) = PushHandle::channel(4);
        drop(rx);

        assert!(!handle.dispatch(Vec::new(), event()));
        assert_eq!(handle.stats().dropped(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_counted() {
        let (handle, rx) = PushHandle::channel(4);
        let dispatcher = PushDispatcher::new(rx, Arc::new(FailingTransport), &handle);

        handle.dispatch(vec!["https://a/cb".to_string()], event());
        let stats = handle.stats().clone();
        drop(handle);

        dispatcher.run().await;
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
    }

    #[tokio::test]
    async fn test_start_spawns_worker() {
        let transport = Arc::new(RecordingTransport::new());
        let handle = PushDispatcher::start(transport.clone(), DispatchConfig::default());

        handle.dispatch(vec!["https://a/cb".to_string()], event());

        for _ in 0..50 {
            if !transport.sent().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(transport.sent().len(), 1);
    }
}
