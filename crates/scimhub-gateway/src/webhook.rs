//! Webhook push transport.

use std::time::Duration;

use async_trait::async_trait;
use scimhub_core::{Error, Event, PushTransport};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Delivers events by POSTing the event document to each callback URL.
#[derive(Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
}

impl WebhookTransport {
    /// Create a transport whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PushTransport for WebhookTransport {
    async fn send(&self, targets: &[String], event: &Event) -> Result<(), Error> {
        if targets.is_empty() {
            return Ok(());
        }

        let body = event.to_json();
        let mut requests = JoinSet::new();
        for target in targets {
            let client = self.client.clone();
            let body = body.clone();
            let target = target.clone();
            requests.spawn(async move {
                let result = client
                    .post(&target)
                    .json(&body)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status());
                (target, result)
            });
        }

        let mut failed = 0usize;
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok((target, Ok(response))) => {
                    debug!(target = %target, status = %response.status(), "webhook delivered");
                }
                Ok((target, Err(e))) => {
                    failed += 1;
                    warn!(target = %target, error = %e, "webhook delivery failed");
                }
                Err(e) => {
                    failed += 1;
                    warn!(error = %e, "webhook task failed");
                }
            }
        }

        if failed > 0 {
            return Err(Error::Transport(format!(
                "{} of {} webhook deliveries failed",
                failed,
                targets.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scimhub_core::EventType;

    #[tokio::test]
    async fn test_no_targets_is_ok() {
        let transport = WebhookTransport::new(Duration::from_millis(100)).unwrap();
        let event = Event::new(EventType::Create).with_feed("f1");
        assert!(transport.send(&[], &event).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target_fails() {
        let transport = WebhookTransport::new(Duration::from_millis(200)).unwrap();
        let event = Event::new(EventType::Create).with_feed("f1");
        let result = transport
            .send(&["http://127.0.0.1:9/callback".to_string()], &event)
            .await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }
}
