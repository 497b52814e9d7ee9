use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use super::Notifier;
use crate::models::DomainEvent;

/// Posts each event as JSON to an external delivery service.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build notifier client")?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({
                "kind": event.kind(),
                "event": event,
            }))
            .send()
            .await
            .context("failed to deliver notification")?
            .error_for_status()
            .context("notification endpoint returned error")?;

        Ok(())
    }
}
