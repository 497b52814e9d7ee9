pub mod webhook;

use async_trait::async_trait;

use crate::models::DomainEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Used when no delivery endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &DomainEvent) -> anyhow::Result<()> {
        tracing::info!(kind = event.kind(), ?event, "notification");
        Ok(())
    }
}
