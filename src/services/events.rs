use crate::models::DomainEvent;
use crate::state::AppState;

/// Fans an event out to live subscribers and the notifier. Delivery failures
/// are logged and never fail the request that produced the event.
pub async fn publish(state: &AppState, event: DomainEvent) {
    // No subscribers is fine.
    let _ = state.events_tx.send(event.clone());

    if let Err(e) = state.notifier.notify(&event).await {
        tracing::error!(error = %e, kind = event.kind(), "failed to deliver notification");
    }
}

pub async fn publish_all(state: &AppState, events: Vec<DomainEvent>) {
    for event in events {
        publish(state, event).await;
    }
}
