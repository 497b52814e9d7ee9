use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};

use crate::errors::AppError;
use crate::models::DomainEvent;
use crate::services::{events, ledger};
use crate::state::AppState;

/// Flags past-due cash commission and emits one event per flagged entry.
pub async fn sweep_once(state: &AppState) -> Result<usize, AppError> {
    let today = Utc::now().date_naive();
    let flagged = {
        let db = state.db()?;
        ledger::sweep_overdue(&db, today)?
    };

    let count = flagged.len();
    let overdue = flagged
        .into_iter()
        .map(|entry| DomainEvent::CommissionOverdue {
            transaction_id: entry.id,
            provider_id: entry.provider_id,
            commission_owed: entry.commission_owed,
        })
        .collect();
    events::publish_all(state, overdue).await;

    Ok(count)
}

pub async fn start_overdue_sweeper(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.overdue_sweep_secs.max(1));
    info!(every_secs = period.as_secs(), "starting overdue commission sweeper");

    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;

        let span = info_span!("overdue_sweep");
        async {
            match sweep_once(&state).await {
                Ok(0) => {}
                Ok(n) => info!(flagged = n, "overdue sweep finished"),
                Err(e) => error!(error = %e, "overdue sweep failed"),
            }
        }
        .instrument(span)
        .await;
    }
}
