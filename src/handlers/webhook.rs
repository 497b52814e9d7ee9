use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::DomainEvent;
use crate::services::events;
use crate::services::gateway::{validate_signature, GatewayWebhook};
use crate::services::ledger::{self, GatewayOutcome};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

// POST /webhook/payment
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // Skip signature validation if no secret is configured (dev mode)
    if !state.config.gateway_secret_key.is_empty() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if signature.is_empty() {
            tracing::warn!("missing gateway signature header");
            return Err(AppError::Unauthorized);
        }
        if !validate_signature(&state.config.gateway_secret_key, signature, &body) {
            tracing::warn!("invalid gateway signature");
            return Err(AppError::Unauthorized);
        }
    }

    let event: GatewayWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid webhook payload: {e}")))?;

    tracing::info!(reference = %event.reference, status = %event.status, "gateway webhook");

    let outcome = {
        let db = state.db()?;
        ledger::apply_gateway_event(&db, &event, Utc::now().naive_utc())?
    };

    let (matched, applied) = match &outcome {
        GatewayOutcome::Transaction(entry, collected) => {
            if *collected {
                events::publish(
                    &state,
                    DomainEvent::CommissionCollected {
                        transaction_id: entry.id.clone(),
                        provider_id: entry.provider_id.clone(),
                        amount: entry.platform_commission,
                    },
                )
                .await;
            }
            (true, true)
        }
        GatewayOutcome::Booking(_) => (true, true),
        GatewayOutcome::Ignored => (true, false),
        GatewayOutcome::Unmatched => (false, false),
    };

    Ok(Json(json!({"ok": true, "matched": matched, "applied": applied})))
}
