use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::admin::check_auth;
use crate::background;
use crate::errors::AppError;
use crate::models::{
    AdminCommissionSummary, DomainEvent, OutstandingCommission, PaymentTransaction,
    ProviderFinancialSummary,
};
use crate::services::{events, ledger, providers};
use crate::state::AppState;

// GET /api/providers/:id/commission/outstanding
pub async fn get_outstanding(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<OutstandingCommission>, AppError> {
    let db = state.db()?;
    providers::get_provider(&db, &provider_id)?;
    Ok(Json(ledger::outstanding_commission(&db, &provider_id)?))
}

// GET /api/providers/:id/summary
pub async fn get_provider_summary(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<ProviderFinancialSummary>, AppError> {
    let db = state.db()?;
    Ok(Json(ledger::provider_summary(&db, &provider_id)?))
}

// GET /api/admin/commission/summary
pub async fn get_admin_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<AdminCommissionSummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    Ok(Json(ledger::admin_summary(&db)?))
}

#[derive(Deserialize)]
pub struct CollectBody {
    pub collection_method: String,
}

// POST /api/admin/transactions/:id/collect
pub async fn mark_collected(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CollectBody>,
) -> Result<Json<PaymentTransaction>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let now = Utc::now().naive_utc();
    let (entry, changed) = {
        let db = state.db()?;
        ledger::mark_collected(&db, &id, &body.collection_method, now)?
    };

    if changed {
        events::publish(
            &state,
            DomainEvent::CommissionCollected {
                transaction_id: entry.id.clone(),
                provider_id: entry.provider_id.clone(),
                amount: entry.commission_owed,
            },
        )
        .await;
    }

    Ok(Json(entry))
}

// POST /api/admin/transactions/:id/overdue
pub async fn flag_overdue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PaymentTransaction>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let today = Utc::now().date_naive();
    let (entry, changed) = {
        let db = state.db()?;
        ledger::flag_overdue(&db, &id, today)?
    };

    if changed {
        events::publish(
            &state,
            DomainEvent::CommissionOverdue {
                transaction_id: entry.id.clone(),
                provider_id: entry.provider_id.clone(),
                commission_owed: entry.commission_owed,
            },
        )
        .await;
    }

    Ok(Json(entry))
}

#[derive(Serialize)]
pub struct SweepResponse {
    flagged: usize,
}

// POST /api/admin/commission/sweep
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SweepResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let flagged = background::sweep_once(&state).await?;
    Ok(Json(SweepResponse { flagged }))
}
