use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{CommissionConfig, Provider, ProviderTier, RateChange, RateUpdate};
use crate::services::commission;
use crate::services::providers::{self, NewProvider};
use crate::state::AppState;

pub fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// POST /api/admin/providers
pub async fn create_provider(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewProvider>,
) -> Result<(StatusCode, Json<Provider>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    let provider = providers::register_provider(&db, &body, Utc::now().naive_utc())?;
    Ok((StatusCode::CREATED, Json(provider)))
}

// GET /api/admin/providers
pub async fn list_providers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Provider>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    Ok(Json(queries::list_providers(&db)?))
}

#[derive(Deserialize)]
pub struct TierBody {
    pub tier: ProviderTier,
}

// PUT /api/admin/providers/:id/tier
pub async fn set_provider_tier(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TierBody>,
) -> Result<Json<Provider>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    Ok(Json(providers::set_tier(&db, &id, body.tier)?))
}

// GET /api/admin/commission/config
pub async fn get_commission_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CommissionConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    Ok(Json(commission::load_config(&db)?))
}

#[derive(Deserialize)]
pub struct RatesBody {
    pub rates: Vec<RateUpdate>,
    pub changed_by: String,
    pub reason: String,
}

#[derive(Serialize)]
pub struct RatesResponse {
    config: CommissionConfig,
    changes: Vec<RateChange>,
}

// PUT /api/admin/commission/config
pub async fn update_commission_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RatesBody>,
) -> Result<Json<RatesResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let db = state.db()?;
    let (config, changes) = commission::update_rates(
        &db,
        &body.rates,
        &body.changed_by,
        &body.reason,
        Utc::now().naive_utc(),
    )?;
    Ok(Json(RatesResponse { config, changes }))
}

#[derive(Deserialize)]
pub struct ChangesQuery {
    pub limit: Option<i64>,
}

// GET /api/admin/commission/changes
pub async fn get_rate_changes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ChangesQuery>,
) -> Result<Json<Vec<RateChange>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let db = state.db()?;
    Ok(Json(queries::list_rate_changes(&db, limit)?))
}

// GET /api/admin/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    let rx = state.events_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok::<_, Infallible>(
                Event::default().data(data).event(event.kind()),
            ))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "event stream lagged");
            None
        }
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok::<_, Infallible>(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}
