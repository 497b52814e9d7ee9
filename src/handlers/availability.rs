use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{Availability, BlockedSlot, DaySchedule};
use crate::services::availability::{self, NewBlockedSlot};
use crate::services::providers;
use crate::state::AppState;

// GET /api/providers/:id/availability
pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
) -> Result<Json<Availability>, AppError> {
    let db = state.db()?;
    let avail = availability::get_availability(&db, &provider_id)?;
    let effective = match avail {
        Some(a) => Some(a),
        None => state.slots.effective_availability(&db, &provider_id)?,
    };
    effective.map(Json).ok_or_else(|| {
        AppError::Validation(format!("provider {provider_id} has not published availability"))
    })
}

// PUT /api/providers/:id/availability
#[derive(Deserialize)]
pub struct WorkingHoursBody {
    pub working_hours: BTreeMap<String, DaySchedule>,
}

pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Json(body): Json<WorkingHoursBody>,
) -> Result<Json<Availability>, AppError> {
    let db = state.db()?;
    let avail = availability::set_working_hours(&db, &provider_id, &body.working_hours)?;
    Ok(Json(avail))
}

// POST /api/providers/:id/blocked-slots
pub async fn add_blocked_slot(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Json(body): Json<NewBlockedSlot>,
) -> Result<(StatusCode, Json<BlockedSlot>), AppError> {
    let db = state.db()?;
    let today = Utc::now().date_naive();
    let slot = availability::add_blocked_slot(&db, &provider_id, &body, today)?;
    Ok((StatusCode::CREATED, Json(slot)))
}

// DELETE /api/providers/:id/blocked-slots/:slot_id
pub async fn remove_blocked_slot(
    State(state): State<Arc<AppState>>,
    Path((provider_id, slot_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let db = state.db()?;
    availability::remove_blocked_slot(&db, &provider_id, &slot_id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    provider_id: String,
    date: NaiveDate,
    slots: Vec<String>,
}

// GET /api/providers/:id/slots?date=YYYY-MM-DD
pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let db = state.db()?;
    providers::get_provider(&db, &provider_id)?;
    let today = Utc::now().date_naive();
    let slots = state
        .slots
        .available_slots(&db, &provider_id, query.date, today)?;

    Ok(Json(SlotsResponse {
        provider_id,
        date: query.date,
        slots,
    }))
}

#[derive(Serialize)]
pub struct BookableResponse {
    date: NaiveDate,
    bookable: bool,
}

// GET /api/providers/:id/bookable?date=YYYY-MM-DD
pub async fn is_bookable(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<DateQuery>,
) -> Result<Json<BookableResponse>, AppError> {
    let db = state.db()?;
    providers::get_provider(&db, &provider_id)?;
    let today = Utc::now().date_naive();
    let bookable = state
        .slots
        .is_date_bookable(&db, &provider_id, query.date, today)?;

    Ok(Json(BookableResponse {
        date: query.date,
        bookable,
    }))
}
