use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingAction, BookingHistoryEntry, BookingStatus, DomainEvent, PaymentMethod,
};
use crate::services::booking::{self, NewBooking};
use crate::services::gateway::{PaymentInit, PaymentSession, PaymentVerification};
use crate::services::settlement::{self, InvoiceRequest, Settlement};
use crate::services::{events, providers};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let now = Utc::now().naive_utc();
    let booking = {
        let db = state.db()?;
        booking::request_booking(&db, &state.slots, &body, now)?
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let db = state.db()?;
    Ok(Json(booking::get_booking(&db, &id)?))
}

#[derive(Deserialize, Default)]
pub struct TransitionBody {
    pub reason: Option<String>,
}

// POST /api/bookings/:id/actions/:action
pub async fn transition_booking(
    State(state): State<Arc<AppState>>,
    Path((id, action)): Path<(String, String)>,
    body: Option<Json<TransitionBody>>,
) -> Result<Json<Booking>, AppError> {
    let action = BookingAction::parse(&action.to_lowercase()).ok_or_else(|| {
        AppError::Validation(format!(
            "unknown action {action}; expected confirm, decline, cancel, start or complete"
        ))
    })?;
    let reason = body.and_then(|Json(b)| b.reason);

    let now = Utc::now().naive_utc();
    let (updated, from) = {
        let db = state.db()?;
        booking::transition(&db, &id, action, reason.as_deref(), now)?
    };

    events::publish(
        &state,
        DomainEvent::BookingStateChanged {
            booking_id: updated.id.clone(),
            provider_id: updated.provider_id.clone(),
            customer_email: updated.customer_email.clone(),
            from,
            to: updated.status,
        },
    )
    .await;

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct RescheduleBody {
    pub date: NaiveDate,
    pub time: String,
    pub reason: Option<String>,
}

// POST /api/bookings/:id/reschedule
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<Booking>, AppError> {
    let now = Utc::now().naive_utc();
    let updated = {
        let db = state.db()?;
        booking::reschedule(
            &db,
            &state.slots,
            &id,
            body.date,
            &body.time,
            body.reason.as_deref(),
            now,
        )?
    };

    events::publish(
        &state,
        DomainEvent::BookingRescheduled {
            booking_id: updated.id.clone(),
            provider_id: updated.provider_id.clone(),
            customer_email: updated.customer_email.clone(),
            date: updated.date.to_string(),
            time: updated.time.clone(),
        },
    )
    .await;

    Ok(Json(updated))
}

#[derive(Deserialize)]
pub struct CustomerQuery {
    pub email: String,
}

// DELETE /api/bookings/:id?email=
pub async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<CustomerQuery>,
) -> Result<StatusCode, AppError> {
    let db = state.db()?;
    booking::delete_booking(&db, &id, &query.email)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/bookings/:id/history
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookingHistoryEntry>>, AppError> {
    let db = state.db()?;
    Ok(Json(booking::history(&db, &id)?))
}

#[derive(Deserialize)]
pub struct ProviderBookingsQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
}

// GET /api/providers/:id/bookings
pub async fn list_provider_bookings(
    State(state): State<Arc<AppState>>,
    Path(provider_id): Path<String>,
    Query(query): Query<ProviderBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let status = query
        .status
        .as_deref()
        .map(|s| s.to_uppercase())
        .map(|s| match s.as_str() {
            "PENDING" | "CONFIRMED" | "IN_PROGRESS" | "COMPLETED" | "CANCELLED" => {
                Ok(BookingStatus::parse(&s))
            }
            _ => Err(AppError::Validation(format!("unknown booking status {s}"))),
        })
        .transpose()?;

    let db = state.db()?;
    providers::get_provider(&db, &provider_id)?;
    let bookings =
        queries::list_provider_bookings(&db, &provider_id, status, query.date.as_ref())?;
    Ok(Json(bookings))
}

// GET /api/customers/bookings?email=
pub async fn list_customer_bookings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let db = state.db()?;
    let email = query.email.trim().to_lowercase();
    Ok(Json(queries::list_customer_bookings(&db, &email)?))
}

// POST /api/bookings/:id/invoice
pub async fn generate_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<InvoiceRequest>,
) -> Result<(StatusCode, Json<Settlement>), AppError> {
    let booking = {
        let db = state.db()?;
        booking::get_booking(&db, &id)?
    };
    // A settled booking returns its stored invoice without calling the gateway again.
    let reference = body
        .payment_reference
        .as_deref()
        .or(booking.payment_reference.as_deref());
    let verification = match (body.payment_method, reference) {
        (PaymentMethod::Electronic, Some(reference)) if !booking.invoice_generated => {
            Some(verify_reference(&state, reference).await?)
        }
        _ => None,
    };

    let now = Utc::now().naive_utc();
    let settlement = {
        let db = state.db()?;
        settlement::generate_invoice(
            &db,
            &state.rates,
            &id,
            &body,
            verification.as_ref(),
            state.config.commission_due_days,
            now,
        )?
    };

    if !settlement.created {
        return Ok((StatusCode::OK, Json(settlement)));
    }

    events::publish(
        &state,
        DomainEvent::InvoiceGenerated {
            booking_id: settlement.invoice.booking_id.clone(),
            invoice_id: settlement.invoice.id.clone(),
            provider_id: settlement.invoice.provider_id.clone(),
            payment_method: settlement.invoice.payment_method,
            total_amount: settlement.invoice.total_amount,
            commission_owed: settlement.invoice.commission_owed,
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(settlement)))
}

async fn verify_reference(
    state: &AppState,
    reference: &str,
) -> Result<PaymentVerification, AppError> {
    state
        .gateway
        .verify_payment(reference)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))
}

// GET /api/bookings/:id/invoice
pub async fn get_invoice(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Settlement>, AppError> {
    let db = state.db()?;
    booking::get_booking(&db, &id)?;
    Ok(Json(settlement::get_settlement(&db, &id)?))
}

#[derive(Deserialize)]
pub struct PaymentBody {
    pub amount: rust_decimal::Decimal,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    booking_id: String,
    #[serde(flatten)]
    session: PaymentSession,
}

// POST /api/bookings/:id/payment
pub async fn initialize_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PaymentBody>,
) -> Result<Json<PaymentResponse>, AppError> {
    if body.amount <= rust_decimal::Decimal::ZERO {
        return Err(AppError::InvalidAmount(body.amount.to_string()));
    }

    let booking = {
        let db = state.db()?;
        booking::get_booking(&db, &id)?
    };
    if booking.status == BookingStatus::Cancelled || booking.invoice_generated {
        return Err(AppError::InvalidTransition {
            from: booking.status.as_str().to_string(),
            action: "initialize_payment".to_string(),
        });
    }

    let reference = format!("SB-{}", uuid::Uuid::new_v4().simple());
    let init = PaymentInit {
        amount: body.amount,
        reference: reference.clone(),
        email: booking.customer_email.clone(),
        metadata: json!({
            "booking_id": booking.id,
            "provider_id": booking.provider_id,
        }),
    };

    let session = state
        .gateway
        .initialize_payment(&init)
        .await
        .map_err(|e| AppError::Gateway(e.to_string()))?;

    {
        let db = state.db()?;
        queries::set_booking_payment_reference(&db, &booking.id, &session.reference)?;
    }
    tracing::info!(booking_id = %booking.id, reference = %session.reference, "payment initialized");

    Ok(Json(PaymentResponse {
        booking_id: booking.id,
        session,
    }))
}
