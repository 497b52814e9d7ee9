use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::{
    Booking, BookingAction, BookingHistoryEntry, BookingStatus, PaymentMethod, PaymentStatus,
};
use crate::services::slots::SlotAllocator;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub provider_id: String,
    pub date: NaiveDate,
    pub time: String,
    pub customer_email: String,
    pub customer_name: String,
    #[serde(default)]
    pub service_name: String,
    pub notes: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

pub fn get_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?.ok_or_else(|| AppError::BookingNotFound(id.to_string()))
}

/// Creates a PENDING booking. The check and the insert run in one transaction,
/// and the active-slot unique index turns a lost race into `SlotConflict`.
pub fn request_booking(
    conn: &Connection,
    slots: &SlotAllocator,
    req: &NewBooking,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    if req.customer_email.trim().is_empty() || req.customer_name.trim().is_empty() {
        return Err(AppError::Validation(
            "customer email and name are required".to_string(),
        ));
    }

    let tx = conn.unchecked_transaction()?;

    if queries::get_provider(&tx, &req.provider_id)?.is_none() {
        return Err(AppError::ProviderNotFound(req.provider_id.clone()));
    }

    slots.check_slot(&tx, &req.provider_id, req.date, &req.time, now.date(), None)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        provider_id: req.provider_id.clone(),
        customer_email: req.customer_email.trim().to_lowercase(),
        customer_name: req.customer_name.trim().to_string(),
        service_name: req.service_name.trim().to_string(),
        date: req.date,
        time: req.time.clone(),
        status: BookingStatus::Pending,
        payment_method: req.payment_method.unwrap_or(PaymentMethod::Cash),
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
        total_amount: Decimal::ZERO,
        platform_commission: Decimal::ZERO,
        provider_payout: Decimal::ZERO,
        commission_owed: Decimal::ZERO,
        invoice_generated: false,
        invoice_id: None,
        service_completion_date: None,
        notes: req.notes.clone(),
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::insert_booking(&tx, &booking) {
        if is_unique_violation(&e) {
            return Err(slot_conflict(&booking.date, &booking.time));
        }
        return Err(e.into());
    }

    let slot = format!("{} {}", booking.date, booking.time);
    queries::insert_booking_history(
        &tx,
        &booking.id,
        "request",
        BookingStatus::Pending,
        BookingStatus::Pending,
        None,
        Some(&slot),
        &now,
    )?;

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        provider_id = %booking.provider_id,
        date = %booking.date,
        time = %booking.time,
        "booking requested"
    );

    Ok(booking)
}

/// Applies `action` and returns the updated booking plus the status it left.
pub fn transition(
    conn: &Connection,
    booking_id: &str,
    action: BookingAction,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<(Booking, BookingStatus), AppError> {
    let tx = conn.unchecked_transaction()?;
    let booking = get_booking(&tx, booking_id)?;
    let from = booking.status;

    let to = action
        .next_status(from)
        .ok_or_else(|| invalid_transition(from, action.as_str()))?;

    let completed_at = (to == BookingStatus::Completed).then_some(now);
    if !queries::transition_booking_status(&tx, booking_id, from, to, completed_at.as_ref())? {
        // Another writer moved the booking first.
        let current = get_booking(&tx, booking_id)?;
        return Err(invalid_transition(current.status, action.as_str()));
    }

    queries::insert_booking_history(
        &tx,
        booking_id,
        action.as_str(),
        from,
        to,
        reason,
        None,
        &now,
    )?;

    let updated = get_booking(&tx, booking_id)?;
    tx.commit()?;

    tracing::info!(
        booking_id,
        from = from.as_str(),
        to = to.as_str(),
        action = action.as_str(),
        "booking transitioned"
    );

    Ok((updated, from))
}

/// Moves a PENDING or CONFIRMED booking to a new slot, re-running the same
/// checks as a new request against every booking but itself.
pub fn reschedule(
    conn: &Connection,
    slots: &SlotAllocator,
    booking_id: &str,
    new_date: NaiveDate,
    new_time: &str,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.unchecked_transaction()?;
    let booking = get_booking(&tx, booking_id)?;

    if !booking.status.can_reschedule() {
        return Err(invalid_transition(booking.status, "reschedule"));
    }

    slots.check_slot(
        &tx,
        &booking.provider_id,
        new_date,
        new_time,
        now.date(),
        Some(booking_id),
    )?;

    match queries::update_booking_slot(&tx, booking_id, &new_date, new_time) {
        Ok(true) => {}
        Ok(false) => {
            let current = get_booking(&tx, booking_id)?;
            return Err(invalid_transition(current.status, "reschedule"));
        }
        Err(e) if is_unique_violation(&e) => return Err(slot_conflict(&new_date, new_time)),
        Err(e) => return Err(e.into()),
    }

    let detail = format!(
        "{} {} -> {} {}",
        booking.date, booking.time, new_date, new_time
    );
    queries::insert_booking_history(
        &tx,
        booking_id,
        "reschedule",
        booking.status,
        booking.status,
        reason,
        Some(&detail),
        &now,
    )?;

    let updated = get_booking(&tx, booking_id)?;
    tx.commit()?;

    tracing::info!(booking_id, %detail, "booking rescheduled");

    Ok(updated)
}

/// Customer-initiated removal, allowed only before confirmation.
pub fn delete_booking(
    conn: &Connection,
    booking_id: &str,
    customer_email: &str,
) -> Result<(), AppError> {
    let tx = conn.unchecked_transaction()?;
    let booking = get_booking(&tx, booking_id)?;

    if !booking
        .customer_email
        .eq_ignore_ascii_case(customer_email.trim())
    {
        return Err(AppError::BookingNotFound(booking_id.to_string()));
    }
    if booking.status != BookingStatus::Pending {
        return Err(invalid_transition(booking.status, "delete"));
    }
    if !queries::delete_pending_booking(&tx, booking_id)? {
        let current = get_booking(&tx, booking_id)?;
        return Err(invalid_transition(current.status, "delete"));
    }

    tx.commit()?;
    tracing::info!(booking_id, "booking deleted by customer");
    Ok(())
}

pub fn history(conn: &Connection, booking_id: &str) -> Result<Vec<BookingHistoryEntry>, AppError> {
    get_booking(conn, booking_id)?;
    Ok(queries::get_booking_history(conn, booking_id)?)
}

fn invalid_transition(from: BookingStatus, action: &str) -> AppError {
    AppError::InvalidTransition {
        from: from.as_str().to_string(),
        action: action.to_string(),
    }
}

fn slot_conflict(date: &NaiveDate, time: &str) -> AppError {
    AppError::SlotConflict {
        date: date.to_string(),
        time: time.to_string(),
    }
}
