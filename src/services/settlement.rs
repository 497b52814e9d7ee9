use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::{is_unique_violation, AppError};
use crate::models::{
    Booking, BookingStatus, CommissionStatus, Invoice, PaymentMethod, PaymentStatus,
    PaymentTransaction, ServiceType,
};
use crate::services::commission::{self, RateResolver};
use crate::services::gateway::PaymentVerification;

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceRequest {
    pub service_price: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub invoice: Invoice,
    pub transaction: PaymentTransaction,
    /// False when an earlier call already settled the booking.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub platform_commission: Decimal,
    pub provider_payout: Decimal,
    pub commission_owed: Decimal,
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Electronic payments have the commission deducted at source. Cash leaves the
/// full price with the provider, who then owes the commission.
pub fn split(price: Decimal, rate: Decimal, method: PaymentMethod) -> Split {
    let commission = round_money(price * rate);
    match method {
        PaymentMethod::Electronic => Split {
            platform_commission: commission,
            provider_payout: price - commission,
            commission_owed: Decimal::ZERO,
        },
        PaymentMethod::Cash => Split {
            platform_commission: commission,
            provider_payout: price,
            commission_owed: commission,
        },
    }
}

pub fn invoice_number(now: NaiveDateTime) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("INV-{}-{}", now.format("%Y%m%d"), suffix)
}

fn existing_settlement(conn: &Connection, booking_id: &str) -> Result<Option<Settlement>, AppError> {
    let Some(invoice) = queries::get_invoice_by_booking(conn, booking_id)? else {
        return Ok(None);
    };
    let transaction = queries::get_transaction_by_booking(conn, booking_id)?.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "invoice {} has no ledger entry",
            invoice.invoice_number
        ))
    })?;
    Ok(Some(Settlement {
        invoice,
        transaction,
        created: false,
    }))
}

pub fn get_settlement(conn: &Connection, booking_id: &str) -> Result<Settlement, AppError> {
    existing_settlement(conn, booking_id)?
        .ok_or_else(|| AppError::BookingNotFound(format!("no invoice for booking {booking_id}")))
}

/// Settles a completed booking. Invoicing is idempotent per booking: the first
/// successful call writes the invoice, the ledger entry and the booking's
/// settlement fields in one transaction; later calls return what was written.
///
/// `verification` carries the gateway's answer for the electronic payment
/// reference, checked by the caller before calling in. An electronic payment
/// with a known reference must come with a successful verification covering
/// the price.
pub fn generate_invoice(
    conn: &Connection,
    resolver: &RateResolver,
    booking_id: &str,
    req: &InvoiceRequest,
    verification: Option<&PaymentVerification>,
    due_days: i64,
    now: NaiveDateTime,
) -> Result<Settlement, AppError> {
    let tx = conn.unchecked_transaction()?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

    if booking.invoice_generated {
        if let Some(existing) = existing_settlement(&tx, booking_id)? {
            return Ok(existing);
        }
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::BookingNotCompleted(booking_id.to_string()));
    }
    let price = round_money(req.service_price);
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidAmount(req.service_price.to_string()));
    }

    let gateway_reference = match req.payment_method {
        PaymentMethod::Electronic => {
            let reference = req
                .payment_reference
                .clone()
                .or_else(|| booking.payment_reference.clone());
            check_electronic_payment(&booking, reference.as_deref(), verification, price)?;
            reference
        }
        PaymentMethod::Cash => None,
    };

    let provider = queries::get_provider(&tx, &booking.provider_id)?
        .ok_or_else(|| AppError::ProviderNotFound(booking.provider_id.clone()))?;
    let config = commission::load_config(&tx)?;
    let service_type = classify_booking(&booking);
    let rate = resolver.resolve(&config, provider.tier, service_type);

    let parts = split(price, rate, req.payment_method);

    let invoice = Invoice {
        id: uuid::Uuid::new_v4().to_string(),
        invoice_number: invoice_number(now),
        booking_id: booking.id.clone(),
        provider_id: booking.provider_id.clone(),
        customer_email: booking.customer_email.clone(),
        customer_name: booking.customer_name.clone(),
        service_name: booking.service_name.clone(),
        service_date: booking.date,
        service_type,
        commission_rate: rate,
        total_amount: price,
        platform_commission: parts.platform_commission,
        provider_payout: parts.provider_payout,
        commission_owed: parts.commission_owed,
        payment_method: req.payment_method,
        created_at: now,
    };

    let (commission_status, due_date, paid_date) = match req.payment_method {
        PaymentMethod::Electronic => (CommissionStatus::Collected, None, Some(now)),
        PaymentMethod::Cash => (
            CommissionStatus::Pending,
            Some(now.date() + Duration::days(due_days)),
            None,
        ),
    };

    let transaction = PaymentTransaction {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        invoice_id: invoice.id.clone(),
        provider_id: booking.provider_id.clone(),
        customer_id: booking.customer_email.clone(),
        total_amount: price,
        platform_commission: parts.platform_commission,
        provider_payout: parts.provider_payout,
        commission_owed: parts.commission_owed,
        payment_method: req.payment_method,
        payment_status: PaymentStatus::Paid,
        commission_status,
        gateway_reference,
        gateway_transaction_id: verification.and_then(|v| v.transaction_id.clone()),
        gateway_fees: verification.and_then(|v| v.fees),
        commission_due_date: due_date,
        commission_paid_date: paid_date,
        collection_method: (req.payment_method == PaymentMethod::Electronic)
            .then(|| "gateway".to_string()),
        created_at: now,
        updated_at: now,
    };

    // The booking only records the commission relevant to its payment method.
    let (booking_commission, booking_owed) = match req.payment_method {
        PaymentMethod::Electronic => (parts.platform_commission, Decimal::ZERO),
        PaymentMethod::Cash => (Decimal::ZERO, parts.commission_owed),
    };

    let marked = queries::mark_booking_invoiced(
        &tx,
        &booking.id,
        &invoice.id,
        req.payment_method,
        PaymentStatus::Paid,
        &price,
        &booking_commission,
        &parts.provider_payout,
        &booking_owed,
    )?;
    if !marked {
        return settled_elsewhere(&tx, booking_id);
    }

    let written = queries::insert_invoice(&tx, &invoice)
        .and_then(|_| queries::insert_transaction(&tx, &transaction));
    if let Err(e) = written {
        if is_unique_violation(&e) {
            return settled_elsewhere(&tx, booking_id);
        }
        return Err(e.into());
    }

    tx.commit()?;

    tracing::info!(
        booking_id,
        invoice_number = %invoice.invoice_number,
        provider_id = %invoice.provider_id,
        payment_method = invoice.payment_method.as_str(),
        rate = %rate,
        total = %price,
        commission_owed = %parts.commission_owed,
        "invoice generated"
    );

    Ok(Settlement {
        invoice,
        transaction,
        created: true,
    })
}

/// Electronic commission is only taken as collected when the gateway backs
/// the payment. A booking whose payment already failed needs a fresh
/// successful verification.
fn check_electronic_payment(
    booking: &Booking,
    reference: Option<&str>,
    verification: Option<&PaymentVerification>,
    price: Decimal,
) -> Result<(), AppError> {
    let not_verified = || {
        AppError::PaymentNotVerified(reference.unwrap_or(booking.id.as_str()).to_string())
    };

    match verification {
        Some(v) if !v.success || v.amount < price => {
            tracing::warn!(
                booking_id = %booking.id,
                reference = %v.reference,
                paid = %v.amount,
                expected = %price,
                "payment verification failed"
            );
            Err(not_verified())
        }
        Some(_) => Ok(()),
        None if reference.is_some() || booking.payment_status == PaymentStatus::Failed => {
            Err(not_verified())
        }
        None => Ok(()),
    }
}

fn settled_elsewhere(conn: &Connection, booking_id: &str) -> Result<Settlement, AppError> {
    existing_settlement(conn, booking_id)?.ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!(
            "booking {booking_id} is marked invoiced without an invoice"
        ))
    })
}

fn classify_booking(booking: &Booking) -> ServiceType {
    let description = match &booking.notes {
        Some(notes) => format!("{} {}", booking.service_name, notes),
        None => booking.service_name.clone(),
    };
    commission::classify_service(&description, booking.date, booking.created_at.date())
}
