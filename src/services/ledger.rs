use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    AdminCommissionSummary, CommissionStatus, OutstandingCommission, PaymentMethod,
    PaymentStatus, PaymentTransaction, ProviderFinancialSummary,
};
use crate::services::gateway::GatewayWebhook;

fn get_transaction(conn: &Connection, id: &str) -> Result<PaymentTransaction, AppError> {
    queries::get_transaction(conn, id)?.ok_or_else(|| AppError::TransactionNotFound(id.to_string()))
}

fn is_outstanding_cash(tx: &PaymentTransaction) -> bool {
    tx.payment_method == PaymentMethod::Cash && tx.commission_status.is_outstanding()
}

fn outstanding_of(provider_id: &str, txs: &[&PaymentTransaction]) -> OutstandingCommission {
    OutstandingCommission {
        provider_id: provider_id.to_string(),
        total_owed: txs.iter().map(|t| t.commission_owed).sum(),
        transaction_count: txs.len(),
        oldest_due_date: txs.iter().filter_map(|t| t.commission_due_date).min(),
    }
}

/// Cash commission a provider still has to remit, PENDING and OVERDUE alike.
pub fn outstanding_commission(
    conn: &Connection,
    provider_id: &str,
) -> Result<OutstandingCommission, AppError> {
    let txs = queries::list_provider_transactions(conn, provider_id)?;
    let open: Vec<&PaymentTransaction> = txs.iter().filter(|t| is_outstanding_cash(t)).collect();
    Ok(outstanding_of(provider_id, &open))
}

/// Records remittance of cash commission. Returns the entry and whether it changed;
/// an entry that is already COLLECTED comes back unchanged.
pub fn mark_collected(
    conn: &Connection,
    transaction_id: &str,
    collection_method: &str,
    now: NaiveDateTime,
) -> Result<(PaymentTransaction, bool), AppError> {
    let tx = conn.unchecked_transaction()?;
    let entry = get_transaction(&tx, transaction_id)?;

    if entry.commission_status == CommissionStatus::Collected {
        return Ok((entry, false));
    }

    let method = collection_method.trim();
    if method.is_empty() {
        return Err(AppError::Validation("collection method is required".to_string()));
    }

    if !queries::update_commission_status(
        &tx,
        transaction_id,
        entry.commission_status,
        CommissionStatus::Collected,
        Some(&now),
        Some(method),
    )? {
        let current = get_transaction(&tx, transaction_id)?;
        return Ok((current, false));
    }

    let updated = get_transaction(&tx, transaction_id)?;
    tx.commit()?;

    tracing::info!(
        transaction_id,
        provider_id = %updated.provider_id,
        amount = %updated.commission_owed,
        collection_method = method,
        "commission collected"
    );

    Ok((updated, true))
}

/// Moves a PENDING cash entry to OVERDUE once its due date is behind `today`.
pub fn flag_overdue(
    conn: &Connection,
    transaction_id: &str,
    today: NaiveDate,
) -> Result<(PaymentTransaction, bool), AppError> {
    let entry = get_transaction(conn, transaction_id)?;

    match entry.commission_status {
        CommissionStatus::Overdue => return Ok((entry, false)),
        CommissionStatus::Collected => {
            return Err(AppError::InvalidTransition {
                from: entry.commission_status.as_str().to_string(),
                action: "flag_overdue".to_string(),
            })
        }
        CommissionStatus::Pending => {}
    }

    let past_due = entry.commission_due_date.is_some_and(|due| due < today);
    if !past_due {
        return Err(AppError::InvalidTransition {
            from: "PENDING (not yet due)".to_string(),
            action: "flag_overdue".to_string(),
        });
    }

    let changed = queries::update_commission_status(
        conn,
        transaction_id,
        CommissionStatus::Pending,
        CommissionStatus::Overdue,
        None,
        None,
    )?;
    let updated = get_transaction(conn, transaction_id)?;

    if changed {
        tracing::warn!(
            transaction_id,
            provider_id = %updated.provider_id,
            owed = %updated.commission_owed,
            "commission flagged overdue"
        );
    }
    Ok((updated, changed))
}

/// Flags every past-due PENDING cash entry. Returns the entries that moved.
pub fn sweep_overdue(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<PaymentTransaction>, AppError> {
    let mut flagged = vec![];
    for entry in queries::list_past_due_pending(conn, &today)? {
        let (updated, changed) = flag_overdue(conn, &entry.id, today)?;
        if changed {
            flagged.push(updated);
        }
    }
    Ok(flagged)
}

pub fn provider_summary(
    conn: &Connection,
    provider_id: &str,
) -> Result<ProviderFinancialSummary, AppError> {
    if queries::get_provider(conn, provider_id)?.is_none() {
        return Err(AppError::ProviderNotFound(provider_id.to_string()));
    }
    let txs = queries::list_provider_transactions(conn, provider_id)?;

    let mut summary = ProviderFinancialSummary {
        provider_id: provider_id.to_string(),
        total_revenue: Decimal::ZERO,
        total_payout: Decimal::ZERO,
        commission_deducted: Decimal::ZERO,
        commission_collected: Decimal::ZERO,
        commission_outstanding: Decimal::ZERO,
        overdue_count: 0,
        cash_transactions: 0,
        electronic_transactions: 0,
    };

    for t in &txs {
        summary.total_revenue += t.total_amount;
        summary.total_payout += t.provider_payout;
        match t.payment_method {
            PaymentMethod::Electronic => {
                summary.electronic_transactions += 1;
                if t.payment_status == PaymentStatus::Paid {
                    summary.commission_deducted += t.platform_commission;
                }
            }
            PaymentMethod::Cash => {
                summary.cash_transactions += 1;
                match t.commission_status {
                    CommissionStatus::Collected => summary.commission_collected += t.commission_owed,
                    CommissionStatus::Overdue => {
                        summary.overdue_count += 1;
                        summary.commission_outstanding += t.commission_owed;
                    }
                    CommissionStatus::Pending => summary.commission_outstanding += t.commission_owed,
                }
            }
        }
    }

    Ok(summary)
}

pub fn admin_summary(conn: &Connection) -> Result<AdminCommissionSummary, AppError> {
    let txs = queries::list_all_transactions(conn)?;

    let mut total_revenue = Decimal::ZERO;
    let mut collected = Decimal::ZERO;
    let mut pending_count = 0;
    let mut overdue_count = 0;
    let mut by_provider: BTreeMap<&str, Vec<&PaymentTransaction>> = BTreeMap::new();

    for t in &txs {
        total_revenue += t.total_amount;
        match (t.payment_method, t.commission_status) {
            (PaymentMethod::Electronic, _) if t.payment_status == PaymentStatus::Paid => {
                collected += t.platform_commission
            }
            (PaymentMethod::Electronic, _) => {}
            (PaymentMethod::Cash, CommissionStatus::Collected) => collected += t.commission_owed,
            (PaymentMethod::Cash, CommissionStatus::Pending) => pending_count += 1,
            (PaymentMethod::Cash, CommissionStatus::Overdue) => overdue_count += 1,
        }
        if is_outstanding_cash(t) {
            by_provider.entry(t.provider_id.as_str()).or_default().push(t);
        }
    }

    let mut providers: Vec<OutstandingCommission> = by_provider
        .into_iter()
        .map(|(provider_id, open)| outstanding_of(provider_id, &open))
        .collect();
    providers.sort_by(|a, b| b.total_owed.cmp(&a.total_owed));

    Ok(AdminCommissionSummary {
        total_revenue,
        commission_collected: collected,
        commission_outstanding: providers.iter().map(|p| p.total_owed).sum(),
        pending_count,
        overdue_count,
        providers,
    })
}

/// What a gateway callback changed.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    /// Ledger entry updated; the flag is true when its commission moved to COLLECTED.
    Transaction(PaymentTransaction, bool),
    /// Pre-settlement payment status recorded on the booking.
    Booking(String),
    /// Reference known, but the callback may not change the record.
    Ignored,
    Unmatched,
}

fn callback_status(event: &GatewayWebhook, expected: Option<Decimal>) -> PaymentStatus {
    let short = expected.is_some_and(|total| event.amount < total);
    if event.is_success() && !short {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Failed
    }
}

/// Applies a gateway callback to the ledger entry or booking carrying its
/// reference. Cash settlements never take gateway updates, a PAID record is
/// never downgraded, and a success for less than the invoiced total counts
/// as a failure.
pub fn apply_gateway_event(
    conn: &Connection,
    event: &GatewayWebhook,
    now: NaiveDateTime,
) -> Result<GatewayOutcome, AppError> {
    let tx = conn.unchecked_transaction()?;

    if let Some(entry) = queries::get_transaction_by_reference(&tx, &event.reference)? {
        let status = callback_status(event, Some(entry.total_amount));
        if entry.payment_method == PaymentMethod::Cash
            || (entry.payment_status == PaymentStatus::Paid && status == PaymentStatus::Failed)
        {
            tracing::warn!(
                reference = %event.reference,
                transaction_id = %entry.id,
                payment_method = entry.payment_method.as_str(),
                payment_status = entry.payment_status.as_str(),
                callback = %event.status,
                "gateway callback ignored"
            );
            return Ok(GatewayOutcome::Ignored);
        }

        queries::record_gateway_result(
            &tx,
            &entry.id,
            status,
            event.transaction_id.as_deref(),
            event.fees.as_ref(),
        )?;
        queries::update_booking_payment_status(&tx, &entry.booking_id, status)?;

        let collected = status == PaymentStatus::Paid
            && entry.commission_status != CommissionStatus::Collected
            && queries::update_commission_status(
                &tx,
                &entry.id,
                entry.commission_status,
                CommissionStatus::Collected,
                Some(&now),
                Some("gateway"),
            )?;

        let updated = get_transaction(&tx, &entry.id)?;
        tx.commit()?;

        tracing::info!(
            reference = %event.reference,
            transaction_id = %updated.id,
            status = status.as_str(),
            "gateway result recorded"
        );
        return Ok(GatewayOutcome::Transaction(updated, collected));
    }

    if let Some(booking) = queries::get_booking_by_payment_reference(&tx, &event.reference)? {
        let status = callback_status(event, None);
        let settled_in_cash =
            booking.invoice_generated && booking.payment_method == PaymentMethod::Cash;
        if settled_in_cash
            || (booking.payment_status == PaymentStatus::Paid && status == PaymentStatus::Failed)
        {
            tracing::warn!(
                reference = %event.reference,
                booking_id = %booking.id,
                payment_status = booking.payment_status.as_str(),
                callback = %event.status,
                "gateway callback ignored"
            );
            return Ok(GatewayOutcome::Ignored);
        }

        queries::update_booking_payment_status(&tx, &booking.id, status)?;
        tx.commit()?;
        tracing::info!(
            reference = %event.reference,
            booking_id = %booking.id,
            status = status.as_str(),
            "gateway result recorded on booking"
        );
        return Ok(GatewayOutcome::Booking(booking.id));
    }

    tracing::warn!(reference = %event.reference, "gateway event for unknown reference");
    Ok(GatewayOutcome::Unmatched)
}
