use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;

use super::{DATETIME_FMT, DATE_FMT};
use crate::models::{
    Availability, BlockedSlot, Booking, BookingHistoryEntry, BookingStatus, CommissionConfig,
    CommissionStatus, DaySchedule, Invoice, PaymentMethod, PaymentStatus, PaymentTransaction,
    Provider, ProviderTier, RateChange, ServiceType,
};

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn parse_dt(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).with_context(|| format!("invalid date in database: {s}"))
}

fn parse_decimal(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid amount in database: {s}"))
}

fn parse_tier(s: &str) -> anyhow::Result<ProviderTier> {
    ProviderTier::parse(s).with_context(|| format!("unknown provider tier in database: {s}"))
}

// ── Providers ──

pub fn insert_provider(conn: &Connection, provider: &Provider) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO providers (id, name, email, tier, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            provider.id,
            provider.name,
            provider.email,
            provider.tier.as_str(),
            fmt_dt(&provider.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_provider(conn: &Connection, id: &str) -> anyhow::Result<Option<Provider>> {
    let row = conn
        .query_row(
            "SELECT id, name, email, tier, created_at FROM providers WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, name, email, tier, created_at)| -> anyhow::Result<Provider> {
        Ok(Provider {
            id,
            name,
            email,
            tier: parse_tier(&tier)?,
            created_at: parse_dt(&created_at)?,
        })
    })
    .transpose()
}

pub fn list_providers(conn: &Connection) -> anyhow::Result<Vec<Provider>> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, tier, created_at FROM providers ORDER BY name ASC")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut providers = vec![];
    for row in rows {
        let (id, name, email, tier, created_at) = row?;
        providers.push(Provider {
            id,
            name,
            email,
            tier: parse_tier(&tier)?,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(providers)
}

pub fn update_provider_tier(
    conn: &Connection,
    id: &str,
    tier: ProviderTier,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE providers SET tier = ?1 WHERE id = ?2",
        params![tier.as_str(), id],
    )?;
    Ok(count > 0)
}

// ── Availability ──

pub fn get_availability(
    conn: &Connection,
    provider_id: &str,
) -> anyhow::Result<Option<Availability>> {
    let hours_json: Option<String> = conn
        .query_row(
            "SELECT working_hours FROM availability WHERE provider_id = ?1",
            params![provider_id],
            |row| row.get(0),
        )
        .optional()?;

    let Some(hours_json) = hours_json else {
        return Ok(None);
    };

    let working_hours: BTreeMap<String, DaySchedule> =
        serde_json::from_str(&hours_json).context("invalid working hours document")?;

    let mut stmt = conn.prepare(
        "SELECT id, date, start_time, end_time, reason FROM blocked_slots
         WHERE provider_id = ?1 ORDER BY date ASC, start_time ASC",
    )?;
    let rows = stmt.query_map(params![provider_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut blocked_slots = vec![];
    for row in rows {
        let (id, date, start_time, end_time, reason) = row?;
        blocked_slots.push(BlockedSlot {
            id,
            date: parse_date(&date)?,
            start_time,
            end_time,
            reason,
        });
    }

    Ok(Some(Availability {
        provider_id: provider_id.to_string(),
        working_hours,
        blocked_slots,
    }))
}

pub fn save_working_hours(
    conn: &Connection,
    provider_id: &str,
    working_hours: &BTreeMap<String, DaySchedule>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(working_hours)?;
    conn.execute(
        "INSERT INTO availability (provider_id, working_hours, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(provider_id) DO UPDATE SET
           working_hours = excluded.working_hours,
           updated_at = excluded.updated_at",
        params![provider_id, json],
    )?;
    Ok(())
}

pub fn insert_blocked_slot(
    conn: &Connection,
    provider_id: &str,
    slot: &BlockedSlot,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO blocked_slots (id, provider_id, date, start_time, end_time, reason)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            slot.id,
            provider_id,
            fmt_date(&slot.date),
            slot.start_time,
            slot.end_time,
            slot.reason,
        ],
    )?;
    Ok(())
}

pub fn delete_blocked_slot(
    conn: &Connection,
    provider_id: &str,
    slot_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM blocked_slots WHERE id = ?1 AND provider_id = ?2",
        params![slot_id, provider_id],
    )?;
    Ok(count > 0)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, provider_id, customer_email, customer_name, service_name, \
     date, time, status, payment_method, payment_status, payment_reference, total_amount, \
     platform_commission, provider_payout, commission_owed, invoice_generated, invoice_id, \
     service_completion_date, notes, created_at, updated_at";

const ACTIVE_STATUSES: &str = "('PENDING', 'CONFIRMED', 'IN_PROGRESS')";

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
        ),
        params![
            booking.id,
            booking.provider_id,
            booking.customer_email,
            booking.customer_name,
            booking.service_name,
            fmt_date(&booking.date),
            booking.time,
            booking.status.as_str(),
            booking.payment_method.as_str(),
            booking.payment_status.as_str(),
            booking.payment_reference,
            booking.total_amount.to_string(),
            booking.platform_commission.to_string(),
            booking.provider_payout.to_string(),
            booking.commission_owed.to_string(),
            booking.invoice_generated,
            booking.invoice_id,
            booking.service_completion_date.as_ref().map(fmt_dt),
            booking.notes,
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_by_payment_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_reference = ?1"),
        params![reference],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Slot labels held by non-terminal bookings for a provider on a date.
pub fn active_booking_times(
    conn: &Connection,
    provider_id: &str,
    date: &NaiveDate,
    exclude_booking_id: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT time FROM bookings
         WHERE provider_id = ?1 AND date = ?2 AND status IN {ACTIVE_STATUSES} AND id != ?3
         ORDER BY time ASC"
    ))?;

    let rows = stmt.query_map(
        params![provider_id, fmt_date(date), exclude_booking_id.unwrap_or("")],
        |row| row.get::<_, String>(0),
    )?;

    let mut times = vec![];
    for row in rows {
        times.push(row?);
    }
    Ok(times)
}

/// Compare-and-set on status. Returns false when the booking is no longer in `from`.
pub fn transition_booking_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    completed_at: Option<&NaiveDateTime>,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings
         SET status = ?1,
             service_completion_date = COALESCE(?2, service_completion_date),
             updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            to.as_str(),
            completed_at.map(fmt_dt),
            now,
            id,
            from.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn update_booking_slot(
    conn: &Connection,
    id: &str,
    date: &NaiveDate,
    time: &str,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET date = ?1, time = ?2, updated_at = ?3
         WHERE id = ?4 AND status IN ('PENDING', 'CONFIRMED')",
        params![fmt_date(date), time, now, id],
    )?;
    Ok(count > 0)
}

/// Stamps settlement fields once. Returns false if the booking was already invoiced.
#[allow(clippy::too_many_arguments)]
pub fn mark_booking_invoiced(
    conn: &Connection,
    id: &str,
    invoice_id: &str,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    total_amount: &Decimal,
    platform_commission: &Decimal,
    provider_payout: &Decimal,
    commission_owed: &Decimal,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings
         SET invoice_generated = 1,
             invoice_id = ?1,
             payment_method = ?2,
             payment_status = ?3,
             total_amount = ?4,
             platform_commission = ?5,
             provider_payout = ?6,
             commission_owed = ?7,
             updated_at = ?8
         WHERE id = ?9 AND status = 'COMPLETED' AND invoice_generated = 0",
        params![
            invoice_id,
            payment_method.as_str(),
            payment_status.as_str(),
            total_amount.to_string(),
            platform_commission.to_string(),
            provider_payout.to_string(),
            commission_owed.to_string(),
            now,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn set_booking_payment_reference(
    conn: &Connection,
    id: &str,
    reference: &str,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET payment_reference = ?1, payment_method = 'ELECTRONIC', updated_at = ?2
         WHERE id = ?3",
        params![reference, now, id],
    )?;
    Ok(count > 0)
}

pub fn update_booking_payment_status(
    conn: &Connection,
    id: &str,
    status: PaymentStatus,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

/// Only unconfirmed bookings can be physically removed.
pub fn delete_pending_booking(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM bookings WHERE id = ?1 AND status = 'PENDING'",
        params![id],
    )?;
    Ok(count > 0)
}

pub fn list_provider_bookings(
    conn: &Connection,
    provider_id: &str,
    status: Option<BookingStatus>,
    date: Option<&NaiveDate>,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE provider_id = ?1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> =
        vec![Box::new(provider_id.to_string())];

    if let Some(status) = status {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    if let Some(date) = date {
        params_vec.push(Box::new(fmt_date(date)));
        sql.push_str(&format!(" AND date = ?{}", params_vec.len()));
    }
    sql.push_str(" ORDER BY date ASC, time ASC");

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn list_customer_bookings(conn: &Connection, email: &str) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE customer_email = ?1
         ORDER BY date DESC, time DESC"
    ))?;

    let rows = stmt.query_map(params![email], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let date: String = row.get(5)?;
    let status: String = row.get(7)?;
    let payment_method: String = row.get(8)?;
    let payment_status: String = row.get(9)?;
    let total_amount: String = row.get(11)?;
    let platform_commission: String = row.get(12)?;
    let provider_payout: String = row.get(13)?;
    let commission_owed: String = row.get(14)?;
    let service_completion_date: Option<String> = row.get(17)?;
    let created_at: String = row.get(19)?;
    let updated_at: String = row.get(20)?;

    Ok(Booking {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        customer_email: row.get(2)?,
        customer_name: row.get(3)?,
        service_name: row.get(4)?,
        date: parse_date(&date)?,
        time: row.get(6)?,
        status: BookingStatus::parse(&status),
        payment_method: PaymentMethod::parse(&payment_method),
        payment_status: PaymentStatus::parse(&payment_status),
        payment_reference: row.get(10)?,
        total_amount: parse_decimal(&total_amount)?,
        platform_commission: parse_decimal(&platform_commission)?,
        provider_payout: parse_decimal(&provider_payout)?,
        commission_owed: parse_decimal(&commission_owed)?,
        invoice_generated: row.get(15)?,
        invoice_id: row.get(16)?,
        service_completion_date: service_completion_date
            .as_deref()
            .map(parse_dt)
            .transpose()?,
        notes: row.get(18)?,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}

// ── Booking History ──

#[allow(clippy::too_many_arguments)]
pub fn insert_booking_history(
    conn: &Connection,
    booking_id: &str,
    action: &str,
    from: BookingStatus,
    to: BookingStatus,
    reason: Option<&str>,
    detail: Option<&str>,
    at: &NaiveDateTime,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_history (booking_id, action, from_status, to_status, reason, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            booking_id,
            action,
            from.as_str(),
            to.as_str(),
            reason,
            detail,
            fmt_dt(at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_history(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<BookingHistoryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, action, from_status, to_status, reason, detail, created_at
         FROM booking_history WHERE booking_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut entries = vec![];
    for row in rows {
        let (id, booking_id, action, from, to, reason, detail, created_at) = row?;
        entries.push(BookingHistoryEntry {
            id,
            booking_id,
            action,
            from_status: BookingStatus::parse(&from),
            to_status: BookingStatus::parse(&to),
            reason,
            detail,
            created_at: parse_dt(&created_at)?,
        });
    }
    Ok(entries)
}

// ── Commission Configuration ──

pub fn get_commission_config(conn: &Connection) -> anyhow::Result<CommissionConfig> {
    let header = conn
        .query_row(
            "SELECT version, updated_by, updated_at FROM commission_config WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    let (version, updated_by, updated_at) = match header {
        Some((version, updated_by, updated_at)) => (version, updated_by, parse_dt(&updated_at)?),
        None => (0, None, Utc::now().naive_utc()),
    };

    let mut stmt = conn.prepare("SELECT tier, rate FROM commission_rates")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut rates = BTreeMap::new();
    for row in rows {
        let (tier, rate) = row?;
        match ProviderTier::parse(&tier) {
            Some(tier) => {
                rates.insert(tier, parse_decimal(&rate)?);
            }
            None => tracing::warn!(tier = %tier, "ignoring commission rate for unknown tier"),
        }
    }

    Ok(CommissionConfig {
        version,
        rates,
        updated_by,
        updated_at,
    })
}

pub fn upsert_commission_rate(
    conn: &Connection,
    tier: ProviderTier,
    rate: &Decimal,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO commission_rates (tier, rate) VALUES (?1, ?2)
         ON CONFLICT(tier) DO UPDATE SET rate = excluded.rate",
        params![tier.as_str(), rate.to_string()],
    )?;
    Ok(())
}

/// Increments the configuration version and returns the new value.
pub fn bump_commission_version(
    conn: &Connection,
    changed_by: &str,
    at: &NaiveDateTime,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO commission_config (id, version, updated_by, updated_at) VALUES (1, 1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET
           version = version + 1,
           updated_by = excluded.updated_by,
           updated_at = excluded.updated_at",
        params![changed_by, fmt_dt(at)],
    )?;
    let version = conn.query_row(
        "SELECT version FROM commission_config WHERE id = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

pub fn insert_rate_change(conn: &Connection, change: &RateChange) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO commission_rate_changes (tier, old_rate, new_rate, changed_by, reason, config_version, changed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            change.tier.as_str(),
            change.old_rate.map(|r| r.to_string()),
            change.new_rate.to_string(),
            change.changed_by,
            change.reason,
            change.config_version,
            fmt_dt(&change.changed_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_rate_changes(conn: &Connection, limit: i64) -> anyhow::Result<Vec<RateChange>> {
    let mut stmt = conn.prepare(
        "SELECT id, tier, old_rate, new_rate, changed_by, reason, config_version, changed_at
         FROM commission_rate_changes ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, i64>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut changes = vec![];
    for row in rows {
        let (id, tier, old_rate, new_rate, changed_by, reason, config_version, changed_at) = row?;
        changes.push(RateChange {
            id,
            tier: parse_tier(&tier)?,
            old_rate: old_rate.as_deref().map(parse_decimal).transpose()?,
            new_rate: parse_decimal(&new_rate)?,
            changed_by,
            reason,
            config_version,
            changed_at: parse_dt(&changed_at)?,
        });
    }
    Ok(changes)
}

// ── Invoices ──

const INVOICE_COLUMNS: &str = "id, invoice_number, booking_id, provider_id, customer_email, \
     customer_name, service_name, service_date, service_type, commission_rate, total_amount, \
     platform_commission, provider_payout, commission_owed, payment_method, created_at";

pub fn insert_invoice(conn: &Connection, invoice: &Invoice) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            invoice.id,
            invoice.invoice_number,
            invoice.booking_id,
            invoice.provider_id,
            invoice.customer_email,
            invoice.customer_name,
            invoice.service_name,
            fmt_date(&invoice.service_date),
            invoice.service_type.as_str(),
            invoice.commission_rate.to_string(),
            invoice.total_amount.to_string(),
            invoice.platform_commission.to_string(),
            invoice.provider_payout.to_string(),
            invoice.commission_owed.to_string(),
            invoice.payment_method.as_str(),
            fmt_dt(&invoice.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_invoice_by_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<Invoice>> {
    let result = conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE booking_id = ?1"),
        params![booking_id],
        |row| Ok(parse_invoice_row(row)),
    );

    match result {
        Ok(invoice) => Ok(Some(invoice?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_invoice_row(row: &rusqlite::Row) -> anyhow::Result<Invoice> {
    let service_date: String = row.get(7)?;
    let service_type: String = row.get(8)?;
    let commission_rate: String = row.get(9)?;
    let total_amount: String = row.get(10)?;
    let platform_commission: String = row.get(11)?;
    let provider_payout: String = row.get(12)?;
    let commission_owed: String = row.get(13)?;
    let payment_method: String = row.get(14)?;
    let created_at: String = row.get(15)?;

    Ok(Invoice {
        id: row.get(0)?,
        invoice_number: row.get(1)?,
        booking_id: row.get(2)?,
        provider_id: row.get(3)?,
        customer_email: row.get(4)?,
        customer_name: row.get(5)?,
        service_name: row.get(6)?,
        service_date: parse_date(&service_date)?,
        service_type: ServiceType::parse(&service_type),
        commission_rate: parse_decimal(&commission_rate)?,
        total_amount: parse_decimal(&total_amount)?,
        platform_commission: parse_decimal(&platform_commission)?,
        provider_payout: parse_decimal(&provider_payout)?,
        commission_owed: parse_decimal(&commission_owed)?,
        payment_method: PaymentMethod::parse(&payment_method),
        created_at: parse_dt(&created_at)?,
    })
}

// ── Payment Transactions ──

const TRANSACTION_COLUMNS: &str = "id, booking_id, invoice_id, provider_id, customer_id, \
     total_amount, platform_commission, provider_payout, commission_owed, payment_method, \
     payment_status, commission_status, gateway_reference, gateway_transaction_id, gateway_fees, \
     commission_due_date, commission_paid_date, collection_method, created_at, updated_at";

pub fn insert_transaction(conn: &Connection, tx: &PaymentTransaction) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO payment_transactions ({TRANSACTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            tx.id,
            tx.booking_id,
            tx.invoice_id,
            tx.provider_id,
            tx.customer_id,
            tx.total_amount.to_string(),
            tx.platform_commission.to_string(),
            tx.provider_payout.to_string(),
            tx.commission_owed.to_string(),
            tx.payment_method.as_str(),
            tx.payment_status.as_str(),
            tx.commission_status.as_str(),
            tx.gateway_reference,
            tx.gateway_transaction_id,
            tx.gateway_fees.map(|f| f.to_string()),
            tx.commission_due_date.as_ref().map(fmt_date),
            tx.commission_paid_date.as_ref().map(fmt_dt),
            tx.collection_method,
            fmt_dt(&tx.created_at),
            fmt_dt(&tx.updated_at),
        ],
    )?;
    Ok(())
}

fn get_transaction_where(
    conn: &Connection,
    column: &str,
    value: &str,
) -> anyhow::Result<Option<PaymentTransaction>> {
    let result = conn.query_row(
        &format!("SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE {column} = ?1"),
        params![value],
        |row| Ok(parse_transaction_row(row)),
    );

    match result {
        Ok(tx) => Ok(Some(tx?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_transaction(conn: &Connection, id: &str) -> anyhow::Result<Option<PaymentTransaction>> {
    get_transaction_where(conn, "id", id)
}

pub fn get_transaction_by_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Option<PaymentTransaction>> {
    get_transaction_where(conn, "booking_id", booking_id)
}

pub fn get_transaction_by_reference(
    conn: &Connection,
    reference: &str,
) -> anyhow::Result<Option<PaymentTransaction>> {
    get_transaction_where(conn, "gateway_reference", reference)
}

/// Compare-and-set on commission status.
pub fn update_commission_status(
    conn: &Connection,
    id: &str,
    from: CommissionStatus,
    to: CommissionStatus,
    paid_at: Option<&NaiveDateTime>,
    collection_method: Option<&str>,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE payment_transactions
         SET commission_status = ?1,
             commission_paid_date = COALESCE(?2, commission_paid_date),
             collection_method = COALESCE(?3, collection_method),
             updated_at = ?4
         WHERE id = ?5 AND commission_status = ?6",
        params![
            to.as_str(),
            paid_at.map(fmt_dt),
            collection_method,
            now,
            id,
            from.as_str(),
        ],
    )?;
    Ok(count > 0)
}

pub fn record_gateway_result(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
    gateway_transaction_id: Option<&str>,
    gateway_fees: Option<&Decimal>,
) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE payment_transactions
         SET payment_status = ?1,
             gateway_transaction_id = COALESCE(?2, gateway_transaction_id),
             gateway_fees = COALESCE(?3, gateway_fees),
             updated_at = ?4
         WHERE id = ?5",
        params![
            payment_status.as_str(),
            gateway_transaction_id,
            gateway_fees.map(|f| f.to_string()),
            now,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn list_provider_transactions(
    conn: &Connection,
    provider_id: &str,
) -> anyhow::Result<Vec<PaymentTransaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions
         WHERE provider_id = ?1 ORDER BY created_at ASC"
    ))?;

    let rows = stmt.query_map(params![provider_id], |row| Ok(parse_transaction_row(row)))?;

    let mut txs = vec![];
    for row in rows {
        txs.push(row??);
    }
    Ok(txs)
}

pub fn list_all_transactions(conn: &Connection) -> anyhow::Result<Vec<PaymentTransaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions ORDER BY created_at ASC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_transaction_row(row)))?;

    let mut txs = vec![];
    for row in rows {
        txs.push(row??);
    }
    Ok(txs)
}

/// Pending cash commission whose due date is strictly before `today`.
pub fn list_past_due_pending(
    conn: &Connection,
    today: &NaiveDate,
) -> anyhow::Result<Vec<PaymentTransaction>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions
         WHERE commission_status = 'PENDING' AND payment_method = 'CASH'
           AND commission_due_date IS NOT NULL AND commission_due_date < ?1
         ORDER BY commission_due_date ASC"
    ))?;

    let rows = stmt.query_map(params![fmt_date(today)], |row| {
        Ok(parse_transaction_row(row))
    })?;

    let mut txs = vec![];
    for row in rows {
        txs.push(row??);
    }
    Ok(txs)
}

fn parse_transaction_row(row: &rusqlite::Row) -> anyhow::Result<PaymentTransaction> {
    let total_amount: String = row.get(5)?;
    let platform_commission: String = row.get(6)?;
    let provider_payout: String = row.get(7)?;
    let commission_owed: String = row.get(8)?;
    let payment_method: String = row.get(9)?;
    let payment_status: String = row.get(10)?;
    let commission_status: String = row.get(11)?;
    let gateway_fees: Option<String> = row.get(14)?;
    let commission_due_date: Option<String> = row.get(15)?;
    let commission_paid_date: Option<String> = row.get(16)?;
    let created_at: String = row.get(18)?;
    let updated_at: String = row.get(19)?;

    Ok(PaymentTransaction {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        invoice_id: row.get(2)?,
        provider_id: row.get(3)?,
        customer_id: row.get(4)?,
        total_amount: parse_decimal(&total_amount)?,
        platform_commission: parse_decimal(&platform_commission)?,
        provider_payout: parse_decimal(&provider_payout)?,
        commission_owed: parse_decimal(&commission_owed)?,
        payment_method: PaymentMethod::parse(&payment_method),
        payment_status: PaymentStatus::parse(&payment_status),
        commission_status: CommissionStatus::parse(&commission_status),
        gateway_reference: row.get(12)?,
        gateway_transaction_id: row.get(13)?,
        gateway_fees: gateway_fees.as_deref().map(parse_decimal).transpose()?,
        commission_due_date: commission_due_date.as_deref().map(parse_date).transpose()?,
        commission_paid_date: commission_paid_date.as_deref().map(parse_dt).transpose()?,
        collection_method: row.get(17)?,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}
