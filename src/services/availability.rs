use std::collections::BTreeMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::availability::{validate_time_range, validate_working_hours};
use crate::models::{Availability, BlockedSlot, DaySchedule};
use crate::services::providers;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlockedSlot {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
}

/// Stored availability, or `None` when the provider has never published hours.
pub fn get_availability(
    conn: &Connection,
    provider_id: &str,
) -> Result<Option<Availability>, AppError> {
    providers::get_provider(conn, provider_id)?;
    Ok(queries::get_availability(conn, provider_id)?)
}

/// Replaces the weekly template. Blocked slots are kept.
pub fn set_working_hours(
    conn: &Connection,
    provider_id: &str,
    working_hours: &BTreeMap<String, DaySchedule>,
) -> Result<Availability, AppError> {
    providers::get_provider(conn, provider_id)?;
    validate_working_hours(working_hours).map_err(|e| AppError::Validation(e.to_string()))?;

    queries::save_working_hours(conn, provider_id, working_hours)?;
    tracing::info!(provider_id, "working hours updated");

    queries::get_availability(conn, provider_id)?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("availability vanished after save")))
}

pub fn add_blocked_slot(
    conn: &Connection,
    provider_id: &str,
    req: &NewBlockedSlot,
    today: NaiveDate,
) -> Result<BlockedSlot, AppError> {
    providers::get_provider(conn, provider_id)?;
    validate_time_range(&req.start_time, &req.end_time)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if req.date < today {
        return Err(AppError::PastDate(req.date.to_string()));
    }
    if queries::get_availability(conn, provider_id)?.is_none() {
        return Err(AppError::Validation(
            "publish working hours before blocking time".to_string(),
        ));
    }

    let slot = BlockedSlot {
        id: uuid::Uuid::new_v4().to_string(),
        date: req.date,
        start_time: req.start_time.clone(),
        end_time: req.end_time.clone(),
        reason: req.reason.clone(),
    };
    queries::insert_blocked_slot(conn, provider_id, &slot)?;

    tracing::info!(
        provider_id,
        date = %slot.date,
        start = %slot.start_time,
        end = %slot.end_time,
        "time blocked"
    );
    Ok(slot)
}

pub fn remove_blocked_slot(
    conn: &Connection,
    provider_id: &str,
    slot_id: &str,
) -> Result<(), AppError> {
    if !queries::delete_blocked_slot(conn, provider_id, slot_id)? {
        return Err(AppError::Validation(format!(
            "blocked slot {slot_id} not found for provider {provider_id}"
        )));
    }
    tracing::info!(provider_id, slot_id, "blocked time removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::NewProvider;
    use crate::{db, models::ProviderTier};
    use chrono::NaiveDateTime;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup() -> (Connection, String) {
        let conn = db::init_db(":memory:").unwrap();
        let now = NaiveDateTime::parse_from_str("2025-06-10 08:00:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let p = providers::register_provider(
            &conn,
            &NewProvider {
                name: "Fixit".to_string(),
                email: String::new(),
                tier: Some(ProviderTier::Standard),
            },
            now,
        )
        .unwrap();
        (conn, p.id)
    }

    #[test]
    fn test_set_working_hours_validates() {
        let (conn, id) = setup();
        let mut hours = Availability::default_template(&id).working_hours;
        hours.insert(
            "sat".to_string(),
            DaySchedule {
                start: "10:00".to_string(),
                end: "14:00".to_string(),
                enabled: true,
            },
        );
        let avail = set_working_hours(&conn, &id, &hours).unwrap();
        assert!(avail.working_hours["sat"].enabled);

        hours.insert(
            "sun".to_string(),
            DaySchedule {
                start: "14:00".to_string(),
                end: "10:00".to_string(),
                enabled: true,
            },
        );
        assert!(matches!(
            set_working_hours(&conn, &id, &hours),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_block_and_unblock() {
        let (conn, id) = setup();
        let today = date("2025-06-10");
        let slot = add_blocked_slot(
            &conn,
            &id,
            &NewBlockedSlot {
                date: date("2025-06-16"),
                start_time: "09:00".to_string(),
                end_time: "12:00".to_string(),
                reason: Some("dentist".to_string()),
            },
            today,
        )
        .unwrap();

        let avail = get_availability(&conn, &id).unwrap().unwrap();
        assert_eq!(avail.blocked_slots, vec![slot.clone()]);

        remove_blocked_slot(&conn, &id, &slot.id).unwrap();
        assert!(remove_blocked_slot(&conn, &id, &slot.id).is_err());
        assert!(get_availability(&conn, &id)
            .unwrap()
            .unwrap()
            .blocked_slots
            .is_empty());
    }

    #[test]
    fn test_block_rejects_bad_ranges() {
        let (conn, id) = setup();
        let today = date("2025-06-10");
        let bad = |d: &str, s: &str, e: &str| NewBlockedSlot {
            date: date(d),
            start_time: s.to_string(),
            end_time: e.to_string(),
            reason: None,
        };

        assert!(matches!(
            add_blocked_slot(&conn, &id, &bad("2025-06-16", "12:00", "09:00"), today),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            add_blocked_slot(&conn, &id, &bad("2025-06-16", "9:00", "10:00"), today),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            add_blocked_slot(&conn, &id, &bad("2025-06-01", "09:00", "10:00"), today),
            Err(AppError::PastDate(_))
        ));
    }

    #[test]
    fn test_unknown_provider() {
        let (conn, _) = setup();
        assert!(matches!(
            get_availability(&conn, "ghost"),
            Err(AppError::ProviderNotFound(_))
        ));
    }
}
