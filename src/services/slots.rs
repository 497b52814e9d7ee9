use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::availability::parse_time;
use crate::models::{Availability, UnconfiguredAvailability};

/// Produces bookable slots from a provider's availability and existing bookings.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    pub slot_minutes: u32,
    pub unconfigured: UnconfiguredAvailability,
}

impl SlotAllocator {
    pub fn new(slot_minutes: u32, unconfigured: UnconfiguredAvailability) -> Self {
        Self {
            slot_minutes,
            unconfigured,
        }
    }

    /// Availability for `provider_id`, with the unconfigured policy applied.
    pub fn effective_availability(
        &self,
        conn: &Connection,
        provider_id: &str,
    ) -> anyhow::Result<Option<Availability>> {
        let stored = queries::get_availability(conn, provider_id)?;
        Ok(match (stored, self.unconfigured) {
            (Some(avail), _) => Some(avail),
            (None, UnconfiguredAvailability::Open) => {
                Some(Availability::default_template(provider_id))
            }
            (None, UnconfiguredAvailability::Closed) => None,
        })
    }

    pub fn available_slots(
        &self,
        conn: &Connection,
        provider_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> anyhow::Result<Vec<String>> {
        self.slots_excluding(conn, provider_id, date, today, None)
    }

    fn slots_excluding(
        &self,
        conn: &Connection,
        provider_id: &str,
        date: NaiveDate,
        today: NaiveDate,
        exclude_booking_id: Option<&str>,
    ) -> anyhow::Result<Vec<String>> {
        if date < today {
            return Ok(Vec::new());
        }
        let Some(avail) = self.effective_availability(conn, provider_id)? else {
            return Ok(Vec::new());
        };
        let taken = queries::active_booking_times(conn, provider_id, &date, exclude_booking_id)?;
        Ok(open_slots(&avail, date, self.slot_minutes, &taken))
    }

    pub fn is_date_bookable(
        &self,
        conn: &Connection,
        provider_id: &str,
        date: NaiveDate,
        today: NaiveDate,
    ) -> anyhow::Result<bool> {
        if date < today {
            return Ok(false);
        }
        let Some(avail) = self.effective_availability(conn, provider_id)? else {
            return Ok(false);
        };
        Ok(avail.working_window(date).is_some() && !avail.is_fully_blocked(date))
    }

    /// Validates a proposed slot. `exclude_booking_id` lets a booking keep its own slot
    /// when rescheduling.
    pub fn check_slot(
        &self,
        conn: &Connection,
        provider_id: &str,
        date: NaiveDate,
        time: &str,
        today: NaiveDate,
        exclude_booking_id: Option<&str>,
    ) -> Result<(), AppError> {
        parse_time(time).map_err(|e| AppError::Validation(e.to_string()))?;

        if date < today {
            return Err(AppError::PastDate(date.to_string()));
        }

        let taken = queries::active_booking_times(conn, provider_id, &date, exclude_booking_id)?;
        if taken.iter().any(|t| t == time) {
            return Err(AppError::SlotConflict {
                date: date.to_string(),
                time: time.to_string(),
            });
        }

        let open = self.slots_excluding(conn, provider_id, date, today, exclude_booking_id)?;
        if !open.iter().any(|t| t == time) {
            return Err(AppError::NotBookable {
                date: date.to_string(),
                time: time.to_string(),
            });
        }

        Ok(())
    }
}

/// Grid slots for `date` minus blocked starts and `taken` labels.
pub fn open_slots(
    avail: &Availability,
    date: NaiveDate,
    slot_minutes: u32,
    taken: &[String],
) -> Vec<String> {
    avail
        .slot_grid(date, slot_minutes)
        .into_iter()
        .filter(|slot| {
            parse_time(slot)
                .map(|minute| !avail.is_blocked_at(date, minute))
                .unwrap_or(false)
        })
        .filter(|slot| !taken.contains(slot))
        .collect()
}
