use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub start: String,
    pub end: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedSlot {
    pub id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub reason: Option<String>,
}

/// Weekly working-hour template plus ad-hoc blocked ranges for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub provider_id: String,
    pub working_hours: BTreeMap<String, DaySchedule>,
    pub blocked_slots: Vec<BlockedSlot>,
}

/// What the slot allocator assumes for a provider with no availability record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnconfiguredAvailability {
    /// Nothing is bookable until the provider publishes hours.
    Closed,
    /// The default weekday template applies.
    Open,
}

impl UnconfiguredAvailability {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "open" => UnconfiguredAvailability::Open,
            _ => UnconfiguredAvailability::Closed,
        }
    }
}

impl Availability {
    /// Monday to Friday, 09:00-17:00.
    pub fn default_template(provider_id: &str) -> Self {
        let working_hours = WEEKDAYS
            .iter()
            .map(|day| {
                let schedule = DaySchedule {
                    start: "09:00".to_string(),
                    end: "17:00".to_string(),
                    enabled: !matches!(*day, "sat" | "sun"),
                };
                (day.to_string(), schedule)
            })
            .collect();

        Self {
            provider_id: provider_id.to_string(),
            working_hours,
            blocked_slots: Vec::new(),
        }
    }

    /// Enabled working window for the weekday of `date`, in minutes since midnight.
    pub fn working_window(&self, date: NaiveDate) -> Option<(u32, u32)> {
        let day = self.working_hours.get(weekday_key(date))?;
        if !day.enabled {
            return None;
        }
        let start = parse_time(&day.start).ok()?;
        let end = parse_time(&day.end).ok()?;
        (start < end).then_some((start, end))
    }

    fn block_ranges(&self, date: NaiveDate) -> Vec<(u32, u32)> {
        let mut ranges: Vec<(u32, u32)> = self
            .blocked_slots
            .iter()
            .filter(|b| b.date == date)
            .filter_map(|b| {
                let start = parse_time(&b.start_time).ok()?;
                let end = parse_time(&b.end_time).ok()?;
                (start < end).then_some((start, end))
            })
            .collect();
        ranges.sort_unstable();
        ranges
    }

    pub fn is_blocked_at(&self, date: NaiveDate, minute: u32) -> bool {
        self.block_ranges(date)
            .iter()
            .any(|(start, end)| *start <= minute && minute < *end)
    }

    /// True when the union of the day's blocks covers the whole working window,
    /// including when the cover is made of several adjacent or overlapping ranges.
    pub fn is_fully_blocked(&self, date: NaiveDate) -> bool {
        let Some((work_start, work_end)) = self.working_window(date) else {
            return false;
        };

        let mut covered_until = work_start;
        for (start, end) in self.block_ranges(date) {
            if start > covered_until {
                break;
            }
            covered_until = covered_until.max(end);
            if covered_until >= work_end {
                return true;
            }
        }
        covered_until >= work_end
    }

    /// The fixed slot grid for `date`, ignoring blocks and bookings.
    pub fn slot_grid(&self, date: NaiveDate, slot_minutes: u32) -> Vec<String> {
        let Some((start, end)) = self.working_window(date) else {
            return Vec::new();
        };
        if slot_minutes == 0 {
            return Vec::new();
        }

        let mut slots = Vec::new();
        let mut t = start;
        while t + slot_minutes <= end {
            slots.push(format_minutes(t));
            t += slot_minutes;
        }
        slots
    }
}

pub fn validate_working_hours(hours: &BTreeMap<String, DaySchedule>) -> anyhow::Result<()> {
    for (day, schedule) in hours {
        parse_weekday(day)?;
        let start = parse_time(&schedule.start)?;
        let end = parse_time(&schedule.end)?;
        if schedule.enabled && start >= end {
            return Err(anyhow::anyhow!(
                "{day}: start {} must be before end {}",
                schedule.start,
                schedule.end
            ));
        }
    }
    Ok(())
}

pub fn validate_time_range(start: &str, end: &str) -> anyhow::Result<()> {
    if parse_time(start)? >= parse_time(end)? {
        return Err(anyhow::anyhow!("start {start} must be before end {end}"));
    }
    Ok(())
}

pub fn weekday_key(date: NaiveDate) -> &'static str {
    WEEKDAYS[date.weekday().num_days_from_monday() as usize]
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    if WEEKDAYS.contains(&s) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("invalid weekday: {s}"))
    }
}

/// Parses `HH:MM` into minutes since midnight.
pub fn parse_time(s: &str) -> anyhow::Result<u32> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 || parts[0].len() != 2 || parts[1].len() != 2 {
        return Err(anyhow::anyhow!("invalid time format: {s}"));
    }
    let hour: u32 = parts[0]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid hour in: {s}"))?;
    let minute: u32 = parts[1]
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid minute in: {s}"))?;
    if hour > 23 || minute > 59 {
        return Err(anyhow::anyhow!("time out of range: {s}"));
    }
    Ok(hour * 60 + minute)
}

pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn block(date_str: &str, start: &str, end: &str) -> BlockedSlot {
        BlockedSlot {
            id: format!("{date_str}-{start}"),
            date: date(date_str),
            start_time: start.to_string(),
            end_time: end.to_string(),
            reason: None,
        }
    }

    fn nine_to_six() -> Availability {
        let mut avail = Availability::default_template("p1");
        for schedule in avail.working_hours.values_mut() {
            schedule.start = "09:00".to_string();
            schedule.end = "18:00".to_string();
        }
        avail
    }

    #[test]
    fn test_default_template_weekdays_only() {
        let avail = Availability::default_template("p1");
        // 2025-06-16 is a Monday, 2025-06-15 a Sunday
        assert_eq!(avail.working_window(date("2025-06-16")), Some((540, 1020)));
        assert_eq!(avail.working_window(date("2025-06-15")), None);
    }

    #[test]
    fn test_slot_grid_hourly() {
        let avail = Availability::default_template("p1");
        let grid = avail.slot_grid(date("2025-06-16"), 60);
        assert_eq!(grid.len(), 8);
        assert_eq!(grid.first().map(String::as_str), Some("09:00"));
        assert_eq!(grid.last().map(String::as_str), Some("16:00"));
    }

    #[test]
    fn test_slot_grid_half_hourly() {
        let avail = Availability::default_template("p1");
        let grid = avail.slot_grid(date("2025-06-16"), 30);
        assert_eq!(grid.len(), 16);
        assert_eq!(grid[1], "09:30");
    }

    #[test]
    fn test_slot_grid_disabled_day_is_empty() {
        let avail = Availability::default_template("p1");
        assert!(avail.slot_grid(date("2025-06-21"), 60).is_empty());
    }

    #[test]
    fn test_two_blocks_compose_to_full_day() {
        let mut avail = nine_to_six();
        avail.blocked_slots = vec![
            block("2025-06-16", "13:00", "18:00"),
            block("2025-06-16", "09:00", "13:00"),
        ];
        assert!(avail.is_fully_blocked(date("2025-06-16")));
    }

    #[test]
    fn test_single_morning_block_is_partial() {
        let mut avail = nine_to_six();
        avail.blocked_slots = vec![block("2025-06-16", "09:00", "13:00")];
        assert!(!avail.is_fully_blocked(date("2025-06-16")));
        assert!(avail.is_blocked_at(date("2025-06-16"), 12 * 60 + 30));
        assert!(!avail.is_blocked_at(date("2025-06-16"), 13 * 60));
    }

    #[test]
    fn test_overlapping_blocks_cover_day() {
        let mut avail = nine_to_six();
        avail.blocked_slots = vec![
            block("2025-06-16", "08:00", "12:00"),
            block("2025-06-16", "11:00", "15:30"),
            block("2025-06-16", "15:00", "19:00"),
        ];
        assert!(avail.is_fully_blocked(date("2025-06-16")));
    }

    #[test]
    fn test_gap_between_blocks_keeps_day_open() {
        let mut avail = nine_to_six();
        avail.blocked_slots = vec![
            block("2025-06-16", "09:00", "12:00"),
            block("2025-06-16", "12:30", "18:00"),
        ];
        assert!(!avail.is_fully_blocked(date("2025-06-16")));
    }

    #[test]
    fn test_blocks_on_other_dates_ignored() {
        let mut avail = nine_to_six();
        avail.blocked_slots = vec![block("2025-06-17", "00:00", "23:59")];
        assert!(!avail.is_fully_blocked(date("2025-06-16")));
        assert!(avail.is_fully_blocked(date("2025-06-17")));
    }

    #[test]
    fn test_validate_rejects_inverted_hours() {
        let mut avail = Availability::default_template("p1");
        avail.working_hours.insert(
            "mon".to_string(),
            DaySchedule {
                start: "17:00".to_string(),
                end: "09:00".to_string(),
                enabled: true,
            },
        );
        assert!(validate_working_hours(&avail.working_hours).is_err());
    }

    #[test]
    fn test_validate_ignores_order_on_disabled_day() {
        let mut hours = BTreeMap::new();
        hours.insert(
            "sun".to_string(),
            DaySchedule {
                start: "17:00".to_string(),
                end: "09:00".to_string(),
                enabled: false,
            },
        );
        assert!(validate_working_hours(&hours).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_day() {
        let mut hours = BTreeMap::new();
        hours.insert(
            "xyz".to_string(),
            DaySchedule {
                start: "09:00".to_string(),
                end: "17:00".to_string(),
                enabled: true,
            },
        );
        assert!(validate_working_hours(&hours).is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:30").unwrap(), 570);
        assert!(parse_time("25:00").is_err());
        assert!(parse_time("9:30").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn test_validate_time_range() {
        assert!(validate_time_range("09:00", "13:00").is_ok());
        assert!(validate_time_range("13:00", "13:00").is_err());
    }
}
