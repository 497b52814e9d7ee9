use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{CommissionConfig, ProviderTier, RateChange, RateUpdate, ServiceType};

/// Words that mark a service as urgent.
pub const URGENT_KEYWORDS: &[&str] = &[
    "emergency",
    "urgent",
    "leak",
    "leaking",
    "burst",
    "asap",
    "same day",
    "same-day",
];

/// Words that mark a service as recurring.
pub const RECURRING_KEYWORDS: &[&str] = &[
    "weekly",
    "bi-weekly",
    "fortnightly",
    "monthly",
    "maintenance",
    "recurring",
    "subscription",
];

pub fn min_rate() -> Decimal {
    Decimal::new(5, 2)
}

pub fn max_rate() -> Decimal {
    Decimal::new(50, 2)
}

pub fn clamp_rate(rate: Decimal) -> Decimal {
    rate.clamp(min_rate(), max_rate())
}

pub fn validate_rate(rate: Decimal) -> Result<Decimal, AppError> {
    if rate < min_rate() || rate > max_rate() {
        return Err(AppError::InvalidCommissionRate(rate.to_string()));
    }
    Ok(rate)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommissionDefaults {
    pub fallback_rate: Decimal,
    pub urgent_rate: Decimal,
    pub recurring_rate: Decimal,
}

impl Default for CommissionDefaults {
    fn default() -> Self {
        Self {
            fallback_rate: Decimal::new(18, 2),
            urgent_rate: Decimal::new(25, 2),
            recurring_rate: Decimal::new(15, 2),
        }
    }
}

/// Precedence for a standard service: admin-configured rate for the exact
/// tier, then the rate configured for the tier's family bucket, then
/// [`CommissionDefaults::fallback_rate`]. Urgent and recurring services use
/// their fixed rate instead of the tier rate. Every result is clamped to
/// [`min_rate`]..=[`max_rate`].
#[derive(Debug, Clone)]
pub struct RateResolver {
    defaults: CommissionDefaults,
}

impl RateResolver {
    pub fn new(defaults: CommissionDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &CommissionDefaults {
        &self.defaults
    }

    pub fn resolve(
        &self,
        config: &CommissionConfig,
        tier: ProviderTier,
        service_type: ServiceType,
    ) -> Decimal {
        let rate = match service_type {
            ServiceType::Urgent => self.defaults.urgent_rate,
            ServiceType::Recurring => self.defaults.recurring_rate,
            ServiceType::Standard => self.tier_rate(config, tier),
        };
        clamp_rate(rate)
    }

    fn tier_rate(&self, config: &CommissionConfig, tier: ProviderTier) -> Decimal {
        config
            .rates
            .get(&tier)
            .or_else(|| config.rates.get(&tier.family()))
            .copied()
            .unwrap_or(self.defaults.fallback_rate)
    }
}

/// Lowercased words of `text`, space-separated and padded so a keyword only
/// matches whole words.
fn word_string(text: &str) -> String {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    format!(" {} ", words.join(" ").to_lowercase())
}

fn mentions_any(words: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| words.contains(&word_string(k)))
}

/// Keyword heuristic over a free-text service description.
///
/// This is approximate: it only looks for the whole words in
/// [`URGENT_KEYWORDS`] and [`RECURRING_KEYWORDS`], and treats a service
/// scheduled on or before the day it was requested as urgent. Anything else is
/// standard.
pub fn classify_service(
    description: &str,
    service_date: NaiveDate,
    requested_on: NaiveDate,
) -> ServiceType {
    let words = word_string(description);

    if service_date <= requested_on || mentions_any(&words, URGENT_KEYWORDS) {
        ServiceType::Urgent
    } else if mentions_any(&words, RECURRING_KEYWORDS) {
        ServiceType::Recurring
    } else {
        ServiceType::Standard
    }
}

pub fn load_config(conn: &Connection) -> Result<CommissionConfig, AppError> {
    Ok(queries::get_commission_config(conn)?)
}

/// Applies all `updates` as one new configuration version, with one audit row
/// per tier. Nothing is written if any rate is out of range.
pub fn update_rates(
    conn: &Connection,
    updates: &[RateUpdate],
    changed_by: &str,
    reason: &str,
    now: NaiveDateTime,
) -> Result<(CommissionConfig, Vec<RateChange>), AppError> {
    if updates.is_empty() {
        return Err(AppError::Validation("no rate changes supplied".to_string()));
    }
    if changed_by.trim().is_empty() || reason.trim().is_empty() {
        return Err(AppError::Validation(
            "rate changes require changed_by and reason".to_string(),
        ));
    }
    for update in updates {
        validate_rate(update.rate)?;
    }

    let tx = conn.unchecked_transaction()?;
    let current = queries::get_commission_config(&tx)?;
    let version = queries::bump_commission_version(&tx, changed_by, &now)?;

    let mut changes = Vec::with_capacity(updates.len());
    for update in updates {
        queries::upsert_commission_rate(&tx, update.tier, &update.rate)?;

        let mut change = RateChange {
            id: 0,
            tier: update.tier,
            old_rate: current.rates.get(&update.tier).copied(),
            new_rate: update.rate,
            changed_by: changed_by.to_string(),
            reason: reason.to_string(),
            config_version: version,
            changed_at: now,
        };
        change.id = queries::insert_rate_change(&tx, &change)?;
        changes.push(change);
    }

    let config = queries::get_commission_config(&tx)?;
    tx.commit()?;

    tracing::info!(
        version,
        changed_by,
        tiers = changes.len(),
        "commission configuration updated"
    );

    Ok((config, changes))
}
