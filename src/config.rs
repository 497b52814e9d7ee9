use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::errors::AppError;
use crate::models::UnconfiguredAvailability;
use crate::services::commission::{self, CommissionDefaults};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    /// Empty means notifications are only logged.
    pub notify_webhook_url: String,
    pub slot_minutes: u32,
    pub commission_due_days: i64,
    pub overdue_sweep_secs: u64,
    pub commission: CommissionDefaults,
    pub unconfigured_availability: UnconfiguredAvailability,
}

fn var_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {v}"))),
        _ => Ok(default),
    }
}

fn rate_var(key: &str, default: Decimal) -> Result<Decimal, AppError> {
    let rate = var_or(key, default)?;
    commission::validate_rate(rate)
        .map_err(|_| AppError::Config(format!("{key} must be between 0.05 and 0.50")))
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = CommissionDefaults::default();

        let slot_minutes: u32 = var_or("SLOT_MINUTES", 60)?;
        if slot_minutes == 0 || slot_minutes > 24 * 60 {
            return Err(AppError::Config(format!(
                "SLOT_MINUTES must be between 1 and 1440, got {slot_minutes}"
            )));
        }

        Ok(Self {
            port: var_or("PORT", 3000)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "servicebook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            gateway_base_url: env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            gateway_secret_key: env::var("GATEWAY_SECRET_KEY").unwrap_or_default(),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default(),
            slot_minutes,
            commission_due_days: var_or("COMMISSION_DUE_DAYS", 7)?,
            overdue_sweep_secs: var_or("OVERDUE_SWEEP_SECS", 3600)?,
            commission: CommissionDefaults {
                fallback_rate: rate_var("COMMISSION_FALLBACK_RATE", defaults.fallback_rate)?,
                urgent_rate: rate_var("COMMISSION_URGENT_RATE", defaults.urgent_rate)?,
                recurring_rate: rate_var("COMMISSION_RECURRING_RATE", defaults.recurring_rate)?,
            },
            unconfigured_availability: UnconfiguredAvailability::parse(
                &env::var("UNCONFIGURED_AVAILABILITY").unwrap_or_default(),
            ),
        })
    }
}
