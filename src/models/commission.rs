use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProviderTier;

/// Service classification that can replace the tier rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Standard,
    Urgent,
    Recurring,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Standard => "STANDARD",
            ServiceType::Urgent => "URGENT",
            ServiceType::Recurring => "RECURRING",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "URGENT" => ServiceType::Urgent,
            "RECURRING" => ServiceType::Recurring,
            _ => ServiceType::Standard,
        }
    }
}

/// Admin-authored tier rates, replaced as a whole on every change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    pub version: i64,
    pub rates: BTreeMap<ProviderTier, Decimal>,
    pub updated_by: Option<String>,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateUpdate {
    pub tier: ProviderTier,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateChange {
    pub id: i64,
    pub tier: ProviderTier,
    pub old_rate: Option<Decimal>,
    pub new_rate: Decimal,
    pub changed_by: String,
    pub reason: String,
    pub config_version: i64,
    pub changed_at: NaiveDateTime,
}
