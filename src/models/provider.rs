use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Provider classification driving the commission rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderTier {
    New,
    Verified,
    Standard,
    Premium,
    Enterprise,
}

impl ProviderTier {
    pub const ALL: [ProviderTier; 5] = [
        ProviderTier::New,
        ProviderTier::Verified,
        ProviderTier::Standard,
        ProviderTier::Premium,
        ProviderTier::Enterprise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTier::New => "NEW",
            ProviderTier::Verified => "VERIFIED",
            ProviderTier::Standard => "STANDARD",
            ProviderTier::Premium => "PREMIUM",
            ProviderTier::Enterprise => "ENTERPRISE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NEW" => Some(ProviderTier::New),
            "VERIFIED" => Some(ProviderTier::Verified),
            "STANDARD" => Some(ProviderTier::Standard),
            "PREMIUM" => Some(ProviderTier::Premium),
            "ENTERPRISE" => Some(ProviderTier::Enterprise),
            _ => None,
        }
    }

    /// The bucket a tier falls back to when no rate is configured for it.
    pub fn family(&self) -> ProviderTier {
        match self {
            ProviderTier::New | ProviderTier::Verified | ProviderTier::Standard => {
                ProviderTier::Standard
            }
            ProviderTier::Premium | ProviderTier::Enterprise => ProviderTier::Premium,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub email: String,
    pub tier: ProviderTier,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(ProviderTier::parse("verified"), Some(ProviderTier::Verified));
        assert_eq!(ProviderTier::parse(" ENTERPRISE "), Some(ProviderTier::Enterprise));
        assert_eq!(ProviderTier::parse("gold"), None);
    }

    #[test]
    fn test_family_mapping_is_total() {
        assert_eq!(ProviderTier::New.family(), ProviderTier::Standard);
        assert_eq!(ProviderTier::Verified.family(), ProviderTier::Standard);
        assert_eq!(ProviderTier::Standard.family(), ProviderTier::Standard);
        assert_eq!(ProviderTier::Premium.family(), ProviderTier::Premium);
        assert_eq!(ProviderTier::Enterprise.family(), ProviderTier::Premium);
    }

    #[test]
    fn test_as_str_round_trips_through_parse() {
        for tier in ProviderTier::ALL {
            assert_eq!(ProviderTier::parse(tier.as_str()), Some(tier));
        }
    }
}
