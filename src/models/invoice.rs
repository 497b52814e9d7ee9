use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PaymentMethod, ServiceType};

/// Immutable financial summary of a settled booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: String,
    pub invoice_number: String,
    pub booking_id: String,
    pub provider_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub service_name: String,
    pub service_date: NaiveDate,
    pub service_type: ServiceType,
    /// Rate in effect at settlement time, as a fraction.
    pub commission_rate: Decimal,
    pub total_amount: Decimal,
    pub platform_commission: Decimal,
    pub provider_payout: Decimal,
    pub commission_owed: Decimal,
    pub payment_method: PaymentMethod,
    pub created_at: NaiveDateTime,
}
