use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Collected,
    Overdue,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDING",
            CommissionStatus::Collected => "COLLECTED",
            CommissionStatus::Overdue => "OVERDUE",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "COLLECTED" => CommissionStatus::Collected,
            "OVERDUE" => CommissionStatus::Overdue,
            _ => CommissionStatus::Pending,
        }
    }

    pub fn is_outstanding(&self) -> bool {
        matches!(self, CommissionStatus::Pending | CommissionStatus::Overdue)
    }
}

/// Ledger entry written once per invoiced booking. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentTransaction {
    pub id: String,
    pub booking_id: String,
    pub invoice_id: String,
    pub provider_id: String,
    pub customer_id: String,
    pub total_amount: Decimal,
    pub platform_commission: Decimal,
    pub provider_payout: Decimal,
    pub commission_owed: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub commission_status: CommissionStatus,
    pub gateway_reference: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub gateway_fees: Option<Decimal>,
    pub commission_due_date: Option<NaiveDate>,
    pub commission_paid_date: Option<NaiveDateTime>,
    pub collection_method: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutstandingCommission {
    pub provider_id: String,
    pub total_owed: Decimal,
    pub transaction_count: usize,
    pub oldest_due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderFinancialSummary {
    pub provider_id: String,
    pub total_revenue: Decimal,
    pub total_payout: Decimal,
    pub commission_deducted: Decimal,
    pub commission_collected: Decimal,
    pub commission_outstanding: Decimal,
    pub overdue_count: usize,
    pub cash_transactions: usize,
    pub electronic_transactions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminCommissionSummary {
    pub total_revenue: Decimal,
    pub commission_collected: Decimal,
    pub commission_outstanding: Decimal,
    pub pending_count: usize,
    pub overdue_count: usize,
    pub providers: Vec<OutstandingCommission>,
}
