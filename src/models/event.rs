use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{BookingStatus, PaymentMethod};

/// Events handed to the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingStateChanged {
        booking_id: String,
        provider_id: String,
        customer_email: String,
        from: BookingStatus,
        to: BookingStatus,
    },
    BookingRescheduled {
        booking_id: String,
        provider_id: String,
        customer_email: String,
        date: String,
        time: String,
    },
    InvoiceGenerated {
        booking_id: String,
        invoice_id: String,
        provider_id: String,
        payment_method: PaymentMethod,
        total_amount: Decimal,
        commission_owed: Decimal,
    },
    CommissionOverdue {
        transaction_id: String,
        provider_id: String,
        commission_owed: Decimal,
    },
    CommissionCollected {
        transaction_id: String,
        provider_id: String,
        amount: Decimal,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::BookingStateChanged { .. } => "booking_state_changed",
            DomainEvent::BookingRescheduled { .. } => "booking_rescheduled",
            DomainEvent::InvoiceGenerated { .. } => "invoice_generated",
            DomainEvent::CommissionOverdue { .. } => "commission_overdue",
            DomainEvent::CommissionCollected { .. } => "commission_collected",
        }
    }
}
