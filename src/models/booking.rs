use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub provider_id: String,
    pub customer_email: String,
    pub customer_name: String,
    pub service_name: String,
    pub date: NaiveDate,
    pub time: String,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub total_amount: Decimal,
    /// Commission already deducted by the gateway. Zero for cash bookings.
    pub platform_commission: Decimal,
    pub provider_payout: Decimal,
    /// Commission the provider must remit. Zero for electronic bookings.
    pub commission_owed: Decimal,
    pub invoice_generated: bool,
    pub invoice_id: Option<String>,
    pub service_completion_date: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "CONFIRMED" => BookingStatus::Confirmed,
            "IN_PROGRESS" => BookingStatus::InProgress,
            "COMPLETED" => BookingStatus::Completed,
            "CANCELLED" => BookingStatus::Cancelled,
            _ => BookingStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_reschedule(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

/// Provider or customer driven lifecycle action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Confirm,
    Decline,
    Cancel,
    Start,
    Complete,
}

impl BookingAction {
    pub const ALL: [BookingAction; 5] = [
        BookingAction::Confirm,
        BookingAction::Decline,
        BookingAction::Cancel,
        BookingAction::Start,
        BookingAction::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Confirm => "confirm",
            BookingAction::Decline => "decline",
            BookingAction::Cancel => "cancel",
            BookingAction::Start => "start",
            BookingAction::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirm" => Some(BookingAction::Confirm),
            "decline" => Some(BookingAction::Decline),
            "cancel" => Some(BookingAction::Cancel),
            "start" => Some(BookingAction::Start),
            "complete" => Some(BookingAction::Complete),
            _ => None,
        }
    }

    /// Transition table. `None` means the action is illegal from `from`.
    pub fn next_status(&self, from: BookingStatus) -> Option<BookingStatus> {
        use BookingAction::*;
        use BookingStatus::*;

        match (from, self) {
            (Pending, Confirm) => Some(Confirmed),
            (Pending, Decline) | (Pending, Cancel) => Some(Cancelled),
            (Confirmed, Cancel) => Some(Cancelled),
            (Confirmed, Start) => Some(InProgress),
            (InProgress, Complete) => Some(Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Electronic,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Electronic => "ELECTRONIC",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "ELECTRONIC" => PaymentMethod::Electronic,
            _ => PaymentMethod::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "PAID" => PaymentStatus::Paid,
            "REFUNDED" => PaymentStatus::Refunded,
            "FAILED" => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingHistoryEntry {
    pub id: i64,
    pub booking_id: String,
    pub action: String,
    pub from_status: BookingStatus,
    pub to_status: BookingStatus,
    pub reason: Option<String>,
    pub detail: Option<String>,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUSES: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    #[test]
    fn test_legal_transitions() {
        assert_eq!(
            BookingAction::Confirm.next_status(BookingStatus::Pending),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(
            BookingAction::Decline.next_status(BookingStatus::Pending),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(
            BookingAction::Cancel.next_status(BookingStatus::Confirmed),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(
            BookingAction::Start.next_status(BookingStatus::Confirmed),
            Some(BookingStatus::InProgress)
        );
        assert_eq!(
            BookingAction::Complete.next_status(BookingStatus::InProgress),
            Some(BookingStatus::Completed)
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for action in BookingAction::ALL {
            assert_eq!(action.next_status(BookingStatus::Completed), None);
            assert_eq!(action.next_status(BookingStatus::Cancelled), None);
        }
    }

    #[test]
    fn test_legal_action_count_per_state() {
        let legal = |s: BookingStatus| {
            BookingAction::ALL
                .iter()
                .filter(|a| a.next_status(s).is_some())
                .count()
        };
        assert_eq!(legal(BookingStatus::Pending), 3);
        assert_eq!(legal(BookingStatus::Confirmed), 2);
        assert_eq!(legal(BookingStatus::InProgress), 1);
    }

    #[test]
    fn test_complete_from_pending_is_illegal() {
        assert_eq!(BookingAction::Complete.next_status(BookingStatus::Pending), None);
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in STATUSES {
            assert_eq!(BookingStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_only_pending_and_confirmed_reschedule() {
        let reschedulable: Vec<_> = STATUSES.into_iter().filter(|s| s.can_reschedule()).collect();
        assert_eq!(
            reschedulable,
            vec![BookingStatus::Pending, BookingStatus::Confirmed]
        );
    }
}
