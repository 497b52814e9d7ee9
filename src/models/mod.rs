pub mod availability;
pub mod booking;
pub mod commission;
pub mod event;
pub mod invoice;
pub mod provider;
pub mod transaction;

pub use availability::{Availability, BlockedSlot, DaySchedule, UnconfiguredAvailability};
pub use booking::{
    Booking, BookingAction, BookingHistoryEntry, BookingStatus, PaymentMethod, PaymentStatus,
};
pub use commission::{CommissionConfig, RateChange, RateUpdate, ServiceType};
pub use event::DomainEvent;
pub use invoice::Invoice;
pub use provider::{Provider, ProviderTier};
pub use transaction::{
    AdminCommissionSummary, CommissionStatus, OutstandingCommission, PaymentTransaction,
    ProviderFinancialSummary,
};
