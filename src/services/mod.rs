pub mod availability;
pub mod booking;
pub mod commission;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod notify;
pub mod providers;
pub mod settlement;
pub mod slots;
