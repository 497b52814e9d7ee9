pub mod admin;
pub mod availability;
pub mod bookings;
pub mod health;
pub mod ledger;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhook/payment", post(webhook::payment_webhook))
        // providers: availability and slots
        .route(
            "/api/providers/:id/availability",
            get(availability::get_availability).put(availability::set_availability),
        )
        .route(
            "/api/providers/:id/blocked-slots",
            post(availability::add_blocked_slot),
        )
        .route(
            "/api/providers/:id/blocked-slots/:slot_id",
            delete(availability::remove_blocked_slot),
        )
        .route("/api/providers/:id/slots", get(availability::get_slots))
        .route("/api/providers/:id/bookable", get(availability::is_bookable))
        .route(
            "/api/providers/:id/bookings",
            get(bookings::list_provider_bookings),
        )
        .route(
            "/api/providers/:id/commission/outstanding",
            get(ledger::get_outstanding),
        )
        .route("/api/providers/:id/summary", get(ledger::get_provider_summary))
        // bookings
        .route("/api/bookings", post(bookings::create_booking))
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking).delete(bookings::delete_booking),
        )
        .route(
            "/api/bookings/:id/actions/:action",
            post(bookings::transition_booking),
        )
        .route(
            "/api/bookings/:id/reschedule",
            post(bookings::reschedule_booking),
        )
        .route("/api/bookings/:id/history", get(bookings::get_history))
        .route(
            "/api/bookings/:id/invoice",
            get(bookings::get_invoice).post(bookings::generate_invoice),
        )
        .route(
            "/api/bookings/:id/payment",
            post(bookings::initialize_payment),
        )
        .route(
            "/api/customers/bookings",
            get(bookings::list_customer_bookings),
        )
        // admin
        .route(
            "/api/admin/providers",
            get(admin::list_providers).post(admin::create_provider),
        )
        .route("/api/admin/providers/:id/tier", put(admin::set_provider_tier))
        .route(
            "/api/admin/commission/config",
            get(admin::get_commission_config).put(admin::update_commission_config),
        )
        .route(
            "/api/admin/commission/changes",
            get(admin::get_rate_changes),
        )
        .route(
            "/api/admin/commission/summary",
            get(ledger::get_admin_summary),
        )
        .route("/api/admin/commission/sweep", post(ledger::run_sweep))
        .route(
            "/api/admin/transactions/:id/collect",
            post(ledger::mark_collected),
        )
        .route(
            "/api/admin/transactions/:id/overdue",
            post(ledger::flag_overdue),
        )
        .route("/api/admin/events", get(admin::events_stream))
        .with_state(state)
}
