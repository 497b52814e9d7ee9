use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("slot {date} {time} is no longer available")]
    SlotConflict { date: String, time: String },

    #[error("date {0} is in the past")]
    PastDate(String),

    #[error("slot {date} {time} is not bookable")]
    NotBookable { date: String, time: String },

    #[error("cannot {action} a booking that is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("booking not found: {0}")]
    BookingNotFound(String),

    #[error("booking {0} is not completed")]
    BookingNotCompleted(String),

    #[error("commission rate {0} is outside 5%-50%")]
    InvalidCommissionRate(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("payment {0} could not be verified")]
    PaymentNotVerified(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::SlotConflict { .. } => "slot_conflict",
            AppError::PastDate(_) => "past_date",
            AppError::NotBookable { .. } => "not_bookable",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::BookingNotCompleted(_) => "booking_not_completed",
            AppError::InvalidCommissionRate(_) => "invalid_commission_rate",
            AppError::ProviderNotFound(_) => "provider_not_found",
            AppError::TransactionNotFound(_) => "transaction_not_found",
            AppError::PaymentNotVerified(_) => "payment_not_verified",
            AppError::Validation(_) => "validation",
            AppError::Gateway(_) => "gateway",
            AppError::Unauthorized => "unauthorized",
            AppError::Config(_) => "config",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SlotConflict { .. } => StatusCode::CONFLICT,
            AppError::PastDate(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotBookable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            AppError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            AppError::BookingNotCompleted(_) => StatusCode::CONFLICT,
            AppError::InvalidCommissionRate(_) => StatusCode::BAD_REQUEST,
            AppError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::PaymentNotVerified(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "kind": self.kind() });
        (status, axum::Json(body)).into_response()
    }
}

/// True when `err` wraps a UNIQUE constraint failure reported by SQLite.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
