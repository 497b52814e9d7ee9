use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Availability, Provider, ProviderTier};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProvider {
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub tier: Option<ProviderTier>,
}

/// Registers a provider together with the default availability template.
pub fn register_provider(
    conn: &Connection,
    req: &NewProvider,
    now: NaiveDateTime,
) -> Result<Provider, AppError> {
    if req.name.trim().is_empty() {
        return Err(AppError::Validation("provider name is required".to_string()));
    }

    let provider = Provider {
        id: uuid::Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        tier: req.tier.unwrap_or(ProviderTier::New),
        created_at: now,
    };

    let tx = conn.unchecked_transaction()?;
    queries::insert_provider(&tx, &provider)?;
    let template = Availability::default_template(&provider.id);
    queries::save_working_hours(&tx, &provider.id, &template.working_hours)?;
    tx.commit()?;

    tracing::info!(provider_id = %provider.id, tier = provider.tier.as_str(), "provider registered");
    Ok(provider)
}

pub fn get_provider(conn: &Connection, id: &str) -> Result<Provider, AppError> {
    queries::get_provider(conn, id)?.ok_or_else(|| AppError::ProviderNotFound(id.to_string()))
}

pub fn set_tier(conn: &Connection, id: &str, tier: ProviderTier) -> Result<Provider, AppError> {
    if !queries::update_provider_tier(conn, id, tier)? {
        return Err(AppError::ProviderNotFound(id.to_string()));
    }
    tracing::info!(provider_id = id, tier = tier.as_str(), "provider tier changed");
    get_provider(conn, id)
}
