use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::DomainEvent;
use crate::services::commission::RateResolver;
use crate::services::gateway::PaymentGateway;
use crate::services::notify::Notifier;
use crate::services::slots::SlotAllocator;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub slots: SlotAllocator,
    pub rates: RateResolver,
    pub gateway: Box<dyn PaymentGateway>,
    pub notifier: Box<dyn Notifier>,
    pub events_tx: broadcast::Sender<DomainEvent>,
}

impl AppState {
    pub fn new(
        conn: Connection,
        config: AppConfig,
        gateway: Box<dyn PaymentGateway>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(256);
        Self {
            db: Arc::new(Mutex::new(conn)),
            slots: SlotAllocator::new(config.slot_minutes, config.unconfigured_availability),
            rates: RateResolver::new(config.commission.clone()),
            config,
            gateway,
            notifier,
            events_tx,
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("database lock poisoned")))
    }
}
