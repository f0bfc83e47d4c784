use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::services::bookings::BookingService;
use crate::services::notifications::Notifier;
use crate::services::payments::PaymentService;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            config,
            notifier,
        }
    }

    pub fn bookings(&self) -> BookingService {
        BookingService::new(Arc::clone(&self.db), Arc::clone(&self.notifier))
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(Arc::clone(&self.db))
    }
}
