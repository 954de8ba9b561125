//! Runtime for executing chat turns
//!
//! Wires the pure state machine to storage and delivery. Each turn holds its
//! session's lock from load to save.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ChatRuntime, RuntimeSettings, TurnOutcome};
pub use traits::*;

use crate::config::Config;
use crate::db::Database;
use chrono::Duration;

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime = ChatRuntime<DatabaseStorage, DatabaseStorage, LogMessenger>;

impl RuntimeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            business_id: config.business_id.clone(),
            session_timeout: Duration::seconds(config.session_timeout_secs),
            seller_gstin: config.gstin.clone(),
        }
    }
}

/// Build the runtime used by the server
pub fn production_runtime(db: Database, config: &Config) -> ProductionRuntime {
    let storage = DatabaseStorage::new(db);
    ChatRuntime::new(
        storage.clone(),
        storage,
        LogMessenger,
        RuntimeSettings::from_config(config),
    )
}
