//! HTTP API for munim

mod handlers;
mod render;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::Config;
use crate::db::Database;
use crate::runtime::{production_runtime, ProductionRuntime};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            runtime: Arc::new(production_runtime(db, config)),
        }
    }
}
