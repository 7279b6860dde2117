//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use skillshake_core::{BookingService, CatalogService, DatabaseService, DiscoveryService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub bookings: BookingService,
    pub catalog: CatalogService,
    pub discovery: DiscoveryService,
}

impl AppState {
    /// Wires every core service to the same persistence handle.
    pub fn new(db: Arc<dyn DatabaseService>, config: Arc<Config>) -> Self {
        Self {
            bookings: BookingService::new(db.clone()),
            catalog: CatalogService::new(db.clone()),
            discovery: DiscoveryService::new(db.clone()),
            db,
            config,
        }
    }
}
