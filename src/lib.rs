//! Crate entrypoint wiring together configuration, the zone sync engine,
//! and the HTTP API.

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod normalize;
pub mod poll;
pub mod store;
pub mod sync;
pub mod validation;

use config::ZoneConfig;
use poll::Broadcaster;
use store::SnapshotStore;

use std::sync::Arc;

/// Everything the HTTP handlers read from. The poll loop writes to
/// `store` and publishes through `updates`.
pub struct AppState {
    pub config: Arc<ZoneConfig>,
    pub store: Arc<SnapshotStore>,
    pub updates: Broadcaster,
}

/// Arc-wrapped version of `AppState` passed into Axum extensions.
pub type SharedState = Arc<AppState>;
