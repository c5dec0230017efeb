//! Core of the Mastery Hub board-exam preparation portal.
//!
//! The crate exposes the operations behind the portal's administrative
//! screens: sign-in, user and role administration, the curriculum
//! repository, review materials, assessments, the pre-registration
//! whitelist, institutional settings and backups. Rendering is left to the
//! caller; every operation lives in [`handler`] and takes an [`AppState`].
//!
//! Persistence goes through the [`store::KeyValueStore`] port, one JSON
//! document per collection.

pub mod access;
pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod models;
pub mod seed;
pub mod store;
pub mod tracing_config;
pub mod utils;
pub mod workflow;

use std::sync::Arc;

use config::Config;
use db::DBClient;
use utils::latency::Latency;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub latency: Latency,
}

impl AppState {
    /// Wires a state from config; the activity log capacity and the
    /// simulated latency both come from `config`
    pub fn new(config: Config, store: impl store::KeyValueStore + 'static) -> Self {
        let db_client = DBClient::new(store).with_log_capacity(config.activity_log_capacity);
        let latency = Latency::from_millis(config.latency_ms);
        AppState {
            env: Arc::new(config),
            db_client,
            latency,
        }
    }
}
