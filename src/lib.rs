pub mod config;
pub mod error;
pub mod form;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod seed;
pub mod status;
pub mod store;
pub mod thai_date;

use std::sync::Arc;

use crate::config::Config;
use crate::models::AppState;
use crate::seed::{SeedData, SeedError};
use crate::status::StatusNormalizer;
use crate::store::CareStore;

/// Build the shared state and load the seed dataset into it.
pub async fn build_state(cfg: &Config) -> Result<AppState, SeedError> {
    let seed = match cfg.seed_path.as_deref() {
        Some(path) => SeedData::from_path(path)?,
        None => SeedData::builtin()?,
    };

    let store = Arc::new(CareStore::new(cfg.event_buffer));
    let normalizer = Arc::new(StatusNormalizer::default());
    let summary = seed::load(&store, &normalizer, seed).await;
    tracing::info!(
        patients = summary.patients,
        visits = summary.visits,
        referrals = summary.referrals,
        funds = summary.funds,
        appointments = summary.appointments,
        teleconsults = summary.teleconsults,
        skipped_funds = summary.skipped_funds,
        "seed loaded"
    );

    Ok(AppState {
        store,
        normalizer,
        reference_date: cfg.reference_date,
    })
}
