use crate::error::ApiError;
use crate::models::AppState;
use crate::status::{CanonicalStatus, StatusNormalizer};
use axum::Router;

pub mod appointment_routes;
pub mod chat_routes;
pub mod draft_routes;
pub mod fund_routes;
pub mod gis_routes;
pub mod home_routes;
pub mod patient_routes;
pub mod referral_routes;
pub mod teleconsult_routes;
pub mod visit_routes;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(patient_routes::router())
        .merge(visit_routes::router())
        .merge(referral_routes::router())
        .merge(fund_routes::router())
        .merge(appointment_routes::router())
        .merge(teleconsult_routes::router())
        .merge(chat_routes::router())
        .merge(gis_routes::router())
        .merge(draft_routes::router());

    Router::new()
        .nest("/api/v1", api)
        .merge(home_routes::router())
        .with_state(state)
}

/// Shared `limit`/`offset` handling for list endpoints.
pub(crate) fn paginate<T>(items: Vec<T>, limit: Option<usize>, offset: Option<usize>) -> Vec<T> {
    let limit = limit.unwrap_or(50).clamp(1, 200);
    let offset = offset.unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

pub(crate) fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// `?status=` filter; unrecognised tokens are a 400 rather than a silent Pending.
pub(crate) fn status_filter(
    normalizer: &StatusNormalizer,
    raw: Option<String>,
) -> Result<Option<CanonicalStatus>, ApiError> {
    match trimmed(raw) {
        None => Ok(None),
        Some(token) => normalizer
            .recognise(&token)
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("unknown status '{token}'"))),
    }
}
