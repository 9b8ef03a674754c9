// src/routes/gis_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, GeoPoint},
    routes::{status_filter, trimmed},
    status::{Locale, StatusView},
    store::Repository,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/gis/markers", get(list_markers))
}

#[derive(Debug, Serialize)]
pub struct Marker {
    pub hn: String,
    pub name: String,
    pub district: Option<String>,
    pub location: GeoPoint,
    pub responsible_health_center: String,
    /// status of the most recent home visit, if any
    pub latest_visit: Option<StatusView>,
}

#[derive(Debug, Deserialize)]
pub struct MarkerQuery {
    pub district: Option<String>,
    /// raw status token matched against the latest visit
    pub status: Option<String>,
    pub locale: Option<Locale>,
}

/// Patients without coordinates are left off the map.
pub async fn list_markers(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<MarkerQuery>,
) -> Result<Json<ApiOk<Vec<Marker>>>, ApiError> {
    let district = trimmed(q.district);
    let status = status_filter(&state.normalizer, q.status)?;
    let locale = q.locale.unwrap_or_default();

    let patients = state.store.patients.list().await;
    let visits = state.store.visits.list().await;

    let mut markers = Vec::new();
    for p in patients.into_iter().map(|v| v.record) {
        let Some(location) = p.location else { continue };
        if district.as_deref().is_some_and(|d| p.district.as_deref() != Some(d)) {
            continue;
        }

        let latest = visits
            .iter()
            .filter(|v| v.record.hn == p.hn)
            .max_by(|a, b| a.record.date.cmp(&b.record.date))
            .map(|v| v.record.status);
        if status.is_some() && latest != status {
            continue;
        }

        markers.push(Marker {
            hn: p.hn,
            name: p.name,
            district: p.district,
            location,
            responsible_health_center: p.responsible_health_center,
            latest_visit: latest.map(|s| StatusView::new(s, locale)),
        });
    }

    Ok(Json(ApiOk { data: markers }))
}
