use axum::{Json, Router, extract::State, routing::get};

use crate::error::ApiError;
use crate::middleware::role_context::RoleContext;
use crate::models::{AppState, CareRole};
use crate::status::{CanonicalStatus, Locale};
use crate::store::Repository;

#[derive(serde::Serialize)]
pub struct HomeResponse {
    pub data: HomeData,
}

#[derive(serde::Serialize)]
pub struct StatusCount {
    pub status: CanonicalStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(serde::Serialize)]
pub struct HomeData {
    pub view: String,
    pub visits_by_status: Vec<StatusCount>,
    pub pending_referrals: usize,
    pub pending_funds: usize,
    pub patients: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home", get(home))
}

pub async fn home(
    State(state): State<AppState>,
    ctx: RoleContext,
) -> Result<Json<HomeResponse>, ApiError> {
    let view = match ctx.role {
        CareRole::Cm => "case_manager",
        CareRole::Pcu => "primary_care_unit",
        CareRole::Scfc => "field_coordinator",
    };

    let visits = state.store.visits.list().await;
    let visits_by_status = CanonicalStatus::ALL
        .iter()
        .map(|s| StatusCount {
            status: *s,
            label: s.label(Locale::Th),
            count: visits.iter().filter(|v| v.record.status == *s).count(),
        })
        .collect();

    let pending_referrals = state
        .store
        .referrals
        .filter(|r| r.status == CanonicalStatus::Pending)
        .await
        .len();
    let pending_funds = state
        .store
        .funds
        .filter(|f| f.status == CanonicalStatus::Pending)
        .await
        .len();

    Ok(Json(HomeResponse {
        data: HomeData {
            view: view.to_string(),
            visits_by_status,
            pending_referrals,
            pending_funds,
            patients: state.store.patients.len().await,
        },
    }))
}
