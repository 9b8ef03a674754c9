// src/routes/teleconsult_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, CareRole, TeleConsult},
    routes::{patient_routes::TeleConsultDto, trimmed},
    store::Repository,
    thai_date::{format_thai_date, parse_iso_date},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/teleconsults", get(list_teleconsults).post(create_teleconsult))
}

#[derive(Debug, Deserialize)]
pub struct ListTeleConsultsQuery {
    pub hn: Option<String>,
}

pub async fn list_teleconsults(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<ListTeleConsultsQuery>,
) -> Result<Json<ApiOk<Vec<TeleConsultDto>>>, ApiError> {
    let hn = trimmed(q.hn);
    let mut rows = state
        .store
        .teleconsults
        .filter(|t| hn.as_deref().is_none_or(|h| t.hn == h))
        .await;
    rows.sort_by(|a, b| b.record.date.cmp(&a.record.date));

    let items = rows
        .into_iter()
        .map(|v| TeleConsultDto { date_display: format_thai_date(&v.record.date), consult: v.record })
        .collect();
    Ok(Json(ApiOk { data: items }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTeleConsultRequest {
    pub hn: String,
    pub date: String,
    pub specialist: String,
    pub channel: Option<String>,
    pub summary: Option<String>,
}

pub async fn create_teleconsult(
    State(state): State<AppState>,
    ctx: RoleContext,
    Json(req): Json<CreateTeleConsultRequest>,
) -> Result<Json<ApiOk<TeleConsultDto>>, ApiError> {
    if ctx.role != CareRole::Cm {
        return Err(ApiError::Forbidden("FORBIDDEN", "Only case managers record tele-consults".into()));
    }
    if parse_iso_date(&req.date).is_none() {
        return Err(ApiError::validation("date must be YYYY-MM-DD"));
    }
    let specialist = req.specialist.trim();
    if specialist.is_empty() {
        return Err(ApiError::validation("specialist is required"));
    }
    let patient = state
        .store
        .patient_by_hn(req.hn.trim())
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?;

    let stored = state
        .store
        .teleconsults
        .insert(TeleConsult {
            id: Uuid::new_v4(),
            hn: patient.record.hn,
            date: req.date.trim().to_string(),
            specialist: specialist.to_string(),
            channel: trimmed(req.channel),
            summary: trimmed(req.summary),
        })
        .await;

    Ok(Json(ApiOk {
        data: TeleConsultDto { date_display: format_thai_date(&stored.record.date), consult: stored.record },
    }))
}
