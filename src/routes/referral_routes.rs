// src/routes/referral_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, CareRole, LocaleQuery, ReferralRecord},
    routes::{paginate, status_filter, trimmed},
    status::{CanonicalStatus, Locale, StatusView},
    store::Repository,
    thai_date::format_thai_date,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/referrals", get(list_referrals).post(create_referral))
        .route("/referrals/{referral_id}", get(get_referral))
        .route("/referrals/{referral_id}/status", patch(update_referral_status))
}

#[derive(Debug, Serialize)]
pub struct ReferralDto {
    pub id: Uuid,
    pub hn: String,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: Option<String>,
    pub raw_status: String,
    pub status: StatusView,
    pub date: String,
    pub date_display: String,
}

pub(crate) fn referral_dto(r: ReferralRecord, locale: Locale) -> ReferralDto {
    ReferralDto {
        id: r.id,
        status: StatusView::new(r.status, locale),
        date_display: format_thai_date(&r.date),
        hn: r.hn,
        from_hospital: r.from_hospital,
        to_hospital: r.to_hospital,
        reason: r.reason,
        raw_status: r.raw_status,
        date: r.date,
    }
}

fn ensure_case_manager(ctx: &RoleContext) -> Result<(), ApiError> {
    if ctx.role == CareRole::Cm {
        Ok(())
    } else {
        Err(ApiError::Forbidden("FORBIDDEN", "Only case managers can manage referrals".into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ListReferralsQuery {
    pub status: Option<String>,
    pub hn: Option<String>,
    pub locale: Option<Locale>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_referrals(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<ListReferralsQuery>,
) -> Result<Json<ApiOk<Vec<ReferralDto>>>, ApiError> {
    let status = status_filter(&state.normalizer, q.status)?;
    let hn = trimmed(q.hn);

    let mut rows = state
        .store
        .referrals
        .filter(|r| status.is_none_or(|s| r.status == s) && hn.as_deref().is_none_or(|h| r.hn == h))
        .await;
    rows.sort_by(|a, b| b.record.date.cmp(&a.record.date));

    let locale = q.locale.unwrap_or_default();
    let items = paginate(rows, q.limit, q.offset)
        .into_iter()
        .map(|v| referral_dto(v.record, locale))
        .collect();
    Ok(Json(ApiOk { data: items }))
}

pub async fn get_referral(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(referral_id): Path<Uuid>,
    Query(q): Query<LocaleQuery>,
) -> Result<Json<ApiOk<ReferralDto>>, ApiError> {
    let r = state
        .store
        .referrals
        .get(referral_id)
        .await
        .ok_or_else(|| ApiError::not_found("referral"))?;
    Ok(Json(ApiOk { data: referral_dto(r.record, q.locale.unwrap_or_default()) }))
}

#[derive(Debug, Deserialize)]
pub struct CreateReferralRequest {
    pub hn: String,
    pub from_hospital: Option<String>,
    pub to_hospital: String,
    pub reason: Option<String>,
    pub date: Option<String>,
}

pub async fn create_referral(
    State(state): State<AppState>,
    ctx: RoleContext,
    Json(req): Json<CreateReferralRequest>,
) -> Result<Json<ApiOk<ReferralDto>>, ApiError> {
    ensure_case_manager(&ctx)?;

    let patient = state
        .store
        .patient_by_hn(req.hn.trim())
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?
        .record;
    let to_hospital = req.to_hospital.trim();
    if to_hospital.is_empty() {
        return Err(ApiError::validation("to_hospital is required"));
    }

    let stored = state
        .store
        .referrals
        .insert(ReferralRecord {
            id: Uuid::new_v4(),
            from_hospital: trimmed(req.from_hospital).unwrap_or_else(|| patient.hospital.clone()),
            hn: patient.hn,
            to_hospital: to_hospital.to_string(),
            reason: trimmed(req.reason),
            raw_status: CanonicalStatus::Pending.as_str().to_string(),
            status: CanonicalStatus::Pending,
            date: trimmed(req.date).unwrap_or_else(|| state.reference_date.format("%Y-%m-%d").to_string()),
        })
        .await;

    tracing::info!(referral_id = %stored.record.id, hn = %stored.record.hn, "referral created");
    Ok(Json(ApiOk { data: referral_dto(stored.record, Locale::default()) }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateReferralStatusRequest {
    pub status: String,
    pub expected_version: Option<u64>,
}

/// Referrals have no enforced flow; any recognised status may be set.
pub async fn update_referral_status(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(referral_id): Path<Uuid>,
    Json(req): Json<UpdateReferralStatusRequest>,
) -> Result<Json<ApiOk<ReferralDto>>, ApiError> {
    if ctx.role == CareRole::Scfc {
        return Err(ApiError::Forbidden("FORBIDDEN", "Referral status is read-only for SCFC".into()));
    }

    let status = state
        .normalizer
        .recognise(&req.status)
        .ok_or_else(|| ApiError::validation(format!("unknown status '{}'", req.status.trim())))?;

    let raw = req.status.trim().to_string();
    let updated = state
        .store
        .referrals
        .update(referral_id, req.expected_version, move |r| {
            r.raw_status = raw;
            r.status = status;
            Ok::<_, ApiError>(())
        })
        .await?;

    tracing::info!(%referral_id, %status, "referral status updated");
    Ok(Json(ApiOk { data: referral_dto(updated.record, Locale::default()) }))
}
