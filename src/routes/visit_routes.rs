// src/routes/visit_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    form::{self, HomeVisitForm, Selection},
    lifecycle::{self, VisitAction, VisitCommand},
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, CareRole, HomeVisitRecord, LocaleQuery, PatientBrief, VisitType},
    routes::{paginate, status_filter, trimmed},
    status::{CanonicalStatus, Locale, StatusView},
    store::{Repository, Versioned},
    thai_date::format_thai_date,
};

/*
Roles:
cm   creates requests, may reopen a completed form
pcu  accepts / rejects / schedules / records the visit
scfc read-only
*/

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/visits", get(list_visits).post(create_visit))
        .route("/visits/{visit_id}", get(get_visit))
        .route("/visits/{visit_id}/accept", post(accept_visit))
        .route("/visits/{visit_id}/reject", post(reject_visit))
        .route("/visits/{visit_id}/schedule", post(schedule_visit))
        .route("/visits/{visit_id}/not-home", post(not_home_visit))
        .route("/visits/{visit_id}/not-allowed", post(not_allowed_visit))
        .route("/visits/{visit_id}/submit", post(submit_visit))
        .route("/visits/{visit_id}/reopen", post(reopen_visit))
        .route("/visits/{visit_id}/select", post(select_visit))
        .route("/visits/{visit_id}/select/confirm", post(confirm_visit_selection))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct VisitDto {
    pub id: Uuid,
    pub version: u64,
    pub patient: PatientBrief,
    pub raw_status: String,
    pub status: StatusView,
    pub visit_type: VisitType,
    pub date: String,
    pub date_display: String,
    pub requested_by: Option<String>,
    pub pcu_name: Option<String>,
    pub scheduled_at: Option<String>,
    pub reason: Option<String>,
    pub editable: bool,
    pub has_form: bool,
    pub available_actions: Vec<VisitAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<HomeVisitForm>,
}

pub(crate) fn visit_dto(
    v: Versioned<HomeVisitRecord>,
    patient: PatientBrief,
    role: CareRole,
    locale: Locale,
    with_form: bool,
) -> VisitDto {
    let r = v.record;
    VisitDto {
        id: r.id,
        version: v.version,
        patient,
        status: StatusView::new(r.status, locale),
        available_actions: lifecycle::available_actions(r.status, r.editable, role),
        raw_status: r.raw_status,
        visit_type: r.visit_type,
        date_display: format_thai_date(&r.date),
        date: r.date,
        requested_by: r.requested_by,
        pcu_name: r.pcu_name,
        scheduled_at: r.scheduled_at,
        reason: r.reason,
        editable: r.editable,
        has_form: r.data.is_some(),
        data: if with_form { r.data } else { None },
    }
}

async fn load_visit(state: &AppState, visit_id: Uuid) -> Result<Versioned<HomeVisitRecord>, ApiError> {
    state
        .store
        .visits
        .get(visit_id)
        .await
        .ok_or_else(|| ApiError::not_found("visit"))
}

async fn brief(state: &AppState, hn: &str) -> PatientBrief {
    let patients: Vec<_> = state
        .store
        .patients
        .filter(|p| p.hn == hn)
        .await
        .into_iter()
        .map(|v| v.record)
        .collect();
    PatientBrief::lookup(&patients, hn)
}

/* ============================================================
   GET /visits
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListVisitsQuery {
    /// any raw token; matched through the normalizer
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub visit_type: Option<String>,
    pub hn: Option<String>,
    pub locale: Option<Locale>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_visits(
    State(state): State<AppState>,
    ctx: RoleContext,
    Query(q): Query<ListVisitsQuery>,
) -> Result<Json<ApiOk<Vec<VisitDto>>>, ApiError> {
    let status = status_filter(&state.normalizer, q.status)?;
    let visit_type = match trimmed(q.visit_type) {
        None => None,
        Some(t) => Some(
            VisitType::parse(&t).ok_or_else(|| ApiError::validation("type must be Joint or Delegated"))?,
        ),
    };
    let hn = trimmed(q.hn);

    let mut rows = state
        .store
        .visits
        .filter(|v| {
            status.is_none_or(|s| v.status == s)
                && visit_type.is_none_or(|t| v.visit_type == t)
                && hn.as_deref().is_none_or(|h| v.hn == h)
        })
        .await;
    // ISO dates sort lexicographically; newest first
    rows.sort_by(|a, b| b.record.date.cmp(&a.record.date));

    let patients: Vec<_> = state.store.patients.list().await.into_iter().map(|v| v.record).collect();
    let locale = q.locale.unwrap_or_default();
    let items = paginate(rows, q.limit, q.offset)
        .into_iter()
        .map(|v| {
            let patient = PatientBrief::lookup(&patients, &v.record.hn);
            visit_dto(v, patient, ctx.role, locale, false)
        })
        .collect();

    Ok(Json(ApiOk { data: items }))
}

/* ============================================================
   POST /visits
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateVisitRequest {
    pub hn: String,
    pub visit_type: String,
    pub date: Option<String>,
    pub pcu_name: Option<String>,
}

pub async fn create_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Json(req): Json<CreateVisitRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    if ctx.role != CareRole::Cm {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only case managers can request home visits".into(),
        ));
    }

    let hn = req.hn.trim();
    let patient = state
        .store
        .patient_by_hn(hn)
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?;
    let visit_type = VisitType::parse(&req.visit_type)
        .ok_or_else(|| ApiError::validation("visit_type must be Joint or Delegated"))?;

    let date = trimmed(req.date).unwrap_or_else(|| state.reference_date.format("%Y-%m-%d").to_string());
    let pcu_name = trimmed(req.pcu_name).or_else(|| Some(patient.record.responsible_health_center.clone()));

    let now = Utc::now();
    let stored = state
        .store
        .visits
        .insert(HomeVisitRecord {
            id: Uuid::new_v4(),
            hn: hn.to_string(),
            raw_status: CanonicalStatus::Pending.as_str().to_string(),
            status: CanonicalStatus::Pending,
            visit_type,
            date,
            requested_by: Some(ctx.display_name()),
            pcu_name,
            scheduled_at: None,
            reason: None,
            data: None,
            editable: false,
            created_at: now,
            updated_at: now,
        })
        .await;

    tracing::info!(visit_id = %stored.record.id, hn, "home visit requested");
    let patient = PatientBrief { hn: patient.record.hn, name: patient.record.name };
    Ok(Json(ApiOk { data: visit_dto(stored, patient, ctx.role, Locale::default(), true) }))
}

/* ============================================================
   GET /visits/{id}
   ============================================================ */

pub async fn get_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(q): Query<LocaleQuery>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let v = load_visit(&state, visit_id).await?;
    let patient = brief(&state, &v.record.hn).await;
    Ok(Json(ApiOk {
        data: visit_dto(v, patient, ctx.role, q.locale.unwrap_or_default(), true),
    }))
}

/* ============================================================
   Transitions
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
pub struct VersionQuery {
    pub expected_version: Option<u64>,
}

async fn transition(
    state: &AppState,
    ctx: &RoleContext,
    visit_id: Uuid,
    expected_version: Option<u64>,
    cmd: VisitCommand,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let role = ctx.role;
    let updated = state
        .store
        .visits
        .update(visit_id, expected_version, move |visit| {
            lifecycle::apply(visit, role, cmd, Utc::now()).map(|_| ()).map_err(ApiError::from)
        })
        .await?;

    let patient = brief(state, &updated.record.hn).await;
    Ok(Json(ApiOk { data: visit_dto(updated, patient, role, Locale::default(), true) }))
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    pub date: String,
    pub time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub form: HomeVisitForm,
}

pub async fn accept_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    transition(&state, &ctx, visit_id, v.expected_version, VisitCommand::Accept).await
}

pub async fn reject_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let cmd = VisitCommand::Reject { reason: req.reason.unwrap_or_default() };
    transition(&state, &ctx, visit_id, v.expected_version, cmd).await
}

pub async fn schedule_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let cmd = VisitCommand::Schedule { date: req.date, time: req.time };
    transition(&state, &ctx, visit_id, v.expected_version, cmd).await
}

pub async fn not_home_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let cmd = VisitCommand::NotHome { reason: req.reason.unwrap_or_default() };
    transition(&state, &ctx, visit_id, v.expected_version, cmd).await
}

pub async fn not_allowed_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
    Json(req): Json<ReasonRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let cmd = VisitCommand::NotAllowed { reason: req.reason };
    transition(&state, &ctx, visit_id, v.expected_version, cmd).await
}

pub async fn submit_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    let cmd = VisitCommand::Submit { form: Box::new(req.form) };
    transition(&state, &ctx, visit_id, v.expected_version, cmd).await
}

pub async fn reopen_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
    Query(v): Query<VersionQuery>,
) -> Result<Json<ApiOk<VisitDto>>, ApiError> {
    transition(&state, &ctx, visit_id, v.expected_version, VisitCommand::Reopen).await
}

/* ============================================================
   Timeline selection (PCU picks a visit to record)
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct SelectionDto {
    pub visit_id: Uuid,
    pub status: StatusView,
    #[serde(flatten)]
    pub selection: Selection,
}

fn ensure_pcu(ctx: &RoleContext) -> Result<(), ApiError> {
    if ctx.role == CareRole::Pcu {
        Ok(())
    } else {
        Err(ApiError::Forbidden("FORBIDDEN", "Only PCU staff record home visits".into()))
    }
}

pub async fn select_visit(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<ApiOk<SelectionDto>>, ApiError> {
    ensure_pcu(&ctx)?;
    let v = load_visit(&state, visit_id).await?;
    let selection = form::select_timeline_entry(v.record.status)?;
    Ok(Json(ApiOk {
        data: SelectionDto {
            visit_id,
            status: StatusView::new(v.record.status, Locale::default()),
            selection,
        },
    }))
}

pub async fn confirm_visit_selection(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(visit_id): Path<Uuid>,
) -> Result<Json<ApiOk<SelectionDto>>, ApiError> {
    ensure_pcu(&ctx)?;
    let v = load_visit(&state, visit_id).await?;
    let selection = form::confirm_selection(v.record.status)?;
    tracing::info!(%visit_id, "visit selection confirmed");
    Ok(Json(ApiOk {
        data: SelectionDto {
            visit_id,
            status: StatusView::new(v.record.status, Locale::default()),
            selection,
        },
    }))
}
