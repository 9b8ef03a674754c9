// src/routes/patient_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{
        ApiOk, AppState, Appointment, FundRequest, GeoPoint, LocaleQuery, Patient, PatientBrief,
        ReferralRecord, TeleConsult,
    },
    routes::{
        fund_routes::{fund_dto, FundDto},
        paginate,
        referral_routes::{referral_dto, ReferralDto},
        trimmed,
        visit_routes::{visit_dto, VisitDto},
    },
    store::Repository,
    thai_date::{calculate_age, format_thai_date, format_thai_date_opt, PLACEHOLDER},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", get(search_patients))
        .route("/patients/{hn}", get(get_patient))
        .route("/patients/{hn}/summary", get(get_patient_summary))
}

#[derive(Debug, Serialize)]
pub struct PatientDto {
    pub id: Uuid,
    pub hn: String,
    pub cid: String,
    pub name: String,
    pub dob: Option<String>,
    pub dob_display: String,
    pub age: String,
    pub gender: Option<String>,
    pub diagnosis: String,
    pub treatment_plan: Vec<String>,
    pub hospital: String,
    pub responsible_health_center: String,
    pub insurance_right: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub location: Option<GeoPoint>,
}

pub(crate) fn patient_dto(p: Patient, reference: NaiveDate) -> PatientDto {
    let age = p
        .dob
        .as_deref()
        .map(|d| calculate_age(d, reference))
        .unwrap_or_else(|| PLACEHOLDER.to_string());
    PatientDto {
        id: p.id,
        dob_display: format_thai_date_opt(p.dob.as_deref()),
        age,
        hn: p.hn,
        cid: p.cid,
        name: p.name,
        dob: p.dob,
        gender: p.gender,
        diagnosis: p.diagnosis,
        treatment_plan: p.treatment_plan,
        hospital: p.hospital,
        responsible_health_center: p.responsible_health_center,
        insurance_right: p.insurance_right,
        phone: p.phone,
        address: p.address,
        district: p.district,
        location: p.location,
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn search_patients(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<SearchQuery>,
) -> Result<Json<ApiOk<Vec<PatientDto>>>, ApiError> {
    let rows = match trimmed(q.query) {
        None => state.store.patients.list().await,
        Some(query) => {
            let needle = query.to_lowercase();
            state
                .store
                .patients
                .filter(|p| {
                    p.hn.to_lowercase().contains(&needle)
                        || p.name.to_lowercase().contains(&needle)
                        || p.cid.contains(&needle)
                })
                .await
        }
    };

    let items = paginate(rows, q.limit, q.offset)
        .into_iter()
        .map(|v| patient_dto(v.record, state.reference_date))
        .collect();
    Ok(Json(ApiOk { data: items }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(hn): Path<String>,
) -> Result<Json<ApiOk<PatientDto>>, ApiError> {
    let p = state
        .store
        .patient_by_hn(&hn)
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?;
    Ok(Json(ApiOk { data: patient_dto(p.record, state.reference_date) }))
}

/* ============================================================
   GET /patients/{hn}/summary
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub date_display: String,
}

#[derive(Debug, Serialize)]
pub struct TeleConsultDto {
    #[serde(flatten)]
    pub consult: TeleConsult,
    pub date_display: String,
}

#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub patient: PatientDto,
    pub visits: Vec<VisitDto>,
    pub referrals: Vec<ReferralDto>,
    pub funds: Vec<FundDto>,
    pub appointments: Vec<AppointmentDto>,
    pub teleconsults: Vec<TeleConsultDto>,
}

pub async fn get_patient_summary(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(hn): Path<String>,
    Query(q): Query<LocaleQuery>,
) -> Result<Json<ApiOk<PatientSummary>>, ApiError> {
    let p = state
        .store
        .patient_by_hn(&hn)
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?
        .record;
    let locale = q.locale.unwrap_or_default();

    let mut visits = state.store.visits.filter(|v| v.hn == hn).await;
    visits.sort_by(|a, b| b.record.date.cmp(&a.record.date));
    let visits = visits
        .into_iter()
        .map(|v| {
            let brief = PatientBrief { hn: p.hn.clone(), name: p.name.clone() };
            visit_dto(v, brief, ctx.role, locale, false)
        })
        .collect();

    let mut referrals: Vec<ReferralRecord> =
        state.store.referrals.filter(|r| r.hn == hn).await.into_iter().map(|v| v.record).collect();
    referrals.sort_by(|a, b| b.date.cmp(&a.date));

    let mut funds: Vec<FundRequest> =
        state.store.funds.filter(|f| f.hn == hn).await.into_iter().map(|v| v.record).collect();
    funds.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));

    let mut appointments: Vec<Appointment> = state
        .store
        .appointments
        .filter(|a| a.hn == hn)
        .await
        .into_iter()
        .map(|v| v.record)
        .collect();
    // upcoming first
    appointments.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));

    let teleconsults = state
        .store
        .teleconsults
        .filter(|t| t.hn == hn)
        .await
        .into_iter()
        .map(|v| TeleConsultDto { date_display: format_thai_date(&v.record.date), consult: v.record })
        .collect();

    Ok(Json(ApiOk {
        data: PatientSummary {
            visits,
            referrals: referrals.into_iter().map(|r| referral_dto(r, locale)).collect(),
            funds: funds.into_iter().map(|f| fund_dto(f, locale)).collect(),
            appointments: appointments
                .into_iter()
                .map(|a| AppointmentDto { date_display: format_thai_date(&a.date), appointment: a })
                .collect(),
            teleconsults,
            patient: patient_dto(p, state.reference_date),
        },
    }))
}
