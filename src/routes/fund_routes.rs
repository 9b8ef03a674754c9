// src/routes/fund_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, CareRole, FundRequest, LocaleQuery, MAX_FUND_AMOUNT},
    routes::{paginate, status_filter, trimmed},
    status::{CanonicalStatus, Locale, StatusView},
    store::Repository,
    thai_date::format_thai_date,
};

/*
Fund flow:
Pending -> Accepted (approve) | Rejected (reject, note required)
cm files requests; cm or scfc decides.
*/

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/funds", get(list_funds).post(create_fund))
        .route("/funds/summary", get(fund_summary))
        .route("/funds/{fund_id}", get(get_fund))
        .route("/funds/{fund_id}/approve", post(approve_fund))
        .route("/funds/{fund_id}/reject", post(reject_fund))
}

#[derive(Debug, Serialize)]
pub struct FundDto {
    pub id: Uuid,
    pub hn: String,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
    pub raw_status: String,
    pub status: StatusView,
    pub requested_at: String,
    pub requested_at_display: String,
    pub decision_note: Option<String>,
}

pub(crate) fn fund_dto(f: FundRequest, locale: Locale) -> FundDto {
    FundDto {
        id: f.id,
        status: StatusView::new(f.status, locale),
        requested_at_display: format_thai_date(&f.requested_at),
        hn: f.hn,
        category: f.category,
        amount: f.amount,
        description: f.description,
        raw_status: f.raw_status,
        requested_at: f.requested_at,
        decision_note: f.decision_note,
    }
}

#[derive(Debug, Deserialize)]
pub struct ListFundsQuery {
    pub status: Option<String>,
    pub hn: Option<String>,
    pub locale: Option<Locale>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_funds(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<ListFundsQuery>,
) -> Result<Json<ApiOk<Vec<FundDto>>>, ApiError> {
    let status = status_filter(&state.normalizer, q.status)?;
    let hn = trimmed(q.hn);

    let mut rows = state
        .store
        .funds
        .filter(|f| status.is_none_or(|s| f.status == s) && hn.as_deref().is_none_or(|h| f.hn == h))
        .await;
    rows.sort_by(|a, b| b.record.requested_at.cmp(&a.record.requested_at));

    let locale = q.locale.unwrap_or_default();
    let items = paginate(rows, q.limit, q.offset)
        .into_iter()
        .map(|v| fund_dto(v.record, locale))
        .collect();
    Ok(Json(ApiOk { data: items }))
}

pub async fn get_fund(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(fund_id): Path<Uuid>,
    Query(q): Query<LocaleQuery>,
) -> Result<Json<ApiOk<FundDto>>, ApiError> {
    let f = state
        .store
        .funds
        .get(fund_id)
        .await
        .ok_or_else(|| ApiError::not_found("fund request"))?;
    Ok(Json(ApiOk { data: fund_dto(f.record, q.locale.unwrap_or_default()) }))
}

#[derive(Debug, Serialize)]
pub struct StatusTotal {
    pub status: CanonicalStatus,
    pub count: usize,
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct FundSummary {
    pub total_requests: usize,
    pub total_amount: i64,
    pub by_status: Vec<StatusTotal>,
}

fn total(amounts: impl Iterator<Item = i64>) -> i64 {
    amounts.fold(0, i64::saturating_add)
}

pub async fn fund_summary(
    State(state): State<AppState>,
    _ctx: RoleContext,
) -> Result<Json<ApiOk<FundSummary>>, ApiError> {
    let rows = state.store.funds.list().await;

    let by_status = CanonicalStatus::ALL
        .iter()
        .map(|s| {
            let matching = rows.iter().filter(|v| v.record.status == *s);
            StatusTotal {
                status: *s,
                count: matching.clone().count(),
                amount: total(matching.map(|v| v.record.amount)),
            }
        })
        .filter(|t| t.count > 0)
        .collect();

    Ok(Json(ApiOk {
        data: FundSummary {
            total_requests: rows.len(),
            total_amount: total(rows.iter().map(|v| v.record.amount)),
            by_status,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateFundRequest {
    pub hn: String,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
}

pub async fn create_fund(
    State(state): State<AppState>,
    ctx: RoleContext,
    Json(req): Json<CreateFundRequest>,
) -> Result<Json<ApiOk<FundDto>>, ApiError> {
    if ctx.role != CareRole::Cm {
        return Err(ApiError::Forbidden("FORBIDDEN", "Only case managers can file fund requests".into()));
    }

    let category = req.category.trim();
    if category.is_empty() {
        return Err(ApiError::validation("category is required"));
    }
    if req.amount <= 0 {
        return Err(ApiError::validation("amount must be greater than 0"));
    }
    if req.amount > MAX_FUND_AMOUNT {
        return Err(ApiError::validation(format!("amount must not exceed {MAX_FUND_AMOUNT}")));
    }
    let patient = state
        .store
        .patient_by_hn(req.hn.trim())
        .await
        .ok_or_else(|| ApiError::not_found("patient"))?;

    let stored = state
        .store
        .funds
        .insert(FundRequest {
            id: Uuid::new_v4(),
            hn: patient.record.hn,
            category: category.to_string(),
            amount: req.amount,
            description: trimmed(req.description),
            raw_status: CanonicalStatus::Pending.as_str().to_string(),
            status: CanonicalStatus::Pending,
            requested_at: state.reference_date.format("%Y-%m-%d").to_string(),
            decision_note: None,
        })
        .await;

    tracing::info!(fund_id = %stored.record.id, amount = stored.record.amount, "fund request filed");
    Ok(Json(ApiOk { data: fund_dto(stored.record, Locale::default()) }))
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub note: Option<String>,
    pub expected_version: Option<u64>,
}

async fn decide(
    state: &AppState,
    ctx: &RoleContext,
    fund_id: Uuid,
    req: DecisionRequest,
    to: CanonicalStatus,
) -> Result<Json<ApiOk<FundDto>>, ApiError> {
    if ctx.role == CareRole::Pcu {
        return Err(ApiError::Forbidden("FORBIDDEN", "PCU staff cannot decide fund requests".into()));
    }

    let note = trimmed(req.note);
    if to == CanonicalStatus::Rejected && note.is_none() {
        return Err(ApiError::BadRequest("REASON_REQUIRED", "a note is required to reject".into()));
    }

    let updated = state
        .store
        .funds
        .update(fund_id, req.expected_version, move |f| {
            if f.status != CanonicalStatus::Pending {
                return Err(ApiError::Conflict(
                    "ILLEGAL_TRANSITION",
                    format!("fund request is already {}", f.status),
                ));
            }
            f.status = to;
            f.raw_status = to.as_str().to_string();
            f.decision_note = note;
            Ok(())
        })
        .await?;

    tracing::info!(%fund_id, status = %to, decided_by = ctx.role.as_str(), "fund request decided");
    Ok(Json(ApiOk { data: fund_dto(updated.record, Locale::default()) }))
}

pub async fn approve_fund(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(fund_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<ApiOk<FundDto>>, ApiError> {
    decide(&state, &ctx, fund_id, req, CanonicalStatus::Accepted).await
}

pub async fn reject_fund(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(fund_id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<ApiOk<FundDto>>, ApiError> {
    decide(&state, &ctx, fund_id, req, CanonicalStatus::Rejected).await
}
