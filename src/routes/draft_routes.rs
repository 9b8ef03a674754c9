// src/routes/draft_routes.rs

use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::ApiError,
    form::{DraftSnapshot, HomeVisitForm, Wizard, DRAFT_KEY},
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState},
    store::Draft,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/drafts/{key}", put(save_draft).get(get_draft))
}

/// The wizard keeps a single draft slot.
fn check_key(key: &str) -> Result<(), ApiError> {
    if key == DRAFT_KEY {
        Ok(())
    } else {
        Err(ApiError::validation(format!("unknown draft key '{key}', expected {DRAFT_KEY}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveDraftRequest {
    pub part: u8,
    pub step: String,
    pub form: HomeVisitForm,
}

/// Save-draft button of the wizard; only the evidence step offers it.
pub async fn save_draft(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(key): Path<String>,
    Json(req): Json<SaveDraftRequest>,
) -> Result<Json<ApiOk<Draft>>, ApiError> {
    check_key(&key)?;
    let wizard = Wizard::at(req.part, &req.step)
        .ok_or_else(|| ApiError::validation(format!("unknown step {}/{}", req.part, req.step)))?;
    let snapshot = DraftSnapshot::capture(&wizard, &req.form)?;
    let snapshot = serde_json::to_value(snapshot)
        .map_err(|e| ApiError::Internal(format!("draft encode error: {e}")))?;

    let draft = state.store.save_draft(&key, snapshot).await;
    tracing::debug!(%key, "draft saved");
    Ok(Json(ApiOk { data: draft }))
}

pub async fn get_draft(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(key): Path<String>,
) -> Result<Json<ApiOk<Draft>>, ApiError> {
    check_key(&key)?;
    let draft = state
        .store
        .draft(&key)
        .await
        .ok_or_else(|| ApiError::not_found("draft"))?;
    Ok(Json(ApiOk { data: draft }))
}
