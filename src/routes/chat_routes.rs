// src/routes/chat_routes.rs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, ChatMessage},
    store::Repository,
};

const MAX_MESSAGE_CHARS: usize = 2000;

pub fn router() -> Router<AppState> {
    Router::new().route("/chat/{hn}/messages", get(list_messages).post(post_message))
}

pub async fn list_messages(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Path(hn): Path<String>,
) -> Result<Json<ApiOk<Vec<ChatMessage>>>, ApiError> {
    let mut rows: Vec<ChatMessage> = state
        .store
        .chat
        .filter(|m| m.hn == hn)
        .await
        .into_iter()
        .map(|v| v.record)
        .collect();
    rows.sort_by_key(|m| m.sent_at);
    Ok(Json(ApiOk { data: rows }))
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub text: String,
}

pub async fn post_message(
    State(state): State<AppState>,
    ctx: RoleContext,
    Path(hn): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<ApiOk<ChatMessage>>, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::validation("text is required"));
    }
    if text.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::validation(format!("text is too long (max {MAX_MESSAGE_CHARS})")));
    }
    if state.store.patient_by_hn(&hn).await.is_none() {
        return Err(ApiError::not_found("patient"));
    }

    let stored = state
        .store
        .chat
        .insert(ChatMessage {
            id: Uuid::new_v4(),
            hn,
            author_role: ctx.role,
            author_name: ctx.display_name(),
            text: text.to_string(),
            sent_at: Utc::now(),
        })
        .await;

    Ok(Json(ApiOk { data: stored.record }))
}
