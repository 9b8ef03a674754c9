use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::form::{FieldError, FormError};
use crate::lifecycle::TransitionError;
use crate::store::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    Invalid(String, Vec<FieldError>),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn role_required() -> Self {
        ApiError::Unauthorized(
            "ROLE_REQUIRED",
            "X-Care-Role header must be one of cm, pcu, scfc".into(),
        )
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound("NOT_FOUND", format!("{what} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    fn to_error_response(code: &str, message: &str, fields: Vec<FieldError>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                fields,
            },
        })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, msg, fields) = match self {
            ApiError::Unauthorized(code, msg) => (StatusCode::UNAUTHORIZED, code, msg, vec![]),
            ApiError::Forbidden(code, msg) => (StatusCode::FORBIDDEN, code, msg, vec![]),
            ApiError::BadRequest(code, msg) => (StatusCode::BAD_REQUEST, code, msg, vec![]),
            ApiError::Invalid(msg, fields) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg, fields),
            ApiError::NotFound(code, msg) => (StatusCode::NOT_FOUND, code, msg, vec![]),
            ApiError::Conflict(code, msg) => (StatusCode::CONFLICT, code, msg, vec![]),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg, vec![])
            }
        };
        (status, ApiError::to_error_response(code, &msg, fields)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => ApiError::NotFound("NOT_FOUND", e.to_string()),
            StoreError::VersionConflict { .. } => ApiError::Conflict("VERSION_CONFLICT", e.to_string()),
        }
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Illegal { .. } => ApiError::Conflict("ILLEGAL_TRANSITION", e.to_string()),
            TransitionError::Forbidden { .. } => ApiError::Forbidden("FORBIDDEN", e.to_string()),
            TransitionError::ReasonRequired(_) => ApiError::BadRequest("REASON_REQUIRED", e.to_string()),
            TransitionError::BadScheduleDate(_) => ApiError::validation(e.to_string()),
            TransitionError::InvalidForm(fields) => {
                ApiError::Invalid("home visit form is incomplete".into(), fields)
            }
        }
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        match e {
            FormError::DraftOutsideEvidence(_) => ApiError::BadRequest("DRAFT_NOT_ALLOWED", e.to_string()),
            FormError::NotSelectable(_) | FormError::NothingToConfirm(_) => {
                ApiError::Conflict("NOT_SELECTABLE", e.to_string())
            }
        }
    }
}
