// src/routes/appointment_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::ApiError,
    form::FieldError,
    middleware::role_context::RoleContext,
    models::{ApiOk, AppState, Appointment, CareRole},
    routes::{paginate, patient_routes::AppointmentDto, trimmed},
    store::Repository,
    thai_date::{format_thai_date, parse_iso_date},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/appointments", get(list_appointments).post(create_appointment))
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    pub hn: Option<String>,
    /// only appointments on or after this date (YYYY-MM-DD)
    pub from: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    _ctx: RoleContext,
    Query(q): Query<ListAppointmentsQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentDto>>>, ApiError> {
    let hn = trimmed(q.hn);
    let from = match trimmed(q.from) {
        None => None,
        Some(s) => Some(
            parse_iso_date(&s)
                .ok_or_else(|| ApiError::validation("from must be YYYY-MM-DD"))?
                .format("%Y-%m-%d")
                .to_string(),
        ),
    };

    let mut rows = state
        .store
        .appointments
        .filter(|a| {
            hn.as_deref().is_none_or(|h| a.hn == h)
                && from.as_deref().is_none_or(|f| a.date.as_str() >= f)
        })
        .await;
    rows.sort_by(|a, b| (&a.record.date, &a.record.time).cmp(&(&b.record.date, &b.record.time)));

    let items = paginate(rows, q.limit, q.offset)
        .into_iter()
        .map(|v| AppointmentDto { date_display: format_thai_date(&v.record.date), appointment: v.record })
        .collect();
    Ok(Json(ApiOk { data: items }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateAppointmentRequest {
    pub hn: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub purpose: Option<String>,
    pub note: Option<String>,
}

pub async fn create_appointment(
    State(state): State<AppState>,
    ctx: RoleContext,
    Json(req): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiOk<AppointmentDto>>, ApiError> {
    if ctx.role == CareRole::Scfc {
        return Err(ApiError::Forbidden("FORBIDDEN", "SCFC cannot book appointments".into()));
    }

    let hn = trimmed(req.hn);
    let date = trimmed(req.date);
    let time = trimmed(req.time);
    let location = trimmed(req.location);

    let mut missing = Vec::new();
    if hn.is_none() {
        missing.push(FieldError { field: "hn", message: "required" });
    }
    match date.as_deref() {
        None => missing.push(FieldError { field: "date", message: "required" }),
        Some(d) if parse_iso_date(d).is_none() => {
            missing.push(FieldError { field: "date", message: "must be YYYY-MM-DD" })
        }
        Some(_) => {}
    }
    if time.is_none() {
        missing.push(FieldError { field: "time", message: "required" });
    }
    if location.is_none() {
        missing.push(FieldError { field: "location", message: "required" });
    }

    let (Some(hn), Some(date), Some(time), Some(location)) = (hn, date, time, location) else {
        return Err(ApiError::Invalid("please fill in all required fields".into(), missing));
    };
    if !missing.is_empty() {
        return Err(ApiError::Invalid("please fill in all required fields".into(), missing));
    }

    if state.store.patient_by_hn(&hn).await.is_none() {
        return Err(ApiError::not_found("patient"));
    }

    let stored = state
        .store
        .appointments
        .insert(Appointment {
            id: Uuid::new_v4(),
            hn,
            date,
            time,
            location,
            purpose: trimmed(req.purpose),
            note: trimmed(req.note),
        })
        .await;

    tracing::info!(appointment_id = %stored.record.id, hn = %stored.record.hn, "appointment booked");
    Ok(Json(ApiOk {
        data: AppointmentDto { date_display: format_thai_date(&stored.record.date), appointment: stored.record },
    }))
}
