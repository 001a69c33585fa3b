// libs/schedule-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_gateway::BackendClient;
use shared_models::auth::SessionUser;
use shared_models::error::AppError;

use crate::models::ScheduleError;
use crate::services::{SlotConflictService, WorkScheduleService};

#[derive(Debug, Deserialize)]
pub struct ShiftsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct ConflictQuery {
    pub work_schedule_id: Uuid,
}

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::SlotConflict => {
            AppError::Conflict("You already have an appointment in this slot".to_string())
        }
        ScheduleError::ValidationError(msg) => AppError::ValidationError(msg),
        ScheduleError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn get_shifts_for_date(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ShiftsQuery>,
) -> Result<Json<Value>, AppError> {
    let schedules = WorkScheduleService::new(Arc::new(BackendClient::new(&state)));

    let now = Utc::now();
    let shifts = schedules.shifts_for_date(
        doctor_id,
        query.date,
        now.date_naive(),
        now.time(),
        auth.token(),
    ).await.map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "shifts": shifts
    })))
}

#[axum::debug_handler]
pub async fn get_bookable_days(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<Value>, AppError> {
    if query.from > query.to {
        return Err(AppError::ValidationError("Range start must not be after range end".to_string()));
    }

    let schedules = WorkScheduleService::new(Arc::new(BackendClient::new(&state)));

    let now = Utc::now();
    let days = schedules.days_with_availability(
        doctor_id,
        query.from,
        query.to,
        now.date_naive(),
        now.time(),
        auth.token(),
    ).await.map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "days": days
    })))
}

#[axum::debug_handler]
pub async fn check_slot_conflict(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(session): Extension<SessionUser>,
    Query(query): Query<ConflictQuery>,
) -> Result<Json<Value>, AppError> {
    let conflicts = SlotConflictService::new(Arc::new(BackendClient::new(&state)));

    let holds = conflicts.patient_holds_appointment(
        &session.id,
        query.work_schedule_id,
        auth.token(),
    ).await.map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "conflict": holds
    })))
}
